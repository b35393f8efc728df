//! Component B: sent-packet tracking (RFC 9002 §B, "Tracking Sent Packets").
//!
//! Records packets as they're sent, folds in ACK ranges, and marks packets
//! lost. Grounded in the transport crate's `SentPacketInfo`/`LossManager`
//! outstanding-packet bookkeeping, split out as its own component so the
//! Loss Detector and Retransmission Manager can both depend on it in
//! isolation from RTT.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::error::Result;
use crate::time::{validate_packet_number, PacketNumber, Payload, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    InFlight,
    Acknowledged,
    Lost,
}

/// A packet the tracker has recorded as sent.
#[derive(Debug, Clone)]
pub struct SentPacketRecord<P> {
    packet_number: PacketNumber,
    payload: P,
    sent_time: Timestamp,
    ack_eliciting: bool,
    size: usize,
    status: Status,
}

impl<P> SentPacketRecord<P> {
    /// The packet number this record tracks.
    #[must_use]
    pub const fn packet_number(&self) -> PacketNumber {
        self.packet_number
    }

    /// The payload handle supplied at send time.
    #[must_use]
    pub const fn payload(&self) -> &P {
        &self.payload
    }

    /// The timestamp this packet was sent at.
    #[must_use]
    pub const fn sent_time(&self) -> Timestamp {
        self.sent_time
    }

    /// Whether receipt of this packet should provoke a peer ACK.
    #[must_use]
    pub const fn ack_eliciting(&self) -> bool {
        self.ack_eliciting
    }

    /// Size of the payload in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Whether this record is still outstanding (sent but not acked/lost).
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        matches!(self.status, Status::InFlight)
    }

    /// Whether this record has been acknowledged.
    #[must_use]
    pub const fn is_acknowledged(&self) -> bool {
        matches!(self.status, Status::Acknowledged)
    }

    /// Whether this record has been marked lost.
    #[must_use]
    pub const fn is_lost(&self) -> bool {
        matches!(self.status, Status::Lost)
    }
}

/// Outcome of folding a batch of ACK ranges into the tracker.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AckFoldOutcome {
    /// Packet numbers newly acknowledged by this call (empty on pure duplicates).
    pub newly_acked: Vec<PacketNumber>,
    /// Whether any newly-acknowledged packet was ack-eliciting.
    pub ack_eliciting_acked: bool,
}

/// Tracks in-flight, acknowledged, and lost sent packets for one packet-number space.
#[derive(Debug)]
pub struct PacketTracker<P> {
    records: HashMap<PacketNumber, SentPacketRecord<P>>,
    acknowledged: HashSet<PacketNumber>,
    largest_sent: Option<PacketNumber>,
    largest_acked: Option<PacketNumber>,
    outstanding: u64,
    time_of_last_sent_ack_eliciting: Timestamp,
}

impl<P> Default for PacketTracker<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> PacketTracker<P> {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            acknowledged: HashSet::new(),
            largest_sent: None,
            largest_acked: None,
            outstanding: 0,
            time_of_last_sent_ack_eliciting: 0.0,
        }
    }

    /// Record that packet `n` was just sent.
    ///
    /// Overwrites any prior record at `n`.
    pub fn on_packet_sent(
        &mut self,
        n: i64,
        payload: P,
        sent_time: Timestamp,
        ack_eliciting: bool,
    ) -> Result<()>
    where
        P: Payload,
    {
        let n = validate_packet_number(n)?;
        let size = payload.size_in_bytes();

        if let Some(prior) = self.records.remove(&n) {
            if prior.is_in_flight() && prior.ack_eliciting {
                self.outstanding = self.outstanding.saturating_sub(1);
            }
        }

        self.records.insert(
            n,
            SentPacketRecord {
                packet_number: n,
                payload,
                sent_time,
                ack_eliciting,
                size,
                status: Status::InFlight,
            },
        );

        self.largest_sent = Some(self.largest_sent.map_or(n, |largest| largest.max(n)));

        if ack_eliciting {
            self.outstanding += 1;
            self.time_of_last_sent_ack_eliciting = sent_time;
        }

        trace!(packet_number = n, size, ack_eliciting, "packet sent");
        Ok(())
    }

    /// Fold a batch of inclusive ACK ranges `[start, end]` into the tracker.
    pub fn on_ack_received(&mut self, ranges: &[(u64, u64)], _ack_time: Timestamp) -> AckFoldOutcome {
        let mut outcome = AckFoldOutcome::default();
        let mut max_acked: Option<PacketNumber> = None;

        for &(start, end) in ranges {
            if start > end {
                continue;
            }
            for n in start..=end {
                let Some(record) = self.records.get_mut(&n) else {
                    continue;
                };
                if !record.is_in_flight() {
                    continue;
                }
                record.status = Status::Acknowledged;
                self.acknowledged.insert(n);
                outcome.newly_acked.push(n);
                if record.ack_eliciting {
                    self.outstanding = self.outstanding.saturating_sub(1);
                    outcome.ack_eliciting_acked = true;
                }
                max_acked = Some(max_acked.map_or(n, |m| m.max(n)));
            }
        }

        if let Some(n) = max_acked {
            self.largest_acked = Some(self.largest_acked.map_or(n, |largest| largest.max(n)));
        }

        outcome
    }

    /// Mark packet `n` lost. A no-op if `n` is unknown, already acknowledged,
    /// or already lost.
    pub fn on_packet_lost(&mut self, n: PacketNumber) {
        let Some(record) = self.records.get_mut(&n) else {
            return;
        };
        if !record.is_in_flight() {
            return;
        }
        record.status = Status::Lost;
        if record.ack_eliciting {
            self.outstanding = self.outstanding.saturating_sub(1);
        }
        trace!(packet_number = n, "packet marked lost");
    }

    /// Low-level packet-number/time threshold loss sweep, usable directly by
    /// the Loss Detector or in isolation.
    ///
    /// Returns an empty list unless `largest_acked >= 0`. Lost packets are
    /// marked in the same pass; ties broken by ascending packet number.
    pub fn detect_lost_packets(&mut self, loss_delay: f64, now: Timestamp) -> Vec<PacketNumber> {
        let Some(largest_acked) = self.largest_acked else {
            return Vec::new();
        };

        let mut candidates: Vec<PacketNumber> = self
            .records
            .values()
            .filter(|r| r.is_in_flight() && r.packet_number <= largest_acked)
            .filter(|r| {
                largest_acked - r.packet_number >= 3 || now - r.sent_time >= loss_delay
            })
            .map(|r| r.packet_number)
            .collect();
        candidates.sort_unstable();

        for &n in &candidates {
            self.on_packet_lost(n);
        }
        candidates
    }

    /// Largest packet number acknowledged so far, or `-1` if none.
    #[must_use]
    pub fn largest_acked(&self) -> i64 {
        self.largest_acked.map_or(-1, |n| n as i64)
    }

    /// Largest packet number sent so far, or `-1` if none.
    #[must_use]
    pub fn largest_sent(&self) -> i64 {
        self.largest_sent.map_or(-1, |n| n as i64)
    }

    /// Count of ack-eliciting packets that are sent but neither acked nor lost.
    #[must_use]
    pub const fn outstanding(&self) -> u64 {
        self.outstanding
    }

    /// Timestamp of the most recently sent ack-eliciting packet, or `0.0` if none.
    #[must_use]
    pub const fn time_of_last_sent_ack_eliciting(&self) -> Timestamp {
        self.time_of_last_sent_ack_eliciting
    }

    /// Whether packet `n` has been acknowledged (survives `cleanup_acked_packets`).
    #[must_use]
    pub fn is_acked(&self, n: PacketNumber) -> bool {
        self.acknowledged.contains(&n)
    }

    /// Whether packet `n` is currently recorded as lost.
    #[must_use]
    pub fn is_lost(&self, n: PacketNumber) -> bool {
        self.records.get(&n).is_some_and(SentPacketRecord::is_lost)
    }

    /// Whether any packet is sent but not yet acknowledged.
    #[must_use]
    pub fn has_unacked(&self) -> bool {
        self.records.values().any(|r| !r.is_acknowledged())
    }

    /// All retained sent-packet records (in-flight, acknowledged, or lost).
    pub fn get_sent_packets(&self) -> impl Iterator<Item = &SentPacketRecord<P>> {
        self.records.values()
    }

    /// All currently in-flight records.
    pub fn get_unacked_packets(&self) -> impl Iterator<Item = &SentPacketRecord<P>> {
        self.records.values().filter(|r| r.is_in_flight())
    }

    /// All currently lost records.
    pub fn get_packets_for_retransmission(&self) -> impl Iterator<Item = &SentPacketRecord<P>> {
        self.records.values().filter(|r| r.is_lost())
    }

    /// Remove acknowledged records from the primary store.
    ///
    /// The acknowledged-set is preserved, so `is_acked` keeps working for
    /// packet numbers swept out here.
    pub fn cleanup_acked_packets(&mut self) {
        self.records.retain(|_, r| !r.is_acknowledged());
    }
}
