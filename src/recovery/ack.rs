//! Component D: local-ACK accounting (RFC 9002's counterpart for the
//! receive side — tracking what the local endpoint has received and owes
//! an ACK for).
//!
//! Grounded in the transport crate's `ack::{AckFrame, AckRange,
//! ReceiveHistory}`: this module keeps the same frame/range shape and
//! range-coalescing approach, but separates "packets ever received" (kept
//! forever, for duplicate suppression) from "packets pending
//! acknowledgment" (cleared on every emitted ACK).

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::time::{validate_packet_number, PacketNumber, Timestamp};

/// An inclusive packet-number range, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckRange {
    start: u64,
    end: u64,
}

impl AckRange {
    /// Range start (inclusive).
    #[must_use]
    pub const fn start(&self) -> u64 {
        self.start
    }

    /// Range end (inclusive).
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.end
    }
}

/// An ACK frame ready to send to the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckFrame {
    largest_received: u64,
    ack_delay_micros: u64,
    ranges: Vec<AckRange>,
}

impl AckFrame {
    /// Build a frame directly, e.g. to represent a peer-reported ACK fed
    /// into `on_ack_received` rather than one built by `generate_ack_frame`.
    #[must_use]
    pub fn new(largest_acked: u64, ack_delay_micros: u64, ranges: Vec<(u64, u64)>) -> Self {
        Self {
            largest_received: largest_acked,
            ack_delay_micros,
            ranges: ranges
                .into_iter()
                .map(|(start, end)| AckRange { start, end })
                .collect(),
        }
    }

    /// Largest packet number the local endpoint has received.
    #[must_use]
    pub const fn largest_received(&self) -> u64 {
        self.largest_received
    }

    /// Same value as `largest_received`, named for use as an inbound,
    /// peer-reported ACK of packets the caller sent.
    #[must_use]
    pub const fn largest_acked(&self) -> u64 {
        self.largest_received
    }

    /// ACK delay, encoded as whole microseconds (`ack_delay_ms * 1000`).
    ///
    /// This is not the RFC 9002 variable-length integer with an
    /// `ack_delay_exponent` — downstream wire encoders must adjust.
    #[must_use]
    pub const fn ack_delay_micros(&self) -> u64 {
        self.ack_delay_micros
    }

    /// Ranges in descending order of their upper endpoint; pairwise disjoint.
    #[must_use]
    pub fn ranges(&self) -> &[AckRange] {
        &self.ranges
    }
}

/// Tracks received packet numbers and builds outgoing ACK frames.
#[derive(Debug)]
pub struct AckManager {
    ack_frequency_threshold: u32,
    max_ack_delay_ms: f64,
    received: HashMap<PacketNumber, Timestamp>,
    pending: BTreeSet<PacketNumber>,
    largest_received: Option<PacketNumber>,
    largest_received_time: Timestamp,
    ack_eliciting_received: u32,
    ack_pending: bool,
    ack_timeout: Timestamp,
}

impl AckManager {
    /// Create a new manager with the given ACK-frequency threshold and max ACK delay (ms).
    #[must_use]
    pub fn new(ack_frequency_threshold: u32, max_ack_delay_ms: f64) -> Self {
        Self {
            ack_frequency_threshold,
            max_ack_delay_ms,
            received: HashMap::new(),
            pending: BTreeSet::new(),
            largest_received: None,
            largest_received_time: 0.0,
            ack_eliciting_received: 0,
            ack_pending: false,
            ack_timeout: 0.0,
        }
    }

    /// Record receipt of packet `n`. A no-op if `n` was already received.
    pub fn on_packet_received(
        &mut self,
        n: i64,
        recv_time: Timestamp,
        ack_eliciting: bool,
    ) -> Result<()> {
        let n = validate_packet_number(n)?;

        if self.received.contains_key(&n) {
            trace!(packet_number = n, "duplicate packet receipt ignored");
            return Ok(());
        }

        self.received.insert(n, recv_time);
        self.pending.insert(n);

        if self.largest_received.is_none_or(|largest| n > largest) {
            self.largest_received = Some(n);
            self.largest_received_time = recv_time;
        }

        if ack_eliciting {
            self.ack_eliciting_received += 1;
            self.ack_pending = true;
            self.ack_timeout = recv_time + self.max_ack_delay_ms;
        }

        Ok(())
    }

    /// Whether an ACK should be sent right now, either because enough
    /// ack-eliciting packets have piled up or the delay timer has expired.
    #[must_use]
    pub fn should_send_ack_immediately(&self, now: Timestamp) -> bool {
        self.ack_eliciting_received >= self.ack_frequency_threshold
            || (self.ack_pending && now >= self.ack_timeout)
    }

    /// Build an ACK frame covering every pending packet number, or `None`
    /// if nothing is pending.
    pub fn generate_ack_frame(&mut self, now: Timestamp) -> Option<AckFrame> {
        if self.pending.is_empty() {
            return None;
        }

        let ack_delay_ms = (now - self.largest_received_time).max(0.0);
        let ack_delay_micros = (ack_delay_ms * 1000.0) as u64;

        let mut ranges: Vec<AckRange> = Vec::new();
        for &n in &self.pending {
            match ranges.last_mut() {
                Some(last) if last.end + 1 == n => last.end = n,
                _ => ranges.push(AckRange { start: n, end: n }),
            }
        }
        ranges.reverse();

        let largest_received = self.largest_received.unwrap_or(0);
        debug!(
            largest_received,
            range_count = ranges.len(),
            "ack frame generated"
        );

        self.pending.clear();
        self.ack_eliciting_received = 0;
        self.ack_pending = false;
        self.ack_timeout = 0.0;

        Some(AckFrame {
            largest_received,
            ack_delay_micros,
            ranges,
        })
    }

    /// Remove packet numbers the caller confirms were actually sent in an
    /// ACK frame, e.g. after a send failure truncated the frame.
    pub fn on_ack_sent(&mut self, ranges: &[(u64, u64)]) {
        for &(start, end) in ranges {
            if start > end {
                warn!(start, end, "ignoring malformed ack-sent range");
                continue;
            }
            for n in start..=end {
                self.pending.remove(&n);
            }
        }
    }

    /// Every packet number in `[0, largest_received]` never recorded as received.
    #[must_use]
    pub fn detect_missing_packets(&self) -> Vec<PacketNumber> {
        let Some(largest) = self.largest_received else {
            return Vec::new();
        };
        (0..=largest)
            .filter(|n| !self.received.contains_key(n))
            .collect()
    }

    /// Purge received/pending entries whose receive time is strictly less than `cutoff`.
    pub fn cleanup_old_records(&mut self, cutoff: Timestamp) {
        let stale: HashSet<PacketNumber> = self
            .received
            .iter()
            .filter(|(_, &t)| t < cutoff)
            .map(|(&n, _)| n)
            .collect();
        for n in &stale {
            self.received.remove(n);
            self.pending.remove(n);
        }
    }

    /// Whether any packet is currently awaiting acknowledgment.
    #[must_use]
    pub fn has_pending_ack(&self) -> bool {
        self.ack_pending
    }

    /// Deadline at which the pending ACK must be sent, or `0.0` if none is pending.
    #[must_use]
    pub const fn ack_timeout(&self) -> Timestamp {
        self.ack_timeout
    }

    /// Largest received packet number, or `-1` if none.
    #[must_use]
    pub fn largest_received(&self) -> i64 {
        self.largest_received.map_or(-1, |n| n as i64)
    }
}
