//! Component F: retransmission policy (RFC 9002 §6/§7, loss and PTO response).
//!
//! Maps lost and probed packets to retransmission bookkeeping: attempt
//! counters, backoff, and the aggregate rate used for storm detection.
//! Grounded in the transport crate's `CongestionController` window/backoff
//! bookkeeping (`increase_window`/`reduce_window`), adapted from a
//! byte-budget model to a per-packet attempt-counter model since congestion
//! windows are out of scope for this core.

use std::collections::HashMap;

use tracing::debug;

use crate::recovery::ack::AckFrame;
use crate::recovery::config::RecoveryConfig;
use crate::recovery::loss::{LossDetector, TimeoutAction};
use crate::recovery::rtt::RttEstimator;
use crate::recovery::tracker::{AckFoldOutcome, PacketTracker};
use crate::time::{PacketNumber, Timestamp};

/// A lost packet still eligible for retransmission.
#[derive(Debug, Clone, PartialEq)]
pub struct RetxRecord {
    /// The lost packet's number.
    pub packet_number: PacketNumber,
    /// Number of retransmission attempts already registered for it.
    pub attempt_count: u32,
    /// `BACKOFF_BASE ^ attempt_count`, for the caller to scale its own delay.
    pub backoff_multiplier: f64,
}

/// A packet selected to carry a PTO probe.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeRecord<P> {
    /// The probed packet's original number.
    pub packet_number: PacketNumber,
    /// A copy of the payload originally sent, for the caller to resend.
    pub original_payload: P,
    /// Retransmission attempts registered for this packet number so far.
    pub retransmission_count: u32,
}

/// Resolution of a fired loss-detection timer, as handled by this manager.
#[derive(Debug, Clone, PartialEq)]
pub enum PtoOutcome<P> {
    /// The timer resolved to a loss sweep; these packets are newly lost.
    LossDetection {
        /// Packet numbers declared lost.
        packets: Vec<PacketNumber>,
    },
    /// The timer resolved to a PTO probe; these packets should be resent.
    Probe {
        /// Probe records, oldest packet first.
        records: Vec<ProbeRecord<P>>,
    },
}

/// Tracks per-packet retransmission attempts and aggregate retransmission rate.
#[derive(Debug, Clone)]
pub struct RetransmissionManager {
    config: RecoveryConfig,
    attempts: HashMap<PacketNumber, u32>,
    last_retransmission_time: HashMap<PacketNumber, Timestamp>,
    total_retransmissions: u64,
}

impl RetransmissionManager {
    /// Create a new manager with no recorded attempts.
    #[must_use]
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            config,
            attempts: HashMap::new(),
            last_retransmission_time: HashMap::new(),
            total_retransmissions: 0,
        }
    }

    /// Fold a peer-reported ACK into the tracker, feed the RTT estimator
    /// from the largest newly-acked packet, and register retransmission
    /// attempts for anything the loss detector declares lost as a result.
    pub fn on_ack_received<P>(
        &mut self,
        tracker: &mut PacketTracker<P>,
        loss: &mut LossDetector,
        rtt: &mut RttEstimator,
        ack_frame: &AckFrame,
        ack_time: Timestamp,
    ) -> AckFoldOutcome {
        let ranges: Vec<(u64, u64)> = ack_frame
            .ranges()
            .iter()
            .map(|r| (r.start(), r.end()))
            .collect();

        let sent_times: HashMap<PacketNumber, Timestamp> = tracker
            .get_sent_packets()
            .map(|r| (r.packet_number(), r.sent_time()))
            .collect();

        let outcome = tracker.on_ack_received(&ranges, ack_time);

        for &n in &outcome.newly_acked {
            if n == ack_frame.largest_acked() {
                if let Some(&sent_time) = sent_times.get(&n) {
                    let sample = ack_time - sent_time;
                    let ack_delay_ms = ack_frame.ack_delay_micros() as f64 / 1000.0;
                    let _ = rtt.update_rtt(sample, ack_delay_ms);
                }
            }
        }

        if !outcome.newly_acked.is_empty() {
            loss.on_ack_received();
            let result = loss.detect_lost_packets(tracker, rtt, ack_time);
            for n in result.lost {
                self.register_attempt(n, ack_time);
            }
        }

        outcome
    }

    /// Resolve a fired loss-detection timer. Internally calls
    /// `loss.on_loss_detection_timeout`; on a PTO probe, registers a
    /// retransmission attempt for each probed packet and returns the
    /// records the caller should actually resend.
    pub fn on_pto_timeout<P>(
        &mut self,
        tracker: &mut PacketTracker<P>,
        loss: &mut LossDetector,
        rtt: &RttEstimator,
        now: Timestamp,
    ) -> PtoOutcome<P>
    where
        P: Clone,
    {
        match loss.on_loss_detection_timeout(tracker, rtt, now) {
            TimeoutAction::LossDetection { packets } => {
                for &n in &packets {
                    self.register_attempt(n, now);
                }
                PtoOutcome::LossDetection { packets }
            }
            TimeoutAction::PtoProbe { packets } => {
                let payloads: HashMap<PacketNumber, P> = tracker
                    .get_sent_packets()
                    .filter(|r| packets.contains(&r.packet_number()))
                    .map(|r| (r.packet_number(), r.payload().clone()))
                    .collect();

                let mut payloads = payloads;
                let records = packets
                    .into_iter()
                    .filter_map(|n| {
                        let payload = payloads.remove(&n)?;
                        self.register_attempt(n, now);
                        Some(ProbeRecord {
                            packet_number: n,
                            original_payload: payload,
                            retransmission_count: self.attempts.get(&n).copied().unwrap_or(0),
                        })
                    })
                    .collect();

                PtoOutcome::Probe { records }
            }
        }
    }

    /// Lost packets still under the retransmission attempt cap, annotated
    /// with their current backoff multiplier.
    pub fn get_packets_for_retransmission<P>(
        &self,
        tracker: &PacketTracker<P>,
    ) -> Vec<RetxRecord> {
        tracker
            .get_packets_for_retransmission()
            .filter_map(|r| {
                let n = r.packet_number();
                let attempt_count = self.attempts.get(&n).copied().unwrap_or(0);
                if attempt_count >= self.config.max_retransmissions {
                    return None;
                }
                Some(RetxRecord {
                    packet_number: n,
                    attempt_count,
                    backoff_multiplier: self.config.backoff_base.powi(attempt_count as i32),
                })
            })
            .collect()
    }

    /// Retransmission delay for a given attempt count: `smoothed_rtt ·
    /// BACKOFF_BASE^attempt`, with a negative attempt clamped to zero so the
    /// result is never negative or below `smoothed_rtt / 2`.
    #[must_use]
    pub fn calculate_retransmission_delay(&self, rtt: &RttEstimator, attempt: i64) -> f64 {
        let exponent = attempt.max(0);
        let delay = rtt.smoothed_rtt() * self.config.backoff_base.powi(exponent as i32);
        delay.max(rtt.smoothed_rtt() / 2.0)
    }

    /// Whether the overall retransmission rate indicates a sustained storm.
    #[must_use]
    pub fn is_in_retransmission_storm<P>(&self, tracker: &PacketTracker<P>) -> bool {
        self.retransmission_rate(tracker) > 0.5
    }

    /// `total_retransmissions / (largest_sent + 1)`, used by both storm
    /// detection and the facade's coarser `high_loss_rate` threshold.
    #[must_use]
    pub fn retransmission_rate<P>(&self, tracker: &PacketTracker<P>) -> f64 {
        let denom = (tracker.largest_sent() + 1).max(1) as f64;
        self.total_retransmissions as f64 / denom
    }

    /// Purge stale retransmission timestamps older than `cutoff`.
    ///
    /// Only `last_retransmission_time` entries are purged. The attempt
    /// counter is permanent, capped state per packet number: dropping it
    /// here would let a packet that already hit `max_retransmissions` earn
    /// fresh attempts just because a later `cleanup` call aged its last
    /// timestamp out, defeating the cap on a long-running connection.
    pub fn cleanup(&mut self, cutoff: Timestamp) {
        self.last_retransmission_time.retain(|_, &mut t| t >= cutoff);
    }

    /// Total retransmission attempts registered across all packets.
    #[must_use]
    pub const fn total_retransmissions(&self) -> u64 {
        self.total_retransmissions
    }

    fn register_attempt(&mut self, n: PacketNumber, now: Timestamp) {
        let counter = self.attempts.entry(n).or_insert(0);
        if *counter >= self.config.max_retransmissions {
            debug!(packet_number = n, "retransmission cap reached, dropping");
            return;
        }
        *counter += 1;
        self.last_retransmission_time.insert(n, now);
        self.total_retransmissions += 1;
    }
}
