//! Component C: loss and PTO detection (RFC 9002 §6).
//!
//! Decides which outstanding packets are lost using packet-number and time
//! thresholds, and arms the Probe Timeout. Depends on the RTT Estimator (A)
//! for the time threshold and on the Packet Tracker (B) for the candidate
//! set. Grounded in the transport crate's
//! `LossManager::detect_losses`/`on_loss_timeout`, split
//! into its own component and extended with PTO/persistent-congestion
//! bookkeeping the way `s2n-quic-core`'s `recovery::pto` and
//! `recovery::persistent_congestion` modules separate that concern from
//! loss detection proper.

use tracing::debug;

use crate::recovery::config::RecoveryConfig;
use crate::recovery::rtt::RttEstimator;
use crate::recovery::tracker::PacketTracker;
use crate::time::{PacketNumber, Timestamp};

/// Result of a loss-detection sweep.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DetectionResult {
    /// Packet numbers newly declared lost in this sweep.
    pub lost: Vec<PacketNumber>,
    /// Earliest time a future time-threshold loss could fire, or `0.0` if none is pending.
    pub next_loss_time: Timestamp,
}

/// What a loss-detection timer firing resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeoutAction {
    /// The loss timer fired: these packets are newly lost.
    LossDetection {
        /// Packet numbers declared lost.
        packets: Vec<PacketNumber>,
    },
    /// The PTO fired: these packets (up to two, oldest first) should be probed.
    PtoProbe {
        /// Candidate packet numbers to retransmit as probes.
        packets: Vec<PacketNumber>,
    },
}

/// Tracks PTO backoff and the pending time-threshold loss deadline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossDetector {
    config: RecoveryConfig,
    pto_count: u32,
    loss_time: Timestamp,
}

impl LossDetector {
    /// Create a new detector with no PTO backoff and no pending loss time.
    #[must_use]
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            config,
            pto_count: 0,
            loss_time: 0.0,
        }
    }

    /// The time threshold above which an outstanding packet older than
    /// `largest_acked` is declared lost.
    #[must_use]
    pub fn loss_delay(&self, rtt: &RttEstimator) -> f64 {
        let basis = rtt.loss_delay_basis();
        let scaled = basis * f64::from(self.config.time_threshold_numerator)
            / f64::from(self.config.time_threshold_denominator);
        scaled.max(self.config.min_time_threshold_ms)
    }

    /// Sweep in-flight packets for packet-number/time-threshold loss.
    ///
    /// Returns an empty result if no packet has been acknowledged yet.
    /// Every lost packet is marked in `tracker` during this same pass.
    pub fn detect_lost_packets<P>(
        &mut self,
        tracker: &mut PacketTracker<P>,
        rtt: &RttEstimator,
        now: Timestamp,
    ) -> DetectionResult {
        let largest_acked = tracker.largest_acked();
        if largest_acked < 0 {
            return DetectionResult::default();
        }
        let largest_acked = largest_acked as u64;

        let loss_delay = self.loss_delay(rtt);
        let packet_threshold = self.config.packet_threshold;

        let mut lost = Vec::new();
        let mut next_loss_time: Option<Timestamp> = None;

        let candidates: Vec<(PacketNumber, Timestamp)> = tracker
            .get_unacked_packets()
            .map(|r| (r.packet_number(), r.sent_time()))
            .collect();

        for (n, sent_time) in candidates {
            if largest_acked >= n && largest_acked - n >= packet_threshold {
                lost.push(n);
                continue;
            }

            if now - sent_time >= loss_delay {
                lost.push(n);
                continue;
            }

            let expected = sent_time + loss_delay;
            next_loss_time = Some(next_loss_time.map_or(expected, |t| t.min(expected)));
        }

        lost.sort_unstable();
        for &n in &lost {
            tracker.on_packet_lost(n);
        }

        self.loss_time = next_loss_time.unwrap_or(0.0);

        if !lost.is_empty() {
            debug!(count = lost.len(), "packets declared lost");
        }

        DetectionResult {
            lost,
            next_loss_time: self.loss_time,
        }
    }

    /// Compute when the loss-detection timer should next fire.
    ///
    /// `0.0` means disarmed (nothing outstanding).
    pub fn calculate_loss_detection_timeout<P>(
        &self,
        tracker: &PacketTracker<P>,
        rtt: &RttEstimator,
        now: Timestamp,
    ) -> Timestamp {
        if self.loss_time > 0.0 && self.loss_time > now {
            return self.loss_time;
        }

        if tracker.outstanding() == 0 {
            return 0.0;
        }

        let base_pto = rtt
            .calculate_pto(self.pto_count as i64)
            .unwrap_or_else(|_| rtt.calculate_pto(0).unwrap_or(0.0));

        let last_sent = tracker.time_of_last_sent_ack_eliciting();
        if last_sent == 0.0 {
            now + base_pto
        } else {
            last_sent + base_pto
        }
    }

    /// Resolve a firing loss-detection timer into a loss sweep or a PTO probe.
    pub fn on_loss_detection_timeout<P>(
        &mut self,
        tracker: &mut PacketTracker<P>,
        rtt: &RttEstimator,
        now: Timestamp,
    ) -> TimeoutAction {
        if self.loss_time > 0.0 && now >= self.loss_time {
            let result = self.detect_lost_packets(tracker, rtt, now);
            return TimeoutAction::LossDetection {
                packets: result.lost,
            };
        }

        self.pto_count += 1;
        debug!(pto_count = self.pto_count, "probe timeout fired");

        let mut candidates: Vec<_> = tracker
            .get_unacked_packets()
            .filter(|r| r.ack_eliciting())
            .map(|r| (r.sent_time(), r.packet_number()))
            .collect();
        candidates.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        let packets = candidates
            .into_iter()
            .take(2)
            .map(|(_, n)| n)
            .collect::<Vec<_>>();

        TimeoutAction::PtoProbe { packets }
    }

    /// Reset PTO backoff after a successful ACK.
    pub fn on_ack_received(&mut self) {
        self.pto_count = 0;
    }

    /// Whether repeated PTO firings indicate persistent congestion.
    #[must_use]
    pub fn is_in_persistent_congestion(&self) -> bool {
        self.pto_count >= self.config.persistent_congestion_pto_count
    }

    /// Current PTO backoff count.
    #[must_use]
    pub const fn pto_count(&self) -> u32 {
        self.pto_count
    }

    /// Pending time-threshold loss deadline, or `0.0` if none.
    #[must_use]
    pub const fn loss_time(&self) -> Timestamp {
        self.loss_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (LossDetector, RttEstimator, PacketTracker<usize>) {
        let config = RecoveryConfig::default();
        (
            LossDetector::new(config),
            RttEstimator::with_config(config),
            PacketTracker::new(),
        )
    }

    #[test]
    fn no_acks_yields_no_loss() {
        let (mut loss, rtt, mut tracker) = setup();
        tracker.on_packet_sent(1, 100, 1000.0, true).unwrap();
        let result = loss.detect_lost_packets(&mut tracker, &rtt, 2000.0);
        assert!(result.lost.is_empty());
        assert_eq!(result.next_loss_time, 0.0);
    }

    #[test]
    fn packet_threshold_declares_distant_unacked_lost() {
        let (mut loss, rtt, mut tracker) = setup();
        for n in 1..=5 {
            tracker.on_packet_sent(n, 100, 1000.0, true).unwrap();
        }
        tracker.on_ack_received(&[(5, 5)], 1005.0);
        let result = loss.detect_lost_packets(&mut tracker, &rtt, 1005.0);
        assert_eq!(result.lost, vec![1, 2]);
        assert!(tracker.is_lost(1));
        assert!(!tracker.is_lost(3));
    }

    #[test]
    fn time_threshold_declares_old_unacked_lost() {
        let (mut loss, mut rtt, mut tracker) = setup();
        rtt.update_rtt(10.0, 0.0).unwrap();
        tracker.on_packet_sent(1, 100, 1000.0, true).unwrap();
        tracker.on_packet_sent(2, 100, 1000.0, true).unwrap();
        tracker.on_ack_received(&[(2, 2)], 1005.0);
        // loss_delay ~= 9/8 * 10 = 11.25ms; at now=1020 packet 1 (sent 1000) has
        // waited 20ms, well past it, despite distance-1 not tripping the
        // packet threshold.
        let result = loss.detect_lost_packets(&mut tracker, &rtt, 1020.0);
        assert_eq!(result.lost, vec![1]);
    }

    #[test]
    fn pto_increments_and_reaches_persistent_congestion() {
        let (mut loss, rtt, mut tracker) = setup();
        tracker.on_packet_sent(1, 100, 900.0, true).unwrap();

        for expected in 1..=3 {
            let action = loss.on_loss_detection_timeout(&mut tracker, &rtt, 2000.0);
            assert!(matches!(action, TimeoutAction::PtoProbe { .. }));
            assert_eq!(loss.pto_count(), expected);
        }
        assert!(loss.is_in_persistent_congestion());
    }

    #[test]
    fn ack_resets_pto_count() {
        let (mut loss, rtt, mut tracker) = setup();
        tracker.on_packet_sent(1, 100, 900.0, true).unwrap();
        loss.on_loss_detection_timeout(&mut tracker, &rtt, 2000.0);
        assert_eq!(loss.pto_count(), 1);
        loss.on_ack_received();
        assert_eq!(loss.pto_count(), 0);
    }

    #[test]
    fn pto_probe_selects_up_to_two_oldest_ack_eliciting() {
        let (mut loss, rtt, mut tracker) = setup();
        tracker.on_packet_sent(1, 100, 1003.0, true).unwrap();
        tracker.on_packet_sent(2, 100, 1001.0, true).unwrap();
        tracker.on_packet_sent(3, 100, 1002.0, true).unwrap();
        tracker.on_packet_sent(4, 100, 1000.0, false).unwrap();

        let action = loss.on_loss_detection_timeout(&mut tracker, &rtt, 5000.0);
        match action {
            TimeoutAction::PtoProbe { packets } => assert_eq!(packets, vec![2, 3]),
            _ => panic!("expected PtoProbe"),
        }
    }
}
