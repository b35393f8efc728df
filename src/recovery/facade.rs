//! Component E: the Recovery facade.
//!
//! Single entry point that sequences the RTT Estimator (A), Packet Tracker
//! (B), Loss Detector (C), ACK Manager (D), and Retransmission Manager (F)
//! behind one call surface, mirroring the way the transport crate's
//! `Transport`/`TransportHandle` pair composes its congestion controller,
//! loss manager, and framing layer into one facade.

use tracing::{info, instrument};

use crate::error::Result;
use crate::recovery::ack::{AckFrame, AckManager};
use crate::recovery::config::RecoveryConfig;
use crate::recovery::loss::LossDetector;
use crate::recovery::retransmission::{ProbeRecord, PtoOutcome, RetransmissionManager};
use crate::recovery::rtt::RttEstimator;
use crate::recovery::tracker::PacketTracker;
use crate::time::{PacketNumber, Payload, Timestamp};

/// One unit of work the caller must act on after `on_timeout`.
#[derive(Debug, Clone, PartialEq)]
pub enum Action<P> {
    /// Packets declared lost by the packet/time threshold; resend their data.
    RetransmitLost {
        /// Lost packet numbers.
        packets: Vec<PacketNumber>,
    },
    /// A PTO fired; resend these probe packets.
    PtoProbe {
        /// Probe records carrying the original payload.
        records: Vec<ProbeRecord<P>>,
    },
    /// An ACK is due; send this frame.
    SendAck {
        /// The frame to send.
        frame: AckFrame,
    },
}

/// Point-in-time snapshot of every component's counters.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryStats {
    /// RTT estimator readout: (smoothed_rtt, rtt_variation, min_rtt, latest_rtt, sample_count).
    pub rtt: (f64, f64, f64, f64, u64),
    /// Packet tracker readout: (largest_sent, largest_acked, outstanding).
    pub packet_tracker: (i64, i64, u64),
    /// Loss detector readout: (pto_count, loss_time, is_in_persistent_congestion).
    pub loss_detection: (u32, f64, bool),
    /// ACK manager readout: (largest_received, has_pending_ack).
    pub ack_manager: (i64, bool),
    /// Retransmission manager readout: (total_retransmissions, retransmission_rate).
    pub retransmission: (u64, f64),
    /// Deadline at which `on_timeout` should next be called, 0 if disarmed.
    pub next_timeout: Timestamp,
}

/// Broad classification of connection health for upstream congestion/backoff decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CongestionAdvice {
    /// No signal of sustained loss.
    Normal,
    /// Retransmission rate has crossed the advisory threshold.
    HighLossRate,
    /// Retransmission Manager reports a sustained storm.
    RetransmissionStorm,
    /// Loss Detector reports persistent congestion.
    PersistentCongestion,
}

/// The composed loss-detection and recovery core for one QUIC packet-number space.
#[derive(Debug)]
pub struct Recovery<P> {
    config: RecoveryConfig,
    initial_rtt_ms: Timestamp,
    rtt: RttEstimator,
    tracker: PacketTracker<P>,
    loss: LossDetector,
    ack_manager: AckManager,
    retransmission: RetransmissionManager,
    next_timeout: Timestamp,
}

impl<P> Recovery<P>
where
    P: Payload + Clone,
{
    /// Create a new facade with the given initial RTT (milliseconds) and configuration.
    #[must_use]
    pub fn new(initial_rtt_ms: f64, config: RecoveryConfig) -> Self {
        Self {
            config,
            initial_rtt_ms,
            rtt: RttEstimator::new(initial_rtt_ms, config),
            tracker: PacketTracker::new(),
            loss: LossDetector::new(config),
            ack_manager: AckManager::new(config.ack_frequency_threshold, config.max_ack_delay_ms),
            retransmission: RetransmissionManager::new(config),
            next_timeout: 0.0,
        }
    }

    /// Create a new facade using the configured default initial RTT.
    #[must_use]
    pub fn with_config(config: RecoveryConfig) -> Self {
        Self::new(config.initial_rtt_ms, config)
    }

    /// Record an outbound packet and rearm the loss-detection timer.
    #[instrument(skip(self, payload))]
    pub fn on_packet_sent(
        &mut self,
        number: i64,
        payload: P,
        sent_time: Timestamp,
        ack_eliciting: bool,
    ) -> Result<()> {
        self.tracker
            .on_packet_sent(number, payload, sent_time, ack_eliciting)?;
        self.recompute_next_timeout(sent_time);
        Ok(())
    }

    /// Record an inbound data packet's receipt.
    pub fn on_packet_received(
        &mut self,
        number: i64,
        recv_time: Timestamp,
        ack_eliciting: bool,
    ) -> Result<()> {
        self.ack_manager
            .on_packet_received(number, recv_time, ack_eliciting)
    }

    /// Fold a peer-reported ACK of our sent packets into every dependent component.
    #[instrument(skip(self, ack_frame))]
    pub fn on_ack_received(&mut self, ack_frame: &AckFrame, ack_time: Timestamp) {
        self.retransmission.on_ack_received(
            &mut self.tracker,
            &mut self.loss,
            &mut self.rtt,
            ack_frame,
            ack_time,
        );
        self.recompute_next_timeout(ack_time);
    }

    /// Whether an ACK for received data packets should be sent right now.
    #[must_use]
    pub fn should_send_ack_immediately(&self, now: Timestamp) -> bool {
        self.ack_manager.should_send_ack_immediately(now)
    }

    /// Build an ACK frame for received data packets, if any are pending.
    pub fn generate_ack_frame(&mut self, now: Timestamp) -> Option<AckFrame> {
        self.ack_manager.generate_ack_frame(now)
    }

    /// Resolve a firing timer into the list of actions the caller must perform.
    #[instrument(skip(self))]
    pub fn on_timeout(&mut self, now: Timestamp) -> Vec<Action<P>> {
        let mut actions = Vec::new();

        if self.next_timeout > 0.0 && now >= self.next_timeout {
            match self
                .retransmission
                .on_pto_timeout(&mut self.tracker, &mut self.loss, &self.rtt, now)
            {
                PtoOutcome::LossDetection { packets } if !packets.is_empty() => {
                    actions.push(Action::RetransmitLost { packets });
                }
                PtoOutcome::LossDetection { .. } => {}
                PtoOutcome::Probe { records } => {
                    actions.push(Action::PtoProbe { records });
                }
            }
            self.recompute_next_timeout(now);
        }

        if self.ack_manager.has_pending_ack()
            && self.ack_manager.ack_timeout() > 0.0
            && now >= self.ack_manager.ack_timeout()
        {
            if let Some(frame) = self.ack_manager.generate_ack_frame(now) {
                actions.push(Action::SendAck { frame });
            }
        }

        actions
    }

    /// Purge acknowledged, stale-received, and stale-retransmission bookkeeping.
    pub fn cleanup(&mut self, now: Timestamp) {
        self.tracker.cleanup_acked_packets();
        let cutoff = now - self.config.cleanup_age_ms;
        self.ack_manager.cleanup_old_records(cutoff);
        self.retransmission.cleanup(cutoff);
    }

    /// Reset every component to its construction defaults.
    pub fn reset(&mut self) {
        *self = Self::new(self.initial_rtt_ms, self.config);
    }

    /// Deadline at which `on_timeout` should next be invoked, or `0.0` if disarmed.
    #[must_use]
    pub const fn next_timeout(&self) -> Timestamp {
        self.next_timeout
    }

    /// Lost packets still eligible for retransmission.
    pub fn get_packets_for_retransmission(
        &self,
    ) -> Vec<crate::recovery::retransmission::RetxRecord> {
        self.retransmission.get_packets_for_retransmission(&self.tracker)
    }

    /// Snapshot every component's counters.
    #[must_use]
    pub fn stats(&self) -> RecoveryStats {
        RecoveryStats {
            rtt: (
                self.rtt.smoothed_rtt(),
                self.rtt.rtt_variation(),
                self.rtt.min_rtt(),
                self.rtt.latest_rtt(),
                self.rtt.sample_count(),
            ),
            packet_tracker: (
                self.tracker.largest_sent(),
                self.tracker.largest_acked(),
                self.tracker.outstanding(),
            ),
            loss_detection: (
                self.loss.pto_count(),
                self.loss.loss_time(),
                self.loss.is_in_persistent_congestion(),
            ),
            ack_manager: (self.ack_manager.largest_received(), self.ack_manager.has_pending_ack()),
            retransmission: (
                self.retransmission.total_retransmissions(),
                self.retransmission.retransmission_rate(&self.tracker),
            ),
            next_timeout: self.next_timeout,
        }
    }

    /// Classify overall connection health for an upstream congestion controller.
    #[must_use]
    pub fn congestion_advice(&self) -> CongestionAdvice {
        if self.loss.is_in_persistent_congestion() {
            CongestionAdvice::PersistentCongestion
        } else if self.retransmission.is_in_retransmission_storm(&self.tracker) {
            CongestionAdvice::RetransmissionStorm
        } else if self.retransmission.retransmission_rate(&self.tracker) > 0.1 {
            CongestionAdvice::HighLossRate
        } else {
            CongestionAdvice::Normal
        }
    }

    /// Convenience wrapper: `true` iff `congestion_advice() == Normal`.
    #[must_use]
    pub fn is_connection_healthy(&self) -> bool {
        matches!(self.congestion_advice(), CongestionAdvice::Normal)
    }

    fn recompute_next_timeout(&mut self, now: Timestamp) {
        let deadline = self
            .loss
            .calculate_loss_detection_timeout(&self.tracker, &self.rtt, now);
        self.next_timeout = deadline;
        if deadline > 0.0 {
            info!(deadline, "loss detection timer armed");
        }
    }
}
