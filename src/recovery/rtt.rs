//! Component A: RTT estimation (RFC 9002 §5).
//!
//! Maintains the smoothed RTT, RTT variance, and minimum RTT, and derives
//! the Probe Timeout (PTO) from them. Grounded in the transport crate's
//! `LossManager::update_rtt_estimates`, restructured as its own component
//! and switched from `Duration` arithmetic to plain `f64` milliseconds so
//! the estimator never touches a clock type — `now` is always an
//! externally supplied `f64`, and RTT samples/derived deadlines follow the
//! same representation for uniformity.

use tracing::trace;

use crate::error::{RecoveryError, Result};
use crate::recovery::config::RecoveryConfig;

/// Tracks smoothed RTT, RTT variance, and minimum RTT for one path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RttEstimator {
    config: RecoveryConfig,
    initial_rtt_ms: f64,
    smoothed_rtt: f64,
    rtt_variation: f64,
    min_rtt: f64,
    latest_rtt: f64,
    sample_count: u64,
}

impl RttEstimator {
    /// Create a new estimator with the given initial RTT (milliseconds).
    #[must_use]
    pub fn new(initial_rtt_ms: f64, config: RecoveryConfig) -> Self {
        Self {
            config,
            initial_rtt_ms,
            smoothed_rtt: initial_rtt_ms,
            rtt_variation: initial_rtt_ms / 2.0,
            min_rtt: initial_rtt_ms,
            latest_rtt: initial_rtt_ms,
            sample_count: 0,
        }
    }

    /// Create a new estimator using the configured default initial RTT.
    #[must_use]
    pub fn with_config(config: RecoveryConfig) -> Self {
        Self::new(config.initial_rtt_ms, config)
    }

    /// Feed a fresh RTT sample, optionally adjusted for a peer-reported ACK delay.
    ///
    /// `sample_ms` must be strictly positive. `ack_delay_ms` is ignored (per
    /// RFC 9002) when it exceeds `max_ack_delay_ms`, and clamped at zero
    /// otherwise so it never pushes the adjusted sample below `min_rtt`.
    pub fn update_rtt(&mut self, sample_ms: f64, ack_delay_ms: f64) -> Result<()> {
        if !(sample_ms > 0.0) {
            return Err(RecoveryError::InvalidRttSample {
                sample_ms,
            });
        }

        self.latest_rtt = sample_ms;
        if sample_ms < self.min_rtt {
            self.min_rtt = sample_ms;
        }

        let adjusted = if ack_delay_ms > 0.0 && ack_delay_ms <= self.config.max_ack_delay_ms {
            (sample_ms - ack_delay_ms).max(self.min_rtt)
        } else {
            sample_ms
        };

        if self.sample_count == 0 {
            self.smoothed_rtt = adjusted;
            self.rtt_variation = adjusted / 2.0;
        } else {
            self.rtt_variation =
                0.75 * self.rtt_variation + 0.25 * (self.smoothed_rtt - adjusted).abs();
            self.smoothed_rtt = 0.875 * self.smoothed_rtt + 0.125 * adjusted;
        }
        self.sample_count += 1;

        trace!(
            sample_ms,
            ack_delay_ms,
            smoothed_rtt = self.smoothed_rtt,
            rtt_variation = self.rtt_variation,
            "rtt sample applied"
        );

        Ok(())
    }

    /// Compute the PTO period for the given backoff count.
    ///
    /// `calculate_pto(k) == calculate_pto(0) * 2^k` exactly, for `k >= 0`.
    pub fn calculate_pto(&self, pto_count: i64) -> Result<f64> {
        if pto_count < 0 {
            return Err(RecoveryError::InvalidPtoCount { pto_count });
        }

        let base = self.smoothed_rtt
            + (4.0 * self.rtt_variation).max(self.config.timer_granularity_ms)
            + self.config.max_ack_delay_ms;

        let multiplier = 2f64.powi(pto_count as i32);
        Ok(base * multiplier)
    }

    /// Reset all fields to their construction defaults.
    pub fn reset(&mut self) {
        *self = Self::new(self.initial_rtt_ms, self.config);
    }

    /// Latest RTT sample observed.
    #[must_use]
    pub const fn latest_rtt(&self) -> f64 {
        self.latest_rtt
    }

    /// Smoothed RTT estimate.
    #[must_use]
    pub const fn smoothed_rtt(&self) -> f64 {
        self.smoothed_rtt
    }

    /// RTT variance estimate.
    #[must_use]
    pub const fn rtt_variation(&self) -> f64 {
        self.rtt_variation
    }

    /// Minimum RTT observed, clamped to the configured floor.
    ///
    /// The internal field may dip below the floor transiently; every
    /// external reader clamps.
    #[must_use]
    pub fn min_rtt(&self) -> f64 {
        self.min_rtt.max(self.config.min_rtt_floor_ms)
    }

    /// Number of RTT samples applied so far.
    #[must_use]
    pub const fn sample_count(&self) -> u64 {
        self.sample_count
    }

    pub(crate) fn loss_delay_basis(&self) -> f64 {
        self.latest_rtt.max(self.smoothed_rtt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> RttEstimator {
        RttEstimator::with_config(RecoveryConfig::default())
    }

    // S1 — RTT bootstrap.
    #[test]
    fn bootstrap_sets_smoothed_and_variation() {
        let mut rtt = estimator();
        rtt.update_rtt(200.0, 0.0).unwrap();
        assert_eq!(rtt.smoothed_rtt(), 200.0);
        assert_eq!(rtt.rtt_variation(), 100.0);
        assert_eq!(rtt.min_rtt(), 200.0);
        assert_eq!(rtt.sample_count(), 1);
    }

    // S6 — ACK delay ignored when it exceeds MAX_ACK_DELAY.
    #[test]
    fn excessive_ack_delay_is_ignored() {
        let mut rtt = estimator();
        rtt.update_rtt(100.0, 50.0).unwrap();
        assert_eq!(rtt.latest_rtt(), 100.0);
        assert_eq!(rtt.smoothed_rtt(), 100.0);
    }

    #[test]
    fn invalid_sample_is_rejected() {
        let mut rtt = estimator();
        assert!(matches!(
            rtt.update_rtt(0.0, 0.0),
            Err(RecoveryError::InvalidRttSample { .. })
        ));
        assert!(matches!(
            rtt.update_rtt(-5.0, 0.0),
            Err(RecoveryError::InvalidRttSample { .. })
        ));
    }

    // S7 (property 7) — calculate_pto(k) == calculate_pto(0) * 2^k.
    #[test]
    fn pto_doubles_with_backoff() {
        let mut rtt = estimator();
        rtt.update_rtt(100.0, 0.0).unwrap();
        let base = rtt.calculate_pto(0).unwrap();
        for k in 0..8 {
            let got = rtt.calculate_pto(k).unwrap();
            assert!((got - base * 2f64.powi(k as i32)).abs() < 1e-9);
        }
    }

    #[test]
    fn negative_pto_count_is_rejected() {
        let rtt = estimator();
        assert!(matches!(
            rtt.calculate_pto(-1),
            Err(RecoveryError::InvalidPtoCount { pto_count: -1 })
        ));
    }

    #[test]
    fn reset_restores_construction_defaults() {
        let mut rtt = estimator();
        rtt.update_rtt(10.0, 0.0).unwrap();
        rtt.update_rtt(500.0, 0.0).unwrap();
        rtt.reset();
        assert_eq!(rtt.sample_count(), 0);
        assert_eq!(rtt.smoothed_rtt(), rtt.initial_rtt_ms);
    }

    #[test]
    fn min_rtt_floor_is_enforced() {
        let mut rtt = estimator();
        rtt.update_rtt(0.1, 0.0).unwrap();
        assert!(rtt.min_rtt() >= 1.0);
    }
}
