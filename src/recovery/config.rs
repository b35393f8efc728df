//! Tunable constants for the recovery core.
//!
//! Following the transport crate's convention for its own tunables
//! (`LossConfig`, `CongestionConfig`), every hardcoded RFC 9002 constant is
//! exposed here as a field with a `Default` that reproduces the documented
//! values literally. Passing a non-default `RecoveryConfig` does not
//! change any documented formula, only the numbers that feed it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecoveryConfig {
    /// Initial RTT assumed before any sample is observed (ms). Default 333.
    pub initial_rtt_ms: f64,
    /// Floor applied when reporting `min_rtt` (ms). Default 1.
    pub min_rtt_floor_ms: f64,
    /// ACK delays larger than this are ignored when adjusting an RTT sample (ms). Default 25.
    pub max_ack_delay_ms: f64,
    /// Timer granularity used in the PTO base calculation (ms). Default 1.
    pub timer_granularity_ms: f64,
    /// Packet-number distance past which an unacked packet is declared lost. Default 3.
    pub packet_threshold: u64,
    /// Numerator of the time-threshold multiplier. Default 9.
    pub time_threshold_numerator: u32,
    /// Denominator of the time-threshold multiplier. Default 8 (so 9/8).
    pub time_threshold_denominator: u32,
    /// Floor applied to the computed loss delay (ms). Default 1.
    pub min_time_threshold_ms: f64,
    /// Number of PTO firings that indicate persistent congestion. Default 3.
    pub persistent_congestion_pto_count: u32,
    /// Number of ack-eliciting packets received before an ACK is sent immediately. Default 2.
    pub ack_frequency_threshold: u32,
    /// Maximum number of retransmission attempts per packet before it is dropped. Default 5.
    pub max_retransmissions: u32,
    /// Base of the exponential retransmission backoff. Default 2.
    pub backoff_base: f64,
    /// Age past which `cleanup` purges received/retransmission bookkeeping (ms). Default 300_000.
    pub cleanup_age_ms: f64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            initial_rtt_ms: 333.0,
            min_rtt_floor_ms: 1.0,
            max_ack_delay_ms: 25.0,
            timer_granularity_ms: 1.0,
            packet_threshold: 3,
            time_threshold_numerator: 9,
            time_threshold_denominator: 8,
            min_time_threshold_ms: 1.0,
            persistent_congestion_pto_count: 3,
            ack_frequency_threshold: 2,
            max_retransmissions: 5,
            backoff_base: 2.0,
            cleanup_age_ms: 300_000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_literals() {
        let config = RecoveryConfig::default();
        assert_eq!(config.initial_rtt_ms, 333.0);
        assert_eq!(config.packet_threshold, 3);
        assert_eq!(config.persistent_congestion_pto_count, 3);
        assert_eq!(config.max_retransmissions, 5);
    }
}
