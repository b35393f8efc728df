//! Error types for the recovery core.

use thiserror::Error;

/// Errors the recovery core can raise.
///
/// These are the only three conditions treated as programmer errors;
/// every other malformed or adversarial input (duplicate ACKs,
/// re-marking an already-acknowledged packet as lost, ACKing an unknown
/// packet number, ...) is absorbed silently as a documented no-op.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryError {
    /// `update_rtt` was called with a sample that was not strictly positive.
    #[error("invalid RTT sample: {sample_ms} ms (must be > 0)")]
    InvalidRttSample {
        /// The rejected sample, in milliseconds.
        sample_ms: f64,
    },

    /// `calculate_pto` was called with a negative PTO count.
    #[error("invalid PTO count: {pto_count} (must be >= 0)")]
    InvalidPtoCount {
        /// The rejected count.
        pto_count: i64,
    },

    /// `on_packet_sent`/`on_packet_received` was called with a negative packet number.
    #[error("invalid packet number: {packet_number} (must be >= 0)")]
    InvalidPacketNumber {
        /// The rejected packet number.
        packet_number: i64,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, RecoveryError>;
