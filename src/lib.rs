//! quic-recovery — RFC 9002 loss detection and recovery core for a QUIC endpoint.
//!
//! This crate implements the loss-detection and recovery state machine that
//! sits beneath a QUIC connection: RTT estimation, sent-packet tracking,
//! packet/time-threshold loss detection, probe timeouts, local-ACK
//! accounting, and retransmission bookkeeping. It owns no socket, no wire
//! codec, and no clock — every timestamp is supplied by the caller as a
//! monotonic millisecond `f64`, which makes the whole core deterministic
//! under replay.
//!
//! # Quick Start
//!
//! ```rust
//! use quic_recovery::{Recovery, RecoveryConfig};
//!
//! let mut recovery: Recovery<usize> = Recovery::with_config(RecoveryConfig::default());
//! recovery.on_packet_sent(0, 1200, 1000.0, true)?;
//! let deadline = recovery.next_timeout();
//! assert!(deadline > 1000.0);
//! # Ok::<(), quic_recovery::RecoveryError>(())
//! ```
//!
//! # Scope
//!
//! Out of scope, and treated as external collaborators: UDP I/O, packet
//! encoding/decoding, the cryptographic handshake, congestion-window
//! adjustment, stream framing, and the connection state machine.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod recovery;
pub mod time;

pub use error::{RecoveryError, Result};
pub use recovery::{
    Action, AckFoldOutcome, AckFrame, AckManager, AckRange, CongestionAdvice, DetectionResult,
    LossDetector, PacketTracker, ProbeRecord, PtoOutcome, Recovery, RecoveryConfig, RecoveryStats,
    RetransmissionManager, RetxRecord, RttEstimator, SentPacketRecord, TimeoutAction,
};
pub use time::{PacketNumber, Payload, Timestamp};
