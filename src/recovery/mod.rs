//! RFC 9002 loss detection and recovery core.
//!
//! Six components, leaves first per their dependency order: the RTT
//! Estimator and Packet Tracker depend on nothing; the Loss Detector
//! depends on both; the ACK Manager is independent; the Retransmission
//! Manager depends on all four; the facade composes everything behind one
//! call surface.

mod ack;
mod config;
mod facade;
mod loss;
mod retransmission;
mod rtt;
mod tracker;

pub use ack::{AckFrame, AckManager, AckRange};
pub use config::RecoveryConfig;
pub use facade::{Action, CongestionAdvice, Recovery, RecoveryStats};
pub use loss::{DetectionResult, LossDetector, TimeoutAction};
pub use retransmission::{ProbeRecord, PtoOutcome, RetransmissionManager, RetxRecord};
pub use rtt::RttEstimator;
pub use tracker::{AckFoldOutcome, PacketTracker, SentPacketRecord};
