//! Time and identifier primitives shared across the recovery core.
//!
//! The core never reads a clock itself: every entry point takes `now` as a
//! parameter, and every stored timestamp is whatever the caller passed in.
//! This is what makes the core replayable under virtual time.

/// A monotonic millisecond timestamp supplied by the caller.
///
/// `0.0` never occurs on a real clock reading in practice, so it doubles as
/// the "unset"/"disarmed" sentinel for timers throughout this crate.
pub type Timestamp = f64;

/// A packet number once it has passed the `>= 0` boundary check.
///
/// Packet numbers are monotonic and dense, so storage keyed by this type can
/// be swapped for a ring buffer indexed by `n % capacity` without changing
/// any external behavior; this crate uses associative maps for clarity,
/// since the core's working set is expected to stay small between
/// `cleanup` calls.
pub type PacketNumber = u64;

/// An opaque handle to packet contents.
///
/// The recovery core only ever needs to know how large a packet's payload
/// was, for retransmission/backoff bookkeeping; it never inspects payload
/// contents. Callers implement this for whatever type they already use to
/// represent an outbound packet buffer.
pub trait Payload {
    /// Size of the payload, in bytes.
    fn size_in_bytes(&self) -> usize;
}

impl Payload for usize {
    fn size_in_bytes(&self) -> usize {
        *self
    }
}

impl Payload for () {
    fn size_in_bytes(&self) -> usize {
        0
    }
}

/// Validate a caller-supplied packet number against the `n >= 0` boundary.
pub(crate) fn validate_packet_number(n: i64) -> crate::error::Result<PacketNumber> {
    if n < 0 {
        return Err(crate::error::RecoveryError::InvalidPacketNumber { packet_number: n });
    }
    Ok(n as u64)
}
