//! Property-based tests for the recovery core's cross-call invariants.
//!
//! These generate random but valid operation sequences and check properties
//! that must hold for *every* such sequence, rather than one literal
//! scenario at a time.

use proptest::prelude::*;
use quic_recovery::{AckFrame, AckManager, PacketTracker, RecoveryConfig, RttEstimator};

fn packet_number_strategy() -> impl Strategy<Value = u64> {
    0u64..200
}

proptest! {
    /// Invariant 1: `outstanding` equals the exact count of in-flight,
    /// ack-eliciting records after any sequence of sends, acks, and losses.
    #[test]
    fn outstanding_matches_in_flight_ack_eliciting_count(
        sent in prop::collection::vec((packet_number_strategy(), any::<bool>()), 1..40),
        ack_ranges in prop::collection::vec((packet_number_strategy(), packet_number_strategy()), 0..10),
    ) {
        let mut tracker: PacketTracker<usize> = PacketTracker::new();
        for (i, (n, ack_eliciting)) in sent.iter().enumerate() {
            tracker.on_packet_sent(*n as i64, 100, 1000.0 + i as f64, *ack_eliciting).unwrap();
        }
        for (a, b) in &ack_ranges {
            let (lo, hi) = (*a.min(b), *a.max(b));
            tracker.on_ack_received(&[(lo, hi)], 5000.0);
        }

        let expected = tracker.get_unacked_packets().filter(|r| r.ack_eliciting()).count() as u64;
        prop_assert_eq!(tracker.outstanding(), expected);
    }

    /// Invariant 2 (partial): `largest_sent` and `largest_acked` never
    /// decrease as more sends/acks are folded in, regardless of order.
    #[test]
    fn largest_sent_and_acked_are_non_decreasing(
        sent in prop::collection::vec(packet_number_strategy(), 1..40),
        ack_ranges in prop::collection::vec((packet_number_strategy(), packet_number_strategy()), 0..10),
    ) {
        let mut tracker: PacketTracker<usize> = PacketTracker::new();
        let mut prev_sent = -1i64;
        let mut prev_acked = -1i64;

        for (i, n) in sent.iter().enumerate() {
            tracker.on_packet_sent(*n as i64, 100, 1000.0 + i as f64, true).unwrap();
            prop_assert!(tracker.largest_sent() >= prev_sent);
            prev_sent = tracker.largest_sent();
        }
        for (a, b) in &ack_ranges {
            let (lo, hi) = (*a.min(b), *a.max(b));
            tracker.on_ack_received(&[(lo, hi)], 5000.0);
            prop_assert!(tracker.largest_acked() >= prev_acked);
            prev_acked = tracker.largest_acked();
        }
    }

    /// Invariant 3 & 4: status is monotonic and never both acked and lost.
    #[test]
    fn acked_and_lost_are_mutually_exclusive_and_terminal(
        n in packet_number_strategy(),
        ack_first in any::<bool>(),
    ) {
        let mut tracker: PacketTracker<usize> = PacketTracker::new();
        tracker.on_packet_sent(n as i64, 100, 1000.0, true).unwrap();

        if ack_first {
            tracker.on_ack_received(&[(n, n)], 1010.0);
            tracker.on_packet_lost(n);
            prop_assert!(tracker.is_acked(n));
            prop_assert!(!tracker.is_lost(n));
        } else {
            tracker.on_packet_lost(n);
            tracker.on_ack_received(&[(n, n)], 1010.0);
            prop_assert!(tracker.is_lost(n));
            prop_assert!(!tracker.is_acked(n));
        }
        prop_assert!(!(tracker.is_acked(n) && tracker.is_lost(n)));
    }

    /// Invariant 5: a single RTT sample moves `smoothed_rtt` by at most
    /// 0.125 of the distance to the adjusted sample.
    #[test]
    fn smoothed_rtt_moves_by_bounded_fraction(
        first in 1.0f64..2000.0,
        second in 1.0f64..2000.0,
    ) {
        let mut rtt = RttEstimator::with_config(RecoveryConfig::default());
        rtt.update_rtt(first, 0.0).unwrap();
        let before = rtt.smoothed_rtt();
        rtt.update_rtt(second, 0.0).unwrap();
        let after = rtt.smoothed_rtt();

        let bound = 0.125 * (second - before).abs() + 1e-6;
        prop_assert!((after - before).abs() <= bound);
    }

    /// Invariant 6: the reported minimum RTT never drops below the configured floor.
    #[test]
    fn min_rtt_never_drops_below_floor(sample in 0.001f64..5000.0) {
        let mut rtt = RttEstimator::with_config(RecoveryConfig::default());
        rtt.update_rtt(sample, 0.0).unwrap();
        prop_assert!(rtt.min_rtt() >= RecoveryConfig::default().min_rtt_floor_ms);
    }

    /// Invariant 7: PTO backoff is exact binary doubling.
    #[test]
    fn pto_doubles_exactly_with_backoff_count(
        sample in 1.0f64..2000.0,
        k in 0i64..20,
    ) {
        let mut rtt = RttEstimator::with_config(RecoveryConfig::default());
        rtt.update_rtt(sample, 0.0).unwrap();
        let base = rtt.calculate_pto(0).unwrap();
        let got = rtt.calculate_pto(k).unwrap();
        prop_assert!((got - base * 2f64.powi(k as i32)).abs() < 1e-6);
    }

    /// Invariant 8: `generate_ack_frame` ranges are well-formed, disjoint,
    /// and strictly descending by upper endpoint.
    #[test]
    fn ack_frame_ranges_are_well_formed(
        received in prop::collection::hash_set(packet_number_strategy(), 1..60),
    ) {
        let mut mgr = AckManager::new(u32::MAX, 1_000_000.0);
        for (i, n) in received.iter().enumerate() {
            mgr.on_packet_received(*n as i64, 1000.0 + i as f64, true).unwrap();
        }
        let frame = mgr.generate_ack_frame(100_000.0).unwrap();

        let mut prev_end: Option<u64> = None;
        for range in frame.ranges() {
            prop_assert!(range.start() <= range.end());
            if let Some(prev) = prev_end {
                prop_assert!(range.end() < prev);
            }
            prev_end = Some(range.end());
        }
    }

    /// Invariant 9: repeated `on_packet_lost` calls never double-decrement `outstanding`.
    #[test]
    fn on_packet_lost_is_idempotent(n in packet_number_strategy(), calls in 1usize..10) {
        let mut tracker: PacketTracker<usize> = PacketTracker::new();
        tracker.on_packet_sent(n as i64, 100, 1000.0, true).unwrap();
        let before = tracker.outstanding();
        for _ in 0..calls {
            tracker.on_packet_lost(n);
        }
        prop_assert_eq!(tracker.outstanding(), before.saturating_sub(1));
    }

    /// Invariant 10: re-applying the same ACK ranges yields an empty `newly_acked`.
    #[test]
    fn duplicate_ack_ranges_yield_no_new_acks(
        sent in prop::collection::vec(packet_number_strategy(), 1..30),
        range in (packet_number_strategy(), packet_number_strategy()),
    ) {
        let mut tracker: PacketTracker<usize> = PacketTracker::new();
        for (i, n) in sent.iter().enumerate() {
            tracker.on_packet_sent(*n as i64, 100, 1000.0 + i as f64, true).unwrap();
        }
        let (lo, hi) = (range.0.min(range.1), range.0.max(range.1));
        tracker.on_ack_received(&[(lo, hi)], 2000.0);
        let second = tracker.on_ack_received(&[(lo, hi)], 2010.0);
        prop_assert!(second.newly_acked.is_empty());
    }
}

#[test]
fn ack_frame_from_scenario_s3_matches_literal_expectation() {
    let mut mgr = AckManager::new(2, 25.0);
    for (n, t) in [1, 2, 3, 7, 8, 9].into_iter().zip(1000..1006) {
        mgr.on_packet_received(n, t as f64, true).unwrap();
    }
    let frame: AckFrame = mgr.generate_ack_frame(1010.0).unwrap();
    assert_eq!(frame.largest_received(), 9);
    let ranges: Vec<(u64, u64)> = frame.ranges().iter().map(|r| (r.start(), r.end())).collect();
    assert_eq!(ranges, vec![(7, 9), (1, 3)]);
    assert_eq!(frame.ack_delay_micros(), 5000);
}
