use proptest::prelude::*;

use forecast_engine::config::TrackerParams;
use forecast_engine::tracker::PerformanceTracker;
use forecast_engine::types::AlgorithmId;

proptest! {
    #[test]
    fn invariants_hold_across_any_outcome_sequence(
        outcomes in proptest::collection::vec(any::<bool>(), 1..200)
    ) {
        let mut tracker = PerformanceTracker::new(&TrackerParams::default());
        for outcome in outcomes {
            let rec = tracker.record(AlgorithmId::Formula1, outcome).clone();

            prop_assert!(rec.confidence_score >= 0.1);
            prop_assert!(rec.confidence_score <= 0.95);
            prop_assert!(rec.consecutive_correct == 0 || rec.consecutive_wrong == 0);
            prop_assert!(rec.recent_results.len() <= 20);
            prop_assert!(rec.correct_predictions <= rec.total_predictions);
            prop_assert!(rec.success_rate >= 0.0 && rec.success_rate <= 1.0);
            prop_assert!(rec.recent_success_rate >= 0.0 && rec.recent_success_rate <= 1.0);
        }
    }

    #[test]
    fn recent_rate_matches_the_window_contents(
        outcomes in proptest::collection::vec(any::<bool>(), 21..60)
    ) {
        let mut tracker = PerformanceTracker::new(&TrackerParams::default());
        for outcome in &outcomes {
            tracker.record(AlgorithmId::Formula2, *outcome);
        }

        let rec = tracker.get(AlgorithmId::Formula2);
        let window = &outcomes[outcomes.len() - 20..];
        let expected = window.iter().filter(|o| **o).count() as f64 / 20.0;
        prop_assert!((rec.recent_success_rate - expected).abs() < 1e-12);
    }
}

#[test]
fn window_evicts_oldest_results() {
    let mut tracker = PerformanceTracker::new(&TrackerParams::default());
    for _ in 0..5 {
        tracker.record(AlgorithmId::Formula1, false);
    }
    for _ in 0..20 {
        tracker.record(AlgorithmId::Formula1, true);
    }

    let rec = tracker.get(AlgorithmId::Formula1);
    assert_eq!(rec.recent_results.len(), 20);
    assert!(rec.recent_results.iter().all(|r| *r));
    assert_eq!(rec.total_predictions, 25);
    assert_eq!(rec.correct_predictions, 20);
}

#[test]
fn unknown_algorithm_reads_as_neutral_defaults() {
    let tracker = PerformanceTracker::new(&TrackerParams::default());
    let rec = tracker.get(AlgorithmId::Formula3);
    assert_eq!(rec.total_predictions, 0);
    assert!((rec.confidence_score - 0.5).abs() < 1e-12);
}

#[test]
fn mark_switch_stamps_the_incoming_algorithm() {
    let mut tracker = PerformanceTracker::new(&TrackerParams::default());
    for _ in 0..7 {
        tracker.record(AlgorithmId::Formula1, true);
    }

    tracker.mark_switch(AlgorithmId::Formula1, AlgorithmId::Formula2);
    assert_eq!(tracker.get(AlgorithmId::Formula2).last_switch_time, 7);
}
