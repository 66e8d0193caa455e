use std::collections::VecDeque;

use forecast_engine::config::{SwitchParams, TrackerParams, TrendParams};
use forecast_engine::decision::scoring;
use forecast_engine::decision::{ExplorationPhase, SwitchDecisionEngine};
use forecast_engine::modeling::TrendAnalyzer;
use forecast_engine::tracker::PerformanceTracker;
use forecast_engine::types::{AlgorithmId, PerformanceRecord};

fn empty_trend() -> TrendAnalyzer {
    TrendAnalyzer::new(TrendParams::default())
}

fn tracker_with(correct: usize, wrong: usize) -> PerformanceTracker {
    let mut tracker = PerformanceTracker::new(&TrackerParams::default());
    for _ in 0..correct {
        tracker.record(AlgorithmId::Formula1, true);
    }
    for _ in 0..wrong {
        tracker.record(AlgorithmId::Formula1, false);
    }
    tracker
}

#[test]
fn insufficient_data_keeps_current() {
    let switcher = SwitchDecisionEngine::new(SwitchParams::default());
    let tracker = tracker_with(1, 1);
    let mut rng = rand::rng();

    let (next, reason) =
        switcher.should_switch(&mut rng, AlgorithmId::Formula1, &tracker, &empty_trend());

    assert_eq!(next, AlgorithmId::Formula1);
    assert_eq!(reason, "数据不足");
}

#[test]
fn consecutive_errors_force_a_switch() {
    let switcher = SwitchDecisionEngine::new(SwitchParams::default());
    let mut tracker = PerformanceTracker::new(&TrackerParams::default());
    let mut record = PerformanceRecord {
        total_predictions: 10,
        correct_predictions: 2,
        recent_results: VecDeque::from(vec![false, false, false, false, true]),
        consecutive_wrong: 3,
        success_rate: 0.2,
        recent_success_rate: 0.2,
        ..Default::default()
    };
    record.confidence_score = 0.1;
    tracker.seed(AlgorithmId::Formula1, record);
    let mut rng = rand::rng();

    let (next, reason) =
        switcher.should_switch(&mut rng, AlgorithmId::Formula1, &tracker, &empty_trend());

    assert_ne!(next, AlgorithmId::Formula1);
    assert!(reason.contains("连续错误") || reason.contains("最近成功率"));
}

#[test]
fn healthy_algorithm_is_kept() {
    let switcher = SwitchDecisionEngine::new(SwitchParams::default());
    // 6 correct then 2 wrong: high rates, streak below the error limit,
    // total below the random-exploration threshold.
    let tracker = tracker_with(6, 2);
    let mut rng = rand::rng();

    let (next, reason) =
        switcher.should_switch(&mut rng, AlgorithmId::Formula1, &tracker, &empty_trend());

    assert_eq!(next, AlgorithmId::Formula1);
    assert_eq!(reason, "算法运行正常");
}

#[test]
fn persistent_decline_triggers_switch() {
    let switcher = SwitchDecisionEngine::new(SwitchParams::default());
    let tracker = tracker_with(6, 2);
    let mut trend = empty_trend();
    for value in [0.9, 0.85, 0.8, 0.75, 0.7] {
        trend.update(AlgorithmId::Formula1, value);
    }
    let mut rng = rand::rng();

    let (next, reason) =
        switcher.should_switch(&mut rng, AlgorithmId::Formula1, &tracker, &trend);

    assert_ne!(next, AlgorithmId::Formula1);
    assert_eq!(reason, "性能持续下降");
}

#[test]
fn fallback_prefers_highest_confidence() {
    let switcher = SwitchDecisionEngine::new(SwitchParams::default());
    let mut tracker = PerformanceTracker::new(&TrackerParams::default());
    for _ in 0..10 {
        tracker.record(AlgorithmId::Formula2, false);
        tracker.record(AlgorithmId::Formula3, true);
    }

    let next = switcher.select_fallback(AlgorithmId::Formula1, &tracker);
    assert_eq!(next, AlgorithmId::Formula3);
}

#[test]
fn forced_exploration_fires_once_until_reset() {
    let params = SwitchParams {
        force_exploration: true,
        ..Default::default()
    };
    let mut switcher = SwitchDecisionEngine::new(params);
    let tracker = tracker_with(15, 0);
    let trend = empty_trend();
    let mut rng = rand::rng();

    let first = switcher.decide(&mut rng, AlgorithmId::Formula1, &tracker, &trend);
    assert!(first.switched);
    assert_eq!(first.reason, "强制算法探索");
    assert_ne!(first.next, AlgorithmId::Formula1);
    assert_eq!(switcher.exploration_phase(), ExplorationPhase::Fired);

    let second = switcher.decide(&mut rng, AlgorithmId::Formula1, &tracker, &trend);
    assert_ne!(second.reason, "强制算法探索");

    switcher.reset_forced_exploration();
    let third = switcher.decide(&mut rng, AlgorithmId::Formula1, &tracker, &trend);
    assert_eq!(third.reason, "强制算法探索");
}

#[test]
fn switch_history_is_bounded() {
    let mut switcher = SwitchDecisionEngine::new(SwitchParams::default());
    let tracker = tracker_with(5, 0);
    for _ in 0..60 {
        switcher.record_switch(
            AlgorithmId::Formula1,
            AlgorithmId::Formula2,
            "算法探索".to_string(),
            &tracker,
        );
    }
    assert_eq!(switcher.history().len(), 50);
}

#[test]
fn memory_bonus_is_capped_at_ten_percent() {
    let memory: VecDeque<f64> = (0..10).map(|_| 1.0).collect();
    let bonus = scoring::memory_bonus(&memory, 0.9);
    assert!(bonus > 0.0);
    assert!(bonus <= 0.1 + 1e-9);
}

#[test]
fn confidence_score_respects_bounds() {
    let mut record = PerformanceRecord {
        total_predictions: 100,
        correct_predictions: 100,
        consecutive_correct: 50,
        success_rate: 1.0,
        recent_success_rate: 1.0,
        ..Default::default()
    };
    assert!(scoring::confidence_score(&record) <= 0.95);

    record.correct_predictions = 0;
    record.consecutive_correct = 0;
    record.consecutive_wrong = 50;
    record.success_rate = 0.0;
    record.recent_success_rate = 0.0;
    assert!(scoring::confidence_score(&record) >= 0.1);
}
