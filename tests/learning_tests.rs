use forecast_engine::config::LearnerParams;
use forecast_engine::learning::features::{self, FeatureValue};
use forecast_engine::learning::ReinforcementSelector;
use forecast_engine::types::{AlgorithmId, Category, ComboKind, OutcomeRecord};

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-12
}

fn outcome(period: u64, total: i64, is_big: bool, is_odd: bool) -> OutcomeRecord {
    OutcomeRecord {
        period: period.to_string(),
        total,
        is_big,
        is_odd,
        combo: ComboKind::Mixed,
    }
}

#[test]
fn reward_scales_with_confidence() {
    assert!(approx(ReinforcementSelector::reward(true, 0.8), 1.8));
    assert!(approx(ReinforcementSelector::reward(false, 0.3), -1.3));
    assert!(approx(ReinforcementSelector::reward(true, 0.0), 1.0));
}

#[test]
fn repeated_updates_converge_on_the_rewarded_action() {
    let mut learner = ReinforcementSelector::new(&LearnerParams::default());
    learner.set_exploration_rate(0.0);
    let state = "big_ratio:p5|odd_ratio:p5";
    let next = "big_ratio:p6|odd_ratio:p4";

    for _ in 0..200 {
        learner.update(state, AlgorithmId::Formula2, 2.0, next);
        learner.update(state, AlgorithmId::Formula1, -2.0, next);
    }

    let mut rng = rand::rng();
    assert_eq!(learner.select(&mut rng, state), AlgorithmId::Formula2);
    assert!(learner.q_value(state, AlgorithmId::Formula2) > 0.5);
    assert!(learner.q_value(state, AlgorithmId::Formula1) < 0.5);
}

#[test]
fn unseen_state_defaults_to_neutral_q_values() {
    let learner = ReinforcementSelector::new(&LearnerParams::default());
    assert!(approx(learner.q_value("missing", AlgorithmId::Formula3), 0.5));
}

#[test]
fn adapt_keeps_rates_inside_bounds() {
    let params = LearnerParams::default();
    let mut learner = ReinforcementSelector::new(&params);

    // Late iterations push the annealed exploration below its floor.
    learner.adapt(0.5, 1000);
    assert!(approx(learner.exploration_rate(), params.exploration_min));

    // Early iterations would overshoot the ceiling.
    learner.adapt(0.5, 0);
    assert!(approx(learner.exploration_rate(), params.exploration_max));

    for _ in 0..200 {
        learner.adapt(0.9, 10);
    }
    assert!(learner.learning_rate() >= params.learning_rate_min);

    for _ in 0..200 {
        learner.adapt(0.1, 10);
    }
    assert!(learner.learning_rate() <= params.learning_rate_max);
}

#[test]
fn snapshot_round_trip_preserves_q_values() {
    let mut learner = ReinforcementSelector::new(&LearnerParams::default());
    learner.update("s1", AlgorithmId::Formula2, 1.5, "s1");
    let snapshot = learner.snapshot();

    let mut restored = ReinforcementSelector::new(&LearnerParams::default());
    restored.restore(snapshot);

    assert!(approx(
        restored.q_value("s1", AlgorithmId::Formula2),
        learner.q_value("s1", AlgorithmId::Formula2),
    ));
}

#[test]
fn state_key_is_deterministic_and_discretized() {
    let records: Vec<OutcomeRecord> = (0..10)
        .map(|i| outcome(100 + i, 14, i % 2 == 0, i % 2 == 1))
        .collect();

    let features = features::extract(&records, Category::OddEven);
    let key = features::state_key(&features);
    let again = features::state_key(&features::extract(&records, Category::OddEven));

    assert_eq!(key, again);
    // 5 of 10 records are big, so the ratio 0.5 discretizes to "p5".
    assert!(key.contains("big_ratio:p5"));
    assert!(key.contains("odd_ratio:p5"));
}

#[test]
fn short_history_yields_no_basic_stats() {
    let records: Vec<OutcomeRecord> = (0..3).map(|i| outcome(100 + i, 10, true, true)).collect();
    let features = features::extract(&records, Category::OddEven);
    assert!(!features.contains_key("big_ratio"));
    assert!(!features.contains_key("avg_sum"));
}

#[test]
fn alternating_outcomes_expose_a_two_cycle() {
    let records: Vec<OutcomeRecord> = (0..12)
        .map(|i| outcome(100 + i, 12, i % 2 == 0, false))
        .collect();

    let features = features::extract(&records, Category::BigSmall);
    assert_eq!(
        features.get("has_big_small_cycle_2"),
        Some(&FeatureValue::Flag(true))
    );
}

#[test]
fn dual_combo_features_include_counts_and_transitions() {
    let records: Vec<OutcomeRecord> = (0..10)
        .map(|i| outcome(100 + i, 13, i % 2 == 0, i % 3 == 0))
        .collect();

    let features = features::extract(&records, Category::DualCombo);
    assert!(features.contains_key("big_odd_count"));
    assert!(features.contains_key("most_common_combo"));
    assert!(features.contains_key("common_transition1"));
}
