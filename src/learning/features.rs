use std::collections::BTreeMap;

use crate::modeling::trend::least_squares_slope;
use crate::types::{Category, ComboKind, OutcomeRecord};

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Flag(bool),
    Num(f64),
    Tag(String),
}

/// Extracts the discretizable feature set for the Q-state of one category
/// from a most-recent-first outcome history.
pub fn extract(records: &[OutcomeRecord], category: Category) -> BTreeMap<String, FeatureValue> {
    let mut features = BTreeMap::new();

    basic_stats(records, &mut features);

    match category {
        Category::OddEven => parity_streaks(records, &mut features),
        Category::BigSmall => size_streaks(records, &mut features),
        Category::Exclusion => combo_counts(records, &mut features),
        Category::DualCombo => {
            combo_counts(records, &mut features);
            combo_transitions(records, &mut features);
        }
    }

    trend_features(records, &mut features);
    cycle_features(records, &mut features);

    features
}

/// Serializes sorted (key, discretized value) pairs into the opaque state
/// string. Numerics are scaled to one decimal and sign-prefixed; values
/// near zero collapse to "0".
pub fn state_key(features: &BTreeMap<String, FeatureValue>) -> String {
    let mut parts = Vec::with_capacity(features.len());
    for (key, value) in features {
        let encoded = match value {
            FeatureValue::Flag(true) => "1".to_string(),
            FeatureValue::Flag(false) => "0".to_string(),
            FeatureValue::Num(v) => {
                if v.abs() < 0.001 {
                    "0".to_string()
                } else if *v > 0.0 {
                    format!("p{}", (v * 10.0) as i64)
                } else {
                    format!("n{}", (v.abs() * 10.0) as i64)
                }
            }
            FeatureValue::Tag(s) => s.clone(),
        };
        parts.push(format!("{}:{}", key, encoded));
    }
    parts.join("|")
}

fn basic_stats(records: &[OutcomeRecord], features: &mut BTreeMap<String, FeatureValue>) {
    if records.len() < 5 {
        return;
    }

    let total = records.len().min(10);
    let mut big_count = 0usize;
    let mut odd_count = 0usize;
    let mut combo_kind_counts = [0usize; 4];

    for record in records.iter().take(10) {
        if record.is_big {
            big_count += 1;
        }
        if record.is_odd {
            odd_count += 1;
        }
        let idx = match record.combo {
            ComboKind::Triple => 0,
            ComboKind::Pair => 1,
            ComboKind::Run => 2,
            ComboKind::Mixed => 3,
        };
        combo_kind_counts[idx] += 1;
    }

    features.insert(
        "big_ratio".to_string(),
        FeatureValue::Num(big_count as f64 / total as f64),
    );
    features.insert(
        "odd_ratio".to_string(),
        FeatureValue::Num(odd_count as f64 / total as f64),
    );
    for (kind, count) in [
        (ComboKind::Triple, combo_kind_counts[0]),
        (ComboKind::Pair, combo_kind_counts[1]),
        (ComboKind::Run, combo_kind_counts[2]),
        (ComboKind::Mixed, combo_kind_counts[3]),
    ] {
        features.insert(
            format!("{}_ratio", kind.as_str()),
            FeatureValue::Num(count as f64 / total as f64),
        );
    }
}

fn parity_streaks(records: &[OutcomeRecord], features: &mut BTreeMap<String, FeatureValue>) {
    let (a, b) = streaks(records.iter().take(10).map(|r| r.is_odd));
    features.insert("odd_streak".to_string(), FeatureValue::Num(a as f64));
    features.insert("even_streak".to_string(), FeatureValue::Num(b as f64));
}

fn size_streaks(records: &[OutcomeRecord], features: &mut BTreeMap<String, FeatureValue>) {
    let (a, b) = streaks(records.iter().take(10).map(|r| r.is_big));
    features.insert("big_streak".to_string(), FeatureValue::Num(a as f64));
    features.insert("small_streak".to_string(), FeatureValue::Num(b as f64));
}

/// Running same-value streak pair over a boolean sequence: first element of
/// the pair tracks `true` runs, second tracks `false` runs.
fn streaks(values: impl Iterator<Item = bool>) -> (u32, u32) {
    let mut true_streak = 0u32;
    let mut false_streak = 0u32;
    let mut last: Option<bool> = None;

    for value in values {
        let Some(prev) = last else {
            last = Some(value);
            continue;
        };
        if value {
            true_streak = if prev { true_streak + 1 } else { 1 };
            false_streak = 0;
        } else {
            false_streak = if !prev { false_streak + 1 } else { 1 };
            true_streak = 0;
        }
        last = Some(value);
    }

    (true_streak, false_streak)
}

const COMBOS: [(&str, &str); 4] = [
    ("大单", "big_odd"),
    ("大双", "big_even"),
    ("小单", "small_odd"),
    ("小双", "small_even"),
];

fn combo_counts(records: &[OutcomeRecord], features: &mut BTreeMap<String, FeatureValue>) {
    let mut counts = [0usize; 4];
    for record in records.iter().take(5) {
        let label = record.combo_label();
        if let Some(idx) = COMBOS.iter().position(|(combo, _)| *combo == label) {
            counts[idx] += 1;
        }
    }

    let mut most_common = 0usize;
    for (idx, (_, key)) in COMBOS.iter().enumerate() {
        features.insert(
            format!("{}_count", key),
            FeatureValue::Num(counts[idx] as f64),
        );
        if counts[idx] > counts[most_common] {
            most_common = idx;
        }
    }
    features.insert(
        "most_common_combo".to_string(),
        FeatureValue::Tag(COMBOS[most_common].0.to_string()),
    );
}

fn combo_transitions(records: &[OutcomeRecord], features: &mut BTreeMap<String, FeatureValue>) {
    let mut transitions: BTreeMap<String, usize> = BTreeMap::new();
    let mut last: Option<&'static str> = None;

    for record in records.iter().take(10) {
        let combo = record.combo_label();
        if let Some(prev) = last {
            *transitions
                .entry(format!("{}→{}", prev, combo))
                .or_insert(0) += 1;
        }
        last = Some(combo);
    }

    let mut ranked: Vec<(String, usize)> = transitions.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    if let Some((transition, _)) = ranked.first() {
        features.insert(
            "common_transition1".to_string(),
            FeatureValue::Tag(transition.clone()),
        );
    }
    if let Some((transition, _)) = ranked.get(1) {
        features.insert(
            "common_transition2".to_string(),
            FeatureValue::Tag(transition.clone()),
        );
    }
}

fn trend_features(records: &[OutcomeRecord], features: &mut BTreeMap<String, FeatureValue>) {
    let sums: Vec<f64> = records.iter().take(15).map(|r| r.total as f64).collect();
    if sums.len() < 5 {
        return;
    }

    let avg = sums.iter().sum::<f64>() / sums.len() as f64;
    features.insert("avg_sum".to_string(), FeatureValue::Num(avg));

    if sums.len() >= 3 {
        features.insert(
            "sum_trend".to_string(),
            FeatureValue::Num(least_squares_slope(&sums)),
        );
    }

    if avg != 0.0 {
        features.insert(
            "recent_vs_avg".to_string(),
            FeatureValue::Num((sums[0] - avg) / avg),
        );
    }
}

fn cycle_features(records: &[OutcomeRecord], features: &mut BTreeMap<String, FeatureValue>) {
    let big_small: Vec<bool> = records.iter().take(20).map(|r| r.is_big).collect();
    let odd_even: Vec<bool> = records.iter().take(20).map(|r| r.is_odd).collect();

    for window in [2usize, 3, 4] {
        if big_small.len() >= window * 2 {
            features.insert(
                format!("has_big_small_cycle_{}", window),
                FeatureValue::Flag(has_cycle(&big_small, window)),
            );
        }
        if odd_even.len() >= window * 2 {
            features.insert(
                format!("has_odd_even_cycle_{}", window),
                FeatureValue::Flag(has_cycle(&odd_even, window)),
            );
        }
    }
}

/// A cycle of the given length exists when the leading pattern repeats in
/// at least half of the aligned chunks.
fn has_cycle(sequence: &[bool], cycle_length: usize) -> bool {
    if sequence.len() < cycle_length * 2 {
        return false;
    }

    let pattern = &sequence[..cycle_length];
    let mut matches = 0usize;
    let mut checks = 0usize;

    let mut i = 0;
    while i < sequence.len() - cycle_length {
        checks += 1;
        if &sequence[i..i + cycle_length] == pattern {
            matches += 1;
        }
        i += cycle_length;
    }

    checks > 0 && matches as f64 / checks as f64 >= 0.5
}
