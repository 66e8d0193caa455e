use std::collections::HashMap;

use crate::config::TrackerParams;
use crate::decision::scoring;
use crate::types::{AlgorithmId, PerformanceRecord};

/// Rolling per-algorithm statistics for one category.
pub struct PerformanceTracker {
    window: usize,
    records: HashMap<AlgorithmId, PerformanceRecord>,
}

impl PerformanceTracker {
    pub fn new(params: &TrackerParams) -> Self {
        Self {
            window: params.recent_window,
            records: HashMap::new(),
        }
    }

    pub fn from_records(
        params: &TrackerParams,
        records: HashMap<AlgorithmId, PerformanceRecord>,
    ) -> Self {
        Self {
            window: params.recent_window,
            records,
        }
    }

    /// Records one verified outcome for an algorithm and recomputes the
    /// derived rates and confidence. A missing record is created with
    /// neutral defaults first.
    pub fn record(&mut self, algorithm: AlgorithmId, is_correct: bool) -> &PerformanceRecord {
        let rec = self.records.entry(algorithm).or_default();

        rec.total_predictions += 1;
        if is_correct {
            rec.correct_predictions += 1;
            rec.consecutive_correct += 1;
            rec.consecutive_wrong = 0;
        } else {
            rec.consecutive_wrong += 1;
            rec.consecutive_correct = 0;
        }

        rec.recent_results.push_back(is_correct);
        while rec.recent_results.len() > self.window {
            rec.recent_results.pop_front();
        }

        rec.success_rate = rec.correct_predictions as f64 / rec.total_predictions as f64;
        rec.recent_success_rate = rec.recent_results.iter().filter(|r| **r).count() as f64
            / rec.recent_results.len() as f64;
        rec.confidence_score = scoring::confidence_score(rec);

        rec
    }

    pub fn get(&self, algorithm: AlgorithmId) -> PerformanceRecord {
        self.records.get(&algorithm).cloned().unwrap_or_default()
    }

    /// Stamps the newly selected algorithm with the outgoing algorithm's
    /// prediction count, marking when the selection last changed.
    pub fn mark_switch(&mut self, from: AlgorithmId, to: AlgorithmId) {
        let at = self.get(from).total_predictions;
        self.records.entry(to).or_default().last_switch_time = at;
    }

    pub fn records(&self) -> &HashMap<AlgorithmId, PerformanceRecord> {
        &self.records
    }

    pub fn seed(&mut self, algorithm: AlgorithmId, record: PerformanceRecord) {
        self.records.insert(algorithm, record);
    }
}
