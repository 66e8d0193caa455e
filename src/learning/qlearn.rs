use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::LearnerParams;
use crate::types::AlgorithmId;

/// Serializable learner snapshot. Q-rows are keyed by raw algorithm id and
/// validated on restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerSnapshot {
    pub q_table: HashMap<String, HashMap<u8, f64>>,
    pub learning_rate: f64,
    pub discount_factor: f64,
    pub exploration_rate: f64,
    pub updated_at: i64,
}

/// Tabular Q-learning over discretized history states, choosing among the
/// fixed algorithm ids with an epsilon-greedy policy.
pub struct ReinforcementSelector {
    params: LearnerParams,
    learning_rate: f64,
    discount_factor: f64,
    exploration_rate: f64,
    q_table: HashMap<String, HashMap<AlgorithmId, f64>>,
}

fn default_row() -> HashMap<AlgorithmId, f64> {
    AlgorithmId::ALL.iter().map(|a| (*a, 0.5)).collect()
}

impl ReinforcementSelector {
    pub fn new(params: &LearnerParams) -> Self {
        Self {
            learning_rate: params.learning_rate,
            discount_factor: params.discount_factor,
            exploration_rate: params.exploration_rate,
            params: params.clone(),
            q_table: HashMap::new(),
        }
    }

    /// Epsilon-greedy selection: explore uniformly, otherwise take the
    /// argmax of the (lazily initialized) Q-row, ties broken in id order.
    pub fn select<R: Rng + ?Sized>(&mut self, rng: &mut R, state: &str) -> AlgorithmId {
        if rng.random::<f64>() < self.exploration_rate {
            let idx = rng.random_range(0..AlgorithmId::ALL.len());
            return AlgorithmId::ALL[idx];
        }

        let row = self
            .q_table
            .entry(state.to_string())
            .or_insert_with(default_row);

        let mut best = AlgorithmId::Formula1;
        let mut best_q = f64::NEG_INFINITY;
        for algo in AlgorithmId::ALL {
            let q = row.get(&algo).copied().unwrap_or(0.5);
            if q > best_q {
                best_q = q;
                best = algo;
            }
        }
        best
    }

    /// One-step Q-learning update.
    pub fn update(&mut self, state: &str, action: AlgorithmId, reward: f64, next_state: &str) {
        self.q_table
            .entry(next_state.to_string())
            .or_insert_with(default_row);
        let max_next_q = self
            .q_table
            .get(next_state)
            .map(|row| row.values().copied().fold(f64::NEG_INFINITY, f64::max))
            .unwrap_or(0.5);

        let row = self
            .q_table
            .entry(state.to_string())
            .or_insert_with(default_row);
        let current_q = row.get(&action).copied().unwrap_or(0.5);
        let new_q =
            current_q + self.learning_rate * (reward + self.discount_factor * max_next_q - current_q);
        row.insert(action, new_q);
    }

    /// Reward scaled by the confidence the forecast was issued with.
    pub fn reward(is_correct: bool, confidence: f64) -> f64 {
        if is_correct {
            1.0 + confidence
        } else {
            -1.0 - confidence
        }
    }

    /// Anneals exploration with iteration count and nudges the learning
    /// rate opposite to the observed success rate, within bounds.
    pub fn adapt(&mut self, success_rate: f64, iteration_count: u32) {
        self.exploration_rate = (0.5 / (1.0 + 0.1 * iteration_count as f64))
            .clamp(self.params.exploration_min, self.params.exploration_max);

        if success_rate > 0.7 {
            self.learning_rate = (self.learning_rate * 0.95).max(self.params.learning_rate_min);
        } else if success_rate < 0.4 {
            self.learning_rate = (self.learning_rate * 1.05).min(self.params.learning_rate_max);
        }

        tracing::debug!(
            exploration_rate = self.exploration_rate,
            learning_rate = self.learning_rate,
            "learner parameters adapted"
        );
    }

    pub fn q_value(&self, state: &str, algorithm: AlgorithmId) -> f64 {
        self.q_table
            .get(state)
            .and_then(|row| row.get(&algorithm))
            .copied()
            .unwrap_or(0.5)
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn exploration_rate(&self) -> f64 {
        self.exploration_rate
    }

    pub fn set_exploration_rate(&mut self, rate: f64) {
        self.exploration_rate = rate.clamp(0.0, 1.0);
    }

    pub fn snapshot(&self) -> LearnerSnapshot {
        LearnerSnapshot {
            q_table: self
                .q_table
                .iter()
                .map(|(state, row)| {
                    (
                        state.clone(),
                        row.iter().map(|(algo, q)| (algo.id(), *q)).collect(),
                    )
                })
                .collect(),
            learning_rate: self.learning_rate,
            discount_factor: self.discount_factor,
            exploration_rate: self.exploration_rate,
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Restores a persisted snapshot, dropping Q-entries whose algorithm id
    /// falls outside the valid set and re-clamping the rates.
    pub fn restore(&mut self, snapshot: LearnerSnapshot) {
        self.learning_rate = snapshot
            .learning_rate
            .clamp(self.params.learning_rate_min, self.params.learning_rate_max);
        self.exploration_rate = snapshot
            .exploration_rate
            .clamp(self.params.exploration_min, self.params.exploration_max);

        self.q_table.clear();
        for (state, raw_row) in snapshot.q_table {
            let mut row = HashMap::new();
            for (raw, q) in raw_row {
                match AlgorithmId::try_from(raw) {
                    Ok(algo) => {
                        row.insert(algo, q);
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, state = %state, "dropping Q-entry with bad algorithm id");
                    }
                }
            }
            if !row.is_empty() {
                self.q_table.insert(state, row);
            }
        }
    }
}
