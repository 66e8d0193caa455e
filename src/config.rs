use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{AlgorithmId, Category};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerParams {
    pub recent_window: usize,
}

impl Default for TrackerParams {
    fn default() -> Self {
        Self { recent_window: 20 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendParams {
    pub series_capacity: usize,
    pub window_size: usize,
    pub decline_threshold: f64,
}

impl Default for TrendParams {
    fn default() -> Self {
        Self {
            series_capacity: 20,
            window_size: 5,
            decline_threshold: -0.01,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchParams {
    pub min_predictions: u32,
    pub max_consecutive_wrong: u32,
    pub min_confidence: f64,
    pub min_recent_success_rate: f64,
    pub exploration_probability: f64,
    pub exploration_threshold: u32,
    pub rearm_checks: u32,
    pub history_capacity: usize,
    pub memory_capacity: usize,
    pub time_decay_factor: f64,
    pub force_exploration: bool,
}

impl Default for SwitchParams {
    fn default() -> Self {
        Self {
            min_predictions: 5,
            max_consecutive_wrong: 3,
            min_confidence: 0.4,
            min_recent_success_rate: 0.4,
            exploration_probability: 0.2,
            exploration_threshold: 10,
            rearm_checks: 100,
            history_capacity: 50,
            memory_capacity: 10,
            time_decay_factor: 0.9,
            force_exploration: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerParams {
    pub learning_rate: f64,
    pub learning_rate_min: f64,
    pub learning_rate_max: f64,
    pub discount_factor: f64,
    pub exploration_rate: f64,
    pub exploration_min: f64,
    pub exploration_max: f64,
    pub save_probability: f64,
}

impl Default for LearnerParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.05,
            learning_rate_min: 0.01,
            learning_rate_max: 0.2,
            discount_factor: 0.95,
            exploration_rate: 0.2,
            exploration_min: 0.05,
            exploration_max: 0.3,
            save_probability: 0.1,
        }
    }
}

/// How the active algorithm is chosen for a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    Pinned(AlgorithmId),
    RuleBased,
    Learning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub tracker: TrackerParams,
    pub trend: TrendParams,
    pub switch: SwitchParams,
    pub learner: LearnerParams,
    pub policies: HashMap<Category, SelectionPolicy>,
    pub save_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut policies = HashMap::new();
        policies.insert(Category::OddEven, SelectionPolicy::RuleBased);
        policies.insert(
            Category::BigSmall,
            SelectionPolicy::Pinned(AlgorithmId::Formula1),
        );
        policies.insert(Category::Exclusion, SelectionPolicy::RuleBased);
        policies.insert(Category::DualCombo, SelectionPolicy::Learning);

        Self {
            tracker: TrackerParams::default(),
            trend: TrendParams::default(),
            switch: SwitchParams::default(),
            learner: LearnerParams::default(),
            policies,
            save_interval_secs: 300,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("FORECAST_EXPLORATION_PROBABILITY") {
            if let Ok(p) = val.parse::<f64>() {
                config.switch.exploration_probability = p.clamp(0.0, 1.0);
            }
        }
        if let Ok(val) = std::env::var("FORECAST_FORCE_EXPLORATION") {
            config.switch.force_exploration = val.parse().unwrap_or(false);
        }
        if let Ok(val) = std::env::var("FORECAST_REARM_CHECKS") {
            if let Ok(n) = val.parse() {
                config.switch.rearm_checks = n;
            }
        }
        if let Ok(val) = std::env::var("FORECAST_SAVE_INTERVAL_SECS") {
            if let Ok(n) = val.parse() {
                config.save_interval_secs = n;
            }
        }

        config
    }

    pub fn policy(&self, category: Category) -> SelectionPolicy {
        self.policies
            .get(&category)
            .copied()
            .unwrap_or(SelectionPolicy::RuleBased)
    }
}
