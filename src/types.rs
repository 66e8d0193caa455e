use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    OddEven,
    BigSmall,
    Exclusion,
    DualCombo,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::OddEven,
        Category::BigSmall,
        Category::Exclusion,
        Category::DualCombo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OddEven => "odd_even",
            Self::BigSmall => "big_small",
            Self::Exclusion => "exclusion",
            Self::DualCombo => "dual_combo",
        }
    }

    pub fn parse(s: &str) -> Result<Self, EngineError> {
        match s.to_lowercase().as_str() {
            "odd_even" => Ok(Self::OddEven),
            "big_small" => Ok(Self::BigSmall),
            "exclusion" => Ok(Self::Exclusion),
            "dual_combo" => Ok(Self::DualCombo),
            other => Err(EngineError::UnknownCategory(other.to_string())),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical algorithm identifier. Persisted forms carry the raw integer;
/// anything outside {1,2,3} is rejected at the serialization boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum AlgorithmId {
    Formula1 = 1,
    Formula2 = 2,
    Formula3 = 3,
}

impl AlgorithmId {
    pub const ALL: [AlgorithmId; 3] = [
        AlgorithmId::Formula1,
        AlgorithmId::Formula2,
        AlgorithmId::Formula3,
    ];

    pub fn id(&self) -> u8 {
        *self as u8
    }

    pub fn others(self) -> Vec<AlgorithmId> {
        Self::ALL.iter().copied().filter(|a| *a != self).collect()
    }
}

impl TryFrom<u8> for AlgorithmId {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Formula1),
            2 => Ok(Self::Formula2),
            3 => Ok(Self::Formula3),
            other => Err(format!("algorithm id out of range: {}", other)),
        }
    }
}

impl From<AlgorithmId> for u8 {
    fn from(value: AlgorithmId) -> Self {
        value as u8
    }
}

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComboKind {
    Triple,
    Pair,
    Run,
    Mixed,
}

impl ComboKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Triple => "triple",
            Self::Pair => "pair",
            Self::Run => "run",
            Self::Mixed => "mixed",
        }
    }
}

/// One verified draw outcome. Histories are ordered most-recent-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeRecord {
    pub period: String,
    pub total: i64,
    pub is_big: bool,
    pub is_odd: bool,
    pub combo: ComboKind,
}

impl OutcomeRecord {
    /// 大单 / 大双 / 小单 / 小双
    pub fn combo_label(&self) -> &'static str {
        match (self.is_big, self.is_odd) {
            (true, true) => "大单",
            (true, false) => "大双",
            (false, true) => "小单",
            (false, false) => "小双",
        }
    }
}

/// Next forecast period: latest known period plus one, string-encoded.
pub fn next_period(latest: &str) -> Result<String, EngineError> {
    latest
        .trim()
        .parse::<u64>()
        .map(|n| (n + 1).to_string())
        .map_err(|_| EngineError::BadPeriod(latest.to_string()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceRecord {
    pub total_predictions: u32,
    pub correct_predictions: u32,
    pub recent_results: VecDeque<bool>,
    pub consecutive_correct: u32,
    pub consecutive_wrong: u32,
    pub success_rate: f64,
    pub recent_success_rate: f64,
    pub confidence_score: f64,
    pub last_switch_time: u32,
}

impl Default for PerformanceRecord {
    fn default() -> Self {
        Self {
            total_predictions: 0,
            correct_predictions: 0,
            recent_results: VecDeque::new(),
            consecutive_correct: 0,
            consecutive_wrong: 0,
            success_rate: 0.5,
            recent_success_rate: 0.5,
            confidence_score: 0.5,
            last_switch_time: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlgorithmSnapshot {
    pub success_rate: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchEvent {
    pub ts: i64,
    pub from_algo: AlgorithmId,
    pub to_algo: AlgorithmId,
    pub reason: String,
    pub old_algo: AlgorithmSnapshot,
    pub new_algo: AlgorithmSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Forecast {
    pub category: Category,
    pub period: String,
    pub label: String,
    pub algorithm: AlgorithmId,
    pub confidence: f64,
    pub ts: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStatus {
    pub category: Category,
    pub current_algorithm: AlgorithmId,
    pub total_predictions: u32,
    pub success_rate: f64,
    pub recent_success_rate: f64,
    pub confidence: f64,
    pub consecutive_correct: u32,
    pub consecutive_wrong: u32,
    pub switch_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learning_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exploration_rate: Option<f64>,
}
