use rand::Rng;
use std::collections::VecDeque;

use crate::types::{AlgorithmId, PerformanceRecord};

/// Weights for blending confidence, recent success and overall success
/// into one comparable score.
#[derive(Debug, Clone)]
pub struct ScoreWeights {
    pub confidence: f64,
    pub recent_success: f64,
    pub overall_success: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            confidence: 0.4,
            recent_success: 0.4,
            overall_success: 0.2,
        }
    }
}

/// Bounded confidence for an algorithm's track record.
///
/// Blends overall and recent success rates, rewards streaks of correct
/// forecasts, penalizes streaks of wrong ones, and adds a small experience
/// factor that saturates at 50 recorded forecasts.
pub fn confidence_score(perf: &PerformanceRecord) -> f64 {
    let base = perf.success_rate * 0.4 + perf.recent_success_rate * 0.6;
    let bonus = (perf.consecutive_correct as f64 * 0.05).min(0.2);
    let penalty = (perf.consecutive_wrong as f64 * 0.1).min(0.3);
    let experience = (perf.total_predictions as f64 / 50.0).min(1.0) * 0.1;
    (base + bonus - penalty + experience).clamp(0.1, 0.95)
}

pub fn composite_score(perf: &PerformanceRecord, weights: &ScoreWeights) -> f64 {
    perf.confidence_score * weights.confidence
        + perf.recent_success_rate * weights.recent_success
        + perf.success_rate * weights.overall_success
}

/// Decayed average of past performance observations, newest weighted
/// highest. The bonus contributes at most 10% of a score.
pub fn memory_bonus(memory: &VecDeque<f64>, decay: f64) -> f64 {
    if memory.is_empty() {
        return 0.0;
    }

    let n = memory.len();
    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    for (i, value) in memory.iter().enumerate() {
        let weight = decay.powi((n - i - 1) as i32);
        weighted_sum += value * weight;
        total_weight += weight;
    }

    if total_weight == 0.0 {
        0.0
    } else {
        weighted_sum / total_weight * 0.1
    }
}

/// Weighted random draw over candidate algorithms. Falls back to a uniform
/// draw when all weights are non-positive.
pub fn weighted_pick<R: Rng + ?Sized>(
    rng: &mut R,
    candidates: &[(AlgorithmId, f64)],
) -> Option<AlgorithmId> {
    if candidates.is_empty() {
        return None;
    }

    let total: f64 = candidates.iter().map(|(_, w)| w.max(0.0)).sum();
    if total <= 0.0 {
        let idx = rng.random_range(0..candidates.len());
        return candidates.get(idx).map(|(a, _)| *a);
    }

    let mut draw = rng.random::<f64>() * total;
    for (algo, weight) in candidates {
        draw -= weight.max(0.0);
        if draw <= 0.0 {
            return Some(*algo);
        }
    }
    candidates.last().map(|(a, _)| *a)
}
