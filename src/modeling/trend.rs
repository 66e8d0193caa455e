use std::collections::{HashMap, VecDeque};

use crate::config::TrendParams;
use crate::types::AlgorithmId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendReading {
    pub is_declining: bool,
    pub slope: f64,
}

impl TrendReading {
    fn none() -> Self {
        Self {
            is_declining: false,
            slope: 0.0,
        }
    }
}

/// Bounded per-algorithm series of confidence observations with a simple
/// linear fit over the most recent window.
pub struct TrendAnalyzer {
    params: TrendParams,
    series: HashMap<AlgorithmId, VecDeque<f64>>,
}

impl TrendAnalyzer {
    pub fn new(params: TrendParams) -> Self {
        Self {
            params,
            series: HashMap::new(),
        }
    }

    pub fn update(&mut self, algorithm: AlgorithmId, value: f64) {
        let series = self.series.entry(algorithm).or_default();
        series.push_back(value);
        while series.len() > self.params.series_capacity {
            series.pop_front();
        }
    }

    pub fn analyze(&self, algorithm: AlgorithmId) -> TrendReading {
        let series = match self.series.get(&algorithm) {
            Some(s) if s.len() >= self.params.window_size => s,
            _ => return TrendReading::none(),
        };

        let window: Vec<f64> = series
            .iter()
            .skip(series.len() - self.params.window_size)
            .copied()
            .collect();
        let slope = least_squares_slope(&window);

        TrendReading {
            is_declining: slope < self.params.decline_threshold,
            slope,
        }
    }

    /// Length of the strictly-decreasing run at the tail of the series.
    /// A run of k points has k-1 consecutive declines.
    pub fn declining_streak(&self, algorithm: AlgorithmId) -> usize {
        let series = match self.series.get(&algorithm) {
            Some(s) if s.len() >= 2 => s,
            _ => return 0,
        };

        let values: Vec<f64> = series.iter().copied().collect();
        let mut run = 1;
        for i in (1..values.len()).rev() {
            if values[i] < values[i - 1] {
                run += 1;
            } else {
                break;
            }
        }
        if run >= 2 {
            run
        } else {
            0
        }
    }

    /// Last `n` observations, oldest first.
    pub fn tail(&self, algorithm: AlgorithmId, n: usize) -> Vec<f64> {
        match self.series.get(&algorithm) {
            Some(s) => s.iter().skip(s.len().saturating_sub(n)).copied().collect(),
            None => Vec::new(),
        }
    }
}

/// Least-squares slope of values against their index. Returns zero for a
/// degenerate fit (fewer than two points or zero x-variance).
pub fn least_squares_slope(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }

    let n = values.len() as f64;
    let sum_x: f64 = (0..values.len()).map(|i| i as f64).sum();
    let sum_y: f64 = values.iter().sum();
    let sum_xy: f64 = values.iter().enumerate().map(|(i, y)| i as f64 * y).sum();
    let sum_xx: f64 = (0..values.len()).map(|i| (i as f64).powi(2)).sum();

    let denominator = n * sum_xx - sum_x.powi(2);
    if denominator.abs() < 1e-10 {
        return 0.0;
    }

    (n * sum_xy - sum_x * sum_y) / denominator
}

pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / values.len() as f64
}
