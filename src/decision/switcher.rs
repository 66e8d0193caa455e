use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::config::SwitchParams;
use crate::decision::scoring::{self, ScoreWeights};
use crate::modeling::trend::variance;
use crate::modeling::TrendAnalyzer;
use crate::tracker::PerformanceTracker;
use crate::types::{AlgorithmId, AlgorithmSnapshot, SwitchEvent};

/// One-shot forced exploration lifecycle. Fires once while armed, then
/// cools down until the check counter reaches the re-arm threshold or an
/// explicit reset re-arms it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplorationPhase {
    Armed,
    Fired,
    Cooling,
}

#[derive(Debug, Clone)]
pub struct SwitchDecision {
    pub next: AlgorithmId,
    pub reason: String,
    pub switched: bool,
}

/// Serializable switcher state carried in the performance snapshot.
/// Memory series are keyed by raw algorithm id and validated on restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitcherState {
    pub forced_phase: ExplorationPhase,
    pub rotation_counter: u32,
    pub memory: HashMap<u8, Vec<f64>>,
}

enum Trigger {
    ConsecutiveErrors(u32),
    LowConfidence(f64),
    LowRecentRate(f64),
    Declining(f64),
    Exploration,
}

impl Trigger {
    fn reason(&self) -> String {
        match self {
            Self::ConsecutiveErrors(n) => format!("连续错误次数过多: {}次", n),
            Self::LowConfidence(c) => format!("置信度过低: {:.2}", c),
            Self::LowRecentRate(r) => format!("最近成功率低: {:.2}%", r * 100.0),
            Self::Declining(_) => "性能持续下降".to_string(),
            Self::Exploration => "算法探索".to_string(),
        }
    }
}

/// Rule-based keep/replace policy for the active algorithm of one category.
pub struct SwitchDecisionEngine {
    params: SwitchParams,
    weights: ScoreWeights,
    force_exploration: bool,
    forced: ExplorationPhase,
    rotation_counter: u32,
    memory: HashMap<AlgorithmId, VecDeque<f64>>,
    history: VecDeque<SwitchEvent>,
}

impl SwitchDecisionEngine {
    pub fn new(params: SwitchParams) -> Self {
        Self {
            force_exploration: params.force_exploration,
            params,
            weights: ScoreWeights::default(),
            forced: ExplorationPhase::Armed,
            rotation_counter: 0,
            memory: HashMap::new(),
            history: VecDeque::new(),
        }
    }

    /// Ordered keep/replace rules. Returns the algorithm to use next
    /// and a human-readable reason; does not mutate any switch state.
    pub fn should_switch<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        current: AlgorithmId,
        tracker: &PerformanceTracker,
        trend: &TrendAnalyzer,
    ) -> (AlgorithmId, String) {
        let perf = tracker.get(current);
        if perf.total_predictions < self.params.min_predictions {
            return (current, "数据不足".to_string());
        }

        match self.trigger(rng, current, tracker, trend) {
            Some(trigger) => (self.select_fallback(current, tracker), trigger.reason()),
            None => (current, "算法运行正常".to_string()),
        }
    }

    /// Full decision step used by the orchestrator: evaluates the rules,
    /// picks the replacement through the richer selection path, applies the
    /// one-shot forced exploration, and maintains the rotation counter.
    pub fn decide<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        current: AlgorithmId,
        tracker: &PerformanceTracker,
        trend: &TrendAnalyzer,
    ) -> SwitchDecision {
        self.advance_phase();

        let perf = tracker.get(current);
        if perf.total_predictions < self.params.min_predictions {
            return self.keep(current, "数据不足");
        }

        let trigger = self.trigger(rng, current, tracker, trend);

        let (mut next, mut reason) = match trigger {
            None => {
                return self.keep(current, "算法运行正常");
            }
            Some(Trigger::ConsecutiveErrors(n)) => (
                self.find_best(tracker),
                format!("连续错误次数过多: {}次", n),
            ),
            Some(Trigger::Declining(slope)) => (
                self.find_best(tracker),
                format!("性能持续下降({:.3})", slope),
            ),
            Some(Trigger::LowConfidence(c)) => (
                self.weighted_next(rng, current, tracker, trend),
                format!("置信度过低: {:.2}", c),
            ),
            Some(Trigger::LowRecentRate(r)) => (
                self.weighted_next(rng, current, tracker, trend),
                format!("最近成功率低: {:.2}%", r * 100.0),
            ),
            Some(Trigger::Exploration) => {
                let next = self.weighted_next(rng, current, tracker, trend);
                let rate = self.dynamic_exploration_rate(current, tracker, trend);
                let reason = if rng.random::<f64>() < rate {
                    "智能探索"
                } else {
                    "算法探索"
                };
                (next, reason.to_string())
            }
        };

        // One-shot forced exploration: kick a long-running default algorithm
        // onto one of the alternatives exactly once per arming.
        if current == AlgorithmId::Formula1
            && perf.total_predictions > self.params.exploration_threshold
            && self.forced == ExplorationPhase::Armed
        {
            next = if rng.random::<f64>() < 0.5 {
                AlgorithmId::Formula2
            } else {
                AlgorithmId::Formula3
            };
            self.forced = ExplorationPhase::Fired;
            reason = "强制算法探索".to_string();
            tracing::info!(to = %next, "forced exploration fired");
        }

        if next == current {
            return self.keep(current, reason);
        }

        self.rotation_counter = 0;
        SwitchDecision {
            next,
            reason,
            switched: true,
        }
    }

    fn keep(&mut self, current: AlgorithmId, reason: impl Into<String>) -> SwitchDecision {
        self.rotation_counter = self.rotation_counter.saturating_add(1);
        SwitchDecision {
            next: current,
            reason: reason.into(),
            switched: false,
        }
    }

    fn advance_phase(&mut self) {
        match self.forced {
            ExplorationPhase::Fired => self.forced = ExplorationPhase::Cooling,
            ExplorationPhase::Cooling if self.rotation_counter >= self.params.rearm_checks => {
                self.forced = ExplorationPhase::Armed;
                self.rotation_counter = 0;
            }
            _ => {}
        }
    }

    fn trigger<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        current: AlgorithmId,
        tracker: &PerformanceTracker,
        trend: &TrendAnalyzer,
    ) -> Option<Trigger> {
        let perf = tracker.get(current);

        if perf.consecutive_wrong >= self.params.max_consecutive_wrong {
            return Some(Trigger::ConsecutiveErrors(perf.consecutive_wrong));
        }
        if perf.confidence_score < self.params.min_confidence {
            return Some(Trigger::LowConfidence(perf.confidence_score));
        }
        if perf.recent_success_rate < self.params.min_recent_success_rate {
            return Some(Trigger::LowRecentRate(perf.recent_success_rate));
        }
        if trend.declining_streak(current) >= 3 {
            return Some(Trigger::Declining(trend.analyze(current).slope));
        }
        if self.force_exploration
            || (perf.total_predictions > self.params.exploration_threshold
                && rng.random::<f64>() < self.params.exploration_probability)
        {
            return Some(Trigger::Exploration);
        }
        None
    }

    /// Highest-confidence candidate among the non-current algorithms.
    pub fn select_fallback(
        &self,
        current: AlgorithmId,
        tracker: &PerformanceTracker,
    ) -> AlgorithmId {
        let mut best = current;
        let mut best_confidence = f64::NEG_INFINITY;
        for algo in current.others() {
            let confidence = tracker.get(algo).confidence_score;
            if confidence > best_confidence {
                best_confidence = confidence;
                best = algo;
            }
        }
        best
    }

    /// Best composite score across all algorithms, current included.
    fn find_best(&self, tracker: &PerformanceTracker) -> AlgorithmId {
        let mut best = AlgorithmId::Formula1;
        let mut best_score = f64::NEG_INFINITY;
        for algo in AlgorithmId::ALL {
            let perf = tracker.get(algo);
            let mut score = scoring::composite_score(&perf, &self.weights);
            if let Some(memory) = self.memory.get(&algo) {
                score += scoring::memory_bonus(memory, self.params.time_decay_factor);
            }
            if score > best_score {
                best_score = score;
                best = algo;
            }
        }
        best
    }

    /// Weighted random draw among the non-current algorithms, biased toward
    /// confident, non-declining candidates with good decayed memory.
    fn weighted_next<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        current: AlgorithmId,
        tracker: &PerformanceTracker,
        trend: &TrendAnalyzer,
    ) -> AlgorithmId {
        let candidates: Vec<(AlgorithmId, f64)> = current
            .others()
            .into_iter()
            .map(|algo| {
                let perf = tracker.get(algo);
                let mut weight = perf.confidence_score + 0.1;
                if !trend.analyze(algo).is_declining {
                    weight *= 1.2;
                }
                if let Some(memory) = self.memory.get(&algo) {
                    weight += scoring::memory_bonus(memory, self.params.time_decay_factor);
                }
                (algo, weight)
            })
            .collect();

        scoring::weighted_pick(rng, &candidates).unwrap_or(current)
    }

    /// Exploration rate shrinks as the current algorithm gets stable and
    /// successful, bounded to [2%, 20%].
    fn dynamic_exploration_rate(
        &self,
        current: AlgorithmId,
        tracker: &PerformanceTracker,
        trend: &TrendAnalyzer,
    ) -> f64 {
        let base = self.params.exploration_probability;
        let recent = trend.tail(current, 3);

        let mut stability = 0.5;
        if recent.len() >= 3 {
            stability = (1.0 - (variance(&recent) * 10.0).min(1.0)).max(0.0);
        }

        let mut rate = base * (1.0 - stability * 0.5);
        let success_rate = tracker.get(current).success_rate;
        if success_rate > 0.7 {
            rate *= 0.8;
        } else if success_rate < 0.4 {
            rate *= 1.2;
        }

        rate.clamp(0.02, 0.2)
    }

    /// Records an actual switch into the bounded history with performance
    /// snapshots of both sides.
    pub fn record_switch(
        &mut self,
        from: AlgorithmId,
        to: AlgorithmId,
        reason: String,
        tracker: &PerformanceTracker,
    ) -> SwitchEvent {
        let old = tracker.get(from);
        let new = tracker.get(to);
        let event = SwitchEvent {
            ts: chrono::Utc::now().timestamp_millis(),
            from_algo: from,
            to_algo: to,
            reason,
            old_algo: AlgorithmSnapshot {
                success_rate: old.success_rate,
                confidence: old.confidence_score,
            },
            new_algo: AlgorithmSnapshot {
                success_rate: new.success_rate,
                confidence: new.confidence_score,
            },
        };

        self.history.push_back(event.clone());
        while self.history.len() > self.params.history_capacity {
            self.history.pop_front();
        }
        event
    }

    /// Feeds one performance observation into the decayed memory series.
    pub fn observe(&mut self, algorithm: AlgorithmId, value: f64) {
        let memory = self.memory.entry(algorithm).or_default();
        memory.push_back(value);
        while memory.len() > self.params.memory_capacity {
            memory.pop_front();
        }
    }

    pub fn history(&self) -> &VecDeque<SwitchEvent> {
        &self.history
    }

    pub fn set_force_exploration(&mut self, value: bool) {
        self.force_exploration = value;
        tracing::info!(enabled = value, "force exploration toggled");
    }

    pub fn reset_forced_exploration(&mut self) {
        self.forced = ExplorationPhase::Armed;
        self.rotation_counter = 0;
    }

    /// Pushes the check counter to the re-arm threshold so the one-shot
    /// exploration can fire again on the next decision.
    pub fn force_rotation(&mut self) {
        self.rotation_counter = self.params.rearm_checks;
    }

    pub fn exploration_phase(&self) -> ExplorationPhase {
        self.forced
    }

    pub fn state(&self) -> SwitcherState {
        SwitcherState {
            forced_phase: self.forced,
            rotation_counter: self.rotation_counter,
            memory: self
                .memory
                .iter()
                .map(|(algo, series)| (algo.id(), series.iter().copied().collect()))
                .collect(),
        }
    }

    pub fn restore(&mut self, state: SwitcherState, history: Vec<SwitchEvent>) {
        self.forced = state.forced_phase;
        self.rotation_counter = state.rotation_counter;
        self.memory.clear();
        for (raw, series) in state.memory {
            match AlgorithmId::try_from(raw) {
                Ok(algo) => {
                    self.memory.insert(algo, series.into_iter().collect());
                }
                Err(err) => {
                    tracing::warn!(error = %err, "dropping memory series with bad algorithm id");
                }
            }
        }
        self.history = history.into_iter().collect();
        while self.history.len() > self.params.history_capacity {
            self.history.pop_front();
        }
    }
}
