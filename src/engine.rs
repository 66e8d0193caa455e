use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use rand::Rng;

use crate::config::{EngineConfig, SelectionPolicy};
use crate::decision::{ExplorationPhase, SwitchDecisionEngine, SwitcherState};
use crate::error::EngineError;
use crate::judge;
use crate::learning::{features, ReinforcementSelector};
use crate::modeling::TrendAnalyzer;
use crate::persistence::{ForecastStore, PerformanceSnapshot};
use crate::tracker::PerformanceTracker;
use crate::types::{
    next_period, AlgorithmId, Category, CategoryStatus, Forecast, OutcomeRecord,
};

/// Pluggable scoring formula for one category. Errors surface as a
/// forecast-unavailable condition, never as a crash.
pub trait Forecaster: Send + Sync {
    fn forecast(
        &self,
        category: Category,
        history: &[OutcomeRecord],
        algorithm: AlgorithmId,
    ) -> Result<String, String>;
}

struct PendingForecast {
    label: String,
    algorithm: AlgorithmId,
    confidence: f64,
    state_key: Option<String>,
    ts: i64,
}

struct CategoryPipeline {
    category: Category,
    policy: SelectionPolicy,
    current: AlgorithmId,
    tracker: PerformanceTracker,
    trend: TrendAnalyzer,
    switcher: SwitchDecisionEngine,
    learner: ReinforcementSelector,
    // At most one in-flight forecast per category; a newer period
    // supersedes an unverified older one.
    pending: Option<(String, PendingForecast)>,
    latest_state: Option<String>,
    iteration_count: u32,
    last_save: Instant,
}

impl CategoryPipeline {
    fn new(category: Category, config: &EngineConfig) -> Self {
        let policy = config.policy(category);
        let current = match policy {
            SelectionPolicy::Pinned(algo) => algo,
            _ => AlgorithmId::Formula1,
        };

        Self {
            category,
            policy,
            current,
            tracker: PerformanceTracker::new(&config.tracker),
            trend: TrendAnalyzer::new(config.trend.clone()),
            switcher: SwitchDecisionEngine::new(config.switch.clone()),
            learner: ReinforcementSelector::new(&config.learner),
            pending: None,
            latest_state: None,
            iteration_count: 0,
            last_save: Instant::now(),
        }
    }

    fn restore(&mut self, config: &EngineConfig, snapshot: PerformanceSnapshot) {
        match AlgorithmId::try_from(snapshot.current_algorithm) {
            Ok(algo) => {
                self.current = match self.policy {
                    SelectionPolicy::Pinned(pinned) => pinned,
                    _ => algo,
                };
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    category = %self.category,
                    "persisted current algorithm invalid, keeping default"
                );
            }
        }

        let mut records = HashMap::new();
        for (raw, record) in snapshot.records {
            match AlgorithmId::try_from(raw) {
                Ok(algo) => {
                    records.insert(algo, record);
                }
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        category = %self.category,
                        "dropping performance record with bad algorithm id"
                    );
                }
            }
        }
        self.tracker = PerformanceTracker::from_records(&config.tracker, records);

        let switcher_state = snapshot.switcher.unwrap_or(SwitcherState {
            forced_phase: ExplorationPhase::Armed,
            rotation_counter: 0,
            memory: HashMap::new(),
        });
        self.switcher.restore(switcher_state, snapshot.switch_history);

        if self.policy == SelectionPolicy::Learning {
            if let Some(learner) = snapshot.learner {
                self.learner.restore(learner);
            }
        }
    }

    fn snapshot(&self) -> PerformanceSnapshot {
        PerformanceSnapshot {
            current_algorithm: self.current.id(),
            records: self
                .tracker
                .records()
                .iter()
                .map(|(algo, record)| (algo.id(), record.clone()))
                .collect(),
            switch_history: self.switcher.history().iter().cloned().collect(),
            switcher: Some(self.switcher.state()),
            learner: (self.policy == SelectionPolicy::Learning)
                .then(|| self.learner.snapshot()),
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    fn status(&self) -> CategoryStatus {
        let perf = self.tracker.get(self.current);
        let learning = self.policy == SelectionPolicy::Learning;
        CategoryStatus {
            category: self.category,
            current_algorithm: self.current,
            total_predictions: perf.total_predictions,
            success_rate: perf.success_rate,
            recent_success_rate: perf.recent_success_rate,
            confidence: perf.confidence_score,
            consecutive_correct: perf.consecutive_correct,
            consecutive_wrong: perf.consecutive_wrong,
            switch_count: self.switcher.history().len(),
            learning_rate: learning.then(|| self.learner.learning_rate()),
            exploration_rate: learning.then(|| self.learner.exploration_rate()),
        }
    }

    /// Replays the in-flight forecast for `period`, if any.
    fn replay_pending(&self, period: &str) -> Option<Forecast> {
        let (stored, pending) = self.pending.as_ref()?;
        if stored != period {
            return None;
        }
        Some(Forecast {
            category: self.category,
            period: stored.clone(),
            label: pending.label.clone(),
            algorithm: pending.algorithm,
            confidence: pending.confidence,
            ts: pending.ts,
        })
    }

    fn take_pending(&mut self, period: &str) -> Option<PendingForecast> {
        match &self.pending {
            Some((stored, _)) if stored == period => self.pending.take().map(|(_, p)| p),
            _ => None,
        }
    }

    fn apply_switch(&mut self, next: AlgorithmId, reason: String) {
        let event = self
            .switcher
            .record_switch(self.current, next, reason, &self.tracker);
        self.tracker.mark_switch(self.current, next);
        tracing::info!(
            category = %self.category,
            from = %event.from_algo,
            to = %event.to_algo,
            reason = %event.reason,
            "algorithm switched"
        );
        self.current = next;
    }
}

/// Per-category adaptive selection orchestrator: runs the switch policy or
/// the learner, invokes the pluggable forecaster, caches one result per
/// period, and persists performance state through the injected store.
pub struct ForecastEngine {
    config: EngineConfig,
    store: Option<Arc<dyn ForecastStore>>,
    forecasters: HashMap<Category, Arc<dyn Forecaster>>,
    pipelines: Arc<RwLock<HashMap<Category, CategoryPipeline>>>,
}

impl ForecastEngine {
    pub fn new(config: EngineConfig, store: Option<Arc<dyn ForecastStore>>) -> Self {
        Self {
            config,
            store,
            forecasters: HashMap::new(),
            pipelines: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn register_forecaster(&mut self, category: Category, forecaster: Arc<dyn Forecaster>) {
        self.forecasters.insert(category, forecaster);
    }

    /// Issues (or replays) the forecast for the period following the latest
    /// entry of `history`. A cached result short-circuits all selection
    /// logic.
    pub async fn forecast(
        &self,
        category: Category,
        history: &[OutcomeRecord],
    ) -> Result<Forecast, EngineError> {
        let latest = history.first().ok_or(EngineError::EmptyHistory)?;
        let period = next_period(&latest.period)?;

        if let Some(store) = &self.store {
            match store.get_cached(category, &period).await {
                Ok(Some(cached)) => return Ok(cached),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(error = %err, category = %category, "cache lookup failed");
                }
            }
        }

        let mut guard = self.pipelines.write().await;
        let pipeline = self.pipeline_mut(&mut *guard, category).await;

        if let Some(replayed) = pipeline.replay_pending(&period) {
            return Ok(replayed);
        }

        let forecaster = self.forecasters.get(&category).cloned().ok_or_else(|| {
            EngineError::ForecastUnavailable {
                category: category.to_string(),
                detail: "no forecaster registered".to_string(),
            }
        })?;

        let (algorithm, confidence, state_key) = {
            let mut rng = rand::rng();
            match pipeline.policy {
                SelectionPolicy::Pinned(algo) => {
                    (algo, pipeline.tracker.get(algo).confidence_score, None)
                }
                SelectionPolicy::RuleBased => {
                    let decision = pipeline.switcher.decide(
                        &mut rng,
                        pipeline.current,
                        &pipeline.tracker,
                        &pipeline.trend,
                    );
                    if decision.switched {
                        pipeline.apply_switch(decision.next, decision.reason);
                    }
                    let algo = pipeline.current;
                    (algo, pipeline.tracker.get(algo).confidence_score, None)
                }
                SelectionPolicy::Learning => {
                    let state = features::state_key(&features::extract(history, category));
                    let algo = pipeline.learner.select(&mut rng, &state);
                    if algo != pipeline.current {
                        pipeline.apply_switch(algo, "强化学习选择".to_string());
                    }
                    pipeline.latest_state = Some(state.clone());
                    let confidence = pipeline.learner.q_value(&state, algo).clamp(0.1, 0.95);
                    (algo, confidence, Some(state))
                }
            }
        };

        let label = forecaster
            .forecast(category, history, algorithm)
            .map_err(|detail| EngineError::ForecastUnavailable {
                category: category.to_string(),
                detail,
            })?;

        let forecast = Forecast {
            category,
            period: period.clone(),
            label: label.clone(),
            algorithm,
            confidence,
            ts: chrono::Utc::now().timestamp_millis(),
        };

        pipeline.pending = Some((
            period.clone(),
            PendingForecast {
                label,
                algorithm,
                confidence,
                state_key,
                ts: forecast.ts,
            },
        ));
        drop(guard);

        if let Some(store) = &self.store {
            if let Err(err) = store.save_cached(category, &forecast).await {
                tracing::warn!(error = %err, category = %category, "caching forecast failed");
            }
        }

        Ok(forecast)
    }

    /// Scores the forecast issued for `period` against the actual outcome
    /// and feeds the result through the tracker, trend series and (for
    /// learning categories) the Q-learner. Returns whether it was correct.
    pub async fn verify(
        &self,
        category: Category,
        period: &str,
        actual: &OutcomeRecord,
    ) -> Result<bool, EngineError> {
        let mut guard = self.pipelines.write().await;
        self.pipeline_mut(&mut *guard, category).await;

        let pending = guard
            .get_mut(&category)
            .and_then(|p| p.take_pending(period));

        let pending = match pending {
            Some(pending) => pending,
            None => {
                let cached = match &self.store {
                    Some(store) => store.get_cached(category, period).await.unwrap_or_else(|err| {
                        tracing::warn!(error = %err, category = %category, "cache lookup failed");
                        None
                    }),
                    None => None,
                };
                match cached {
                    Some(forecast) => PendingForecast {
                        label: forecast.label,
                        algorithm: forecast.algorithm,
                        confidence: forecast.confidence,
                        state_key: None,
                        ts: forecast.ts,
                    },
                    None => {
                        tracing::warn!(
                            category = %category,
                            period = %period,
                            "verification requested for unknown period"
                        );
                        return Err(EngineError::NoPendingForecast {
                            category: category.to_string(),
                            period: period.to_string(),
                        });
                    }
                }
            }
        };

        let correct = judge::is_correct(category, &pending.label, actual);

        let snapshot = {
            let pipeline = self.pipeline_mut(&mut *guard, category).await;

            let record = pipeline.tracker.record(pending.algorithm, correct).clone();
            pipeline.trend.update(pending.algorithm, record.confidence_score);
            pipeline
                .switcher
                .observe(pending.algorithm, record.confidence_score);

            let mut snapshot_now = false;
            if pipeline.policy == SelectionPolicy::Learning {
                if let Some(state) = pending.state_key.as_deref() {
                    let next_state = pipeline
                        .latest_state
                        .clone()
                        .unwrap_or_else(|| state.to_string());
                    let reward = ReinforcementSelector::reward(correct, pending.confidence);
                    pipeline
                        .learner
                        .update(state, pending.algorithm, reward, &next_state);
                    pipeline.iteration_count += 1;
                    pipeline
                        .learner
                        .adapt(record.success_rate, pipeline.iteration_count);

                    let mut rng = rand::rng();
                    snapshot_now = rng.random::<f64>() < self.config.learner.save_probability;
                } else {
                    tracing::debug!(
                        category = %category,
                        period = %period,
                        "no state recorded at forecast time, skipping learner update"
                    );
                }
            }

            let due = pipeline.last_save.elapsed()
                >= Duration::from_secs(self.config.save_interval_secs);
            if snapshot_now || due {
                pipeline.last_save = Instant::now();
                Some(pipeline.snapshot())
            } else {
                None
            }
        };
        drop(guard);

        if let (Some(snapshot), Some(store)) = (snapshot, &self.store) {
            if let Err(err) = store.save_performance(category, &snapshot).await {
                tracing::warn!(error = %err, category = %category, "saving performance snapshot failed");
            }
        }

        Ok(correct)
    }

    /// Current selection and performance per initialized category.
    pub async fn status(&self) -> Vec<CategoryStatus> {
        let guard = self.pipelines.read().await;
        Category::ALL
            .iter()
            .filter_map(|category| guard.get(category).map(|p| p.status()))
            .collect()
    }

    /// Writes snapshots for every pipeline whose save interval elapsed, or
    /// for all of them when forced.
    pub async fn save(&self, force: bool) -> Result<(), EngineError> {
        let Some(store) = &self.store else {
            return Ok(());
        };

        let snapshots: Vec<(Category, PerformanceSnapshot)> = {
            let mut guard = self.pipelines.write().await;
            guard
                .iter_mut()
                .filter_map(|(category, pipeline)| {
                    let due = force
                        || pipeline.last_save.elapsed()
                            >= Duration::from_secs(self.config.save_interval_secs);
                    if due {
                        pipeline.last_save = Instant::now();
                        Some((*category, pipeline.snapshot()))
                    } else {
                        None
                    }
                })
                .collect()
        };

        for (category, snapshot) in snapshots {
            store
                .save_performance(category, &snapshot)
                .await
                .map_err(EngineError::Storage)?;
        }
        Ok(())
    }

    pub async fn set_force_exploration(&self, category: Category, value: bool) {
        let mut guard = self.pipelines.write().await;
        let pipeline = self.pipeline_mut(&mut *guard, category).await;
        pipeline.switcher.set_force_exploration(value);
    }

    /// Re-arms the one-shot forced exploration for every category.
    pub async fn reset_forced_exploration(&self) {
        let mut guard = self.pipelines.write().await;
        for pipeline in guard.values_mut() {
            pipeline.switcher.reset_forced_exploration();
        }
        tracing::info!("forced exploration reset for all categories");
    }

    /// Pushes one category (or all) to the rotation threshold so the next
    /// decision can re-arm exploration.
    pub async fn force_rotation(&self, category: Option<Category>) {
        let mut guard = self.pipelines.write().await;
        match category {
            Some(category) => {
                let pipeline = self.pipeline_mut(&mut *guard, category).await;
                pipeline.switcher.force_rotation();
            }
            None => {
                for pipeline in guard.values_mut() {
                    pipeline.switcher.force_rotation();
                }
            }
        }
    }

    async fn pipeline_mut<'a>(
        &self,
        guard: &'a mut HashMap<Category, CategoryPipeline>,
        category: Category,
    ) -> &'a mut CategoryPipeline {
        match guard.entry(category) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(self.init_pipeline(category).await),
        }
    }

    async fn init_pipeline(&self, category: Category) -> CategoryPipeline {
        let mut pipeline = CategoryPipeline::new(category, &self.config);
        if let Some(store) = &self.store {
            match store.load_performance(category).await {
                Ok(Some(snapshot)) => {
                    pipeline.restore(&self.config, snapshot);
                    tracing::info!(category = %category, "restored persisted performance state");
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        category = %category,
                        "loading persisted state failed, starting fresh"
                    );
                }
            }
        }
        pipeline
    }
}
