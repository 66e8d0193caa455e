use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::decision::SwitcherState;
use crate::learning::LearnerSnapshot;
use crate::types::{Category, Forecast, PerformanceRecord, SwitchEvent};

/// Full persisted state of one category pipeline. Algorithm ids are carried
/// as raw integers and validated when the snapshot is restored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSnapshot {
    pub current_algorithm: u8,
    pub records: HashMap<u8, PerformanceRecord>,
    pub switch_history: Vec<SwitchEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub switcher: Option<SwitcherState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learner: Option<LearnerSnapshot>,
    pub updated_at: i64,
}

/// Narrow storage contract injected into the engine. Snapshot writes are
/// whole-value replacements; a failed write must leave the previous
/// snapshot intact.
#[async_trait]
pub trait ForecastStore: Send + Sync {
    async fn load_performance(
        &self,
        category: Category,
    ) -> Result<Option<PerformanceSnapshot>, String>;

    async fn save_performance(
        &self,
        category: Category,
        snapshot: &PerformanceSnapshot,
    ) -> Result<(), String>;

    async fn get_cached(&self, category: Category, period: &str)
        -> Result<Option<Forecast>, String>;

    async fn save_cached(&self, category: Category, forecast: &Forecast) -> Result<(), String>;
}

/// In-memory store for tests and embedding without a database.
#[derive(Default)]
pub struct MemoryStore {
    performance: Mutex<HashMap<Category, PerformanceSnapshot>>,
    cache: Mutex<HashMap<(Category, String), Forecast>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ForecastStore for MemoryStore {
    async fn load_performance(
        &self,
        category: Category,
    ) -> Result<Option<PerformanceSnapshot>, String> {
        Ok(self.performance.lock().get(&category).cloned())
    }

    async fn save_performance(
        &self,
        category: Category,
        snapshot: &PerformanceSnapshot,
    ) -> Result<(), String> {
        self.performance.lock().insert(category, snapshot.clone());
        Ok(())
    }

    async fn get_cached(
        &self,
        category: Category,
        period: &str,
    ) -> Result<Option<Forecast>, String> {
        Ok(self
            .cache
            .lock()
            .get(&(category, period.to_string()))
            .cloned())
    }

    async fn save_cached(&self, category: Category, forecast: &Forecast) -> Result<(), String> {
        self.cache
            .lock()
            .insert((category, forecast.period.clone()), forecast.clone());
        Ok(())
    }
}
