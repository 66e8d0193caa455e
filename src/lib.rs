pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod judge;
pub mod learning;
pub mod modeling;
pub mod persistence;
pub mod tracker;
pub mod types;

pub use config::{EngineConfig, SelectionPolicy};
pub use engine::{ForecastEngine, Forecaster};
pub use error::EngineError;
pub use persistence::{ForecastStore, MemoryStore, PerformanceSnapshot};
pub use tracker::PerformanceTracker;
pub use types::*;
