pub mod trend;

pub use trend::{TrendAnalyzer, TrendReading};
