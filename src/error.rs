use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("empty outcome history")]
    EmptyHistory,

    #[error("malformed period identifier: {0}")]
    BadPeriod(String),

    #[error("unknown category: {0}")]
    UnknownCategory(String),

    #[error("forecast unavailable for {category}: {detail}")]
    ForecastUnavailable { category: String, detail: String },

    #[error("no pending forecast for {category} period {period}")]
    NoPendingForecast { category: String, period: String },

    #[error("storage error: {0}")]
    Storage(String),
}
