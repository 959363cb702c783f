use thiserror::Error;

/// Errors raised by the rating and feature engine and the model plumbing around it.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("match history is empty, ratings cannot be established")]
    EmptyHistory,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("model for market '{market}' is not trained, run `goalcast train` first")]
    ModelNotTrained { market: String },

    #[error("feature schema mismatch: expected {expected} fields, found {found}")]
    SchemaMismatch { expected: usize, found: usize },

    #[error("invalid model artifact: {0}")]
    InvalidModel(String),

    #[error("not enough training data: {0}")]
    TrainingData(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
