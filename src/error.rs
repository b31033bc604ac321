use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("weights of {list} sum to {sum:.4}, expected 1.0")]
    InvalidWeights { list: String, sum: f64 },

    #[error("response for item {item} is {value}, expected 1-5")]
    ResponseOutOfRange { item: String, value: i32 },

    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("instrument registered twice: {0}")]
    DuplicateInstrument(String),

    #[error("blend weights {supervisor} / {self_weight} do not sum to 1.0")]
    InvalidBlendWeights { supervisor: f64, self_weight: f64 },

    #[error("sample is empty")]
    EmptySample,

    #[error("paired samples differ in length ({left} vs {right})")]
    LengthMismatch { left: usize, right: usize },

    #[error("sample needs at least {needed} values, got {got}")]
    InsufficientSample { needed: usize, got: usize },

    #[error("percentile must be within 0-100, got {0}")]
    InvalidPercentile(f64),

    #[error("remote scoring unavailable: {0}")]
    Remote(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
