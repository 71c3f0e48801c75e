use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("collect source not found: {0}")]
    SourceNotFound(String),

    #[error("collect source disabled: {0}")]
    SourceDisabled(String),

    #[error("invalid collection window: {0} hours")]
    InvalidWindow(i64),

    #[error("page probe failed: {0}")]
    ProbeFailed(String),

    #[error("payload decode failed: {0}")]
    Decode(String),

    #[error("http request failed: {0}")]
    Http(String),

    #[error("storage operation failed: {0}")]
    Storage(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        EngineError::Http(e.to_string())
    }
}

impl From<redis::RedisError> for EngineError {
    fn from(e: redis::RedisError) -> Self {
        EngineError::Storage(e.to_string())
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(e: sqlx::Error) -> Self {
        EngineError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Decode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
