use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(String),
    #[error("corrupt data file {path}: {reason}")]
    Corrupt { path: String, reason: String },
    #[error("backend error: {0}")]
    Backend(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl ServiceError {
    pub fn empty_key() -> Self { Self::Validation("key must not be empty".into()) }
}

impl From<std::io::Error> for ServiceError {
    fn from(e: std::io::Error) -> Self { Self::Io(e.to_string()) }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for ServiceError {
    fn from(e: redis::RedisError) -> Self { Self::Backend(e.to_string()) }
}
