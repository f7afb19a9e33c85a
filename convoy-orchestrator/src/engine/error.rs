//! Engine error type

use convoy_client::ClientError;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed submission, rejected before any write
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("remote error: {0}")]
    Remote(#[from] ClientError),

    /// A bounded retry loop gave up
    #[error("gave up after {attempts} attempts: {source}")]
    RetryExhausted { attempts: u32, source: ClientError },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => EngineError::NotFound(what),
            StoreError::Conflict(what) => EngineError::Conflict(what),
            other => EngineError::Store(other),
        }
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
