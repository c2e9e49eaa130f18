//! Error taxonomy for workspace operations.

use cc_agent::{LlmError, ReasoningError, ServiceError};
use ideaspace::{LifecycleError, StoreError};

/// Error types for the strategist.
#[derive(Debug, thiserror::Error)]
pub enum StrategistError {
    /// Record not found
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Caller supplied something unusable
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration could not be loaded or applied
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Store(StoreError),

    /// Illegal lifecycle transition
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Validation, exploration or planning failed
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Backend could not be set up
    #[error("Backend error: {0}")]
    Backend(#[from] LlmError),
}

impl StrategistError {
    /// Whether the failure came from the reasoning model's output.
    pub fn is_malformed_reasoning(&self) -> bool {
        matches!(
            self,
            Self::Service(ServiceError::Reasoning(ReasoningError::Malformed { .. }))
        )
    }
}

impl From<StoreError> for StrategistError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, id } => Self::NotFound { kind, id },
            other => Self::Store(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, StrategistError>;
