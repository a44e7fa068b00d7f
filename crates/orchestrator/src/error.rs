use thiserror::Error;

/// Error kinds surfaced by the orchestrator (spec §7): everything else
/// degrades to a reply rather than reaching this enum.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("pending-turn queue full for this pair")]
    Busy,

    #[error("character not found: {0}")]
    NotFound(String),

    #[error("turn deadline exceeded")]
    TurnTimeout,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for OrchestratorError {
    fn from(err: anyhow::Error) -> Self {
        OrchestratorError::Internal(err.to_string())
    }
}

impl From<charcore_storage::StorageError> for OrchestratorError {
    fn from(err: charcore_storage::StorageError) -> Self {
        OrchestratorError::Internal(err.to_string())
    }
}
