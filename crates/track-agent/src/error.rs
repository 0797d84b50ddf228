use thiserror::Error;

/// Failure of a single flush request.
///
/// Never surfaced to `track()` callers: the agent logs it and keeps the
/// batch buffered for the next trigger.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Batch rejected by server (HTTP 422)")]
    Rejected,

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Failed to encode batch: {0}")]
    Encode(String),
}

impl TransportError {
    /// Whether the server looked at the batch and refused it.
    /// Retrying such a batch unchanged cannot succeed.
    pub fn is_rejection(&self) -> bool {
        matches!(self, TransportError::Rejected)
    }
}

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Tracker must be started from within a tokio runtime")]
    NoRuntime,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Transport setup failed: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;
