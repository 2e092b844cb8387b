use thiserror::Error;

/// Everything the engine can surface to a caller. All variants are
/// recoverable: the conversation keeps its last-known-good state and the
/// caller decides whether to retry.
#[derive(Debug, Clone, Error)]
pub enum ChatError {
    #[error("failed to fetch messages: {body}")]
    FetchFailed { status: Option<u16>, body: String },

    #[error("failed to send message: {body}")]
    SendFailed { status: Option<u16>, body: String },

    #[error("failed to delete message: {body}")]
    DeleteFailed { status: Option<u16>, body: String },

    #[error("local store unavailable: {0}")]
    StorageUnavailable(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ChatError {
    pub fn fetch(status: Option<u16>, body: impl Into<String>) -> Self {
        Self::FetchFailed { status, body: body.into() }
    }

    pub fn send(status: Option<u16>, body: impl Into<String>) -> Self {
        Self::SendFailed { status, body: body.into() }
    }

    pub fn delete(status: Option<u16>, body: impl Into<String>) -> Self {
        Self::DeleteFailed { status, body: body.into() }
    }

    /// HTTP status of the failed request, when one was received at all.
    /// Timeouts and connection errors carry no status.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::FetchFailed { status, .. }
            | Self::SendFailed { status, .. }
            | Self::DeleteFailed { status, .. } => *status,
            Self::StorageUnavailable(_) | Self::Config(_) => None,
        }
    }
}
