/// Failure taxonomy of a backend call as seen by a client.
///
/// Malformed timestamps are deliberately absent: they normalize to a sentinel
/// instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// No response was received.
    #[error("transport error ({status}): {message}")]
    Transport { status: u16, message: String },

    /// A response arrived with `success: false`.
    #[error("backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    /// A response arrived but its body could not be understood.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn status(&self) -> u16 {
        match self {
            Self::Transport { status, .. } | Self::Backend { status, .. } => *status,
            Self::Decode(_) => 500,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Transport { message, .. } | Self::Backend { message, .. } => message,
            Self::Decode(message) => message,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
