use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Rejected before anything was sent (empty or whitespace-only text).
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error(transparent)]
    Media(#[from] genchat_media::Error),

    #[error("attachment task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(message: impl std::fmt::Display) -> Self {
        Self::Message {
            message: message.to_string(),
        }
    }
}

impl genchat_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

genchat_common::impl_context!();
