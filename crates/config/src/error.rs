use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("obfuscation salt must not be empty")]
    EmptySalt,

    #[error("revealed bytes are not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("{message}")]
    Message { message: String },
}

impl genchat_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

genchat_common::impl_context!();
