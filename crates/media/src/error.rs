use std::error::Error as StdError;

/// Why an attachment could not be normalized. Every variant is terminal for
/// the attempt.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bytes missing, unreadable or not decodable as claimed, or the MIME
    /// type could not be determined.
    #[error("{message}")]
    Data {
        message: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
    /// MIME type or extension outside image/video/pdf/text.
    #[error("unsupported media type: {what}")]
    UnsupportedType { what: String },
    /// The thumbnail renderer failed or is not installed.
    #[error("thumbnail generation failed: {message}")]
    ThumbnailGeneration {
        message: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
}

impl Error {
    #[must_use]
    pub fn data(message: impl Into<String>) -> Self {
        Self::Data {
            message: message.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn data_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Data {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    #[must_use]
    pub fn unsupported(what: impl Into<String>) -> Self {
        Self::UnsupportedType { what: what.into() }
    }

    #[must_use]
    pub fn thumbnail(message: impl Into<String>) -> Self {
        Self::ThumbnailGeneration {
            message: message.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn thumbnail_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::ThumbnailGeneration {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
