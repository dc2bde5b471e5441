//! Speech-to-Text provider abstraction and implementations.

mod google;

pub use google::GoogleStt;

use {
    anyhow::Result,
    async_trait::async_trait,
    bytes::Bytes,
    serde::{Deserialize, Serialize},
};

/// Encoding of audio handed to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// Raw 16-bit little-endian mono PCM, as produced by the capture layer.
    #[default]
    Pcm,
    /// MP3 format.
    Mp3,
    /// Opus in OGG container.
    Opus,
    /// FLAC.
    Flac,
}

impl AudioFormat {
    /// MIME type for this format.
    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pcm => "audio/pcm",
            Self::Mp3 => "audio/mpeg",
            Self::Opus => "audio/ogg",
            Self::Flac => "audio/flac",
        }
    }
}

/// Request to transcribe audio to text.
#[derive(Debug, Clone)]
pub struct TranscribeRequest {
    /// Raw audio data.
    pub audio: Bytes,
    /// Audio format.
    pub format: AudioFormat,
    /// Sample rate in Hz. Required by most providers for raw PCM.
    pub sample_rate: Option<u32>,
    /// Language hint (e.g., "en-US").
    pub language: Option<String>,
}

/// Transcription result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    /// Transcribed text.
    pub text: String,
    /// Detected language.
    pub language: Option<String>,
    /// Confidence score (0.0 - 1.0).
    pub confidence: Option<f32>,
}

/// Speech-to-Text provider trait.
///
/// Implementations transcribe a complete audio clip in one request. Streaming
/// recognition is layered on top by [`crate::BufferedRecognizer`].
#[async_trait]
pub trait SttProvider: Send + Sync {
    /// Provider identifier (e.g., "google").
    fn id(&self) -> &'static str;

    /// Human-readable provider name.
    fn name(&self) -> &'static str;

    /// Check if the provider is configured and ready.
    fn is_configured(&self) -> bool;

    /// Transcribe audio to text.
    async fn transcribe(&self, request: TranscribeRequest) -> Result<Transcript>;
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_format_mime_type() {
        assert_eq!(AudioFormat::Pcm.mime_type(), "audio/pcm");
        assert_eq!(AudioFormat::Opus.mime_type(), "audio/ogg");
        assert_eq!(AudioFormat::default(), AudioFormat::Pcm);
    }

    #[test]
    fn test_transcript_serialization() {
        let transcript = Transcript {
            text: "Hello world".into(),
            language: Some("en-us".into()),
            confidence: Some(0.95),
        };

        let json = serde_json::to_string(&transcript).unwrap();
        assert!(json.contains("\"text\":\"Hello world\""));

        let parsed: Transcript = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.text, "Hello world");
        assert_eq!(parsed.language.as_deref(), Some("en-us"));
    }
}
