//! Voice configuration types.

use {
    secrecy::Secret,
    serde::{Deserialize, Serialize},
};

/// Top-level voice configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub stt: SttConfig,
}

/// Speech-to-Text configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// Enable voice input.
    pub enabled: bool,

    /// Provider used for transcription: "google".
    pub provider: String,

    /// Language hint (BCP-47, e.g. "en-US").
    pub language: Option<String>,

    /// Sample rate of captured PCM audio in Hz.
    pub sample_rate: u32,

    /// How much captured audio accumulates before an interim transcript is
    /// requested, in milliseconds.
    pub interim_interval_ms: u64,

    /// Google Cloud Speech-to-Text settings.
    pub google: GoogleSttConfig,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "google".into(),
            language: None,
            sample_rate: 16_000,
            interim_interval_ms: 1_500,
            google: GoogleSttConfig::default(),
        }
    }
}

/// Google Cloud Speech-to-Text configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSttConfig {
    /// API key (from GOOGLE_STT_API_KEY env or config).
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_option_secret",
        deserialize_with = "deserialize_option_secret"
    )]
    pub api_key: Option<Secret<String>>,

    /// Model variant (e.g., "latest_long", "latest_short").
    pub model: Option<String>,
}

// ── Secret serialization helpers ───────────────────────────────────────────

fn serialize_option_secret<S>(
    value: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use secrecy::ExposeSecret;
    match value {
        Some(secret) => serializer.serialize_some(secret.expose_secret()),
        None => serializer.serialize_none(),
    }
}

fn deserialize_option_secret<'de, D>(deserializer: D) -> Result<Option<Secret<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.map(Secret::new))
}
