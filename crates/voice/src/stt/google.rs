//! Google Cloud Speech-to-Text provider implementation.
//!
//! Uses the synchronous `speech:recognize` REST endpoint with API key
//! authentication. Interim results for live input come from
//! [`crate::BufferedRecognizer`] re-submitting the accumulated clip.

use {
    anyhow::{Context, Result, anyhow},
    async_trait::async_trait,
    base64::Engine,
    reqwest::Client,
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
    tracing::debug,
};

use {
    super::{AudioFormat, SttProvider, TranscribeRequest, Transcript},
    crate::config::GoogleSttConfig,
};

/// Google Cloud Speech-to-Text API base URL.
const API_BASE: &str = "https://speech.googleapis.com";

/// Google Cloud STT provider.
#[derive(Clone)]
pub struct GoogleStt {
    client: Client,
    api_key: Option<Secret<String>>,
    language: Option<String>,
    model: Option<String>,
    base_url: String,
}

impl std::fmt::Debug for GoogleStt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleStt")
            .field("api_key", &"[REDACTED]")
            .field("language", &self.language)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GoogleStt {
    /// Create a new Google STT provider.
    #[must_use]
    pub fn new(api_key: Option<Secret<String>>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            language: None,
            model: None,
            base_url: API_BASE.into(),
        }
    }

    /// Build from the `[voice.stt.google]` config section.
    #[must_use]
    pub fn from_config(config: &GoogleSttConfig, language: Option<String>) -> Self {
        Self {
            language,
            model: config.model.clone(),
            ..Self::new(config.api_key.clone())
        }
    }

    /// Point the provider at a different endpoint (used by tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn api_key(&self) -> Result<&Secret<String>> {
        self.api_key
            .as_ref()
            .ok_or_else(|| anyhow!("Google Cloud API key not configured"))
    }

    /// Map our AudioFormat to Google's encoding enum.
    fn encoding(format: AudioFormat) -> &'static str {
        match format {
            AudioFormat::Pcm => "LINEAR16",
            AudioFormat::Mp3 => "MP3",
            AudioFormat::Opus => "OGG_OPUS",
            AudioFormat::Flac => "FLAC",
        }
    }

    fn build_request(&self, request: &TranscribeRequest) -> GoogleRequest {
        let language_code = request
            .language
            .clone()
            .or_else(|| self.language.clone())
            .unwrap_or_else(|| "en-US".to_string());

        GoogleRequest {
            config: GoogleRecognitionConfig {
                encoding: Self::encoding(request.format),
                sample_rate_hertz: request.sample_rate,
                language_code,
                enable_automatic_punctuation: true,
                model: self.model.clone(),
            },
            audio: GoogleAudio {
                content: base64::engine::general_purpose::STANDARD.encode(&request.audio),
            },
        }
    }
}

#[async_trait]
impl SttProvider for GoogleStt {
    fn id(&self) -> &'static str {
        "google"
    }

    fn name(&self) -> &'static str {
        "Google Cloud"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn transcribe(&self, request: TranscribeRequest) -> Result<Transcript> {
        let api_key = self.api_key()?;
        let body = self.build_request(&request);
        let url = format!("{}/v1/speech:recognize", self.base_url);

        debug!(
            bytes = request.audio.len(),
            encoding = body.config.encoding,
            "google transcription request"
        );

        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key.expose_secret())])
            .json(&body)
            .send()
            .await
            .context("failed to send Google transcription request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Google transcription request failed: {} - {}",
                status,
                body
            ));
        }

        let google_response: GoogleResponse = response
            .json()
            .await
            .context("failed to parse Google response")?;

        Ok(google_response.into_transcript())
    }
}

// ── API Types ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GoogleRequest {
    config: GoogleRecognitionConfig,
    audio: GoogleAudio,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleRecognitionConfig {
    encoding: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sample_rate_hertz: Option<u32>,
    language_code: String,
    enable_automatic_punctuation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
}

#[derive(Debug, Serialize)]
struct GoogleAudio {
    content: String,
}

#[derive(Debug, Deserialize, Default)]
struct GoogleResponse {
    #[serde(default)]
    results: Vec<GoogleResult>,
}

impl GoogleResponse {
    /// Long clips come back as consecutive results; join their best
    /// alternatives in order.
    fn into_transcript(self) -> Transcript {
        let language = self.results.first().and_then(|r| r.language_code.clone());
        let mut confidence = None;
        let text = self
            .results
            .into_iter()
            .filter_map(|r| r.alternatives.into_iter().next())
            .map(|alt| {
                confidence = confidence.or(alt.confidence);
                alt.transcript.trim().to_string()
            })
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        Transcript {
            text,
            language,
            confidence,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleResult {
    #[serde(default)]
    alternatives: Vec<GoogleAlternative>,
    #[serde(default)]
    language_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleAlternative {
    transcript: String,
    #[serde(default)]
    confidence: Option<f32>,
}
