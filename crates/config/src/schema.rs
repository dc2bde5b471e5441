/// Config schema types (model, chat, media, voice, obfuscation).
use {
    genchat_chat::{service, staging::DEFAULT_MAX_ATTACHMENTS},
    genchat_media::{image_ops, text::DEFAULT_PREVIEW_CHARS},
    genchat_voice::VoiceConfig,
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

use crate::{
    error::{Context, Result},
    obfuscation::{DEFAULT_SALT, Obfuscator},
};

pub use genchat_providers::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GenChatConfig {
    pub model: ModelConfig,
    pub chat: ChatConfig,
    pub media: MediaConfig,
    pub voice: VoiceConfig,
    pub obfuscation: ObfuscationConfig,
}

/// Generative model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Only "gemini" is supported.
    pub provider: String,
    pub model: String,
    pub base_url: String,
    /// API key in plain text (from GEMINI_API_KEY / GENCHAT_API_KEY or config).
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<Secret<String>>,
    /// API key obfuscated with `[obfuscation].salt`, as a byte array.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_obfuscated: Option<Vec<u8>>,
    pub max_output_tokens: Option<u32>,
    pub system_instruction: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".into(),
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: None,
            api_key_obfuscated: None,
            max_output_tokens: None,
            system_instruction: None,
        }
    }
}

impl ModelConfig {
    /// The plain key if set, otherwise the revealed obfuscated key.
    pub fn resolve_api_key(&self, obfuscator: &Obfuscator) -> Result<Option<Secret<String>>> {
        if let Some(ref key) = self.api_key
            && !key.expose_secret().is_empty()
        {
            return Ok(Some(key.clone()));
        }
        match self.api_key_obfuscated {
            Some(ref bytes) if !bytes.is_empty() => {
                let key = obfuscator
                    .reveal(bytes)
                    .context("model.api_key_obfuscated")?;
                Ok(Some(Secret::new(key)))
            },
            _ => Ok(None),
        }
    }
}

/// Chat session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub greeting: String,
    /// Assistant text recorded when the model call fails.
    pub failure_message: String,
    /// Stream replies as they are generated.
    pub stream: bool,
    pub max_attachments: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            greeting: service::DEFAULT_GREETING.into(),
            failure_message: service::DEFAULT_FAILURE_MESSAGE.into(),
            stream: true,
            max_attachments: DEFAULT_MAX_ATTACHMENTS,
        }
    }
}

/// Attachment normalization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Largest width or height of images and thumbnails, in pixels.
    pub max_dimension: u32,
    /// JPEG quality for re-encoded images (1-100).
    pub jpeg_quality: u8,
    pub video_frame_offset_secs: f64,
    pub text_preview_chars: usize,
    /// Paths to external tools. Looked up on PATH when unset.
    pub ffmpeg_path: Option<String>,
    pub pdfinfo_path: Option<String>,
    pub pdftoppm_path: Option<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_dimension: image_ops::DEFAULT_MAX_DIMENSION,
            jpeg_quality: image_ops::DEFAULT_JPEG_QUALITY,
            video_frame_offset_secs: genchat_media::video::DEFAULT_FRAME_OFFSET.as_secs_f64(),
            text_preview_chars: DEFAULT_PREVIEW_CHARS,
            ffmpeg_path: None,
            pdfinfo_path: None,
            pdftoppm_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObfuscationConfig {
    pub salt: String,
}

impl Default for ObfuscationConfig {
    fn default() -> Self {
        Self {
            salt: DEFAULT_SALT.into(),
        }
    }
}

impl ObfuscationConfig {
    pub fn obfuscator(&self) -> Result<Obfuscator> {
        Obfuscator::new(&self.salt)
    }
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
