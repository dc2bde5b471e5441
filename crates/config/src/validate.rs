//! Configuration validation engine.
//!
//! Detects syntax errors, unknown or misspelled fields, and out-of-range
//! values.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use crate::schema::GenChatConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "range", "missing", "file-ref"
    pub category: &'static str,
    /// Dotted path, e.g. "media.max_dimension"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of validating a configuration file.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

// ── Schema tree for unknown-field detection ─────────────────────────────────

enum KnownKeys {
    Struct(HashMap<&'static str, KnownKeys>),
    /// Scalar or array value; recursion stops.
    Leaf,
}

fn build_schema_map() -> KnownKeys {
    use KnownKeys::{Leaf, Struct};

    let leaves = |keys: &[&'static str]| Struct(keys.iter().map(|k| (*k, Leaf)).collect());

    Struct(HashMap::from([
        (
            "model",
            leaves(&[
                "provider",
                "model",
                "base_url",
                "api_key",
                "api_key_obfuscated",
                "max_output_tokens",
                "system_instruction",
            ]),
        ),
        (
            "chat",
            leaves(&["greeting", "failure_message", "stream", "max_attachments"]),
        ),
        (
            "media",
            leaves(&[
                "max_dimension",
                "jpeg_quality",
                "video_frame_offset_secs",
                "text_preview_chars",
                "ffmpeg_path",
                "pdfinfo_path",
                "pdftoppm_path",
            ]),
        ),
        (
            "voice",
            Struct(HashMap::from([(
                "stt",
                Struct(HashMap::from([
                    ("enabled", Leaf),
                    ("provider", Leaf),
                    ("language", Leaf),
                    ("sample_rate", Leaf),
                    ("interim_interval_ms", Leaf),
                    ("google", leaves(&["api_key", "model"])),
                ])),
            )])),
        ),
        ("obfuscation", leaves(&["salt"])),
    ]))
}

const KNOWN_MODEL_PROVIDERS: &[&str] = &["gemini"];
const KNOWN_STT_PROVIDERS: &[&str] = &["google"];

// ── Levenshtein distance ────────────────────────────────────────────────────

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Closest candidate within `max_distance` edits, if any.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    let mut best: Option<(&'a str, usize)> = None;
    for &candidate in candidates {
        let d = levenshtein(needle, candidate);
        if d > 0 && d <= max_distance && best.as_ref().is_none_or(|(_, bd)| d < *bd) {
            best = Some((candidate, d));
        }
    }
    best.map(|(s, _)| s)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a config file at the given path, or discover the default config
/// file location if `path` is `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => crate::loader::find_config_file(),
    };

    let Some(ref actual_path) = config_path else {
        return ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Info,
                "file-ref",
                "",
                "no config file found; using defaults",
            )],
            config_path: None,
        };
    };

    let is_toml = actual_path
        .extension()
        .and_then(|e| e.to_str())
        .is_none_or(|e| e == "toml");

    let mut result = if is_toml {
        match std::fs::read_to_string(actual_path) {
            Ok(content) => validate_toml_str(&crate::env_subst::substitute_env(&content)),
            Err(e) => ValidationResult {
                diagnostics: vec![Diagnostic::new(
                    Severity::Error,
                    "syntax",
                    "",
                    format!("failed to read config file: {e}"),
                )],
                config_path: None,
            },
        }
    } else {
        let diagnostics = match crate::loader::load_config(actual_path) {
            Ok(config) => check_config(&config),
            Err(e) => vec![Diagnostic::new(
                Severity::Error,
                "type-error",
                "",
                e.to_string(),
            )],
        };
        ValidationResult {
            diagnostics,
            config_path: None,
        }
    };
    result.config_path = Some(actual_path.clone());
    result
}

/// Validate a TOML string without file-system side effects.
#[must_use]
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    let mut diagnostics = Vec::new();

    // 1. Syntax
    let toml_value: toml::Value = match toml::from_str(toml_str) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("TOML syntax error: {e}"),
            ));
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    // 2. Unknown fields
    check_unknown_fields(&toml_value, &build_schema_map(), "", &mut diagnostics);

    // 3. Types, then value ranges on the parsed config
    match toml::from_str::<GenChatConfig>(toml_str) {
        Ok(config) => diagnostics.extend(check_config(&config)),
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "type-error",
            "",
            format!("type error: {e}"),
        )),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

/// Walk the TOML value tree against the schema tree and flag unknown keys.
fn check_unknown_fields(
    value: &toml::Value,
    schema: &KnownKeys,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let (toml::Value::Table(table), KnownKeys::Struct(fields)) = (value, schema) else {
        return;
    };

    let known_keys: Vec<&str> = fields.keys().copied().collect();
    for (key, child_value) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        if let Some(child_schema) = fields.get(key.as_str()) {
            check_unknown_fields(child_value, child_schema, &path, diagnostics);
        } else {
            let level = if prefix.is_empty() {
                "at top level "
            } else {
                ""
            };
            let msg = match suggest(key, &known_keys, 3) {
                Some(s) => format!("unknown field {level}(did you mean \"{s}\"?)"),
                None => format!("unknown field {level}"),
            };
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "unknown-field",
                path,
                msg.trim(),
            ));
        }
    }
}

/// Range and consistency checks on a parsed config.
///
/// Run this after env overrides to also catch a missing API key.
#[must_use]
pub fn check_config(config: &GenChatConfig) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let mut push = |severity, category, path: &str, message: String| {
        diagnostics.push(Diagnostic::new(severity, category, path, message));
    };

    if !KNOWN_MODEL_PROVIDERS.contains(&config.model.provider.as_str()) {
        let hint = suggest(&config.model.provider, KNOWN_MODEL_PROVIDERS, 3)
            .map(|s| format!(" (did you mean \"{s}\"?)"))
            .unwrap_or_default();
        push(
            Severity::Error,
            "range",
            "model.provider",
            format!("unknown provider \"{}\"{hint}", config.model.provider),
        );
    }
    if config.model.model.trim().is_empty() {
        push(Severity::Error, "range", "model.model", "model name is empty".into());
    }
    if config.model.api_key.is_none() && config.model.api_key_obfuscated.is_none() {
        push(
            Severity::Warning,
            "missing",
            "model.api_key",
            "no API key configured; set GEMINI_API_KEY or model.api_key".into(),
        );
    }
    if config.model.max_output_tokens == Some(0) {
        push(
            Severity::Error,
            "range",
            "model.max_output_tokens",
            "must be greater than 0".into(),
        );
    }

    if config.chat.max_attachments == 0 {
        push(
            Severity::Warning,
            "range",
            "chat.max_attachments",
            "0 disables attachments".into(),
        );
    }

    if config.media.max_dimension == 0 {
        push(
            Severity::Error,
            "range",
            "media.max_dimension",
            "must be greater than 0".into(),
        );
    }
    if !(1..=100).contains(&config.media.jpeg_quality) {
        push(
            Severity::Error,
            "range",
            "media.jpeg_quality",
            format!("{} is outside 1..=100", config.media.jpeg_quality),
        );
    }
    if config.media.text_preview_chars == 0 {
        push(
            Severity::Error,
            "range",
            "media.text_preview_chars",
            "must be greater than 0".into(),
        );
    }
    if !(config.media.video_frame_offset_secs.is_finite()
        && config.media.video_frame_offset_secs >= 0.0)
    {
        push(
            Severity::Error,
            "range",
            "media.video_frame_offset_secs",
            "must be a non-negative number of seconds".into(),
        );
    }

    let stt = &config.voice.stt;
    if !KNOWN_STT_PROVIDERS.contains(&stt.provider.as_str()) {
        push(
            Severity::Warning,
            "range",
            "voice.stt.provider",
            format!("unknown speech-to-text provider \"{}\"", stt.provider),
        );
    }
    if stt.sample_rate == 0 {
        push(
            Severity::Error,
            "range",
            "voice.stt.sample_rate",
            "must be greater than 0".into(),
        );
    }
    if stt.enabled && stt.google.api_key.is_none() {
        push(
            Severity::Info,
            "missing",
            "voice.stt.google.api_key",
            "voice input enabled without a key; set GOOGLE_STT_API_KEY".into(),
        );
    }

    if config.obfuscation.salt.is_empty() {
        push(
            Severity::Error,
            "range",
            "obfuscation.salt",
            "salt must not be empty".into(),
        );
    }

    diagnostics
}
