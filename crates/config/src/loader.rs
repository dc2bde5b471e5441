use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::GenChatConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "genchat.toml",
    "genchat.yaml",
    "genchat.yml",
    "genchat.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<GenChatConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./genchat.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/genchat/genchat.{toml,yaml,yml,json}` (user-global)
///
/// Returns `GenChatConfig::default()` if no config file is found or it
/// fails to load.
pub fn discover_and_load() -> GenChatConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    GenChatConfig::default()
}

/// Find the first config file in standard locations.
pub(crate) fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let config_dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| config_dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/genchat/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "genchat").map(|d| d.config_dir().to_path_buf())
}

/// Apply environment variable overrides on top of the loaded config.
///
/// - `GEMINI_API_KEY`, then `GENCHAT_API_KEY`: `model.api_key`
/// - `GENCHAT_MODEL`: `model.model`
/// - `GOOGLE_STT_API_KEY`: `voice.stt.google.api_key`
pub fn apply_env_overrides(config: GenChatConfig) -> GenChatConfig {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

fn apply_env_overrides_with(
    mut config: GenChatConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> GenChatConfig {
    let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(key) = non_empty("GEMINI_API_KEY").or_else(|| non_empty("GENCHAT_API_KEY")) {
        debug!("model API key taken from environment");
        config.model.api_key = Some(Secret::new(key));
    }
    if let Some(model) = non_empty("GENCHAT_MODEL") {
        config.model.model = model;
    }
    if let Some(key) = non_empty("GOOGLE_STT_API_KEY") {
        config.voice.stt.google.api_key = Some(Secret::new(key));
    }
    config
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<GenChatConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret};

    #[test]
    fn loads_each_format() {
        let dir = tempfile::tempdir().unwrap();
        let files = [
            ("genchat.toml", "[model]\nmodel = \"m-toml\"\n"),
            ("genchat.yaml", "model:\n  model: m-yaml\n"),
            ("genchat.json", r#"{"model": {"model": "m-json"}}"#),
        ];
        for (name, body) in files {
            let path = dir.path().join(name);
            std::fs::write(&path, body).unwrap();
            let cfg = load_config(&path).unwrap();
            assert_eq!(cfg.model.model, format!("m-{}", &name[8..12]));
        }
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genchat.ini");
        std::fs::write(&path, "model=x").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn missing_file_is_error() {
        let err = load_config(Path::new("/definitely/not/genchat.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn env_overrides_apply() {
        let lookup = |name: &str| match name {
            "GENCHAT_API_KEY" => Some("from-genchat".to_string()),
            "GENCHAT_MODEL" => Some("gemini-exp".to_string()),
            "GOOGLE_STT_API_KEY" => Some("stt-key".to_string()),
            _ => None,
        };
        let cfg = apply_env_overrides_with(GenChatConfig::default(), lookup);
        assert_eq!(cfg.model.api_key.unwrap().expose_secret(), "from-genchat");
        assert_eq!(cfg.model.model, "gemini-exp");
        assert_eq!(
            cfg.voice.stt.google.api_key.unwrap().expose_secret(),
            "stt-key"
        );
    }

    #[test]
    fn gemini_key_takes_precedence_and_blank_is_ignored() {
        let lookup = |name: &str| match name {
            "GEMINI_API_KEY" => Some("from-gemini".to_string()),
            "GENCHAT_API_KEY" => Some("from-genchat".to_string()),
            "GENCHAT_MODEL" => Some("  ".to_string()),
            _ => None,
        };
        let cfg = apply_env_overrides_with(GenChatConfig::default(), lookup);
        assert_eq!(cfg.model.api_key.unwrap().expose_secret(), "from-gemini");
        assert_eq!(cfg.model.model, crate::schema::DEFAULT_MODEL);
    }
}
