//! Configuration loading, validation, env substitution, and key obfuscation.
//!
//! Config files: `genchat.toml`, `genchat.yaml`, or `genchat.json`
//! Searched in `./` then `~/.config/genchat/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod obfuscation;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config},
    obfuscation::Obfuscator,
    schema::{ChatConfig, GenChatConfig, MediaConfig, ModelConfig, ObfuscationConfig},
    validate::{Diagnostic, Severity, ValidationResult, check_config},
};
