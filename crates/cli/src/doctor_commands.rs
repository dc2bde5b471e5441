//! `genchat doctor`: config validation and external tool audit.
//!
//! Prints a report with `[ok]`, `[warn]`, `[fail]` or `[info]` per item.

use std::path::Path;

use {
    anyhow::Result,
    genchat_config::{
        GenChatConfig,
        validate::{self, Diagnostic, Severity},
    },
    genchat_media::tools::find_binary,
};

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ok,
    Warn,
    Fail,
    Info,
}

impl Status {
    fn label(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Fail => "fail",
            Self::Info => "info",
        }
    }

    fn color(self) -> &'static str {
        match self {
            Self::Ok => GREEN,
            Self::Warn => YELLOW,
            Self::Fail => RED,
            Self::Info => CYAN,
        }
    }
}

impl From<Severity> for Status {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Error => Self::Fail,
            Severity::Warning => Self::Warn,
            Severity::Info => Self::Info,
        }
    }
}

struct Section {
    title: String,
    items: Vec<(Status, String)>,
}

impl Section {
    fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            items: Vec::new(),
        }
    }

    fn push(&mut self, status: Status, message: impl Into<String>) {
        self.items.push((status, message.into()));
    }

    fn push_diagnostic(&mut self, d: &Diagnostic) {
        let message = if d.path.is_empty() {
            d.message.clone()
        } else {
            format!("{}: {}", d.path, d.message)
        };
        self.push(d.severity.into(), message);
    }
}

fn print_report(sections: &[Section]) -> (usize, usize) {
    let mut errors = 0usize;
    let mut warnings = 0usize;

    for section in sections {
        eprintln!("{BOLD}{}{RESET}", section.title);
        for (status, message) in &section.items {
            eprintln!("  [{}{}{RESET}]  {message}", status.color(), status.label());
            match status {
                Status::Fail => errors += 1,
                Status::Warn => warnings += 1,
                _ => {},
            }
        }
        eprintln!();
    }

    (errors, warnings)
}

pub fn handle_doctor(config: &GenChatConfig, config_path: Option<&Path>) -> Result<()> {
    eprintln!("{BOLD}genchat doctor{RESET}");
    eprintln!("{BOLD}=============={RESET}\n");

    let sections = vec![
        check_file(config_path),
        check_values(config),
        check_tools(config),
    ];

    let (errors, warnings) = print_report(&sections);
    eprintln!("{BOLD}Summary:{RESET} {errors} error(s), {warnings} warning(s)");

    if errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Syntax and field names, read from the file as written.
fn check_file(config_path: Option<&Path>) -> Section {
    let result = validate::validate(config_path);
    let label = result
        .config_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults".into());
    let mut section = Section::new(format!("Config file ({label})"));

    let structural: Vec<_> = result
        .diagnostics
        .iter()
        .filter(|d| matches!(d.category, "syntax" | "unknown-field" | "type-error" | "file-ref"))
        .collect();
    if structural.is_empty() {
        section.push(Status::Ok, "syntax valid, all fields recognized");
    }
    for d in structural {
        section.push_diagnostic(d);
    }
    section
}

/// Value ranges, after env overrides.
fn check_values(config: &GenChatConfig) -> Section {
    let mut section = Section::new("Settings");
    let diagnostics = validate::check_config(config);
    if diagnostics.is_empty() {
        section.push(Status::Ok, "all values in range");
    }
    for d in &diagnostics {
        section.push_diagnostic(d);
    }

    if let Ok(obfuscator) = config.obfuscation.obfuscator()
        && let Err(e) = config.model.resolve_api_key(&obfuscator)
    {
        section.push(Status::Fail, format!("API key could not be revealed: {e}"));
    }
    section
}

fn check_tools(config: &GenChatConfig) -> Section {
    let mut section = Section::new("External tools");
    let media = &config.media;
    let tools = [
        ("ffmpeg", media.ffmpeg_path.as_deref(), "video thumbnails"),
        ("pdfinfo", media.pdfinfo_path.as_deref(), "PDF thumbnails"),
        ("pdftoppm", media.pdftoppm_path.as_deref(), "PDF thumbnails"),
    ];
    for (name, configured, purpose) in tools {
        match find_binary(name, configured) {
            Some(path) => section.push(Status::Ok, format!("{name}: {}", path.display())),
            None => section.push(
                Status::Warn,
                format!("{name} not found; {purpose} are unavailable"),
            ),
        }
    }
    section
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severities_map_onto_statuses() {
        assert_eq!(Status::from(Severity::Error), Status::Fail);
        assert_eq!(Status::from(Severity::Warning), Status::Warn);
        assert_eq!(Status::from(Severity::Info), Status::Info);
    }

    #[test]
    fn default_settings_only_miss_the_key() {
        let section = check_values(&GenChatConfig::default());
        assert_eq!(section.items.len(), 1);
        assert_eq!(section.items[0].0, Status::Warn);
        assert!(section.items[0].1.starts_with("model.api_key"));
    }
}
