//! Helpers for renderers that shell out to external binaries.

use std::path::PathBuf;

use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// Find a binary at an explicitly configured path, falling back to `PATH`.
pub fn find_binary(name: &str, configured: Option<&str>) -> Option<PathBuf> {
    if let Some(path_str) = configured {
        let path = expand_tilde(path_str);
        if path.is_file() {
            return Some(path);
        }
    }
    which::which(name).ok()
}

/// Expand `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }
    PathBuf::from(path)
}

/// Write attachment bytes to a temp file with the given extension.
///
/// The returned handle keeps the file alive.
pub fn write_temp(data: &[u8], extension: &str) -> Result<NamedTempFile> {
    let file = NamedTempFile::with_suffix(format!(".{extension}"))
        .map_err(|e| Error::thumbnail_with("failed to create temp file", e))?;
    std::fs::write(file.path(), data)
        .map_err(|e| Error::thumbnail_with("failed to write temp file", e))?;
    Ok(file)
}
