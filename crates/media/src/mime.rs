//! MIME detection and classification of attachments.

use std::path::Path;

use crate::error::{Error, Result};

pub const PDF: &str = "application/pdf";
pub const TEXT_PLAIN: &str = "text/plain";
pub const IMAGE_JPEG: &str = "image/jpeg";
pub const VIDEO_MP4: &str = "video/mp4";
pub const VIDEO_QUICKTIME: &str = "video/quicktime";

/// The four families the normalizer knows how to thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Pdf,
    Text,
}

/// Strip parameters and normalise case: `"Text/Plain; charset=utf-8"` → `"text/plain"`.
fn essence(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Map a MIME type onto a [`MediaKind`].
pub fn classify(mime: &str) -> Result<MediaKind> {
    let mime = essence(mime);
    if mime.is_empty() {
        return Err(Error::data("failed to determine MIME type"));
    }
    match mime.as_str() {
        m if m.starts_with("image/") => Ok(MediaKind::Image),
        VIDEO_MP4 | VIDEO_QUICKTIME => Ok(MediaKind::Video),
        PDF => Ok(MediaKind::Pdf),
        TEXT_PLAIN => Ok(MediaKind::Text),
        _ => Err(Error::unsupported(mime)),
    }
}

/// Infer a MIME type from a file path's extension.
pub fn mime_for_path(path: &Path) -> Result<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| {
            Error::data(format!(
                "failed to determine MIME type for {}",
                path.display()
            ))
        })?;

    match ext.as_str() {
        "pdf" => Ok(PDF.to_string()),
        "txt" => Ok(TEXT_PLAIN.to_string()),
        _ => mime_guess::from_ext(&ext)
            .first()
            .map(|m| m.essence_str().to_string())
            .ok_or_else(|| Error::unsupported(format!(".{ext}"))),
    }
}

/// Identify an image MIME type from magic bytes.
#[must_use]
pub fn sniff_image(data: &[u8]) -> Option<&'static str> {
    image::guess_format(data)
        .ok()
        .map(|format| format.to_mime_type())
}

/// Container extension the frame extractor needs to open a video.
pub fn video_extension(mime: &str) -> Result<&'static str> {
    match essence(mime).as_str() {
        VIDEO_MP4 => Ok("mp4"),
        VIDEO_QUICKTIME => Ok("mov"),
        other => Err(Error::unsupported(other.to_string())),
    }
}
