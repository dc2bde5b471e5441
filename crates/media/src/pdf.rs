//! PDF thumbnails: page 1 rendered to fit the maximum dimension.

use std::{ffi::OsStr, process::Stdio};

use {
    async_trait::async_trait,
    image::DynamicImage,
    tokio::process::Command,
    tracing::debug,
};

use crate::{
    error::{Error, Result},
    tools,
};

/// Renders the first page of a PDF document.
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render_first_page(&self, data: &[u8], max_dimension: u32) -> Result<DynamicImage>;
}

/// Thumbnail size for a page of `width`×`height` points.
///
/// Scale is `min(max/width, max/height)` applied to both sides, so pages
/// smaller than the maximum are scaled up.
pub fn pdf_thumbnail_size(width: f64, height: f64, max_dimension: u32) -> Result<(u32, u32)> {
    if !(width > 0.0 && height > 0.0) {
        return Err(Error::thumbnail(format!(
            "invalid PDF page size {width}x{height}"
        )));
    }
    let max = f64::from(max_dimension);
    let scale = (max / width).min(max / height);
    let w = (width * scale).round().max(1.0) as u32;
    let h = (height * scale).round().max(1.0) as u32;
    Ok((w, h))
}

/// Extract the first page's size from `pdfinfo` output, honouring rotation.
fn parse_page_size(pdfinfo: &str) -> Option<(f64, f64)> {
    let mut size = None;
    let mut rotation = 0u32;

    for line in pdfinfo.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if !key.starts_with("Page") {
            continue;
        }
        if key.ends_with("size") && size.is_none() {
            let mut parts = value.split_whitespace();
            let w = parts.next()?.parse::<f64>().ok()?;
            if parts.next()? != "x" {
                return None;
            }
            let h = parts.next()?.parse::<f64>().ok()?;
            size = Some((w, h));
        } else if key.ends_with("rot") {
            rotation = value.trim().parse().unwrap_or(0);
        }
    }

    size.map(|(w, h)| if rotation % 180 == 90 { (h, w) } else { (w, h) })
}

/// Rendering through poppler's `pdfinfo` and `pdftoppm` CLIs.
#[derive(Debug, Clone, Default)]
pub struct PopplerRenderer {
    pdfinfo_path: Option<String>,
    pdftoppm_path: Option<String>,
}

impl PopplerRenderer {
    #[must_use]
    pub fn new(pdfinfo_path: Option<String>, pdftoppm_path: Option<String>) -> Self {
        Self {
            pdfinfo_path,
            pdftoppm_path,
        }
    }

    async fn run(binary: &str, configured: Option<&str>, args: &[&OsStr]) -> Result<Vec<u8>> {
        let path = tools::find_binary(binary, configured)
            .ok_or_else(|| Error::thumbnail(format!("{binary} binary not found in PATH")))?;
        let output = Command::new(&path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::thumbnail_with(format!("failed to execute {binary}"), e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::thumbnail(format!(
                "failed to load PDF document: {}",
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl PdfRenderer for PopplerRenderer {
    async fn render_first_page(&self, data: &[u8], max_dimension: u32) -> Result<DynamicImage> {
        let input = tools::write_temp(data, "pdf")?;
        let input_path = input.path().as_os_str();

        let info = Self::run("pdfinfo", self.pdfinfo_path.as_deref(), &[
            OsStr::new("-f"),
            OsStr::new("1"),
            OsStr::new("-l"),
            OsStr::new("1"),
            input_path,
        ])
        .await?;
        let (page_w, page_h) = parse_page_size(&String::from_utf8_lossy(&info))
            .ok_or_else(|| Error::thumbnail("failed to read PDF page size"))?;
        let (width, height) = pdf_thumbnail_size(page_w, page_h, max_dimension)?;
        debug!(page_w, page_h, width, height, "rendering PDF page 1");

        let out_dir = tempfile::tempdir()
            .map_err(|e| Error::thumbnail_with("failed to create temp dir", e))?;
        let out_root = out_dir.path().join("page");
        let (w_arg, h_arg) = (width.to_string(), height.to_string());

        Self::run("pdftoppm", self.pdftoppm_path.as_deref(), &[
            OsStr::new("-f"),
            OsStr::new("1"),
            OsStr::new("-l"),
            OsStr::new("1"),
            OsStr::new("-singlefile"),
            OsStr::new("-png"),
            OsStr::new("-scale-to-x"),
            OsStr::new(&w_arg),
            OsStr::new("-scale-to-y"),
            OsStr::new(&h_arg),
            input_path,
            out_root.as_os_str(),
        ])
        .await?;

        let rendered = out_root.with_extension("png");
        image::open(&rendered).map_err(|e| Error::thumbnail_with("failed to read rendered page", e))
    }
}
