//! Video thumbnails: a single frame grabbed at a fixed offset.

use std::{ffi::OsString, path::Path, process::Stdio, time::Duration};

use {
    async_trait::async_trait,
    image::{DynamicImage, ImageFormat},
    tokio::process::Command,
    tracing::debug,
};

use crate::{
    error::{Error, Result},
    mime, tools,
};

/// Default offset of the thumbnail frame.
pub const DEFAULT_FRAME_OFFSET: Duration = Duration::from_secs(1);

/// Extracts one frame from an encoded video.
#[async_trait]
pub trait VideoFrameExtractor: Send + Sync {
    async fn extract_frame(
        &self,
        data: &[u8],
        mime_type: &str,
        offset: Duration,
    ) -> Result<DynamicImage>;
}

/// Frame extraction through the `ffmpeg` CLI.
#[derive(Debug, Clone, Default)]
pub struct FfmpegFrameExtractor {
    binary_path: Option<String>,
}

impl FfmpegFrameExtractor {
    #[must_use]
    pub fn new(binary_path: Option<String>) -> Self {
        Self { binary_path }
    }

    fn frame_args(input: &Path, offset: Duration) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-ss"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(format!("{:.3}", offset.as_secs_f64()).into());
        args.push("-i".into());
        args.push(input.as_os_str().to_owned());
        args.extend(
            ["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "pipe:1"]
                .into_iter()
                .map(OsString::from),
        );
        args
    }
}

#[async_trait]
impl VideoFrameExtractor for FfmpegFrameExtractor {
    async fn extract_frame(
        &self,
        data: &[u8],
        mime_type: &str,
        offset: Duration,
    ) -> Result<DynamicImage> {
        let extension = mime::video_extension(mime_type)?;
        let binary = tools::find_binary("ffmpeg", self.binary_path.as_deref())
            .ok_or_else(|| Error::thumbnail("ffmpeg binary not found in PATH"))?;
        let input = tools::write_temp(data, extension)?;

        debug!(bytes = data.len(), offset_ms = offset.as_millis() as u64, "extracting video frame");
        let output = Command::new(&binary)
            .args(Self::frame_args(input.path(), offset))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::thumbnail_with("failed to execute ffmpeg", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::thumbnail(format!("ffmpeg failed: {}", stderr.trim())));
        }
        if output.stdout.is_empty() {
            return Err(Error::thumbnail(format!(
                "no video frame at {:.1}s",
                offset.as_secs_f64()
            )));
        }

        image::load_from_memory_with_format(&output.stdout, ImageFormat::Png)
            .map_err(|e| Error::thumbnail_with("failed to decode extracted frame", e))
    }
}
