//! Turns heterogeneous attachment sources into `(mime_type, bytes, thumbnail)`.

use std::{path::PathBuf, sync::Arc, time::Duration};

use {
    bytes::Bytes,
    image::{DynamicImage, GenericImageView, imageops::FilterType},
    tracing::{debug, warn},
};

use crate::{
    error::{Error, Result},
    image_ops,
    mime::{self, MediaKind},
    pdf::{PdfRenderer, PopplerRenderer},
    text,
    thumbnail::Thumbnail,
    video::{self, FfmpegFrameExtractor, VideoFrameExtractor},
};

/// Where an attachment comes from.
#[derive(Debug, Clone)]
pub enum AttachmentSource {
    /// A photo-library style item: bytes plus the declared MIME type, if any.
    Library {
        mime_type: Option<String>,
        data: Bytes,
    },
    /// A file on disk. The MIME type is inferred from the extension.
    File { path: PathBuf },
}

impl AttachmentSource {
    pub fn library(data: impl Into<Bytes>, mime_type: Option<String>) -> Self {
        Self::Library {
            mime_type,
            data: data.into(),
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File { path: path.into() }
    }

    /// Short label for logs and error reports.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Library { mime_type, data } => format!(
                "library item ({}, {} bytes)",
                mime_type.as_deref().unwrap_or("unknown type"),
                data.len()
            ),
            Self::File { path } => path.display().to_string(),
        }
    }
}

/// A normalized attachment, ready to be sent inline and previewed.
#[derive(Debug, Clone)]
pub struct Media {
    pub mime_type: String,
    pub data: Bytes,
    pub thumbnail: Thumbnail,
}

/// Tunables for [`MediaNormalizer`].
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    pub max_dimension: u32,
    /// JPEG quality, 1-100.
    pub jpeg_quality: u8,
    pub frame_offset: Duration,
    pub text_preview_chars: usize,
    pub text_card_size: (u32, u32),
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            max_dimension: image_ops::DEFAULT_MAX_DIMENSION,
            jpeg_quality: image_ops::DEFAULT_JPEG_QUALITY,
            frame_offset: video::DEFAULT_FRAME_OFFSET,
            text_preview_chars: text::DEFAULT_PREVIEW_CHARS,
            text_card_size: text::DEFAULT_CARD_SIZE,
        }
    }
}

/// Media normalizer. Cheap to clone; renderers are shared.
#[derive(Clone)]
pub struct MediaNormalizer {
    options: NormalizeOptions,
    video: Arc<dyn VideoFrameExtractor>,
    pdf: Arc<dyn PdfRenderer>,
}

impl Default for MediaNormalizer {
    fn default() -> Self {
        Self::new(NormalizeOptions::default())
    }
}

impl MediaNormalizer {
    /// Normalizer using the `ffmpeg` and poppler CLIs found on `PATH`.
    #[must_use]
    pub fn new(options: NormalizeOptions) -> Self {
        Self::with_renderers(
            options,
            Arc::new(FfmpegFrameExtractor::default()),
            Arc::new(PopplerRenderer::default()),
        )
    }

    #[must_use]
    pub fn with_renderers(
        options: NormalizeOptions,
        video: Arc<dyn VideoFrameExtractor>,
        pdf: Arc<dyn PdfRenderer>,
    ) -> Self {
        Self {
            options,
            video,
            pdf,
        }
    }

    #[must_use]
    pub fn options(&self) -> &NormalizeOptions {
        &self.options
    }

    pub async fn normalize(&self, source: AttachmentSource) -> Result<Media> {
        let (mime_type, data) = self.load(source).await?;
        let kind = mime::classify(&mime_type)?;
        debug!(%mime_type, ?kind, bytes = data.len(), "normalizing attachment");

        let media = match kind {
            MediaKind::Image => self.normalize_image(data).await?,
            MediaKind::Video => self.normalize_video(mime_type, data).await?,
            MediaKind::Pdf => self.normalize_pdf(data).await?,
            MediaKind::Text => self.normalize_text(data).await?,
        };
        debug!(
            mime_type = %media.mime_type,
            bytes = media.data.len(),
            thumbnail = ?media.thumbnail.dimensions(),
            "attachment normalized"
        );
        Ok(media)
    }

    async fn load(&self, source: AttachmentSource) -> Result<(String, Bytes)> {
        let (mime_type, data) = match source {
            AttachmentSource::Library { mime_type, data } => {
                let mime_type = match mime_type.filter(|m| !m.trim().is_empty()) {
                    Some(m) => m,
                    None => mime::sniff_image(&data)
                        .ok_or_else(|| Error::data("failed to determine MIME type"))?
                        .to_string(),
                };
                (mime_type, data)
            },
            AttachmentSource::File { path } => {
                let mime_type = mime::mime_for_path(&path)?;
                let data = tokio::fs::read(&path).await.map_err(|e| {
                    Error::data_with(format!("failed to read {}", path.display()), e)
                })?;
                (mime_type, Bytes::from(data))
            },
        };

        if data.is_empty() {
            return Err(Error::data("attachment has no data"));
        }
        Ok((mime_type, data))
    }

    async fn normalize_image(&self, data: Bytes) -> Result<Media> {
        let max = self.options.max_dimension;
        let quality = self.options.jpeg_quality;
        let normalized = blocking(move || image_ops::normalize_image(&data, max, quality)).await?;
        if normalized.was_resized {
            debug!(
                from = ?(normalized.original_width, normalized.original_height),
                to = ?normalized.image.dimensions(),
                "image downscaled"
            );
        }

        Ok(Media {
            mime_type: mime::IMAGE_JPEG.to_string(),
            data: Bytes::from(normalized.data),
            thumbnail: Thumbnail::new(normalized.image),
        })
    }

    async fn normalize_video(&self, mime_type: String, data: Bytes) -> Result<Media> {
        let frame = self
            .video
            .extract_frame(&data, &mime_type, self.options.frame_offset)
            .await
            .inspect_err(|e| warn!(error = %e, "video thumbnail failed"))?;
        let max = self.options.max_dimension;
        let frame = blocking(move || Ok(fit_thumbnail(frame, max))).await?;

        Ok(Media {
            mime_type: mime_type.to_ascii_lowercase(),
            data,
            thumbnail: Thumbnail::new(frame),
        })
    }

    async fn normalize_pdf(&self, data: Bytes) -> Result<Media> {
        let page = self
            .pdf
            .render_first_page(&data, self.options.max_dimension)
            .await
            .inspect_err(|e| warn!(error = %e, "PDF thumbnail failed"))?;

        Ok(Media {
            mime_type: mime::PDF.to_string(),
            data,
            thumbnail: Thumbnail::new(page),
        })
    }

    async fn normalize_text(&self, data: Bytes) -> Result<Media> {
        let chars = self.options.text_preview_chars;
        let size = self.options.text_card_size;
        let bytes = data.clone();
        let card = blocking(move || Ok(text::text_thumbnail(&bytes, chars, size))).await?;

        Ok(Media {
            mime_type: mime::TEXT_PLAIN.to_string(),
            data,
            thumbnail: Thumbnail::new(card),
        })
    }
}

fn fit_thumbnail(image: DynamicImage, max_dimension: u32) -> DynamicImage {
    let (w, h) = image.dimensions();
    if image_ops::fits(w, h, max_dimension) {
        return image;
    }
    let (w, h) = image_ops::aspect_fit(w, h, max_dimension);
    image.resize_exact(w, h, FilterType::Triangle)
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::thumbnail_with("media processing task failed", e))?
}
