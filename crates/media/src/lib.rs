//! Media normalization: MIME classification, image downscale and re-encode,
//! and preview thumbnails for images, videos, PDFs and plain text.

pub mod error;
pub mod image_ops;
pub mod mime;
pub mod normalize;
pub mod pdf;
pub mod text;
pub mod thumbnail;
pub mod tools;
pub mod video;

pub use {
    error::{Error, Result},
    mime::MediaKind,
    normalize::{AttachmentSource, Media, MediaNormalizer, NormalizeOptions},
    pdf::{PdfRenderer, PopplerRenderer},
    thumbnail::Thumbnail,
    video::{FfmpegFrameExtractor, VideoFrameExtractor},
};
