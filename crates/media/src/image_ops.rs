//! Image decode, aspect-fit resize and lossy re-encode for chat attachments.

use std::io::Cursor;

use {
    image::{
        DynamicImage, GenericImageView, ImageDecoder, ImageFormat, ImageReader,
        imageops::FilterType, metadata::Orientation,
    },
    tracing::debug,
};

use crate::error::{Error, Result};

/// Default maximum dimension (width or height) for attachments and thumbnails.
pub const DEFAULT_MAX_DIMENSION: u32 = 768;

/// JPEG quality used when re-encoding images (0-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 50;

/// Image metadata.
#[derive(Debug, Clone)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: Option<ImageFormat>,
}

/// Result of normalizing an image attachment.
#[derive(Debug)]
pub struct NormalizedImage {
    /// JPEG payload.
    pub data: Vec<u8>,
    /// Decoded (and possibly downscaled) image, used as the thumbnail.
    pub image: DynamicImage,
    pub original_width: u32,
    pub original_height: u32,
    pub was_resized: bool,
}

/// Get metadata about an image without fully decoding it.
///
/// Dimensions are as stored, before any EXIF orientation is applied.
pub fn get_image_metadata(data: &[u8]) -> Result<ImageMetadata> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| Error::data_with("failed to guess image format", e))?;

    let format = reader.format();
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| Error::data_with("failed to read image dimensions", e))?;

    Ok(ImageMetadata {
        width,
        height,
        format,
    })
}

/// Whether both sides are within `max_dimension`.
#[must_use]
pub fn fits(width: u32, height: u32, max_dimension: u32) -> bool {
    width <= max_dimension && height <= max_dimension
}

/// Size that fits within `max_dimension` preserving aspect ratio.
///
/// The larger side is clamped to `max_dimension` and the other side is
/// rounded. Sizes that already fit come back unchanged.
#[must_use]
pub fn aspect_fit(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width == 0 || height == 0 || fits(width, height, max_dimension) {
        return (width, height);
    }

    let aspect = f64::from(width) / f64::from(height);
    if width > height {
        let w = max_dimension;
        let h = (f64::from(w) / aspect).round() as u32;
        (w, h.max(1))
    } else {
        let h = max_dimension;
        let w = (f64::from(h) * aspect).round() as u32;
        (w.max(1), h)
    }
}

/// Decode an image attachment, upright according to its EXIF orientation.
pub fn decode(data: &[u8]) -> Result<DynamicImage> {
    if data.is_empty() {
        return Err(Error::data("image data is empty"));
    }
    let mut decoder = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| Error::data_with("failed to guess image format", e))?
        .into_decoder()
        .map_err(|e| Error::data_with("failed to decode image", e))?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);

    let mut img = DynamicImage::from_decoder(decoder)
        .map_err(|e| Error::data_with("failed to decode image", e))?;
    img.apply_orientation(orientation);
    Ok(img)
}

/// Downscale to fit `max_dimension` (if needed) and re-encode as JPEG.
pub fn normalize_image(data: &[u8], max_dimension: u32, quality: u8) -> Result<NormalizedImage> {
    let meta = get_image_metadata(data)?;
    debug!(
        format = ?meta.format,
        width = meta.width,
        height = meta.height,
        "normalizing image"
    );
    let img = decode(data)?;
    let (orig_width, orig_height) = img.dimensions();

    let (final_img, was_resized) = if fits(orig_width, orig_height, max_dimension) {
        (img, false)
    } else {
        let (w, h) = aspect_fit(orig_width, orig_height, max_dimension);
        (img.resize_exact(w, h, FilterType::Lanczos3), true)
    };

    let data = encode_jpeg_with_quality(&final_img, quality)?;

    Ok(NormalizedImage {
        data,
        image: final_img,
        original_width: orig_width,
        original_height: orig_height,
        was_resized,
    })
}

/// Encode image as JPEG with specified quality.
///
/// JPEG has no alpha channel, so the image is flattened to RGB first.
pub fn encode_jpeg_with_quality(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut output = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut output, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| Error::data_with("failed to create JPEG data", e))?;
    Ok(output.into_inner())
}

/// Encode image as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut output = Cursor::new(Vec::new());
    img.write_to(&mut output, ImageFormat::Png)
        .map_err(|e| Error::data_with("failed to encode PNG", e))?;
    Ok(output.into_inner())
}
