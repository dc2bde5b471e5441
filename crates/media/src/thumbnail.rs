//! Preview bitmaps attached to every normalized attachment.

use std::sync::Arc;

use image::{DynamicImage, GenericImageView};

use crate::{error::Result, image_ops};

/// A decoded preview bitmap. Cloning shares the pixels.
#[derive(Clone)]
pub struct Thumbnail(Arc<DynamicImage>);

impl Thumbnail {
    #[must_use]
    pub fn new(image: DynamicImage) -> Self {
        Self(Arc::new(image))
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.0.height()
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    #[must_use]
    pub fn image(&self) -> &DynamicImage {
        &self.0
    }

    /// PNG bytes for display layers that want an encoded image.
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        image_ops::encode_png(&self.0)
    }
}

impl std::fmt::Debug for Thumbnail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thumbnail")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

impl From<DynamicImage> for Thumbnail {
    fn from(image: DynamicImage) -> Self {
        Self::new(image)
    }
}
