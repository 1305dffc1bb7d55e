//! Image codec seam and target metadata container.
//!
//! The pipeline never touches pixel formats directly; everything raster goes
//! through the [`ImageCodec`] trait so the conversion state machine can be
//! exercised with a mock codec in tests. The production implementation lives
//! in [`avif`] and delegates to the `image` crate.

pub mod avif;
pub mod container;
pub mod exif;

use std::path::Path;
use std::sync::Arc;

use image::DynamicImage;

use crate::error::Result;

pub use avif::AvifCodec;

/// A decoded raster image, opaque to the rest of the pipeline.
pub struct DecodedImage {
    image: DynamicImage,
}

impl DecodedImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn has_alpha(&self) -> bool {
        self.image.color().has_alpha()
    }

    pub(crate) fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }
}

impl From<DynamicImage> for DecodedImage {
    fn from(image: DynamicImage) -> Self {
        Self { image }
    }
}

/// Pixel decode/encode capability.
///
/// Implementations must be callable from blocking worker contexts; failures
/// are per-file codec errors, never fatal to the run.
#[cfg_attr(test, mockall::automock)]
pub trait ImageCodec: Send + Sync {
    /// Decode the source image, preserving an alpha channel when present.
    fn decode(&self, source: &Path) -> Result<DecodedImage>;

    /// Encode the image to the target format at the requested quality.
    fn encode(&self, image: &DecodedImage, quality: u8) -> Result<Vec<u8>>;
}

/// Factory for creating codec instances.
pub struct CodecFactory;

impl CodecFactory {
    /// Create the default codec implementation (image crate, AVIF target).
    pub fn create_default() -> Arc<dyn ImageCodec> {
        Arc::new(AvifCodec::new())
    }
}

/// In-memory metadata staged for the target container.
///
/// Holds the fields the conversion sets before the target bytes exist; the
/// container patcher in [`container`] persists them into the encoded file.
#[derive(Debug, Default, Clone)]
pub struct MetadataContainer {
    user_comment: Option<Vec<u8>>,
    handler_description: Option<String>,
}

impl MetadataContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_user_comment(&mut self, comment: Vec<u8>) {
        self.user_comment = Some(comment);
    }

    pub fn set_handler_description(&mut self, description: &str) {
        self.handler_description = Some(description.to_string());
    }

    pub fn user_comment(&self) -> Option<&[u8]> {
        self.user_comment.as_deref()
    }

    pub fn handler_description(&self) -> Option<&str> {
        self.handler_description.as_deref()
    }
}
