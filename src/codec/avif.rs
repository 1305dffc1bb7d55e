//! Production codec: PNG decode and AVIF encode via the `image` crate.

use std::path::Path;

use image::codecs::avif::AvifEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageReader};
use tracing::debug;

use super::{DecodedImage, ImageCodec};
use crate::error::{AvifyError, Result};

/// Encoder effort/speed tradeoff (1 = slowest, 10 = fastest).
const ENCODER_SPEED: u8 = 4;

pub struct AvifCodec;

impl AvifCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AvifCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageCodec for AvifCodec {
    fn decode(&self, source: &Path) -> Result<DecodedImage> {
        let image = ImageReader::open(source)
            .map_err(|e| AvifyError::Codec(format!("failed to open {}: {}", source.display(), e)))?
            .decode()?;
        debug!(
            "decoded {} ({}x{}, alpha: {})",
            source.display(),
            image.width(),
            image.height(),
            image.color().has_alpha()
        );
        Ok(DecodedImage::from(image))
    }

    fn encode(&self, image: &DecodedImage, quality: u8) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let encoder = AvifEncoder::new_with_speed_quality(&mut out, ENCODER_SPEED, quality);
        let dynamic = image.as_dynamic();

        // RGBA sources stay RGBA so transparency survives the conversion.
        if image.has_alpha() {
            let rgba = dynamic.to_rgba8();
            encoder.write_image(
                rgba.as_raw(),
                rgba.width(),
                rgba.height(),
                ExtendedColorType::Rgba8,
            )?;
        } else {
            let rgb = dynamic.to_rgb8();
            encoder.write_image(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                ExtendedColorType::Rgb8,
            )?;
        }

        Ok(out)
    }
}
