//! Raster ↔ raster re-encoding (jpg/jpeg/png/webp).
//!
//! Pixel dimensions are preserved; the encoders run with the `image` crate's
//! default settings (JPEG quality 75, lossless WebP, default PNG filter).
//! JPEG has no alpha channel and the WebP encoder only takes 8-bit input, so
//! pixels are normalised to what the target can hold before encoding.

use crate::error::ConvertError;
use crate::format::Format;
use image::{DynamicImage, ImageFormat};
use std::borrow::Cow;
use std::io::Cursor;
use tracing::debug;

const ADAPTER: &str = "raster-to-raster";

/// Decode `bytes` strictly as the declared raster `source` format.
pub fn decode(bytes: &[u8], source: Format) -> Result<DynamicImage, ConvertError> {
    let format = source
        .image_format()
        .ok_or_else(|| ConvertError::failed(ADAPTER, format!("{source} is not a raster format")))?;
    image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ConvertError::malformed(source, e))
}

/// Encode `img` as the raster `target` format.
pub fn encode(img: &DynamicImage, target: Format) -> Result<Vec<u8>, ConvertError> {
    let format = target
        .image_format()
        .ok_or_else(|| ConvertError::failed(ADAPTER, format!("{target} is not a raster format")))?;

    let pixels: Cow<'_, DynamicImage> = match format {
        ImageFormat::Jpeg => Cow::Owned(DynamicImage::ImageRgb8(img.to_rgb8())),
        ImageFormat::WebP if img.color().has_alpha() => {
            Cow::Owned(DynamicImage::ImageRgba8(img.to_rgba8()))
        }
        ImageFormat::WebP => Cow::Owned(DynamicImage::ImageRgb8(img.to_rgb8())),
        _ => Cow::Borrowed(img),
    };

    let mut buf = Vec::new();
    pixels
        .write_to(&mut Cursor::new(&mut buf), format)
        .map_err(|e| ConvertError::failed(ADAPTER, e))?;
    debug!(
        "Encoded {}x{} image as {} ({} bytes)",
        img.width(),
        img.height(),
        target,
        buf.len()
    );
    Ok(buf)
}

/// Re-encode a raster image from `source` to `target`.
pub fn convert(bytes: &[u8], source: Format, target: Format) -> Result<Vec<u8>, ConvertError> {
    let img = decode(bytes, source)?;
    encode(&img, target)
}
