//! PDF → raster (first page only).
//!
//! Pages are not rendered. The output is a white image whose pixel size is
//! the first page's MediaBox in points (1 px per pt, rounded), which is the
//! documented behaviour of this converter. Later pages are ignored.

use crate::codec::{pdf, raster};
use crate::error::ConvertError;
use crate::format::Format;
use image::{DynamicImage, Rgb, RgbImage};
use tracing::debug;

const ADAPTER: &str = "document-to-raster";

/// Produce a `target` raster matching the first page's dimensions.
///
/// Pages wider or taller than `max_edge` pixels are refused rather than
/// allocated.
pub fn convert(bytes: &[u8], target: Format, max_edge: u32) -> Result<Vec<u8>, ConvertError> {
    let doc = pdf::load(bytes)?;
    let first = pdf::page_ids(&doc)
        .into_iter()
        .next()
        .ok_or_else(|| ConvertError::malformed(Format::Pdf, "document has no pages"))?;
    let (width, height) = pdf::page_size(&doc, first)?;

    let (px_w, px_h) = (width.round(), height.round());
    if px_w < 1.0 || px_h < 1.0 {
        return Err(ConvertError::malformed(
            Format::Pdf,
            format!("first page is {width}x{height} pt"),
        ));
    }
    if px_w > max_edge as f32 || px_h > max_edge as f32 {
        return Err(ConvertError::failed(
            ADAPTER,
            format!("page {px_w}x{px_h} exceeds the {max_edge} px raster limit"),
        ));
    }
    let (px_w, px_h) = (px_w as u32, px_h as u32);
    debug!("Rasterising page 1 as {}x{} {}", px_w, px_h, target);

    let canvas = RgbImage::from_pixel(px_w, px_h, Rgb([255, 255, 255]));
    raster::encode(&DynamicImage::ImageRgb8(canvas), target)
}
