//! Raster → PDF: one page, sized to the image at 1 pt per pixel.
//!
//! Baseline and progressive JPEGs with one or three components are embedded
//! byte-for-byte behind a `DCTDecode` filter. Every other input (PNG, WEBP,
//! CMYK or lossless JPEG) is decoded to 8-bit samples and stored
//! Flate-compressed; an alpha channel becomes a soft mask.

use crate::codec::pdf::PdfWriter;
use crate::codec::raster;
use crate::error::ConvertError;
use crate::format::Format;
use image::{ColorType, DynamicImage, GenericImageView};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Stream};
use tracing::debug;

/// Convert a raster image into a single-page PDF.
pub fn convert(bytes: &[u8], source: Format) -> Result<Vec<u8>, ConvertError> {
    let img = raster::decode(bytes, source)?;
    let (width, height) = img.dimensions();

    let mut writer = PdfWriter::new();
    let dct_components = match source {
        Format::Jpg | Format::Jpeg => jpeg_components(bytes),
        _ => None,
    };
    let image_stream = match dct_components {
        Some(components) => {
            debug!("Embedding JPEG as-is ({} components)", components);
            dct_stream(bytes, width, height, components)
        }
        None => pixel_stream(&mut writer, &img),
    };
    let image_id = writer.add_object(image_stream);

    let (w, h) = (i64::from(width), i64::from(height));
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![w.into(), 0.into(), 0.into(), h.into(), 0.into(), 0.into()],
            ),
            Operation::new("Do", vec!["Im0".into()]),
            Operation::new("Q", vec![]),
        ],
    };
    let resources = dictionary! {
        "XObject" => dictionary! { "Im0" => image_id },
    };
    writer.add_page(width as f32, height as f32, content, resources)?;
    writer.finish()
}

fn image_dict(width: u32, height: u32, colour_space: &str) -> Dictionary {
    dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => i64::from(width),
        "Height" => i64::from(height),
        "ColorSpace" => colour_space,
        "BitsPerComponent" => 8,
    }
}

fn dct_stream(bytes: &[u8], width: u32, height: u32, components: u8) -> Stream {
    let colour_space = if components == 1 {
        "DeviceGray"
    } else {
        "DeviceRGB"
    };
    let mut dict = image_dict(width, height, colour_space);
    dict.set("Filter", "DCTDecode");
    Stream::new(dict, bytes.to_vec()).with_compression(false)
}

fn pixel_stream(writer: &mut PdfWriter, img: &DynamicImage) -> Stream {
    let (width, height) = img.dimensions();
    let colour = img.color();
    let grey = matches!(
        colour,
        ColorType::L8 | ColorType::L16 | ColorType::La8 | ColorType::La16
    );

    let (mut dict, samples) = if grey {
        (image_dict(width, height, "DeviceGray"), img.to_luma8().into_raw())
    } else {
        (image_dict(width, height, "DeviceRGB"), img.to_rgb8().into_raw())
    };

    if colour.has_alpha() {
        let alpha: Vec<u8> = img.to_rgba8().pixels().map(|p| p[3]).collect();
        let mask_id = writer.add_object(Stream::new(
            image_dict(width, height, "DeviceGray"),
            alpha,
        ));
        dict.set("SMask", mask_id);
    }
    Stream::new(dict, samples)
}

/// Component count of a JPEG the PDF `DCTDecode` filter can take verbatim.
///
/// Walks the marker segments up to the first start-of-frame. Returns `None`
/// for lossless/hierarchical/arithmetic frames, CMYK, or anything unparsable.
fn jpeg_components(bytes: &[u8]) -> Option<u8> {
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut i = 2;
    while i + 4 <= bytes.len() {
        if bytes[i] != 0xFF {
            return None;
        }
        let marker = bytes[i + 1];
        match marker {
            // fill byte
            0xFF => {
                i += 1;
                continue;
            }
            // standalone markers
            0x01 | 0xD0..=0xD8 => {
                i += 2;
                continue;
            }
            // SOS / EOI before any frame header
            0xD9 | 0xDA => return None,
            _ => {}
        }
        let len = usize::from(u16::from_be_bytes([bytes[i + 2], bytes[i + 3]]));
        if (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC) {
            // FF Cn | Lf(2) | P(1) | Y(2) | X(2) | Nf(1)
            let components = *bytes.get(i + 9)?;
            let dct_ok = matches!(marker, 0xC0..=0xC2);
            return (dct_ok && matches!(components, 1 | 3)).then_some(components);
        }
        i += 2 + len;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::pdf;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use lopdf::Object;

    fn image_streams(doc: &lopdf::Document) -> Vec<&lopdf::Stream> {
        doc.objects
            .values()
            .filter_map(|o| match o {
                Object::Stream(s)
                    if s.dict.get(b"Subtype").ok().and_then(|v| v.as_name().ok())
                        == Some(b"Image".as_slice()) =>
                {
                    Some(s)
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn png_becomes_single_page_of_same_size() {
        let png = raster::encode(
            &DynamicImage::ImageRgb8(RgbImage::from_pixel(800, 600, Rgb([10, 20, 30]))),
            Format::Png,
        )
        .unwrap();
        let bytes = convert(&png, Format::Png).unwrap();

        let doc = pdf::load(&bytes).unwrap();
        let pages = pdf::page_ids(&doc);
        assert_eq!(pages.len(), 1);
        assert_eq!(pdf::page_size(&doc, pages[0]).unwrap(), (800.0, 600.0));
    }

    #[test]
    fn jpeg_is_embedded_verbatim() {
        let jpg = raster::encode(
            &DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 30, Rgb([200, 0, 0]))),
            Format::Jpg,
        )
        .unwrap();
        assert_eq!(jpeg_components(&jpg), Some(3));

        let bytes = convert(&jpg, Format::Jpeg).unwrap();
        let doc = pdf::load(&bytes).unwrap();
        let images = image_streams(&doc);
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].content, jpg);
    }

    #[test]
    fn alpha_becomes_soft_mask() {
        let png = raster::encode(
            &DynamicImage::ImageRgba8(RgbaImage::from_pixel(5, 7, Rgba([1, 2, 3, 100]))),
            Format::Png,
        )
        .unwrap();
        let bytes = convert(&png, Format::Png).unwrap();
        let doc = pdf::load(&bytes).unwrap();
        let images = image_streams(&doc);
        assert_eq!(images.len(), 2, "image plus its mask");
        assert!(images.iter().any(|s| s.dict.get(b"SMask").is_ok()));
    }

    #[test]
    fn jpeg_components_rejects_garbage() {
        assert_eq!(jpeg_components(b"not a jpeg"), None);
        assert_eq!(jpeg_components(&[0xFF, 0xD8, 0xFF, 0xD9]), None);
    }

    #[test]
    fn corrupt_image_is_malformed_input() {
        let err = convert(b"\x89PNG\r\n\x1a\ngarbage", Format::Png).unwrap_err();
        assert!(matches!(err, ConvertError::MalformedInput { .. }));
    }
}
