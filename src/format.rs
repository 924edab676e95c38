//! The closed set of file formats the pipeline understands.
//!
//! Format strings arrive from file extensions and request bodies in any
//! case and with stray whitespace. They are normalised once, here, into
//! [`Format`]; nothing downstream compares raw strings.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// A supported file format, keyed by its canonical extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Pdf,
    Jpg,
    Jpeg,
    Png,
    Webp,
    Doc,
    Docx,
    Txt,
}

/// Conversion family a format belongs to. Adapters are selected per family pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// jpg, jpeg, png, webp
    Raster,
    /// pdf
    Document,
    /// doc, docx
    LegacyDocument,
    /// txt
    Text,
}

impl Format {
    /// Every format, in capability-table order.
    pub const ALL: [Format; 8] = [
        Format::Pdf,
        Format::Jpg,
        Format::Jpeg,
        Format::Png,
        Format::Webp,
        Format::Doc,
        Format::Docx,
        Format::Txt,
    ];

    /// Lower-case extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Format::Pdf => "pdf",
            Format::Jpg => "jpg",
            Format::Jpeg => "jpeg",
            Format::Png => "png",
            Format::Webp => "webp",
            Format::Doc => "doc",
            Format::Docx => "docx",
            Format::Txt => "txt",
        }
    }

    pub fn family(self) -> Family {
        match self {
            Format::Jpg | Format::Jpeg | Format::Png | Format::Webp => Family::Raster,
            Format::Pdf => Family::Document,
            Format::Doc | Format::Docx => Family::LegacyDocument,
            Format::Txt => Family::Text,
        }
    }

    pub fn is_raster(self) -> bool {
        self.family() == Family::Raster
    }

    /// The `image` crate format for raster formats.
    pub fn image_format(self) -> Option<image::ImageFormat> {
        match self {
            Format::Jpg | Format::Jpeg => Some(image::ImageFormat::Jpeg),
            Format::Png => Some(image::ImageFormat::Png),
            Format::Webp => Some(image::ImageFormat::WebP),
            _ => None,
        }
    }

    /// Derive the format from a file name's extension (`report.PDF` → `Pdf`).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Format, ConvertError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| {
                ConvertError::InvalidRequest(format!(
                    "no file extension found in '{}'",
                    path.display()
                ))
            })?;
        ext.parse()
    }
}

impl FromStr for Format {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised = s.trim().trim_start_matches('.').to_ascii_lowercase();
        Format::ALL
            .into_iter()
            .find(|f| f.extension() == normalised)
            .ok_or(ConvertError::UnsupportedFormat { format: normalised })
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
