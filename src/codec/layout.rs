//! Text → PDF: lay plain UTF-8 lines onto A4 pages in 12 pt Helvetica.
//!
//! Each input line becomes one output line; nothing is wrapped, so very long
//! lines run off the right edge. A page break happens when the next baseline
//! would fall below the bottom margin. Empty input still yields one page.

use crate::codec::pdf::{self, PdfWriter};
use crate::error::ConvertError;
use crate::format::Format;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, StringFormat};
use tracing::debug;

/// Page geometry and type settings, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
    pub font_size: f32,
    /// Multiplier applied to `font_size` to get the baseline-to-baseline distance.
    pub line_height: f32,
}

impl PageLayout {
    /// A4 portrait, 50 pt margins, 12 pt text at 1.2 line height.
    pub const A4: PageLayout = PageLayout {
        width: 595.0,
        height: 842.0,
        margin: 50.0,
        font_size: 12.0,
        line_height: 1.2,
    };

    pub fn leading(&self) -> f32 {
        self.font_size * self.line_height
    }

    /// How many baselines fit between the top and bottom margins.
    pub fn lines_per_page(&self) -> usize {
        let usable = self.height - 2.0 * self.margin;
        if usable < 0.0 {
            return 1;
        }
        (usable / self.leading()).floor() as usize + 1
    }
}

impl Default for PageLayout {
    fn default() -> Self {
        Self::A4
    }
}

/// Decode text input: UTF-8 with an optional BOM.
pub fn decode_text(bytes: &[u8]) -> Result<&str, ConvertError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    std::str::from_utf8(bytes).map_err(|e| ConvertError::malformed(Format::Txt, e))
}

/// Plain text → PDF with the A4 layout.
pub fn convert(bytes: &[u8]) -> Result<Vec<u8>, ConvertError> {
    render(decode_text(bytes)?, &PageLayout::A4)
}

/// Render `text` line by line with `layout`.
pub fn render(text: &str, layout: &PageLayout) -> Result<Vec<u8>, ConvertError> {
    let lines: Vec<&str> = text.lines().collect();
    let per_page = layout.lines_per_page();

    let mut writer = PdfWriter::new();
    let font_id = writer.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut chunks: Vec<&[&str]> = lines.chunks(per_page).collect();
    if chunks.is_empty() {
        chunks.push(&[]);
    }
    for chunk in &chunks {
        let resources = dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        };
        writer.add_page(layout.width, layout.height, page_content(chunk, layout), resources)?;
    }

    debug!(
        "Laid out {} lines on {} pages ({} per page)",
        lines.len(),
        writer.page_count(),
        per_page
    );
    writer.finish()
}

fn page_content(lines: &[&str], layout: &PageLayout) -> Content {
    if lines.is_empty() {
        return Content { operations: vec![] };
    }
    let mut ops = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), layout.font_size.into()]),
        Operation::new("TL", vec![layout.leading().into()]),
        Operation::new(
            "Td",
            vec![
                layout.margin.into(),
                (layout.height - layout.margin).into(),
            ],
        ),
    ];
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            ops.push(Operation::new("T*", vec![]));
        }
        ops.push(Operation::new(
            "Tj",
            vec![Object::String(pdf::winansi_encode(line), StringFormat::Literal)],
        ));
    }
    ops.push(Operation::new("ET", vec![]));
    Content { operations: ops }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::extract;

    #[test]
    fn a4_fits_fifty_two_lines() {
        assert_eq!(PageLayout::A4.lines_per_page(), 52);
        assert!((PageLayout::default().leading() - 14.4).abs() < 1e-4);
    }

    #[test]
    fn long_text_spans_pages_in_order() {
        let text: String = (1..=120).map(|i| format!("line {i}\n")).collect();
        let bytes = convert(text.as_bytes()).unwrap();

        let doc = pdf::load(&bytes).unwrap();
        assert_eq!(pdf::page_ids(&doc).len(), 3);
        assert_eq!(extract::extract_text(&bytes).unwrap(), text);
    }

    #[test]
    fn empty_input_gives_one_blank_page() {
        let bytes = convert(b"").unwrap();
        let doc = pdf::load(&bytes).unwrap();
        assert_eq!(pdf::page_ids(&doc).len(), 1);
        assert_eq!(extract::extract_text(&bytes).unwrap(), "");
    }

    #[test]
    fn blank_lines_and_bom_survive() {
        let bytes = convert("\u{FEFF}first\n\nthird".as_bytes()).unwrap();
        assert_eq!(extract::extract_text(&bytes).unwrap(), "first\n\nthird\n");
    }

    #[test]
    fn crlf_input_is_split_on_lines() {
        let bytes = convert(b"a\r\nb\r\n").unwrap();
        assert_eq!(extract::extract_text(&bytes).unwrap(), "a\nb\n");
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let err = convert(&[0x66, 0x6F, 0xFF, 0x6F]).unwrap_err();
        assert!(matches!(err, ConvertError::MalformedInput { .. }));
    }
}
