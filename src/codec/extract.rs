//! PDF → text: walk each page's content stream in page order and collect
//! the strings shown by text operators.
//!
//! Line breaks come from the operators themselves: `T*`, `'` and `"` always
//! start a new line; a vertical `Td`/`TD` move, a `Tm` to a new baseline,
//! or the end of a text object (`ET`) close the current line if anything was
//! shown on it. Pages are concatenated with no separator.
//!
//! Strings are decoded through the encoding of the font selected by the
//! last `Tf`: a `/ToUnicode` CMap (Type0 / Identity-H fonts), or one of the
//! standard one-byte encodings. Without a usable font encoding, strings are
//! read as WinAnsi, or UTF-16BE when BOM-prefixed.

use crate::codec::pdf;
use crate::error::ConvertError;
use crate::format::Format;
use lopdf::content::Content;
use lopdf::{Document, Encoding, Object, ObjectId};
use std::collections::BTreeMap;
use tracing::debug;

/// `TJ` adjustments more negative than this (thousandths of an em) read as a space.
const TJ_SPACE_THRESHOLD: f32 = -250.0;

/// Extract the full text of a PDF in reading order.
pub fn extract_text(bytes: &[u8]) -> Result<String, ConvertError> {
    let doc = pdf::load(bytes)?;
    let pages = pdf::page_ids(&doc);
    let mut out = TextSink::default();

    for (idx, page_id) in pages.iter().enumerate() {
        let raw = doc
            .get_page_content(*page_id)
            .map_err(|e| ConvertError::malformed(Format::Pdf, format!("page {}: {e}", idx + 1)))?;
        let content = Content::decode(&raw)
            .map_err(|e| ConvertError::malformed(Format::Pdf, format!("page {}: {e}", idx + 1)))?;
        let mut fonts = PageFonts::load(&doc, *page_id);
        for op in &content.operations {
            out.apply(&op.operator, &op.operands, &mut fonts);
        }
        out.end_line();
    }

    debug!(
        "Extracted {} chars from {} pages",
        out.text.chars().count(),
        pages.len()
    );
    Ok(out.text)
}

/// PDF → plain-text file bytes.
pub fn convert(bytes: &[u8]) -> Result<Vec<u8>, ConvertError> {
    extract_text(bytes).map(String::into_bytes)
}

/// Font encodings of one page, keyed by resource name, plus the `Tf` selection.
struct PageFonts<'a> {
    encodings: BTreeMap<Vec<u8>, Encoding<'a>>,
    current: Option<Vec<u8>>,
}

impl<'a> PageFonts<'a> {
    fn load(doc: &'a Document, page_id: ObjectId) -> Self {
        let mut encodings = BTreeMap::new();
        match doc.get_page_fonts(page_id) {
            Ok(fonts) => {
                for (name, font) in fonts {
                    match font.get_font_encoding(doc) {
                        Ok(encoding) => {
                            encodings.insert(name, encoding);
                        }
                        Err(e) => debug!(
                            "Font /{} has no usable encoding: {}",
                            String::from_utf8_lossy(&name),
                            e
                        ),
                    }
                }
            }
            Err(e) => debug!("Could not read page fonts: {}", e),
        }
        Self {
            encodings,
            current: None,
        }
    }

    fn select(&mut self, operands: &[Object]) {
        self.current = operands
            .first()
            .and_then(|o| o.as_name().ok())
            .map(<[u8]>::to_vec);
    }

    fn decode(&self, bytes: &[u8]) -> String {
        let encoding = self
            .current
            .as_ref()
            .and_then(|name| self.encodings.get(name));
        if let Some(encoding) = encoding {
            match Document::decode_text(encoding, bytes) {
                Ok(text) => return text,
                Err(e) => debug!("Falling back to WinAnsi for a string: {}", e),
            }
        }
        pdf::decode_text_string(bytes)
    }
}

#[derive(Default)]
struct TextSink {
    text: String,
    /// Something was shown since the last line break.
    line_open: bool,
    baseline: Option<f32>,
}

impl TextSink {
    fn apply(&mut self, operator: &str, operands: &[Object], fonts: &mut PageFonts<'_>) {
        match operator {
            "Tf" => fonts.select(operands),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(&fonts.decode(bytes));
                }
            }
            "TJ" => {
                if let Some(Ok(items)) = operands.first().map(Object::as_array) {
                    self.line_open = true;
                    for item in items {
                        match item {
                            Object::String(bytes, _) => self.show(&fonts.decode(bytes)),
                            other => {
                                if pdf::number(other).is_some_and(|n| n < TJ_SPACE_THRESHOLD) {
                                    self.text.push(' ');
                                }
                            }
                        }
                    }
                }
            }
            "'" => {
                self.break_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(&fonts.decode(bytes));
                }
            }
            "\"" => {
                self.break_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    self.show(&fonts.decode(bytes));
                }
            }
            "T*" => self.break_line(),
            "Td" | "TD" => {
                if operands.get(1).and_then(pdf::number).is_some_and(|ty| ty != 0.0) {
                    self.end_line();
                }
            }
            "Tm" => {
                if let Some(y) = operands.get(5).and_then(pdf::number) {
                    if self.baseline.is_some_and(|prev| (prev - y).abs() > 0.01) {
                        self.end_line();
                    }
                    self.baseline = Some(y);
                }
            }
            "ET" => self.end_line(),
            _ => {}
        }
    }

    fn show(&mut self, text: &str) {
        self.text.push_str(text);
        self.line_open = true;
    }

    fn break_line(&mut self) {
        self.text.push('\n');
        self.line_open = false;
    }

    fn end_line(&mut self) {
        if self.line_open {
            self.break_line();
        }
    }
}
