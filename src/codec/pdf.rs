//! Shared PDF plumbing on top of `lopdf`: a small page-tree writer, loading
//! with header validation, inherited page attributes and WinAnsi text
//! encoding.

use crate::error::ConvertError;
use crate::format::Format;
use lopdf::content::Content;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

/// Builds a document page by page, then serialises it.
pub(crate) struct PdfWriter {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl PdfWriter {
    pub(crate) fn new() -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    pub(crate) fn add_object(&mut self, object: impl Into<Object>) -> ObjectId {
        self.doc.add_object(object)
    }

    /// Append a `width × height` point page drawing `content` with `resources`.
    pub(crate) fn add_page(
        &mut self,
        width: f32,
        height: f32,
        content: Content,
        resources: Dictionary,
    ) -> Result<ObjectId, ConvertError> {
        let encoded = content
            .encode()
            .map_err(|e| ConvertError::failed("pdf writer", e))?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), dimension(width), dimension(height)],
            "Contents" => content_id,
            "Resources" => resources,
        });
        self.kids.push(page_id.into());
        Ok(page_id)
    }

    pub(crate) fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Close the page tree and serialise the document.
    pub(crate) fn finish(mut self) -> Result<Vec<u8>, ConvertError> {
        let count = self.kids.len() as i64;
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => self.kids,
            "Count" => count,
        };
        self.doc
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.compress();

        let mut buf = Vec::new();
        self.doc
            .save_to(&mut buf)
            .map_err(|e| ConvertError::failed("pdf writer", e))?;
        debug!("Serialised PDF: {} pages, {} bytes", count, buf.len());
        Ok(buf)
    }
}

/// Whole-point dimensions are written as integers.
fn dimension(v: f32) -> Object {
    if v.fract() == 0.0 {
        Object::Integer(v as i64)
    } else {
        Object::Real(v.into())
    }
}

/// Parse a PDF, rejecting anything without a `%PDF-` header.
pub(crate) fn load(bytes: &[u8]) -> Result<Document, ConvertError> {
    let head = &bytes[..bytes.len().min(1024)];
    if !head.windows(5).any(|w| w == b"%PDF-") {
        let magic: Vec<u8> = bytes.iter().take(4).copied().collect();
        return Err(ConvertError::malformed(
            Format::Pdf,
            format!("missing %PDF header (first bytes: {magic:?})"),
        ));
    }
    Document::load_mem(bytes).map_err(|e| ConvertError::malformed(Format::Pdf, e))
}

/// Page object ids in page order.
pub(crate) fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

/// Width and height in points of a page's MediaBox.
pub(crate) fn page_size(doc: &Document, page_id: ObjectId) -> Result<(f32, f32), ConvertError> {
    let media_box = inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| obj.as_array().ok())
        .ok_or_else(|| ConvertError::malformed(Format::Pdf, "page has no MediaBox"))?;

    let coords: Vec<f32> = media_box
        .iter()
        .filter_map(|o| number(resolve(doc, o)))
        .collect();
    match coords.as_slice() {
        [x0, y0, x1, y1] => Ok(((x1 - x0).abs(), (y1 - y0).abs())),
        _ => Err(ConvertError::malformed(
            Format::Pdf,
            format!("MediaBox has {} numeric entries, expected 4", coords.len()),
        )),
    }
}

/// Look up `key` on the page or the nearest ancestor in the page tree.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    // Page trees are shallow; the bound only guards against Parent cycles.
    for _ in 0..64 {
        if let Ok(obj) = current.get(key) {
            return Some(resolve(doc, obj));
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

// ── WinAnsiEncoding ──────────────────────────────────────────────────────

/// Code points 0x80–0x9F where WinAnsi departs from Latin-1.
const WINANSI_HIGH: [(u8, char); 27] = [
    (0x80, '€'),
    (0x82, '‚'),
    (0x83, 'ƒ'),
    (0x84, '„'),
    (0x85, '…'),
    (0x86, '†'),
    (0x87, '‡'),
    (0x88, 'ˆ'),
    (0x89, '‰'),
    (0x8A, 'Š'),
    (0x8B, '‹'),
    (0x8C, 'Œ'),
    (0x8E, 'Ž'),
    (0x91, '\u{2018}'),
    (0x92, '\u{2019}'),
    (0x93, '\u{201C}'),
    (0x94, '\u{201D}'),
    (0x95, '•'),
    (0x96, '–'),
    (0x97, '—'),
    (0x98, '˜'),
    (0x99, '™'),
    (0x9A, 'š'),
    (0x9B, '›'),
    (0x9C, 'œ'),
    (0x9E, 'ž'),
    (0x9F, 'Ÿ'),
];

/// Encode text for a WinAnsi simple font; unmappable characters become `?`.
pub(crate) fn winansi_encode(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x00..=0x7F | 0xA0..=0xFF => c as u8,
            _ => WINANSI_HIGH
                .iter()
                .find(|(_, ch)| *ch == c)
                .map(|(b, _)| *b)
                .unwrap_or(b'?'),
        })
        .collect()
}

/// Decode a PDF string operand: UTF-16BE when BOM-prefixed, else WinAnsi.
pub(crate) fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes
        .iter()
        .map(|&b| {
            WINANSI_HIGH
                .iter()
                .find(|(code, _)| *code == b)
                .map(|(_, ch)| *ch)
                .unwrap_or(b as char)
        })
        .collect()
}
