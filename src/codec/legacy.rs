//! Word-processor formats.
//!
//! PDF → DOC/DOCX writes the extracted text followed by a provenance footer.
//! The result is a plain-text file carrying a `.doc`/`.docx` extension, not a
//! Word binary or OOXML package; that is the documented fidelity of this
//! converter.
//!
//! DOC/DOCX → TXT sniffs the content rather than trusting the extension:
//!
//! ```text
//! PK\x03\x04 ...        OOXML package  → paragraphs + tables via docx-rs
//! D0 CF 11 E0 ...       OLE2 Word 97   → ConversionFailed (not supported)
//! anything else         plain text     → UTF-8, provenance footer removed
//! ```

use crate::codec::{extract, layout};
use crate::error::ConvertError;
use crate::format::Format;
use docx_rs::{
    DocumentChild, Paragraph, ParagraphChild, RunChild, Table, TableCellContent, TableChild,
    TableRowChild,
};
use tracing::debug;

/// Last line of every document produced by [`to_legacy`].
pub const FOOTER: &str = "Converted from PDF using PDF Converter";

const ADAPTER: &str = "legacy-document-to-text";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

fn footer_block() -> String {
    format!("\n\n---\n{FOOTER}")
}

/// PDF → DOC/DOCX.
pub fn to_legacy(bytes: &[u8]) -> Result<Vec<u8>, ConvertError> {
    let text = extract::extract_text(bytes)?;
    Ok(format!("{text}{}", footer_block()).into_bytes())
}

/// DOC/DOCX → TXT.
pub fn to_text(bytes: &[u8], source: Format) -> Result<Vec<u8>, ConvertError> {
    if bytes.starts_with(ZIP_MAGIC) {
        debug!("Reading {} as an OOXML package", source);
        return docx_text(bytes).map(String::into_bytes);
    }
    if bytes.starts_with(OLE_MAGIC) {
        return Err(ConvertError::failed(
            ADAPTER,
            "binary Word 97-2003 documents are not supported",
        ));
    }

    let text = layout::decode_text(bytes).map_err(|_| {
        ConvertError::malformed(source, "neither an OOXML package nor UTF-8 text")
    })?;
    let footer = footer_block();
    let body = text
        .strip_suffix(footer.as_str())
        .or_else(|| text.strip_suffix(&format!("{footer}\n")))
        .unwrap_or(text);
    Ok(body.as_bytes().to_vec())
}

fn docx_text(bytes: &[u8]) -> Result<String, ConvertError> {
    let docx = docx_rs::read_docx(bytes).map_err(|e| ConvertError::malformed(Format::Docx, e))?;

    let mut lines: Vec<String> = Vec::new();
    for child in &docx.document.children {
        match child {
            DocumentChild::Paragraph(p) => lines.push(paragraph_text(p)),
            DocumentChild::Table(t) => lines.extend(table_rows(t)),
            _ => {}
        }
    }

    let mut text = lines.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    Ok(text)
}

fn paragraph_text(p: &Paragraph) -> String {
    let mut text = String::new();
    for child in &p.children {
        match child {
            ParagraphChild::Run(r) => {
                for run_child in &r.children {
                    match run_child {
                        RunChild::Text(t) => text.push_str(&t.text),
                        RunChild::Tab(_) => text.push('\t'),
                        RunChild::Break(_) => text.push('\n'),
                        _ => {}
                    }
                }
            }
            ParagraphChild::Hyperlink(h) => {
                for child in &h.children {
                    if let ParagraphChild::Run(r) = child {
                        for run_child in &r.children {
                            if let RunChild::Text(t) = run_child {
                                text.push_str(&t.text);
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
    text
}

/// One line per row, cells separated by ` | `.
fn table_rows(t: &Table) -> Vec<String> {
    t.rows
        .iter()
        .map(|row| {
            let TableChild::TableRow(r) = row;
            r.cells
                .iter()
                .map(|cell| {
                    let TableRowChild::TableCell(c) = cell;
                    c.children
                        .iter()
                        .filter_map(|content| match content {
                            TableCellContent::Paragraph(p) => Some(paragraph_text(p)),
                            _ => None,
                        })
                        .filter(|s| !s.is_empty())
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect::<Vec<_>>()
                .join(" | ")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_rs::{Docx, Run, TableCell, TableRow};
    use std::io::Cursor;

    fn docx_bytes(docx: Docx) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        docx.build().pack(&mut buf).unwrap();
        buf.into_inner()
    }

    fn para(s: &str) -> Paragraph {
        Paragraph::new().add_run(Run::new().add_text(s))
    }

    #[test]
    fn legacy_output_is_text_plus_footer() {
        let pdf = layout::convert(b"Hello\nWorld").unwrap();
        let doc = to_legacy(&pdf).unwrap();
        let doc = String::from_utf8(doc).unwrap();
        assert!(doc.starts_with("Hello\nWorld\n"));
        assert!(doc.ends_with("\n---\nConverted from PDF using PDF Converter"));
    }

    #[test]
    fn legacy_text_round_trips_without_footer() {
        let pdf = layout::convert(b"Hello\nWorld").unwrap();
        let doc = to_legacy(&pdf).unwrap();
        let txt = to_text(&doc, Format::Doc).unwrap();
        assert_eq!(txt, b"Hello\nWorld\n");
    }

    #[test]
    fn docx_paragraphs_and_tables() {
        let table = Table::new(vec![TableRow::new(vec![
            TableCell::new().add_paragraph(para("a")),
            TableCell::new().add_paragraph(para("b")),
        ])]);
        let bytes = docx_bytes(
            Docx::new()
                .add_paragraph(para("Title"))
                .add_table(table)
                .add_paragraph(para("End")),
        );
        let txt = String::from_utf8(to_text(&bytes, Format::Docx).unwrap()).unwrap();
        assert_eq!(txt, "Title\na | b\nEnd\n");
    }

    #[test]
    fn ole_word_files_are_refused() {
        let mut bytes = OLE_MAGIC.to_vec();
        bytes.extend_from_slice(&[0; 64]);
        let err = to_text(&bytes, Format::Doc).unwrap_err();
        assert!(matches!(err, ConvertError::ConversionFailed { .. }));
    }

    #[test]
    fn broken_zip_is_malformed() {
        let err = to_text(b"PK\x03\x04not really a zip", Format::Docx).unwrap_err();
        assert!(matches!(err, ConvertError::MalformedInput { .. }));
    }

    #[test]
    fn non_utf8_non_zip_is_malformed() {
        let err = to_text(&[0xFF, 0xFE, 0x00, 0x41], Format::Doc).unwrap_err();
        assert!(matches!(err, ConvertError::MalformedInput { .. }));
    }
}
