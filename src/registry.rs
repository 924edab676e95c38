//! Format capability registry: which (source, target) pairs are legal.
//!
//! This table is the single source of truth for routing. Adapters never
//! re-check compatibility; the dispatch table is validated against it when
//! a [`crate::Dispatcher`] is built.

use crate::error::ConvertError;
use crate::format::Format;

/// Permitted targets per source format.
const CAPABILITIES: &[(Format, &[Format])] = &[
    (
        Format::Pdf,
        &[Format::Jpg, Format::Png, Format::Txt, Format::Doc, Format::Docx],
    ),
    (Format::Jpg, &[Format::Pdf, Format::Png, Format::Webp]),
    (Format::Jpeg, &[Format::Pdf, Format::Png, Format::Webp]),
    (Format::Png, &[Format::Pdf, Format::Jpg, Format::Webp]),
    (Format::Webp, &[Format::Pdf, Format::Jpg, Format::Png]),
    (Format::Doc, &[Format::Txt]),
    (Format::Docx, &[Format::Txt]),
    (Format::Txt, &[Format::Pdf]),
];

/// Targets a source format may be converted to.
pub fn permitted_targets(source: Format) -> &'static [Format] {
    CAPABILITIES
        .iter()
        .find(|(s, _)| *s == source)
        .map(|(_, targets)| *targets)
        .unwrap_or(&[])
}

/// Like [`permitted_targets`] but for a raw format string.
///
/// Returns [`ConvertError::UnsupportedFormat`] when the string is not a
/// registry key.
pub fn permitted_targets_for(source: &str) -> Result<&'static [Format], ConvertError> {
    let source: Format = source.parse()?;
    Ok(permitted_targets(source))
}

/// Whether `source → target` is a registered conversion.
pub fn is_allowed(source: Format, target: Format) -> bool {
    permitted_targets(source).contains(&target)
}

/// Parse and validate a raw (source, target) pair.
///
/// Unknown strings and unregistered pairs both fail with an
/// invalid-conversion kind error before any adapter could run.
pub fn validate(source: &str, target: &str) -> Result<(Format, Format), ConvertError> {
    let source_fmt: Format = source.parse()?;
    let target_fmt: Format = target.parse()?;
    if !is_allowed(source_fmt, target_fmt) {
        return Err(ConvertError::InvalidConversion {
            source_format: source_fmt.to_string(),
            target_format: target_fmt.to_string(),
        });
    }
    Ok((source_fmt, target_fmt))
}

/// The whole table, for listing to callers.
pub fn supported_conversions() -> impl Iterator<Item = (Format, &'static [Format])> {
    CAPABILITIES.iter().map(|(s, t)| (*s, *t))
}

/// Every registered (source, target) pair.
pub fn registered_pairs() -> impl Iterator<Item = (Format, Format)> {
    supported_conversions().flat_map(|(s, targets)| targets.iter().map(move |t| (s, *t)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_documented_capabilities() {
        assert_eq!(
            permitted_targets(Format::Pdf),
            &[Format::Jpg, Format::Png, Format::Txt, Format::Doc, Format::Docx]
        );
        assert_eq!(permitted_targets(Format::Doc), &[Format::Txt]);
        assert_eq!(permitted_targets(Format::Txt), &[Format::Pdf]);
        assert_eq!(registered_pairs().count(), 5 + 3 * 4 + 2 + 1);
    }

    #[test]
    fn every_format_is_a_source() {
        for f in Format::ALL {
            assert!(!permitted_targets(f).is_empty(), "{f} has no targets");
        }
    }

    #[test]
    fn lookup_normalises_strings() {
        let targets = permitted_targets_for(" JPEG ").unwrap();
        assert!(targets.contains(&Format::Webp));
        assert!(permitted_targets_for("gif").is_err());
    }

    #[test]
    fn doc_to_png_is_invalid() {
        let err = validate("doc", "png").unwrap_err();
        assert!(matches!(err, ConvertError::InvalidConversion { .. }));
    }

    #[test]
    fn raster_to_itself_is_not_registered() {
        assert!(!is_allowed(Format::Png, Format::Png));
        assert!(!is_allowed(Format::Jpg, Format::Jpeg));
        assert!(is_allowed(Format::Jpeg, Format::Png));
    }

    #[test]
    fn validate_accepts_mixed_case() {
        assert_eq!(validate("PDF", "Txt").unwrap(), (Format::Pdf, Format::Txt));
    }
}
