//! Request and result types for one conversion attempt.

use crate::error::{ConvertError, FailureKind};
use crate::format::Format;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A reference to bytes at rest: an uploaded input or a generated output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }
}

/// A validated unit of work for the [`crate::Dispatcher`].
///
/// Formats are already normalised; build one through [`ConversionRequest::new`]
/// when starting from raw strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub source_format: Format,
    pub target_format: Format,
    pub input: Artifact,
    /// Original display name; its stem names the output file.
    pub original_name: String,
}

impl ConversionRequest {
    /// Parse raw format strings and assemble a request.
    ///
    /// Only the strings are checked here; whether the pair is permitted is
    /// the dispatcher's call.
    pub fn new(
        source_format: &str,
        target_format: &str,
        input: Artifact,
        original_name: impl Into<String>,
    ) -> Result<Self, ConvertError> {
        Ok(Self {
            source_format: source_format.parse()?,
            target_format: target_format.parse()?,
            input,
            original_name: original_name.into(),
        })
    }

    /// Base name used for the output file (`report.final.pdf` → `report.final`).
    pub fn base_name(&self) -> String {
        Path::new(&self.original_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionStatus {
    Completed,
    Failed,
}

/// Why an attempt failed, as stored and displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&ConvertError> for FailureDetail {
    fn from(e: &ConvertError) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

/// The immutable result of one conversion attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOutcome {
    pub status: ConversionStatus,
    pub source_format: Format,
    pub target_format: Format,
    /// Present when `status == Completed`.
    pub output: Option<Artifact>,
    /// Present when `status == Failed`.
    pub error: Option<FailureDetail>,
    pub elapsed_ms: u64,
}

impl ConversionOutcome {
    pub fn completed(request: &ConversionRequest, output: Artifact, elapsed_ms: u64) -> Self {
        Self {
            status: ConversionStatus::Completed,
            source_format: request.source_format,
            target_format: request.target_format,
            output: Some(output),
            error: None,
            elapsed_ms,
        }
    }

    pub fn failed(request: &ConversionRequest, error: &ConvertError, elapsed_ms: u64) -> Self {
        Self {
            status: ConversionStatus::Failed,
            source_format: request.source_format,
            target_format: request.target_format,
            output: None,
            error: Some(error.into()),
            elapsed_ms,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ConversionStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ConversionRequest {
        ConversionRequest::new("PNG", "pdf", Artifact::new("/in/photo.png", 10), "photo.png")
            .unwrap()
    }

    #[test]
    fn request_normalises_formats() {
        let r = request();
        assert_eq!(r.source_format, Format::Png);
        assert_eq!(r.target_format, Format::Pdf);
        assert_eq!(r.base_name(), "photo");
    }

    #[test]
    fn request_rejects_unknown_format() {
        let err = ConversionRequest::new("png", "tiff", Artifact::new("x", 0), "x.png").unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidConversion);
    }

    #[test]
    fn base_name_keeps_inner_dots() {
        let mut r = request();
        r.original_name = "report.final.pdf".into();
        assert_eq!(r.base_name(), "report.final");
    }

    #[test]
    fn failed_outcome_carries_detail() {
        let r = request();
        let err = ConvertError::malformed("png", "bad signature");
        let o = ConversionOutcome::failed(&r, &err, 3);
        assert!(!o.is_completed());
        assert!(o.output.is_none());
        let detail = o.error.unwrap();
        assert_eq!(detail.kind, FailureKind::MalformedInput);
        assert!(detail.message.contains("bad signature"));
    }

    #[test]
    fn outcome_serialises_status_lowercase() {
        let r = request();
        let o = ConversionOutcome::completed(&r, Artifact::new("/out/photo.pdf", 99), 12);
        let json = serde_json::to_value(&o).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["target_format"], "pdf");
        assert_eq!(json["output"]["size"], 99);
    }
}
