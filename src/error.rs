//! Error types for the edgequake-convert library.
//!
//! A single fatal error type, [`ConvertError`], covers every way a conversion
//! attempt can fail. Adapters return it as a value; the dispatcher never lets
//! anything else escape. Each variant maps onto one public [`FailureKind`],
//! which is what gets persisted in history records and shown to callers who
//! only need to pick a user-facing message.
//!
//! | Kind | Meaning |
//! |------|---------|
//! | `InvalidConversion` | pair not in the capability table, nothing was run |
//! | `UnimplementedConversion` | pair registered but no adapter wired (a defect) |
//! | `IoFailure` | input unreadable, output unwritable, disk full |
//! | `MalformedInput` | bytes do not parse as the declared source format |
//! | `ConversionFailed` | adapter-internal failure with its diagnostic |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-convert library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Routing errors ────────────────────────────────────────────────────
    /// The format string is not one of the supported formats.
    #[error("Unsupported format: '{format}'")]
    UnsupportedFormat { format: String },

    /// The (source, target) pair is not in the capability table.
    #[error("Cannot convert from {source_format} to {target_format}")]
    InvalidConversion {
        source_format: String,
        target_format: String,
    },

    /// The pair is registered but no adapter handles it.
    #[error("Conversion from {source_format} to {target_format} not yet implemented")]
    UnimplementedConversion {
        source_format: String,
        target_format: String,
    },

    // ── Request errors ────────────────────────────────────────────────────
    /// The request itself is incomplete (no target format, no extension, …).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Reading the input or writing the output failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Codec errors ──────────────────────────────────────────────────────
    /// Input bytes do not parse as the declared format.
    #[error("Input is not a valid {format} file: {detail}")]
    MalformedInput { format: String, detail: String },

    /// An adapter failed for a reason not covered above.
    #[error("{adapter} conversion failed: {detail}")]
    ConversionFailed { adapter: String, detail: String },

    // ── Orchestration errors ──────────────────────────────────────────────
    /// The conversion did not finish within the configured timeout.
    #[error("Conversion abandoned after {secs}s timeout")]
    TimedOut { secs: u64 },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error (e.g. a panicked worker task).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// Shorthand for an [`ConvertError::Io`] on `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConvertError::Io {
            path: path.into(),
            source,
        }
    }

    /// Shorthand for [`ConvertError::MalformedInput`].
    pub fn malformed(format: impl fmt::Display, detail: impl fmt::Display) -> Self {
        ConvertError::MalformedInput {
            format: format.to_string(),
            detail: detail.to_string(),
        }
    }

    /// Shorthand for [`ConvertError::ConversionFailed`].
    pub fn failed(adapter: impl fmt::Display, detail: impl fmt::Display) -> Self {
        ConvertError::ConversionFailed {
            adapter: adapter.to_string(),
            detail: detail.to_string(),
        }
    }

    /// The public failure category of this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            ConvertError::UnsupportedFormat { .. } | ConvertError::InvalidConversion { .. } => {
                FailureKind::InvalidConversion
            }
            ConvertError::UnimplementedConversion { .. } => FailureKind::UnimplementedConversion,
            ConvertError::InvalidRequest(_) => FailureKind::InvalidRequest,
            ConvertError::Io { .. } => FailureKind::IoFailure,
            ConvertError::MalformedInput { .. } => FailureKind::MalformedInput,
            ConvertError::TimedOut { .. } => FailureKind::TimedOut,
            ConvertError::ConversionFailed { .. }
            | ConvertError::InvalidConfig(_)
            | ConvertError::Internal(_) => FailureKind::ConversionFailed,
        }
    }
}

/// Failure category stored in outcome and history records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidConversion,
    UnimplementedConversion,
    InvalidRequest,
    IoFailure,
    MalformedInput,
    ConversionFailed,
    TimedOut,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::InvalidConversion => "invalid conversion",
            FailureKind::UnimplementedConversion => "unimplemented conversion",
            FailureKind::InvalidRequest => "invalid request",
            FailureKind::IoFailure => "I/O failure",
            FailureKind::MalformedInput => "malformed input",
            FailureKind::ConversionFailed => "conversion failed",
            FailureKind::TimedOut => "timed out",
        };
        f.write_str(s)
    }
}
