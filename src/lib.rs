//! # edgequake-convert
//!
//! Convert files between PDF, JPG/JPEG, PNG, WEBP, DOC/DOCX and plain text.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (path + display name) + target format
//!  │
//!  ├─ 1. Orchestrate  open a history record, parse formats      (convert)
//!  ├─ 2. Validate     pair must be in the capability table      (registry)
//!  ├─ 3. Dispatch     pick the one adapter for the family pair  (dispatch)
//!  ├─ 4. Transform    bytes in → bytes out, spawn_blocking      (codec)
//!  ├─ 5. Store        unique name, temp file + no-clobber move  (artifact)
//!  └─ 6. Record       completed / failed with timing           (history)
//! ```
//!
//! | From | To |
//! |------|----|
//! | pdf | jpg, png, txt, doc, docx |
//! | jpg, jpeg | pdf, png, webp |
//! | png | pdf, jpg, webp |
//! | webp | pdf, jpg, png |
//! | doc, docx | txt |
//! | txt | pdf |
//!
//! PDF → image produces a white canvas the size of the first page rather
//! than a rendering, and PDF → DOC/DOCX produces a plain-text file with a
//! provenance footer. Both are intentional limits of this converter.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_convert::{Converter, ConverterConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConverterConfig::builder().output_dir("converted").build()?;
//!     let converter = Converter::new(config)?;
//!     let report = converter.convert_path("scan.png", "pdf").await?;
//!     if let Some(out) = report.output() {
//!         println!("{} ({} bytes)", out.path.display(), out.size);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `fconv` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod artifact;
pub mod codec;
pub mod config;
pub mod convert;
pub mod dispatch;
pub mod error;
pub mod format;
pub mod history;
pub mod outcome;
pub mod progress;
pub mod registry;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use artifact::ArtifactStore;
pub use config::{ConverterConfig, ConverterConfigBuilder};
pub use convert::{ConversionReport, Converter, UploadedFile};
pub use dispatch::{Adapter, DispatchTable, Dispatcher};
pub use error::{ConvertError, FailureKind};
pub use format::{Family, Format};
pub use history::{
    ConversionHistory, ConversionRecord, HistoryStats, InMemoryHistory, NewConversion,
    RecordId, RecordStatus,
};
pub use outcome::{Artifact, ConversionOutcome, ConversionRequest, ConversionStatus, FailureDetail};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
