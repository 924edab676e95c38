//! Conversion dispatcher: route a validated request to exactly one adapter.
//!
//! The dispatch table maps every registered (source, target) pair to an
//! [`Adapter`]. It is built and checked against [`crate::registry`] once per
//! process, so a pair that is registered but unrouted is found at start-up
//! rather than on the first unlucky request.
//!
//! ## Dispatch sequence
//!
//! ```text
//! request ─▶ is_allowed? ─no─▶ InvalidConversion (no side effects)
//!               │yes
//!               ▼
//!          read input ─▶ allocate output path ─▶ adapter ─▶ atomic write
//! ```
//!
//! Adapter errors and panics are both turned into a failed outcome; nothing
//! is written to the output path unless the adapter returned bytes.

use crate::artifact::ArtifactStore;
use crate::codec::{extract, image_pdf, layout, legacy, raster, rasterize};
use crate::config::ConverterConfig;
use crate::error::ConvertError;
use crate::format::{Family, Format};
use crate::outcome::{Artifact, ConversionOutcome, ConversionRequest};
use crate::registry;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tracing::{debug, info, warn};

/// The conversion families, one adapter each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Adapter {
    RasterToRaster,
    RasterToDocument,
    DocumentToRaster,
    DocumentToText,
    TextToDocument,
    DocumentToLegacyDocument,
    LegacyDocumentToText,
}

impl Adapter {
    /// The adapter handling `source → target`, if any family covers it.
    pub fn for_pair(source: Format, target: Format) -> Option<Adapter> {
        match (source.family(), target.family()) {
            (Family::Raster, Family::Raster) => Some(Adapter::RasterToRaster),
            (Family::Raster, Family::Document) => Some(Adapter::RasterToDocument),
            (Family::Document, Family::Raster) => Some(Adapter::DocumentToRaster),
            (Family::Document, Family::Text) => Some(Adapter::DocumentToText),
            (Family::Text, Family::Document) => Some(Adapter::TextToDocument),
            (Family::Document, Family::LegacyDocument) => Some(Adapter::DocumentToLegacyDocument),
            (Family::LegacyDocument, Family::Text) => Some(Adapter::LegacyDocumentToText),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Adapter::RasterToRaster => "raster-to-raster",
            Adapter::RasterToDocument => "raster-to-document",
            Adapter::DocumentToRaster => "document-to-raster",
            Adapter::DocumentToText => "document-to-text",
            Adapter::TextToDocument => "text-to-document",
            Adapter::DocumentToLegacyDocument => "document-to-legacy-document",
            Adapter::LegacyDocumentToText => "legacy-document-to-text",
        }
    }

    /// Transform `input` from `source` to `target`.
    pub fn run(
        self,
        input: &[u8],
        source: Format,
        target: Format,
        max_raster_edge: u32,
    ) -> Result<Vec<u8>, ConvertError> {
        match self {
            Adapter::RasterToRaster => raster::convert(input, source, target),
            Adapter::RasterToDocument => image_pdf::convert(input, source),
            Adapter::DocumentToRaster => rasterize::convert(input, target, max_raster_edge),
            Adapter::DocumentToText => extract::convert(input),
            Adapter::TextToDocument => layout::convert(input),
            Adapter::DocumentToLegacyDocument => legacy::to_legacy(input),
            Adapter::LegacyDocumentToText => legacy::to_text(input, source),
        }
    }
}

/// Registered pair → adapter.
#[derive(Debug)]
pub struct DispatchTable {
    routes: HashMap<(Format, Format), Adapter>,
}

impl DispatchTable {
    /// Route every registered pair, failing on the first one no adapter covers.
    pub fn build() -> Result<Self, ConvertError> {
        let mut routes = HashMap::new();
        for (source, target) in registry::registered_pairs() {
            let adapter = Adapter::for_pair(source, target).ok_or_else(|| {
                ConvertError::UnimplementedConversion {
                    source_format: source.to_string(),
                    target_format: target.to_string(),
                }
            })?;
            routes.insert((source, target), adapter);
        }
        debug!("Dispatch table built with {} routes", routes.len());
        Ok(Self { routes })
    }

    pub fn adapter(&self, source: Format, target: Format) -> Option<Adapter> {
        self.routes.get(&(source, target)).copied()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

static TABLE: Lazy<Result<DispatchTable, ConvertError>> = Lazy::new(DispatchTable::build);

/// The process-wide dispatch table.
///
/// Returns [`ConvertError::UnimplementedConversion`] if the capability table
/// names a pair no adapter handles.
pub fn shared_table() -> Result<&'static DispatchTable, ConvertError> {
    match &*TABLE {
        Ok(table) => Ok(table),
        Err(ConvertError::UnimplementedConversion {
            source_format,
            target_format,
        }) => Err(ConvertError::UnimplementedConversion {
            source_format: source_format.clone(),
            target_format: target_format.clone(),
        }),
        Err(other) => Err(ConvertError::Internal(other.to_string())),
    }
}

/// Runs single conversions against an [`ArtifactStore`].
#[derive(Debug, Clone)]
pub struct Dispatcher {
    table: &'static DispatchTable,
    store: ArtifactStore,
    max_raster_edge: u32,
}

impl Dispatcher {
    pub fn new(store: ArtifactStore, max_raster_edge: u32) -> Result<Self, ConvertError> {
        Ok(Self {
            table: shared_table()?,
            store,
            max_raster_edge,
        })
    }

    pub fn from_config(config: &ConverterConfig) -> Result<Self, ConvertError> {
        Self::new(
            ArtifactStore::new(&config.output_dir),
            config.max_raster_edge,
        )
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Run one conversion and return the written artifact.
    pub fn try_dispatch(&self, request: &ConversionRequest) -> Result<Artifact, ConvertError> {
        let (source, target) = (request.source_format, request.target_format);
        if !registry::is_allowed(source, target) {
            return Err(ConvertError::InvalidConversion {
                source_format: source.to_string(),
                target_format: target.to_string(),
            });
        }
        let adapter = self.table.adapter(source, target).ok_or_else(|| {
            ConvertError::UnimplementedConversion {
                source_format: source.to_string(),
                target_format: target.to_string(),
            }
        })?;

        let input = self.store.read_input(&request.input.path)?;
        let output_path = self
            .store
            .allocate_output_path(&request.base_name(), target)?;
        debug!(
            "{} → {} via {} ({} bytes in)",
            source,
            target,
            adapter.name(),
            input.len()
        );

        let max_edge = self.max_raster_edge;
        let bytes = panic::catch_unwind(AssertUnwindSafe(|| {
            adapter.run(&input, source, target, max_edge)
        }))
        .map_err(|payload| ConvertError::failed(adapter.name(), panic_message(payload.as_ref())))??;

        let size = self.store.write_output(&output_path, &bytes)?;
        Ok(Artifact::new(output_path, size))
    }

    /// Run one conversion and report it as an outcome; never returns an error.
    pub fn dispatch(&self, request: &ConversionRequest) -> ConversionOutcome {
        let started = Instant::now();
        let result = self.try_dispatch(request);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(artifact) => {
                info!(
                    "Converted {} {} → {} in {}ms ({} bytes)",
                    request.original_name,
                    request.source_format,
                    request.target_format,
                    elapsed_ms,
                    artifact.size
                );
                ConversionOutcome::completed(request, artifact, elapsed_ms)
            }
            Err(e) => {
                warn!(
                    "Conversion of {} {} → {} failed: {}",
                    request.original_name, request.source_format, request.target_format, e
                );
                ConversionOutcome::failed(request, &e, elapsed_ms)
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("adapter panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("adapter panicked: {s}")
    } else {
        "adapter panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::outcome::ConversionStatus;
    use tempfile::TempDir;

    fn dispatcher(dir: &TempDir) -> Dispatcher {
        Dispatcher::new(ArtifactStore::new(dir.path().join("out")), 16_384).unwrap()
    }

    fn files_in(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[test]
    fn every_registered_pair_has_an_adapter() {
        let table = DispatchTable::build().unwrap();
        assert_eq!(table.len(), registry::registered_pairs().count());
        assert_eq!(
            table.adapter(Format::Docx, Format::Txt),
            Some(Adapter::LegacyDocumentToText)
        );
        assert_eq!(table.adapter(Format::Doc, Format::Png), None);
    }

    #[test]
    fn unregistered_pair_has_no_side_effects() {
        let dir = TempDir::new().unwrap();
        let d = dispatcher(&dir);
        let request = ConversionRequest {
            source_format: Format::Doc,
            target_format: Format::Png,
            input: Artifact::new(dir.path().join("missing.doc"), 0),
            original_name: "missing.doc".into(),
        };
        let outcome = d.dispatch(&request);
        assert_eq!(outcome.status, ConversionStatus::Failed);
        assert_eq!(outcome.error.unwrap().kind, FailureKind::InvalidConversion);
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn text_to_pdf_writes_artifact() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("notes.txt");
        std::fs::write(&input, "one\ntwo\n").unwrap();

        let d = dispatcher(&dir);
        let request =
            ConversionRequest::new("txt", "pdf", Artifact::new(&input, 8), "notes.txt").unwrap();
        let outcome = d.dispatch(&request);
        assert!(outcome.is_completed(), "{:?}", outcome.error);

        let out = outcome.output.unwrap();
        let name = out.path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("notes_") && name.ends_with(".pdf"));
        assert_eq!(std::fs::metadata(&out.path).unwrap().len(), out.size);
    }

    #[test]
    fn malformed_input_leaves_no_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("fake.png");
        std::fs::write(&input, b"definitely not a png").unwrap();

        let d = dispatcher(&dir);
        let request =
            ConversionRequest::new("png", "jpg", Artifact::new(&input, 20), "fake.png").unwrap();
        let outcome = d.dispatch(&request);
        assert_eq!(outcome.error.unwrap().kind, FailureKind::MalformedInput);
        assert_eq!(files_in(&dir.path().join("out")), 0);
    }

    #[test]
    fn missing_input_is_io_failure() {
        let dir = TempDir::new().unwrap();
        let d = dispatcher(&dir);
        let request = ConversionRequest::new(
            "pdf",
            "txt",
            Artifact::new(dir.path().join("nope.pdf"), 0),
            "nope.pdf",
        )
        .unwrap();
        let err = d.try_dispatch(&request).unwrap_err();
        assert_eq!(err.kind(), FailureKind::IoFailure);
    }

    #[test]
    fn panic_payloads_are_described() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "adapter panicked: boom");
    }
}
