//! Conversion orchestrator: the public entry points.
//!
//! One call converts one uploaded file:
//!
//! 1. check that a target format and a source extension were supplied
//! 2. open a `pending` history record
//! 3. parse both formats, mark the record `processing`
//! 4. run the dispatcher on tokio's blocking pool, optionally under a timeout
//! 5. close the record as `completed` or `failed` and hand the result back
//!
//! Failures are recorded and then returned as `Err`, so the caller decides
//! what to tell the user and whether to delete the upload.

use crate::config::ConverterConfig;
use crate::dispatch::Dispatcher;
use crate::error::ConvertError;
use crate::history::{now_ms, ConversionHistory, InMemoryHistory, NewConversion, RecordId};
use crate::outcome::{Artifact, ConversionOutcome, ConversionRequest};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A caller-supplied input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub path: PathBuf,
    /// Display name; its extension declares the source format.
    pub original_name: String,
    pub size: u64,
}

impl UploadedFile {
    pub fn new(path: impl Into<PathBuf>, original_name: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            original_name: original_name.into(),
            size,
        }
    }

    /// Describe a file on disk, using its own file name as the display name.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConvertError> {
        let path = path.as_ref();
        let size = std::fs::metadata(path)
            .map_err(|e| ConvertError::io(path, e))?
            .len();
        let original_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(path, original_name, size))
    }

    /// Extension of the display name, without the dot.
    fn extension(&self) -> Option<String> {
        Path::new(&self.original_name)
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .filter(|e| !e.trim().is_empty())
    }
}

/// A successful conversion and the history record that tracks it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionReport {
    pub record_id: RecordId,
    pub outcome: ConversionOutcome,
}

impl ConversionReport {
    /// The generated artifact.
    pub fn output(&self) -> Option<&Artifact> {
        self.outcome.output.as_ref()
    }
}

/// Converts uploaded files and keeps their history.
///
/// Cheap to clone; clones share the dispatcher and history.
#[derive(Clone)]
pub struct Converter {
    config: Arc<ConverterConfig>,
    dispatcher: Arc<Dispatcher>,
    history: Arc<dyn ConversionHistory>,
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl Converter {
    /// A converter with an [`InMemoryHistory`] honouring `retention_hours`.
    pub fn new(config: ConverterConfig) -> Result<Self, ConvertError> {
        let history = Arc::new(InMemoryHistory::new(config.retention_hours));
        Self::with_history(config, history)
    }

    /// A converter recording into the given history implementation.
    pub fn with_history(
        config: ConverterConfig,
        history: Arc<dyn ConversionHistory>,
    ) -> Result<Self, ConvertError> {
        let dispatcher = Dispatcher::from_config(&config)?;
        Ok(Self {
            config: Arc::new(config),
            dispatcher: Arc::new(dispatcher),
            history,
        })
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    pub fn history(&self) -> &Arc<dyn ConversionHistory> {
        &self.history
    }

    /// Convert `upload` to `target_format`.
    ///
    /// # Errors
    /// Every failure is returned after being recorded in history, except an
    /// absent target format or source extension, which are rejected before a
    /// record is opened.
    pub async fn convert(
        &self,
        upload: &UploadedFile,
        target_format: &str,
    ) -> Result<ConversionReport, ConvertError> {
        let deadline = self.config.timeout_secs.map(Duration::from_secs);
        self.convert_within(upload, target_format, deadline).await
    }

    async fn convert_within(
        &self,
        upload: &UploadedFile,
        target_format: &str,
        deadline: Option<Duration>,
    ) -> Result<ConversionReport, ConvertError> {
        if target_format.trim().is_empty() {
            return Err(ConvertError::InvalidRequest(
                "target format is required".into(),
            ));
        }
        let source_ext = upload.extension().ok_or_else(|| {
            ConvertError::InvalidRequest(format!(
                "cannot determine the format of '{}': no file extension",
                upload.original_name
            ))
        })?;

        self.purge_expired();
        let record_id = self.history.begin(NewConversion {
            original_file_name: upload.original_name.clone(),
            original_file_type: source_ext.clone(),
            target_file_type: target_format.trim().to_string(),
            original_file_path: upload.path.clone(),
            original_file_size: upload.size,
        })?;
        info!(
            "Starting conversion #{}: {} → {}",
            record_id, upload.original_name, target_format
        );

        let started = Instant::now();
        let request = match ConversionRequest::new(
            &source_ext,
            target_format,
            Artifact::new(&upload.path, upload.size),
            upload.original_name.clone(),
        ) {
            Ok(r) => r,
            Err(e) => return Err(self.record_failure(record_id, e, &started)),
        };
        if let Err(e) = self.history.start(record_id) {
            return Err(self.record_failure(record_id, e, &started));
        }

        match self.run_blocking(request, deadline).await {
            Ok(outcome) => match outcome.output.as_ref() {
                Some(artifact) => {
                    if let Err(e) = self.history.complete(
                        record_id,
                        &artifact.path,
                        artifact.size,
                        outcome.elapsed_ms,
                    ) {
                        discard_output(&outcome);
                        return Err(self.record_failure(record_id, e, &started));
                    }
                    info!(
                        "Conversion #{} complete: {} ({} bytes, {}ms)",
                        record_id,
                        artifact.path.display(),
                        artifact.size,
                        outcome.elapsed_ms
                    );
                    Ok(ConversionReport { record_id, outcome })
                }
                None => Err(self.record_failure(
                    record_id,
                    ConvertError::Internal("completed outcome without artifact".into()),
                    &started,
                )),
            },
            Err(e) => Err(self.record_failure(record_id, e, &started)),
        }
    }

    /// Convert a file on disk, deriving the display name from the path.
    pub async fn convert_path(
        &self,
        path: impl AsRef<Path>,
        target_format: &str,
    ) -> Result<ConversionReport, ConvertError> {
        let upload = UploadedFile::from_path(path)?;
        self.convert(&upload, target_format).await
    }

    /// Convert many files with at most `config.concurrency` in flight.
    ///
    /// Results come back in input order. Progress events go to the
    /// configured callback.
    pub async fn convert_many(
        &self,
        jobs: Vec<(UploadedFile, String)>,
    ) -> Vec<Result<ConversionReport, ConvertError>> {
        let total = jobs.len();
        let callback = self.config.progress_callback.clone();
        if let Some(ref cb) = callback {
            cb.on_batch_start(total);
        }

        let mut results: Vec<(usize, Result<ConversionReport, ConvertError>)> =
            stream::iter(jobs.into_iter().enumerate().map(|(index, (upload, target))| {
                let converter = self.clone();
                let callback = callback.clone();
                async move {
                    if let Some(ref cb) = callback {
                        cb.on_file_start(index, total, &upload.original_name);
                    }
                    let result = converter.convert(&upload, &target).await;
                    if let Some(ref cb) = callback {
                        match &result {
                            Ok(report) => cb.on_file_complete(
                                index,
                                total,
                                report.output().map(|a| a.size).unwrap_or_default(),
                            ),
                            Err(e) => cb.on_file_error(index, total, &e.to_string()),
                        }
                    }
                    (index, result)
                }
            }))
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;

        results.sort_by_key(|(index, _)| *index);
        let succeeded = results.iter().filter(|(_, r)| r.is_ok()).count();
        if let Some(ref cb) = callback {
            cb.on_batch_complete(total, succeeded);
        }
        info!("Batch complete: {}/{} converted", succeeded, total);
        results.into_iter().map(|(_, r)| r).collect()
    }

    /// Blocking wrapper around [`Converter::convert`].
    ///
    /// Creates a temporary tokio runtime; do not call from inside one.
    pub fn convert_sync(
        &self,
        upload: &UploadedFile,
        target_format: &str,
    ) -> Result<ConversionReport, ConvertError> {
        block_on(self.convert(upload, target_format))?
    }

    /// Drop history records past their retention; returns how many went.
    pub fn purge_expired(&self) -> usize {
        self.history.purge_expired(now_ms())
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    /// Dispatch on the blocking pool. A failed outcome comes back as `Err`.
    ///
    /// Past `deadline` the worker is abandoned, not interrupted. Whichever of
    /// the worker and the deadline sets `settled` first decides the result;
    /// a worker that loses deletes its own output.
    async fn run_blocking(
        &self,
        request: ConversionRequest,
        deadline: Option<Duration>,
    ) -> Result<ConversionOutcome, ConvertError> {
        let dispatcher = Arc::clone(&self.dispatcher);
        let settled = Arc::new(AtomicBool::new(false));
        let worker_settled = Arc::clone(&settled);
        let mut handle = tokio::task::spawn_blocking(move || {
            let started = Instant::now();
            let result = dispatcher.try_dispatch(&request);
            let elapsed_ms = started.elapsed().as_millis() as u64;
            let outcome =
                result.map(|artifact| ConversionOutcome::completed(&request, artifact, elapsed_ms));
            if worker_settled.swap(true, Ordering::SeqCst) {
                if let Ok(late) = &outcome {
                    discard_output(late);
                }
            }
            outcome
        });

        let joined = match deadline {
            None => handle.await,
            Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
                Ok(joined) => joined,
                // The worker settled first, so its result is already final.
                Err(_) if settled.swap(true, Ordering::SeqCst) => handle.await,
                Err(_) => {
                    warn!("Conversion abandoned after {:?}", limit);
                    return Err(ConvertError::TimedOut {
                        secs: limit.as_secs(),
                    });
                }
            },
        };
        joined.map_err(|e| ConvertError::Internal(format!("conversion task failed: {e}")))?
    }

    fn record_failure(&self, id: RecordId, error: ConvertError, started: &Instant) -> ConvertError {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        if let Err(e) = self.history.fail(id, &error, elapsed_ms) {
            warn!("Could not record failure of conversion #{}: {}", id, e);
        }
        debug!("Conversion #{} failed after {}ms", id, elapsed_ms);
        error
    }
}

/// Run `future` on a fresh runtime that does not wait for blocking workers on exit.
fn block_on<F: Future>(future: F) -> Result<F::Output, ConvertError> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| ConvertError::Internal(format!("Failed to create tokio runtime: {}", e)))?;
    let output = runtime.block_on(future);
    runtime.shutdown_background();
    Ok(output)
}

fn discard_output(outcome: &ConversionOutcome) {
    if let Some(artifact) = &outcome.output {
        match std::fs::remove_file(&artifact.path) {
            Ok(()) => debug!("Removed abandoned output {}", artifact.path.display()),
            Err(e) => warn!(
                "Could not remove abandoned output {}: {}",
                artifact.path.display(),
                e
            ),
        }
    }
}
