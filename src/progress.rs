//! Progress-callback trait for batch conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConverterConfigBuilder::progress_callback`] to receive
//! events while [`crate::Converter::convert_many`] works through a batch.
//!
//! # Example
//!
//! ```rust
//! use edgequake_convert::{ConversionProgressCallback, ConverterConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, index: usize, total: usize, output_size: u64) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("File {}/{} done ({} bytes)", index + 1, total, output_size);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ConverterConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the orchestrator as it processes each file of a batch.
///
/// Files are converted concurrently, so `on_file_start`, `on_file_complete`
/// and `on_file_error` may be called from different threads at once.
/// All methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before any file is converted.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called just before a file's conversion starts.
    ///
    /// # Arguments
    /// * `index` — 0-based position of the file in the batch
    /// * `total` — batch size
    /// * `name`  — original display name of the file
    fn on_file_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called when a file converted successfully.
    fn on_file_complete(&self, index: usize, total: usize, output_size: u64) {
        let _ = (index, total, output_size);
    }

    /// Called when a file failed.
    fn on_file_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after every file has been attempted.
    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let _ = (total_files, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConverterConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
