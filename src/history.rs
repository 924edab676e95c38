//! Conversion history: one record per attempt.
//!
//! A record is opened as `pending` when a request arrives, moves to
//! `processing` once its formats are known, and is closed exactly once as
//! `completed` or `failed`. The [`ConversionHistory`] trait is the
//! persistence seam; [`InMemoryHistory`] is the bundled implementation.
//!
//! ```text
//! pending ──▶ processing ──┬─▶ completed ──▶ (downloads counted)
//!     │                    └─▶ failed
//!     └────────────────────────▶ failed     (request rejected early)
//! ```

use crate::error::{ConvertError, FailureKind};
use crate::format::Format;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

pub type RecordId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl RecordStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RecordStatus::Completed | RecordStatus::Failed)
    }
}

/// What is known about an attempt before any work is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConversion {
    pub original_file_name: String,
    /// Declared source type as given by the caller.
    pub original_file_type: String,
    /// Requested target type as given by the caller.
    pub target_file_type: String,
    pub original_file_path: PathBuf,
    pub original_file_size: u64,
}

/// A stored conversion attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRecord {
    pub id: RecordId,
    pub original_file_name: String,
    /// Upper-case, e.g. `PNG`.
    pub original_file_type: String,
    /// Upper-case, e.g. `PDF`.
    pub target_file_type: String,
    pub original_file_path: PathBuf,
    pub original_file_size: u64,
    pub converted_file_path: Option<PathBuf>,
    pub converted_file_size: u64,
    pub status: RecordStatus,
    pub error_kind: Option<FailureKind>,
    pub error_message: Option<String>,
    pub processing_time_ms: u64,
    pub download_count: u64,
    /// Unix epoch milliseconds.
    pub created_at: u64,
    /// Unix epoch milliseconds.
    pub expires_at: u64,
}

impl ConversionRecord {
    /// File name offered for download: original stem plus target extension.
    pub fn download_name(&self) -> String {
        let stem = Path::new(&self.original_file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "converted".to_string());
        let ext = self
            .target_file_type
            .parse::<Format>()
            .map(|f| f.extension().to_string())
            .unwrap_or_else(|_| self.target_file_type.to_lowercase());
        format!("{stem}.{ext}")
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }
}

/// Persistence seam for conversion records.
///
/// Implementations must be safe to share between concurrent conversions.
pub trait ConversionHistory: Send + Sync {
    /// Open a `pending` record.
    fn begin(&self, new: NewConversion) -> Result<RecordId, ConvertError>;

    /// Move a pending record to `processing`.
    fn start(&self, id: RecordId) -> Result<(), ConvertError>;

    /// Close a record as `completed`.
    fn complete(
        &self,
        id: RecordId,
        converted_path: &Path,
        converted_size: u64,
        processing_time_ms: u64,
    ) -> Result<(), ConvertError>;

    /// Close a record as `failed`.
    fn fail(
        &self,
        id: RecordId,
        error: &ConvertError,
        processing_time_ms: u64,
    ) -> Result<(), ConvertError>;

    fn get(&self, id: RecordId) -> Option<ConversionRecord>;

    /// Count a download of a completed record and return the updated record.
    fn record_download(&self, id: RecordId) -> Result<ConversionRecord, ConvertError>;

    /// Newest first, at most `limit` records.
    fn recent(&self, limit: usize) -> Vec<ConversionRecord>;

    fn stats(&self) -> HistoryStats;

    /// Drop closed records whose expiry is at or before `now_ms`; returns
    /// how many went. Records still in flight are kept.
    fn purge_expired(&self, now_ms: u64) -> usize;
}

/// Aggregate figures over a set of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryStats {
    pub total_conversions: u64,
    pub successful_conversions: u64,
    pub failed_conversions: u64,
    pub total_original_size: u64,
    pub total_converted_size: u64,
    pub avg_processing_time_ms: f64,
}

impl HistoryStats {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ConversionRecord>) -> Self {
        let mut stats = HistoryStats::default();
        let mut total_time = 0u64;
        for r in records {
            stats.total_conversions += 1;
            match r.status {
                RecordStatus::Completed => stats.successful_conversions += 1,
                RecordStatus::Failed => stats.failed_conversions += 1,
                _ => {}
            }
            stats.total_original_size += r.original_file_size;
            stats.total_converted_size += r.converted_file_size;
            total_time += r.processing_time_ms;
        }
        if stats.total_conversions > 0 {
            stats.avg_processing_time_ms = total_time as f64 / stats.total_conversions as f64;
        }
        stats
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Mutex-guarded, process-local history.
#[derive(Debug)]
pub struct InMemoryHistory {
    records: Mutex<Vec<ConversionRecord>>,
    next_id: AtomicU64,
    retention_ms: u64,
}

impl Default for InMemoryHistory {
    fn default() -> Self {
        Self::new(24)
    }
}

impl InMemoryHistory {
    /// Records expire `retention_hours` after creation.
    pub fn new(retention_hours: u64) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            retention_ms: retention_hours.saturating_mul(60 * 60 * 1000),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ConversionRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<T>(
        &self,
        id: RecordId,
        f: impl FnOnce(&mut ConversionRecord) -> Result<T, ConvertError>,
    ) -> Result<T, ConvertError> {
        let mut records = self.lock();
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ConvertError::InvalidRequest(format!("no conversion record {id}")))?;
        f(record)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

fn close_check(record: &ConversionRecord) -> Result<(), ConvertError> {
    if record.status.is_terminal() {
        return Err(ConvertError::InvalidRequest(format!(
            "conversion record {} is already {:?}",
            record.id, record.status
        )));
    }
    Ok(())
}

impl ConversionHistory for InMemoryHistory {
    fn begin(&self, new: NewConversion) -> Result<RecordId, ConvertError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let created_at = now_ms();
        let record = ConversionRecord {
            id,
            original_file_name: new.original_file_name,
            original_file_type: new.original_file_type.trim().to_uppercase(),
            target_file_type: new.target_file_type.trim().to_uppercase(),
            original_file_path: new.original_file_path,
            original_file_size: new.original_file_size,
            converted_file_path: None,
            converted_file_size: 0,
            status: RecordStatus::Pending,
            error_kind: None,
            error_message: None,
            processing_time_ms: 0,
            download_count: 0,
            created_at,
            expires_at: created_at.saturating_add(self.retention_ms),
        };
        self.lock().push(record);
        Ok(id)
    }

    fn start(&self, id: RecordId) -> Result<(), ConvertError> {
        self.update(id, |r| {
            if r.status != RecordStatus::Pending {
                return Err(ConvertError::InvalidRequest(format!(
                    "conversion record {id} is {:?}, expected Pending",
                    r.status
                )));
            }
            r.status = RecordStatus::Processing;
            Ok(())
        })
    }

    fn complete(
        &self,
        id: RecordId,
        converted_path: &Path,
        converted_size: u64,
        processing_time_ms: u64,
    ) -> Result<(), ConvertError> {
        self.update(id, |r| {
            close_check(r)?;
            r.status = RecordStatus::Completed;
            r.converted_file_path = Some(converted_path.to_path_buf());
            r.converted_file_size = converted_size;
            r.processing_time_ms = processing_time_ms;
            Ok(())
        })
    }

    fn fail(
        &self,
        id: RecordId,
        error: &ConvertError,
        processing_time_ms: u64,
    ) -> Result<(), ConvertError> {
        self.update(id, |r| {
            close_check(r)?;
            warn!("Conversion record {} failed: {}", id, error);
            r.status = RecordStatus::Failed;
            r.error_kind = Some(error.kind());
            r.error_message = Some(error.to_string());
            r.processing_time_ms = processing_time_ms;
            Ok(())
        })
    }

    fn get(&self, id: RecordId) -> Option<ConversionRecord> {
        self.lock().iter().find(|r| r.id == id).cloned()
    }

    fn record_download(&self, id: RecordId) -> Result<ConversionRecord, ConvertError> {
        self.update(id, |r| {
            if r.status != RecordStatus::Completed {
                return Err(ConvertError::InvalidRequest(format!(
                    "conversion record {id} is not completed"
                )));
            }
            r.download_count += 1;
            Ok(r.clone())
        })
    }

    fn recent(&self, limit: usize) -> Vec<ConversionRecord> {
        let mut out = self.lock().to_vec();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        out.truncate(limit);
        out
    }

    fn stats(&self) -> HistoryStats {
        HistoryStats::from_records(self.lock().iter())
    }

    fn purge_expired(&self, now_ms: u64) -> usize {
        let mut records = self.lock();
        let before = records.len();
        records.retain(|r| !(r.status.is_terminal() && r.is_expired(now_ms)));
        let purged = before - records.len();
        if purged > 0 {
            debug!("Purged {} expired conversion records", purged);
        }
        purged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_conversion(name: &str, size: u64) -> NewConversion {
        NewConversion {
            original_file_name: name.to_string(),
            original_file_type: "png".to_string(),
            target_file_type: "pdf".to_string(),
            original_file_path: PathBuf::from("/uploads").join(name),
            original_file_size: size,
        }
    }

    #[test]
    fn lifecycle_to_completed() {
        let h = InMemoryHistory::new(24);
        let id = h.begin(new_conversion("scan.png", 100)).unwrap();
        let r = h.get(id).unwrap();
        assert_eq!(r.status, RecordStatus::Pending);
        assert_eq!(r.original_file_type, "PNG");
        assert_eq!(r.expires_at - r.created_at, 24 * 60 * 60 * 1000);

        h.start(id).unwrap();
        h.complete(id, Path::new("/out/scan_1-0.pdf"), 250, 12).unwrap();
        let r = h.get(id).unwrap();
        assert_eq!(r.status, RecordStatus::Completed);
        assert_eq!(r.converted_file_size, 250);
        assert_eq!(r.download_name(), "scan.pdf");
    }

    #[test]
    fn terminal_records_cannot_be_closed_twice() {
        let h = InMemoryHistory::default();
        let id = h.begin(new_conversion("a.png", 1)).unwrap();
        h.fail(id, &ConvertError::malformed("png", "bad"), 1).unwrap();
        let err = h.complete(id, Path::new("/out/a.pdf"), 1, 1).unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidRequest);

        let r = h.get(id).unwrap();
        assert_eq!(r.status, RecordStatus::Failed);
        assert_eq!(r.error_kind, Some(FailureKind::MalformedInput));
        assert!(r.converted_file_path.is_none());
    }

    #[test]
    fn downloads_only_count_for_completed() {
        let h = InMemoryHistory::default();
        let id = h.begin(new_conversion("a.png", 1)).unwrap();
        assert!(h.record_download(id).is_err());
        h.start(id).unwrap();
        h.complete(id, Path::new("/out/a.pdf"), 5, 1).unwrap();
        assert_eq!(h.record_download(id).unwrap().download_count, 1);
        assert_eq!(h.record_download(id).unwrap().download_count, 2);
    }

    #[test]
    fn stats_and_recent() {
        let h = InMemoryHistory::default();
        let ok = h.begin(new_conversion("ok.png", 100)).unwrap();
        h.start(ok).unwrap();
        h.complete(ok, Path::new("/out/ok.pdf"), 300, 10).unwrap();
        let bad = h.begin(new_conversion("bad.png", 50)).unwrap();
        h.fail(bad, &ConvertError::failed("raster-to-document", "x"), 30)
            .unwrap();

        let stats = h.stats();
        assert_eq!(stats.total_conversions, 2);
        assert_eq!(stats.successful_conversions, 1);
        assert_eq!(stats.failed_conversions, 1);
        assert_eq!(stats.total_original_size, 150);
        assert_eq!(stats.total_converted_size, 300);
        assert!((stats.avg_processing_time_ms - 20.0).abs() < f64::EPSILON);

        let recent = h.recent(1);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, bad);
    }

    #[test]
    fn empty_stats_are_zero() {
        assert_eq!(InMemoryHistory::default().stats(), HistoryStats::default());
    }

    #[test]
    fn purge_drops_expired_closed_records() {
        let h = InMemoryHistory::new(0);
        let done = h.begin(new_conversion("a.png", 1)).unwrap();
        h.fail(done, &ConvertError::malformed("png", "bad"), 1).unwrap();
        let in_flight = h.begin(new_conversion("b.png", 1)).unwrap();
        h.start(in_flight).unwrap();

        assert_eq!(h.purge_expired(now_ms()), 1);
        assert_eq!(h.len(), 1);
        assert!(h.get(in_flight).is_some());
    }

    #[test]
    fn trait_object_exposes_stats_and_recent() {
        let h: std::sync::Arc<dyn ConversionHistory> =
            std::sync::Arc::new(InMemoryHistory::default());
        let id = h.begin(new_conversion("a.png", 7)).unwrap();
        h.start(id).unwrap();
        h.complete(id, Path::new("/out/a.pdf"), 9, 3).unwrap();

        assert_eq!(h.stats().successful_conversions, 1);
        assert_eq!(h.recent(5)[0].id, id);
        assert_eq!(h.purge_expired(now_ms()), 0);
    }

    #[test]
    fn download_name_falls_back_for_unknown_type() {
        let h = InMemoryHistory::default();
        let mut n = new_conversion("archive.tar.gz", 1);
        n.target_file_type = "ZIP".into();
        let id = h.begin(n).unwrap();
        assert_eq!(h.get(id).unwrap().download_name(), "archive.tar.zip");
    }
}
