//! Artifact store: input reads, output naming and atomic output writes.
//!
//! Output files are named `<stem>_<unix millis>-<sequence>.<ext>` inside the
//! configured directory. The millisecond timestamp keeps names sortable; the
//! per-process sequence keeps two requests landing in the same millisecond
//! apart. Writes go to a hidden temp file in the same directory and are then
//! persisted without clobbering, so an output path either holds a complete
//! file or nothing.

use crate::error::ConvertError;
use crate::format::Format;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Manages the output directory for generated artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    output_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Create the output directory if it does not exist. Idempotent.
    pub fn ensure_output_dir(&self) -> Result<(), ConvertError> {
        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| ConvertError::io(&self.output_dir, e))
    }

    /// Reserve a fresh, collision-resistant output path.
    ///
    /// The directory is created first. The returned path does not exist yet.
    pub fn allocate_output_path(
        &self,
        base_name: &str,
        target: Format,
    ) -> Result<PathBuf, ConvertError> {
        self.ensure_output_dir()?;
        let stem = sanitise_stem(base_name);
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();

        loop {
            let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
            let candidate = self
                .output_dir
                .join(format!("{stem}_{millis}-{seq}.{}", target.extension()));
            if !candidate.exists() {
                debug!("Allocated output path {}", candidate.display());
                return Ok(candidate);
            }
        }
    }

    /// Read an input artifact fully.
    pub fn read_input(&self, path: &Path) -> Result<Vec<u8>, ConvertError> {
        std::fs::read(path).map_err(|e| ConvertError::io(path, e))
    }

    /// Write `bytes` to `path` atomically, returning the final byte count.
    ///
    /// Fails instead of overwriting when `path` already exists.
    pub fn write_output(&self, path: &Path, bytes: &[u8]) -> Result<u64, ConvertError> {
        let dir = path.parent().unwrap_or(&self.output_dir);
        std::fs::create_dir_all(dir).map_err(|e| ConvertError::io(dir, e))?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".fconv-")
            .suffix(".part")
            .tempfile_in(dir)
            .map_err(|e| ConvertError::io(dir, e))?;
        tmp.write_all(bytes).map_err(|e| ConvertError::io(path, e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| ConvertError::io(path, e))?;
        tmp.persist_noclobber(path)
            .map_err(|e| ConvertError::io(path, e.error))?;

        let size = self.size_of(path)?;
        debug!("Wrote {} bytes → {}", size, path.display());
        Ok(size)
    }

    /// Size of an artifact on disk.
    pub fn size_of(&self, path: &Path) -> Result<u64, ConvertError> {
        std::fs::metadata(path)
            .map(|m| m.len())
            .map_err(|e| ConvertError::io(path, e))
    }
}

/// Keep file-name-safe characters only; fall back to `converted`.
fn sanitise_stem(base_name: &str) -> String {
    let stem: String = base_name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = stem.trim_matches('.');
    if stem.is_empty() {
        "converted".to_string()
    } else {
        stem.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[test]
    fn allocate_creates_directory_and_unique_names() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path().join("nested/out"));

        let mut seen = HashSet::new();
        for _ in 0..50 {
            let p = store.allocate_output_path("report", Format::Txt).unwrap();
            assert!(seen.insert(p));
        }
        assert!(store.output_dir().is_dir());
        let any = seen.iter().next().unwrap();
        let name = any.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("report_"));
        assert!(name.ends_with(".txt"));
    }

    #[test]
    fn ensure_output_dir_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path().join("out"));
        store.ensure_output_dir().unwrap();
        store.ensure_output_dir().unwrap();
    }

    #[test]
    fn write_output_returns_size_and_refuses_overwrite() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path());
        let path = store.allocate_output_path("a", Format::Txt).unwrap();

        assert_eq!(store.write_output(&path, b"hello").unwrap(), 5);
        assert_eq!(store.read_input(&path).unwrap(), b"hello");
        assert_eq!(store.size_of(&path).unwrap(), 5);

        let err = store.write_output(&path, b"again").unwrap_err();
        assert!(matches!(err, ConvertError::Io { .. }));
        assert_eq!(store.read_input(&path).unwrap(), b"hello");
    }

    #[test]
    fn write_output_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path());
        let path = store.allocate_output_path("a", Format::Png).unwrap();
        store.write_output(&path, &[1, 2, 3]).unwrap();

        let names: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1, "got {names:?}");
    }

    #[test]
    fn missing_input_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path());
        let err = store.read_input(&tmp.path().join("nope.pdf")).unwrap_err();
        assert!(matches!(err, ConvertError::Io { .. }));
        assert!(store.size_of(&tmp.path().join("nope.pdf")).is_err());
    }

    #[test]
    fn sanitise_stem_strips_separators() {
        assert_eq!(sanitise_stem("my report"), "my_report");
        assert_eq!(sanitise_stem("../etc/passwd"), "_etc_passwd");
        assert_eq!(sanitise_stem(""), "converted");
        assert_eq!(sanitise_stem("..."), "converted");
    }
}
