//! Configuration for the conversion pipeline.
//!
//! All run-time behaviour is controlled through [`ConverterConfig`], built via
//! [`ConverterConfigBuilder`]. The output directory lives here rather than in
//! a module constant so every test can point the pipeline at its own scratch
//! directory.

use crate::error::ConvertError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;

/// Configuration for a [`crate::Converter`].
///
/// # Example
/// ```rust
/// use edgequake_convert::ConverterConfig;
///
/// let config = ConverterConfig::builder()
///     .output_dir("/var/lib/fconv/out")
///     .concurrency(8)
///     .timeout_secs(30)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConverterConfig {
    /// Directory generated artifacts are written to. Created on demand. Default: `converted`.
    pub output_dir: PathBuf,

    /// Number of conversions run at once by [`crate::Converter::convert_many`]. Default: 4.
    ///
    /// Conversions are CPU- and disk-bound and run on tokio's blocking pool,
    /// so there is little point going far beyond the core count.
    pub concurrency: usize,

    /// Abandon a conversion after this many seconds. Default: None (no limit).
    ///
    /// The worker thread is not interrupted; its result is discarded.
    pub timeout_secs: Option<u64>,

    /// Largest page edge, in points, the PDF rasteriser will allocate. Default: 16384.
    pub max_raster_edge: u32,

    /// Hours a history record stays valid before an external retention
    /// policy may purge it. Default: 24.
    pub retention_hours: u64,

    /// Batch progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("converted"),
            concurrency: 4,
            timeout_secs: None,
            max_raster_edge: 16_384,
            retention_hours: 24,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConverterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterConfig")
            .field("output_dir", &self.output_dir)
            .field("concurrency", &self.concurrency)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_raster_edge", &self.max_raster_edge)
            .field("retention_hours", &self.retention_hours)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConverterConfig {
    /// Create a new builder for `ConverterConfig`.
    pub fn builder() -> ConverterConfigBuilder {
        ConverterConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConverterConfig`].
#[derive(Debug)]
pub struct ConverterConfigBuilder {
    config: ConverterConfig,
}

impl ConverterConfigBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = Some(secs);
        self
    }

    pub fn max_raster_edge(mut self, px: u32) -> Self {
        self.config.max_raster_edge = px;
        self
    }

    pub fn retention_hours(mut self, hours: u64) -> Self {
        self.config.retention_hours = hours;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConverterConfig, ConvertError> {
        let c = &self.config;
        if c.output_dir.as_os_str().is_empty() {
            return Err(ConvertError::InvalidConfig(
                "output directory must not be empty".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(ConvertError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.timeout_secs == Some(0) {
            return Err(ConvertError::InvalidConfig(
                "Timeout must be at least 1 second".into(),
            ));
        }
        if c.max_raster_edge == 0 {
            return Err(ConvertError::InvalidConfig(
                "max_raster_edge must be > 0".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ConverterConfig::default();
        assert_eq!(c.output_dir, PathBuf::from("converted"));
        assert_eq!(c.concurrency, 4);
        assert_eq!(c.timeout_secs, None);
        assert_eq!(c.retention_hours, 24);
    }

    #[test]
    fn builder_clamps_concurrency() {
        let c = ConverterConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn builder_rejects_empty_output_dir() {
        let err = ConverterConfig::builder().output_dir("").build().unwrap_err();
        assert!(matches!(err, ConvertError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        assert!(ConverterConfig::builder().timeout_secs(0).build().is_err());
        assert_eq!(
            ConverterConfig::builder()
                .timeout_secs(5)
                .build()
                .unwrap()
                .timeout_secs,
            Some(5)
        );
    }

    #[test]
    fn debug_hides_callback() {
        let c = ConverterConfig::default();
        let s = format!("{c:?}");
        assert!(s.contains("output_dir"));
    }
}
