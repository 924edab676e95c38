//! CLI binary for edgequake-convert.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConverterConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_convert::registry;
use edgequake_convert::{
    ConversionProgressCallback, ConversionReport, ConvertError, Converter, ConverterConfig,
    ProgressCallback, UploadedFile,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar for the whole batch plus a log line per finished file. Files
/// finish out of order, so start times are keyed by batch index.
struct CliProgressCallback {
    bar: ProgressBar,
    names: Mutex<HashMap<usize, (String, Instant)>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            names: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn finish_file(&self, index: usize) -> (String, f64) {
        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&index)
            .map(|(name, t)| (name, t.elapsed().as_secs_f64()))
            .unwrap_or_default()
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        self.bar.set_length(total_files as u64);
    }

    fn on_file_start(&self, index: usize, _total: usize, name: &str) {
        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(index, (name.to_string(), Instant::now()));
        self.bar.set_message(name.to_string());
    }

    fn on_file_complete(&self, index: usize, total: usize, output_size: u64) {
        let (name, secs) = self.finish_file(index);
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<32}  {}  {}",
            green("✓"),
            index + 1,
            total,
            name,
            dim(&format!("{output_size:>9} bytes")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, index: usize, total: usize, error: &str) {
        let (name, secs) = self.finish_file(index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            let mut s: String = error.chars().take(79).collect();
            s.push('\u{2026}');
            s
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<32}  {}  {}",
            red("✗"),
            index + 1,
            total,
            name,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let failed = total_files.saturating_sub(success_count);
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!(
                "{} {} files converted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} files converted  ({} failed)",
                if failed == total_files {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_files,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Image to PDF (written to ./converted)
  fconv scan.png --to pdf

  # Several files at once, into a chosen directory
  fconv a.jpg b.webp c.png --to pdf -o out/

  # Extract PDF text
  fconv report.pdf --to txt

  # Machine-readable results
  fconv notes.txt --to pdf --json

  # What converts to what
  fconv --formats

LIMITATIONS:
  pdf → jpg/png   white image the size of page 1, not a rendering
  pdf → doc/docx  plain text with a provenance footer, not a Word file
  doc → txt       only DOCX packages and plain-text files are read

ENVIRONMENT VARIABLES:
  FCONV_TO           Default target format
  FCONV_OUTPUT_DIR   Output directory (default: converted)
  FCONV_CONCURRENCY  Files converted at once (default: 4)
  FCONV_TIMEOUT      Seconds before a conversion is abandoned
  RUST_LOG           tracing filter, overrides -v / -q
"#;

/// Convert files between PDF, image, DOCX and text formats.
#[derive(Parser, Debug)]
#[command(
    name = "fconv",
    version,
    about = "Convert files between PDF, JPG, PNG, WEBP, DOC/DOCX and TXT",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input files; the extension declares each file's format.
    #[arg(required_unless_present = "formats")]
    inputs: Vec<PathBuf>,

    /// Target format (pdf, jpg, jpeg, png, webp, doc, docx, txt).
    #[arg(short, long, env = "FCONV_TO", required_unless_present = "formats")]
    to: Option<String>,

    /// Directory converted files are written to.
    #[arg(short, long, env = "FCONV_OUTPUT_DIR", default_value = "converted")]
    output_dir: PathBuf,

    /// Number of files converted at once.
    #[arg(short, long, env = "FCONV_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Abandon a conversion after this many seconds.
    #[arg(long, env = "FCONV_TIMEOUT")]
    timeout: Option<u64>,

    /// Print the supported conversions and exit.
    #[arg(long)]
    formats: bool,

    /// Print results as JSON.
    #[arg(long, env = "FCONV_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "FCONV_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "FCONV_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "FCONV_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Formats listing ──────────────────────────────────────────────────
    if cli.formats {
        print_formats(cli.json)?;
        return Ok(());
    }

    let target = cli
        .to
        .clone()
        .context("--to is required when converting")?;

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    let converter = Converter::new(config).context("Failed to initialise converter")?;

    // ── Run conversions ──────────────────────────────────────────────────
    let mut jobs = Vec::with_capacity(cli.inputs.len());
    let mut results: Vec<(PathBuf, Result<ConversionReport, ConvertError>)> = Vec::new();
    let mut queued = Vec::new();
    for path in &cli.inputs {
        match UploadedFile::from_path(path) {
            Ok(upload) => {
                queued.push(path.clone());
                jobs.push((upload, target.clone()));
            }
            Err(e) => results.push((path.clone(), Err(e))),
        }
    }
    let converted = converter.convert_many(jobs).await;
    results.extend(queued.into_iter().zip(converted));

    let failed = results.iter().filter(|(_, r)| r.is_err()).count();

    if cli.json {
        let rows: Vec<serde_json::Value> = results
            .iter()
            .map(|(path, r)| match r {
                Ok(report) => serde_json::json!({
                    "input": path,
                    "record_id": report.record_id,
                    "outcome": report.outcome,
                }),
                Err(e) => serde_json::json!({
                    "input": path,
                    "error": { "kind": e.kind(), "message": e.to_string() },
                }),
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&rows).context("Failed to serialise results")?
        );
    } else if !cli.quiet {
        for (path, r) in &results {
            match r {
                Ok(report) => {
                    if let Some(out) = report.output() {
                        if !show_progress {
                            eprintln!(
                                "{}  {}  →  {}  {}",
                                green("✔"),
                                path.display(),
                                bold(&out.path.display().to_string()),
                                dim(&format!("{}ms", report.outcome.elapsed_ms)),
                            );
                        } else {
                            println!("{}", out.path.display());
                        }
                    }
                }
                Err(e) if !show_progress => {
                    eprintln!("{}  {}  {}", red("✘"), path.display(), red(&e.to_string()));
                }
                Err(_) => {}
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} conversions failed", failed, results.len());
    }
    Ok(())
}

/// Map CLI args to `ConverterConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConverterConfig> {
    let mut builder = ConverterConfig::builder()
        .output_dir(&cli.output_dir)
        .concurrency(cli.concurrency);
    if let Some(secs) = cli.timeout {
        builder = builder.timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

fn print_formats(json: bool) -> Result<()> {
    if json {
        let table: serde_json::Map<String, serde_json::Value> = registry::supported_conversions()
            .map(|(source, targets)| {
                let targets: Vec<String> = targets.iter().map(|t| t.to_string()).collect();
                (source.to_string(), serde_json::json!(targets))
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&table).context("Failed to serialise formats")?
        );
        return Ok(());
    }
    for (source, targets) in registry::supported_conversions() {
        let targets: Vec<String> = targets.iter().map(|t| t.to_string()).collect();
        println!("{:<6} → {}", source.to_string(), targets.join(", "));
    }
    Ok(())
}
