//! CLI binary for pdf2img.
//!
//! A thin shim over the library crate: maps flags to `ConverterConfig`,
//! converts each input's first page, and writes `<stem>.png` files.

use anyhow::{Context, Result};
use clap::Parser;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use pdf2img::{ConversionRequest, ConversionResult, Converter, ConverterConfig, FailureKind};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

const AFTER_HELP: &str = r#"EXAMPLES:
  # Preview the first page of a résumé
  pdf2img Resume.pdf                       # → ./Resume.png

  # Several files into one directory
  pdf2img -o previews/ a.pdf b.PDF c.pdf

  # Machine-readable report, including inline data URLs
  pdf2img --json --data-url Resume.pdf

  # Bound a hung engine or render
  pdf2img --load-timeout 60 --render-timeout 30 Resume.pdf

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to an existing libpdfium (skips download)
  PDFIUM_AUTO_CACHE_DIR   Override the default pdfium cache directory
  RUST_LOG                Override the log filter (e.g. pdf2img=debug)

  PDFium (~30 MB) is downloaded automatically on first run and cached.
  If that fails, the system libpdfium is used instead.
"#;

/// Render the first page of PDF files to PNG.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2img",
    version,
    about = "Render the first page of PDF files to PNG",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF files to convert.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory to write `<stem>.png` files into.
    #[arg(short, long, env = "PDF2IMG_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// JSON file with a ConverterConfig; flags below override it.
    #[arg(long, env = "PDF2IMG_CONFIG")]
    config: Option<PathBuf>,

    /// Number of files converted at once.
    #[arg(short, long, env = "PDF2IMG_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Largest surface area in pixels.
    #[arg(long, env = "PDF2IMG_MAX_SURFACE_PIXELS")]
    max_surface_pixels: Option<u64>,

    /// Engine bootstrap timeout in seconds.
    #[arg(long, env = "PDF2IMG_LOAD_TIMEOUT")]
    load_timeout: Option<u64>,

    /// Per-file render/encode timeout in seconds.
    #[arg(long, env = "PDF2IMG_RENDER_TIMEOUT")]
    render_timeout: Option<u64>,

    /// Print a JSON report instead of human-readable lines.
    #[arg(long, env = "PDF2IMG_JSON")]
    json: bool,

    /// Include `data:image/png;base64,…` URLs in the output.
    #[arg(long)]
    data_url: bool,

    /// Disable the engine-loading spinner.
    #[arg(long, env = "PDF2IMG_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2IMG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2IMG_QUIET")]
    quiet: bool,
}

/// One line of the `--json` report.
#[derive(Debug, Serialize)]
struct FileReport {
    input: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<FailureKind>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
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

    let config = build_config(&cli).await?;

    // ── Engine bootstrap ─────────────────────────────────────────────────
    // Loading up front lets the spinner cover the one-time PDFium download;
    // conversions below join the already-loaded engine.
    let converter = if show_progress {
        let bar = engine_spinner();
        let progress_bar = bar.clone();
        let converter = Converter::with_download_progress(
            config,
            Arc::new(move |downloaded: u64, total: Option<u64>| {
                if let Some(t) = total {
                    progress_bar.set_length(t);
                }
                progress_bar.set_position(downloaded);
            }),
        );
        let loaded = converter.prewarm().await;
        bar.finish_and_clear();
        let handle = loaded.context("Failed to load the PDF rendering engine")?;
        eprintln!(
            "{} engine ready {}",
            green("✔"),
            dim(&format!("({}, {})", handle.source, handle.endpoint))
        );
        converter
    } else {
        Converter::new(config)
    };

    // ── Convert ──────────────────────────────────────────────────────────
    let reports: Vec<FileReport> = stream::iter(cli.inputs.iter())
        .map(|input| convert_one(&converter, input, &cli.output_dir, cli.data_url))
        .buffered(cli.concurrency.max(1))
        .collect()
        .await;

    let failed = reports.iter().filter(|r| r.error.is_some()).count();

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&reports).context("Failed to serialise report")?
        );
    } else {
        for r in &reports {
            print_report(r, cli.quiet);
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed}/{} files failed to convert", reports.len());
    }
    Ok(())
}

/// Read, convert, and save one input.
async fn convert_one(
    converter: &Converter,
    input: &Path,
    output_dir: &Path,
    data_url: bool,
) -> FileReport {
    let mut report = FileReport {
        input: input.to_path_buf(),
        output: None,
        width: None,
        height: None,
        data_url: None,
        error: None,
        kind: None,
    };

    let request = match ConversionRequest::from_path(input).await {
        Ok(r) => r,
        Err(e) => {
            report.error = Some(format!("Failed to read '{}': {e}", input.display()));
            return report;
        }
    };

    match converter.convert_request(request).await {
        ConversionResult::Converted(image) => {
            // The CLI never displays the image; release the reference.
            converter.display().revoke(&image.image_url);
            report.width = Some(image.width);
            report.height = Some(image.height);
            if data_url {
                report.data_url = Some(image.file.to_data_url());
            }
            match image.file.save_in(output_dir).await {
                Ok(path) => report.output = Some(path),
                Err(e) => report.error = Some(e.to_string()),
            }
        }
        ConversionResult::Failed(failure) => {
            report.kind = Some(failure.kind);
            report.error = Some(failure.message);
        }
    }
    report
}

fn print_report(r: &FileReport, quiet: bool) {
    match (&r.output, &r.error) {
        (_, Some(err)) => eprintln!("{} {}  {}", red("✗"), r.input.display(), red(err)),
        (Some(out), None) if !quiet => {
            eprintln!(
                "{} {} → {}  {}",
                green("✓"),
                r.input.display(),
                bold(&out.display().to_string()),
                dim(&format!(
                    "{}x{} px",
                    r.width.unwrap_or_default(),
                    r.height.unwrap_or_default()
                )),
            );
            if let Some(url) = &r.data_url {
                println!("{url}");
            }
        }
        _ => {
            if let Some(url) = &r.data_url {
                println!("{url}");
            }
        }
    }
}

fn engine_spinner() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  {msg}  {bytes}/{total_bytes}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(TICKS),
    );
    bar.set_prefix("PDF engine");
    bar.set_message("Loading…");
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// Map the config file and CLI flags to `ConverterConfig`.
async fn build_config(cli: &Cli) -> Result<ConverterConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config from {path:?}"))?;
            serde_json::from_str(&raw).with_context(|| format!("Invalid config file {path:?}"))?
        }
        None => ConverterConfig::default(),
    };

    if let Some(px) = cli.max_surface_pixels {
        config.max_surface_pixels = px;
    }
    if let Some(secs) = cli.load_timeout {
        config.engine_load_timeout_secs = Some(secs);
    }
    if let Some(secs) = cli.render_timeout {
        config.render_timeout_secs = Some(secs);
    }

    config.validate()?;
    Ok(config)
}
