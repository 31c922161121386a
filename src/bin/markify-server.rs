//! HTTP server binary for markify.
//!
//! Flags override values from the optional TOML config file, which override
//! the built-in defaults.

use anyhow::{Context, Result};
use clap::Parser;
use markify::logging::{init_logging, sweep_logs};
use markify::{start_server, ServiceConfig};
use std::path::PathBuf;

const AFTER_HELP: &str = r#"ENDPOINT:
  POST /knowledge_base/doc_parse   multipart: file_bytes | file_path, parse_method=auto|ocr|txt
  GET  /health

VISION OCR:
  Scanned PDF pages and image uploads are read by a vision model.
  Set OPENAI_API_KEY (or ANTHROPIC_API_KEY / GEMINI_API_KEY), or pick a provider
  explicitly with --provider / EDGEQUAKE_PROVIDER.

PDFIUM:
  Point PDFIUM_LIB_PATH at libpdfium (file or directory) when it is not on the
  system library path.
"#;

/// Serve the document-to-Markdown parse endpoint.
#[derive(Parser, Debug)]
#[command(
    name = "markify-server",
    version,
    about = "Document-intake service: uploads in, Markdown out",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// TOML config file.
    #[arg(short, long, env = "MARKIFY_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address.
    #[arg(long, env = "MARKIFY_HOST")]
    host: Option<String>,

    /// Listen port.
    #[arg(short, long, env = "MARKIFY_PORT")]
    port: Option<u16>,

    /// Documents processed concurrently.
    #[arg(short, long, env = "MARKIFY_WORKERS")]
    workers: Option<usize>,

    /// Directory for log files.
    #[arg(long, env = "MARKIFY_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Root of the staging tree.
    #[arg(long, env = "MARKIFY_OUTPUT_ROOT")]
    output_root: Option<PathBuf>,

    /// Maximum PDF page count.
    #[arg(long, env = "MARKIFY_MAX_PAGES")]
    max_pages: Option<usize>,

    /// Minimum extracted characters (with --enforce-ctx-limits).
    #[arg(long, env = "MARKIFY_MIN_CTX")]
    min_ctx: Option<usize>,

    /// Maximum extracted characters (with --enforce-ctx-limits).
    #[arg(long, env = "MARKIFY_MAX_CTX")]
    max_ctx: Option<usize>,

    /// Maximum file size in MB.
    #[arg(long, env = "MARKIFY_MAX_SIZE")]
    max_size: Option<f64>,

    /// Reject documents whose extracted text is outside min/max ctx.
    #[arg(long, env = "MARKIFY_ENFORCE_CTX_LIMITS")]
    enforce_ctx_limits: bool,

    /// Path to libpdfium, or the directory holding it.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    /// Vision provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Vision model ID.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Debug-level logging.
    #[arg(short, long, env = "MARKIFY_VERBOSE")]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> Result<(ServiceConfig, bool)> {
        let base = match &self.config {
            Some(path) => ServiceConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ServiceConfig::default(),
        };

        let mut vision = base.vision.clone();
        if self.provider.is_some() {
            vision.provider = self.provider;
        }
        if self.model.is_some() {
            vision.model = self.model;
        }

        let mut b = ServiceConfig::builder_from(base).vision(vision);
        if let Some(v) = self.host {
            b = b.host(v);
        }
        if let Some(v) = self.port {
            b = b.port(v);
        }
        if let Some(v) = self.workers {
            b = b.workers(v);
        }
        if let Some(v) = self.log_dir {
            b = b.log_dir(v);
        }
        if let Some(v) = self.output_root {
            b = b.output_root(v);
        }
        if let Some(v) = self.max_pages {
            b = b.max_pages(v);
        }
        if let Some(v) = self.min_ctx {
            b = b.min_ctx(v);
        }
        if let Some(v) = self.max_ctx {
            b = b.max_ctx(v);
        }
        if let Some(v) = self.max_size {
            b = b.max_size_mb(v);
        }
        if self.enforce_ctx_limits {
            b = b.enforce_ctx_limits(true);
        }
        if let Some(v) = self.pdfium_lib_path {
            b = b.pdfium_lib_path(v);
        }
        Ok((b.build()?, self.verbose))
    }
}

fn main() -> Result<()> {
    let (config, verbose) = Cli::parse().into_config()?;

    // ── Logging ──────────────────────────────────────────────────────────
    let log_file = init_logging(&config.log_dir, verbose)?;
    tracing::info!("Logging to {}", log_file.display());
    if let Err(e) = sweep_logs(&config.log_dir, config.retention.log_retention_days) {
        tracing::warn!("Log sweep failed: {}", e);
    }

    // ── Serve ────────────────────────────────────────────────────────────
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    runtime.block_on(start_server(&config))?;
    Ok(())
}
