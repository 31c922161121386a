//! Service configuration.
//!
//! Everything the service needs to know is collected in one
//! [`ServiceConfig`], built via [`ServiceConfigBuilder`] or parsed from a TOML
//! file with [`ServiceConfig::from_toml_str`] / [`ServiceConfig::load`]. The
//! struct is constructed once at startup and handed to each component; nothing
//! reads limits or paths from process-wide state.
//!
//! Defaults match the values the service has always shipped with:
//! port 8562, one worker, 50 MB / 50 pages, 30-day output retention.

use crate::error::MarkifyError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Top-level configuration for the markify service.
///
/// # Example
/// ```rust
/// use markify::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .port(9000)
///     .workers(4)
///     .max_size_mb(20.0)
///     .build()
///     .unwrap();
/// assert_eq!(config.limits.max_pages, 50);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Bind address. Default: `0.0.0.0`.
    pub host: String,

    /// Bind port. Default: 8562.
    pub port: u16,

    /// Runtime worker threads, and the number of documents processed at once.
    /// Default: 1.
    pub workers: usize,

    /// Directory for daily log files. Default: `log`.
    pub log_dir: PathBuf,

    /// Root of the per-document staging directories. Default: `output`.
    pub output_root: PathBuf,

    /// Upload validation limits.
    pub limits: ValidationLimits,

    /// Output and log retention.
    pub retention: RetentionSettings,

    /// Maximum accepted HTTP request body in MB. Default: 512.
    ///
    /// Must stay above `limits.max_size_mb`: an oversize upload has to reach
    /// validation to get a proper rejection envelope instead of a bare 413.
    pub body_limit_mb: usize,

    /// Explicit pdfium library path. `None` binds the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Vision model used as OCR engine.
    pub vision: VisionSettings,

    /// Remote object-storage credentials.
    pub s3: S3Settings,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8562,
            workers: 1,
            log_dir: PathBuf::from("log"),
            output_root: PathBuf::from("output"),
            limits: ValidationLimits::default(),
            retention: RetentionSettings::default(),
            body_limit_mb: 512,
            pdfium_lib_path: None,
            vision: VisionSettings::default(),
            s3: S3Settings::default(),
        }
    }
}

impl ServiceConfig {
    /// Create a new builder starting from the defaults.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    /// Create a builder that starts from an existing config, e.g. one loaded
    /// from a file, so individual fields can be overridden.
    pub fn builder_from(config: ServiceConfig) -> ServiceConfigBuilder {
        ServiceConfigBuilder { config }
    }

    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, MarkifyError> {
        let config: ServiceConfig =
            toml::from_str(s).map_err(|e| MarkifyError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MarkifyError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| MarkifyError::io(path, e))?;
        Self::from_toml_str(&raw)
    }

    /// `host:port` string for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), MarkifyError> {
        if self.workers == 0 {
            return Err(MarkifyError::InvalidConfig("workers must be ≥ 1".into()));
        }
        if self.limits.max_size_mb <= 0.0 {
            return Err(MarkifyError::InvalidConfig(format!(
                "max_size_mb must be positive, got {}",
                self.limits.max_size_mb
            )));
        }
        if self.limits.min_ctx > self.limits.max_ctx {
            return Err(MarkifyError::InvalidConfig(format!(
                "min_ctx ({}) must not exceed max_ctx ({})",
                self.limits.min_ctx, self.limits.max_ctx
            )));
        }
        if (self.body_limit_mb as f64) < self.limits.max_size_mb {
            return Err(MarkifyError::InvalidConfig(format!(
                "body_limit_mb ({}) must be at least max_size_mb ({})",
                self.body_limit_mb, self.limits.max_size_mb
            )));
        }
        Ok(())
    }

    /// `body_limit_mb` in bytes, clamped to `usize::MAX`.
    pub fn body_limit_bytes(&self) -> usize {
        self.body_limit_mb.saturating_mul(1024 * 1024)
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = n;
        self
    }

    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.log_dir = dir.into();
        self
    }

    pub fn output_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_root = dir.into();
        self
    }

    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.limits.max_pages = n;
        self
    }

    pub fn min_ctx(mut self, n: usize) -> Self {
        self.config.limits.min_ctx = n;
        self
    }

    pub fn max_ctx(mut self, n: usize) -> Self {
        self.config.limits.max_ctx = n;
        self
    }

    pub fn max_size_mb(mut self, mb: f64) -> Self {
        self.config.limits.max_size_mb = mb;
        self
    }

    pub fn enforce_ctx_limits(mut self, v: bool) -> Self {
        self.config.limits.enforce_ctx_limits = v;
        self
    }

    pub fn retention_days(mut self, days: u64) -> Self {
        self.config.retention.older_than_days = days;
        self
    }

    pub fn sweep_interval_secs(mut self, secs: u64) -> Self {
        self.config.retention.min_interval_secs = secs;
        self
    }

    pub fn body_limit_mb(mut self, mb: usize) -> Self {
        self.config.body_limit_mb = mb;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn vision(mut self, vision: VisionSettings) -> Self {
        self.config.vision = vision;
        self
    }

    pub fn s3(mut self, s3: S3Settings) -> Self {
        self.config.s3 = s3;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, MarkifyError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Limits enforced by the validation gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationLimits {
    /// Maximum PDF page count. Default: 50.
    pub max_pages: usize,
    /// Minimum extracted character count. Default: 100.
    pub min_ctx: usize,
    /// Maximum extracted character count. Default: 20000.
    pub max_ctx: usize,
    /// Maximum file size in MB (after rounding to 2 decimals). Default: 50.
    pub max_size_mb: f64,
    /// Apply the `min_ctx..=max_ctx` check to extracted text. Default: false.
    pub enforce_ctx_limits: bool,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_pages: 50,
            min_ctx: 100,
            max_ctx: 20000,
            max_size_mb: 50.0,
            enforce_ctx_limits: false,
        }
    }
}

/// Retention of staged outputs and log files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionSettings {
    /// Files older than this many days are swept. Default: 30.
    pub older_than_days: u64,
    /// Minimum seconds between two actual sweeps. Default: 1800.
    pub min_interval_secs: u64,
    /// Log files older than this many days are removed at startup. Default: 180.
    pub log_retention_days: u64,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            older_than_days: 30,
            min_interval_secs: 1800,
            log_retention_days: 180,
        }
    }
}

/// Settings for the vision model that stands in as OCR engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionSettings {
    /// Provider name (`openai`, `anthropic`, `gemini`, `ollama`, ...).
    /// `None` auto-detects from the environment.
    pub provider: Option<String>,
    /// Model identifier. `None` uses `gpt-4.1-nano`.
    pub model: Option<String>,
    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,
    /// Maximum output tokens per image. Default: 4096.
    pub max_tokens: usize,
    /// Retries per image on API failure. Default: 3.
    pub max_retries: u32,
    /// Initial backoff in milliseconds, doubled per retry. Default: 500.
    pub retry_backoff_ms: u64,
    /// Concurrent page transcriptions for scanned PDFs. Default: 4.
    pub concurrency: usize,
    /// Longest edge of a rasterised PDF page in pixels. Default: 2000.
    pub max_rendered_pixels: u32,
}

impl Default for VisionSettings {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            temperature: 0.1,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            concurrency: 4,
            max_rendered_pixels: 2000,
        }
    }
}

/// Credentials for one bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3BucketConfig {
    pub access_key: String,
    pub secret_key: String,
    /// Custom endpoint (MinIO and other S3-compatible stores).
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// Object-storage settings: per-bucket credentials plus the output key prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Settings {
    /// Key prefix for derived outputs. Default: `output`.
    pub output_prefix: String,
    /// Credentials keyed by bucket name.
    pub buckets: HashMap<String, S3BucketConfig>,
    /// Fallback credentials for buckets not listed in `buckets`.
    pub default: Option<S3BucketConfig>,
}

impl Default for S3Settings {
    fn default() -> Self {
        Self {
            output_prefix: "output".to_string(),
            buckets: HashMap::new(),
            default: None,
        }
    }
}

impl S3Settings {
    /// Credentials for `bucket`, falling back to `default`.
    pub fn lookup(&self, bucket: &str) -> Result<&S3BucketConfig, MarkifyError> {
        self.buckets
            .get(bucket)
            .or(self.default.as_ref())
            .ok_or_else(|| MarkifyError::UnknownBucket {
                bucket: bucket.to_string(),
            })
    }
}
