//! Validation gate: size and page-count limits on the staged upload.
//!
//! The gate runs on the copy already written to the staging directory, not
//! on the request bytes, because counting PDF pages needs a file handle.
//! Page counting is behind [`PageCounter`] so the gate does not care which
//! PDF engine is linked in.

use crate::config::ValidationLimits;
use crate::error::MarkifyError;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Counts the pages of a PDF file.
pub trait PageCounter: Send + Sync {
    fn count_pages(&self, path: &Path) -> Result<usize, MarkifyError>;
}

/// Outcome of [`FileVerifier::verify`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationResult {
    pub size_ok: bool,
    pub page_count_ok: bool,
    /// Size in MB rounded to 2 decimals.
    pub size_mb: f64,
    /// Page count; 0 for non-PDF files.
    pub page_count: usize,
}

impl ValidationResult {
    pub fn overall_ok(&self) -> bool {
        self.size_ok && self.page_count_ok
    }
}

/// Applies [`ValidationLimits`] to a staged file.
#[derive(Clone)]
pub struct FileVerifier {
    limits: ValidationLimits,
    pages: Arc<dyn PageCounter>,
}

impl FileVerifier {
    pub fn new(limits: ValidationLimits, pages: Arc<dyn PageCounter>) -> Self {
        Self { limits, pages }
    }

    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    /// File size in MB, rounded to 2 decimals.
    pub fn size_mb(&self, path: &Path) -> Result<f64, MarkifyError> {
        let bytes = std::fs::metadata(path)
            .map_err(|e| MarkifyError::io(path, e))?
            .len();
        Ok(round2(bytes as f64 / BYTES_PER_MB))
    }

    pub fn size_ok(&self, path: &Path) -> Result<bool, MarkifyError> {
        Ok(self.size_mb(path)? <= self.limits.max_size_mb)
    }

    /// Page count for `.pdf` files; every other file counts as 0 pages.
    pub fn page_count(&self, path: &Path) -> Result<usize, MarkifyError> {
        if is_pdf(path) {
            self.pages.count_pages(path)
        } else {
            Ok(0)
        }
    }

    pub fn pages_ok(&self, path: &Path) -> Result<bool, MarkifyError> {
        Ok(self.page_count(path)? <= self.limits.max_pages)
    }

    /// Character-count bounds for extracted text.
    ///
    /// Only consulted by the handler when `enforce_ctx_limits` is set.
    pub fn tokens_ok(&self, text: &str) -> bool {
        let n = text.chars().count();
        n >= self.limits.min_ctx && n <= self.limits.max_ctx
    }

    /// Size and page checks. The context-length check is not part of this.
    pub fn verify(&self, path: &Path) -> Result<ValidationResult, MarkifyError> {
        let size_mb = self.size_mb(path)?;
        let size_ok = size_mb <= self.limits.max_size_mb;
        // An oversize file is rejected without opening it.
        let page_count = if size_ok { self.page_count(path)? } else { 0 };
        let result = ValidationResult {
            size_ok,
            page_count_ok: page_count <= self.limits.max_pages,
            size_mb,
            page_count,
        };
        debug!("Verified {}: {:?}", path.display(), result);
        Ok(result)
    }

    /// Human-readable reason for a failed [`ValidationResult`].
    pub fn describe_failure(&self, result: &ValidationResult) -> String {
        let mut reasons = Vec::new();
        if !result.size_ok {
            reasons.push(format!(
                "size {:.2} MB exceeds limit {} MB",
                result.size_mb, self.limits.max_size_mb
            ));
        }
        if !result.page_count_ok {
            reasons.push(format!(
                "{} pages exceeds limit {}",
                result.page_count, self.limits.max_pages
            ));
        }
        reasons.join("; ")
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}
