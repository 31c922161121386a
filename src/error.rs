//! Error types for the markify service.
//!
//! Every failure in the document pipeline is a [`MarkifyError`]. The variants
//! fall into five groups that decide how a failure is reported:
//!
//! * **Input shape**: the request did not carry exactly one document source
//!   or named an unknown parse mode.
//! * **Unsupported format**: the file extension is not in the allow-list.
//! * **Validation**: the staged file is too large, has too many pages, or its
//!   extracted text is outside the configured context bounds.
//! * **Extraction**: a converter failed or produced nothing. Strategy-level
//!   variants (`FileNotFound`, `CorruptPdf`, ...) are folded into
//!   [`MarkifyError::ExtractionFailed`] at the adapter boundary.
//! * **Internal**: I/O, storage and configuration faults.
//!
//! The first four groups are caused by the client and map to code `400`;
//! the last one maps to `500` (see [`MarkifyError::status_code`]).

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the markify library.
#[derive(Debug, Error)]
pub enum MarkifyError {
    // ── Input shape ──────────────────────────────────────────────────────
    /// The request carried both or neither of `file_bytes` / `file_path`,
    /// or an upload without a usable file name.
    #[error("{0}")]
    InvalidInput(String),

    /// `parse_method` was not one of `auto`, `ocr`, `txt`.
    #[error("Unknown parse method '{value}': expected auto, ocr or txt")]
    InvalidParseMethod { value: String },

    // ── Format ───────────────────────────────────────────────────────────
    /// The extension is not in the supported set.
    #[error("Format not supported: {file_name}")]
    UnsupportedFormat { file_name: String },

    // ── Validation ───────────────────────────────────────────────────────
    /// Size, page count or context length exceeded the configured limits.
    #[error("File verification failed: {file_name} ({reason})")]
    ValidationFailed { file_name: String, reason: String },

    // ── Extraction ───────────────────────────────────────────────────────
    /// The selected strategy did not produce Markdown.
    #[error("Error processed {file_name}: {reason}")]
    ExtractionFailed { file_name: String, reason: String },

    /// An expected input or intermediate file is absent.
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// A format converter could not read the document.
    #[error("Cannot convert {format} document: {detail}")]
    ConversionFailed { format: String, detail: String },

    /// pdfium rejected the document.
    #[error("PDF is corrupt or unreadable: {detail}")]
    CorruptPdf { detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    /// The vision provider used for OCR is not initialised (missing API key etc.).
    #[error("Vision provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The vision API kept failing after all retries.
    #[error("Vision API error: {message}")]
    LlmApiError { message: String },

    // ── Internal ─────────────────────────────────────────────────────────
    /// Filesystem operation failed.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Object-storage request failed.
    #[error("S3 error for bucket '{bucket}': {detail}")]
    S3 { bucket: String, detail: String },

    /// An `s3://` path without a bucket or key.
    #[error("Invalid S3 path '{path}': expected s3://bucket/key")]
    InvalidS3Path { path: String },

    /// No credentials are configured for the bucket.
    #[error("No S3 credentials configured for bucket '{bucket}'")]
    UnknownBucket { bucket: String },

    /// Builder or config-file validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MarkifyError {
    /// Envelope code for this error: `400` for client-caused failures, `500` otherwise.
    pub fn status_code(&self) -> u16 {
        if self.is_client_error() {
            400
        } else {
            500
        }
    }

    /// True for input-shape, format, validation and extraction failures.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            MarkifyError::InvalidInput(_)
                | MarkifyError::InvalidParseMethod { .. }
                | MarkifyError::UnsupportedFormat { .. }
                | MarkifyError::ValidationFailed { .. }
                | MarkifyError::ExtractionFailed { .. }
                | MarkifyError::FileNotFound { .. }
                | MarkifyError::ConversionFailed { .. }
                | MarkifyError::CorruptPdf { .. }
        )
    }

    /// Wrap an `io::Error` with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MarkifyError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias used across the crate.
pub type Result<T, E = MarkifyError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_names_file() {
        let e = MarkifyError::UnsupportedFormat {
            file_name: "notes.rtf".into(),
        };
        assert_eq!(e.to_string(), "Format not supported: notes.rtf");
        assert_eq!(e.status_code(), 400);
    }

    #[test]
    fn validation_failure_is_client_error() {
        let e = MarkifyError::ValidationFailed {
            file_name: "huge.pdf".into(),
            reason: "size 80.00 MB exceeds limit 50 MB".into(),
        };
        assert!(e.to_string().contains("huge.pdf"));
        assert!(e.to_string().contains("size"));
        assert_eq!(e.status_code(), 400);
    }

    #[test]
    fn file_not_found_display() {
        let e = MarkifyError::FileNotFound {
            path: PathBuf::from("/tmp/out/scan/scan.txt"),
        };
        assert_eq!(e.to_string(), "File not found: /tmp/out/scan/scan.txt");
    }

    #[test]
    fn internal_errors_map_to_500() {
        let io = MarkifyError::io(
            "/nope",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(io.status_code(), 500);
        assert_eq!(
            MarkifyError::UnknownBucket {
                bucket: "b".into()
            }
            .status_code(),
            500
        );
        assert_eq!(MarkifyError::Internal("boom".into()).status_code(), 500);
    }
}
