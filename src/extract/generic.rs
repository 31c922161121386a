//! Generic strategy: every supported format except PDF.
//!
//! Two formats get a pre-step before the document converter runs:
//!
//! * `.csv` is re-encoded to a tab-separated `<base>.tsv` sidecar
//!   (`sales.csv` → `sales.csv.tsv`).
//! * images are OCR'd; recognised lines go to a `<base>.txt` sidecar
//!   (`scan.png` → `scan.png.txt`), which is only written when there is at
//!   least one line. A sidecar left by an earlier run is removed first.
//!
//! Sidecars keep the full file name so they never collide with another
//! upload staged in the same directory, such as `scan.txt` next to `scan.png`.
//!
//! The converter then runs on the sidecar, or on the staged file itself. A
//! missing sidecar fails the extraction with `File not found`.

use crate::error::MarkifyError;
use crate::extract::{ExtractionInput, ExtractionOutcome, Extractor};
use crate::pipeline::route::is_image;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error};

/// Reads a local file and renders it as Markdown.
///
/// Implementations are synchronous; callers run them on the blocking pool.
pub trait DocumentConverter: Send + Sync {
    fn convert(&self, path: &Path) -> Result<String, MarkifyError>;
}

/// Recognises text lines in an image file.
#[async_trait]
pub trait ImageOcr: Send + Sync {
    async fn recognize(&self, path: &Path) -> Result<Vec<String>, MarkifyError>;
}

pub struct GenericExtractor {
    converter: Arc<dyn DocumentConverter>,
    ocr: Arc<dyn ImageOcr>,
}

impl GenericExtractor {
    pub fn new(converter: Arc<dyn DocumentConverter>, ocr: Arc<dyn ImageOcr>) -> Self {
        Self { converter, ocr }
    }

    async fn run(&self, input: &ExtractionInput) -> Result<String, MarkifyError> {
        let target = match input.extension.as_str() {
            ".csv" => reencode_csv(&input.staged_path).await?,
            ext if is_image(ext) => self.ocr_sidecar(&input.staged_path).await?,
            _ => input.staged_path.clone(),
        };

        if !tokio::fs::try_exists(&target).await.unwrap_or(false) {
            error!("File not found: {}", target.display());
            return Err(MarkifyError::FileNotFound { path: target });
        }

        let converter = Arc::clone(&self.converter);
        tokio::task::spawn_blocking(move || converter.convert(&target))
            .await
            .map_err(|e| MarkifyError::Internal(format!("Converter task panicked: {e}")))?
    }

    /// OCR the image and write the recognised lines next to it.
    ///
    /// Returns the sidecar path whether or not it was written.
    async fn ocr_sidecar(&self, image: &Path) -> Result<PathBuf, MarkifyError> {
        let sidecar = sidecar_path(image, "txt");
        match tokio::fs::remove_file(&sidecar).await {
            Ok(()) => debug!("Removed stale sidecar {}", sidecar.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(MarkifyError::io(&sidecar, e)),
        }
        let lines = self.ocr.recognize(image).await?;
        debug!("OCR of {}: {} lines", image.display(), lines.len());
        if !lines.is_empty() {
            tokio::fs::write(&sidecar, lines.join("\n"))
                .await
                .map_err(|e| MarkifyError::io(&sidecar, e))?;
        }
        Ok(sidecar)
    }
}

#[async_trait]
impl Extractor for GenericExtractor {
    fn name(&self) -> &'static str {
        "generic"
    }

    async fn extract(&self, input: &ExtractionInput) -> ExtractionOutcome {
        ExtractionOutcome::from_result(&input.base_name, self.run(input).await)
    }
}

/// `dir/scan.png` + `txt` → `dir/scan.png.txt`.
pub fn sidecar_path(staged: &Path, extension: &str) -> PathBuf {
    let mut name = staged.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(extension);
    staged.with_file_name(name)
}

/// Re-encode a CSV file as `<base>.tsv` next to it.
async fn reencode_csv(csv_path: &Path) -> Result<PathBuf, MarkifyError> {
    let src = csv_path.to_path_buf();
    let dst = sidecar_path(csv_path, "tsv");
    let out = dst.clone();
    tokio::task::spawn_blocking(move || csv_to_tsv(&src, &out))
        .await
        .map_err(|e| MarkifyError::Internal(format!("CSV task panicked: {e}")))??;
    Ok(dst)
}

fn csv_to_tsv(src: &Path, dst: &Path) -> Result<(), MarkifyError> {
    let csv_err = |e: csv::Error| MarkifyError::ConversionFailed {
        format: "csv".to_string(),
        detail: e.to_string(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(src)
        .map_err(csv_err)?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_path(dst)
        .map_err(csv_err)?;

    for record in reader.records() {
        writer.write_record(&record.map_err(csv_err)?).map_err(csv_err)?;
    }
    writer.flush().map_err(|e| MarkifyError::io(dst, e))
}
