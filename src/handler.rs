//! Request handler: runs one document through the pipeline and always
//! answers with a [`ResponseEnvelope`].
//!
//! ```text
//! Received ──▶ Routed ──▶ Staged ──▶ Validated ──▶ Extracted ──▶ Responded
//!    │           │          │            │             │
//!    └───────────┴──────────┴────────────┴─────────────┴──▶ Rejected
//! ```
//!
//! The extension is checked before anything touches disk; size and page
//! limits need the staged copy, so they run after staging. Every error on the
//! way is caught in [`DocParser::parse`] and turned into an envelope.

use crate::config::{S3Settings, ServiceConfig, ValidationLimits};
use crate::document::{markdown_name, ParseRequest, StagedArtifact};
use crate::error::MarkifyError;
use crate::extract::pdfium::PdfiumPageCounter;
use crate::extract::{ExtractionInput, ExtractorRegistry};
use crate::pipeline::postprocess::clean_markdown;
use crate::pipeline::retention::RetentionSweeper;
use crate::pipeline::route;
use crate::pipeline::validate::{FileVerifier, PageCounter};
use crate::response::ResponseEnvelope;
use crate::storage::init_writers;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Pipeline position of a request, for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Routed,
    Staged,
    Validated,
    Extracted,
    Responded,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Received => "received",
            Stage::Routed => "routed",
            Stage::Staged => "staged",
            Stage::Validated => "validated",
            Stage::Extracted => "extracted",
            Stage::Responded => "responded",
        };
        f.write_str(s)
    }
}

/// The document-intake pipeline, constructed once and shared by requests.
pub struct DocParser {
    output_root: PathBuf,
    verifier: FileVerifier,
    registry: ExtractorRegistry,
    sweeper: Arc<RetentionSweeper>,
    s3: S3Settings,
}

impl DocParser {
    /// Assemble a parser from explicit collaborators.
    pub fn new(
        config: &ServiceConfig,
        pages: Arc<dyn PageCounter>,
        registry: ExtractorRegistry,
    ) -> Self {
        Self {
            output_root: config.output_root.clone(),
            verifier: FileVerifier::new(config.limits.clone(), pages),
            registry,
            sweeper: Arc::new(RetentionSweeper::from_settings(&config.retention)),
            s3: config.s3.clone(),
        }
    }

    /// Production wiring: pdfium page counter and the standard strategies.
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            config,
            Arc::new(PdfiumPageCounter::new(config.pdfium_lib_path.clone())),
            ExtractorRegistry::standard(config),
        )
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    fn limits(&self) -> &ValidationLimits {
        self.verifier.limits()
    }

    /// Parse one document. Never fails: every outcome is an envelope.
    pub async fn parse(&self, request: ParseRequest) -> ResponseEnvelope {
        let start = Instant::now();
        let mut stage = Stage::Received;

        match self.run(request, &mut stage).await {
            Ok((base_name, markdown)) => {
                info!(
                    "Successfully processed {} ({} chars, {:?})",
                    base_name,
                    markdown.len(),
                    start.elapsed()
                );
                ResponseEnvelope::success(format!("Successfully processed {base_name}"), markdown)
            }
            Err(e) if e.is_client_error() => {
                warn!("Rejected after {}: {}", stage, e);
                ResponseEnvelope::from_error(&e)
            }
            Err(e) => {
                error!("Failed after {}: {:?}", stage, e);
                ResponseEnvelope::from_error(&e)
            }
        }
    }

    async fn run(
        &self,
        request: ParseRequest,
        stage: &mut Stage,
    ) -> Result<(String, String), MarkifyError> {
        let doc = request.into_document()?;
        debug!("{} {:?}: {}", stage, doc.source, doc.base_name);

        let route = route::route(&doc.base_name, &doc.extension)?;
        *stage = Stage::Routed;

        let layout = StagedArtifact::new(&self.output_root, &doc);
        let writers = init_writers(&doc.source, &layout, doc.stem(), &self.s3).await?;
        writers.persist_original(&doc.base_name).await?;
        *stage = Stage::Staged;
        debug!("{} {} at {}", stage, doc.base_name, layout.original_file.display());

        let verifier = self.verifier.clone();
        let staged = layout.original_file.clone();
        let checked = tokio::task::spawn_blocking(move || verifier.verify(&staged))
            .await
            .map_err(|e| MarkifyError::Internal(format!("Validation task panicked: {e}")))??;
        if !checked.overall_ok() {
            return Err(MarkifyError::ValidationFailed {
                file_name: doc.base_name.clone(),
                reason: self.verifier.describe_failure(&checked),
            });
        }
        *stage = Stage::Validated;

        let extractor = self.registry.get(route).ok_or_else(|| {
            MarkifyError::Internal(format!("no extractor registered for {route:?}"))
        })?;
        let input = ExtractionInput {
            base_name: doc.base_name.clone(),
            staged_path: layout.original_file.clone(),
            extension: doc.extension.clone(),
            parse_method: doc.parse_method,
            image_writer: Arc::clone(&writers.image_writer),
        };
        let outcome = extractor.extract(&input).await;
        let reason = outcome.failure().unwrap_or("no output").to_string();
        let raw = outcome.into_markdown().ok_or_else(|| MarkifyError::ExtractionFailed {
            file_name: doc.base_name.clone(),
            reason,
        })?;
        *stage = Stage::Extracted;
        debug!("{} {} via {}", stage, doc.base_name, extractor.name());

        let markdown = clean_markdown(&raw);
        if markdown.is_empty() {
            return Err(MarkifyError::ExtractionFailed {
                file_name: doc.base_name.clone(),
                reason: "no text could be extracted".to_string(),
            });
        }
        if self.limits().enforce_ctx_limits && !self.verifier.tokens_ok(&markdown) {
            return Err(MarkifyError::ValidationFailed {
                file_name: doc.base_name.clone(),
                reason: format!(
                    "{} characters outside {}..={}",
                    markdown.chars().count(),
                    self.limits().min_ctx,
                    self.limits().max_ctx
                ),
            });
        }

        writers
            .writer
            .write_string(&markdown_name(&doc.base_name), &markdown)
            .await?;
        *stage = Stage::Responded;

        // Swept only once this document's own outputs are complete.
        self.sweeper.trigger(layout.output_dir);

        Ok((doc.base_name, markdown))
    }
}
