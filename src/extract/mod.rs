//! Extraction strategies: staged document in, Markdown out.
//!
//! Each strategy implements [`Extractor`] and is registered in an
//! [`ExtractorRegistry`] under the [`Route`] it serves. The handler never
//! branches on formats itself; adding a format family means registering one
//! more implementation.
//!
//! Strategies never fail past their boundary: internal errors are logged and
//! folded into an [`ExtractionOutcome`] with `markdown == None`.

pub mod generic;
pub mod markup;
pub mod pdf;
pub mod pdfium;
pub mod vision;

use crate::config::ServiceConfig;
use crate::document::ParseMethod;
use crate::error::MarkifyError;
use crate::pipeline::route::Route;
use crate::storage::DataWriter;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;

/// Everything a strategy may read or write for one document.
#[derive(Clone)]
pub struct ExtractionInput {
    /// Original file name, for log lines.
    pub base_name: String,
    /// Local staged copy of the document.
    pub staged_path: PathBuf,
    /// Lowercased extension with dot.
    pub extension: String,
    pub parse_method: ParseMethod,
    /// Destination for images extracted from the document.
    pub image_writer: Arc<dyn DataWriter>,
}

/// Result of one extraction. Never carries partial output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionOutcome {
    markdown: Option<String>,
    failure: Option<String>,
}

impl ExtractionOutcome {
    pub fn success(markdown: String) -> Self {
        Self {
            markdown: Some(markdown),
            failure: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            markdown: None,
            failure: Some(reason.into()),
        }
    }

    /// Fold a strategy result into an outcome, logging the error.
    pub fn from_result(base_name: &str, result: Result<String, MarkifyError>) -> Self {
        match result {
            Ok(markdown) => Self::success(markdown),
            Err(e) => {
                error!("Extraction of {} failed: {}", base_name, e);
                Self::failed(e.to_string())
            }
        }
    }

    pub fn succeeded(&self) -> bool {
        self.markdown.is_some()
    }

    pub fn markdown(&self) -> Option<&str> {
        self.markdown.as_deref()
    }

    /// Why extraction failed, if it did.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn into_markdown(self) -> Option<String> {
        self.markdown
    }
}

/// One extraction strategy.
#[async_trait]
pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn extract(&self, input: &ExtractionInput) -> ExtractionOutcome;
}

/// Routing table from [`Route`] to strategy.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    strategies: HashMap<Route, Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, route: Route, extractor: Arc<dyn Extractor>) -> Self {
        self.strategies.insert(route, extractor);
        self
    }

    pub fn get(&self, route: Route) -> Option<Arc<dyn Extractor>> {
        self.strategies.get(&route).cloned()
    }

    /// The production strategies: pdfium for PDFs, markup converters plus
    /// vision OCR for the rest.
    pub fn standard(config: &ServiceConfig) -> Self {
        let vision = Arc::new(vision::VisionClient::new(config.vision.clone()));
        let analyzer = pdfium::PdfiumAnalyzer::new(
            config.pdfium_lib_path.clone(),
            vision.clone(),
            config.vision.max_rendered_pixels,
            config.vision.concurrency,
        );
        let ocr = vision::VisionOcr::new(vision);

        Self::new()
            .register(Route::Pdf, Arc::new(pdf::PdfExtractor::new(Arc::new(analyzer))))
            .register(
                Route::Generic,
                Arc::new(generic::GenericExtractor::new(
                    Arc::new(markup::MarkupConverter),
                    Arc::new(ocr),
                )),
            )
    }
}
