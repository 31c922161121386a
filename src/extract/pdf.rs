//! PDF strategy: classify, analyse, render.
//!
//! ```text
//! parse_method ──▶ classify (auto only) ──▶ analyze ──▶ render
//!                  text layer or scan?      PdfAnalysis   markdown
//!                                                         content list
//!                                                         middle json
//! ```
//!
//! The three renderings are dumped into a [`MemoryWriter`]; only the
//! Markdown leaves this module. Images found during analysis are written
//! through the request's image writer and referenced from the Markdown as
//! `images/<name>`, which post-processing later strips.

use crate::document::{ParseMethod, IMAGE_DIR};
use crate::error::MarkifyError;
use crate::extract::{ExtractionInput, ExtractionOutcome, Extractor};
use crate::storage::{DataWriter, MemoryWriter};
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Minimum average characters per page for a text-layer PDF.
const MIN_CHARS_PER_PAGE: usize = 50;

/// Analysis mode actually applied to a PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PdfKind {
    /// Read the embedded text layer.
    Txt,
    /// Rasterise pages and transcribe them.
    Ocr,
}

/// One block on a page, in reading order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
    Image { img_path: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageLayout {
    /// 0-based page index.
    pub page_idx: usize,
    pub blocks: Vec<ContentBlock>,
}

/// Structured intermediate result of analysing a PDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PdfAnalysis {
    pub parse_type: PdfKind,
    pub pages: Vec<PageLayout>,
}

/// The PDF engine behind the strategy.
#[async_trait]
pub trait PdfAnalyzer: Send + Sync {
    /// Decide whether the document has a usable text layer.
    async fn classify(&self, path: &Path) -> Result<PdfKind, MarkifyError>;

    /// Analyse every page. Images are written to `image_writer` under
    /// [`image_name`] and referenced by `images/<name>` paths.
    async fn analyze(
        &self,
        path: &Path,
        kind: PdfKind,
        image_writer: &dyn DataWriter,
    ) -> Result<PdfAnalysis, MarkifyError>;
}

/// `page<N>_img<M>.png`, both 1-based.
pub fn image_name(page_idx: usize, image_idx: usize) -> String {
    format!("page{}_img{}.png", page_idx + 1, image_idx + 1)
}

/// Text-layer heuristic over per-page character counts.
///
/// Text-based when at least half of the pages carry text and the average is
/// at least [`MIN_CHARS_PER_PAGE`]. A document without pages counts as text.
pub fn classify_text_density(chars_per_page: &[usize]) -> PdfKind {
    if chars_per_page.is_empty() {
        return PdfKind::Txt;
    }
    let pages = chars_per_page.len();
    let with_text = chars_per_page.iter().filter(|&&c| c > 0).count();
    let avg = chars_per_page.iter().sum::<usize>() / pages;
    if with_text * 2 >= pages && avg >= MIN_CHARS_PER_PAGE {
        PdfKind::Txt
    } else {
        PdfKind::Ocr
    }
}

// ── Renderers ────────────────────────────────────────────────────────────────

pub fn render_markdown(analysis: &PdfAnalysis) -> String {
    analysis
        .pages
        .iter()
        .flat_map(|page| page.blocks.iter())
        .filter_map(|block| match block {
            ContentBlock::Text { text } => {
                let t = text.trim();
                (!t.is_empty()).then(|| t.to_string())
            }
            ContentBlock::Image { img_path } => Some(format!("![]({img_path})")),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[derive(Debug, Serialize)]
struct ContentListEntry<'a> {
    #[serde(flatten)]
    block: &'a ContentBlock,
    page_idx: usize,
}

pub fn render_content_list(analysis: &PdfAnalysis) -> Result<String, MarkifyError> {
    let entries: Vec<ContentListEntry<'_>> = analysis
        .pages
        .iter()
        .flat_map(|page| {
            page.blocks.iter().map(move |block| ContentListEntry {
                block,
                page_idx: page.page_idx,
            })
        })
        .collect();
    serde_json::to_string_pretty(&entries).map_err(|e| MarkifyError::Internal(e.to_string()))
}

pub fn render_middle_json(analysis: &PdfAnalysis) -> Result<String, MarkifyError> {
    let middle = serde_json::json!({
        "pdf_info": analysis.pages,
        "_parse_type": analysis.parse_type,
        "_version_name": env!("CARGO_PKG_VERSION"),
    });
    serde_json::to_string_pretty(&middle).map_err(|e| MarkifyError::Internal(e.to_string()))
}

// ── Strategy ─────────────────────────────────────────────────────────────────

pub struct PdfExtractor {
    analyzer: Arc<dyn PdfAnalyzer>,
}

impl PdfExtractor {
    pub fn new(analyzer: Arc<dyn PdfAnalyzer>) -> Self {
        Self { analyzer }
    }

    async fn run(&self, input: &ExtractionInput) -> Result<String, MarkifyError> {
        let path = input.staged_path.as_path();
        let kind = match input.parse_method {
            ParseMethod::Txt => PdfKind::Txt,
            ParseMethod::Ocr => PdfKind::Ocr,
            ParseMethod::Auto => {
                let kind = self.analyzer.classify(path).await?;
                info!("Classified {} as {:?}", input.base_name, kind);
                kind
            }
        };

        let analysis = self
            .analyzer
            .analyze(path, kind, input.image_writer.as_ref())
            .await?;
        debug!(
            "Analysed {}: {} pages ({:?})",
            input.base_name,
            analysis.pages.len(),
            analysis.parse_type
        );

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| input.base_name.clone());
        let md_name = format!("{stem}.md");

        let dump = MemoryWriter::new();
        dump.write_string(&md_name, &render_markdown(&analysis)).await?;
        dump.write_string(
            &format!("{stem}_content_list.json"),
            &render_content_list(&analysis)?,
        )
        .await?;
        dump.write_string(&format!("{stem}_middle.json"), &render_middle_json(&analysis)?)
            .await?;

        dump.value(&md_name)
            .ok_or_else(|| MarkifyError::Internal(format!("{md_name} missing from dump")))
    }
}

#[async_trait]
impl Extractor for PdfExtractor {
    fn name(&self) -> &'static str {
        "pdf"
    }

    async fn extract(&self, input: &ExtractionInput) -> ExtractionOutcome {
        ExtractionOutcome::from_result(&input.base_name, self.run(input).await)
    }
}

/// `images/<name>` as referenced from the Markdown.
pub(crate) fn image_ref(name: &str) -> String {
    format!("{IMAGE_DIR}/{name}")
}
