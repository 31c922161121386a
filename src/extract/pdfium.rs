//! pdfium-backed PDF engine: page counting, text/image extraction and
//! page rasterisation for OCR.
//!
//! pdfium is a C++ library with thread-local state, so every call runs in
//! `tokio::task::spawn_blocking` and binds its own `Pdfium` instance there.
//!
//! Rendered pages are capped by `max_rendered_pixels` on the longest edge,
//! independent of physical page size.

use crate::error::MarkifyError;
use crate::extract::pdf::{
    classify_text_density, image_name, image_ref, ContentBlock, PageLayout, PdfAnalysis,
    PdfAnalyzer, PdfKind,
};
use crate::extract::vision::{encode_png, VisionClient};
use crate::pipeline::validate::PageCounter;
use crate::storage::DataWriter;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[cfg(target_os = "windows")]
const PDFIUM_LIB_NAME: &str = "pdfium.dll";
#[cfg(target_os = "macos")]
const PDFIUM_LIB_NAME: &str = "libpdfium.dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const PDFIUM_LIB_NAME: &str = "libpdfium.so";

/// Bind pdfium from `lib_path` (a library file or the directory holding
/// it), or from the system library search path.
pub fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, MarkifyError> {
    let bindings = match lib_path {
        Some(p) if p.is_dir() => Pdfium::bind_to_library(p.join(PDFIUM_LIB_NAME)),
        Some(p) => Pdfium::bind_to_library(p),
        None => Pdfium::bind_to_system_library(),
    };
    bindings
        .map(Pdfium::new)
        .map_err(|e| MarkifyError::PdfiumBindingFailed(e.to_string()))
}

fn open_error(path: &Path, e: PdfiumError) -> MarkifyError {
    MarkifyError::CorruptPdf {
        detail: format!("{}: {e:?}", path.display()),
    }
}

async fn blocking<T, F>(what: &str, f: F) -> Result<T, MarkifyError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, MarkifyError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| MarkifyError::Internal(format!("{what} task panicked: {e}")))?
}

/// [`PageCounter`] reading the page tree with pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumPageCounter {
    lib_path: Option<PathBuf>,
}

impl PdfiumPageCounter {
    pub fn new(lib_path: Option<PathBuf>) -> Self {
        Self { lib_path }
    }
}

impl PageCounter for PdfiumPageCounter {
    fn count_pages(&self, path: &Path) -> Result<usize, MarkifyError> {
        let pdfium = bind_pdfium(self.lib_path.as_deref())?;
        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| open_error(path, e))?;
        let pages = document.pages().len() as usize;
        Ok(pages)
    }
}

/// Text and images of one page, gathered on the blocking pool.
struct RawPage {
    page_idx: usize,
    text: String,
    images: Vec<Vec<u8>>,
}

/// [`PdfAnalyzer`] using pdfium for the text layer and the vision model for
/// scanned pages.
pub struct PdfiumAnalyzer {
    lib_path: Option<PathBuf>,
    vision: Arc<VisionClient>,
    max_rendered_pixels: u32,
    concurrency: usize,
}

impl PdfiumAnalyzer {
    pub fn new(
        lib_path: Option<PathBuf>,
        vision: Arc<VisionClient>,
        max_rendered_pixels: u32,
        concurrency: usize,
    ) -> Self {
        Self {
            lib_path,
            vision,
            max_rendered_pixels,
            concurrency: concurrency.max(1),
        }
    }

    async fn analyze_text(
        &self,
        path: &Path,
        image_writer: &dyn DataWriter,
    ) -> Result<Vec<PageLayout>, MarkifyError> {
        let lib = self.lib_path.clone();
        let owned = path.to_path_buf();
        let raw = blocking("Text extraction", move || {
            extract_text_blocking(lib.as_deref(), &owned)
        })
        .await?;

        let mut pages = Vec::with_capacity(raw.len());
        for page in raw {
            let mut blocks = Vec::new();
            if !page.text.trim().is_empty() {
                blocks.push(ContentBlock::Text { text: page.text });
            }
            for (i, png) in page.images.iter().enumerate() {
                let name = image_name(page.page_idx, i);
                image_writer.write(&name, png).await?;
                blocks.push(ContentBlock::Image {
                    img_path: image_ref(&name),
                });
            }
            pages.push(PageLayout {
                page_idx: page.page_idx,
                blocks,
            });
        }
        Ok(pages)
    }

    async fn analyze_ocr(&self, path: &Path) -> Result<Vec<PageLayout>, MarkifyError> {
        let lib = self.lib_path.clone();
        let owned = path.to_path_buf();
        let max_pixels = self.max_rendered_pixels;
        let rendered = blocking("Render", move || {
            render_pages_blocking(lib.as_deref(), &owned, max_pixels)
        })
        .await?;
        info!("Rendered {} pages of {}", rendered.len(), path.display());

        let total = rendered.len();
        let mut results: Vec<(usize, Result<String, MarkifyError>)> =
            stream::iter(rendered.into_iter().map(|(idx, img)| {
                let vision = Arc::clone(&self.vision);
                async move {
                    let result = match encode_png(&img) {
                        Ok(data) => vision.transcribe_page(idx + 1, data).await,
                        Err(e) => Err(MarkifyError::Internal(format!(
                            "Page {}: image encoding failed: {e}",
                            idx + 1
                        ))),
                    };
                    (idx, result)
                }
            }))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        results.sort_by_key(|(idx, _)| *idx);

        let mut pages = Vec::with_capacity(total);
        let mut last_err = None;
        for (idx, result) in results {
            match result {
                Ok(markdown) => pages.push(PageLayout {
                    page_idx: idx,
                    blocks: vec![ContentBlock::Text { text: markdown }],
                }),
                Err(e) => {
                    warn!("Page {} skipped: {}", idx + 1, e);
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) if pages.is_empty() => Err(e),
            _ => Ok(pages),
        }
    }
}

#[async_trait]
impl PdfAnalyzer for PdfiumAnalyzer {
    async fn classify(&self, path: &Path) -> Result<PdfKind, MarkifyError> {
        let lib = self.lib_path.clone();
        let owned = path.to_path_buf();
        let counts = blocking("Classification", move || {
            let pdfium = bind_pdfium(lib.as_deref())?;
            let document = pdfium
                .load_pdf_from_file(&owned, None)
                .map_err(|e| open_error(&owned, e))?;
            let counts: Vec<usize> = document
                .pages()
                .iter()
                .map(|page| {
                    page.text()
                        .map(|t| t.all().trim().chars().count())
                        .unwrap_or(0)
                })
                .collect();
            Ok(counts)
        })
        .await?;
        debug!("Text layer chars per page: {:?}", counts);
        Ok(classify_text_density(&counts))
    }

    async fn analyze(
        &self,
        path: &Path,
        kind: PdfKind,
        image_writer: &dyn DataWriter,
    ) -> Result<PdfAnalysis, MarkifyError> {
        let pages = match kind {
            PdfKind::Txt => self.analyze_text(path, image_writer).await?,
            PdfKind::Ocr => self.analyze_ocr(path).await?,
        };
        Ok(PdfAnalysis {
            parse_type: kind,
            pages,
        })
    }
}

fn png_bytes(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

fn extract_text_blocking(lib: Option<&Path>, path: &Path) -> Result<Vec<RawPage>, MarkifyError> {
    let pdfium = bind_pdfium(lib)?;
    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| open_error(path, e))?;

    let mut pages = Vec::new();
    for (page_idx, page) in document.pages().iter().enumerate() {
        let text = page.text().map(|t| t.all()).unwrap_or_default();

        let mut images = Vec::new();
        for object in page.objects().iter() {
            let Some(image_object) = object.as_image_object() else {
                continue;
            };
            match image_object.get_raw_image() {
                Ok(img) => match png_bytes(&img) {
                    Ok(png) => images.push(png),
                    Err(e) => warn!("Page {}: image encoding failed: {}", page_idx + 1, e),
                },
                Err(e) => warn!("Page {}: unreadable image object: {:?}", page_idx + 1, e),
            }
        }

        pages.push(RawPage {
            page_idx,
            text,
            images,
        });
    }
    Ok(pages)
}

fn render_pages_blocking(
    lib: Option<&Path>,
    path: &Path,
    max_pixels: u32,
) -> Result<Vec<(usize, DynamicImage)>, MarkifyError> {
    let pdfium = bind_pdfium(lib)?;
    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| open_error(path, e))?;

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::new();
    for (idx, page) in document.pages().iter().enumerate() {
        match page.render_with_config(&render_config) {
            Ok(bitmap) => {
                let image = bitmap.as_image();
                debug!(
                    "Rendered page {} → {}x{} px",
                    idx + 1,
                    image.width(),
                    image.height()
                );
                results.push((idx, image));
            }
            Err(e) => warn!("Page {}: rasterisation failed: {:?}", idx + 1, e),
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_a_missing_library_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let err = bind_pdfium(Some(&dir.path().join("libpdfium-missing.so")))
            .err()
            .unwrap();
        assert!(matches!(err, MarkifyError::PdfiumBindingFailed(_)));
        assert!(err.to_string().contains("PDFIUM_LIB_PATH"));
    }

    #[test]
    fn library_directory_resolves_platform_name() {
        let dir = tempfile::tempdir().unwrap();
        // Empty directory: the platform library name is looked up inside it.
        let err = PdfiumPageCounter::new(Some(dir.path().to_path_buf()))
            .count_pages(Path::new("whatever.pdf"))
            .unwrap_err();
        assert!(matches!(err, MarkifyError::PdfiumBindingFailed(_)));
    }

    #[test]
    fn png_encoding_of_extracted_images() {
        let img = DynamicImage::new_rgb8(4, 3);
        let png = png_bytes(&img).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
