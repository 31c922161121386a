//! Vision-model OCR: image → base64 PNG → VLM → text.
//!
//! The vision model is the service's OCR engine for scanned PDF pages and
//! image uploads. The provider is resolved on first use, so the server starts
//! (and serves text formats) without any API key in the environment.
//!
//! ## Retry Strategy
//!
//! Rate-limit and overload errors are transient under concurrent load.
//! Retries back off exponentially (`retry_backoff_ms * 2^(attempt-1)`): with
//! the defaults that is 500 ms → 1 s → 2 s per image.

use crate::config::VisionSettings;
use crate::error::MarkifyError;
use crate::extract::generic::ImageOcr;
use crate::prompts::{IMAGE_OCR_PROMPT, PDF_PAGE_PROMPT};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use image::DynamicImage;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Encode an image as a base64 PNG attachment for the VLM.
///
/// PNG keeps glyph edges intact; `detail: "high"` lets tiling models see
/// fine print.
pub fn encode_png(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

/// Lazily-resolved vision provider plus call settings.
pub struct VisionClient {
    settings: VisionSettings,
    provider: OnceCell<Arc<dyn LLMProvider>>,
}

impl VisionClient {
    pub fn new(settings: VisionSettings) -> Self {
        Self {
            settings,
            provider: OnceCell::new(),
        }
    }

    /// Use a pre-built provider instead of resolving one from the environment.
    pub fn with_provider(settings: VisionSettings, provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            settings,
            provider: OnceCell::new_with(Some(provider)),
        }
    }

    pub fn settings(&self) -> &VisionSettings {
        &self.settings
    }

    async fn provider(&self) -> Result<Arc<dyn LLMProvider>, MarkifyError> {
        self.provider
            .get_or_try_init(|| async { resolve_provider(&self.settings) })
            .await
            .cloned()
    }

    /// Transcribe one scanned PDF page to Markdown.
    pub async fn transcribe_page(
        &self,
        page_num: usize,
        image: ImageData,
    ) -> Result<String, MarkifyError> {
        self.transcribe(&format!("Page {page_num}"), PDF_PAGE_PROMPT, image)
            .await
    }

    /// Send `image` with `system_prompt`, retrying with backoff.
    pub async fn transcribe(
        &self,
        label: &str,
        system_prompt: &str,
        image: ImageData,
    ) -> Result<String, MarkifyError> {
        let provider = self.provider().await?;
        let start = Instant::now();

        // The image carries the content; the user turn text stays empty.
        let messages = vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user_with_images("", vec![image]),
        ];
        let options = build_options(&self.settings);

        let mut last_err: Option<String> = None;
        for attempt in 0..=self.settings.max_retries {
            if attempt > 0 {
                let backoff = backoff_ms(&self.settings, attempt);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    label, attempt, self.settings.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match provider.chat(&messages, Some(&options)).await {
                Ok(response) => {
                    debug!(
                        "{}: {} input tokens, {} output tokens, {:?}",
                        label,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(response.content);
                }
                Err(e) => {
                    warn!("{}: attempt {} failed: {}", label, attempt + 1, e);
                    last_err = Some(e.to_string());
                }
            }
        }

        Err(MarkifyError::LlmApiError {
            message: format!(
                "{label}: {} retries exhausted: {}",
                self.settings.max_retries,
                last_err.unwrap_or_else(|| "unknown error".to_string())
            ),
        })
    }
}

fn build_options(settings: &VisionSettings) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(settings.temperature),
        max_tokens: Some(settings.max_tokens),
        ..Default::default()
    }
}

fn backoff_ms(settings: &VisionSettings, attempt: u32) -> u64 {
    settings.retry_backoff_ms * 2u64.pow(attempt.saturating_sub(1))
}

fn create_vision_provider(name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, MarkifyError> {
    ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        MarkifyError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the provider, most specific setting first:
///
/// 1. `vision.provider` (+ `vision.model`) from the service config
/// 2. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` from the environment
/// 3. OpenAI when `OPENAI_API_KEY` is set
/// 4. whatever [`ProviderFactory::from_env`] detects
fn resolve_provider(settings: &VisionSettings) -> Result<Arc<dyn LLMProvider>, MarkifyError> {
    let model = settings.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(name) = &settings.provider {
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_vision_provider(&prov, &env_model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_vision_provider("openai", model);
    }

    let (llm, _embedding) =
        ProviderFactory::from_env().map_err(|e| MarkifyError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure [vision] provider.\n\
                Error: {e}"
            ),
        })?;
    Ok(llm)
}

/// [`ImageOcr`] backed by the vision model.
pub struct VisionOcr {
    client: Arc<VisionClient>,
}

impl VisionOcr {
    pub fn new(client: Arc<VisionClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageOcr for VisionOcr {
    async fn recognize(&self, path: &Path) -> Result<Vec<String>, MarkifyError> {
        let owned = path.to_path_buf();
        let data = tokio::task::spawn_blocking(move || {
            let img = image::open(&owned).map_err(|e| MarkifyError::ConversionFailed {
                format: "image".to_string(),
                detail: format!("{}: {e}", owned.display()),
            })?;
            encode_png(&img).map_err(|e| MarkifyError::ConversionFailed {
                format: "image".to_string(),
                detail: e.to_string(),
            })
        })
        .await
        .map_err(|e| MarkifyError::Internal(format!("Image decode task panicked: {e}")))??;

        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let text = self.client.transcribe(&label, IMAGE_OCR_PROMPT, data).await?;
        Ok(text_lines(&text))
    }
}

/// Non-blank lines of a transcription, trimmed.
fn text_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
