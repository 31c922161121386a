//! # markify
//!
//! Document-intake service: upload a PDF, Office file, spreadsheet, e-book,
//! image or text file and get Markdown back.
//!
//! ## Pipeline Overview
//!
//! ```text
//! POST /knowledge_base/doc_parse
//!  │
//!  ├─ 1. Route     extension allow-list → PDF or generic strategy
//!  ├─ 2. Stage     copy the original under <output_root>/<stem>/ (or S3)
//!  ├─ 3. Validate  size and page-count limits
//!  ├─ 4. Extract   pdfium text layer / vision OCR / Office+markup converters
//!  ├─ 5. Clean     strip image references, trim
//!  └─ 6. Respond   {code, msg, data} envelope, Markdown persisted next to the original
//! ```
//!
//! Finished requests trigger a coalesced sweep of staged outputs older than
//! the retention window.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use markify::{DocParser, ParseRequest, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::builder().output_root("output").build()?;
//!     let parser = DocParser::from_config(&config);
//!     let request = ParseRequest {
//!         file_path: Some("docs/report.pdf".into()),
//!         ..Default::default()
//!     };
//!     let envelope = parser.parse(request).await;
//!     println!("{} {}", envelope.code(), envelope.msg());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `markify-server` binary (clap + anyhow) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod handler;
pub mod logging;
pub mod npy_store;
pub mod pipeline;
pub mod prompts;
pub mod response;
pub mod server;
pub mod storage;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ServiceConfig, ServiceConfigBuilder, ValidationLimits, VisionSettings};
pub use document::{ParseMethod, ParseRequest, Upload};
pub use error::MarkifyError;
pub use extract::{ExtractionOutcome, Extractor, ExtractorRegistry};
pub use handler::DocParser;
pub use response::ResponseEnvelope;
pub use server::{build_router, start_server, AppState};
