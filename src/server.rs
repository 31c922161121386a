//! HTTP surface: one parse endpoint plus a health probe.
//!
//! The parse endpoint always answers HTTP 200; the outcome is carried in the
//! [`ResponseEnvelope`] body.

use crate::config::ServiceConfig;
use crate::document::{ParseMethod, ParseRequest, Upload};
use crate::error::MarkifyError;
use crate::handler::DocParser;
use crate::response::ResponseEnvelope;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub const DOC_PARSE_ROUTE: &str = "/knowledge_base/doc_parse";

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub parser: Arc<DocParser>,
    /// Bounds the number of documents processed at once.
    pub permits: Arc<Semaphore>,
}

impl AppState {
    pub fn new(parser: DocParser, workers: usize) -> Self {
        Self {
            parser: Arc::new(parser),
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }
}

/// Build the router. `body_limit` is in bytes.
pub fn build_router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(DOC_PARSE_ROUTE, post(doc_parse))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

async fn doc_parse(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Json<ResponseEnvelope> {
    let request = match multipart {
        Ok(m) => read_form(m).await,
        Err(rejection) => Err(MarkifyError::InvalidInput(rejection.body_text())),
    };
    let request = match request {
        Ok(r) => r,
        Err(e) => {
            warn!("Malformed request: {}", e);
            return Json(ResponseEnvelope::from_error(&e));
        }
    };

    let _permit = match state.permits.acquire().await {
        Ok(p) => p,
        Err(_) => {
            let e = MarkifyError::Internal("worker pool closed".to_string());
            return Json(ResponseEnvelope::from_error(&e));
        }
    };
    Json(state.parser.parse(request).await)
}

/// Collect `file_bytes`, `file_path` and `parse_method` from the form.
/// Unknown fields are ignored.
async fn read_form(mut multipart: Multipart) -> Result<ParseRequest, MarkifyError> {
    let bad_form = |e: axum::extract::multipart::MultipartError| {
        MarkifyError::InvalidInput(format!("Malformed multipart body: {e}"))
    };

    let mut request = ParseRequest::default();
    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file_bytes" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(bad_form)?;
                request.file_bytes = Some(Upload {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            "file_path" => {
                let path = field.text().await.map_err(bad_form)?;
                let path = path.trim();
                if !path.is_empty() {
                    request.file_path = Some(path.to_string());
                }
            }
            "parse_method" => {
                let value = field.text().await.map_err(bad_form)?;
                if !value.trim().is_empty() {
                    request.parse_method = value.parse::<ParseMethod>()?;
                }
            }
            _ => {}
        }
    }
    Ok(request)
}

/// Serve `router` on an already-bound listener until Ctrl-C.
pub async fn serve(listener: TcpListener, router: Router) -> std::io::Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
    }
}

/// Build the production parser, bind `host:port` and serve.
pub async fn start_server(config: &ServiceConfig) -> Result<(), MarkifyError> {
    let addr = config.bind_addr();
    let state = AppState::new(DocParser::from_config(config), config.workers);
    let router = build_router(state, config.body_limit_bytes());

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| MarkifyError::io(&addr, e))?;
    info!(
        "Listening on {} ({} workers, output under {})",
        addr,
        config.workers,
        config.output_root.display()
    );
    serve(listener, router)
        .await
        .map_err(|e| MarkifyError::Internal(format!("server error: {e}")))
}
