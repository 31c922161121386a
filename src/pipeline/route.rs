//! Format router: extension → extraction strategy.

use crate::error::MarkifyError;
use serde::Serialize;

/// Every extension the service accepts, lowercased with leading dot.
pub const SUPPORTED_EXTENSIONS: [&str; 16] = [
    ".docx", ".txt", ".pdf", ".xlsx", ".xls", ".csv", ".pptx", ".ppt", ".html", ".json", ".xml",
    ".epub", ".png", ".jpg", ".jpeg", ".bmp",
];

/// Extensions the generic strategy hands to the OCR engine.
pub const IMAGE_EXTENSIONS: [&str; 4] = [".png", ".jpg", ".jpeg", ".bmp"];

/// Extraction strategy selected for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Route {
    /// PDF analysis pipeline (text layer or OCR).
    Pdf,
    /// Generic converter, with CSV and image pre-steps.
    Generic,
}

/// Strategy for a lowercased extension, or `None` when unsupported.
pub fn route_for(extension: &str) -> Option<Route> {
    if !SUPPORTED_EXTENSIONS.contains(&extension) {
        return None;
    }
    Some(if extension == ".pdf" {
        Route::Pdf
    } else {
        Route::Generic
    })
}

/// Like [`route_for`] but produces the rejection error naming `file_name`.
pub fn route(file_name: &str, extension: &str) -> Result<Route, MarkifyError> {
    route_for(extension).ok_or_else(|| MarkifyError::UnsupportedFormat {
        file_name: file_name.to_string(),
    })
}

pub fn is_image(extension: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&extension)
}
