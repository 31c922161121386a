//! Request-side data model: the uploaded document and its staging layout.

use crate::error::MarkifyError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Where the document bytes come from. Exactly one provenance per request.
#[derive(Clone)]
pub enum DocumentSource {
    /// Bytes uploaded inline with the request.
    Inline(Vec<u8>),
    /// A local path or an `s3://bucket/key` reference.
    Path(String),
}

impl fmt::Debug for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentSource::Inline(bytes) => write!(f, "Inline({} bytes)", bytes.len()),
            DocumentSource::Path(p) => f.debug_tuple("Path").field(p).finish(),
        }
    }
}

/// A file uploaded in the multipart body.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// The raw inputs of one `doc_parse` request, before shape validation.
#[derive(Debug, Clone, Default)]
pub struct ParseRequest {
    pub file_bytes: Option<Upload>,
    pub file_path: Option<String>,
    pub parse_method: ParseMethod,
}

impl ParseRequest {
    /// Enforce the exactly-one-source rule and derive names.
    pub fn into_document(self) -> Result<UploadedDocument, MarkifyError> {
        let (name_source, source) = match (self.file_bytes, self.file_path) {
            (Some(upload), None) => (upload.file_name, DocumentSource::Inline(upload.bytes)),
            (None, Some(path)) => (path.clone(), DocumentSource::Path(path)),
            _ => {
                return Err(MarkifyError::InvalidInput(
                    "Must provide either file_bytes or file_path".to_string(),
                ))
            }
        };

        let base_name = base_name_of(&name_source).ok_or_else(|| {
            MarkifyError::InvalidInput(format!("Cannot derive a file name from '{name_source}'"))
        })?;
        let extension = extension_of(&base_name);

        Ok(UploadedDocument {
            base_name,
            extension,
            source,
            parse_method: self.parse_method,
        })
    }
}

/// A shape-checked document ready for the pipeline.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    /// File name without directories, e.g. `report.pdf`.
    pub base_name: String,
    /// Lowercased extension including the dot, e.g. `.pdf`; empty if none.
    pub extension: String,
    pub source: DocumentSource,
    pub parse_method: ParseMethod,
}

impl UploadedDocument {
    /// `base_name` without its last extension.
    pub fn stem(&self) -> &str {
        Path::new(&self.base_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.base_name)
    }

    /// Path reference, if the document was not uploaded inline.
    pub fn source_path(&self) -> Option<&str> {
        match &self.source {
            DocumentSource::Path(p) => Some(p),
            DocumentSource::Inline(_) => None,
        }
    }
}

/// Last path segment of a local path, URL-ish path or bare file name.
///
/// Handles both separators since uploads from Windows clients may carry
/// `C:\dir\file.docx` as their file name.
pub fn base_name_of(name: &str) -> Option<String> {
    let last = name
        .trim()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if last.is_empty() || last == "." || last == ".." {
        None
    } else {
        Some(last.to_string())
    }
}

/// Lowercased extension with leading dot, or empty.
pub fn extension_of(base_name: &str) -> String {
    Path::new(base_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

/// Paths of one document's staging directory.
///
/// ```text
/// <output_root>/<stem>/            output_dir
/// <output_root>/<stem>/<base>      original_file
/// <output_root>/<stem>/<base>.md   markdown_file
/// <output_root>/<stem>/images/     image_dir
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedArtifact {
    pub output_dir: PathBuf,
    pub original_file: PathBuf,
    pub markdown_file: PathBuf,
    pub image_dir: PathBuf,
}

impl StagedArtifact {
    pub fn new(output_root: &Path, doc: &UploadedDocument) -> Self {
        let output_dir = output_root.join(doc.stem());
        let original_file = output_dir.join(&doc.base_name);
        let markdown_file = output_dir.join(markdown_name(&doc.base_name));
        let image_dir = output_dir.join(IMAGE_DIR);
        Self {
            output_dir,
            original_file,
            markdown_file,
            image_dir,
        }
    }
}

/// Name of the image subdirectory inside every staging directory.
pub const IMAGE_DIR: &str = "images";

/// `report.pdf` → `report.pdf.md`.
pub fn markdown_name(base_name: &str) -> String {
    format!("{base_name}.md")
}

/// PDF analysis mode requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMethod {
    /// Classify the PDF and pick text or OCR analysis. (default)
    #[default]
    Auto,
    /// Force OCR of rasterised pages.
    Ocr,
    /// Force text-layer extraction.
    Txt,
}

impl FromStr for ParseMethod {
    type Err = MarkifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(ParseMethod::Auto),
            "ocr" => Ok(ParseMethod::Ocr),
            "txt" => Ok(ParseMethod::Txt),
            other => Err(MarkifyError::InvalidParseMethod {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ParseMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ParseMethod::Auto => "auto",
            ParseMethod::Ocr => "ocr",
            ParseMethod::Txt => "txt",
        })
    }
}
