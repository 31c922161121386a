//! Staging store: the writer contract and backend selection.
//!
//! Every derived artifact (staged original, Markdown, extracted images, PDF
//! intermediates) goes through a [`DataWriter`]. Which backend sits behind it
//! is decided once per request by [`init_writers`], by looking at the
//! document source:
//!
//! ```text
//! inline bytes / local path   → LocalWriter rooted at <output_root>/<stem>/
//! s3://bucket/key             → S3Writer  rooted at s3://bucket/<prefix>/<stem>/
//! ```
//!
//! Extraction strategies only ever see the trait.

pub mod local;
pub mod memory;
pub mod s3;

pub use local::LocalWriter;
pub use memory::MemoryWriter;
pub use s3::{S3Reader, S3Writer};

use crate::config::S3Settings;
use crate::document::{DocumentSource, StagedArtifact, IMAGE_DIR};
use crate::error::MarkifyError;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Write-whole-file contract shared by every storage backend.
///
/// `path` is relative to the writer's root. Backends create intermediate
/// directories (or key prefixes) as needed.
#[async_trait]
pub trait DataWriter: Send + Sync {
    async fn write(&self, path: &str, data: &[u8]) -> Result<(), MarkifyError>;

    async fn write_string(&self, path: &str, text: &str) -> Result<(), MarkifyError> {
        self.write(path, text.as_bytes()).await
    }

    /// Root location, for log lines.
    fn location(&self) -> String;
}

/// Writers and raw bytes resolved for one request.
pub struct WriterSet {
    /// Content writer rooted at the document's output location.
    pub writer: Arc<dyn DataWriter>,
    /// Image writer rooted at the document's `images/` location.
    pub image_writer: Arc<dyn DataWriter>,
    /// Local staging writer; always rooted at `<output_root>/<stem>/`.
    pub staging: Arc<LocalWriter>,
    /// Document bytes read from the source.
    pub bytes: Vec<u8>,
    /// True when `writer` targets object storage.
    pub remote: bool,
}

impl WriterSet {
    /// Persist the original document under `base_name`.
    ///
    /// The local staging copy is always written; remote sources additionally
    /// get a copy next to their derived outputs.
    pub async fn persist_original(&self, base_name: &str) -> Result<(), MarkifyError> {
        self.staging.write(base_name, &self.bytes).await?;
        if self.remote {
            self.writer.write(base_name, &self.bytes).await?;
        }
        Ok(())
    }
}

/// Resolve the source, read its bytes and build the matching writer pair.
pub async fn init_writers(
    source: &DocumentSource,
    layout: &StagedArtifact,
    stem: &str,
    s3: &S3Settings,
) -> Result<WriterSet, MarkifyError> {
    let staging = Arc::new(LocalWriter::new(&layout.output_dir));
    tokio::fs::create_dir_all(&layout.image_dir)
        .await
        .map_err(|e| MarkifyError::io(&layout.image_dir, e))?;

    let set = match source {
        DocumentSource::Inline(bytes) => local_set(staging, layout, bytes.clone()),
        DocumentSource::Path(path) if path.starts_with(S3_SCHEME) => {
            let (bucket, key) = parse_s3_path(path)?;
            let credentials = s3.lookup(bucket)?;
            let client = s3::client_for(credentials);

            let bytes = S3Reader::new(client.clone(), bucket).read(key).await?;
            let prefix = join_key(&s3.output_prefix, stem);
            let image_prefix = join_key(&prefix, IMAGE_DIR);
            WriterSet {
                writer: Arc::new(S3Writer::new(client.clone(), bucket, prefix)),
                image_writer: Arc::new(S3Writer::new(client, bucket, image_prefix)),
                staging,
                bytes,
                remote: true,
            }
        }
        DocumentSource::Path(path) => {
            let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => MarkifyError::FileNotFound {
                    path: path.into(),
                },
                _ => MarkifyError::io(path, e),
            })?;
            local_set(staging, layout, bytes)
        }
    };

    debug!(
        "Writers for {}: content → {}, images → {}",
        stem,
        set.writer.location(),
        set.image_writer.location()
    );
    Ok(set)
}

fn local_set(staging: Arc<LocalWriter>, layout: &StagedArtifact, bytes: Vec<u8>) -> WriterSet {
    WriterSet {
        writer: staging.clone(),
        image_writer: Arc::new(LocalWriter::new(&layout.image_dir)),
        staging,
        bytes,
        remote: false,
    }
}

const S3_SCHEME: &str = "s3://";

/// Split `s3://bucket/key` into `(bucket, key)`.
pub fn parse_s3_path(path: &str) -> Result<(&str, &str), MarkifyError> {
    let invalid = || MarkifyError::InvalidS3Path {
        path: path.to_string(),
    };
    let rest = path.strip_prefix(S3_SCHEME).ok_or_else(invalid)?;
    let mut parts = rest.splitn(2, '/');
    let bucket = parts.next().filter(|b| !b.is_empty()).ok_or_else(invalid)?;
    let key = parts.next().filter(|k| !k.is_empty()).ok_or_else(invalid)?;
    Ok((bucket, key))
}

/// Join key segments with single slashes.
pub(crate) fn join_key(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Resolve `path` against a local writer root; absolute paths are kept.
pub(crate) fn resolve_local(root: &Path, path: &str) -> std::path::PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        root.join(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ParseRequest, Upload};

    fn layout_for(root: &Path, name: &str) -> (StagedArtifact, String) {
        let doc = ParseRequest {
            file_bytes: Some(Upload {
                file_name: name.into(),
                bytes: vec![],
            }),
            ..Default::default()
        }
        .into_document()
        .unwrap();
        (StagedArtifact::new(root, &doc), doc.stem().to_string())
    }

    #[test]
    fn parses_s3_paths() {
        assert_eq!(
            parse_s3_path("s3://docs/in/2024/report.pdf").unwrap(),
            ("docs", "in/2024/report.pdf")
        );
        for bad in ["s3://", "s3://bucket", "s3://bucket/", "s3:///key", "/local/file.pdf"] {
            assert!(
                matches!(parse_s3_path(bad), Err(MarkifyError::InvalidS3Path { .. })),
                "{bad}"
            );
        }
    }

    #[test]
    fn join_key_normalises_slashes() {
        assert_eq!(join_key("output/", "/report"), "output/report");
        assert_eq!(join_key("", "report"), "report");
        assert_eq!(join_key("output/report", "images"), "output/report/images");
    }

    #[tokio::test]
    async fn inline_source_uses_local_writers_and_precreates_images() {
        let root = tempfile::tempdir().unwrap();
        let (layout, stem) = layout_for(root.path(), "report.pdf");
        let source = DocumentSource::Inline(b"%PDF-1.7".to_vec());

        let set = init_writers(&source, &layout, &stem, &S3Settings::default())
            .await
            .unwrap();
        assert!(!set.remote);
        assert!(layout.image_dir.is_dir());

        set.persist_original("report.pdf").await.unwrap();
        assert_eq!(std::fs::read(&layout.original_file).unwrap(), b"%PDF-1.7");

        set.image_writer.write("page1_img1.png", b"png").await.unwrap();
        assert!(layout.image_dir.join("page1_img1.png").is_file());
    }

    #[tokio::test]
    async fn local_path_source_reads_bytes() {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("notes.txt");
        std::fs::write(&input, "hello").unwrap();
        let (layout, stem) = layout_for(&root.path().join("output"), "notes.txt");

        let source = DocumentSource::Path(input.to_string_lossy().into_owned());
        let set = init_writers(&source, &layout, &stem, &S3Settings::default())
            .await
            .unwrap();
        assert_eq!(set.bytes, b"hello");
    }

    #[tokio::test]
    async fn missing_local_path_is_file_not_found() {
        let root = tempfile::tempdir().unwrap();
        let (layout, stem) = layout_for(root.path(), "gone.pdf");
        let source = DocumentSource::Path("/no/such/dir/gone.pdf".into());
        let err = init_writers(&source, &layout, &stem, &S3Settings::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, MarkifyError::FileNotFound { .. }));
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn s3_source_without_credentials_is_rejected_before_any_request() {
        let root = tempfile::tempdir().unwrap();
        let (layout, stem) = layout_for(root.path(), "report.pdf");
        let source = DocumentSource::Path("s3://unknown/in/report.pdf".into());
        let err = init_writers(&source, &layout, &stem, &S3Settings::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, MarkifyError::UnknownBucket { .. }));
    }
}
