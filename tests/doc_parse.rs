//! Integration tests for the parse pipeline and its HTTP surface.
//!
//! pdfium and the vision model are replaced by in-process fakes; the markup
//! converters are the real ones.

use async_trait::async_trait;
use markify::extract::generic::{GenericExtractor, ImageOcr};
use markify::extract::markup::MarkupConverter;
use markify::extract::pdf::{ContentBlock, PageLayout, PdfAnalysis, PdfAnalyzer, PdfExtractor, PdfKind};
use markify::pipeline::route::Route;
use markify::pipeline::validate::PageCounter;
use markify::server::{build_router, serve, AppState, DOC_PARSE_ROUTE};
use markify::storage::DataWriter;
use markify::{
    DocParser, ExtractorRegistry, MarkifyError, ParseMethod, ParseRequest, ResponseEnvelope,
    ServiceConfig, Upload,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ── Fakes ────────────────────────────────────────────────────────────────────

struct FixedPages(usize);

impl PageCounter for FixedPages {
    fn count_pages(&self, _path: &Path) -> Result<usize, MarkifyError> {
        Ok(self.0)
    }
}

/// Text-layer PDF with one paragraph and one figure per call.
#[derive(Default)]
struct FakeAnalyzer {
    calls: AtomicUsize,
}

#[async_trait]
impl PdfAnalyzer for FakeAnalyzer {
    async fn classify(&self, _path: &Path) -> Result<PdfKind, MarkifyError> {
        Ok(PdfKind::Txt)
    }

    async fn analyze(
        &self,
        _path: &Path,
        kind: PdfKind,
        image_writer: &dyn DataWriter,
    ) -> Result<PdfAnalysis, MarkifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        image_writer.write("page0_img0.png", b"\x89PNG").await?;
        Ok(PdfAnalysis {
            parse_type: kind,
            pages: vec![PageLayout {
                page_idx: 0,
                blocks: vec![
                    ContentBlock::Text {
                        text: "Quarterly report".into(),
                    },
                    ContentBlock::Image {
                        img_path: "images/page0_img0.png".into(),
                    },
                ],
            }],
        })
    }
}

struct FakeOcr(Vec<&'static str>);

#[async_trait]
impl ImageOcr for FakeOcr {
    async fn recognize(&self, _path: &Path) -> Result<Vec<String>, MarkifyError> {
        Ok(self.0.iter().map(|s| s.to_string()).collect())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

struct Harness {
    parser: DocParser,
    analyzer: Arc<FakeAnalyzer>,
    _root: tempfile::TempDir,
}

impl Harness {
    fn new(ocr_lines: Vec<&'static str>) -> Self {
        let root = tempfile::tempdir().unwrap();
        let config = ServiceConfig::builder()
            .output_root(root.path())
            .build()
            .unwrap();
        let analyzer = Arc::new(FakeAnalyzer::default());
        let registry = ExtractorRegistry::new()
            .register(Route::Pdf, Arc::new(PdfExtractor::new(analyzer.clone())))
            .register(
                Route::Generic,
                Arc::new(GenericExtractor::new(
                    Arc::new(MarkupConverter),
                    Arc::new(FakeOcr(ocr_lines)),
                )),
            );
        Self {
            parser: DocParser::new(&config, Arc::new(FixedPages(2)), registry),
            analyzer,
            _root: root,
        }
    }

    fn root(&self) -> &Path {
        self.parser.output_root()
    }
}

fn upload(name: &str, bytes: &[u8]) -> ParseRequest {
    ParseRequest {
        file_bytes: Some(Upload {
            file_name: name.into(),
            bytes: bytes.to_vec(),
        }),
        file_path: None,
        parse_method: ParseMethod::Auto,
    }
}

fn by_path(path: &Path) -> ParseRequest {
    ParseRequest {
        file_bytes: None,
        file_path: Some(path.to_string_lossy().into_owned()),
        parse_method: ParseMethod::Auto,
    }
}

fn assert_envelope_shape(env: &ResponseEnvelope) {
    assert!(env.code() == 200 || env.code() == 400 || env.code() == 500);
    assert_eq!(env.code() == 200, env.data().is_some(), "{env:?}");
}

// ── Pipeline ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn pdf_upload_returns_markdown_without_images() {
    let h = Harness::new(vec![]);
    let env = h.parser.parse(upload("report.pdf", b"%PDF-1.7")).await;

    assert_envelope_shape(&env);
    assert_eq!(env.code(), 200);
    assert_eq!(env.msg(), "Successfully processed report.pdf");
    assert_eq!(env.data(), Some("Quarterly report"));

    let dir = h.root().join("report");
    assert_eq!(std::fs::read(dir.join("report.pdf")).unwrap(), b"%PDF-1.7");
    assert_eq!(
        std::fs::read_to_string(dir.join("report.pdf.md")).unwrap(),
        "Quarterly report"
    );
    assert!(dir.join("images/page0_img0.png").is_file());
}

#[tokio::test]
async fn request_shape_is_enforced() {
    let h = Harness::new(vec![]);

    let neither = h.parser.parse(ParseRequest::default()).await;
    assert_envelope_shape(&neither);
    assert_eq!(neither.code(), 400);
    assert_eq!(neither.msg(), "Must provide either file_bytes or file_path");

    let mut both = upload("a.txt", b"x");
    both.file_path = Some("/tmp/a.txt".into());
    let both = h.parser.parse(both).await;
    assert_eq!(both.code(), 400);
    assert_eq!(both.msg(), "Must provide either file_bytes or file_path");
}

#[tokio::test]
async fn unsupported_extension_names_the_file() {
    let h = Harness::new(vec![]);
    let env = h.parser.parse(upload("setup.exe", b"MZ")).await;
    assert_envelope_shape(&env);
    assert_eq!(env.code(), 400);
    assert_eq!(env.msg(), "Format not supported: setup.exe");
    assert!(!h.root().join("setup").exists());
}

#[tokio::test]
async fn oversized_pdf_is_rejected_before_extraction() {
    let h = Harness::new(vec![]);
    let src = tempfile::tempdir().unwrap();
    let path = src.path().join("huge.pdf");
    let file = std::fs::File::create(&path).unwrap();
    file.set_len(60 * 1024 * 1024).unwrap();

    let env = h.parser.parse(by_path(&path)).await;
    assert_envelope_shape(&env);
    assert_eq!(env.code(), 400);
    assert!(env.msg().starts_with("File verification failed: huge.pdf"), "{}", env.msg());
    assert!(env.msg().contains("60.00 MB exceeds limit 50 MB"), "{}", env.msg());
    assert_eq!(h.analyzer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_local_path_is_client_error() {
    let h = Harness::new(vec![]);
    let env = h.parser.parse(by_path(Path::new("/definitely/not/here.docx"))).await;
    assert_envelope_shape(&env);
    assert_eq!(env.code(), 400);
    assert!(env.msg().starts_with("File not found"), "{}", env.msg());
}

#[tokio::test]
async fn reprocessing_reuses_the_same_directory() {
    let h = Harness::new(vec![]);
    let first = h.parser.parse(upload("notes.txt", b"first version")).await;
    let second = h.parser.parse(upload("notes.txt", b"second version")).await;

    assert_eq!(first.data(), Some("first version"));
    assert_eq!(second.data(), Some("second version"));

    let entries: Vec<_> = std::fs::read_dir(h.root())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("notes")]);
    assert_eq!(
        std::fs::read_to_string(h.root().join("notes/notes.txt.md")).unwrap(),
        "second version"
    );
}

#[tokio::test]
async fn csv_upload_becomes_a_table() {
    let h = Harness::new(vec![]);
    let env = h
        .parser
        .parse(upload("sales.csv", b"region,total\nNorth,10\nSouth,12\n"))
        .await;
    assert_eq!(env.code(), 200, "{}", env.msg());
    let md = env.data().unwrap();
    assert!(md.contains("region"), "{md}");
    assert!(md.contains("South"), "{md}");
    assert!(md.contains('|'), "{md}");
    assert!(h.root().join("sales/sales.csv.tsv").is_file());
}

#[tokio::test]
async fn image_with_recognised_text() {
    let h = Harness::new(vec!["INVOICE 2041", "Total due: 42.00"]);
    let env = h.parser.parse(upload("invoice.jpg", b"\xFF\xD8\xFF")).await;
    assert_eq!(env.code(), 200, "{}", env.msg());
    assert_eq!(env.data(), Some("INVOICE 2041\nTotal due: 42.00"));
}

#[tokio::test]
async fn image_without_text_reports_missing_sidecar() {
    let h = Harness::new(vec![]);
    let env = h.parser.parse(upload("scan.png", b"\x89PNG")).await;
    assert_envelope_shape(&env);
    assert_eq!(env.code(), 400);
    assert!(env.msg().starts_with("Error processed scan.png"), "{}", env.msg());
    assert!(env.msg().contains("File not found"), "{}", env.msg());
}

#[tokio::test]
async fn image_and_text_with_same_stem_share_a_directory_safely() {
    let h = Harness::new(vec!["OCR TEXT"]);
    let txt = h.parser.parse(upload("scan.txt", b"typed notes")).await;
    assert_eq!(txt.data(), Some("typed notes"));

    let png = h.parser.parse(upload("scan.png", b"\x89PNG")).await;
    assert_eq!(png.code(), 200, "{}", png.msg());
    assert_eq!(png.data(), Some("OCR TEXT"));

    let dir = h.root().join("scan");
    assert_eq!(std::fs::read_to_string(dir.join("scan.txt")).unwrap(), "typed notes");
    assert_eq!(std::fs::read_to_string(dir.join("scan.png.txt")).unwrap(), "OCR TEXT");
}

// ── HTTP ─────────────────────────────────────────────────────────────────────

/// Serve a fresh harness on an ephemeral port. The returned guard keeps the
/// output root alive for the duration of the test.
async fn spawn_server(h: Harness) -> (String, tempfile::TempDir) {
    let Harness { parser, _root, .. } = h;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState::new(parser, 2);
    tokio::spawn(serve(listener, build_router(state, 64 * 1024 * 1024)));
    (format!("http://{addr}"), _root)
}

#[tokio::test]
async fn http_multipart_upload() {
    let (base, root) = spawn_server(Harness::new(vec![])).await;
    let client = reqwest::Client::new();

    let form = reqwest::multipart::Form::new()
        .part(
            "file_bytes",
            reqwest::multipart::Part::bytes(b"hello over http".to_vec()).file_name("greeting.txt"),
        )
        .text("parse_method", "auto");
    let resp = client
        .post(format!("{base}{DOC_PARSE_ROUTE}"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let env: ResponseEnvelope = resp.json().await.unwrap();
    assert_eq!(env.code(), 200, "{}", env.msg());
    assert_eq!(env.data(), Some("hello over http"));
    assert!(root.path().join("greeting/greeting.txt.md").is_file());
}

#[tokio::test]
async fn http_errors_still_answer_200_with_envelope() {
    let (base, _root) = spawn_server(Harness::new(vec![])).await;
    let client = reqwest::Client::new();

    let form = reqwest::multipart::Form::new()
        .part(
            "file_bytes",
            reqwest::multipart::Part::bytes(b"x".to_vec()).file_name("a.txt"),
        )
        .text("parse_method", "magic");
    let resp = client
        .post(format!("{base}{DOC_PARSE_ROUTE}"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let env: ResponseEnvelope = resp.json().await.unwrap();
    assert_eq!(env.code(), 400);
    assert!(env.msg().contains("magic"));
    assert!(env.data().is_none());

    let empty = reqwest::multipart::Form::new().text("parse_method", "ocr");
    let env: ResponseEnvelope = client
        .post(format!("{base}{DOC_PARSE_ROUTE}"))
        .multipart(empty)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(env.code(), 400);
    assert_eq!(env.msg(), "Must provide either file_bytes or file_path");
}

#[tokio::test]
async fn health_probe() {
    let (base, _root) = spawn_server(Harness::new(vec![])).await;
    let body: serde_json::Value = reqwest::get(format!("{base}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}
