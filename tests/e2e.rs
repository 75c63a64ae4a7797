//! End-to-end integration tests for pdf2quiz.
//!
//! Tests that need pdfium generate small PDFs on the fly. The library is
//! resolved through `pdfium-auto` (`PDFIUM_LIB_PATH`, the cache, or a
//! one-off download); when none of that works they print `SKIP`.
//! The live quiz test additionally needs `E2E_ENABLED` and an endpoint
//! configured through `OPENAI_API_KEY` / `OPENAI_BASE_URL` / `USE_AI_LLM_MODEL`.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture

use image::{Rgb, RgbImage};
use pdf2quiz::pipeline::render::bind_pdfium;
use pdf2quiz::{
    compose, compose_pages, convert_folder, encode_image_to_base64, prepare_quiz, validate,
    CompositionConfig, ErrorKind, LlmConfig, PageRange, PageSource, QuizError,
};
use edgequake_llm::MockProvider;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// pdfium tests run one at a time. An async mutex, so the quiz tests can
/// hold it across `.await`.
static PDFIUM_LOCK: Mutex<()> = Mutex::const_new(());

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Fetch (if needed) and bind pdfium; `false` means the test should skip.
fn pdfium_available() -> bool {
    if let Err(e) = pdfium_auto::ensure_pdfium_library(None) {
        println!("pdfium-auto could not provide a library: {e}");
    }
    match bind_pdfium() {
        Ok(_) => true,
        Err(e) => {
            println!("SKIP — pdfium not available: {e}");
            false
        }
    }
}

/// Skip this test unless pdfium can be bound; holds the lock otherwise.
/// Use `pdfium_or_skip!(async)` inside `#[tokio::test]`.
macro_rules! pdfium_or_skip {
    () => {{
        init_tracing();
        let guard = PDFIUM_LOCK.blocking_lock();
        if !pdfium_available() {
            return;
        }
        guard
    }};
    (async) => {{
        init_tracing();
        let guard = PDFIUM_LOCK.lock().await;
        if !tokio::task::block_in_place(pdfium_available) {
            return;
        }
        guard
    }};
}

/// One page of a generated PDF: its text and MediaBox size in points.
struct PdfPageSpec {
    text: String,
    width: u32,
    height: u32,
}

fn letter(text: &str) -> PdfPageSpec {
    PdfPageSpec {
        text: text.to_string(),
        width: 612,
        height: 792,
    }
}

/// Build a minimal PDF with one Helvetica text line per page.
///
/// Texts must not contain `(`, `)` or `\`.
fn build_pdf(pages: &[PdfPageSpec]) -> Vec<u8> {
    let page_count = pages.len();
    let object_count = 3 + 2 * page_count;
    let mut out: Vec<u8> = b"%PDF-1.4\n".to_vec();
    let mut offsets = vec![0usize; object_count + 1];

    let kids: Vec<String> = (0..page_count).map(|i| format!("{} 0 R", 4 + 2 * i)).collect();
    let mut objects: Vec<(usize, String)> = vec![
        (1, "<< /Type /Catalog /Pages 2 0 R >>".to_string()),
        (
            2,
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                kids.join(" "),
                page_count
            ),
        ),
        (
            3,
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        ),
    ];
    for (i, page) in pages.iter().enumerate() {
        let page_obj = 4 + 2 * i;
        let content_obj = page_obj + 1;
        let stream = format!(
            "BT /F1 18 Tf 36 {} Td ({}) Tj ET",
            page.height.saturating_sub(54),
            page.text
        );
        objects.push((
            page_obj,
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] \
                 /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
                page.width, page.height, content_obj
            ),
        ));
        objects.push((
            content_obj,
            format!(
                "<< /Length {} >>\nstream\n{}\nendstream",
                stream.len(),
                stream
            ),
        ));
    }

    for (num, body) in &objects {
        offsets[*num] = out.len();
        out.extend_from_slice(format!("{num} 0 obj\n{body}\nendobj\n").as_bytes());
    }

    let xref_offset = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", object_count + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in &offsets[1..] {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            object_count + 1,
            xref_offset
        )
        .as_bytes(),
    );
    out
}

fn write_pdf(dir: &Path, name: &str, pages: &[PdfPageSpec]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, build_pdf(pages)).unwrap();
    path
}

/// Ten letter-size pages reading "Page 1" … "Page 10".
fn ten_page_pdf(dir: &Path) -> PathBuf {
    let pages: Vec<PdfPageSpec> = (1..=10).map(|n| letter(&format!("Page {n}"))).collect();
    write_pdf(dir, "ten.pdf", &pages)
}

fn config_at_72dpi() -> pdf2quiz::CompositionConfigBuilder {
    CompositionConfig::builder().dpi(72)
}

// ── Library behaviour that needs no pdfium ──────────────────────────────────

#[test]
fn inconsistent_range_is_rejected_up_front() {
    let err = CompositionConfig::builder()
        .page_range(2, -1)
        .build()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRange);

    assert!(PageRange::new(-1, -3).is_err());
    assert!(PageRange::new(0, 5).is_err());
}

#[test]
fn traversal_is_rejected_with_and_without_root() {
    let root = TempDir::new().unwrap();
    for r in [None, Some(root.path())] {
        let err = validate("../../etc/passwd", r).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathSafety);
    }
}

#[test]
fn path_under_root_is_accepted() {
    let root = TempDir::new().unwrap();
    let canonical_root = std::fs::canonicalize(root.path()).unwrap();
    let path = root.path().join("sub").join("file.pdf");

    let validated = validate(&path, Some(root.path())).unwrap();
    assert!(validated.starts_with(&canonical_root));
    assert!(validated.ends_with("sub/file.pdf"));
}

#[test]
fn resolved_interval_counts_from_the_end() {
    let interval = PageRange::new(-3, -1).unwrap().resolve(10);
    assert_eq!((interval.start, interval.end), (7, 9));
    assert_eq!(interval.indices().map(|i| i + 1).collect::<Vec<_>>(), vec![8, 9]);
}

/// Solid-colour pages; page `n` is `n * 10` px wide.
struct ColourDoc {
    texts: Vec<&'static str>,
    rendered: RefCell<Vec<usize>>,
}

impl PageSource for ColourDoc {
    fn page_count(&self) -> usize {
        self.texts.len()
    }

    fn page_text(&self, index: usize) -> Result<String, QuizError> {
        Ok(self.texts[index].to_string())
    }

    fn render_page(&self, index: usize, _dpi: u32) -> Result<RgbImage, QuizError> {
        self.rendered.borrow_mut().push(index + 1);
        let shade = (index as u8 + 1) * 20;
        Ok(RgbImage::from_pixel(
            (index as u32 + 1) * 10,
            5,
            Rgb([shade, 0, 0]),
        ))
    }
}

#[test]
fn filtered_pages_stack_in_order() {
    let doc = ColourDoc {
        texts: vec!["intro", "forces", "Acceleration a", "mass", "more Acceleration", "end"],
        rendered: RefCell::new(Vec::new()),
    };
    let range = PageRange::new(1, 6).unwrap();

    let composition = compose_pages(&doc, range, 72, Some("Acceleration"), None).unwrap();

    assert_eq!(composition.rendered_pages, vec![3, 5]);
    assert_eq!(*doc.rendered.borrow(), vec![3, 5]);
    assert_eq!(composition.canvas.dimensions(), (50, 10));
    assert_eq!(composition.canvas.get_pixel(0, 0), &Rgb([60, 0, 0]));
    assert_eq!(composition.canvas.get_pixel(0, 5), &Rgb([100, 0, 0]));
    // Page 3 is narrower than page 5; the gap stays white.
    assert_eq!(composition.canvas.get_pixel(45, 0), &Rgb([255, 255, 255]));
}

#[test]
fn empty_folder_batch_is_clean() {
    let dir = TempDir::new().unwrap();
    let report = convert_folder(
        dir.path(),
        dir.path().join("images"),
        Some("chapter"),
        &CompositionConfig::default(),
    )
    .unwrap();
    assert_eq!(report.attempted(), 0);
}

#[test]
fn png_encoding_round_trips_bytes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("canvas.png");
    RgbImage::from_pixel(8, 8, Rgb([1, 2, 3])).save(&path).unwrap();

    use base64::Engine as _;
    let b64 = encode_image_to_base64(&path).unwrap();
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(b64)
        .unwrap();
    assert_eq!(decoded, std::fs::read(&path).unwrap());
}

// ── Composition through pdfium ───────────────────────────────────────────────

#[test]
fn last_pages_are_composed() {
    let _lock = pdfium_or_skip!();
    let dir = TempDir::new().unwrap();
    let pdf = ten_page_pdf(dir.path());
    let out = dir.path().join("images").join("last.png");

    let config = config_at_72dpi().page_range(-3, -1).build().unwrap();
    let report = compose(&pdf, &out, &config).unwrap();

    assert_eq!(report.page_count, 10);
    assert_eq!((report.interval_start, report.interval_end), (7, 9));
    assert_eq!(report.rendered_pages, vec![8, 9]);
    assert!(out.exists());

    let img = image::open(&out).unwrap();
    assert_eq!(img.width(), report.width);
    assert_eq!(img.height(), report.height);
}

#[test]
fn password_is_ignored_for_unencrypted_documents() {
    let _lock = pdfium_or_skip!();
    let dir = TempDir::new().unwrap();
    let pdf = ten_page_pdf(dir.path());
    let out = dir.path().join("first.png");

    let config = config_at_72dpi()
        .page_range(1, 1)
        .password("not-needed")
        .build()
        .unwrap();
    let report = compose(&pdf, &out, &config).unwrap();
    assert_eq!(report.rendered_pages, vec![1]);
}

#[test]
fn filter_keeps_matching_pages_only() {
    let _lock = pdfium_or_skip!();
    let dir = TempDir::new().unwrap();
    let pages = vec![
        letter("Introduction"),
        letter("Forces"),
        letter("Acceleration basics"),
        letter("Mass"),
        PdfPageSpec {
            text: "Acceleration again".into(),
            width: 300,
            height: 400,
        },
        letter("Summary"),
    ];
    let pdf = write_pdf(dir.path(), "physics.pdf", &pages);

    let single = |page: i32| {
        let config = config_at_72dpi().page_range(page, page).build().unwrap();
        compose(&pdf, dir.path().join(format!("p{page}.png")), &config).unwrap()
    };
    let p3 = single(3);
    let p5 = single(5);

    let config = config_at_72dpi()
        .page_range(1, 6)
        .content_filter("Acceleration")
        .build()
        .unwrap();
    let report = compose(&pdf, dir.path().join("filtered.png"), &config).unwrap();

    assert_eq!(report.rendered_pages, vec![3, 5]);
    assert_eq!(report.height, p3.height + p5.height);
    assert_eq!(report.width, p3.width.max(p5.width));
}

#[test]
fn no_match_leaves_existing_output_untouched() {
    let _lock = pdfium_or_skip!();
    let dir = TempDir::new().unwrap();
    let pdf = ten_page_pdf(dir.path());
    let out = dir.path().join("existing.png");
    std::fs::write(&out, b"sentinel").unwrap();

    let config = config_at_72dpi()
        .content_filter("Thermodynamics")
        .build()
        .unwrap();
    let err = compose(&pdf, &out, &config).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NoMatch);
    assert_eq!(std::fs::read(&out).unwrap(), b"sentinel");
}

#[test]
fn range_past_the_end_is_empty() {
    let _lock = pdfium_or_skip!();
    let dir = TempDir::new().unwrap();
    let pdf = ten_page_pdf(dir.path());
    let out = dir.path().join("empty.png");

    let config = config_at_72dpi().page_range(20, 25).build().unwrap();
    let err = compose(&pdf, &out, &config).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::EmptyRange);
    assert!(!out.exists());
}

#[test]
fn identical_calls_produce_identical_images() {
    let _lock = pdfium_or_skip!();
    let dir = TempDir::new().unwrap();
    let pdf = ten_page_pdf(dir.path());
    let config = config_at_72dpi().page_range(2, 4).build().unwrap();

    let a = dir.path().join("a.png");
    let b = dir.path().join("b.png");
    compose(&pdf, &a, &config).unwrap();
    compose(&pdf, &b, &config).unwrap();

    assert_eq!(std::fs::read(&a).unwrap(), std::fs::read(&b).unwrap());
}

#[test]
fn jpeg_output_from_extension() {
    let _lock = pdfium_or_skip!();
    let dir = TempDir::new().unwrap();
    let pdf = ten_page_pdf(dir.path());
    let out = dir.path().join("page1.JPG");

    let config = config_at_72dpi().page_range(1, 1).build().unwrap();
    compose(&pdf, &out, &config).unwrap();

    let bytes = std::fs::read(&out).unwrap();
    assert_eq!(image::guess_format(&bytes).unwrap(), image::ImageFormat::Jpeg);
}

#[test]
fn batch_converts_matching_files_and_records_failures() {
    let _lock = pdfium_or_skip!();
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("books");
    std::fs::create_dir(&source).unwrap();
    write_pdf(&source, "chapter_1.pdf", &[letter("One")]);
    write_pdf(&source, "chapter_2.pdf", &[letter("Two"), letter("Two b")]);
    write_pdf(&source, "notes.pdf", &[letter("Notes")]);
    std::fs::write(source.join("chapter_3.pdf"), b"this is not a pdf").unwrap();

    let out = dir.path().join("images");
    let config = config_at_72dpi().confine_to(dir.path()).build().unwrap();
    let report = convert_folder(&source, &out, Some(r"chapter_\d"), &config).unwrap();

    assert_eq!(report.converted.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].path.ends_with("chapter_3.pdf"));
    assert!(out.join("chapter_1.png").exists());
    assert!(out.join("chapter_2.png").exists());
    assert!(!out.join("notes.png").exists());
    assert_eq!(report.converted[1].rendered_pages, vec![1, 2]);
}

// ── Live quiz generation ────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn quiz_from_composed_pages_with_injected_provider() {
    let _lock = pdfium_or_skip!(async);

    let dir = TempDir::new().unwrap();
    let pdf = write_pdf(
        dir.path(),
        "motion.pdf",
        &[letter("Acceleration"), letter("Velocity"), letter("Acceleration again")],
    );
    let mock = MockProvider::new();
    mock.add_response("1. Define acceleration.").await;
    let llm = LlmConfig::builder().provider(Arc::new(mock)).build().unwrap();
    let config = CompositionConfig::builder()
        .dpi(72)
        .content_filter("Acceleration")
        .build()
        .unwrap();

    let image = dir.path().join("quiz").join("motion.png");
    let quiz = prepare_quiz(&pdf, &image, &config, &llm, None).await.unwrap();

    assert_eq!(quiz.report.rendered_pages, vec![1, 3]);
    assert_eq!(quiz.questions, "1. Define acceleration.");
    assert!(image.is_file());
}

#[tokio::test(flavor = "multi_thread")]
async fn live_quiz_from_composed_pages() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP — set E2E_ENABLED=1 to run live LLM tests");
        return;
    }
    let llm = LlmConfig::from_env();
    if llm.api_key.is_none() {
        println!("SKIP — OPENAI_API_KEY not set");
        return;
    }
    let _lock = pdfium_or_skip!(async);

    let dir = TempDir::new().unwrap();
    let pdf = write_pdf(
        dir.path(),
        "motion.pdf",
        &[
            letter("Acceleration is the rate of change of velocity"),
            letter("Velocity is displacement over time"),
        ],
    );
    let config = CompositionConfig::builder().dpi(100).build().unwrap();

    let quiz = prepare_quiz(&pdf, dir.path().join("motion.png"), &config, &llm, None)
        .await
        .expect("prepare_quiz should succeed");

    assert_eq!(quiz.report.rendered_pages, vec![1, 2]);
    assert!(!quiz.questions.trim().is_empty());
    println!("{}", quiz.questions);
}
