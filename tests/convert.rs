//! Conversion tests against an in-process fake engine.
//!
//! The fake parses anything starting with `%PDF-`, exposes a configurable list
//! of page sizes, and paints each rendered page a solid colour whose red
//! channel is the page number. No PDFium library is needed.

use image::{ImageError, Rgba};
use pdf2img::{
    convert_sync, ConversionRequest, ConversionResult, Converter, ConverterConfig, EngineDocument,
    EngineError, EngineLoadError, EnginePage, EngineSource, FailureKind, LoadPhase, RenderEngine,
    RenderHints, SmoothingQuality, Surface, SurfaceEncoder, Viewport, WorkerEndpoint,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Fake engine ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeEngine {
    pages: Vec<(f32, f32)>,
    render_delay: Duration,
    rendered: Mutex<Vec<usize>>,
    hints: Mutex<Vec<RenderHints>>,
    endpoint: Mutex<Option<WorkerEndpoint>>,
}

impl FakeEngine {
    fn with_pages(pages: &[(f32, f32)]) -> Self {
        Self {
            pages: pages.to_vec(),
            ..Self::default()
        }
    }

    fn rendered(&self) -> Vec<usize> {
        self.rendered.lock().unwrap().clone()
    }
}

impl RenderEngine for FakeEngine {
    fn version(&self) -> Option<String> {
        Some("4.2.67".into())
    }

    fn set_worker_endpoint(&self, endpoint: &WorkerEndpoint) {
        *self.endpoint.lock().unwrap() = Some(endpoint.clone());
    }

    fn open_document<'a>(
        &'a self,
        bytes: &'a [u8],
    ) -> Result<Box<dyn EngineDocument + 'a>, EngineError> {
        if !bytes.starts_with(b"%PDF-") {
            return Err(EngineError::InvalidDocument("Invalid PDF structure.".into()));
        }
        Ok(Box::new(FakeDocument { engine: self }))
    }
}

struct FakeDocument<'a> {
    engine: &'a FakeEngine,
}

impl EngineDocument for FakeDocument<'_> {
    fn page_count(&self) -> usize {
        self.engine.pages.len()
    }

    fn page<'b>(&'b self, number: usize) -> Result<Box<dyn EnginePage + 'b>, EngineError> {
        let total = self.page_count();
        if number == 0 || number > total {
            return Err(EngineError::PageOutOfRange { page: number, total });
        }
        Ok(Box::new(FakePage {
            engine: self.engine,
            number,
            size: self.engine.pages[number - 1],
        }))
    }
}

struct FakePage<'a> {
    engine: &'a FakeEngine,
    number: usize,
    size: (f32, f32),
}

impl EnginePage for FakePage<'_> {
    fn native_size(&self) -> (f32, f32) {
        self.size
    }

    fn render(&self, surface: &mut Surface, _viewport: &Viewport) -> Result<(), EngineError> {
        std::thread::sleep(self.engine.render_delay);
        self.engine.rendered.lock().unwrap().push(self.number);
        self.engine.hints.lock().unwrap().push(surface.hints());
        surface.fill(Rgba([self.number as u8, 0, 0, 255]));
        Ok(())
    }
}

struct FakeSource {
    engine: Option<Arc<FakeEngine>>,
    delay: Duration,
    acquisitions: AtomicUsize,
}

impl FakeSource {
    fn serving(engine: Arc<FakeEngine>) -> Arc<Self> {
        Arc::new(Self {
            engine: Some(engine),
            delay: Duration::from_millis(50),
            acquisitions: AtomicUsize::new(0),
        })
    }

    fn broken() -> Arc<Self> {
        Self::broken_after(Duration::from_millis(20))
    }

    fn broken_after(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            engine: None,
            delay,
            acquisitions: AtomicUsize::new(0),
        })
    }

    fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }
}

impl EngineSource for FakeSource {
    fn name(&self) -> &str {
        if self.engine.is_some() {
            "fake"
        } else {
            "broken"
        }
    }

    fn acquire(&self) -> Result<Arc<dyn RenderEngine>, EngineLoadError> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        match &self.engine {
            Some(engine) => Ok(Arc::clone(engine) as Arc<dyn RenderEngine>),
            None => Err(EngineLoadError::Unavailable {
                source_name: self.name().to_string(),
                reason: "Failed to fetch dynamically imported module".into(),
            }),
        }
    }
}

struct EmptyEncoder;

impl SurfaceEncoder for EmptyEncoder {
    fn encode(&self, _surface: &Surface, _quality: f32) -> Result<Vec<u8>, ImageError> {
        Ok(Vec::new())
    }
}

struct FailingEncoder;

impl SurfaceEncoder for FailingEncoder {
    fn encode(&self, _surface: &Surface, _quality: f32) -> Result<Vec<u8>, ImageError> {
        Err(ImageError::IoError(std::io::Error::other("surface tainted")))
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

const LETTER: (f32, f32) = (612.0, 792.0);
const PDF: &[u8] = b"%PDF-1.7\n%fake body\n%%EOF\n";

fn converter_for(engine: Arc<FakeEngine>) -> (Converter, Arc<FakeSource>) {
    converter_with_config(engine, ConverterConfig::default())
}

fn converter_with_config(
    engine: Arc<FakeEngine>,
    config: ConverterConfig,
) -> (Converter, Arc<FakeSource>) {
    let source = FakeSource::serving(engine);
    let converter = Converter::with_sources(vec![source.clone() as Arc<dyn EngineSource>], config);
    (converter, source)
}

/// Exactly one of image outputs / error is populated.
fn assert_exclusive(result: &ConversionResult) {
    let has_image = result.image_url().is_some() && result.file().is_some();
    let has_none = result.image_url().is_none() && result.file().is_none();
    assert!(has_image || has_none, "image fields must be all-or-nothing");
    assert_ne!(has_image, result.error().is_some(), "got: {result:?}");
}

// ── Rendering ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn renders_only_the_first_page() {
    init_tracing();
    let engine = Arc::new(FakeEngine::with_pages(&[LETTER, (300.0, 300.0), (100.0, 50.0)]));
    let (converter, _) = converter_for(engine.clone());

    let result = converter.convert(PDF, "three-pages.pdf").await;
    assert_exclusive(&result);
    let image = result.into_result().expect("conversion should succeed");

    assert_eq!(engine.rendered(), vec![1]);
    assert_eq!((image.width, image.height), (1224, 1584));

    let decoded = image::load_from_memory(image.file.bytes()).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (1224, 1584));
    assert_eq!(decoded.get_pixel(0, 0), &Rgba([1, 0, 0, 255]));
}

#[tokio::test]
async fn surface_is_ceiled_double_native_size() {
    let engine = Arc::new(FakeEngine::with_pages(&[(612.3, 791.1)]));
    let (converter, _) = converter_for(engine);

    let image = converter.convert(PDF, "odd.pdf").await.into_result().unwrap();
    assert_eq!((image.width, image.height), (1225, 1583));
}

#[tokio::test]
async fn smoothing_is_enabled_at_high_quality() {
    let engine = Arc::new(FakeEngine::with_pages(&[LETTER]));
    let (converter, _) = converter_for(engine.clone());

    converter.convert(PDF, "a.pdf").await.into_result().unwrap();
    let hints = engine.hints.lock().unwrap().clone();
    assert_eq!(
        hints,
        vec![RenderHints {
            smoothing: true,
            quality: SmoothingQuality::High
        }]
    );
}

// ── Output naming and references ─────────────────────────────────────────────

#[tokio::test]
async fn output_names_follow_input_names() {
    let engine = Arc::new(FakeEngine::with_pages(&[LETTER]));
    let (converter, _) = converter_for(engine);

    let cases = [
        ("Resume.PDF", "Resume.png"),
        ("report", "report.png"),
        ("cv.pdf", "cv.png"),
    ];
    for (input, expected) in cases {
        let result = converter.convert(PDF, input).await;
        let file = result.file().expect("file present");
        assert_eq!(file.name(), expected);
        assert_eq!(file.mime_type(), "image/png");
    }
}

#[tokio::test]
async fn display_reference_points_at_file_bytes_until_revoked() {
    let engine = Arc::new(FakeEngine::with_pages(&[LETTER]));
    let (converter, _) = converter_for(engine);

    let image = converter.convert(PDF, "Resume.pdf").await.into_result().unwrap();
    let entry = converter.display().resolve(&image.image_url).expect("live reference");
    assert!(Arc::ptr_eq(&entry.bytes, image.file.bytes()));
    assert_eq!(entry.mime_type, "image/png");

    // Not released automatically.
    converter.convert(PDF, "Other.pdf").await.into_result().unwrap();
    assert_eq!(converter.display().len(), 2);

    assert!(converter.display().revoke(&image.image_url));
    assert_eq!(converter.display().len(), 1);
}

// ── Failure paths ────────────────────────────────────────────────────────────

#[tokio::test]
async fn corrupt_input_reports_parse_error() {
    let engine = Arc::new(FakeEngine::with_pages(&[LETTER]));
    let (converter, _) = converter_for(engine.clone());

    let result = converter.convert(b"PK\x03\x04 this is a zip".to_vec(), "Resume.pdf").await;
    assert_exclusive(&result);
    assert_eq!(
        result.error(),
        Some("Failed to convert PDF: Invalid PDF structure.")
    );
    assert_eq!(result.failure_kind(), Some(FailureKind::Conversion));
    assert!(engine.rendered().is_empty());
}

#[tokio::test]
async fn empty_document_has_no_first_page() {
    let engine = Arc::new(FakeEngine::with_pages(&[]));
    let (converter, _) = converter_for(engine);

    let result = converter.convert(PDF, "empty.pdf").await;
    assert_exclusive(&result);
    let msg = result.error().unwrap();
    assert!(msg.starts_with("Failed to convert PDF: "), "got: {msg}");
    assert!(msg.contains("Page 1 is out of range"), "got: {msg}");
}

#[tokio::test]
async fn oversized_surface_has_no_context() {
    let engine = Arc::new(FakeEngine::with_pages(&[LETTER]));
    let config = ConverterConfig::builder()
        .max_surface_pixels(1000 * 1000)
        .build()
        .unwrap();
    let (converter, _) = converter_with_config(engine.clone(), config);

    let result = converter.convert(PDF, "big.pdf").await;
    assert_exclusive(&result);
    assert_eq!(result.error(), Some("Failed to get 2D rendering context for canvas"));
    assert_eq!(result.failure_kind(), Some(FailureKind::RenderContextUnavailable));
    assert!(result.file().is_none());
    assert!(engine.rendered().is_empty());
}

#[tokio::test]
async fn zero_sized_page_has_no_context() {
    let engine = Arc::new(FakeEngine::with_pages(&[(0.0, 792.0)]));
    let (converter, _) = converter_for(engine);

    let result = converter.convert(PDF, "flat.pdf").await;
    assert_eq!(result.error(), Some("Failed to get 2D rendering context for canvas"));
}

#[tokio::test]
async fn empty_encoder_output_is_a_blob_failure() {
    let engine = Arc::new(FakeEngine::with_pages(&[LETTER]));
    let (converter, _) = converter_for(engine);
    let converter = converter.with_encoder(Arc::new(EmptyEncoder));

    let result = converter.convert(PDF, "Resume.pdf").await;
    assert_exclusive(&result);
    assert_eq!(result.error(), Some("Failed to create image blob"));
    assert_eq!(result.failure_kind(), Some(FailureKind::Encoding));
    assert!(converter.display().is_empty());
}

#[tokio::test]
async fn encoder_error_is_a_blob_failure() {
    let engine = Arc::new(FakeEngine::with_pages(&[LETTER]));
    let (converter, _) = converter_for(engine);
    let converter = converter.with_encoder(Arc::new(FailingEncoder));

    let result = converter.convert(PDF, "Resume.pdf").await;
    assert_eq!(result.error(), Some("Failed to create image blob"));
}

#[tokio::test]
async fn render_timeout_is_reported() {
    let engine = Arc::new(FakeEngine {
        pages: vec![LETTER],
        render_delay: Duration::from_millis(1500),
        ..FakeEngine::default()
    });
    let config = ConverterConfig::builder()
        .render_timeout_secs(1)
        .build()
        .unwrap();
    let (converter, _) = converter_with_config(engine, config);

    let result = converter.convert(PDF, "slow.pdf").await;
    assert_exclusive(&result);
    assert_eq!(
        result.error(),
        Some("Failed to convert PDF: render timed out after 1s")
    );
}

// ── Engine bootstrap ─────────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_conversions_share_one_engine_load() {
    let engine = Arc::new(FakeEngine::with_pages(&[LETTER]));
    let (converter, source) = converter_for(engine.clone());

    let results = futures::future::join_all(
        (0..10).map(|i| {
            let converter = converter.clone();
            async move { converter.convert(PDF, &format!("r{i}.pdf")).await }
        }),
    )
    .await;

    assert!(results.iter().all(ConversionResult::is_converted));
    assert_eq!(source.acquisitions(), 1);
    assert_eq!(engine.rendered().len(), 10);
}

#[tokio::test]
async fn prewarm_loads_once_and_sets_endpoint() {
    let engine = Arc::new(FakeEngine::with_pages(&[LETTER]));
    let (converter, source) = converter_for(engine.clone());

    let handle = converter.prewarm().await.unwrap();
    assert_eq!(handle.source, "fake");
    converter.convert(PDF, "a.pdf").await.into_result().unwrap();
    assert_eq!(source.acquisitions(), 1);

    let endpoint = engine.endpoint.lock().unwrap().clone();
    assert!(
        matches!(
            &endpoint,
            Some(WorkerEndpoint::Remote(url)) if url.ends_with("chromium%2F4.2.67")
        ),
        "got: {endpoint:?}"
    );
}

#[tokio::test]
async fn fallback_source_is_used_when_primary_fails() {
    let primary = FakeSource::broken();
    let fallback = FakeSource::serving(Arc::new(FakeEngine::with_pages(&[LETTER])));
    let converter = Converter::with_sources(
        vec![primary.clone() as Arc<dyn EngineSource>, fallback.clone()],
        ConverterConfig::default(),
    );

    assert!(converter.convert(PDF, "a.pdf").await.is_converted());
    assert_eq!((primary.acquisitions(), fallback.acquisitions()), (1, 1));
}

#[tokio::test]
async fn engine_load_failure_is_reported_and_retried() {
    init_tracing();
    let primary = FakeSource::broken();
    let legacy = FakeSource::broken();
    let converter = Converter::with_sources(
        vec![primary.clone() as Arc<dyn EngineSource>, legacy.clone()],
        ConverterConfig::default(),
    );

    let results = futures::future::join_all((0..4).map(|_| converter.convert(PDF, "a.pdf"))).await;
    for result in &results {
        assert_exclusive(result);
        assert_eq!(result.failure_kind(), Some(FailureKind::EngineLoad));
        let msg = result.error().unwrap();
        assert!(msg.starts_with("Failed to convert PDF: "), "got: {msg}");
        assert!(msg.contains("dynamically imported module"), "got: {msg}");
    }
    assert_eq!(primary.acquisitions(), 1);

    converter.convert(PDF, "a.pdf").await;
    assert_eq!(primary.acquisitions(), 2);
    assert_eq!(converter.loader().attempts(), 2);
}

#[tokio::test]
async fn load_timeout_does_not_stop_the_fallback() {
    let primary = FakeSource::broken_after(Duration::from_millis(1500));
    let fallback = FakeSource::serving(Arc::new(FakeEngine::with_pages(&[LETTER])));
    let config = ConverterConfig::builder()
        .engine_load_timeout_secs(1)
        .build()
        .unwrap();
    let converter = Converter::with_sources(
        vec![primary.clone() as Arc<dyn EngineSource>, fallback.clone()],
        config,
    );

    let result = converter.convert(PDF, "slow.pdf").await;
    assert_exclusive(&result);
    assert_eq!(
        result.error(),
        Some("Failed to convert PDF: engine load timed out after 1s")
    );

    // Nobody is waiting any more; the load still moves on to the fallback.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(converter.loader().phase(), LoadPhase::Loaded);
    assert_eq!((primary.acquisitions(), fallback.acquisitions()), (1, 1));

    assert!(converter.convert(PDF, "later.pdf").await.is_converted());
    assert_eq!(converter.loader().attempts(), 1);
}

#[tokio::test]
async fn call_after_timed_out_failure_starts_a_new_attempt() {
    let primary = FakeSource::broken_after(Duration::from_millis(1500));
    let config = ConverterConfig::builder()
        .engine_load_timeout_secs(1)
        .build()
        .unwrap();
    let converter =
        Converter::with_sources(vec![primary.clone() as Arc<dyn EngineSource>], config);

    let first = converter.convert(PDF, "a.pdf").await;
    assert!(first.error().unwrap().contains("engine load timed out"));

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(converter.loader().phase(), LoadPhase::Unloaded);

    let second = converter.convert(PDF, "a.pdf").await;
    assert!(
        second.error().unwrap().contains("engine load timed out"),
        "a fresh attempt is started instead of replaying the stale failure, got: {:?}",
        second.error()
    );
    assert_eq!(converter.loader().attempts(), 2);
    assert_eq!(primary.acquisitions(), 2);
}

// ── Requests ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn request_from_path_uses_the_file_name() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Resume.PDF");
    std::fs::write(&path, PDF).unwrap();

    let request = ConversionRequest::from_path(&path).await.unwrap();
    assert_eq!(request.filename, "Resume.PDF");
    assert_eq!(request.bytes, PDF);

    let (converter, _) = converter_for(Arc::new(FakeEngine::with_pages(&[LETTER])));
    let image = converter.convert_request(request).await.into_result().unwrap();
    assert_eq!(image.file.name(), "Resume.png");

    let saved = image.file.save_in(dir.path()).await.unwrap();
    assert_eq!(saved, dir.path().join("Resume.png"));
    assert_eq!(std::fs::read(saved).unwrap(), &image.file.bytes()[..]);
}

#[test]
fn convert_sync_blocks_on_a_private_runtime() {
    let engine = Arc::new(FakeEngine::with_pages(&[(50.0, 25.0)]));
    let (converter, _) = converter_for(engine);

    let result = convert_sync(&converter, PDF, "sync.pdf");
    let image = result.into_result().unwrap();
    assert_eq!(image.file.name(), "sync.png");
    assert_eq!((image.width, image.height), (100, 50));
}
