//! Integration tests for the review pipeline.
//!
//! Every external collaborator (rasteriser, digital extractor, OCR engine,
//! judgment service) is replaced by an in-process fake, so these run without
//! pdfium, an OCR server or LLM credentials.
//!
//! One test at the bottom runs against a real PDF and is gated behind the
//! `FORMREVIEW_SAMPLE_PDF` environment variable:
//!   FORMREVIEW_SAMPLE_PDF=./form.pdf cargo test --test review -- --nocapture

use formreview::{
    BoxPt, DigitalError, DigitalExtractor, DigitalPage, EngineFactory, JudgmentError,
    JudgmentService, OcrDevice, OcrEngine, OcrError, Rasterizer, RenderError, Requirement,
    ReviewConfig, ReviewError, ReviewOverrides, Reviewer, Verdict, Word,
};
use futures::future::BoxFuture;
use image::{Rgb, RgbImage};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const PDF: &[u8] = b"%PDF-1.4\n% synthetic\n";
const NAME: &str = "홍길동";

// ── Fakes ────────────────────────────────────────────────────────────────────

struct FixedRasterizer(Vec<RgbImage>);

impl Rasterizer for FixedRasterizer {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn rasterize(&self, _path: &Path, _dpi: u32) -> Result<Vec<RgbImage>, RenderError> {
        Ok(self.0.clone())
    }
}

struct BrokenRasterizer;

impl Rasterizer for BrokenRasterizer {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn rasterize(&self, _path: &Path, _dpi: u32) -> Result<Vec<RgbImage>, RenderError> {
        Err(RenderError::LoadFailed {
            backend: "broken".into(),
            detail: "corrupt xref".into(),
        })
    }
}

struct FakeDigital(Option<Vec<DigitalPage>>);

impl DigitalExtractor for FakeDigital {
    fn extract(&self, _path: &Path) -> Result<Vec<DigitalPage>, DigitalError> {
        self.0
            .clone()
            .ok_or_else(|| DigitalError::LoadFailed("no text layer".into()))
    }
}

/// Answers with the OCR lines registered for the page whose marker pixel
/// matches. Pages are told apart by the red channel of pixel (0, 0).
struct ScriptedOcr {
    device: OcrDevice,
    pages: Vec<Vec<String>>,
}

impl OcrEngine for ScriptedOcr {
    fn device(&self) -> OcrDevice {
        self.device
    }

    fn detect<'a>(&'a self, image: &'a RgbImage) -> BoxFuture<'a, Result<Value, OcrError>> {
        let idx = image.get_pixel(0, 0)[0] as usize;
        let lines: Vec<Value> = self
            .pages
            .get(idx)
            .map(|p| p.as_slice())
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let y = 40.0 * i as f64;
                json!({
                    "points": [[10.0, y], [400.0, y], [400.0, y + 30.0], [10.0, y + 30.0]],
                    "text": text,
                    "score": 0.97,
                })
            })
            .collect();
        Box::pin(async move { Ok(Value::Array(lines)) })
    }
}

fn ocr_factory(pages: Vec<Vec<String>>, devices: Arc<Mutex<Vec<OcrDevice>>>) -> EngineFactory {
    Arc::new(move |device| {
        devices.lock().unwrap().push(device);
        Ok(Arc::new(ScriptedOcr {
            device,
            pages: pages.clone(),
        }) as Arc<dyn OcrEngine>)
    })
}

fn no_ocr() -> EngineFactory {
    Arc::new(|_| Err(OcrError::NotConfigured))
}

struct CannedJudge {
    reply: String,
    calls: AtomicUsize,
    last_payload: Mutex<Option<Value>>,
}

impl CannedJudge {
    fn new(reply: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.into(),
            calls: AtomicUsize::new(0),
            last_payload: Mutex::new(None),
        })
    }
}

impl JudgmentService for CannedJudge {
    fn judge<'a>(&'a self, payload: &'a str) -> BoxFuture<'a, Result<String, JudgmentError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let parsed: Value = serde_json::from_str(payload).unwrap();
        assert!(parsed.get("details").is_some());
        assert!(parsed.get("section_counts").is_some());
        *self.last_payload.lock().unwrap() = Some(parsed);
        let reply = self.reply.clone();
        Box::pin(async move { Ok(reply) })
    }
}

struct SlowJudge;

impl JudgmentService for SlowJudge {
    fn judge<'a>(&'a self, _payload: &'a str) -> BoxFuture<'a, Result<String, JudgmentError>> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(r#"{"decision":"REJECT","findings":[],"reason":"late"}"#.to_string())
        })
    }
}

// ── Synthetic form ───────────────────────────────────────────────────────────

fn blank(index: u8) -> RgbImage {
    let mut img = RgbImage::from_pixel(1240, 1754, Rgb([255, 255, 255]));
    img.put_pixel(0, 0, Rgb([index, 255, 255]));
    img
}

/// Page 1 with a textured block inside the photo box (88..265 × 118..354 px at 150 dpi).
fn page_with_photo() -> RgbImage {
    let mut img = blank(0);
    for y in 118..354 {
        for x in 88..265 {
            let v = if (x / 4 + y / 4) % 2 == 0 { 0 } else { 255 };
            img.put_pixel(x, y, Rgb([v, v, v]));
        }
    }
    img
}

fn word(text: &str, x0: f32, top: f32) -> Word {
    Word {
        text: text.into(),
        bbox: BoxPt {
            x0,
            x1: x0 + 40.0,
            top,
            bottom: top + 12.0,
        },
    }
}

/// "성명 홍길동 <next>" near the bottom of the page.
fn signing_line(next: &str) -> Vec<Word> {
    vec![
        word("성명", 150.0, 700.0),
        word(NAME, 200.0, 700.0),
        word(next, 250.0, 701.0),
    ]
}

fn digital(text: &str, words: Vec<Word>) -> DigitalPage {
    DigitalPage {
        width: 595.0,
        height: 842.0,
        text: Some(text.to_string()),
        words: Some(words),
        images: Some(Vec::new()),
    }
}

fn essay_text(first: usize, second: usize) -> String {
    format!("1. {} 2. {}", "가".repeat(first), "나".repeat(second))
}

struct Form {
    images: Vec<RgbImage>,
    digital: Option<Vec<DigitalPage>>,
}

impl Form {
    /// A digitally filled form that satisfies every requirement.
    fn complete() -> Self {
        Self {
            images: vec![page_with_photo(), blank(1), blank(2)],
            digital: Some(vec![
                digital(&format!("지원서 성명 (한글) {NAME}"), signing_line(NAME)),
                digital(&essay_text(320, 310), Vec::new()),
                digital("개인정보 수집에 동의하십니까? (예)", signing_line(NAME)),
            ]),
        }
    }

    fn without_photo(mut self) -> Self {
        self.images[0] = blank(0);
        self
    }

    fn without_consent(mut self) -> Self {
        if let Some(ref mut pages) = self.digital {
            pages[2].text = Some("개인정보 수집에 동의하십니까? (아니오)".into());
        }
        self
    }

    fn reviewer(self, config: ReviewConfig) -> Reviewer {
        Reviewer::new(config)
            .with_rasterizers(vec![Arc::new(FixedRasterizer(self.images))])
            .with_digital_extractor(Arc::new(FakeDigital(self.digital)))
            .with_engine_factory(no_ocr())
    }
}

fn arbitrating() -> ReviewConfig {
    ReviewConfig::builder()
        .arbitration(true)
        .arbitration_timeout_secs(1)
        .build()
        .unwrap()
}

// ── Rule evaluation ──────────────────────────────────────────────────────────

#[tokio::test]
async fn complete_form_passes() {
    let judge = CannedJudge::new(r#"{"decision":"REJECT","findings":[]}"#);
    let reviewer = Form::complete()
        .reviewer(arbitrating())
        .with_judge(judge.clone());

    let out = reviewer
        .review_bytes(PDF, ReviewOverrides::default())
        .await
        .unwrap();

    assert_eq!(out.verdict, Verdict::Pass);
    assert_eq!(out.status(), "PASS");
    assert!(out.rule_pass);
    assert!(out.findings.is_empty());
    assert!(out.reason.is_none());
    assert_eq!(out.applicant_name.as_deref(), Some(NAME));
    assert_eq!(
        out.evidence.signature_page1.method.as_deref(),
        Some("Typed Signature: 홍길동")
    );
    assert_eq!(
        out.sections.iter().map(|s| s.count).collect::<Vec<_>>(),
        vec![321, 310]
    );
    assert_eq!(out.stats.total_pages, 3);
    assert_eq!(out.stats.render_backend, "fixed");
    assert_eq!(out.stats.digital_pages, 3);
    // a passing rule evaluation never reaches the judgment service
    assert_eq!(judge.calls.load(Ordering::SeqCst), 0);
    assert!(out.arbitration.is_none());
}

#[tokio::test]
async fn failing_checks_become_seeded_findings() {
    let reviewer = Form::complete()
        .without_photo()
        .without_consent()
        .reviewer(ReviewConfig::default());

    let out = reviewer
        .review_bytes(PDF, ReviewOverrides::default())
        .await
        .unwrap();

    assert_eq!(out.verdict, Verdict::NeedsFix);
    assert_eq!(out.status(), "FAIL");
    let labels: Vec<&str> = out.findings.iter().map(|f| f.label.as_str()).collect();
    assert_eq!(
        labels,
        vec![Requirement::Photo.label(), Requirement::Consent.label()]
    );
    assert!(out.evidence.name.satisfied);
    assert!(out.summary.contains("photo: missing"));
    assert!(out.summary.contains("consent: missing"));
}

#[tokio::test]
async fn short_essay_sections_fail() {
    let mut form = Form::complete();
    if let Some(ref mut pages) = form.digital {
        pages[1].text = Some(essay_text(320, 120));
    }
    let out = form
        .reviewer(ReviewConfig::default())
        .review_bytes(PDF, ReviewOverrides::default())
        .await
        .unwrap();

    assert_eq!(out.verdict, Verdict::NeedsFix);
    assert_eq!(out.findings.len(), 1);
    assert_eq!(out.findings[0].label, "essay length");
    assert!(out.findings[0].message.contains("300"));
    assert!(!out.sections[1].satisfied);
}

#[tokio::test]
async fn placeholder_after_name_is_not_a_signature() {
    let mut form = Form::complete();
    if let Some(ref mut pages) = form.digital {
        pages[2].words = Some(signing_line("(서명)"));
    }
    let out = form
        .reviewer(ReviewConfig::default())
        .review_bytes(PDF, ReviewOverrides::default())
        .await
        .unwrap();

    assert!(out.evidence.signature_page1.satisfied);
    assert!(!out.evidence.signature_page3.satisfied);
    assert_eq!(
        out.evidence.signature_page3.method.as_deref(),
        Some("Trap Text: (서명)")
    );
    assert_eq!(out.findings[0].label, "signature (p3)");
}

#[tokio::test]
async fn missing_name_fails_both_signatures() {
    let mut form = Form::complete();
    if let Some(ref mut pages) = form.digital {
        pages[0].text = Some("지원서".into());
    }
    let out = form
        .reviewer(ReviewConfig::default())
        .review_bytes(PDF, ReviewOverrides::default())
        .await
        .unwrap();

    assert!(out.applicant_name.is_none());
    let labels: Vec<&str> = out.findings.iter().map(|f| f.label.as_str()).collect();
    assert_eq!(labels, vec!["name", "signature (p1)", "signature (p3)"]);
}

#[tokio::test]
async fn two_page_document_fails_page_three_checks() {
    let mut form = Form::complete();
    form.images.truncate(2);
    let out = form
        .reviewer(ReviewConfig::default())
        .review_bytes(PDF, ReviewOverrides::default())
        .await
        .unwrap();

    assert_eq!(out.stats.total_pages, 2);
    let labels: Vec<&str> = out.findings.iter().map(|f| f.label.as_str()).collect();
    assert_eq!(labels, vec!["consent", "signature (p3)"]);
}

// ── Scanned forms (OCR only) ─────────────────────────────────────────────────

fn scanned_ocr() -> Vec<Vec<String>> {
    let page = |lines: &[&str]| lines.iter().map(|l| l.to_string()).collect::<Vec<_>>();
    vec![
        page(&["입학 지원서", "성명 홍길동", "신청인 홍길동"]),
        page(&["자기소개서", &essay_text(305, 330)]),
        page(&["동의하십니까? (예)", "신청인", "홍길동"]),
    ]
}

#[tokio::test]
async fn scanned_form_passes_on_ocr_alone() {
    let devices = Arc::new(Mutex::new(Vec::new()));
    let reviewer = Reviewer::new(ReviewConfig::default())
        .with_rasterizers(vec![Arc::new(FixedRasterizer(vec![
            page_with_photo(),
            blank(1),
            blank(2),
        ]))])
        // digital extraction failing is absorbed, not an error
        .with_digital_extractor(Arc::new(FakeDigital(None)))
        .with_engine_factory(ocr_factory(scanned_ocr(), devices.clone()));

    let out = reviewer
        .review_bytes(PDF, ReviewOverrides::default())
        .await
        .unwrap();

    assert_eq!(out.verdict, Verdict::Pass, "{}", out.summary);
    assert_eq!(out.evidence.name.method.as_deref(), Some("OCR Text Match"));
    assert_eq!(out.evidence.consent.method.as_deref(), Some("OCR Text Match"));
    assert_eq!(out.evidence.essay_length.method.as_deref(), Some("OCR Text"));
    assert_eq!(
        out.evidence.signature_page3.method.as_deref(),
        Some("OCR proximity")
    );
    assert_eq!(out.stats.digital_pages, 0);
    assert_eq!(out.stats.ocr_items, 8);
    assert_eq!(*devices.lock().unwrap(), vec![OcrDevice::Cpu]);
}

#[tokio::test]
async fn device_override_builds_one_engine_per_device() {
    let devices = Arc::new(Mutex::new(Vec::new()));
    let reviewer = Reviewer::new(ReviewConfig::default())
        .with_rasterizers(vec![Arc::new(FixedRasterizer(vec![
            page_with_photo(),
            blank(1),
            blank(2),
        ]))])
        .with_digital_extractor(Arc::new(FakeDigital(None)))
        .with_engine_factory(ocr_factory(scanned_ocr(), devices.clone()));

    let gpu = ReviewOverrides {
        ocr_device: Some(OcrDevice::Gpu),
        ..Default::default()
    };
    for _ in 0..2 {
        let out = reviewer.review_bytes(PDF, gpu).await.unwrap();
        assert_eq!(out.verdict, Verdict::Pass);
    }
    reviewer
        .review_bytes(PDF, ReviewOverrides::default())
        .await
        .unwrap();

    assert_eq!(
        *devices.lock().unwrap(),
        vec![OcrDevice::Gpu, OcrDevice::Cpu]
    );
}

// ── Arbitration ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn arbiter_can_reject_with_reason() {
    let judge = CannedJudge::new(
        "Here is my assessment:\n```json\n{\"decision\": \"REJECT\", \
         \"findings\": [{\"label\": \"photo\", \"message\": \"No photo was attached.\"}], \
         \"reason\": \"Application is incomplete beyond repair.\"}\n```",
    );
    let out = Form::complete()
        .without_photo()
        .reviewer(arbitrating())
        .with_judge(judge.clone())
        .review_bytes(PDF, ReviewOverrides::default())
        .await
        .unwrap();

    assert_eq!(judge.calls.load(Ordering::SeqCst), 1);
    let payload = judge.last_payload.lock().unwrap().clone().unwrap();
    assert_eq!(payload["details"]["applicant_name"], json!(NAME));
    assert_eq!(payload["details"]["photo"]["satisfied"], json!(false));
    assert_eq!(out.verdict, Verdict::Reject);
    assert_eq!(
        out.reason.as_deref(),
        Some("Application is incomplete beyond repair.")
    );
    assert_eq!(out.findings.len(), 1);
    assert_eq!(out.findings[0].message, "No photo was attached.");
    assert_eq!(out.arbitration.unwrap().decision, Verdict::Reject);
}

#[tokio::test]
async fn arbiter_pass_is_downgraded() {
    let judge = CannedJudge::new(r#"{"decision":"PASS","findings":[],"reason":"looks fine"}"#);
    let out = Form::complete()
        .without_consent()
        .reviewer(arbitrating())
        .with_judge(judge)
        .review_bytes(PDF, ReviewOverrides::default())
        .await
        .unwrap();

    assert_eq!(out.verdict, Verdict::NeedsFix);
    assert!(out.reason.is_none());
    // empty findings in the reply fall back to the seeded list
    assert_eq!(out.findings[0].label, "consent");
    // the raw decision is kept for audit
    assert_eq!(out.arbitration.unwrap().decision, Verdict::Pass);
}

#[tokio::test]
async fn malformed_reply_uses_seeded_findings() {
    let judge = CannedJudge::new("I cannot evaluate this form.");
    let out = Form::complete()
        .without_photo()
        .reviewer(arbitrating())
        .with_judge(judge)
        .review_bytes(PDF, ReviewOverrides::default())
        .await
        .unwrap();

    assert_eq!(out.verdict, Verdict::NeedsFix);
    assert_eq!(out.findings[0].label, "photo");
    assert!(out.arbitration.is_none());
}

#[tokio::test]
async fn slow_arbiter_times_out_to_needs_fix() {
    let out = Form::complete()
        .without_photo()
        .reviewer(arbitrating())
        .with_judge(Arc::new(SlowJudge))
        .review_bytes(PDF, ReviewOverrides::default())
        .await
        .unwrap();

    assert_eq!(out.verdict, Verdict::NeedsFix);
    assert!(out.reason.is_none());
    assert!(out.stats.arbitration_duration_ms < 5_000);
}

#[tokio::test]
async fn arbitration_can_be_disabled_per_call() {
    let judge = CannedJudge::new(r#"{"decision":"REJECT","findings":[]}"#);
    let reviewer = Form::complete()
        .without_photo()
        .reviewer(arbitrating())
        .with_judge(judge.clone());

    let off = ReviewOverrides {
        arbitration: Some(false),
        ..Default::default()
    };
    let out = reviewer.review_bytes(PDF, off).await.unwrap();

    assert_eq!(out.verdict, Verdict::NeedsFix);
    assert_eq!(judge.calls.load(Ordering::SeqCst), 0);
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn render_failure_is_an_error() {
    let reviewer = Reviewer::new(ReviewConfig::default())
        .with_rasterizers(vec![
            Arc::new(BrokenRasterizer),
            Arc::new(FixedRasterizer(Vec::new())),
        ])
        .with_engine_factory(no_ocr());

    match reviewer.review_bytes(PDF, ReviewOverrides::default()).await {
        Err(ReviewError::RenderFailed { attempts, .. }) => {
            assert_eq!(attempts.len(), 2);
            assert!(attempts[0].contains("broken"));
            assert!(attempts[1].contains("fixed"));
        }
        other => panic!("expected RenderFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn fallback_rasterizer_is_used() {
    let form = Form::complete();
    let reviewer = Reviewer::new(ReviewConfig::default())
        .with_rasterizers(vec![
            Arc::new(BrokenRasterizer),
            Arc::new(FixedRasterizer(form.images)),
        ])
        .with_digital_extractor(Arc::new(FakeDigital(form.digital)))
        .with_engine_factory(no_ocr());

    let out = reviewer
        .review_bytes(PDF, ReviewOverrides::default())
        .await
        .unwrap();
    assert_eq!(out.stats.render_backend, "fixed");
    assert_eq!(out.verdict, Verdict::Pass);
}

#[tokio::test]
async fn non_pdf_input_is_rejected() {
    let reviewer = Form::complete().reviewer(ReviewConfig::default());
    assert!(matches!(
        reviewer
            .review_bytes(b"GIF89a", ReviewOverrides::default())
            .await,
        Err(ReviewError::NotAPdf { .. })
    ));
    assert!(matches!(
        reviewer
            .review("/no/such/form.pdf", ReviewOverrides::default())
            .await,
        Err(ReviewError::FileNotFound { .. })
    ));
}

// ── Real PDF (opt-in) ────────────────────────────────────────────────────────

#[tokio::test]
async fn sample_pdf_end_to_end() {
    let Ok(path) = std::env::var("FORMREVIEW_SAMPLE_PDF") else {
        println!("SKIP: set FORMREVIEW_SAMPLE_PDF=<file> to run");
        return;
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter("formreview=debug")
        .with_test_writer()
        .try_init();

    let mut builder = ReviewConfig::builder();
    if let Ok(url) = std::env::var("FORMREVIEW_OCR_ENDPOINT") {
        builder = builder.ocr_endpoint(url);
    }
    let config = builder.build().unwrap();

    let out = formreview::review(&path, &config).await.unwrap();
    println!("{}", out.summary);
    println!("{}", serde_json::to_string_pretty(&out).unwrap());
    assert_eq!(out.verdict == Verdict::Pass, out.findings.is_empty());
}
