//! Review entry points: the orchestrator that runs every stage in order.
//!
//! A [`Reviewer`] owns the collaborators (rasterisers, digital extractor,
//! OCR engine registry, judgment service) and one base [`ReviewConfig`].
//! Build it once and call [`Reviewer::review`] per document; per-call
//! [`ReviewOverrides`] select the OCR device and toggle arbitration without
//! rebuilding anything.
//!
//! The free functions [`review`], [`review_from_bytes`] and [`review_sync`]
//! build a default `Reviewer` for one-off use.

use crate::config::{ReviewConfig, ReviewOverrides};
use crate::error::{OcrError, ReviewError};
use crate::output::{
    ArbitrationRecord, Evidence, EvidenceSet, Finding, Requirement, ReviewOutput, ReviewStats,
    SectionLength,
};
use crate::pipeline::digital::{DigitalExtractor, DigitalPage, PdfiumDigitalExtractor};
use crate::pipeline::extract::{detect_consent, detect_photo, detect_signature, extract_name, Page};
use crate::pipeline::judge::{judge_with_timeout, JudgmentService, LlmJudge};
use crate::pipeline::ocr::{http_factory, ocr_pages, EngineFactory, EngineRegistry};
use crate::pipeline::render::{default_chain, render_document, Rasterizer};
use crate::pipeline::{essay, input, verdict};
use crate::progress::ReviewStage;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Reviews application forms against the configured template.
pub struct Reviewer {
    config: ReviewConfig,
    rasterizers: Vec<Arc<dyn Rasterizer>>,
    digital: Arc<dyn DigitalExtractor>,
    engines: EngineRegistry,
    judge: Option<Arc<dyn JudgmentService>>,
}

impl std::fmt::Debug for Reviewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reviewer")
            .field("config", &self.config)
            .field(
                "rasterizers",
                &self.rasterizers.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .field("engines", &self.engines)
            .field("judge", &self.judge.as_ref().map(|_| "<dyn JudgmentService>"))
            .finish()
    }
}

impl Reviewer {
    /// Reviewer with the default collaborators: pdfium + `pdftoppm`
    /// rendering, pdfium digital text, HTTP OCR at `config.ocr_endpoint`, and
    /// an LLM judge resolved from the config and environment on first use.
    pub fn new(config: ReviewConfig) -> Self {
        let engines = EngineRegistry::new(http_factory(&config));
        Self {
            config,
            rasterizers: default_chain(),
            digital: Arc::new(PdfiumDigitalExtractor),
            engines,
            judge: None,
        }
    }

    /// Replace the rendering chain. Backends are tried in order.
    pub fn with_rasterizers(mut self, chain: Vec<Arc<dyn Rasterizer>>) -> Self {
        self.rasterizers = chain;
        self
    }

    pub fn with_digital_extractor(mut self, extractor: Arc<dyn DigitalExtractor>) -> Self {
        self.digital = extractor;
        self
    }

    /// Replace how OCR engines are built per device.
    pub fn with_engine_factory(mut self, factory: EngineFactory) -> Self {
        self.engines = EngineRegistry::new(factory);
        self
    }

    /// Use this judgment service instead of resolving an LLM provider.
    pub fn with_judge(mut self, judge: Arc<dyn JudgmentService>) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    /// Review the PDF at `input`.
    ///
    /// # Errors
    /// Only for unusable input (missing file, not a PDF) or when every
    /// rendering backend produced zero pages. Every other failure degrades
    /// to unsatisfied evidence inside the returned [`ReviewOutput`].
    pub async fn review(
        &self,
        input_str: impl AsRef<str>,
        overrides: ReviewOverrides,
    ) -> Result<ReviewOutput, ReviewError> {
        let input_str = input_str.as_ref();
        let resolved = input::resolve_path(input_str)?;
        self.review_path(resolved.path(), input_str, overrides).await
    }

    /// Review a PDF held in memory.
    pub async fn review_bytes(
        &self,
        bytes: &[u8],
        overrides: ReviewOverrides,
    ) -> Result<ReviewOutput, ReviewError> {
        let resolved = input::resolve_bytes(bytes)?;
        // `resolved` keeps the temp file alive until the review returns
        self.review_path(resolved.path(), "<bytes>", overrides).await
    }

    async fn review_path(
        &self,
        pdf_path: &Path,
        label: &str,
        overrides: ReviewOverrides,
    ) -> Result<ReviewOutput, ReviewError> {
        let total_start = Instant::now();
        let config = self.config.with_overrides(&overrides);
        let cb = config.progress_callback.clone();
        info!("Starting review: {}", label);
        if let Some(ref cb) = cb {
            cb.on_review_start(label);
        }

        // ── Step 1: Render ───────────────────────────────────────────────
        if let Some(ref cb) = cb {
            cb.on_stage(ReviewStage::Render);
        }
        let render_start = Instant::now();
        let rendered = render_document(pdf_path, config.dpi, &self.rasterizers).await?;
        let render_duration_ms = render_start.elapsed().as_millis() as u64;
        let total_pages = rendered.pages.len();

        // ── Step 2: Digital text ─────────────────────────────────────────
        if let Some(ref cb) = cb {
            cb.on_stage(ReviewStage::DigitalText);
        }
        let digital = self.extract_digital(pdf_path).await;

        // ── Step 3: OCR ──────────────────────────────────────────────────
        if let Some(ref cb) = cb {
            cb.on_stage(ReviewStage::Ocr);
        }
        let ocr_start = Instant::now();
        let engine = match self.engines.get(config.ocr_device) {
            Ok(engine) => Some(engine),
            Err(OcrError::NotConfigured) => {
                debug!("No OCR engine configured; relying on digital text");
                None
            }
            Err(e) => {
                warn!("OCR engine unavailable, continuing without OCR: {}", e);
                None
            }
        };
        let ocr = ocr_pages(engine, &rendered.pages, config.concurrency).await;
        let ocr_duration_ms = ocr_start.elapsed().as_millis() as u64;

        let mut digital = digital.into_iter();
        let pages: Vec<Page> = rendered
            .pages
            .into_iter()
            .zip(ocr)
            .enumerate()
            .map(|(index, (image, ocr))| Page {
                index,
                image,
                ocr,
                digital: digital.next().flatten(),
            })
            .collect();

        let stats_ocr_items: usize = pages.iter().map(|p| p.ocr.len()).sum();
        let digital_pages = pages
            .iter()
            .filter(|p| p.digital_text().is_some_and(|t| !t.trim().is_empty()))
            .count();

        // ── Step 4: Extract ──────────────────────────────────────────────
        if let Some(ref cb) = cb {
            cb.on_stage(ReviewStage::Extract);
        }
        let (applicant_name, evidence, sections) = evaluate(&pages, &config);

        if let Some(ref cb) = cb {
            for r in Requirement::ALL {
                cb.on_check(r, evidence.get(r).satisfied);
            }
        }

        let rule_pass = evidence.failing().is_empty();
        let seeded = verdict::seed_findings(&evidence, config.min_section_chars);

        // ── Step 5: Arbitrate ────────────────────────────────────────────
        let arbitration_start = Instant::now();
        let arbitration = if !rule_pass && config.arbitration {
            if let Some(ref cb) = cb {
                cb.on_stage(ReviewStage::Arbitrate);
            }
            self.arbitrate(&config, applicant_name.as_deref(), &evidence, &sections, &seeded)
                .await
        } else {
            None
        };
        let arbitration_duration_ms = arbitration_start.elapsed().as_millis() as u64;

        let decision = verdict::decide(rule_pass, seeded, arbitration.as_ref());

        let total_duration_ms = total_start.elapsed().as_millis() as u64;
        info!(
            "Review complete: {} ({} findings) in {}ms",
            decision.verdict,
            decision.findings.len(),
            total_duration_ms
        );
        if let Some(ref cb) = cb {
            cb.on_review_complete(decision.verdict, total_duration_ms);
        }

        let summary = summarize(rule_pass, applicant_name.as_deref(), &evidence, &sections);

        Ok(ReviewOutput {
            verdict: decision.verdict,
            findings: decision.findings,
            reason: decision.reason,
            rule_pass,
            applicant_name,
            evidence,
            sections,
            arbitration,
            stats: ReviewStats {
                total_pages,
                render_backend: rendered.backend.to_string(),
                ocr_items: stats_ocr_items,
                digital_pages,
                render_duration_ms,
                ocr_duration_ms,
                arbitration_duration_ms,
                total_duration_ms,
            },
            summary,
        })
    }

    /// Digital data per page. Any failure means "no digital data".
    async fn extract_digital(&self, pdf_path: &Path) -> Vec<Option<DigitalPage>> {
        let extractor = Arc::clone(&self.digital);
        let path = pdf_path.to_path_buf();

        match tokio::task::spawn_blocking(move || extractor.extract(&path)).await {
            Ok(Ok(pages)) => pages.into_iter().map(Some).collect(),
            Ok(Err(e)) => {
                warn!("Digital text unavailable, continuing with OCR only: {}", e);
                Vec::new()
            }
            Err(e) => {
                warn!("Digital text task panicked: {}", e);
                Vec::new()
            }
        }
    }

    /// Ask the judgment service. `None` means unavailable or malformed.
    async fn arbitrate(
        &self,
        config: &ReviewConfig,
        applicant_name: Option<&str>,
        evidence: &EvidenceSet,
        sections: &[SectionLength],
        seeded: &[Finding],
    ) -> Option<ArbitrationRecord> {
        let judge: Arc<dyn JudgmentService> = match self.judge {
            Some(ref j) => Arc::clone(j),
            None => match LlmJudge::from_config(config) {
                Ok(j) => Arc::new(j),
                Err(e) => {
                    warn!("Arbitration skipped: {}", e);
                    return None;
                }
            },
        };

        let payload =
            verdict::arbitration_payload(applicant_name, evidence, sections).to_string();
        match judge_with_timeout(judge.as_ref(), &payload, config.arbitration_timeout_secs).await
        {
            Ok(raw) => {
                let record = verdict::validate_reply(&raw, seeded);
                if record.is_none() {
                    warn!("Arbitration reply could not be parsed; using seeded findings");
                }
                record
            }
            Err(e) => {
                warn!("Arbitration unavailable, using seeded findings: {}", e);
                None
            }
        }
    }
}

/// Run every extractor against its template page.
fn evaluate(
    pages: &[Page],
    config: &ReviewConfig,
) -> (Option<String>, EvidenceSet, Vec<SectionLength>) {
    let tpl = &config.template;
    let name_page = pages.get(tpl.name_page);
    let essay_page = pages.get(tpl.essay_page);
    let consent_page = pages.get(tpl.consent_page);

    let (applicant_name, name) = extract_name(name_page);
    let photo = detect_photo(name_page, &tpl.photo_region, config.dpi);
    let (sections, essay_length) = essay::analyze(
        essay_page.and_then(Page::digital_text),
        essay_page.map_or(&[][..], |p| p.ocr.as_slice()),
        config.min_section_chars,
    );
    let consent = detect_consent(consent_page);
    let signature_page1 = detect_signature(name_page, applicant_name.as_deref(), config.scale());
    let signature_page3 =
        detect_signature(consent_page, applicant_name.as_deref(), config.scale());

    let evidence = EvidenceSet {
        name,
        photo,
        essay_length,
        consent,
        signature_page1,
        signature_page3,
    };
    (applicant_name, evidence, sections)
}

fn status_word(ev: &Evidence, ok: &str, missing: &str) -> String {
    let word = if ev.satisfied { ok } else { missing };
    match ev.method {
        Some(ref m) => format!("{word} ({m})"),
        None => word.to_string(),
    }
}

/// Multi-line human-readable summary of the rule evaluation.
fn summarize(
    rule_pass: bool,
    name: Option<&str>,
    evidence: &EvidenceSet,
    sections: &[SectionLength],
) -> String {
    let mut lines = vec![
        format!(
            "rule_pass: {} ({})",
            rule_pass,
            if rule_pass { "PASS" } else { "FAIL" }
        ),
        format!("name: {}", name.unwrap_or("not found")),
        format!(
            "photo: {} (score {:.4})",
            if evidence.photo.satisfied { "present" } else { "missing" },
            evidence.photo.score.unwrap_or(0.0)
        ),
        format!("consent: {}", status_word(&evidence.consent, "checked", "missing")),
        format!(
            "signature (p1): {}",
            status_word(&evidence.signature_page1, "present", "missing")
        ),
        format!(
            "signature (p3): {}",
            status_word(&evidence.signature_page3, "present", "missing")
        ),
        format!(
            "essay: {}",
            if evidence.essay_length.satisfied { "ok" } else { "too short" }
        ),
    ];
    if !sections.is_empty() {
        let counts: Vec<String> = sections.iter().map(|s| s.count.to_string()).collect();
        lines.push(format!("section lengths: {}", counts.join(", ")));
    }
    lines.join("\n")
}

// ── One-shot entry points ────────────────────────────────────────────────

/// Review a PDF file with a default [`Reviewer`].
///
/// # Example
/// ```rust,no_run
/// use formreview::{review, ReviewConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ReviewConfig::builder()
///     .ocr_endpoint("http://localhost:8868")
///     .build()?;
/// let output = review("application.pdf", &config).await?;
/// println!("{}: {:?}", output.verdict, output.findings);
/// # Ok(())
/// # }
/// ```
pub async fn review(
    input_str: impl AsRef<str>,
    config: &ReviewConfig,
) -> Result<ReviewOutput, ReviewError> {
    Reviewer::new(config.clone())
        .review(input_str, ReviewOverrides::default())
        .await
}

/// Review PDF bytes in memory with a default [`Reviewer`].
pub async fn review_from_bytes(
    bytes: &[u8],
    config: &ReviewConfig,
) -> Result<ReviewOutput, ReviewError> {
    Reviewer::new(config.clone())
        .review_bytes(bytes, ReviewOverrides::default())
        .await
}

/// Synchronous wrapper around [`review`].
///
/// Creates a temporary tokio runtime internally.
pub fn review_sync(
    input_str: impl AsRef<str>,
    config: &ReviewConfig,
) -> Result<ReviewOutput, ReviewError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ReviewError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(review(input_str, config))
}
