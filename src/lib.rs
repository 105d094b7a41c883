//! # formreview
//!
//! Automated compliance review of scanned application forms.
//!
//! A submitted form is a three-page PDF: page 1 carries the applicant's
//! name, a pasted photo and a signature; page 2 holds numbered essay
//! answers; page 3 has a consent checkbox and a second signature. Forms
//! arrive as pure scans, as digitally filled PDFs, or as a mix of both, so
//! every check looks at the PDF's own text objects first, falls back to OCR,
//! and finally to pixel statistics.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    validate path / spill bytes to a temp file
//!  ├─ 2. Render   pdfium, falling back to pdftoppm (spawn_blocking)
//!  ├─ 3. Digital  text, words and embedded-image boxes via pdfium
//!  ├─ 4. OCR      per-device HTTP engine, concurrent pages, normalised items
//!  ├─ 5. Extract  name · photo · essay · consent · signature p1 · signature p3
//!  ├─ 6. Verdict  rule fusion → PASS, or seeded findings
//!  └─ 7. Judge    optional LLM arbitration: NEEDS_FIX or REJECT
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use formreview::{review, ReviewConfig, Verdict};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ReviewConfig::builder()
//!         .ocr_endpoint("http://localhost:8868")
//!         .build()?;
//!     let output = review("application.pdf", &config).await?;
//!     if output.verdict != Verdict::Pass {
//!         for f in &output.findings {
//!             eprintln!("{}: {}", f.label, f.message);
//!         }
//!     }
//!     println!("{}", output.summary);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `formreview` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! formreview = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod review;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    FormTemplate, OcrDevice, RegionMm, ReviewConfig, ReviewConfigBuilder, ReviewOverrides,
};
pub use error::{DigitalError, JudgmentError, OcrError, RenderError, ReviewError};
pub use output::{
    ArbitrationRecord, Evidence, EvidenceSet, Finding, Requirement, ReviewOutput, ReviewStats,
    SectionLength, Verdict,
};
pub use pipeline::digital::{BoxPt, DigitalExtractor, DigitalPage, Word};
pub use pipeline::judge::JudgmentService;
pub use pipeline::normalize::OcrItem;
pub use pipeline::ocr::{EngineFactory, OcrEngine};
pub use pipeline::render::Rasterizer;
pub use progress::{NoopProgressCallback, ProgressCallback, ReviewProgressCallback, ReviewStage};
pub use review::{review, review_from_bytes, review_sync, Reviewer};
