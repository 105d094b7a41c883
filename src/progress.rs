//! Progress-callback trait for review events.
//!
//! Inject an [`Arc<dyn ReviewProgressCallback>`] via
//! [`crate::config::ReviewConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves through its stages and settles each check.
//!
//! # Example
//!
//! ```rust
//! use formreview::{Requirement, ReviewConfig, ReviewProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct FailureCounter {
//!     failed: AtomicUsize,
//! }
//!
//! impl ReviewProgressCallback for FailureCounter {
//!     fn on_check(&self, requirement: Requirement, satisfied: bool) {
//!         if !satisfied {
//!             self.failed.fetch_add(1, Ordering::SeqCst);
//!             eprintln!("{} missing", requirement.label());
//!         }
//!     }
//! }
//!
//! let counter = Arc::new(FailureCounter { failed: AtomicUsize::new(0) });
//! let config = ReviewConfig::builder()
//!     .progress_callback(counter as Arc<dyn ReviewProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::{Requirement, Verdict};
use std::fmt;
use std::sync::Arc;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStage {
    Render,
    DigitalText,
    Ocr,
    Extract,
    Arbitrate,
}

impl fmt::Display for ReviewStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReviewStage::Render => "rendering pages",
            ReviewStage::DigitalText => "reading digital text",
            ReviewStage::Ocr => "running OCR",
            ReviewStage::Extract => "checking requirements",
            ReviewStage::Arbitrate => "consulting judgment service",
        })
    }
}

/// Called by the review pipeline as it progresses.
///
/// All methods have default no-op implementations. OCR runs pages
/// concurrently, but events are only emitted from the orchestrating task.
pub trait ReviewProgressCallback: Send + Sync {
    /// Called once, before rendering.
    fn on_review_start(&self, input: &str) {
        let _ = input;
    }

    /// Called when the pipeline enters a stage.
    fn on_stage(&self, stage: ReviewStage) {
        let _ = stage;
    }

    /// Called once per requirement after extraction.
    fn on_check(&self, requirement: Requirement, satisfied: bool) {
        let _ = (requirement, satisfied);
    }

    /// Called once with the final verdict.
    fn on_review_complete(&self, verdict: Verdict, elapsed_ms: u64) {
        let _ = (verdict, elapsed_ms);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ReviewProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ReviewConfig`].
pub type ProgressCallback = Arc<dyn ReviewProgressCallback>;
