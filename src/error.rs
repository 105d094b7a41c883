//! Error types for the formreview library.
//!
//! Two tiers reflect two distinct failure modes:
//!
//! * [`ReviewError`] (**fatal**): the review cannot proceed at all (bad input
//!   file, not a PDF, no rendering backend produced a single page). Returned
//!   as `Err(ReviewError)` from the top-level `review*` functions.
//!
//! * Collaborator errors ([`RenderError`], [`DigitalError`], [`OcrError`],
//!   [`JudgmentError`], **non-fatal**): one external collaborator failed for
//!   one page or one call. They are logged and turned into absence of
//!   evidence; the caller still receives a complete
//!   [`crate::output::ReviewOutput`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the formreview library.
#[derive(Debug, Error)]
pub enum ReviewError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is empty or otherwise unusable as a path.
    #[error("Invalid input '{input}': not a readable file path")]
    InvalidInput { input: String },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Rendering ─────────────────────────────────────────────────────────
    /// Every rasterisation backend failed or produced zero pages.
    #[error("PDF rendering failed for '{path}': {}", attempts.join("; "))]
    RenderFailed { path: PathBuf, attempts: Vec<String> },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (task join failure, tempfile I/O).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// One rasterisation backend failed. The next backend in the chain is tried.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    /// The backend could not be initialised (library or executable missing).
    #[error("{backend}: unavailable: {detail}")]
    Unavailable { backend: String, detail: String },

    /// The document could not be opened by this backend.
    #[error("{backend}: cannot open document: {detail}")]
    LoadFailed { backend: String, detail: String },

    /// A single page failed to render.
    #[error("{backend}: page {page} failed: {detail}")]
    PageFailed {
        backend: String,
        page: usize,
        detail: String,
    },
}

/// Digital text / layout extraction failed. Treated as "no digital data".
#[derive(Debug, Clone, Error)]
pub enum DigitalError {
    #[error("pdfium unavailable: {0}")]
    Unavailable(String),

    #[error("cannot open document: {0}")]
    LoadFailed(String),
}

/// The OCR engine failed for one page, or could not be built.
#[derive(Debug, Clone, Error)]
pub enum OcrError {
    /// No engine endpoint is configured.
    #[error("no OCR engine configured")]
    NotConfigured,

    /// The engine could not be constructed for the requested device.
    #[error("OCR engine init failed for device '{device}': {detail}")]
    InitFailed { device: String, detail: String },

    /// Page image could not be encoded for the request.
    #[error("page {page}: image encoding failed: {detail}")]
    Encode { page: usize, detail: String },

    /// Transport or HTTP-level failure.
    #[error("OCR request failed: {0}")]
    Request(String),

    /// The engine did not answer in time.
    #[error("OCR request timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// The judgment service could not produce a reply.
#[derive(Debug, Clone, Error)]
pub enum JudgmentError {
    /// No provider could be resolved from config or environment.
    #[error("judgment provider '{provider}' is not configured: {hint}")]
    NotConfigured { provider: String, hint: String },

    /// Provider call failed after retries.
    #[error("judgment call failed after {retries} retries: {detail}")]
    CallFailed { retries: u32, detail: String },

    /// Bounded timeout expired.
    #[error("judgment call timed out after {secs}s")]
    Timeout { secs: u64 },
}
