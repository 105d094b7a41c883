//! Pipeline stages for reviewing a scanned application form.
//!
//! Each submodule implements one step. Collaborators that touch the outside
//! world (rendering, digital text, OCR, the judgment service) sit behind a
//! trait so the orchestrator can be exercised with fakes.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ digital ──▶ ocr ──▶ extract ──▶ essay ──▶ verdict ◀── judge
//! (path)   (pixels)   (text/     (items)  (name,      (section  (rules +   (LLM,
//!                      words)              photo,      lengths)  findings)  optional)
//!                                          consent,
//!                                          signature)
//! ```
//!
//! 1. [`input`]     validate a path or spill bytes to a temp file
//! 2. [`render`]    rasterise every page; pdfium first, `pdftoppm` as fallback
//! 3. [`digital`]   text, words and embedded-image boxes from the PDF itself
//! 4. [`ocr`]       per-device engines; raw detections pass through [`normalize`]
//! 5. [`extract`]   hybrid extractors, each an ordered [`cascade`] of strategies
//!    scored by [`score`] where pixels are involved
//! 6. [`essay`]     numbered-section lengths
//! 7. [`verdict`]   rule fusion, seeded findings, reply validation
//! 8. [`judge`]     optional arbitration, the only stage with LLM network I/O

pub mod cascade;
pub mod digital;
pub mod essay;
pub mod extract;
pub mod input;
pub mod judge;
pub mod normalize;
pub mod ocr;
pub mod render;
pub mod score;
pub mod verdict;
