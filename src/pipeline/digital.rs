//! Digital text and layout extraction from the PDF's own text objects.
//!
//! A filled-in form is often a hybrid: typed fields carry real text objects,
//! the rest is a scan. Where text objects exist they beat OCR, so extractors
//! consult this layer first.
//!
//! Coordinates are PDF points with a **top-left** origin (pdfium reports
//! bottom-left; [`PdfiumDigitalExtractor`] flips them), so `top < bottom`.
//!
//! Failure policy: this collaborator never breaks a review. A page whose text
//! or objects cannot be read gets `None` for that part; a document that cannot
//! be opened at all yields pages with no digital data.

use crate::error::DigitalError;
use crate::pipeline::render::bind_pdfium;
use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Horizontal gap (pt) above which two characters belong to different words.
pub const WORD_X_TOLERANCE: f32 = 2.0;
/// Vertical offset (pt) above which two characters sit on different lines.
pub const WORD_Y_TOLERANCE: f32 = 3.0;

/// An axis-aligned box in points, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxPt {
    pub x0: f32,
    pub x1: f32,
    pub top: f32,
    pub bottom: f32,
}

/// A whitespace-delimited word with its position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub bbox: BoxPt,
}

/// Digital content of one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DigitalPage {
    pub width: f32,
    pub height: f32,
    pub text: Option<String>,
    pub words: Option<Vec<Word>>,
    /// Bounding boxes of embedded raster images.
    pub images: Option<Vec<BoxPt>>,
}

/// Source of digital text and layout.
pub trait DigitalExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Vec<DigitalPage>, DigitalError>;
}

/// pdfium-backed extractor.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumDigitalExtractor;

impl DigitalExtractor for PdfiumDigitalExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<DigitalPage>, DigitalError> {
        let pdfium = bind_pdfium().map_err(DigitalError::Unavailable)?;
        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| DigitalError::LoadFailed(format!("{e:?}")))?;

        let mut pages = Vec::new();
        for (idx, page) in document.pages().iter().enumerate() {
            let width = page.width().value;
            let height = page.height().value;

            let (text, words) = match page.text() {
                Ok(text) => {
                    let chars: Vec<(char, BoxPt)> = text
                        .chars()
                        .iter()
                        .filter_map(|c| {
                            let ch = c.unicode_char()?;
                            let r = c.loose_bounds().ok()?;
                            Some((
                                ch,
                                BoxPt {
                                    x0: r.left().value,
                                    x1: r.right().value,
                                    top: height - r.top().value,
                                    bottom: height - r.bottom().value,
                                },
                            ))
                        })
                        .collect();
                    (
                        Some(text.all()),
                        Some(group_words(&chars, WORD_X_TOLERANCE, WORD_Y_TOLERANCE)),
                    )
                }
                Err(e) => {
                    warn!("Page {}: digital text unavailable: {:?}", idx + 1, e);
                    (None, None)
                }
            };

            let images: Vec<BoxPt> = page
                .objects()
                .iter()
                .filter(|o| o.object_type() == PdfPageObjectType::Image)
                .filter_map(|o| o.bounds().ok())
                .map(|b| BoxPt {
                    x0: b.left().value,
                    x1: b.right().value,
                    top: height - b.top().value,
                    bottom: height - b.bottom().value,
                })
                .collect();

            debug!(
                "Page {}: {} words, {} embedded images",
                idx + 1,
                words.as_ref().map_or(0, Vec::len),
                images.len()
            );

            pages.push(DigitalPage {
                width,
                height,
                text,
                words,
                images: Some(images),
            });
        }

        Ok(pages)
    }
}

/// Group positioned characters into words.
///
/// A word ends at whitespace, at a horizontal gap wider than `x_tol`, or when
/// the next character's top edge moves by more than `y_tol`.
pub fn group_words(chars: &[(char, BoxPt)], x_tol: f32, y_tol: f32) -> Vec<Word> {
    let mut words = Vec::new();
    let mut current: Option<Word> = None;

    for &(ch, b) in chars {
        if ch.is_whitespace() {
            words.extend(current.take());
            continue;
        }

        match current.as_mut() {
            Some(w)
                if (b.top - w.bbox.top).abs() <= y_tol && b.x0 - w.bbox.x1 <= x_tol =>
            {
                w.text.push(ch);
                w.bbox.x0 = w.bbox.x0.min(b.x0);
                w.bbox.x1 = w.bbox.x1.max(b.x1);
                w.bbox.top = w.bbox.top.min(b.top);
                w.bbox.bottom = w.bbox.bottom.max(b.bottom);
            }
            _ => {
                words.extend(current.take());
                current = Some(Word {
                    text: ch.to_string(),
                    bbox: b,
                });
            }
        }
    }

    words.extend(current);
    words
}
