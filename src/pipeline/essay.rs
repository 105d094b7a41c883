//! Essay section analysis.
//!
//! The essay page asks numbered questions (`1.`, `2.`, ...). Each answer must
//! reach a minimum length. Text before the first marker is preamble and is
//! not a section.

use crate::output::{Evidence, SectionLength};
use crate::pipeline::normalize::{joined_text, OcrItem};
use once_cell::sync::Lazy;
use regex::Regex;

static SECTION_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\.\s*").unwrap());

/// Character length of each numbered section, in source order.
///
/// Lengths count Unicode scalar values, so Hangul syllables count as one.
pub fn split_sections(text: &str) -> Vec<usize> {
    SECTION_MARKER
        .split(text)
        .skip(1)
        .map(|s| s.chars().count())
        .collect()
}

/// Measure the essay sections of one page.
///
/// Digital text is split first; only when it yields no sections is the OCR
/// text (items joined with a space) split instead.
pub fn analyze(
    digital_text: Option<&str>,
    ocr: &[OcrItem],
    min_chars: usize,
) -> (Vec<SectionLength>, Evidence) {
    let (counts, method) = match digital_text.map(split_sections) {
        Some(counts) if !counts.is_empty() => (counts, "Digital Text"),
        _ => (split_sections(&joined_text(ocr, " ")), "OCR Text"),
    };

    let sections: Vec<SectionLength> = counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| SectionLength {
            label: format!("section {}", i + 1),
            count,
            satisfied: count >= min_chars,
        })
        .collect();

    let satisfied = !sections.is_empty() && sections.iter().all(|s| s.satisfied);
    let evidence = if sections.is_empty() {
        Evidence::missing()
    } else {
        Evidence {
            satisfied,
            method: Some(method.to_string()),
            score: None,
        }
    };

    (sections, evidence)
}
