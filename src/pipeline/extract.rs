//! Hybrid field extractors over rendered pages.
//!
//! Each extractor is a total function: a missing page, missing digital data
//! or an empty OCR list degrades to a not-satisfied [`Evidence`], never an
//! error. Precedence between evidence sources is declared as a
//! [`Strategy`] slice per extractor and run by [`cascade::run`].

use crate::config::RegionMm;
use crate::output::Evidence;
use crate::pipeline::cascade::{self, Attempt, Strategy};
use crate::pipeline::digital::{BoxPt, DigitalPage, Word};
use crate::pipeline::normalize::{joined_text, OcrItem};
use crate::pipeline::score::{
    crop_clipped, photo_score, signature_score, PHOTO_THRESHOLD, SIGNATURE_THRESHOLD,
};
use image::RgbImage;
use once_cell::sync::Lazy;
use regex::Regex;

/// One rendered page with everything known about it.
#[derive(Debug, Clone)]
pub struct Page {
    /// 0-based page index.
    pub index: usize,
    pub image: RgbImage,
    pub ocr: Vec<OcrItem>,
    pub digital: Option<DigitalPage>,
}

impl Page {
    pub fn digital_text(&self) -> Option<&str> {
        self.digital.as_ref()?.text.as_deref()
    }
}

// ── Name ─────────────────────────────────────────────────────────────────

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"성\s*명\s*(?:\(한글\))?\s*([가-힣]{2,5})").unwrap());

const NAME_STRATEGIES: [Strategy<Page, String>; 2] = [
    Strategy {
        name: "Digital Text Match",
        run: name_from_digital,
    },
    Strategy {
        name: "OCR Text Match",
        run: name_from_ocr,
    },
];

fn match_name(text: &str) -> Attempt<String> {
    match NAME_PATTERN.captures(text).and_then(|c| c.get(1)) {
        Some(m) => Attempt::Hit(m.as_str().to_string()),
        None => Attempt::Miss,
    }
}

fn name_from_digital(page: &Page) -> Attempt<String> {
    page.digital_text().map_or(Attempt::Miss, match_name)
}

fn name_from_ocr(page: &Page) -> Attempt<String> {
    match_name(&joined_text(&page.ocr, " "))
}

/// Find the applicant's name: a "성명" label followed by 2–5 Hangul syllables.
pub fn extract_name(page: Option<&Page>) -> (Option<String>, Evidence) {
    let resolved = page.and_then(|p| cascade::run("name", &NAME_STRATEGIES, p));
    match resolved {
        Some(r) => (Some(r.value), Evidence::satisfied(r.strategy)),
        None => (None, Evidence::missing()),
    }
}

// ── Consent ──────────────────────────────────────────────────────────────

static CONSENT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"동의하십니까\?\s*\(\s*예\s*\)").unwrap());

const CONSENT_STRATEGIES: [Strategy<Page, ()>; 2] = [
    Strategy {
        name: "Digital Text Match",
        run: consent_from_digital,
    },
    Strategy {
        name: "OCR Text Match",
        run: consent_from_ocr,
    },
];

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

fn match_consent(text: &str) -> Attempt<()> {
    if CONSENT_PATTERN.is_match(&strip_whitespace(text)) {
        Attempt::Hit(())
    } else {
        Attempt::Miss
    }
}

fn consent_from_digital(page: &Page) -> Attempt<()> {
    page.digital_text().map_or(Attempt::Miss, match_consent)
}

fn consent_from_ocr(page: &Page) -> Attempt<()> {
    match_consent(&joined_text(&page.ocr, ""))
}

/// Detect the checked "동의하십니까? (예)" consent box.
pub fn detect_consent(page: Option<&Page>) -> Evidence {
    page.and_then(|p| cascade::run("consent", &CONSENT_STRATEGIES, p))
        .map_or_else(Evidence::missing, |r| Evidence::satisfied(r.strategy))
}

// ── Photo ────────────────────────────────────────────────────────────────

/// Score the fixed photo box of the template.
pub fn detect_photo(page: Option<&Page>, region: &RegionMm, dpi: u32) -> Evidence {
    let Some(page) = page else {
        return Evidence::missing();
    };

    let (x1, y1, x2, y2) = region.to_pixels(dpi);
    let Some(crop) = crop_clipped(&page.image, x1 as i64, y1 as i64, x2 as i64, y2 as i64) else {
        return Evidence::missing().with_method("Empty Region");
    };

    let score = photo_score(&crop);
    Evidence {
        satisfied: score > PHOTO_THRESHOLD,
        method: Some("Fixed Region".into()),
        score: Some(score),
    }
}

// ── Signature ────────────────────────────────────────────────────────────

/// Words meaning "(seal)" / "(signature)": an unfilled template slot.
pub const PLACEHOLDER_TOKENS: [&str; 2] = ["(인)", "(서명)"];

/// Labels that introduce the signing line.
const LABEL_WORDS: [&str; 2] = ["성명", "서명"];
/// Labels accepted near the name in OCR text.
const OCR_ANCHOR_WORDS: [&str; 3] = ["성명", "서명", "신청인"];

/// The signing line sits in the bottom 40 % of the page.
const SIGNATURE_ZONE_START: f32 = 0.6;
/// How many words before the name may hold the label.
const LABEL_LOOKBACK: usize = 3;
/// Max vertical offset (pt) for the next word to count as the same line.
const LINE_TOLERANCE: f32 = 5.0;
/// Width (pt) of the window right of the name searched for an embedded image.
const IMAGE_WINDOW: f32 = 150.0;
const ROI_WIDTH_PX: i64 = 250;
const ROI_MARGIN_PX: i64 = 20;

/// The applicant's name on the signing line, and the word after it.
#[derive(Debug, Clone, Copy)]
struct Anchor<'a> {
    word: &'a Word,
    /// Text of the following word, only when it sits on the same line.
    next: Option<&'a str>,
}

struct SignatureContext<'a> {
    page: &'a Page,
    name: &'a str,
    scale: f32,
    anchor: Option<Anchor<'a>>,
    images: Vec<&'a BoxPt>,
}

impl<'a> SignatureContext<'a> {
    fn new(page: &'a Page, name: &'a str, scale: f32) -> Self {
        let (anchor, images) = match page.digital.as_ref() {
            Some(d) => {
                let zone_top = d.height * SIGNATURE_ZONE_START;
                let words: Vec<&Word> = d
                    .words
                    .iter()
                    .flatten()
                    .filter(|w| w.bbox.bottom > zone_top)
                    .collect();
                let images: Vec<&BoxPt> = d
                    .images
                    .iter()
                    .flatten()
                    .filter(|b| b.bottom > zone_top)
                    .collect();
                (find_anchor(&words, name), images)
            }
            None => (None, Vec::new()),
        };

        Self {
            page,
            name,
            scale,
            anchor,
            images,
        }
    }
}

/// First word containing `name` with a label among it and the preceding words.
fn find_anchor<'a>(words: &[&'a Word], name: &str) -> Option<Anchor<'a>> {
    let i = (0..words.len()).find(|&i| {
        if !words[i].text.contains(name) {
            return false;
        }
        let context: String = words[i.saturating_sub(LABEL_LOOKBACK)..=i]
            .iter()
            .map(|w| w.text.as_str())
            .collect();
        LABEL_WORDS.iter().any(|l| context.contains(l))
    })?;

    let word = words[i];
    let next = words
        .get(i + 1)
        .filter(|n| (n.bbox.top - word.bbox.top).abs() < LINE_TOLERANCE)
        .map(|n| n.text.as_str());

    Some(Anchor { word, next })
}

fn is_placeholder(text: &str) -> bool {
    PLACEHOLDER_TOKENS.contains(&text)
}

fn typed_signature(ctx: &SignatureContext<'_>) -> Attempt<Evidence> {
    match ctx.anchor.and_then(|a| a.next) {
        Some(next) if !next.is_empty() && !is_placeholder(next) => {
            Attempt::Hit(Evidence::satisfied(format!("Typed Signature: {next}")))
        }
        _ => Attempt::Miss,
    }
}

fn embedded_image(ctx: &SignatureContext<'_>) -> Attempt<Evidence> {
    let Some(anchor) = ctx.anchor else {
        return Attempt::Miss;
    };
    let a = anchor.word.bbox;
    let overlaps = ctx.images.iter().any(|img| {
        img.x0 < a.x1 + IMAGE_WINDOW && img.x1 > a.x1 && img.top < a.bottom && img.bottom > a.top
    });
    if overlaps {
        Attempt::Hit(Evidence::satisfied("PDF Embedded Image"))
    } else {
        Attempt::Miss
    }
}

fn placeholder_trap(ctx: &SignatureContext<'_>) -> Attempt<Evidence> {
    match ctx.anchor.and_then(|a| a.next) {
        Some(next) if is_placeholder(next) => {
            Attempt::Veto(Evidence::missing().with_method(format!("Trap Text: {next}")))
        }
        _ => Attempt::Miss,
    }
}

fn visual_stroke(ctx: &SignatureContext<'_>) -> Attempt<Evidence> {
    let Some(anchor) = ctx.anchor else {
        return Attempt::Miss;
    };
    let a = anchor.word.bbox;
    let x1 = (a.x1 * ctx.scale) as i64;
    let y1 = (a.top * ctx.scale) as i64 - ROI_MARGIN_PX;
    let y2 = (a.bottom * ctx.scale) as i64 + ROI_MARGIN_PX;

    let Some(roi) = crop_clipped(&ctx.page.image, x1, y1, x1 + ROI_WIDTH_PX, y2) else {
        return Attempt::Miss;
    };

    let score = signature_score(&roi);
    if score > SIGNATURE_THRESHOLD {
        Attempt::Hit(
            Evidence::satisfied(format!("Image Signature (Score: {score:.2})")).with_score(score),
        )
    } else {
        Attempt::Miss
    }
}

fn ocr_proximity(ctx: &SignatureContext<'_>) -> Attempt<Evidence> {
    let items = &ctx.page.ocr;
    if items.is_empty() {
        return Attempt::Miss;
    }
    let has_label = items
        .iter()
        .any(|i| OCR_ANCHOR_WORDS.iter().any(|a| i.text.contains(a)));
    let has_name = items.iter().any(|i| i.text.contains(ctx.name));

    let evidence = Evidence::missing().with_method("OCR proximity");
    if has_label && has_name {
        Attempt::Hit(Evidence {
            satisfied: true,
            ..evidence
        })
    } else {
        Attempt::Veto(evidence)
    }
}

/// Detect a signature next to the applicant's name on `page`.
///
/// Order: typed text after the name, an embedded image beside it, a
/// placeholder trap (conclusive, no fallback), stroke density right of the
/// name, then OCR proximity. Without a known name nothing is attempted.
pub fn detect_signature(page: Option<&Page>, name: Option<&str>, scale: f32) -> Evidence {
    let (Some(page), Some(name)) = (page, name.filter(|n| !n.is_empty())) else {
        return Evidence::missing();
    };

    let strategies: [Strategy<SignatureContext<'_>, Evidence>; 5] = [
        Strategy {
            name: "typed",
            run: typed_signature,
        },
        Strategy {
            name: "embedded image",
            run: embedded_image,
        },
        Strategy {
            name: "placeholder trap",
            run: placeholder_trap,
        },
        Strategy {
            name: "visual stroke",
            run: visual_stroke,
        },
        Strategy {
            name: "OCR proximity",
            run: ocr_proximity,
        },
    ];

    let ctx = SignatureContext::new(page, name, scale);
    let label = format!("signature p{}", page.index + 1);
    cascade::run(&label, &strategies, &ctx).map_or_else(Evidence::missing, |r| r.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    const SCALE: f32 = 150.0 / 72.0;

    fn blank_page(index: usize) -> Page {
        Page {
            index,
            image: RgbImage::from_pixel(1240, 1754, Rgb([255, 255, 255])),
            ocr: Vec::new(),
            digital: None,
        }
    }

    fn item(text: &str) -> OcrItem {
        OcrItem {
            text: text.into(),
            confidence: 0.95,
            quad: [[0.0; 2]; 4],
        }
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

    fn with_digital(mut page: Page, text: Option<&str>, words: Vec<Word>, images: Vec<BoxPt>) -> Page {
        page.digital = Some(DigitalPage {
            width: 595.0,
            height: 842.0,
            text: text.map(str::to_string),
            words: Some(words),
            images: Some(images),
        });
        page
    }

    /// "신청인 성명 홍길동 <next>" on the signing line at 700 pt.
    fn signing_line(next: &str) -> Vec<Word> {
        vec![
            word("신청인", 100.0, 700.0),
            word("성명", 150.0, 700.0),
            word("홍길동", 200.0, 700.0),
            word(next, 250.0, 701.0),
        ]
    }

    /// Paint a dense checkerboard right of the anchor so the stroke score is high.
    fn scribble_right_of_anchor(page: &mut Page) {
        let x0 = (240.0 * SCALE) as u32;
        let y0 = (700.0 * SCALE) as u32 - 10;
        for y in y0..y0 + 40 {
            for x in x0..x0 + 240 {
                let v = if (x / 3 + y / 3) % 2 == 0 { 0 } else { 255 };
                page.image.put_pixel(x, y, Rgb([v, v, v]));
            }
        }
    }

    // ── name ──

    #[test]
    fn name_prefers_digital_text() {
        let page = with_digital(blank_page(0), Some("성 명 (한글) 홍길동"), vec![], vec![]);
        let page = Page {
            ocr: vec![item("성명 김철수")],
            ..page
        };
        let (name, ev) = extract_name(Some(&page));
        assert_eq!(name.as_deref(), Some("홍길동"));
        assert_eq!(ev.method.as_deref(), Some("Digital Text Match"));
    }

    #[test]
    fn name_falls_back_to_ocr() {
        let mut page = with_digital(blank_page(0), Some("no label"), vec![], vec![]);
        page.ocr = vec![item("성명"), item("김철수")];
        let (name, ev) = extract_name(Some(&page));
        assert_eq!(name.as_deref(), Some("김철수"));
        assert_eq!(ev.method.as_deref(), Some("OCR Text Match"));
    }

    #[test]
    fn name_missing_everywhere() {
        let (name, ev) = extract_name(Some(&blank_page(0)));
        assert!(name.is_none());
        assert!(!ev.satisfied);
        assert_eq!(extract_name(None).0, None);
    }

    // ── consent ──

    #[test]
    fn consent_ignores_interior_whitespace() {
        for text in [
            "동의하십니까?(예)",
            "동의하십니까? ( 예 )",
            "동의\n하십니까 ?\n(\t예\n)",
        ] {
            let page = with_digital(blank_page(2), Some(text), vec![], vec![]);
            let ev = detect_consent(Some(&page));
            assert!(ev.satisfied, "{text:?}");
            assert_eq!(ev.method.as_deref(), Some("Digital Text Match"));
        }
    }

    #[test]
    fn consent_falls_back_to_ocr() {
        let mut page = blank_page(2);
        page.ocr = vec![item("개인정보 수집에 동의하"), item("십니까? ("), item("예 )")];
        let ev = detect_consent(Some(&page));
        assert!(ev.satisfied);
        assert_eq!(ev.method.as_deref(), Some("OCR Text Match"));
    }

    #[test]
    fn consent_absent() {
        let page = with_digital(blank_page(2), Some("동의하십니까? (아니오)"), vec![], vec![]);
        assert!(!detect_consent(Some(&page)).satisfied);
        assert!(!detect_consent(None).satisfied);
    }

    // ── photo ──

    #[test]
    fn blank_photo_box_is_absent() {
        let region = crate::config::FormTemplate::default().photo_region;
        let ev = detect_photo(Some(&blank_page(0)), &region, 150);
        assert!(!ev.satisfied);
        assert_eq!(ev.score, Some(0.0));
    }

    #[test]
    fn region_outside_image_is_absent() {
        let region = RegionMm {
            x_mm: 500.0,
            y_mm: 500.0,
            width_mm: 30.0,
            height_mm: 40.0,
        };
        let ev = detect_photo(Some(&blank_page(0)), &region, 150);
        assert!(!ev.satisfied);
        assert!(ev.score.is_none());
    }

    #[test]
    fn textured_photo_box_is_present() {
        let mut page = blank_page(0);
        for y in 118..354 {
            for x in 88..265 {
                let v = if (x / 4 + y / 4) % 2 == 0 { 0 } else { 255 };
                page.image.put_pixel(x, y, Rgb([v, v, v]));
            }
        }
        let region = crate::config::FormTemplate::default().photo_region;
        assert!(detect_photo(Some(&page), &region, 150).satisfied);
    }

    // ── signature ──

    #[test]
    fn unknown_name_skips_signature() {
        let page = with_digital(blank_page(0), None, signing_line("홍길동"), vec![]);
        let ev = detect_signature(Some(&page), None, SCALE);
        assert_eq!(ev, Evidence::missing());
    }

    #[test]
    fn typed_signature_after_name() {
        let page = with_digital(blank_page(0), None, signing_line("홍길동"), vec![]);
        let ev = detect_signature(Some(&page), Some("홍길동"), SCALE);
        assert!(ev.satisfied);
        assert_eq!(ev.method.as_deref(), Some("Typed Signature: 홍길동"));
    }

    #[test]
    fn next_word_on_another_line_is_not_typed() {
        let mut words = signing_line("x");
        words[3] = word("다음줄", 250.0, 730.0);
        let page = with_digital(blank_page(0), None, words, vec![]);
        assert!(!detect_signature(Some(&page), Some("홍길동"), SCALE).satisfied);
    }

    #[test]
    fn embedded_image_beside_name() {
        let img = BoxPt {
            x0: 245.0,
            x1: 330.0,
            top: 690.0,
            bottom: 720.0,
        };
        let page = with_digital(blank_page(0), None, signing_line("(인)"), vec![img]);
        let ev = detect_signature(Some(&page), Some("홍길동"), SCALE);
        assert!(ev.satisfied);
        assert_eq!(ev.method.as_deref(), Some("PDF Embedded Image"));
    }

    #[test]
    fn placeholder_is_a_trap_even_with_strokes() {
        let mut page = with_digital(blank_page(0), None, signing_line("(인)"), vec![]);
        scribble_right_of_anchor(&mut page);
        page.ocr = vec![item("성명 홍길동")];
        let ev = detect_signature(Some(&page), Some("홍길동"), SCALE);
        assert!(!ev.satisfied);
        assert_eq!(ev.method.as_deref(), Some("Trap Text: (인)"));
    }

    #[test]
    fn strokes_right_of_name() {
        let mut words = signing_line("x");
        words.pop();
        let mut page = with_digital(blank_page(0), None, words, vec![]);
        scribble_right_of_anchor(&mut page);
        let ev = detect_signature(Some(&page), Some("홍길동"), SCALE);
        assert!(ev.satisfied);
        assert!(ev.method.unwrap().starts_with("Image Signature (Score: "));
        assert!(ev.score.unwrap() > SIGNATURE_THRESHOLD);
    }

    #[test]
    fn name_without_label_is_not_an_anchor() {
        let words = vec![
            word("담당자", 100.0, 700.0),
            word("홍길동", 150.0, 700.0),
            word("홍길동", 200.0, 700.0),
        ];
        let page = with_digital(blank_page(0), None, words, vec![]);
        assert!(!detect_signature(Some(&page), Some("홍길동"), SCALE).satisfied);
    }

    #[test]
    fn words_above_signing_zone_are_ignored() {
        let words = vec![
            word("성명", 150.0, 100.0),
            word("홍길동", 200.0, 100.0),
            word("홍길동", 250.0, 100.0),
        ];
        let page = with_digital(blank_page(0), None, words, vec![]);
        assert!(!detect_signature(Some(&page), Some("홍길동"), SCALE).satisfied);
    }

    #[test]
    fn ocr_proximity_without_digital_layout() {
        let mut page = blank_page(2);
        page.ocr = vec![item("신청인"), item("홍길동 (서명)")];
        let ev = detect_signature(Some(&page), Some("홍길동"), SCALE);
        assert!(ev.satisfied);
        assert_eq!(ev.method.as_deref(), Some("OCR proximity"));

        page.ocr = vec![item("신청인"), item("김철수")];
        let ev = detect_signature(Some(&page), Some("홍길동"), SCALE);
        assert!(!ev.satisfied);
        assert_eq!(ev.method.as_deref(), Some("OCR proximity"));
    }

    #[test]
    fn no_evidence_at_all() {
        let ev = detect_signature(Some(&blank_page(2)), Some("홍길동"), SCALE);
        assert_eq!(ev, Evidence::missing());
    }
}
