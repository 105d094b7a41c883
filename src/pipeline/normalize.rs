//! OCR item normalisation: raw engine output → flat list of [`OcrItem`]s.
//!
//! Engines disagree on output shape, and the same engine changes it between
//! releases. Three shapes are accepted:
//!
//! ```text
//! lines   [[ [quad, [text, conf]], ... ]]        (optionally without the outer batch list)
//! dicts   [ {"points"|"bbox": quad, "text": t, "score": s}, ... ]
//! arrays  {"rec_texts": [...], "rec_scores": [...], "rec_polys": [...]}
//! ```
//!
//! Entries missing text, confidence or geometry are dropped; order is kept.
//! Anything else yields an empty list. This function never fails.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One recognised text fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrItem {
    pub text: String,
    pub confidence: f32,
    /// Four corner points in pixel space, clockwise from top-left.
    pub quad: [[f32; 2]; 4],
}

/// Normalise one page of raw engine output.
pub fn normalize(raw: &Value) -> Vec<OcrItem> {
    if let Some(items) = parallel_arrays(raw) {
        return items;
    }

    let Some(lines) = page_lines(raw) else {
        return Vec::new();
    };

    lines.iter().filter_map(parse_line).collect()
}

/// Join the texts of all items with `sep`.
pub fn joined_text(items: &[OcrItem], sep: &str) -> String {
    items
        .iter()
        .map(|i| i.text.as_str())
        .collect::<Vec<_>>()
        .join(sep)
}

/// Locate the per-page line list, unwrapping a one-page batch wrapper.
///
/// The decision is structural: a list holding anything shaped like a line is
/// the page itself, even when that line turns out to be incomplete.
fn page_lines(raw: &Value) -> Option<&Vec<Value>> {
    let outer = raw.as_array()?;
    match outer.first() {
        None => None,
        // Batch wrapper whose page is null: the engine found nothing.
        Some(Value::Null) => None,
        Some(_) if outer.iter().any(is_line_shaped) => Some(outer),
        Some(first @ Value::Array(_)) => first.as_array(),
        Some(_) => Some(outer),
    }
}

/// `{...}`, or `[<box>, [scalars...]]` where the second part is the
/// text/confidence pair. A page is a list of such lines, so its second
/// element is itself a list or object and never matches.
fn is_line_shaped(v: &Value) -> bool {
    match v {
        Value::Object(_) => true,
        Value::Array(parts) if parts.len() == 2 => parts[1]
            .as_array()
            .is_some_and(|pair| pair.iter().all(|x| !x.is_array() && !x.is_object())),
        _ => false,
    }
}

fn parse_line(line: &Value) -> Option<OcrItem> {
    match line {
        Value::Array(parts) if parts.len() == 2 => {
            let quad = parse_quad(&parts[0])?;
            let pair = parts[1].as_array().filter(|p| p.len() == 2)?;
            let text = pair[0].as_str()?;
            let confidence = pair[1].as_f64()?;
            Some(OcrItem {
                text: text.to_string(),
                confidence: confidence as f32,
                quad,
            })
        }
        Value::Object(map) => {
            let quad = map
                .get("points")
                .or_else(|| map.get("bbox"))
                .and_then(parse_quad)?;
            let text = map.get("text")?.as_str()?;
            let confidence = map.get("score")?.as_f64()?;
            Some(OcrItem {
                text: text.to_string(),
                confidence: confidence as f32,
                quad,
            })
        }
        _ => None,
    }
}

fn parallel_arrays(raw: &Value) -> Option<Vec<OcrItem>> {
    // Newer engines return one object per page, sometimes inside a batch list.
    let page = match raw {
        Value::Array(pages) => pages.first()?.as_object()?,
        Value::Object(map) => map,
        _ => return None,
    };
    let texts = page.get("rec_texts")?.as_array()?;
    let scores = page.get("rec_scores")?.as_array()?;
    let polys = page
        .get("rec_polys")
        .or_else(|| page.get("dt_polys"))?
        .as_array()?;

    Some(
        texts
            .iter()
            .zip(scores)
            .zip(polys)
            .filter_map(|((t, s), p)| {
                Some(OcrItem {
                    text: t.as_str()?.to_string(),
                    confidence: s.as_f64()? as f32,
                    quad: parse_quad(p)?,
                })
            })
            .collect(),
    )
}

/// Four `[x, y]` points, or an axis-aligned `[x0, y0, x1, y1]` box.
fn parse_quad(v: &Value) -> Option<[[f32; 2]; 4]> {
    let arr = v.as_array()?;
    if arr.len() != 4 {
        return None;
    }

    if arr.iter().all(Value::is_number) {
        let n: Vec<f32> = arr.iter().filter_map(|x| x.as_f64()).map(|x| x as f32).collect();
        let (x0, y0, x1, y1) = (n[0], n[1], n[2], n[3]);
        return Some([[x0, y0], [x1, y0], [x1, y1], [x0, y1]]);
    }

    let mut quad = [[0.0f32; 2]; 4];
    for (slot, point) in quad.iter_mut().zip(arr) {
        let xy = point.as_array().filter(|p| p.len() == 2)?;
        *slot = [xy[0].as_f64()? as f32, xy[1].as_f64()? as f32];
    }
    Some(quad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn quad() -> Value {
        json!([[10, 20], [110, 20], [110, 40], [10, 40]])
    }

    #[test]
    fn nested_batch_format() {
        let raw = json!([[
            [quad(), ["성명 홍길동", 0.98]],
            [quad(), ["생년월일", 0.91]]
        ]]);
        let items = normalize(&raw);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text, "성명 홍길동");
        assert!((items[0].confidence - 0.98).abs() < 1e-6);
        assert_eq!(items[0].quad[2], [110.0, 40.0]);
        assert_eq!(items[1].text, "생년월일");
    }

    #[test]
    fn unwrapped_line_list() {
        let raw = json!([[quad(), ["hello", 0.5]]]);
        let items = normalize(&raw);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "hello");
    }

    #[test]
    fn dict_format_with_points_or_bbox() {
        let raw = json!([
            {"points": quad(), "text": "a", "score": 0.9},
            {"bbox": [0, 0, 50, 10], "text": "b", "score": 0.8},
            {"text": "no geometry", "score": 0.7}
        ]);
        let items = normalize(&raw);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text, "a");
        assert_eq!(items[1].quad, [[0.0, 0.0], [50.0, 0.0], [50.0, 10.0], [0.0, 10.0]]);
    }

    #[test]
    fn parallel_array_format() {
        let raw = json!({
            "rec_texts": ["x", "y"],
            "rec_scores": [0.9, 0.8],
            "rec_polys": [quad(), quad()]
        });
        let items = normalize(&raw);
        assert_eq!(items.iter().map(|i| i.text.as_str()).collect::<Vec<_>>(), ["x", "y"]);
    }

    #[test]
    fn incomplete_entries_are_dropped_in_order() {
        let raw = json!([[
            [quad(), ["first", 0.9]],
            [quad(), [null, 0.9]],
            [null, ["no box", 0.9]],
            [quad(), ["no conf"]],
            [quad(), ["last", 0.4]]
        ]]);
        let texts: Vec<String> = normalize(&raw).into_iter().map(|i| i.text).collect();
        assert_eq!(texts, ["first", "last"]);
    }

    #[test]
    fn unwrapped_list_with_bad_first_line_keeps_the_rest() {
        let raw = json!([
            [null, ["no box", 0.9]],
            [quad(), ["good", 0.9]]
        ]);
        let texts: Vec<String> = normalize(&raw).into_iter().map(|i| i.text).collect();
        assert_eq!(texts, ["good"]);

        let raw = json!([
            [quad(), ["no conf"]],
            {"points": quad(), "text": "dict", "score": 0.9}
        ]);
        let texts: Vec<String> = normalize(&raw).into_iter().map(|i| i.text).collect();
        assert_eq!(texts, ["dict"]);
    }

    #[test]
    fn batch_of_two_lines_with_bad_second_line() {
        let raw = json!([[
            [quad(), ["kept", 0.9]],
            [null, ["no box", 0.9]]
        ]]);
        let texts: Vec<String> = normalize(&raw).into_iter().map(|i| i.text).collect();
        assert_eq!(texts, ["kept"]);
    }

    #[test]
    fn batch_of_dicts_is_unwrapped() {
        let raw = json!([[
            {"points": quad(), "text": "a", "score": 0.9},
            {"points": quad(), "text": "b", "score": 0.9}
        ]]);
        assert_eq!(normalize(&raw).len(), 2);
    }

    #[test]
    fn empty_or_malformed_input_yields_nothing() {
        assert!(normalize(&json!(null)).is_empty());
        assert!(normalize(&json!([])).is_empty());
        assert!(normalize(&json!([null])).is_empty());
        assert!(normalize(&json!("garbage")).is_empty());
        assert!(normalize(&json!({"unexpected": 1})).is_empty());
    }

    #[test]
    fn joined_text_uses_separator() {
        let raw = json!([[[quad(), ["a", 1.0]], [quad(), ["b", 1.0]]]]);
        assert_eq!(joined_text(&normalize(&raw), " "), "a b");
    }
}
