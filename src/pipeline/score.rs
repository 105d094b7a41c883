//! Visual scorers: "does this pixel region look like a photo / a pen stroke?"
//!
//! Both scorers are pure functions of the pixels they are given and return a
//! value in `[0, 1]`. Thresholds live with the callers in
//! [`crate::pipeline::extract`].

use image::{imageops, GrayImage, RgbImage};
use imageproc::edges::canny;

/// Regions with fewer grayscale pixels than this are not scored.
pub const MIN_PHOTO_PIXELS: u32 = 500;

/// Inner standard deviation below which a region counts as flat or line-art.
pub const PHOTO_TEXTURE_FLOOR: f64 = 30.0;

/// Combined photo score above which a photo is considered present.
pub const PHOTO_THRESHOLD: f32 = 0.5;

/// Stroke score above which a signature is considered present.
pub const SIGNATURE_THRESHOLD: f32 = 0.6;

const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;
const PHOTO_EDGE_GAIN: f64 = 10.0;
const PHOTO_STD_DIVISOR: f64 = 35.0;
const SIGNATURE_EDGE_GAIN: f64 = 8.0;

/// Score how much `crop` looks like a pasted photograph.
///
/// Texture (grayscale standard deviation of the central 80 %) gates the
/// score: table borders and blank boxes have almost none and score 0. Past
/// the gate, edge density and texture contribute half each.
pub fn photo_score(crop: &RgbImage) -> f32 {
    let gray = imageops::grayscale(crop);
    if gray.width() * gray.height() < MIN_PHOTO_PIXELS {
        return 0.0;
    }

    let (w, h) = gray.dimensions();
    let (x0, x1) = ((w as f32 * 0.1) as u32, (w as f32 * 0.9) as u32);
    let (y0, y1) = ((h as f32 * 0.1) as u32, (h as f32 * 0.9) as u32);
    let inner = imageops::crop_imm(&gray, x0, y0, x1 - x0, y1 - y0).to_image();
    let inner_std = std_dev(&inner);

    if inner_std < PHOTO_TEXTURE_FLOOR {
        return 0.0;
    }

    let edge_ratio = edge_ratio(&canny(&gray, CANNY_LOW, CANNY_HIGH));

    let score = (edge_ratio * PHOTO_EDGE_GAIN).min(1.0) * 0.5
        + (inner_std / PHOTO_STD_DIVISOR).min(1.0) * 0.5;
    score as f32
}

/// Score how much `crop` looks like handwriting strokes.
///
/// `canny` smooths with its own Gaussian (σ = 1.4) before finding edges, so
/// that is the only blur applied.
pub fn signature_score(crop: &RgbImage) -> f32 {
    if crop.width() == 0 || crop.height() == 0 {
        return 0.0;
    }
    let gray = imageops::grayscale(crop);
    let density = edge_ratio(&canny(&gray, CANNY_LOW, CANNY_HIGH));
    (density * SIGNATURE_EDGE_GAIN).min(1.0) as f32
}

/// Clip `(x1, y1, x2, y2)` to the image and crop. `None` if nothing remains.
pub fn crop_clipped(img: &RgbImage, x1: i64, y1: i64, x2: i64, y2: i64) -> Option<RgbImage> {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let (x1, x2) = (x1.clamp(0, w), x2.clamp(0, w));
    let (y1, y2) = (y1.clamp(0, h), y2.clamp(0, h));
    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    Some(
        imageops::crop_imm(img, x1 as u32, y1 as u32, (x2 - x1) as u32, (y2 - y1) as u32)
            .to_image(),
    )
}

/// Population standard deviation of grayscale values.
fn std_dev(img: &GrayImage) -> f64 {
    let n = (img.width() * img.height()) as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mean = img.pixels().map(|p| p.0[0] as f64).sum::<f64>() / n;
    let var = img
        .pixels()
        .map(|p| {
            let d = p.0[0] as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    var.sqrt()
}

fn edge_ratio(edges: &GrayImage) -> f64 {
    let total = (edges.width() * edges.height()) as f64;
    if total == 0.0 {
        return 0.0;
    }
    edges.pixels().filter(|p| p.0[0] > 0).count() as f64 / total
}
