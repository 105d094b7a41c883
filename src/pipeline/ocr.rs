//! OCR: page image → raw engine detections → [`OcrItem`]s.
//!
//! The engine is an external collaborator reached over HTTP. Engines are
//! kept per execution device in an [`EngineRegistry`] owned by the
//! [`crate::review::Reviewer`]: a review that asks for the GPU engine gets its
//! own instance and never swaps out the CPU engine under a concurrent review.
//!
//! Failures are absorbed page by page. A page whose request fails, times out,
//! or returns an unrecognised shape simply has zero OCR items.

use crate::config::{OcrDevice, ReviewConfig};
use crate::error::OcrError;
use crate::pipeline::normalize::{normalize, OcrItem};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use image::RgbImage;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// A text detector + recogniser.
pub trait OcrEngine: Send + Sync {
    fn device(&self) -> OcrDevice;

    /// Raw detections for one page, in whatever shape the engine produces.
    fn detect<'a>(&'a self, image: &'a RgbImage) -> BoxFuture<'a, Result<Value, OcrError>>;
}

/// Builds an engine for a device.
pub type EngineFactory = Arc<dyn Fn(OcrDevice) -> Result<Arc<dyn OcrEngine>, OcrError> + Send + Sync>;

/// Encode a page as base64 PNG for the request body.
///
/// PNG is lossless; JPEG artefacts around glyph edges hurt recognition.
pub fn encode_png(img: &RgbImage) -> Result<String, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());
    Ok(b64)
}

// ── HTTP engine ──────────────────────────────────────────────────────────

/// OCR engine served over HTTP.
///
/// `POST {endpoint}/ocr` with `{"image": <base64 PNG>, "device": "cpu"|"gpu"}`.
/// The response body (or its `result` member, when present) is the raw
/// per-page detection list.
#[derive(Debug, Clone)]
pub struct HttpOcrEngine {
    client: reqwest::Client,
    url: String,
    device: OcrDevice,
    timeout_secs: u64,
}

impl HttpOcrEngine {
    pub fn new(endpoint: &str, device: OcrDevice, timeout_secs: u64) -> Result<Self, OcrError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| OcrError::InitFailed {
                device: device.to_string(),
                detail: e.to_string(),
            })?;

        Ok(Self {
            client,
            url: format!("{}/ocr", endpoint.trim_end_matches('/')),
            device,
            timeout_secs,
        })
    }

    async fn post(&self, image: &RgbImage) -> Result<Value, OcrError> {
        let b64 = encode_png(image).map_err(|e| OcrError::Encode {
            page: 0,
            detail: e.to_string(),
        })?;

        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "image": b64, "device": self.device }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OcrError::Timeout {
                        secs: self.timeout_secs,
                    }
                } else {
                    OcrError::Request(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(OcrError::Request(format!("HTTP {}", response.status())));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| OcrError::Request(format!("invalid JSON body: {}", e)))?;

        Ok(match body {
            Value::Object(mut map) if map.contains_key("result") => {
                map.remove("result").unwrap_or(Value::Null)
            }
            other => other,
        })
    }
}

impl OcrEngine for HttpOcrEngine {
    fn device(&self) -> OcrDevice {
        self.device
    }

    fn detect<'a>(&'a self, image: &'a RgbImage) -> BoxFuture<'a, Result<Value, OcrError>> {
        Box::pin(self.post(image))
    }
}

/// Factory for [`HttpOcrEngine`]s reading endpoint and timeout from `config`.
pub fn http_factory(config: &ReviewConfig) -> EngineFactory {
    let endpoint = config.ocr_endpoint.clone();
    let timeout = config.ocr_timeout_secs;
    Arc::new(move |device| {
        let endpoint = endpoint.as_deref().ok_or(OcrError::NotConfigured)?;
        Ok(Arc::new(HttpOcrEngine::new(endpoint, device, timeout)?) as Arc<dyn OcrEngine>)
    })
}

// ── Registry ─────────────────────────────────────────────────────────────

/// Per-device engine cache.
///
/// Engines are built lazily on first request for a device and then reused.
/// The lock is held only for the map lookup and insertion, never across
/// an OCR call.
pub struct EngineRegistry {
    factory: EngineFactory,
    engines: Mutex<HashMap<OcrDevice, Arc<dyn OcrEngine>>>,
}

impl EngineRegistry {
    pub fn new(factory: EngineFactory) -> Self {
        Self {
            factory,
            engines: Mutex::new(HashMap::new()),
        }
    }

    /// Engine for `device`, building it on first use.
    pub fn get(&self, device: OcrDevice) -> Result<Arc<dyn OcrEngine>, OcrError> {
        let mut engines = self
            .engines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(engine) = engines.get(&device) {
            return Ok(Arc::clone(engine));
        }

        let engine = (self.factory)(device)?;
        if engine.device() != device {
            warn!(
                "OCR engine requested for {} reports device {}",
                device,
                engine.device()
            );
        }
        info!("OCR engine initialised for device {}", engine.device());
        engines.insert(device, Arc::clone(&engine));
        Ok(engine)
    }

    /// Number of engines built so far.
    pub fn len(&self) -> usize {
        self.engines
            .lock()
            .map(|m| m.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("engines", &self.len())
            .finish()
    }
}

// ── Page OCR ─────────────────────────────────────────────────────────────

/// OCR every page with up to `concurrency` requests in flight.
///
/// Output is in page order. Without an engine, every page has zero items.
pub async fn ocr_pages(
    engine: Option<Arc<dyn OcrEngine>>,
    images: &[RgbImage],
    concurrency: usize,
) -> Vec<Vec<OcrItem>> {
    let Some(engine) = engine else {
        return vec![Vec::new(); images.len()];
    };

    stream::iter(images.iter().enumerate().map(|(idx, img)| {
        let engine = Arc::clone(&engine);
        async move {
            match engine.detect(img).await {
                Ok(raw) => {
                    let items = normalize(&raw);
                    debug!("Page {}: {} OCR items", idx + 1, items.len());
                    items
                }
                Err(e) => {
                    warn!("Page {}: OCR failed, continuing without text: {}", idx + 1, e);
                    Vec::new()
                }
            }
        }
    }))
    .buffered(concurrency.max(1))
    .collect()
    .await
}
