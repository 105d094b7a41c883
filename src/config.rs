//! Configuration types for form review.
//!
//! All review behaviour is controlled through [`ReviewConfig`], built via its
//! [`ReviewConfigBuilder`]. Per-call adjustments (OCR device, arbitration on
//! or off) go through [`ReviewOverrides`] so one configured
//! [`crate::review::Reviewer`] can serve callers with different needs.

use crate::error::ReviewError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Configuration for reviewing an application form.
///
/// # Example
/// ```rust
/// use formreview::{OcrDevice, ReviewConfig};
///
/// let config = ReviewConfig::builder()
///     .dpi(150)
///     .ocr_endpoint("http://localhost:8868")
///     .ocr_device(OcrDevice::Gpu)
///     .arbitration(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ReviewConfig {
    /// Rendering DPI. Range: 72–400. Default: 150.
    ///
    /// Every pixel-space region (photo box, signature ROI) is derived from this
    /// value, so it must match the resolution the pages were rendered at.
    pub dpi: u32,

    /// Minimum character count for each essay section. Default: 300.
    pub min_section_chars: usize,

    /// Fixed geometry and page layout of the form template.
    pub template: FormTemplate,

    /// Device the OCR engine runs on. Default: [`OcrDevice::Cpu`].
    pub ocr_device: OcrDevice,

    /// Base URL of the OCR engine. `None` disables OCR entirely; extractors
    /// then rely on digital text and geometry alone.
    pub ocr_endpoint: Option<String>,

    /// Per-page OCR request timeout in seconds. Default: 60.
    pub ocr_timeout_secs: u64,

    /// Number of pages sent to the OCR engine concurrently. Default: 4.
    pub concurrency: usize,

    /// Consult the judgment service when the rule evaluation fails. Default: false.
    pub arbitration: bool,

    /// LLM model identifier for arbitration. If None, uses `gpt-4o-mini`.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the judgment call. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens the judgment service may generate. Default: 1024.
    pub max_tokens: usize,

    /// Retry attempts on a failed judgment call. Default: 1.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Upper bound on the whole arbitration exchange, retries included. Default: 30.
    ///
    /// Expiry counts as "service unavailable": the review falls back to the
    /// seeded findings instead of failing.
    pub arbitration_timeout_secs: u64,

    /// Custom system prompt for the judgment service. If None, uses the built-in one.
    pub system_prompt: Option<String>,

    /// Optional progress callback for stage and check events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            dpi: 150,
            min_section_chars: 300,
            template: FormTemplate::default(),
            ocr_device: OcrDevice::default(),
            ocr_endpoint: None,
            ocr_timeout_secs: 60,
            concurrency: 4,
            arbitration: false,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 1024,
            max_retries: 1,
            retry_backoff_ms: 500,
            arbitration_timeout_secs: 30,
            system_prompt: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ReviewConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReviewConfig")
            .field("dpi", &self.dpi)
            .field("min_section_chars", &self.min_section_chars)
            .field("template", &self.template)
            .field("ocr_device", &self.ocr_device)
            .field("ocr_endpoint", &self.ocr_endpoint)
            .field("concurrency", &self.concurrency)
            .field("arbitration", &self.arbitration)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("arbitration_timeout_secs", &self.arbitration_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl ReviewConfig {
    /// Create a new builder for `ReviewConfig`.
    pub fn builder() -> ReviewConfigBuilder {
        ReviewConfigBuilder {
            config: Self::default(),
        }
    }

    /// Apply per-call overrides on top of this configuration.
    pub fn with_overrides(&self, overrides: &ReviewOverrides) -> ReviewConfig {
        let mut config = self.clone();
        if let Some(device) = overrides.ocr_device {
            config.ocr_device = device;
        }
        if let Some(enabled) = overrides.arbitration {
            config.arbitration = enabled;
        }
        config
    }

    /// Points-to-pixels factor for the configured DPI (PDF user space is 72 pt/inch).
    pub fn scale(&self) -> f32 {
        self.dpi as f32 / 72.0
    }
}

/// Builder for [`ReviewConfig`].
pub struct ReviewConfigBuilder {
    config: ReviewConfig,
}

impl fmt::Debug for ReviewConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReviewConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ReviewConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn min_section_chars(mut self, n: usize) -> Self {
        self.config.min_section_chars = n;
        self
    }

    pub fn template(mut self, template: FormTemplate) -> Self {
        self.config.template = template;
        self
    }

    pub fn ocr_device(mut self, device: OcrDevice) -> Self {
        self.config.ocr_device = device;
        self
    }

    pub fn ocr_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.ocr_endpoint = Some(url.into());
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs.max(1);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn arbitration(mut self, enabled: bool) -> Self {
        self.config.arbitration = enabled;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn arbitration_timeout_secs(mut self, secs: u64) -> Self {
        self.config.arbitration_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ReviewConfig, ReviewError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(ReviewError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.concurrency == 0 {
            return Err(ReviewError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.arbitration_timeout_secs == 0 {
            return Err(ReviewError::InvalidConfig(
                "Arbitration timeout must be ≥ 1s".into(),
            ));
        }
        let r = &c.template.photo_region;
        if r.width_mm <= 0.0 || r.height_mm <= 0.0 {
            return Err(ReviewError::InvalidConfig(format!(
                "Photo region must have positive size, got {}×{} mm",
                r.width_mm, r.height_mm
            )));
        }
        Ok(self.config)
    }
}

/// Per-call overrides accepted by [`crate::review::Reviewer::review`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReviewOverrides {
    /// Run OCR on this device instead of the configured one.
    pub ocr_device: Option<OcrDevice>,
    /// Force arbitration on or off for this call.
    pub arbitration: Option<bool>,
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Execution device of the OCR engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrDevice {
    #[default]
    Cpu,
    Gpu,
}

impl OcrDevice {
    pub fn as_str(&self) -> &'static str {
        match self {
            OcrDevice::Cpu => "cpu",
            OcrDevice::Gpu => "gpu",
        }
    }
}

impl fmt::Display for OcrDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OcrDevice {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cpu" => Ok(OcrDevice::Cpu),
            "gpu" | "cuda" => Ok(OcrDevice::Gpu),
            other => Err(ReviewError::InvalidConfig(format!(
                "Unknown OCR device '{other}' (expected cpu or gpu)"
            ))),
        }
    }
}

// ── Template ─────────────────────────────────────────────────────────────

/// A rectangle in physical units, measured from the page's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionMm {
    pub x_mm: f32,
    pub y_mm: f32,
    pub width_mm: f32,
    pub height_mm: f32,
}

impl RegionMm {
    /// Pixel bounds `(x1, y1, x2, y2)` at the given DPI (`px = mm / 25.4 × dpi`).
    ///
    /// Each term is truncated separately, so `x2 = x1 + trunc(width)`.
    /// Huge regions saturate at `u32::MAX` and are clipped by the caller.
    pub fn to_pixels(&self, dpi: u32) -> (u32, u32, u32, u32) {
        let px = |mm: f32| (mm / 25.4 * dpi as f32).max(0.0) as u32;
        let x1 = px(self.x_mm);
        let y1 = px(self.y_mm);
        (
            x1,
            y1,
            x1.saturating_add(px(self.width_mm)),
            y1.saturating_add(px(self.height_mm)),
        )
    }
}

/// Fixed layout of the application form.
///
/// Page indices are 0-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormTemplate {
    /// Where the applicant photo is pasted on the name page.
    pub photo_region: RegionMm,
    /// Page holding the applicant name, photo and first signature.
    pub name_page: usize,
    /// Page holding the numbered essay sections.
    pub essay_page: usize,
    /// Page holding the consent checkbox and second signature.
    pub consent_page: usize,
}

impl Default for FormTemplate {
    fn default() -> Self {
        Self {
            photo_region: RegionMm {
                x_mm: 15.0,
                y_mm: 20.0,
                width_mm: 30.0,
                height_mm: 40.0,
            },
            name_page: 0,
            essay_page: 1,
            consent_page: 2,
        }
    }
}
