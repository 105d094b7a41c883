//! PDF rasterisation: render every page of a form to an `RgbImage`.
//!
//! Two backends form a chain. pdfium (in-process) is tried first; poppler's
//! `pdftoppm` (out-of-process) is the fallback. A backend that errors *or*
//! yields zero pages hands over to the next one. The review only fails when
//! every backend comes back empty.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with thread-local state, and `pdftoppm` is a child
//! process we wait on. Neither belongs on a Tokio worker thread, so the whole
//! chain runs inside `tokio::task::spawn_blocking`.

use crate::error::{RenderError, ReviewError};
use image::RgbImage;
use pdfium_render::prelude::*;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A backend that turns a PDF file into page images.
pub trait Rasterizer: Send + Sync {
    /// Short backend name used in logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Render every page at `dpi`, in document order.
    fn rasterize(&self, path: &Path, dpi: u32) -> Result<Vec<RgbImage>, RenderError>;
}

/// Rendered pages plus the backend that produced them.
#[derive(Debug)]
pub struct RenderedDocument {
    pub backend: &'static str,
    pub pages: Vec<RgbImage>,
}

/// The default backend chain: pdfium, then `pdftoppm`.
pub fn default_chain() -> Vec<Arc<dyn Rasterizer>> {
    vec![Arc::new(PdfiumRasterizer), Arc::new(PopplerRasterizer::default())]
}

/// Run the backend chain off the async runtime.
pub async fn render_document(
    pdf_path: &Path,
    dpi: u32,
    chain: &[Arc<dyn Rasterizer>],
) -> Result<RenderedDocument, ReviewError> {
    let path = pdf_path.to_path_buf();
    let chain = chain.to_vec();

    tokio::task::spawn_blocking(move || render_chain(&path, dpi, &chain))
        .await
        .map_err(|e| ReviewError::Internal(format!("Render task panicked: {}", e)))?
}

/// Blocking implementation of the fallback chain.
pub fn render_chain(
    pdf_path: &Path,
    dpi: u32,
    chain: &[Arc<dyn Rasterizer>],
) -> Result<RenderedDocument, ReviewError> {
    let mut attempts = Vec::with_capacity(chain.len());

    for backend in chain {
        match backend.rasterize(pdf_path, dpi) {
            Ok(pages) if !pages.is_empty() => {
                info!("Rendered {} pages with {}", pages.len(), backend.name());
                return Ok(RenderedDocument {
                    backend: backend.name(),
                    pages,
                });
            }
            Ok(_) => {
                warn!("{} produced no pages", backend.name());
                attempts.push(format!("{}: produced no pages", backend.name()));
            }
            Err(e) => {
                warn!("Rendering failed: {}", e);
                attempts.push(e.to_string());
            }
        }
    }

    Err(ReviewError::RenderFailed {
        path: pdf_path.to_path_buf(),
        attempts,
    })
}

// ── pdfium ───────────────────────────────────────────────────────────────

/// Bind to pdfium: `PDFIUM_LIB_PATH` first, then the working directory, then
/// the system library path.
pub fn bind_pdfium() -> Result<Pdfium, String> {
    let from_env = std::env::var("PDFIUM_LIB_PATH").ok().and_then(|dir| {
        Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir)).ok()
    });

    let bindings = match from_env {
        Some(b) => b,
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| format!("{:?}", e))?,
    };

    Ok(Pdfium::new(bindings))
}

/// In-process renderer backed by pdfium.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumRasterizer;

impl Rasterizer for PdfiumRasterizer {
    fn name(&self) -> &'static str {
        "pdfium"
    }

    fn rasterize(&self, path: &Path, dpi: u32) -> Result<Vec<RgbImage>, RenderError> {
        let backend = self.name().to_string();
        let pdfium = bind_pdfium().map_err(|detail| RenderError::Unavailable {
            backend: backend.clone(),
            detail,
        })?;

        let document =
            pdfium
                .load_pdf_from_file(path, None)
                .map_err(|e| RenderError::LoadFailed {
                    backend: backend.clone(),
                    detail: format!("{:?}", e),
                })?;

        let scale = dpi as f32 / 72.0;
        let mut images = Vec::new();

        for (idx, page) in document.pages().iter().enumerate() {
            let width = (page.width().value * scale).round() as i32;
            let height = (page.height().value * scale).round() as i32;

            let render_config = PdfRenderConfig::new()
                .set_target_width(width)
                .set_target_height(height)
                .render_form_data(true);

            let bitmap =
                page.render_with_config(&render_config)
                    .map_err(|e| RenderError::PageFailed {
                        backend: backend.clone(),
                        page: idx + 1,
                        detail: format!("{:?}", e),
                    })?;

            let image = bitmap.as_image().to_rgb8();
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );
            images.push(image);
        }

        Ok(images)
    }
}

// ── poppler ──────────────────────────────────────────────────────────────

/// Out-of-process renderer: `pdftoppm -r <dpi> -png`.
#[derive(Debug, Clone)]
pub struct PopplerRasterizer {
    /// Executable to run. Default: `pdftoppm` from `PATH`.
    pub program: String,
}

impl Default for PopplerRasterizer {
    fn default() -> Self {
        Self {
            program: "pdftoppm".into(),
        }
    }
}

impl Rasterizer for PopplerRasterizer {
    fn name(&self) -> &'static str {
        "pdftoppm"
    }

    fn rasterize(&self, path: &Path, dpi: u32) -> Result<Vec<RgbImage>, RenderError> {
        let backend = self.name().to_string();
        let out_dir = tempfile::tempdir().map_err(|e| RenderError::Unavailable {
            backend: backend.clone(),
            detail: format!("temp dir: {}", e),
        })?;
        let prefix = out_dir.path().join("page");

        let output = Command::new(&self.program)
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-png")
            .arg(path)
            .arg(&prefix)
            .output()
            .map_err(|e| RenderError::Unavailable {
                backend: backend.clone(),
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(RenderError::LoadFailed {
                backend,
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        // pdftoppm zero-pads page numbers to the document's width, so a
        // lexical sort of equal-length names is page order.
        let mut files: Vec<_> = std::fs::read_dir(out_dir.path())
            .map_err(|e| RenderError::LoadFailed {
                backend: backend.clone(),
                detail: e.to_string(),
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
            .collect();
        files.sort();

        files
            .iter()
            .enumerate()
            .map(|(idx, file)| {
                image::open(file)
                    .map(|img| img.to_rgb8())
                    .map_err(|e| RenderError::PageFailed {
                        backend: backend.clone(),
                        page: idx + 1,
                        detail: e.to_string(),
                    })
            })
            .collect()
    }
}
