//! PDF rasterization: render eligible pages to images via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. `tokio::task::spawn_blocking` moves the work onto a dedicated
//! blocking-pool thread so the Tokio workers don't stall during CPU-heavy
//! rendering.
//!
//! ## Why cap pixels, not just DPI?
//!
//! Scan sizes vary; `max_rendered_pixels` caps the longest edge regardless
//! of physical page size so pdfium never allocates an unbounded bitmap.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info, warn};

/// One eligible page, rasterized and positioned.
pub struct PageImage {
    /// 1-based position within the eligible page sequence.
    pub position: usize,
    /// 0-based index of the page in the source document.
    pub source_page: usize,
    pub image: DynamicImage,
}

/// A page that could not be rasterized; reported, not fatal.
pub struct RenderFailure {
    pub position: usize,
    pub source_page: usize,
    pub detail: String,
}

/// Count the pages of a PDF without rendering anything.
pub async fn page_count(pdf_path: &Path, password: Option<&str>) -> Result<usize, ExtractError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || {
        let pdfium = Pdfium::default();
        let document =
            pdfium
                .load_pdf_from_file(&path, pwd.as_deref())
                .map_err(|e| ExtractError::CorruptPdf {
                    path: path.clone(),
                    detail: format!("{:?}", e),
                })?;
        Ok(document.pages().len() as usize)
    })
    .await
    .map_err(|e| ExtractError::Internal(format!("page-count task panicked: {}", e)))?
}

/// Rasterize the given document pages into images.
///
/// `indices[i]` is the 0-based document index of the page at sequence
/// position `i + 1`. Runs inside `spawn_blocking` since pdfium operations
/// are CPU-bound.
///
/// A page that fails to render is skipped and reported in the second
/// element; only a document that cannot be opened at all is fatal.
pub async fn render_pages(
    pdf_path: &Path,
    config: &ExtractionConfig,
    indices: &[usize],
) -> Result<(Vec<PageImage>, Vec<RenderFailure>), ExtractError> {
    let path = pdf_path.to_path_buf();
    let dpi = config.dpi;
    let max_pixels = config.max_rendered_pixels;
    let password = config.password.clone();
    let indices = indices.to_vec();

    tokio::task::spawn_blocking(move || {
        render_pages_blocking(&path, dpi, max_pixels, password.as_deref(), &indices)
    })
    .await
    .map_err(|e| ExtractError::Internal(format!("render task panicked: {}", e)))?
}

/// Blocking implementation of page rendering.
fn render_pages_blocking(
    pdf_path: &Path,
    dpi: u32,
    max_pixels: u32,
    password: Option<&str>,
    indices: &[usize],
) -> Result<(Vec<PageImage>, Vec<RenderFailure>), ExtractError> {
    let pdfium = Pdfium::default();

    let document =
        pdfium
            .load_pdf_from_file(pdf_path, password)
            .map_err(|e| ExtractError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: format!("{:?}", e),
            })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let mut rendered = Vec::with_capacity(indices.len());
    let mut failures = Vec::new();

    for (seq, &idx) in indices.iter().enumerate() {
        let position = seq + 1;

        if idx >= total_pages {
            warn!(
                "Skipping page {} (out of range, total={})",
                idx + 1,
                total_pages
            );
            failures.push(RenderFailure {
                position,
                source_page: idx,
                detail: format!("page index {} out of range ({} pages)", idx, total_pages),
            });
            continue;
        }

        let page = match pages.get(idx as u16) {
            Ok(p) => p,
            Err(e) => {
                failures.push(RenderFailure {
                    position,
                    source_page: idx,
                    detail: format!("{:?}", e),
                });
                continue;
            }
        };

        // Point width → pixel width at the configured DPI, capped so an
        // oversized scan can never make pdfium allocate an unbounded bitmap.
        let width_px = ((page.width().value / 72.0) * dpi as f32).round() as i32;
        let width_px = width_px.clamp(1, max_pixels as i32);
        let render_config = PdfRenderConfig::new()
            .set_target_width(width_px)
            .set_maximum_height(max_pixels as i32);

        let rendered_page = page.render_with_config(&render_config);
        match rendered_page {
            Ok(bitmap) => {
                let image = bitmap.as_image();
                debug!(
                    "Rendered page {} → {}x{} px",
                    idx + 1,
                    image.width(),
                    image.height()
                );
                rendered.push(PageImage {
                    position,
                    source_page: idx,
                    image,
                });
            }
            Err(e) => {
                warn!("Rasterization failed for page {}: {:?}", idx + 1, e);
                failures.push(RenderFailure {
                    position,
                    source_page: idx,
                    detail: format!("{:?}", e),
                });
            }
        };
    }

    Ok((rendered, failures))
}
