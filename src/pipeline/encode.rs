//! Image encoding: rasterized page → PNG bytes + base64 `ImageData`.
//!
//! The PNG bytes are kept alongside the base64 wrapper because the same
//! encode feeds two consumers: the vision request body and the image
//! archive. Encoding once avoids re-compressing every page for the ZIP.
//!
//! ## Why PNG?
//! Lossless compression preserves text crispness. JPEG artefacts on small
//! print confuse vision models and degrade transcription accuracy.

use crate::pipeline::render::PageImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use std::io::Cursor;
use tracing::debug;

/// A page ready for both the service request and the image archive.
pub struct EncodedPage {
    /// 1-based position within the eligible page sequence.
    pub position: usize,
    /// 0-based index of the page in the source document.
    pub source_page: usize,
    /// The PNG-encoded page, as archived.
    pub png: Vec<u8>,
    /// The same PNG, base64-wrapped for the vision API request body.
    pub data: ImageData,
}

/// Encode a rasterized page for the service request and the archive.
///
/// `detail: "high"` instructs GPT-4-class models to use the full image
/// tile budget; without it the fine print of a roll page is lost.
pub fn encode_page(page: &PageImage) -> Result<EncodedPage, image::ImageError> {
    let mut buf = Vec::new();
    page.image
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(encode_png(page.position, page.source_page, buf))
}

/// Wrap already-PNG-encoded bytes (e.g. read back from an image bundle).
pub fn encode_png(position: usize, source_page: usize, png: Vec<u8>) -> EncodedPage {
    let b64 = STANDARD.encode(&png);
    debug!("Encoded page {} → {} bytes base64", position, b64.len());

    EncodedPage {
        position,
        source_page,
        data: ImageData::new(b64, "image/png").with_detail("high"),
        png,
    }
}
