//! Raster helpers for thumbnails.
//!
//! Letterboxing into a fixed square, PNG encoding and `data:` URL round
//! trips.

use atelier_core::WorldRect;
use base64::Engine;
use image::codecs::png::PngEncoder;
use image::{imageops, ExtendedColorType, ImageEncoder, RgbaImage};

use crate::error::{RenderError, RenderResult};

/// Prefix of every encoded thumbnail.
pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Scale `src` to fit a transparent `size` x `size` square, centered.
///
/// An empty source yields a fully transparent square.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn letterbox(src: &RgbaImage, size: u32) -> RgbaImage {
    let mut canvas = RgbaImage::new(size, size);
    if size == 0 {
        return canvas;
    }
    let frame = WorldRect::new(0.0, 0.0, f64::from(size), f64::from(size));
    let Some(placed) = frame.fit_centered(f64::from(src.width()), f64::from(src.height())) else {
        return canvas;
    };

    let w = (placed.width.round() as u32).clamp(1, size);
    let h = (placed.height.round() as u32).clamp(1, size);
    let scaled = imageops::resize(src, w, h, imageops::FilterType::Triangle);
    let x = i64::from((size - w) / 2);
    let y = i64::from((size - h) / 2);
    imageops::overlay(&mut canvas, &scaled, x, y);
    canvas
}

/// Encode an image as PNG bytes.
///
/// # Errors
///
/// Returns [`RenderError::Encode`] if the encoder fails.
pub fn encode_png(img: &RgbaImage) -> RenderResult<Vec<u8>> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes)
        .write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgba8)
        .map_err(|e| RenderError::Encode(format!("PNG encoding failed: {e}")))?;
    Ok(bytes)
}

/// Encode an image as a `data:image/png;base64,...` URL.
///
/// # Errors
///
/// Returns [`RenderError::Encode`] if the encoder fails.
pub fn encode_png_data_url(img: &RgbaImage) -> RenderResult<String> {
    let bytes = encode_png(img)?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("{PNG_DATA_URL_PREFIX}{encoded}"))
}

/// Decode a base64 `data:` URL back into pixels.
///
/// # Errors
///
/// Returns [`RenderError::Resource`] if the URL is malformed, not base64, or
/// the payload is not a decodable image.
pub fn decode_data_url(url: &str) -> RenderResult<RgbaImage> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| RenderError::Resource("Not a data URL".to_string()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| RenderError::Resource("Invalid data URL: missing comma".to_string()))?;
    if !meta.ends_with(";base64") {
        return Err(RenderError::Resource(format!("Unsupported data URL encoding: {meta}")));
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| RenderError::Resource(format!("Failed to decode base64: {e}")))?;
    let img = image::load_from_memory(&bytes)
        .map_err(|e| RenderError::Resource(format!("Failed to decode image: {e}")))?;
    Ok(img.to_rgba8())
}
