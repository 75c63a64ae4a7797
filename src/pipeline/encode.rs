//! Image encoding: image file → base64 PNG wrapped in `ImageData`.
//!
//! OpenAI-compatible endpoints take images as base64 data URLs. PNG is used
//! throughout because it is lossless; JPEG artefacts around rendered glyphs
//! make small print harder for vision models to read.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, error, warn};

/// Base64 of the image at `path`, re-encoded as PNG when it is not one.
///
/// PNG input is passed through byte for byte. Returns `None`, after logging
/// the reason, when the file is missing or cannot be decoded.
pub fn encode_image_to_base64(path: &Path) -> Option<String> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            error!("Image file '{}' was not found", path.display());
            return None;
        }
        Err(e) => {
            error!("Could not read image '{}': {}", path.display(), e);
            return None;
        }
    };

    // Sniff the content; the extension may lie.
    let format = image::guess_format(&bytes).ok();
    if format == Some(ImageFormat::Png) {
        let b64 = STANDARD.encode(&bytes);
        debug!("Encoded {} → {} bytes base64", path.display(), b64.len());
        return Some(b64);
    }

    warn!(
        "Image '{}' is not PNG ({:?}); converting to PNG",
        path.display(),
        format
    );
    let img = match image::load_from_memory(&bytes) {
        Ok(img) => img,
        Err(e) => {
            error!("Could not decode image '{}': {}", path.display(), e);
            return None;
        }
    };
    match encode_png_bytes(&img) {
        Ok(buf) => Some(STANDARD.encode(&buf)),
        Err(e) => {
            error!("Could not re-encode '{}' as PNG: {}", path.display(), e);
            None
        }
    }
}

/// PNG-encode an in-memory image.
pub fn encode_png_bytes(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

/// Wrap base64 PNG data for a vision message.
///
/// `detail: "high"` lets GPT-4-class models tile the full image; a tall
/// composite squeezed into one low-detail tile loses its small print.
pub fn png_image_data(png_b64: impl Into<String>) -> ImageData {
    ImageData::new(png_b64, "image/png").with_detail("high")
}
