//! Drawn signature payloads
//!
//! Signatures arrive from the canvas as PNG images, usually wrapped in a
//! `data:image/png;base64,` URL. An image counts as signed only when at least
//! one pixel is not fully transparent.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::io::Cursor;
use thiserror::Error;

const DATA_URL_PREFIX: &str = "data:image/png;base64,";
const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Signature is not valid base64")]
    Encoding,

    #[error("Signature must be a PNG image")]
    NotPng,

    #[error("Signature PNG could not be decoded: {0}")]
    Decode(String),
}

/// An 8-bit RGB raster with an optional alpha plane
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
    pub alpha: Option<Vec<u8>>,
}

/// Decode a base64 PNG or PNG data URL into raw bytes
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, SignatureError> {
    let trimmed = payload.trim();
    let encoded = trimmed.strip_prefix(DATA_URL_PREFIX).unwrap_or(trimmed);
    let bytes = BASE64
        .decode(encoded)
        .map_err(|_| SignatureError::Encoding)?;
    if !bytes.starts_with(&PNG_MAGIC) {
        return Err(SignatureError::NotPng);
    }
    Ok(bytes)
}

/// Decode PNG bytes into separate RGB and alpha planes
pub fn decode_png(bytes: &[u8]) -> Result<DecodedImage, SignatureError> {
    if !bytes.starts_with(&PNG_MAGIC) {
        return Err(SignatureError::NotPng);
    }

    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::normalize_to_color8());
    let mut reader = decoder
        .read_info()
        .map_err(|e| SignatureError::Decode(e.to_string()))?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e| SignatureError::Decode(e.to_string()))?;
    buf.truncate(info.buffer_size());

    let pixels = (info.width as usize) * (info.height as usize);
    let (rgb, alpha) = match info.color_type {
        png::ColorType::Rgba => {
            let mut rgb = Vec::with_capacity(pixels * 3);
            let mut alpha = Vec::with_capacity(pixels);
            for px in buf.chunks_exact(4) {
                rgb.extend_from_slice(&px[..3]);
                alpha.push(px[3]);
            }
            (rgb, Some(alpha))
        }
        png::ColorType::Rgb => (buf, None),
        png::ColorType::GrayscaleAlpha => {
            let mut rgb = Vec::with_capacity(pixels * 3);
            let mut alpha = Vec::with_capacity(pixels);
            for px in buf.chunks_exact(2) {
                rgb.extend_from_slice(&[px[0], px[0], px[0]]);
                alpha.push(px[1]);
            }
            (rgb, Some(alpha))
        }
        png::ColorType::Grayscale => {
            let rgb = buf.iter().flat_map(|g| [*g, *g, *g]).collect();
            (rgb, None)
        }
        png::ColorType::Indexed => {
            return Err(SignatureError::Decode(
                "indexed color was not expanded".to_string(),
            ))
        }
    };

    Ok(DecodedImage {
        width: info.width,
        height: info.height,
        rgb,
        alpha,
    })
}

/// True when the image holds at least one visible pixel
///
/// Images without an alpha channel are opaque and always count as drawn.
pub fn has_ink(bytes: &[u8]) -> bool {
    match decode_png(bytes) {
        Ok(image) => match image.alpha {
            Some(alpha) => alpha.iter().any(|a| *a > 0),
            None => image.width > 0 && image.height > 0,
        },
        Err(_) => false,
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::rgba_png;
    use super::*;

    #[test]
    fn blank_canvas_has_no_ink() {
        let png = rgba_png(40, 10, &[]);
        assert!(!has_ink(&png));
    }

    #[test]
    fn single_stroke_counts_as_ink() {
        let png = rgba_png(40, 10, &[(3, 4)]);
        assert!(has_ink(&png));
    }

    #[test]
    fn decode_splits_alpha_plane() {
        let png = rgba_png(2, 2, &[(1, 1)]);
        let image = decode_png(&png).unwrap();
        assert_eq!(image.rgb.len(), 12);
        assert_eq!(image.alpha.unwrap(), vec![0, 0, 0, 255]);
    }

    #[test]
    fn data_url_prefix_is_stripped() {
        let png = rgba_png(2, 2, &[(0, 0)]);
        let url = format!("data:image/png;base64,{}", BASE64.encode(&png));
        assert_eq!(decode_payload(&url).unwrap(), png);
        assert_eq!(decode_payload(&BASE64.encode(&png)).unwrap(), png);
    }

    #[test]
    fn non_png_payloads_are_rejected() {
        assert_eq!(decode_payload("***"), Err(SignatureError::Encoding));
        assert_eq!(
            decode_payload(&BASE64.encode(b"GIF89a....")),
            Err(SignatureError::NotPng)
        );
        assert!(!has_ink(b"not a png"));
    }
}
