//! PNG and base64 encoding of finished frames.

use base64::Engine as _;
use image::codecs::png::PngEncoder;
use image::error::{ParameterError, ParameterErrorKind};
use image::{ExtendedColorType, ImageEncoder, ImageError};

use crate::error::RenderResult;
use crate::pixels::{ImageBuffer, byte_len};

/// Serializes a top-down RGBA8 image as PNG.
pub fn encode_png(image: &ImageBuffer) -> RenderResult<Vec<u8>> {
    // The encoder panics on a size mismatch.
    if image.data.len() != byte_len(image.width, image.height) {
        return Err(ImageError::Parameter(ParameterError::from_kind(
            ParameterErrorKind::DimensionMismatch,
        ))
        .into());
    }

    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(
        &image.data,
        image.width,
        image.height,
        ExtendedColorType::Rgba8,
    )?;
    Ok(png)
}

/// Standard base64 (with padding), as embedded in the JSON envelope.
pub fn encode_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(width: u32, height: u32) -> ImageBuffer {
        let mut data = Vec::new();
        for y in 0..height {
            for x in 0..width {
                let v = if (x + y) % 2 == 0 { 255 } else { 0 };
                data.extend_from_slice(&[v, 0, 255 - v, 255]);
            }
        }
        ImageBuffer {
            width,
            height,
            data,
        }
    }

    #[test]
    fn png_keeps_dimensions_and_pixels() {
        let image = checker(6, 3);
        let png = encode_png(&image).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (6, 3));
        assert_eq!(decoded.as_raw(), &image.data);
    }

    #[test]
    fn mismatched_buffer_is_an_encode_error() {
        let image = ImageBuffer {
            width: 4,
            height: 4,
            data: vec![0; 10],
        };
        assert!(encode_png(&image).is_err());
    }

    #[test]
    fn base64_uses_padded_standard_alphabet() {
        assert_eq!(encode_base64(b"cube"), "Y3ViZQ==");
        assert_eq!(encode_base64(&[0xfb, 0xff]), "+/8=");
    }
}
