//! Pixel readback buffers and the row flip.
//!
//! A [`FrameBuffer`] is what a surface hands back: tightly packed RGBA8 rows
//! in whatever vertical order the rasterizer uses. GL-style rasterizers store
//! the bottom row first; image formats expect the top row first. [`extract`]
//! turns either kind into a top-down [`ImageBuffer`] in a fresh allocation,
//! leaving the source untouched for diagnostics.

use crate::error::{RenderError, RenderResult};

/// Bytes per RGBA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Vertical order of rows in a pixel buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowOrder {
    /// First row is the bottom of the image (GL readback).
    BottomUp,
    /// First row is the top of the image.
    TopDown,
}

/// Raw readback of a surface.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    pub order: RowOrder,
    pub data: Vec<u8>,
}

impl FrameBuffer {
    /// Wraps readback bytes, checking they cover exactly `width * height`.
    pub fn new(width: u32, height: u32, order: RowOrder, data: Vec<u8>) -> RenderResult<Self> {
        let expected = byte_len(width, height);
        if data.len() != expected {
            return Err(RenderError::readback(format!(
                "expected {expected} bytes for {width}x{height}, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            order,
            data,
        })
    }

    pub fn row_bytes(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// RGBA of the pixel in buffer order (row 0 is the first stored row).
    pub fn pixel(&self, x: u32, row: u32) -> [u8; 4] {
        pixel_at(&self.data, self.width, x, row)
    }
}

/// Top-down RGBA8 pixels ready for encoding.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl ImageBuffer {
    /// RGBA of the pixel at `(x, y)` with `y = 0` at the top.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        pixel_at(&self.data, self.width, x, y)
    }
}

pub fn byte_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * BYTES_PER_PIXEL
}

fn pixel_at(data: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
    let i = (y as usize * width as usize + x as usize) * BYTES_PER_PIXEL;
    [data[i], data[i + 1], data[i + 2], data[i + 3]]
}

/// Reverses the row order of `frame` into a new buffer.
///
/// Pixel `(x, y)` lands at `(x, height - 1 - y)` with its four channel bytes
/// and the left-to-right order of each row preserved.
pub fn flip_rows(frame: &FrameBuffer) -> ImageBuffer {
    let row = frame.row_bytes();
    let mut data = Vec::with_capacity(frame.data.len());
    if row > 0 {
        for src in frame.data.chunks_exact(row).rev() {
            data.extend_from_slice(src);
        }
    }
    ImageBuffer {
        width: frame.width,
        height: frame.height,
        data,
    }
}

/// Converts a readback into a top-down image, flipping when needed.
pub fn extract(frame: &FrameBuffer) -> ImageBuffer {
    match frame.order {
        RowOrder::BottomUp => flip_rows(frame),
        RowOrder::TopDown => ImageBuffer {
            width: frame.width,
            height: frame.height,
            data: frame.data.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Each pixel encodes its own coordinates so misplacements are visible.
    fn gradient(width: u32, height: u32, order: RowOrder) -> FrameBuffer {
        let mut data = Vec::with_capacity(byte_len(width, height));
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[x as u8, y as u8, (x ^ y) as u8, 255]);
            }
        }
        FrameBuffer::new(width, height, order, data).unwrap()
    }

    #[test]
    fn flip_moves_rows_and_keeps_columns() {
        let frame = gradient(5, 3, RowOrder::BottomUp);
        let image = flip_rows(&frame);
        for y in 0..3 {
            for x in 0..5 {
                assert_eq!(image.pixel(x, 2 - y), frame.pixel(x, y));
            }
        }
    }

    #[test]
    fn flip_is_an_involution() {
        let frame = gradient(7, 4, RowOrder::BottomUp);
        let once = flip_rows(&frame);
        let twice = flip_rows(&FrameBuffer::new(7, 4, RowOrder::BottomUp, once.data).unwrap());
        assert_eq!(twice.data, frame.data);
    }

    #[test]
    fn flip_preserves_length_for_odd_shapes() {
        for (w, h) in [(1, 1), (1, 9), (9, 1), (13, 6)] {
            let frame = gradient(w, h, RowOrder::BottomUp);
            assert_eq!(flip_rows(&frame).data.len(), frame.data.len());
        }
    }

    #[test]
    fn flip_leaves_source_intact() {
        let frame = gradient(4, 4, RowOrder::BottomUp);
        let before = frame.data.clone();
        let image = flip_rows(&frame);
        assert_eq!(frame.data, before);
        assert_ne!(image.data.as_ptr(), frame.data.as_ptr());
    }

    #[test]
    fn extract_only_flips_bottom_up_frames() {
        let top_down = gradient(3, 2, RowOrder::TopDown);
        assert_eq!(extract(&top_down).data, top_down.data);

        let bottom_up = gradient(3, 2, RowOrder::BottomUp);
        assert_eq!(extract(&bottom_up).pixel(0, 0), bottom_up.pixel(0, 1));
    }

    #[test]
    fn frame_rejects_wrong_length() {
        let err = FrameBuffer::new(2, 2, RowOrder::TopDown, vec![0; 15]).unwrap_err();
        assert!(err.to_string().contains("expected 16 bytes"));
    }
}
