//! Frame container and grayscale conversion.
//!
//! A `Frame` is one acquired or processed image sample: a 2D grid of pixel
//! samples, either 3-channel RGB (as acquired from a source) or 1-channel
//! grayscale (after processing). Frames are immutable once produced; each
//! pipeline step takes ownership from the previous one.

use crate::error::SentryError;

/// Color-space stage of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// 3 bytes per pixel, RGB order, as acquired.
    Rgb,
    /// 1 byte per pixel, luma.
    Gray,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Rgb => 3,
            PixelFormat::Gray => 1,
        }
    }
}

/// One image sample from a video sequence.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl Frame {
    /// Wrap a pixel buffer. The buffer length must match
    /// `width * height * channels`.
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        let expected = width as usize * height as usize * format.channels();
        assert_eq!(
            data.len(),
            expected,
            "pixel buffer length {} does not match {}x{} {:?}",
            data.len(),
            width,
            height,
            format
        );
        Self {
            data,
            width,
            height,
            format,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Read-only pixel access. Row-major, no padding.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Total pixel count (not byte count).
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Convert to single-channel grayscale using Rec.601 luma weights.
    ///
    /// A frame that is already grayscale converts to itself.
    pub fn to_gray(&self) -> Frame {
        match self.format {
            PixelFormat::Gray => self.clone(),
            PixelFormat::Rgb => {
                let mut luma = Vec::with_capacity(self.pixel_count());
                for rgb in self.data.chunks_exact(3) {
                    let y = 0.299 * f32::from(rgb[0])
                        + 0.587 * f32::from(rgb[1])
                        + 0.114 * f32::from(rgb[2]);
                    luma.push(y.round().clamp(0.0, 255.0) as u8);
                }
                Frame::new(luma, self.width, self.height, PixelFormat::Gray)
            }
        }
    }

    /// Check that `other` shares this frame's width, height and color-space
    /// stage. Violations are programming errors, surfaced as `ShapeMismatch`.
    pub fn check_compatible(&self, other: &Frame) -> Result<(), SentryError> {
        if self.width != other.width || self.height != other.height || self.format != other.format
        {
            return Err(SentryError::ShapeMismatch {
                expected_width: self.width,
                expected_height: self.height,
                expected_format: self.format,
                actual_width: other.width,
                actual_height: other.height,
                actual_format: other.format,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_rgb(width: u32, height: u32, rgb: [u8; 3]) -> Frame {
        let data: Vec<u8> = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Frame::new(data, width, height, PixelFormat::Rgb)
    }

    #[test]
    fn grayscale_conversion_uses_luma_weights() {
        let frame = solid_rgb(4, 4, [255, 0, 0]);
        let gray = frame.to_gray();

        assert_eq!(gray.format(), PixelFormat::Gray);
        assert_eq!(gray.pixels().len(), 16);
        // 0.299 * 255 ~= 76
        assert!(gray.pixels().iter().all(|&p| p == 76));
    }

    #[test]
    fn grayscale_of_gray_frame_is_identity() {
        let gray = Frame::new(vec![7u8; 9], 3, 3, PixelFormat::Gray);
        let again = gray.to_gray();
        assert_eq!(again.pixels(), gray.pixels());
    }

    #[test]
    fn compatibility_rejects_dimension_mismatch() {
        let a = Frame::new(vec![0u8; 16], 4, 4, PixelFormat::Gray);
        let b = Frame::new(vec![0u8; 8], 4, 2, PixelFormat::Gray);
        assert!(a.check_compatible(&b).is_err());
    }

    #[test]
    fn compatibility_rejects_format_mismatch() {
        let a = Frame::new(vec![0u8; 16], 4, 4, PixelFormat::Gray);
        let b = solid_rgb(4, 4, [1, 2, 3]);
        assert!(a.check_compatible(&b).is_err());
    }

    #[test]
    #[should_panic]
    fn new_rejects_bad_buffer_length() {
        let _ = Frame::new(vec![0u8; 5], 4, 4, PixelFormat::Gray);
    }
}
