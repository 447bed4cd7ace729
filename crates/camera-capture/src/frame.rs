//! Video frame types and processing

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

use crate::CameraError;

/// Pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
    Gray8,
}

impl PixelFormat {
    /// Bytes per pixel
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Rgb24 => 3,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// Decoded video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Interleaved pixel data (width * height * channels)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Pixel layout of `data`
    pub format: PixelFormat,
    /// Capture timestamp (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw pixel data
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        timestamp_ns: u64,
        sequence: u32,
    ) -> Result<Self, CameraError> {
        let expected = width as usize * height as usize * format.channels();
        if data.len() != expected {
            return Err(CameraError::Buffer {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            data,
            width,
            height,
            format,
            timestamp_ns,
            sequence,
        })
    }

    /// Wrap a grayscale image
    pub fn from_gray(image: GrayImage, timestamp_ns: u64, sequence: u32) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.into_raw(),
            width,
            height,
            format: PixelFormat::Gray8,
            timestamp_ns,
            sequence,
        }
    }

    /// Wrap a decoded image; single-channel 8-bit input stays grayscale
    pub fn from_dynamic(image: DynamicImage, timestamp_ns: u64, sequence: u32) -> Self {
        match image {
            DynamicImage::ImageLuma8(gray) => Self::from_gray(gray, timestamp_ns, sequence),
            other => {
                let rgb = other.to_rgb8();
                let (width, height) = rgb.dimensions();
                Self {
                    data: rgb.into_raw(),
                    width,
                    height,
                    format: PixelFormat::Rgb24,
                    timestamp_ns,
                    sequence,
                }
            }
        }
    }

    /// (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Get pixel at (x, y) as its raw channel bytes
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let channels = self.format.channels();
        let idx = (y as usize * self.width as usize + x as usize) * channels;
        self.data.get(idx..idx + channels)
    }

    /// Convert to a grayscale image; identity for `Gray8` frames
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            let value = match self.get_pixel(x, y) {
                Some([r, g, b]) => luminance(*r, *g, *b),
                Some([v]) => *v,
                _ => 0,
            };
            Luma([value])
        })
    }

    /// Convert to an RGB image (gray frames are replicated across channels)
    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| match self.get_pixel(x, y) {
            Some([r, g, b]) => Rgb([*r, *g, *b]),
            Some([v]) => Rgb([*v, *v, *v]),
            _ => Rgb([0, 0, 0]),
        })
    }
}

/// Luminance formula: 0.299*R + 0.587*G + 0.114*B
fn luminance(r: u8, g: u8, b: u8) -> u8 {
    (f32::from(r) * 0.299 + f32::from(g) * 0.587 + f32::from(b) * 0.114)
        .round()
        .min(255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray_frame_is_identity() {
        let gray = GrayImage::from_fn(4, 3, |x, y| Luma([(x * 10 + y) as u8]));
        let frame = VideoFrame::from_gray(gray.clone(), 0, 0);
        assert_eq!(frame.to_gray_image(), gray);
    }

    #[test]
    fn test_rgb_luminance() {
        let frame = VideoFrame::new(vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255], 4, 1, PixelFormat::Rgb24, 0, 0)
            .unwrap();
        let gray = frame.to_gray_image();
        assert_eq!(gray.get_pixel(0, 0)[0], 76);
        assert_eq!(gray.get_pixel(1, 0)[0], 150);
        assert_eq!(gray.get_pixel(2, 0)[0], 29);
        assert_eq!(gray.get_pixel(3, 0)[0], 255);
    }

    #[test]
    fn test_buffer_size_checked() {
        let result = VideoFrame::new(vec![0; 10], 2, 2, PixelFormat::Rgb24, 0, 0);
        assert!(matches!(result, Err(CameraError::Buffer { expected: 12, actual: 10 })));
    }

    #[test]
    fn test_pixel_bounds() {
        let frame = VideoFrame::from_gray(GrayImage::new(2, 2), 0, 0);
        assert!(frame.get_pixel(1, 1).is_some());
        assert!(frame.get_pixel(2, 0).is_none());
    }

    #[test]
    fn test_from_dynamic_keeps_gray() {
        let frame = VideoFrame::from_dynamic(DynamicImage::ImageLuma8(GrayImage::new(3, 2)), 5, 7);
        assert_eq!(frame.format, PixelFormat::Gray8);
        assert_eq!(frame.dimensions(), (3, 2));
        assert_eq!(frame.sequence, 7);

        let frame = VideoFrame::from_dynamic(DynamicImage::ImageRgb8(RgbImage::new(3, 2)), 0, 0);
        assert_eq!(frame.format, PixelFormat::Rgb24);
        assert_eq!(frame.data.len(), 18);
    }
}
