//! Video frame type shared by capture, detection and composition

use image::RgbImage;

use crate::MediaError;

/// Decoded RGB video frame
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Presentation timestamp reported by the source (nanoseconds).
    /// Not reliable across camera firmwares, never used for telemetry alignment.
    pub timestamp_ns: u64,
    /// Source-side frame index
    pub sequence: u64,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ns: u64, sequence: u64) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Create a frame filled with a single colour
    pub fn solid(width: u32, height: u32, rgb: [u8; 3], sequence: u64) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(Self::byte_len(width, height))
            .collect();
        Self::new(data, width, height, 0, sequence)
    }

    /// Number of bytes an RGB24 frame of this size occupies
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }

    /// Check that the pixel buffer matches the declared dimensions
    pub fn validate(&self) -> Result<(), MediaError> {
        let expected = Self::byte_len(self.width, self.height);
        if self.data.len() != expected {
            return Err(MediaError::FrameSize {
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        self.data.get(idx..idx + 3).map(|p| [p[0], p[1], p[2]])
    }

    /// Move the pixels into an `image` buffer for drawing
    pub fn into_image(self) -> Result<(RgbImage, FrameTiming), MediaError> {
        let expected = Self::byte_len(self.width, self.height);
        let actual = self.data.len();
        let timing = FrameTiming {
            timestamp_ns: self.timestamp_ns,
            sequence: self.sequence,
        };
        RgbImage::from_raw(self.width, self.height, self.data)
            .map(|img| (img, timing))
            .ok_or(MediaError::FrameSize { expected, actual })
    }

    /// Rebuild a frame from a drawn image, keeping the original timing
    pub fn from_image(image: RgbImage, timing: FrameTiming) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, timing.timestamp_ns, timing.sequence)
    }
}

/// Timing carried across an image round trip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTiming {
    pub timestamp_ns: u64,
    pub sequence: u64,
}
