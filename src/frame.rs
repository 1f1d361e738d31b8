use crate::error::CameraError;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Pixel layout of frames delivered by a camera driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 8-bit grayscale, one byte per pixel
    Mono8,
    /// 16-bit grayscale, little-endian, two bytes per pixel
    Mono16,
    /// Packed RGB, three bytes per pixel
    Rgb8,
}

impl PixelFormat {
    /// Get bytes per pixel for the format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Mono8 => 1,
            PixelFormat::Mono16 => 2,
            PixelFormat::Rgb8 => 3,
        }
    }
}

/// Frame as retrieved from the camera, before conversion to mono8
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Sequence number assigned by the driver
    pub sequence: u64,
    /// Timestamp when the frame was retrieved
    pub timestamp: SystemTime,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl RawFrame {
    pub fn new(sequence: u64, width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            sequence,
            timestamp: SystemTime::now(),
            width,
            height,
            format,
            data,
        }
    }

    /// Expected byte length for the declared geometry and format
    pub fn expected_size(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    /// Convert to an 8-bit grayscale frame
    ///
    /// Mono16 keeps the high byte of each sample; RGB uses the integer
    /// Rec. 601 luma weights.
    pub fn into_mono8(self) -> Result<Frame, CameraError> {
        let expected = self.expected_size();
        if self.data.len() != expected {
            return Err(CameraError::Conversion {
                details: format!(
                    "frame {} is {} bytes, expected {} for {}x{} {:?}",
                    self.sequence,
                    self.data.len(),
                    expected,
                    self.width,
                    self.height,
                    self.format
                ),
            });
        }

        let pixels = match self.format {
            PixelFormat::Mono8 => self.data,
            PixelFormat::Mono16 => self
                .data
                .chunks_exact(2)
                .map(|sample| sample[1])
                .collect(),
            PixelFormat::Rgb8 => self
                .data
                .chunks_exact(3)
                .map(|px| {
                    let luma =
                        (299 * px[0] as u32 + 587 * px[1] as u32 + 114 * px[2] as u32) / 1000;
                    luma as u8
                })
                .collect(),
        };

        Ok(Frame {
            sequence: self.sequence,
            timestamp: self.timestamp,
            width: self.width,
            height: self.height,
            pixels,
        })
    }
}

/// 8-bit grayscale frame, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub sequence: u64,
    pub timestamp: SystemTime,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Frame {
    /// Build a frame from row-major pixels, checking the length against the geometry
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, CameraError> {
        RawFrame::new(0, width, height, PixelFormat::Mono8, pixels).into_mono8()
    }

    /// Frame filled with a single intensity
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            sequence: 0,
            timestamp: SystemTime::now(),
            width,
            height,
            pixels: vec![value; width as usize * height as usize],
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Pixel at row `y`, column `x`
    pub fn get(&self, y: u32, x: u32) -> Option<u8> {
        if y >= self.height || x >= self.width {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Iterate rows top to bottom
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.pixels.chunks_exact(self.width.max(1) as usize)
    }

    pub fn size_bytes(&self) -> usize {
        self.pixels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono8_passthrough() {
        let raw = RawFrame::new(7, 3, 2, PixelFormat::Mono8, vec![1, 2, 3, 4, 5, 6]);
        let frame = raw.into_mono8().unwrap();

        assert_eq!(frame.sequence, 7);
        assert_eq!((frame.width(), frame.height()), (3, 2));
        assert_eq!(frame.pixels(), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(frame.get(1, 0), Some(4));
        assert_eq!(frame.get(2, 0), None);
    }

    #[test]
    fn test_mono16_keeps_high_byte() {
        let raw = RawFrame::new(0, 2, 1, PixelFormat::Mono16, vec![0xFF, 0x12, 0x00, 0xAB]);
        let frame = raw.into_mono8().unwrap();
        assert_eq!(frame.pixels(), &[0x12, 0xAB]);
    }

    #[test]
    fn test_rgb_luma() {
        let raw = RawFrame::new(
            0,
            3,
            1,
            PixelFormat::Rgb8,
            vec![255, 255, 255, 0, 0, 0, 255, 0, 0],
        );
        let frame = raw.into_mono8().unwrap();
        assert_eq!(frame.pixels(), &[255, 0, 76]);
    }

    #[test]
    fn test_size_mismatch_is_conversion_error() {
        let raw = RawFrame::new(3, 4, 4, PixelFormat::Mono8, vec![0; 15]);
        match raw.into_mono8() {
            Err(CameraError::Conversion { details }) => assert!(details.contains("15 bytes")),
            other => panic!("Expected conversion error, got {:?}", other),
        }
    }

    #[test]
    fn test_rows_iteration() {
        let frame = Frame::from_pixels(2, 3, vec![1, 2, 3, 4, 5, 6]).unwrap();
        let rows: Vec<&[u8]> = frame.rows().collect();
        assert_eq!(rows, vec![&[1u8, 2][..], &[3, 4][..], &[5, 6][..]]);
    }
}
