use crate::error::RegionError;
use crate::frame::Frame;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rectangular region of interest in pixel coordinates, inclusive bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mask {
    pub row1: u32,
    pub col1: u32,
    pub row2: u32,
    pub col2: u32,
}

impl Mask {
    /// Create a mask, rejecting inverted corners
    pub fn new(row1: u32, col1: u32, row2: u32, col2: u32) -> Result<Self, RegionError> {
        if row1 > row2 || col1 > col2 {
            return Err(RegionError::InvalidMask {
                row1,
                col1,
                row2,
                col2,
            });
        }
        Ok(Self {
            row1,
            col1,
            row2,
            col2,
        })
    }

    /// Columns covered; 0 for inverted corners
    pub fn width(&self) -> u32 {
        span(self.col1, self.col2)
    }

    /// Rows covered; 0 for inverted corners
    pub fn height(&self) -> u32 {
        span(self.row1, self.row2)
    }

    /// Number of pixels covered by the mask
    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// Check the mask against frame dimensions
    pub fn check_bounds(&self, width: u32, height: u32) -> Result<(), RegionError> {
        if self.row1 > self.row2 || self.col1 > self.col2 {
            return Err(RegionError::InvalidMask {
                row1: self.row1,
                col1: self.col1,
                row2: self.row2,
                col2: self.col2,
            });
        }
        if self.row2 >= height || self.col2 >= width {
            return Err(RegionError::MaskOutOfBounds {
                row1: self.row1,
                col1: self.col1,
                row2: self.row2,
                col2: self.col2,
                width,
                height,
            });
        }
        Ok(())
    }
}

/// Inclusive length of `start..=end`, 0 when inverted
fn span(start: u32, end: u32) -> u32 {
    end.checked_sub(start).map_or(0, |delta| delta.saturating_add(1))
}

impl fmt::Display for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rows {}..={}, cols {}..={}",
            self.row1, self.row2, self.col1, self.col2
        )
    }
}

/// Sum pixel intensities of `frame` inside `mask`
///
/// Rows are visited top to bottom and columns left to right.
pub fn sum_region(frame: &Frame, mask: &Mask) -> Result<u64, RegionError> {
    mask.check_bounds(frame.width(), frame.height())?;

    let stride = frame.width() as usize;
    let pixels = frame.pixels();
    let (col1, col2) = (mask.col1 as usize, mask.col2 as usize);

    let sum = (mask.row1 as usize..=mask.row2 as usize)
        .map(|row| {
            let start = row * stride;
            pixels[start + col1..=start + col2]
                .iter()
                .map(|&p| p as u64)
                .sum::<u64>()
        })
        .sum();

    Ok(sum)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_sum(frame: &Frame, mask: &Mask) -> u64 {
        let mut sum = 0u64;
        for r in mask.row1..=mask.row2 {
            for c in mask.col1..=mask.col2 {
                sum += frame.get(r, c).unwrap() as u64;
            }
        }
        sum
    }

    /// Deterministic pseudo-random frame (64-bit LCG)
    fn noise_frame(width: u32, height: u32, seed: u64) -> Frame {
        let mut state = seed;
        let pixels = (0..width * height)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                (state >> 56) as u8
            })
            .collect();
        Frame::from_pixels(width, height, pixels).unwrap()
    }

    #[test]
    fn test_reference_mask_on_uniform_frame() {
        let frame = Frame::filled(612, 512, 5);
        let mask = Mask::new(210, 10, 240, 500).unwrap();

        assert_eq!(sum_region(&frame, &mask).unwrap(), 76105);
        assert_eq!(mask.area(), 31 * 491);
    }

    #[test]
    fn test_matches_naive_oracle() {
        let mut seed = 1;
        for (width, height) in [(1, 1), (7, 3), (16, 16), (33, 17), (612, 512)] {
            let frame = noise_frame(width, height, seed);
            for step in 0..12u32 {
                let row1 = (step * 7) % height;
                let col1 = (step * 13) % width;
                let row2 = row1 + (step * 5) % (height - row1);
                let col2 = col1 + (step * 11) % (width - col1);
                let mask = Mask::new(row1, col1, row2, col2).unwrap();

                assert_eq!(
                    sum_region(&frame, &mask).unwrap(),
                    naive_sum(&frame, &mask),
                    "mask {} on {}x{}",
                    mask,
                    width,
                    height
                );
            }
            seed += 1;
        }
    }

    #[test]
    fn test_single_pixel_mask() {
        let frame = Frame::from_pixels(3, 2, vec![1, 2, 3, 4, 5, 6]).unwrap();
        let mask = Mask::new(1, 2, 1, 2).unwrap();
        assert_eq!(sum_region(&frame, &mask).unwrap(), 6);
    }

    #[test]
    fn test_full_frame_saturated() {
        let frame = Frame::filled(612, 512, 255);
        let mask = Mask::new(0, 0, 511, 611).unwrap();
        assert_eq!(sum_region(&frame, &mask).unwrap(), 255 * 612 * 512);
    }

    #[test]
    fn test_mask_out_of_bounds() {
        let frame = Frame::filled(612, 512, 1);

        let tall = Mask::new(0, 0, 512, 10).unwrap();
        assert!(matches!(
            sum_region(&frame, &tall),
            Err(RegionError::MaskOutOfBounds { height: 512, .. })
        ));

        let wide = Mask::new(0, 0, 10, 612).unwrap();
        assert!(matches!(
            sum_region(&frame, &wide),
            Err(RegionError::MaskOutOfBounds { width: 612, .. })
        ));
    }

    #[test]
    fn test_inverted_fields_have_empty_extent() {
        let inverted = Mask {
            row1: 5,
            col1: 9,
            row2: 2,
            col2: 3,
        };
        assert_eq!(inverted.width(), 0);
        assert_eq!(inverted.height(), 0);
        assert_eq!(inverted.area(), 0);
        assert!(sum_region(&Frame::filled(16, 8, 1), &inverted).is_err());
    }

    #[test]
    fn test_inverted_mask_rejected() {
        assert_eq!(
            Mask::new(10, 0, 5, 0),
            Err(RegionError::InvalidMask {
                row1: 10,
                col1: 0,
                row2: 5,
                col2: 0
            })
        );
        assert!(Mask::new(0, 9, 0, 8).is_err());
    }
}
