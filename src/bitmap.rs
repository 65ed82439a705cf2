//! 1-bit bitmaps for the print head.
//!
//! Quantization is a plain threshold with no dithering.

use image::{GrayImage, Luma};

use crate::error::Error;

/// Luminance threshold below which a pixel prints black.
pub const DEFAULT_THRESHOLD: u8 = 128;

/// One dot per pixel, row-major. `true` prints a black dot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonochromeBitmap {
    width: u32,
    height: u32,
    dots: Vec<bool>,
}

impl MonochromeBitmap {
    /// Build a bitmap from row-major dots.
    ///
    /// Fails when `dots` does not hold exactly `width * height` entries.
    pub fn from_dots(width: u32, height: u32, dots: Vec<bool>) -> Result<Self, Error> {
        let expected = width as usize * height as usize;
        if dots.len() != expected {
            return Err(Error::Encoding(format!(
                "{}x{} bitmap needs {} dots, got {}",
                width,
                height,
                expected,
                dots.len()
            )));
        }
        Ok(MonochromeBitmap { width, height, dots })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether the dot at (`x`, `y`) is black. Out of range reads blank.
    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.dots[y as usize * self.width as usize + x as usize]
    }

    pub fn bytes_per_row(&self) -> usize {
        (self.width as usize + 7) / 8
    }

    /// Pack each row into `ceil(width / 8)` bytes, most significant bit first.
    ///
    /// Bits past the right edge are always 0.
    pub fn pack_rows(&self) -> Vec<u8> {
        let stride = self.bytes_per_row();
        let mut packed = vec![0u8; stride * self.height as usize];

        for y in 0..self.height {
            let row = &mut packed[y as usize * stride..(y as usize + 1) * stride];
            for x in 0..self.width {
                if self.get(x, y) {
                    row[x as usize / 8] |= 0x80 >> (x % 8);
                }
            }
        }
        packed
    }

    /// Render back to a grayscale image, black as 0 and blank as 255.
    pub fn to_gray(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            if self.get(x, y) {
                Luma([0])
            } else {
                Luma([255])
            }
        })
    }
}

/// Threshold a grayscale image into a bitmap of the same size.
pub fn quantize(image: &GrayImage, threshold: u8) -> MonochromeBitmap {
    let (width, height) = image.dimensions();
    let dots = image.pixels().map(|p| p.0[0] < threshold).collect();
    MonochromeBitmap { width, height, dots }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_splits_black_and_white() {
        let img = GrayImage::from_fn(4, 1, |x, _| Luma([[0, 127, 128, 255][x as usize]]));
        let bitmap = quantize(&img, DEFAULT_THRESHOLD);
        assert_eq!(bitmap.width(), 4);
        assert_eq!(bitmap.height(), 1);
        assert_eq!(
            (0..4).map(|x| bitmap.get(x, 0)).collect::<Vec<_>>(),
            vec![true, true, false, false]
        );
    }

    #[test]
    fn quantize_is_idempotent() {
        let img = GrayImage::from_fn(37, 11, |x, y| Luma([((x * 7 + y * 13) % 256) as u8]));
        let once = quantize(&img, DEFAULT_THRESHOLD);
        let twice = quantize(&once.to_gray(), DEFAULT_THRESHOLD);
        assert_eq!(once, twice);
    }

    #[test]
    fn packs_msb_first() {
        let mut dots = vec![false; 8];
        dots[0] = true;
        dots[7] = true;
        let bitmap = MonochromeBitmap::from_dots(8, 1, dots).unwrap();
        assert_eq!(bitmap.pack_rows(), vec![0b1000_0001]);
    }

    #[test]
    fn trailing_bits_are_zero() {
        let bitmap = MonochromeBitmap::from_dots(10, 2, vec![true; 20]).unwrap();
        assert_eq!(bitmap.bytes_per_row(), 2);
        assert_eq!(bitmap.pack_rows(), vec![0xFF, 0xC0, 0xFF, 0xC0]);
    }

    #[test]
    fn rejects_inconsistent_dots() {
        assert!(matches!(
            MonochromeBitmap::from_dots(8, 2, vec![true; 15]),
            Err(Error::Encoding(_))
        ));
    }
}
