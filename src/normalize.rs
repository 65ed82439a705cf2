//! Logo loading and grayscale normalization.

use image::{DynamicImage, GrayImage, Luma};
use log::debug;
use std::path::Path;

use crate::error::Error;

/// Color layout of a decoded source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    Gray,
    GrayAlpha,
    Rgb,
    Rgba,
}

/// A decoded logo image, as loaded from disk.
#[derive(Debug, Clone)]
pub struct SourceImage {
    image: DynamicImage,
}

impl SourceImage {
    pub fn new(image: DynamicImage) -> Self {
        SourceImage { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Color mode after decoding.
    ///
    /// Palette and high bit depth images are reported by their nearest 8-bit
    /// layout since that is how they get normalized.
    pub fn color_mode(&self) -> ColorMode {
        let color = self.image.color();
        match (color.has_color(), color.has_alpha()) {
            (false, false) => ColorMode::Gray,
            (false, true) => ColorMode::GrayAlpha,
            (true, false) => ColorMode::Rgb,
            (true, true) => ColorMode::Rgba,
        }
    }
}

impl From<DynamicImage> for SourceImage {
    fn from(image: DynamicImage) -> Self {
        SourceImage::new(image)
    }
}

/// Load a logo from `path`.
///
/// PNG, ICO and JPEG are supported. A missing file and a decoding failure
/// both end up as [`Error::ImageLoad`].
pub fn load(path: &Path) -> Result<SourceImage, Error> {
    if !path.exists() {
        return Err(Error::ImageLoad {
            path: path.to_path_buf(),
            reason: "file does not exist".to_string(),
        });
    }

    let image = image::open(path).map_err(|err| Error::ImageLoad {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;

    debug!(
        "Loaded logo {:?}: {}x{} {:?}",
        path,
        image.width(),
        image.height(),
        image.color()
    );
    Ok(SourceImage::new(image))
}

/// Flatten transparency over white and convert to 8-bit luminance.
///
/// Alpha is treated as straight (not premultiplied). Luminance uses the
/// Rec.601 integer weights 299/587/114.
pub fn normalize(source: &SourceImage) -> GrayImage {
    match source.color_mode() {
        ColorMode::Gray => source.image.to_luma8(),
        _ => {
            let rgba = source.image.to_rgba8();
            let (width, height) = rgba.dimensions();
            let mut gray = GrayImage::new(width, height);

            for (x, y, pixel) in rgba.enumerate_pixels() {
                let [r, g, b, a] = pixel.0;
                let r = over_white(r, a);
                let g = over_white(g, a);
                let b = over_white(b, a);
                gray.put_pixel(x, y, Luma([luminance(r, g, b)]));
            }
            gray
        }
    }
}

fn over_white(channel: u8, alpha: u8) -> u8 {
    let c = u32::from(channel);
    let a = u32::from(alpha);
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}

fn luminance(r: u8, g: u8, b: u8) -> u8 {
    let y = 299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b);
    ((y + 500) / 1000) as u8
}
