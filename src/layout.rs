//! Fit a grayscale logo onto the printer bed.
//!
//! The output is always exactly `print_width` dots wide: the content is
//! scaled to `print_width * margin_ratio` and centered on a white canvas.

use image::{imageops, GrayImage, Luma};
use log::debug;

use crate::error::Error;

/// Margin ratio used when none is configured.
pub const DEFAULT_MARGIN_RATIO: f32 = 0.90;

/// How the logo is scaled before centering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutOptions {
    /// Share of the print width the content may occupy, in `(0, 1]`.
    pub margin_ratio: f32,
    /// Never upscale images narrower than the target width.
    pub shrink_only: bool,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        LayoutOptions {
            margin_ratio: DEFAULT_MARGIN_RATIO,
            shrink_only: true,
        }
    }
}

impl LayoutOptions {
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.margin_ratio > 0.0 && self.margin_ratio <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "margin ratio must be in (0, 1], got {}",
                self.margin_ratio
            )));
        }
        Ok(())
    }

    /// Content width in dots for a bed of `print_width` dots.
    pub fn target_width(&self, print_width: u32) -> u32 {
        let target = (print_width as f32 * self.margin_ratio).floor() as u32;
        target.max(1).min(print_width)
    }
}

/// Scale `image` and center it on a white canvas `print_width` dots wide.
pub fn layout(image: &GrayImage, print_width: u32, options: &LayoutOptions) -> Result<GrayImage, Error> {
    options.validate()?;
    if print_width == 0 {
        return Err(Error::InvalidConfig("print width must be at least 1 dot".to_string()));
    }
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::Encoding(format!("logo has no pixels ({}x{})", width, height)));
    }

    let target = options.target_width(print_width);
    let mut content = if width > target || (width < target && !options.shrink_only) {
        scale_to_width(image, target)
    } else {
        image.clone()
    };

    // Rounding must never leave content wider than the bed.
    if content.width() > print_width {
        debug!(
            "Content width {} exceeds bed {}, refitting",
            content.width(),
            print_width
        );
        content = scale_to_width(&content, print_width);
    }

    let mut canvas = GrayImage::from_pixel(print_width, content.height(), Luma([255]));
    let offset = (print_width - content.width()) / 2;
    imageops::replace(&mut canvas, &content, i64::from(offset), 0);

    debug!(
        "Laid out {}x{} logo as {}x{} at x offset {}",
        width,
        height,
        content.width(),
        content.height(),
        offset
    );

    if canvas.width() != print_width {
        return Err(Error::Encoding(format!(
            "layout produced width {} instead of {}",
            canvas.width(),
            print_width
        )));
    }
    Ok(canvas)
}

fn scale_to_width(image: &GrayImage, target: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    let scaled_height = (f64::from(height) * f64::from(target) / f64::from(width)).round() as u32;
    imageops::resize(image, target, scaled_height.max(1), imageops::FilterType::Lanczos3)
}
