//! Logo and text to a finished print job.

use log::{debug, warn};
use std::path::Path;

use crate::{
    bitmap::{quantize, MonochromeBitmap},
    config::PrinterConfig,
    error::Error,
    escpos::{encode_job, encode_logo, PrintJob},
    layout::layout,
    normalize::{load, normalize},
};

/// Load, lay out and quantize the logo at `path` for the configured bed.
pub fn render_bitmap(path: &Path, config: &PrinterConfig) -> Result<MonochromeBitmap, Error> {
    let source = load(path)?;
    let gray = normalize(&source);
    let laid_out = layout(&gray, config.print_width_dots(), config.layout_options())?;
    let bitmap = quantize(&laid_out, config.quantize_threshold());

    if bitmap.width() != config.print_width_dots() {
        return Err(Error::Encoding(format!(
            "bitmap is {} dots wide, printer bed is {}",
            bitmap.width(),
            config.print_width_dots()
        )));
    }
    Ok(bitmap)
}

/// Logo command bytes, raster or column as configured.
pub fn render_logo(path: &Path, config: &PrinterConfig) -> Result<Vec<u8>, Error> {
    let bitmap = render_bitmap(path, config)?;
    let options = config.bitmap_options();
    let printed = options.printed_width(bitmap.width());
    if printed > config.print_width_dots() {
        warn!(
            "Logo prints {} dots wide on a {} dot bed with single density columns, use column_density = \"double\"",
            printed,
            config.print_width_dots()
        );
    }
    encode_logo(&bitmap, options)
}

/// Build the whole job for `text`, with the logo at `logo` on top.
///
/// A logo that can't be loaded is skipped with a warning and the receipt is
/// printed without it. Any other failure aborts the job.
pub fn render_receipt(logo: Option<&Path>, text: &str, config: &PrinterConfig) -> Result<PrintJob, Error> {
    let logo_bytes = match logo {
        Some(path) => match render_logo(path, config) {
            Ok(bytes) => Some(bytes),
            Err(err @ Error::ImageLoad { .. }) => {
                warn!("{}, printing without logo", err);
                None
            }
            Err(err) => return Err(err),
        },
        None => None,
    };

    let job = encode_job(logo_bytes.as_deref(), text, config);
    debug!("Rendered receipt: {} bytes", job.len());
    Ok(job)
}
