//! ESC/POS byte stream encoding.
//!
//! Two ways of sending a logo are supported: a single raster command
//! (`GS v 0`) and the older column graphics (`ESC *`) that some clone
//! printers still need. Both are packed from a [`MonochromeBitmap`] without
//! touching it.

use log::debug;
use std::convert::TryFrom;

use crate::{
    bitmap::MonochromeBitmap,
    codepage::encode_text,
    config::{BitmapMode, BitmapOptions, PrinterConfig},
    error::Error,
};

/// ESC @ : initialize printer
pub const RESET: [u8; 2] = [0x1B, 0x40];
/// ESC 2 : default line spacing
pub const LINE_SPACING_DEFAULT: [u8; 2] = [0x1B, 0x32];
/// GS V A n : feed n then partial cut
pub const PARTIAL_CUT: [u8; 4] = [0x1D, 0x56, 0x41, 0x10];
/// GS v 0, normal scale
pub const RASTER_HEADER: [u8; 4] = [0x1D, 0x76, 0x30, 0x00];
/// ESC *
pub const COLUMN_HEADER: [u8; 2] = [0x1B, 0x2A];

const LF: u8 = 0x0A;
/// Line feed size used between column bands, in motion units.
const COLUMN_BAND_SPACING: u8 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
    Right,
}

impl Alignment {
    /// ESC a n
    pub fn command(self) -> [u8; 3] {
        let n = match self {
            Self::Left => 0x00,
            Self::Center => 0x01,
            Self::Right => 0x02,
        };
        [0x1B, 0x61, n]
    }
}

/// GS L nL nH : left margin in dots
pub fn left_margin(dots: u16) -> [u8; 4] {
    let [l, h] = dots.to_le_bytes();
    [0x1D, 0x4C, l, h]
}

/// GS W nL nH : printing area width in dots
pub fn print_area_width(dots: u16) -> [u8; 4] {
    let [l, h] = dots.to_le_bytes();
    [0x1D, 0x57, l, h]
}

/// ESC t n : select character code table
pub fn select_code_table(n: u8) -> [u8; 3] {
    [0x1B, 0x74, n]
}

fn dimension(value: usize, what: &str) -> Result<u16, Error> {
    if value == 0 {
        return Err(Error::Encoding(format!("{} is zero", what)));
    }
    u16::try_from(value).map_err(|_| Error::Encoding(format!("{} {} does not fit in 16 bits", what, value)))
}

/// Encode a bitmap as printer commands, using raster or column graphics.
pub fn encode_logo(bitmap: &MonochromeBitmap, options: &BitmapOptions) -> Result<Vec<u8>, Error> {
    match options.mode {
        BitmapMode::Raster => encode_raster(bitmap),
        BitmapMode::Column => encode_columns(bitmap, options.column_density.mode_byte()),
    }
}

/// `GS v 0 m xL xH yL yH d1...dk`, `x` in bytes per row and `y` in rows.
pub fn encode_raster(bitmap: &MonochromeBitmap) -> Result<Vec<u8>, Error> {
    let width_bytes = dimension(bitmap.bytes_per_row(), "raster width in bytes")?;
    let height = dimension(bitmap.height() as usize, "raster height")?;
    let data = bitmap.pack_rows();

    let mut buf: Vec<u8> = Vec::with_capacity(RASTER_HEADER.len() + 4 + data.len());
    buf.extend_from_slice(&RASTER_HEADER);
    buf.extend_from_slice(&width_bytes.to_le_bytes());
    buf.extend_from_slice(&height.to_le_bytes());
    buf.extend_from_slice(&data);

    debug!(
        "Raster logo: {} bytes per row, {} rows, {} bytes",
        width_bytes,
        height,
        buf.len()
    );
    Ok(buf)
}

/// `ESC * m nL nH d1...dn` per 8-dot band, `n` in dots.
///
/// Each data byte is one vertical column of the band, top dot in the most
/// significant bit. Line spacing is tightened for the bands and restored
/// afterwards.
pub fn encode_columns(bitmap: &MonochromeBitmap, density: u8) -> Result<Vec<u8>, Error> {
    let width = dimension(bitmap.width() as usize, "column width")?;
    dimension(bitmap.height() as usize, "column height")?;

    let bands = (bitmap.height() + 7) / 8;
    let mut buf: Vec<u8> = Vec::with_capacity(6 + bands as usize * (6 + width as usize));
    buf.extend_from_slice(&[0x1B, 0x33, COLUMN_BAND_SPACING]); // ESC 3 n

    for band in 0..bands {
        buf.extend_from_slice(&COLUMN_HEADER);
        buf.push(density);
        buf.extend_from_slice(&width.to_le_bytes());
        for x in 0..bitmap.width() {
            let mut column: u8 = 0x00;
            for bit in 0..8 {
                if bitmap.get(x, band * 8 + bit) {
                    column |= 0x80 >> bit;
                }
            }
            buf.push(column);
        }
        buf.push(LF);
    }

    buf.extend_from_slice(&LINE_SPACING_DEFAULT);
    debug!("Column logo: {} bands of {} dots, {} bytes", bands, width, buf.len());
    Ok(buf)
}

/// A finished print job, ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintJob {
    bytes: Vec<u8>,
}

impl PrintJob {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl AsRef<[u8]> for PrintJob {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Assemble a complete receipt.
///
/// Order: reset, line spacing, left margin, print width, centered logo with a
/// spacer line (only when `logo` is given), left aligned text in the
/// configured code page, blank line feed, partial cut.
pub fn encode_job(logo: Option<&[u8]>, text: &str, config: &PrinterConfig) -> PrintJob {
    let text_bytes = encode_text(text, config.text_code_page());
    let feed = usize::from(config.feed_line_count());
    let mut buf: Vec<u8> = Vec::with_capacity(32 + logo.map_or(0, |l| l.len()) + text_bytes.len() + feed);

    buf.extend_from_slice(&RESET);
    buf.extend_from_slice(&LINE_SPACING_DEFAULT);
    buf.extend_from_slice(&left_margin(0));
    // Validated configs never exceed u16; clamp rather than wrap otherwise.
    let width = u16::try_from(config.print_width_dots()).unwrap_or(u16::MAX);
    buf.extend_from_slice(&print_area_width(width));

    if let Some(logo) = logo {
        buf.extend_from_slice(&Alignment::Center.command());
        buf.extend_from_slice(logo);
        buf.push(LF);
    }

    buf.extend_from_slice(&Alignment::Left.command());
    let code_page = config.text_code_page();
    if !code_page.is_printer_default() {
        buf.extend_from_slice(&select_code_table(code_page.selector()));
    }
    buf.extend_from_slice(&text_bytes);

    buf.extend(std::iter::repeat(LF).take(feed));
    buf.extend_from_slice(&PARTIAL_CUT);

    debug!(
        "Assembled print job: {} bytes (logo: {}, text: {})",
        buf.len(),
        logo.map_or(0, |l| l.len()),
        text_bytes.len()
    );
    PrintJob { bytes: buf }
}
