//! ESC/POS Receipt Printing
//!
//! This crate turns a logo image and receipt text into a single ESC/POS job
//! for 58mm and 80mm thermal printers and sends it over raw USB or the
//! operating system print spooler.
//!
//! The logo goes through a fixed pipeline: [`normalize`] flattens it to
//! grayscale over white, [`layout`] scales and centers it on the print bed,
//! [`quantize`] thresholds it to one bit per dot and [`escpos`] packs it as
//! raster or column graphics.
//!
//! # Example
//!
//! ```rust,no_run
//! use escpos_receipt::{DeviceSelector, Printer, PrinterConfig};
//!
//! let config = PrinterConfig::new(DeviceSelector::Spooler { name: None })
//!     .logo("assets/logo.png");
//! let printer = Printer::new(config).unwrap();
//! let outcome = printer.print_receipt("Receipt #: 000042\nTOTAL: Rs. 900.00\n");
//! println!("{}", outcome.to_json());
//! ```

mod bitmap;
mod codepage;
mod config;
mod device;
mod dispatch;
mod error;
pub mod escpos;
mod layout;
mod normalize;
mod printer;
mod receipt;
mod renderer;
pub mod transport;

pub use crate::{
    bitmap::{quantize, MonochromeBitmap, DEFAULT_THRESHOLD},
    codepage::{encode_text, CodePage},
    config::{
        BitmapMode, BitmapOptions, ColumnDensity, DeviceSelector, PrinterConfig, DEFAULT_FEED_LINES,
        DEFAULT_PRINT_WIDTH,
    },
    device::{candidates, known_name, list_devices, DeviceInfo, UsbId, KNOWN_PRINTERS},
    dispatch::{dispatch, Ack, Dispatcher},
    error::{DispatchError, Error, OpenFailure},
    escpos::{encode_job, encode_logo, PrintJob},
    layout::{layout, LayoutOptions, DEFAULT_MARGIN_RATIO},
    normalize::{load, normalize, ColorMode, SourceImage},
    printer::{PrintOutcome, Printer},
    receipt::{LineItem, Order, ReceiptFormatter},
    renderer::{render_bitmap, render_logo, render_receipt},
};
