//! Printer configuration.
//!
//! A [`PrinterConfig`] is built either with the consuming builder methods or
//! loaded from a TOML file:
//!
//! ```toml
//! print_width_dots = 384
//! code_page = "pc437"
//! feed_lines = 4
//! logo = "assets/logo.png"
//!
//! [layout]
//! margin_ratio = 0.90
//! shrink_only = true
//! threshold = 128
//!
//! [bitmap]
//! mode = "raster"
//! column_density = "single"
//!
//! [device]
//! kind = "usb"
//! vendor_id = 0x0416
//! product_id = 0x5011
//! ```

use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::{
    bitmap::DEFAULT_THRESHOLD,
    codepage::CodePage,
    device::UsbId,
    error::Error,
    layout::{LayoutOptions, DEFAULT_MARGIN_RATIO},
};

/// Print width of an 80mm, 203 dpi printer head.
pub const DEFAULT_PRINT_WIDTH: u32 = 384;

/// Blank lines fed after the text, before the cut.
pub const DEFAULT_FEED_LINES: u8 = 4;

/// How the logo bitmap is sent to the printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BitmapMode {
    /// One `GS v 0` command carrying the whole bitmap.
    Raster,
    /// Legacy `ESC *` commands, one per 8-dot band.
    Column,
}

/// Horizontal density for column mode (`m` of `ESC * m`).
///
/// `Single` prints each dot at twice the head's dot pitch, so a bitmap as
/// wide as the print bed runs past its right edge on most printers. Use
/// `Double` for full width logos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnDensity {
    Single,
    Double,
}

impl ColumnDensity {
    pub fn mode_byte(self) -> u8 {
        match self {
            Self::Single => 0x00,
            Self::Double => 0x01,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmapOptions {
    pub mode: BitmapMode,
    pub column_density: ColumnDensity,
}

impl BitmapOptions {
    /// Width on paper, in head dots, of a bitmap `width` dots wide.
    pub fn printed_width(&self, width: u32) -> u32 {
        match (self.mode, self.column_density) {
            (BitmapMode::Column, ColumnDensity::Single) => width.saturating_mul(2),
            _ => width,
        }
    }
}

impl Default for BitmapOptions {
    fn default() -> Self {
        BitmapOptions {
            mode: BitmapMode::Raster,
            column_density: ColumnDensity::Single,
        }
    }
}

/// Which printer to talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelector {
    /// Raw USB. `configured` ids are tried first, then the built-in table
    /// of known printers when `fallback` is set.
    Usb { configured: Vec<UsbId>, fallback: bool },
    /// OS print spooler, RAW job. `None` means the system default printer.
    Spooler { name: Option<String> },
}

impl Default for DeviceSelector {
    fn default() -> Self {
        DeviceSelector::Spooler { name: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrinterConfig {
    device: DeviceSelector,
    print_width_dots: u32,
    code_page: CodePage,
    layout: LayoutOptions,
    threshold: u8,
    bitmap: BitmapOptions,
    feed_lines: u8,
    logo: Option<PathBuf>,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        PrinterConfig::new(DeviceSelector::default())
    }
}

impl PrinterConfig {
    /// Initialize configuration data with default values for `device`.
    ///
    /// # Example
    ///
    /// ```
    /// use escpos_receipt::{DeviceSelector, PrinterConfig};
    ///
    /// let config = PrinterConfig::new(DeviceSelector::Spooler { name: Some("POS-80".into()) })
    ///     .print_width(576)
    ///     .margin_ratio(0.95);
    /// assert_eq!(config.print_width_dots(), 576);
    /// ```
    pub fn new(device: DeviceSelector) -> PrinterConfig {
        PrinterConfig {
            device,
            print_width_dots: DEFAULT_PRINT_WIDTH,
            code_page: CodePage::default(),
            layout: LayoutOptions::default(),
            threshold: DEFAULT_THRESHOLD,
            bitmap: BitmapOptions::default(),
            feed_lines: DEFAULT_FEED_LINES,
            logo: None,
        }
    }

    pub fn device(self, device: DeviceSelector) -> Self {
        PrinterConfig { device, ..self }
    }

    pub fn print_width(self, dots: u32) -> Self {
        PrinterConfig {
            print_width_dots: dots,
            ..self
        }
    }

    pub fn code_page(self, code_page: CodePage) -> Self {
        PrinterConfig { code_page, ..self }
    }

    pub fn margin_ratio(self, margin_ratio: f32) -> Self {
        PrinterConfig {
            layout: LayoutOptions {
                margin_ratio,
                ..self.layout
            },
            ..self
        }
    }

    pub fn shrink_only(self, shrink_only: bool) -> Self {
        PrinterConfig {
            layout: LayoutOptions {
                shrink_only,
                ..self.layout
            },
            ..self
        }
    }

    pub fn threshold(self, threshold: u8) -> Self {
        PrinterConfig { threshold, ..self }
    }

    pub fn bitmap_mode(self, mode: BitmapMode) -> Self {
        PrinterConfig {
            bitmap: BitmapOptions { mode, ..self.bitmap },
            ..self
        }
    }

    pub fn column_density(self, column_density: ColumnDensity) -> Self {
        PrinterConfig {
            bitmap: BitmapOptions {
                column_density,
                ..self.bitmap
            },
            ..self
        }
    }

    pub fn feed_lines(self, feed_lines: u8) -> Self {
        PrinterConfig { feed_lines, ..self }
    }

    pub fn logo<P: Into<PathBuf>>(self, path: P) -> Self {
        PrinterConfig {
            logo: Some(path.into()),
            ..self
        }
    }

    pub fn without_logo(self) -> Self {
        PrinterConfig { logo: None, ..self }
    }

    pub fn device_selector(&self) -> &DeviceSelector {
        &self.device
    }

    pub fn print_width_dots(&self) -> u32 {
        self.print_width_dots
    }

    pub fn text_code_page(&self) -> CodePage {
        self.code_page
    }

    pub fn layout_options(&self) -> &LayoutOptions {
        &self.layout
    }

    pub fn quantize_threshold(&self) -> u8 {
        self.threshold
    }

    pub fn bitmap_options(&self) -> &BitmapOptions {
        &self.bitmap
    }

    pub fn feed_line_count(&self) -> u8 {
        self.feed_lines
    }

    pub fn logo_path(&self) -> Option<&Path> {
        self.logo.as_deref()
    }

    /// Check values that would otherwise fail in the middle of a print job.
    pub fn validate(&self) -> Result<(), Error> {
        if self.print_width_dots == 0 || self.print_width_dots > u32::from(u16::MAX) {
            return Err(Error::InvalidConfig(format!(
                "print width must be between 1 and {} dots, got {}",
                u16::MAX,
                self.print_width_dots
            )));
        }
        if self.feed_lines == 0 {
            return Err(Error::InvalidConfig("feed lines must be at least 1".to_string()));
        }
        if let DeviceSelector::Usb { configured, fallback } = &self.device {
            if configured.is_empty() && !fallback {
                return Err(Error::InvalidConfig(
                    "USB device needs vendor/product ids or the fallback table".to_string(),
                ));
            }
        }
        self.layout.validate()
    }

    /// Parse and validate a TOML configuration.
    pub fn from_toml_str(s: &str) -> Result<Self, Error> {
        let raw: RawConfig = toml::from_str(s)?;
        let config = raw.into_config()?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML configuration file.
    ///
    /// A relative `logo` path is resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(dir) = path.parent() {
            config.logo = config.logo.take().map(|logo| {
                if logo.is_relative() {
                    dir.join(logo)
                } else {
                    logo
                }
            });
        }
        debug!("Loaded printer config from {:?}: {:?}", path, config);
        Ok(config)
    }
}

// On-disk layout. Every field is optional and falls back to the defaults
// of `PrinterConfig::new`.

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    print_width_dots: Option<u32>,
    code_page: Option<CodePage>,
    feed_lines: Option<u8>,
    logo: Option<PathBuf>,
    #[serde(default)]
    layout: RawLayout,
    #[serde(default)]
    bitmap: RawBitmap,
    device: Option<RawDevice>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLayout {
    margin_ratio: Option<f32>,
    shrink_only: Option<bool>,
    threshold: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBitmap {
    mode: Option<BitmapMode>,
    column_density: Option<ColumnDensity>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum DeviceKind {
    Usb,
    Spooler,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDevice {
    kind: DeviceKind,
    vendor_id: Option<u16>,
    product_id: Option<u16>,
    endpoint_out: Option<u8>,
    interface: Option<u8>,
    #[serde(default)]
    alternates: Vec<UsbId>,
    fallback: Option<bool>,
    name: Option<String>,
}

impl RawDevice {
    fn into_selector(self) -> Result<DeviceSelector, Error> {
        match self.kind {
            DeviceKind::Spooler => Ok(DeviceSelector::Spooler { name: self.name }),
            DeviceKind::Usb => {
                let mut configured = Vec::new();
                match (self.vendor_id, self.product_id) {
                    (Some(vendor_id), Some(product_id)) => configured.push(UsbId {
                        vendor_id,
                        product_id,
                        endpoint_out: self.endpoint_out,
                        interface: self.interface,
                    }),
                    (None, None) => {}
                    _ => {
                        return Err(Error::InvalidConfig(
                            "vendor_id and product_id must be given together".to_string(),
                        ))
                    }
                }
                configured.extend(self.alternates);
                Ok(DeviceSelector::Usb {
                    configured,
                    fallback: self.fallback.unwrap_or(true),
                })
            }
        }
    }
}

impl RawConfig {
    fn into_config(self) -> Result<PrinterConfig, Error> {
        let device = match self.device {
            Some(device) => device.into_selector()?,
            None => DeviceSelector::default(),
        };
        let mut config = PrinterConfig::new(device);

        if let Some(width) = self.print_width_dots {
            config = config.print_width(width);
        }
        if let Some(code_page) = self.code_page {
            config = config.code_page(code_page);
        }
        if let Some(feed_lines) = self.feed_lines {
            config = config.feed_lines(feed_lines);
        }
        if let Some(logo) = self.logo {
            config = config.logo(logo);
        }

        config = config
            .margin_ratio(self.layout.margin_ratio.unwrap_or(DEFAULT_MARGIN_RATIO))
            .shrink_only(self.layout.shrink_only.unwrap_or(true))
            .threshold(self.layout.threshold.unwrap_or(DEFAULT_THRESHOLD));

        if let Some(mode) = self.bitmap.mode {
            config = config.bitmap_mode(mode);
        }
        if let Some(density) = self.bitmap.column_density {
            config = config.column_density(density);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = PrinterConfig::from_toml_str("").unwrap();
        assert_eq!(config, PrinterConfig::default());
        assert_eq!(config.print_width_dots(), 384);
        assert_eq!(config.bitmap_options().mode, BitmapMode::Raster);
    }

    #[test]
    fn full_file() {
        let config = PrinterConfig::from_toml_str(
            r#"
            print_width_dots = 576
            code_page = "wpc1252"
            feed_lines = 3
            logo = "logo.png"

            [layout]
            margin_ratio = 0.95
            shrink_only = false
            threshold = 100

            [bitmap]
            mode = "column"
            column_density = "double"

            [device]
            kind = "usb"
            vendor_id = 0x0416
            product_id = 0x5011
            endpoint_out = 0x03

            [[device.alternates]]
            vendor_id = 0x04b8
            product_id = 0x0202
            "#,
        )
        .unwrap();

        assert_eq!(config.print_width_dots(), 576);
        assert_eq!(config.text_code_page(), CodePage::Wpc1252);
        assert_eq!(config.feed_line_count(), 3);
        assert_eq!(config.layout_options().margin_ratio, 0.95);
        assert!(!config.layout_options().shrink_only);
        assert_eq!(config.quantize_threshold(), 100);
        assert_eq!(config.bitmap_options().mode, BitmapMode::Column);
        assert_eq!(config.bitmap_options().column_density, ColumnDensity::Double);
        assert_eq!(config.logo_path(), Some(Path::new("logo.png")));
        match config.device_selector() {
            DeviceSelector::Usb { configured, fallback } => {
                assert_eq!(configured.len(), 2);
                assert_eq!(configured[0].vendor_id, 0x0416);
                assert_eq!(configured[0].endpoint_out, Some(0x03));
                assert_eq!(configured[1].product_id, 0x0202);
                assert!(*fallback);
            }
            other => panic!("unexpected device {:?}", other),
        }
    }

    #[test]
    fn single_density_columns_print_double_width() {
        let raster = BitmapOptions::default();
        assert_eq!(raster.printed_width(384), 384);

        let single = BitmapOptions {
            mode: BitmapMode::Column,
            column_density: ColumnDensity::Single,
        };
        assert_eq!(single.printed_width(384), 768);
        assert_eq!(single.printed_width(192), 384);

        let double = BitmapOptions {
            column_density: ColumnDensity::Double,
            ..single
        };
        assert_eq!(double.printed_width(384), 384);
    }

    #[test]
    fn spooler_by_name() {
        let config = PrinterConfig::from_toml_str("[device]\nkind = \"spooler\"\nname = \"POS-80\"\n").unwrap();
        assert_eq!(
            config.device_selector(),
            &DeviceSelector::Spooler {
                name: Some("POS-80".to_string())
            }
        );
    }

    #[test]
    fn rejects_half_usb_id() {
        let err = PrinterConfig::from_toml_str("[device]\nkind = \"usb\"\nvendor_id = 1\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(PrinterConfig::from_toml_str("print_width_dots = 0").is_err());
        assert!(PrinterConfig::from_toml_str("feed_lines = 0").is_err());
        assert!(PrinterConfig::from_toml_str("[layout]\nmargin_ratio = 0.0").is_err());
        assert!(matches!(
            PrinterConfig::from_toml_str("unknown_key = 1"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn load_resolves_relative_logo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("printer.toml");
        std::fs::write(&path, "logo = \"assets/logo.png\"\n").unwrap();
        let config = PrinterConfig::load(&path).unwrap();
        assert_eq!(config.logo_path(), Some(dir.path().join("assets/logo.png").as_path()));
    }
}
