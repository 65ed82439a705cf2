use escpos_receipt::{
    dispatch, escpos, render_bitmap, render_receipt, transport::Connection, transport::Transport,
    Error, OpenFailure, PrinterConfig,
};
use image::{Rgba, RgbaImage};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// 800x600 logo: transparent border around an opaque red block.
fn write_logo(path: &Path) {
    let mut image = RgbaImage::from_pixel(800, 600, Rgba([0, 0, 0, 0]));
    for y in 150..450 {
        for x in 200..600 {
            image.put_pixel(x, y, Rgba([200, 0, 0, 255]));
        }
    }
    image.save(path).unwrap();
}

#[test]
fn wide_rgba_logo_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logo.png");
    write_logo(&path);
    let config = PrinterConfig::default();

    let bitmap = render_bitmap(&path, &config).unwrap();
    assert_eq!(bitmap.width(), 384);
    // 800 -> floor(384 * 0.9) = 345, height round(600 * 345 / 800) = 259
    assert_eq!(bitmap.height(), 259);
    // transparent border composites to white
    assert!(!bitmap.get(0, 0));
    assert!(!bitmap.get(383, 0));
    assert!(!bitmap.get(0, 258));
    assert!(!bitmap.get(383, 258));
    // red block: luminance 60 is below the threshold
    assert!(bitmap.get(192, 129));

    let job = render_receipt(Some(&path), "Receipt #: 000001\n", &config).unwrap();
    let bytes = job.as_bytes();
    assert!(bytes.starts_with(&[0x1B, 0x40]));
    assert!(bytes.ends_with(&[0x1D, 0x56, 0x41, 0x10]));
    // raster header: 48 bytes per row, 259 rows
    assert!(contains(bytes, &[0x1D, 0x76, 0x30, 0x00, 48, 0, 0x03, 0x01]));
}

#[test]
fn no_logo_means_no_graphics() {
    let config = PrinterConfig::default();
    let job = render_receipt(None, "Tea  1  100.00\n", &config).unwrap();
    let bytes = job.as_bytes();
    assert!(!contains(bytes, &escpos::RASTER_HEADER[..3]));
    assert!(!contains(bytes, &escpos::COLUMN_HEADER));
    assert!(contains(bytes, b"Tea  1  100.00\n"));
}

#[test]
fn unmappable_text_keeps_one_byte_per_char() {
    let config = PrinterConfig::default();
    let text = "Caf\u{e9} \u{2603}\n";
    let with = render_receipt(None, text, &config).unwrap();
    let plain = render_receipt(None, "Cafe x\n", &config).unwrap();
    assert_eq!(with.len(), plain.len());
    assert!(contains(with.as_bytes(), &[b'C', b'a', b'f', 0x82, b' ', b'?', b'\n']));
}

/// Counts opens; the device is never there.
struct Unplugged {
    opens: Arc<AtomicUsize>,
}

impl Transport for Unplugged {
    fn describe(&self) -> String {
        "USB [0416:5011]".to_string()
    }

    fn open(&self) -> Result<Box<dyn Connection>, Error> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Err(OpenFailure::NotFound(self.describe()).into())
    }
}

#[test]
fn unplugged_printer_is_reported_without_retry() {
    let opens = Arc::new(AtomicUsize::new(0));
    let transport = Unplugged { opens: opens.clone() };
    let job = render_receipt(None, "x\n", &PrinterConfig::default()).unwrap();

    let err = dispatch(job, &transport).unwrap_err();
    assert!(err.reason.contains("connected and powered on"), "{}", err.reason);
    assert!(matches!(err.source, Error::TransportOpen(OpenFailure::NotFound(_))));
    assert_eq!(opens.load(Ordering::SeqCst), 1);
}
