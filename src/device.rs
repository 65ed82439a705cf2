//! USB printer discovery.
//!
//! A printer is located by vendor/product id. Configured ids are tried
//! first, then a table of receipt printers commonly found on POS counters.

use log::debug;
use rusb::{Device, DeviceDescriptor, DeviceHandle, UsbContext};
use serde::Deserialize;
use std::{fmt, time::Duration};

use crate::error::{Error, OpenFailure};

/// Vendor/product pair of a USB printer, with optional endpoint overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct UsbId {
    pub vendor_id: u16,
    pub product_id: u16,
    /// Bulk OUT endpoint address. Looked up from descriptors when absent.
    pub endpoint_out: Option<u8>,
    /// Interface to claim. Taken from the endpoint descriptor when absent.
    pub interface: Option<u8>,
}

impl UsbId {
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        UsbId {
            vendor_id,
            product_id,
            endpoint_out: None,
            interface: None,
        }
    }

    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id == vendor_id && self.product_id == product_id
    }
}

impl fmt::Display for UsbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

/// Known thermal receipt printers, tried in order after configured ids.
pub const KNOWN_PRINTERS: &[(UsbId, &str)] = &[
    (UsbId::new(0x0416, 0x5011), "Winbond POS-58/POS-80"),
    (UsbId::new(0x0483, 0x5720), "STMicro based POS-80"),
    (UsbId::new(0x0483, 0x5743), "STMicro based POS-58"),
    (UsbId::new(0x04B8, 0x0202), "Epson TM-T88"),
    (UsbId::new(0x04B8, 0x0E15), "Epson TM-T20II"),
    (UsbId::new(0x04B8, 0x0E28), "Epson TM-T20III"),
    (UsbId::new(0x0519, 0x0003), "Star TSP100"),
    (UsbId::new(0x1504, 0x0006), "Bixolon SRP-350"),
    (UsbId::new(0x0FE6, 0x811E), "Xprinter XP-80"),
    (UsbId::new(0x1FC9, 0x2016), "Xprinter XP-58"),
    (UsbId::new(0x28E9, 0x0289), "GD32 based POS-80"),
];

const KEYWORDS: [&str; 7] = ["printer", "epson", "star", "brother", "thermal", "receipt", "pos"];

/// Ordered list of ids to try: configured ones first, then the table.
pub fn candidates(configured: &[UsbId], fallback: bool) -> Vec<UsbId> {
    let mut ids: Vec<UsbId> = Vec::new();
    let table = KNOWN_PRINTERS.iter().map(|(id, _)| *id).filter(|_| fallback);

    for id in configured.iter().copied().chain(table) {
        if !ids.iter().any(|seen| seen.matches(id.vendor_id, id.product_id)) {
            ids.push(id);
        }
    }
    ids
}

/// Name from the table of known printers, if the pair is listed.
pub fn known_name(vendor_id: u16, product_id: u16) -> Option<&'static str> {
    KNOWN_PRINTERS
        .iter()
        .find(|(id, _)| id.matches(vendor_id, product_id))
        .map(|(_, name)| *name)
}

/// A connected USB device as seen during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub vendor_id: u16,
    pub product_id: u16,
    pub bus: u8,
    pub address: u8,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

impl DeviceInfo {
    /// Guess whether this device is a receipt printer from its descriptors.
    pub fn is_probable_printer(&self) -> bool {
        if known_name(self.vendor_id, self.product_id).is_some() {
            return true;
        }
        let label = format!(
            "{} {}",
            self.manufacturer.as_deref().unwrap_or(""),
            self.product.as_deref().unwrap_or("")
        )
        .to_lowercase();
        label
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| KEYWORDS.contains(&word))
    }

    pub fn id(&self) -> UsbId {
        UsbId::new(self.vendor_id, self.product_id)
    }
}

/// List every connected USB device, with string descriptors when readable.
pub fn list_devices<T: UsbContext>(context: &T) -> Result<Vec<DeviceInfo>, Error> {
    let devices = context.devices()?;
    let mut found = Vec::new();

    for device in devices.iter() {
        let device_desc = match device.device_descriptor() {
            Ok(d) => d,
            Err(err) => {
                debug!("Failed to read device descriptor: {:?}", err);
                continue;
            }
        };

        let (manufacturer, product) = match device.open() {
            Ok(handle) => read_strings(&handle, &device_desc),
            Err(err) => {
                debug!(
                    "Can't open {:04x}:{:04x} for descriptors: {:?}",
                    device_desc.vendor_id(),
                    device_desc.product_id(),
                    err
                );
                (None, None)
            }
        };

        found.push(DeviceInfo {
            vendor_id: device_desc.vendor_id(),
            product_id: device_desc.product_id(),
            bus: device.bus_number(),
            address: device.address(),
            manufacturer,
            product,
        });
    }
    Ok(found)
}

fn read_strings<T: UsbContext>(
    handle: &DeviceHandle<T>,
    device_desc: &DeviceDescriptor,
) -> (Option<String>, Option<String>) {
    let timeout = Duration::from_secs(1);
    let language = match handle.read_languages(timeout) {
        Ok(languages) if !languages.is_empty() => languages[0],
        _ => return (None, None),
    };
    (
        handle
            .read_manufacturer_string(language, device_desc, timeout)
            .ok(),
        handle.read_product_string(language, device_desc, timeout).ok(),
    )
}

/// Open the first candidate present on the bus.
///
/// Candidates are tried in order. When none opens, the most specific
/// failure seen is reported (permission denied before busy before not found).
pub fn open_first<T: UsbContext>(
    context: &T,
    candidates: &[UsbId],
) -> Result<(UsbId, Device<T>, DeviceDescriptor, DeviceHandle<T>), Error> {
    let devices = context.devices()?;
    let mut failure: Option<OpenFailure> = None;

    for id in candidates {
        for device in devices.iter() {
            let device_desc = match device.device_descriptor() {
                Ok(d) => d,
                Err(_) => continue,
            };
            if !id.matches(device_desc.vendor_id(), device_desc.product_id()) {
                continue;
            }

            match device.open() {
                Ok(handle) => {
                    debug!("Opened printer {}", id);
                    return Ok((*id, device, device_desc, handle));
                }
                Err(err) => {
                    debug!("Failed to open {}: {:?}", id, err);
                    let this = OpenFailure::from_usb(&id.to_string(), err);
                    if failure.as_ref().map_or(true, |f| this.rank() > f.rank()) {
                        failure = Some(this);
                    }
                }
            }
        }
    }

    let tried = candidates
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    debug!("No USB printer opened, tried: {}", tried);
    Err(failure
        .unwrap_or_else(|| OpenFailure::NotFound(format!("USB [{}]", tried)))
        .into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(vendor_id: u16, product_id: u16, manufacturer: &str, product: &str) -> DeviceInfo {
        DeviceInfo {
            vendor_id,
            product_id,
            bus: 1,
            address: 2,
            manufacturer: Some(manufacturer.to_string()),
            product: Some(product.to_string()),
        }
    }

    #[test]
    fn configured_ids_come_first() {
        let configured = [UsbId::new(0x1234, 0x0001), UsbId::new(0x04B8, 0x0202)];
        let ids = candidates(&configured, true);
        assert_eq!(ids[0], configured[0]);
        assert_eq!(ids[1], configured[1]);
        assert_eq!(ids[2], UsbId::new(0x0416, 0x5011));
        // the Epson entry from the table is not repeated
        assert_eq!(
            ids.iter().filter(|id| id.matches(0x04B8, 0x0202)).count(),
            1
        );
        assert_eq!(ids.len(), 1 + KNOWN_PRINTERS.len());
    }

    #[test]
    fn configured_endpoint_survives_dedup() {
        let mut id = UsbId::new(0x0416, 0x5011);
        id.endpoint_out = Some(0x03);
        let ids = candidates(&[id], true);
        assert_eq!(ids[0].endpoint_out, Some(0x03));
    }

    #[test]
    fn no_fallback_means_configured_only() {
        let configured = [UsbId::new(0x1234, 0x0001)];
        assert_eq!(candidates(&configured, false), configured.to_vec());
    }

    #[test]
    fn printer_keywords() {
        assert!(info(0x1111, 0x2222, "EPSON", "TM-T20").is_probable_printer());
        assert!(info(0x1111, 0x2222, "Generic", "Thermal Receipt").is_probable_printer());
        assert!(info(0x1111, 0x2222, "", "POS-80").is_probable_printer());
        assert!(!info(0x1111, 0x2222, "Logitech", "USB Receiver").is_probable_printer());
        // "position" must not match "pos"
        assert!(!info(0x1111, 0x2222, "Acme", "Position Sensor").is_probable_printer());
    }

    #[test]
    fn table_hit_without_strings() {
        let mut device = info(0x0416, 0x5011, "", "");
        device.manufacturer = None;
        device.product = None;
        assert!(device.is_probable_printer());
        assert_eq!(known_name(0x0416, 0x5011), Some("Winbond POS-58/POS-80"));
    }

    #[test]
    fn display_is_hex() {
        assert_eq!(UsbId::new(0x04B8, 0x0202).to_string(), "04b8:0202");
    }
}
