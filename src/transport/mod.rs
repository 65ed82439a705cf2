//! Printer transports.
//!
//! A [`Transport`] knows how to reach one printer; [`Transport::open`] hands
//! out a [`Connection`] that owns the device for the duration of one job.
//! Dropping a connection always releases the device, whether or not the job
//! was finished.

mod spooler;
mod usb;

pub use spooler::SpoolerTransport;
pub use usb::UsbTransport;

use crate::{
    config::{DeviceSelector, PrinterConfig},
    device::candidates,
    error::Error,
};

pub trait Transport: Send {
    /// Short description of the target device for logs and messages.
    fn describe(&self) -> String;

    /// Open the device for one job.
    fn open(&self) -> Result<Box<dyn Connection>, Error>;
}

/// An opened device. Released on drop.
pub trait Connection {
    /// Write the whole buffer or fail.
    fn write_all(&mut self, buf: &[u8]) -> Result<(), Error>;

    /// Complete the job and release the device.
    fn finish(self: Box<Self>) -> Result<(), Error>;
}

/// Build the transport selected by `config`.
pub fn from_config(config: &PrinterConfig) -> Box<dyn Transport> {
    match config.device_selector() {
        DeviceSelector::Usb {
            configured,
            fallback,
        } => Box::new(UsbTransport::new(candidates(configured, *fallback))),
        DeviceSelector::Spooler { name } => Box::new(SpoolerTransport::new(name.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::UsbId;

    #[test]
    fn selects_transport_from_config() {
        let usb = PrinterConfig::new(DeviceSelector::Usb {
            configured: vec![UsbId::new(0x0416, 0x5011)],
            fallback: false,
        });
        assert_eq!(from_config(&usb).describe(), "USB [0416:5011]");

        let spooler = PrinterConfig::new(DeviceSelector::Spooler {
            name: Some("POS-80".to_string()),
        });
        assert_eq!(from_config(&spooler).describe(), "spooler POS-80");

        let default = PrinterConfig::default();
        assert_eq!(from_config(&default).describe(), "spooler (default printer)");
    }
}
