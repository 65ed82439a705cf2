use log::debug;
use rusb::{Context, Device, DeviceDescriptor, DeviceHandle, Direction, TransferType};
use std::time::Duration;

use super::{Connection, Transport};
use crate::{
    device::{self, UsbId},
    error::{Error, OpenFailure},
};

/// Largest single bulk transfer.
const CHUNK_SIZE: usize = 16 * 1024;

#[derive(Debug, Clone, Copy)]
struct Endpoint {
    iface: u8,
    setting: u8,
    address: u8,
}

/// Raw USB printer, located by vendor/product id.
#[derive(Debug, Clone)]
pub struct UsbTransport {
    candidates: Vec<UsbId>,
    timeout: Duration,
}

impl UsbTransport {
    /// `candidates` are tried in order when the device is opened.
    pub fn new(candidates: Vec<UsbId>) -> Self {
        UsbTransport {
            candidates,
            timeout: Duration::from_secs(10),
        }
    }

    /// Timeout of each bulk transfer.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        UsbTransport { timeout, ..self }
    }

    fn find_endpoint(
        device: &Device<Context>,
        device_desc: &DeviceDescriptor,
        direction: Direction,
        transfer_type: TransferType,
    ) -> Option<Endpoint> {
        for n in 0..device_desc.num_configurations() {
            let config_desc = match device.config_descriptor(n) {
                Ok(c) => c,
                Err(_) => continue,
            };
            for interface in config_desc.interfaces() {
                for interface_desc in interface.descriptors() {
                    for endpoint_desc in interface_desc.endpoint_descriptors() {
                        if endpoint_desc.direction() == direction
                            && endpoint_desc.transfer_type() == transfer_type
                        {
                            return Some(Endpoint {
                                iface: interface_desc.interface_number(),
                                setting: interface_desc.setting_number(),
                                address: endpoint_desc.address(),
                            });
                        }
                    }
                }
            }
        }
        None
    }
}

impl Transport for UsbTransport {
    fn describe(&self) -> String {
        let ids: Vec<String> = self.candidates.iter().map(|id| id.to_string()).collect();
        format!("USB [{}]", ids.join(", "))
    }

    fn open(&self) -> Result<Box<dyn Connection>, Error> {
        let context = Context::new()?;
        let (id, device, device_desc, handle) = device::open_first(&context, &self.candidates)?;
        let name = id.to_string();

        let endpoint = match id.endpoint_out {
            Some(address) => Endpoint {
                iface: id.interface.unwrap_or(0),
                setting: 0,
                address,
            },
            None => Self::find_endpoint(&device, &device_desc, Direction::Out, TransferType::Bulk)
                .ok_or_else(|| OpenFailure::Other {
                    device: name.clone(),
                    reason: "no bulk OUT endpoint".to_string(),
                })?,
        };
        debug!("Using endpoint {:?} on {}", endpoint, name);

        // Linux usblp binds receipt printers; it must let go before we can claim.
        if let Err(err) = handle.set_auto_detach_kernel_driver(true) {
            debug!("Kernel driver auto detach unavailable: {:?}", err);
        }
        if let Ok(true) = handle.kernel_driver_active(endpoint.iface) {
            debug!("Kernel driver active on interface {} of {}", endpoint.iface, name);
        }

        handle
            .claim_interface(endpoint.iface)
            .map_err(|err| OpenFailure::from_usb(&name, err))?;

        let connection = UsbConnection {
            handle,
            endpoint,
            timeout: self.timeout,
            name,
        };
        if id.endpoint_out.is_none() {
            // Dropping `connection` on error releases the claimed interface.
            connection
                .handle
                .set_alternate_setting(endpoint.iface, endpoint.setting)
                .map_err(|err| OpenFailure::from_usb(&connection.name, err))?;
        }
        Ok(Box::new(connection))
    }
}

struct UsbConnection {
    handle: DeviceHandle<Context>,
    endpoint: Endpoint,
    timeout: Duration,
    name: String,
}

impl Connection for UsbConnection {
    fn write_all(&mut self, buf: &[u8]) -> Result<(), Error> {
        for chunk in buf.chunks(CHUNK_SIZE) {
            let n = self
                .handle
                .write_bulk(self.endpoint.address, chunk, self.timeout)
                .map_err(|err| Error::TransportWrite(format!("{}: {}", self.name, err)))?;
            if n != chunk.len() {
                debug!(
                    "write error: bytes wrote {} != bytes supplied {}, possibly timeout ?",
                    n,
                    chunk.len()
                );
                return Err(Error::TransportWrite(format!(
                    "{}: short write, {} of {} bytes",
                    self.name,
                    n,
                    chunk.len()
                )));
            }
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<(), Error> {
        debug!("Job sent to {}", self.name);
        Ok(())
    }
}

impl Drop for UsbConnection {
    fn drop(&mut self) {
        if let Err(err) = self.handle.release_interface(self.endpoint.iface) {
            debug!("Failed to release interface on {}: {:?}", self.name, err);
        }
    }
}
