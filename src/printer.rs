use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    config::{DeviceSelector, PrinterConfig},
    device::UsbId,
    dispatch::{Ack, Dispatcher},
    error::{DispatchError, Error},
    escpos::PrintJob,
    receipt::{LineItem, Order, ReceiptFormatter},
    renderer::render_receipt,
    transport::{self, Transport},
};

/// Result of a print request in the shape the front end expects:
/// `{"success":true}` or `{"success":false,"error":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrintOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PrintOutcome {
    pub fn ok() -> Self {
        PrintOutcome {
            success: true,
            error: None,
        }
    }

    pub fn failed<S: Into<String>>(error: S) -> Self {
        PrintOutcome {
            success: false,
            error: Some(error.into()),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| {
            format!(r#"{{"success":false,"error":"can't serialize outcome: {}"}}"#, err)
        })
    }
}

impl From<Result<Ack, DispatchError>> for PrintOutcome {
    fn from(result: Result<Ack, DispatchError>) -> Self {
        match result {
            Ok(_) => PrintOutcome::ok(),
            Err(err) => PrintOutcome::failed(err.reason),
        }
    }
}

/// A receipt printer: configuration plus the transport that reaches it.
pub struct Printer {
    config: PrinterConfig,
    dispatcher: Dispatcher,
}

impl Printer {
    /// Validate `config` and set up its transport. The device itself is only
    /// opened when a job is printed.
    pub fn new(config: PrinterConfig) -> Result<Self, Error> {
        let transport = transport::from_config(&config);
        Self::with_transport(config, transport)
    }

    pub fn with_transport(config: PrinterConfig, transport: Box<dyn Transport>) -> Result<Self, Error> {
        config.validate()?;
        info!("Printer ready on {}", transport.describe());
        Ok(Printer {
            config,
            dispatcher: Dispatcher::new(transport),
        })
    }

    pub fn config(&self) -> &PrinterConfig {
        &self.config
    }

    /// Description of the device jobs are sent to.
    pub fn device(&self) -> String {
        self.dispatcher.describe()
    }

    /// Replace the configuration, and with it the transport.
    ///
    /// An invalid configuration is rejected and the current one kept.
    pub fn reconfigure(&mut self, config: PrinterConfig) -> Result<(), Error> {
        config.validate()?;
        self.dispatcher.replace(transport::from_config(&config));
        self.config = config;
        debug!("Printer reconfigured: {:?}", self.config);
        Ok(())
    }

    /// Point the printer at a specific USB device. The built-in table of
    /// known printers is still tried when it isn't connected.
    pub fn set_usb_device(&mut self, vendor_id: u16, product_id: u16, endpoint_out: Option<u8>) -> Result<(), Error> {
        let id = UsbId {
            endpoint_out,
            ..UsbId::new(vendor_id, product_id)
        };
        info!("Using USB printer {}", id);
        let config = self.config.clone().device(DeviceSelector::Usb {
            configured: vec![id],
            fallback: true,
        });
        self.reconfigure(config)
    }

    /// Build the job for `text` with the configured logo on top.
    pub fn render(&self, text: &str) -> Result<PrintJob, Error> {
        render_receipt(self.config.logo_path(), text, &self.config)
    }

    /// Send a finished job.
    pub fn print(&self, job: PrintJob) -> Result<Ack, DispatchError> {
        self.dispatcher.dispatch(job)
    }

    /// Render and print `text`. Failures are reported in the outcome.
    pub fn print_receipt(&self, text: &str) -> PrintOutcome {
        let job = match self.render(text) {
            Ok(job) => job,
            Err(err) => {
                warn!("Can't render receipt: {}", err);
                return PrintOutcome::failed(err.to_string());
            }
        };
        self.print(job).into()
    }

    pub fn print_order(&self, order: &Order, items: &[LineItem], formatter: &ReceiptFormatter) -> PrintOutcome {
        debug!("Printing order {} with {} items", order.id, items.len());
        self.print_receipt(&formatter.format(order, items))
    }
}
