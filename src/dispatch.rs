//! Hand finished jobs to a transport.
//!
//! A job is written exactly once. There is no retry: a receipt printed twice
//! is worse than an error the cashier can act on. A transport that hangs
//! blocks the caller; only the transport's own timeouts apply.

use log::{debug, info, warn};
use std::sync::Mutex;

use crate::{
    error::DispatchError,
    escpos::PrintJob,
    transport::Transport,
};

/// Acknowledgment of a job the transport accepted in full.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub device: String,
    pub bytes_written: usize,
}

/// Send `job` through `transport`: open, one write, finish.
///
/// The connection is released on every path. Nothing is written when the
/// device can't be opened.
pub fn dispatch(job: PrintJob, transport: &dyn Transport) -> Result<Ack, DispatchError> {
    let device = transport.describe();
    debug!("Dispatching {} bytes to {}", job.len(), device);

    let mut connection = transport.open().map_err(|err| {
        warn!("Can't open {}: {}", device, err);
        DispatchError::from(err)
    })?;

    if let Err(err) = connection.write_all(job.as_bytes()) {
        warn!("Write to {} failed: {}", device, err);
        return Err(err.into());
    }
    connection.finish().map_err(|err| {
        warn!("Finishing job on {} failed: {}", device, err);
        DispatchError::from(err)
    })?;

    info!("Printed {} bytes on {}", job.len(), device);
    Ok(Ack {
        device,
        bytes_written: job.len(),
    })
}

/// Owns the transport of one physical printer and runs one job at a time.
pub struct Dispatcher {
    transport: Mutex<Box<dyn Transport>>,
}

impl Dispatcher {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Dispatcher {
            transport: Mutex::new(transport),
        }
    }

    pub fn describe(&self) -> String {
        match self.transport.lock() {
            Ok(transport) => transport.describe(),
            Err(poisoned) => poisoned.into_inner().describe(),
        }
    }

    /// Dispatch `job`, waiting for any job already in flight on this printer.
    pub fn dispatch(&self, job: PrintJob) -> Result<Ack, DispatchError> {
        // A panic in another job leaves the transport itself usable.
        let transport = match self.transport.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        dispatch(job, &**transport)
    }

    /// Swap the transport, e.g. after the printer configuration changed.
    pub fn replace(&self, transport: Box<dyn Transport>) {
        let mut guard = match self.transport.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        debug!("Replacing transport {} with {}", guard.describe(), transport.describe());
        *guard = transport;
    }
}
