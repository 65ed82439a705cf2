//! RAW jobs through the operating system print spooler.
//!
//! Windows goes through the Win32 spooler API. Everywhere else the job is
//! piped to CUPS `lp -o raw`, which passes the bytes to the device untouched.
//!
//! A spool job is only handed to the printer by [`Connection::finish`]. A
//! connection dropped before that aborts the job, so a failed write never
//! leaves half a receipt in the queue.

use log::{debug, info};

use super::{Connection, Transport};
use crate::error::Error;

/// Document name shown in the spooler queue.
const DOC_NAME: &str = "Receipt";

/// Program that submits jobs where there is no Win32 spooler.
const LP: &str = "lp";

/// Named printer queue, or the system default when no name is given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpoolerTransport {
    name: Option<String>,
    #[cfg_attr(windows, allow(dead_code))]
    command: String,
}

impl SpoolerTransport {
    pub fn new(name: Option<String>) -> Self {
        SpoolerTransport {
            name,
            command: LP.to_string(),
        }
    }

    /// Submit jobs with `command` instead of `lp`. Ignored on Windows.
    pub fn command<S: Into<String>>(self, command: S) -> Self {
        SpoolerTransport {
            command: command.into(),
            ..self
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl Transport for SpoolerTransport {
    fn describe(&self) -> String {
        match &self.name {
            Some(name) => format!("spooler {}", name),
            None => "spooler (default printer)".to_string(),
        }
    }

    fn open(&self) -> Result<Box<dyn Connection>, Error> {
        info!("Opening {}", self.describe());
        #[cfg(not(windows))]
        let job = platform::open(&self.command, self.name.as_deref())?;
        #[cfg(windows)]
        let job = platform::open(self.name.as_deref())?;
        Ok(Box::new(SpoolConnection::new(job)))
    }
}

/// A job in progress on one of the platform spoolers.
trait SpoolJob {
    fn write(&mut self, buf: &[u8]) -> Result<(), Error>;

    /// Release the complete job to the printer.
    fn commit(&mut self) -> Result<(), Error>;

    /// Discard the job. Nothing of it gets printed.
    fn abort(&mut self);
}

struct SpoolConnection<J: SpoolJob> {
    job: J,
    committed: bool,
}

impl<J: SpoolJob> SpoolConnection<J> {
    fn new(job: J) -> Self {
        SpoolConnection { job, committed: false }
    }
}

impl<J: SpoolJob> Connection for SpoolConnection<J> {
    fn write_all(&mut self, buf: &[u8]) -> Result<(), Error> {
        self.job.write(buf)
    }

    fn finish(mut self: Box<Self>) -> Result<(), Error> {
        // A failed commit cleans up after itself; aborting again on drop
        // would only touch released handles.
        self.committed = true;
        self.job.commit()
    }
}

impl<J: SpoolJob> Drop for SpoolConnection<J> {
    fn drop(&mut self) {
        if !self.committed {
            debug!("Aborting unfinished spool job");
            self.job.abort();
        }
    }
}

#[cfg(not(windows))]
mod platform {
    use log::debug;
    use std::io::{ErrorKind, Write};
    use std::process::{Child, ChildStdin, Command, Stdio};

    use super::{SpoolJob, DOC_NAME};
    use crate::error::{Error, OpenFailure};

    pub(super) struct LpJob {
        program: String,
        child: Option<Child>,
        stdin: Option<ChildStdin>,
        device: String,
    }

    pub(super) fn open(program: &str, name: Option<&str>) -> Result<LpJob, Error> {
        let device = name.unwrap_or("default printer").to_string();
        let mut command = Command::new(program);
        command.args(&["-o", "raw", "-t", DOC_NAME]);
        if let Some(name) = name {
            command.args(&["-d", name]);
        }
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|err| match err.kind() {
            ErrorKind::NotFound => OpenFailure::Other {
                device: device.clone(),
                reason: format!("`{}` not found, install CUPS or configure a USB device", program),
            },
            ErrorKind::PermissionDenied => OpenFailure::PermissionDenied(device.clone()),
            _ => OpenFailure::Other {
                device: device.clone(),
                reason: err.to_string(),
            },
        })?;
        let stdin = child.stdin.take();
        debug!("Spawned {} for {}", program, device);

        Ok(LpJob {
            program: program.to_string(),
            child: Some(child),
            stdin,
            device,
        })
    }

    /// Map a failed `lp` run to an error, using CUPS' messages on stderr.
    pub(super) fn lp_failure(device: &str, program: &str, status: &str, stderr: &str) -> Error {
        let message = stderr.trim();
        let lower = message.to_lowercase();
        if lower.contains("does not exist")
            || lower.contains("no default destination")
            || lower.contains("unknown destination")
        {
            OpenFailure::NotFound(device.to_string()).into()
        } else if lower.contains("forbidden") || lower.contains("not authorized") {
            OpenFailure::PermissionDenied(device.to_string()).into()
        } else if lower.contains("scheduler not responding") {
            OpenFailure::Other {
                device: device.to_string(),
                reason: "CUPS scheduler is not running".to_string(),
            }
            .into()
        } else {
            Error::TransportWrite(format!(
                "{}: {} exited with {}: {}",
                device, program, status, message
            ))
        }
    }

    impl LpJob {
        /// Close stdin, which submits the job, and collect `lp`'s verdict.
        fn wait(&mut self) -> Result<(), Error> {
            self.stdin.take();
            let child = match self.child.take() {
                Some(child) => child,
                None => return Ok(()),
            };
            let output = child.wait_with_output()?;
            if output.status.success() {
                debug!("{} accepted job for {}", self.program, self.device);
                Ok(())
            } else {
                Err(lp_failure(
                    &self.device,
                    &self.program,
                    &output.status.to_string(),
                    &String::from_utf8_lossy(&output.stderr),
                ))
            }
        }
    }

    impl SpoolJob for LpJob {
        fn write(&mut self, buf: &[u8]) -> Result<(), Error> {
            let stdin = match self.stdin.as_mut() {
                Some(stdin) => stdin,
                None => {
                    return Err(Error::TransportWrite(format!(
                        "{}: spool job already closed",
                        self.device
                    )))
                }
            };
            match stdin.write_all(buf).and_then(|_| stdin.flush()) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == ErrorKind::BrokenPipe => {
                    // lp quit without reading the job; its stderr tells why.
                    self.wait()?;
                    Err(Error::TransportWrite(format!(
                        "{}: {} closed its input early",
                        self.device, self.program
                    )))
                }
                Err(err) => Err(Error::TransportWrite(format!("{}: {}", self.device, err))),
            }
        }

        fn commit(&mut self) -> Result<(), Error> {
            self.wait()
        }

        fn abort(&mut self) {
            self.stdin.take();
            if let Some(mut child) = self.child.take() {
                let _ = child.kill();
                let _ = child.wait();
                debug!("Cancelled unfinished spool job for {}", self.device);
            }
        }
    }

}

#[cfg(windows)]
mod platform {
    use core::ffi::c_void;
    use log::debug;
    use windows::core::{PCWSTR, PWSTR};
    use windows::Win32::Foundation::{ERROR_ACCESS_DENIED, ERROR_INVALID_PRINTER_NAME};
    use windows::Win32::Graphics::Printing::{
        AbortPrinter, ClosePrinter, EndDocPrinter, EndPagePrinter, GetDefaultPrinterW, OpenPrinterW,
        StartDocPrinterW, StartPagePrinter, WritePrinter, DOC_INFO_1W, PRINTER_HANDLE,
    };

    use super::{SpoolJob, DOC_NAME};
    use crate::error::{Error, OpenFailure};

    fn to_wide(s: &str) -> Vec<u16> {
        s.encode_utf16().chain(std::iter::once(0)).collect()
    }

    fn default_printer() -> Option<String> {
        unsafe {
            let mut needed: u32 = 0;
            let _ = GetDefaultPrinterW(None, &mut needed);
            if needed == 0 {
                return None;
            }
            let mut buf: Vec<u16> = vec![0; needed as usize];
            if !GetDefaultPrinterW(Some(PWSTR(buf.as_mut_ptr())), &mut needed).as_bool() {
                return None;
            }
            PWSTR(buf.as_mut_ptr()).to_string().ok()
        }
    }

    /// Map an `OpenPrinterW` failure to what the operator should check.
    pub(super) fn open_failure(device: &str, err: &windows::core::Error) -> OpenFailure {
        let code = err.code();
        if code == ERROR_ACCESS_DENIED.to_hresult() {
            OpenFailure::PermissionDenied(device.to_string())
        } else if code == ERROR_INVALID_PRINTER_NAME.to_hresult() {
            OpenFailure::NotFound(device.to_string())
        } else {
            OpenFailure::Other {
                device: device.to_string(),
                reason: err.to_string(),
            }
        }
    }

    pub(super) struct RawJob {
        handle: PRINTER_HANDLE,
        open: bool,
        device: String,
    }

    pub(super) fn open(name: Option<&str>) -> Result<RawJob, Error> {
        let device = match name {
            Some(name) => name.to_string(),
            None => default_printer().ok_or_else(|| OpenFailure::NotFound("default printer".to_string()))?,
        };

        unsafe {
            let mut handle = PRINTER_HANDLE::default();
            let name_w = to_wide(&device);
            OpenPrinterW(PCWSTR::from_raw(name_w.as_ptr()), &mut handle, None)
                .map_err(|err| open_failure(&device, &err))?;

            let doc_name_w = to_wide(DOC_NAME);
            let datatype_w = to_wide("RAW");
            let doc_info = DOC_INFO_1W {
                pDocName: PWSTR(doc_name_w.as_ptr() as *mut _),
                pOutputFile: PWSTR::null(),
                pDatatype: PWSTR(datatype_w.as_ptr() as *mut _),
            };

            if StartDocPrinterW(handle, 1, &doc_info as *const DOC_INFO_1W) == 0 {
                let _ = ClosePrinter(handle);
                return Err(OpenFailure::Other {
                    device,
                    reason: "StartDocPrinter failed".to_string(),
                }
                .into());
            }
            if !StartPagePrinter(handle).as_bool() {
                let _ = AbortPrinter(handle);
                let _ = ClosePrinter(handle);
                return Err(OpenFailure::Other {
                    device,
                    reason: "StartPagePrinter failed".to_string(),
                }
                .into());
            }

            debug!("Started RAW spool job on {}", device);
            Ok(RawJob {
                handle,
                open: true,
                device,
            })
        }
    }

    impl SpoolJob for RawJob {
        fn write(&mut self, buf: &[u8]) -> Result<(), Error> {
            let mut written: u32 = 0;
            let ok = unsafe {
                WritePrinter(
                    self.handle,
                    buf.as_ptr() as *const c_void,
                    buf.len() as u32,
                    &mut written,
                )
            };
            if !ok.as_bool() {
                return Err(Error::TransportWrite(format!("{}: WritePrinter failed", self.device)));
            }
            if written != buf.len() as u32 {
                return Err(Error::TransportWrite(format!(
                    "{}: incomplete write, {} of {} bytes",
                    self.device,
                    written,
                    buf.len()
                )));
            }
            Ok(())
        }

        fn commit(&mut self) -> Result<(), Error> {
            if !self.open {
                return Ok(());
            }
            self.open = false;
            let (page, doc) = unsafe {
                let page = EndPagePrinter(self.handle).as_bool();
                let doc = EndDocPrinter(self.handle).as_bool();
                let _ = ClosePrinter(self.handle);
                (page, doc)
            };
            if page && doc {
                debug!("Spooled RAW job on {}", self.device);
                Ok(())
            } else {
                Err(Error::TransportWrite(format!("{}: EndDocPrinter failed", self.device)))
            }
        }

        fn abort(&mut self) {
            if self.open {
                unsafe {
                    let _ = AbortPrinter(self.handle);
                    let _ = ClosePrinter(self.handle);
                }
                self.open = false;
                debug!("Aborted RAW spool job on {}", self.device);
            }
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::dispatch;
    use crate::escpos::encode_job;
    use crate::PrinterConfig;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default, PartialEq)]
    struct Calls {
        written: usize,
        committed: bool,
        aborted: bool,
    }

    struct FakeJob {
        fail_write: bool,
        calls: Arc<Mutex<Calls>>,
    }

    impl SpoolJob for FakeJob {
        fn write(&mut self, buf: &[u8]) -> Result<(), Error> {
            if self.fail_write {
                return Err(Error::TransportWrite("queue gone".to_string()));
            }
            self.calls.lock().unwrap().written += buf.len();
            Ok(())
        }

        fn commit(&mut self) -> Result<(), Error> {
            self.calls.lock().unwrap().committed = true;
            Ok(())
        }

        fn abort(&mut self) {
            self.calls.lock().unwrap().aborted = true;
        }
    }

    struct FakeSpooler {
        fail_write: bool,
        calls: Arc<Mutex<Calls>>,
    }

    impl Transport for FakeSpooler {
        fn describe(&self) -> String {
            "spooler fake".to_string()
        }

        fn open(&self) -> Result<Box<dyn Connection>, Error> {
            Ok(Box::new(SpoolConnection::new(FakeJob {
                fail_write: self.fail_write,
                calls: self.calls.clone(),
            })))
        }
    }

    fn run(fail_write: bool) -> Calls {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let spooler = FakeSpooler {
            fail_write,
            calls: calls.clone(),
        };
        let _ = dispatch(encode_job(None, "x\n", &PrinterConfig::default()), &spooler);
        let calls = calls.lock().unwrap();
        Calls {
            written: calls.written,
            committed: calls.committed,
            aborted: calls.aborted,
        }
    }

    #[test]
    fn describe_named_and_default() {
        assert_eq!(SpoolerTransport::new(Some("POS-80".into())).describe(), "spooler POS-80");
        assert_eq!(SpoolerTransport::new(None).describe(), "spooler (default printer)");
        assert_eq!(SpoolerTransport::new(None).name(), None);
    }

    #[test]
    fn finished_job_is_committed() {
        let calls = run(false);
        assert!(calls.written > 0);
        assert!(calls.committed);
        assert!(!calls.aborted);
    }

    #[test]
    fn failed_write_aborts_instead_of_committing() {
        let calls = run(true);
        assert_eq!(calls.written, 0);
        assert!(!calls.committed);
        assert!(calls.aborted);
    }
}
