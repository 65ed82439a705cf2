//! Error types for receipt rendering and printing.
//!
//! This module defines all possible errors that can occur while turning a
//! logo and receipt text into a print job and sending it to a printer.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for receipt rendering and printer communication.
#[derive(Error, Debug)]
pub enum Error {
    /// Logo image is missing or could not be decoded.
    ///
    /// Not fatal for a print job: the receipt is printed without a logo.
    #[error("Can't load logo image {path:?}: {reason}")]
    ImageLoad { path: PathBuf, reason: String },

    /// Bitmap dimensions can't be expressed in ESC/POS commands.
    #[error("Malformed bitmap: {0}")]
    Encoding(String),

    /// Printer device could not be opened.
    #[error(transparent)]
    TransportOpen(#[from] OpenFailure),

    /// Write to an opened printer failed part way through the job.
    #[error("Write to printer failed: {0}")]
    TransportWrite(String),

    /// Invalid configuration parameter provided.
    #[error("Invalid configuration parameter: {0}")]
    InvalidConfig(String),

    #[error("Can't parse configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// USB communication error.
    ///
    /// Wraps underlying rusb errors for device communication issues,
    /// timeouts, or permission problems.
    #[error(transparent)]
    UsbError(#[from] rusb::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Why a printer device could not be opened.
///
/// Each variant carries the device description and renders a message that
/// tells the operator what to check.
#[derive(Error, Debug)]
pub enum OpenFailure {
    #[error("Printer {0} not found: check that it is connected and powered on")]
    NotFound(String),

    #[error("Permission denied opening printer {0}: grant this user access to the device (udev rule or printer group)")]
    PermissionDenied(String),

    #[error("Printer {0} is busy: close any other program using it and try again")]
    Busy(String),

    #[error("Can't open printer {device}: {reason}")]
    Other { device: String, reason: String },
}

impl OpenFailure {
    /// Map a USB error raised while opening `device` to an open failure.
    pub fn from_usb(device: &str, err: rusb::Error) -> Self {
        match err {
            rusb::Error::NotFound | rusb::Error::NoDevice => Self::NotFound(device.to_string()),
            rusb::Error::Access => Self::PermissionDenied(device.to_string()),
            rusb::Error::Busy => Self::Busy(device.to_string()),
            other => Self::Other {
                device: device.to_string(),
                reason: other.to_string(),
            },
        }
    }

    /// Higher rank means a more specific cause worth reporting to the user.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            Self::NotFound(_) => 0,
            Self::Other { .. } => 1,
            Self::Busy(_) => 2,
            Self::PermissionDenied(_) => 3,
        }
    }
}

/// Failure reported by the dispatcher.
///
/// `reason` is the human readable message shown to the operator; `source`
/// keeps the underlying error for logs.
#[derive(Error, Debug)]
#[error("{reason}")]
pub struct DispatchError {
    pub reason: String,
    #[source]
    pub source: Error,
}

impl From<Error> for DispatchError {
    fn from(source: Error) -> Self {
        DispatchError {
            reason: source.to_string(),
            source,
        }
    }
}
