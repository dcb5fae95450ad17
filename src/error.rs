//! Error types for the EClet driver
//!
//! Every failure falls into one of four classes, each with its own exit
//! status so scripts can tell a bad command line from a misbehaving device.

use crate::{device::DeviceError, validate::ArgumentError};
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

/// Main error type for the driver
#[derive(Error, Debug)]
pub enum EcletError {
    /// Malformed command line or a required argument missing
    #[error("{message}")]
    Usage { message: String },

    /// Input file or standard input could not be read
    #[error("Input error: cannot {operation} {path}")]
    Input {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Communication or protocol failure reported by the device
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// Internal failure of the hashing or verification library
    #[error("Crypto error: {message}")]
    Crypto {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl EcletError {
    /// Create a new usage error
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    /// Create a new input error
    pub fn input<P: Into<PathBuf>>(
        operation: impl Into<String>,
        path: P,
        source: std::io::Error,
    ) -> Self {
        Self::Input {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }

    /// Create a new crypto error
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new crypto error wrapping the library's own error
    pub fn crypto_with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Crypto {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Exit status reported for this error
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            Self::Usage { .. } => ExitStatus::Usage,
            Self::Input { .. } => ExitStatus::Input,
            Self::Device(_) => ExitStatus::Device,
            Self::Crypto { .. } => ExitStatus::Crypto,
        }
    }
}

impl From<ArgumentError> for EcletError {
    fn from(err: ArgumentError) -> Self {
        Self::usage(err.to_string())
    }
}

/// Process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitStatus {
    Success = 0,
    Usage = 2,
    Input = 3,
    Device = 4,
    Crypto = 5,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, EcletError>;
