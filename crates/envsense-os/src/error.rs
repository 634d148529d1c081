use std::io;

use envsense_drivers::bme680::Bme680Error;
use envsense_drivers::dht22::{Dht22Error, Fault};
use envsense_drivers::mhz19c::Mhz19cError;

/// All errors that may occur while acquiring a measurement.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A device could not be opened, mapped or configured.
    #[error("{resource} is unavailable: {reason}")]
    TransportUnavailable {
        /// Device or file that could not be acquired.
        resource: String,
        /// Underlying failure.
        reason: String,
    },
    /// An I/O operation on an open device failed.
    #[error("I/O error on {resource}: {reason}")]
    Transport {
        /// Device on which the operation failed.
        resource: String,
        /// Underlying failure.
        reason: String,
    },
    /// A bounded wait exceeded its deadline.
    #[error("{sensor} timed out: {detail}")]
    Timeout {
        /// Sensor or line being read.
        sensor: &'static str,
        /// What was being awaited.
        detail: String,
    },
    /// Received data does not match its checksum.
    #[error("{sensor} checksum mismatch")]
    ChecksumMismatch {
        /// Sensor being read.
        sensor: &'static str,
    },
    /// A response frame has an unexpected shape.
    #[error(
        "{sensor} framing mismatch at byte {offset}: expected {expected:#04x}, found {found:#04x}"
    )]
    FramingMismatch {
        /// Sensor being read.
        sensor: &'static str,
        /// Offset of the mismatching byte.
        offset: usize,
        /// Expected value.
        expected: u8,
        /// Received value.
        found: u8,
    },
    /// The sensor did not flag new data within its polling budget.
    #[error("{sensor} did not report new data in time")]
    DataNotReady {
        /// Sensor being read.
        sensor: &'static str,
    },
    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// A specialized [`Result`] type for [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    pub(crate) fn unavailable(resource: impl Into<String>, reason: impl ToString) -> Self {
        Self::TransportUnavailable {
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn transport(resource: impl Into<String>, reason: impl ToString) -> Self {
        Self::Transport {
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn from_dht22(e: Dht22Error<core::convert::Infallible>) -> Self {
        const SENSOR: &str = "DHT22";

        match e {
            Dht22Error::Pin(e) => match e {},
            Dht22Error::RetriesExhausted(Fault::Timeout(phase)) => Self::Timeout {
                sensor: SENSOR,
                detail: format!("no transition during {phase:?}"),
            },
            Dht22Error::RetriesExhausted(Fault::ChecksumMismatch) => {
                Self::ChecksumMismatch { sensor: SENSOR }
            }
        }
    }

    pub(crate) fn from_bme680<E: core::fmt::Debug>(resource: &str, e: Bme680Error<E>) -> Self {
        match e {
            Bme680Error::I2c(e) => Self::transport(resource, format!("{e:?}")),
            Bme680Error::DataNotReady => Self::DataNotReady { sensor: "BME680" },
        }
    }

    pub(crate) fn from_mhz19c(resource: &str, e: Mhz19cError<io::Error>) -> Self {
        const SENSOR: &str = "MH-Z19C";

        match e {
            Mhz19cError::Serial(e) if e.kind() == io::ErrorKind::TimedOut => Self::Timeout {
                sensor: SENSOR,
                detail: "incomplete response".into(),
            },
            Mhz19cError::Serial(e) => Self::transport(resource, e),
            Mhz19cError::Truncated => Self::transport(resource, "stream closed mid-frame"),
            Mhz19cError::FramingMismatch {
                offset,
                expected,
                found,
            } => Self::FramingMismatch {
                sensor: SENSOR,
                offset,
                expected,
                found,
            },
            Mhz19cError::ChecksumMismatch { .. } => Self::ChecksumMismatch { sensor: SENSOR },
        }
    }
}
