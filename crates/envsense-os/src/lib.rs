//! `envsense-os` reads the `envsense` sensors from a Linux single-board
//! computer.
//!
//! It binds the architecture-agnostic drivers of `envsense-drivers` to the
//! operating system:
//!
//! - the `DHT22` line is bit-banged through the GPIO registers mapped from
//!   `/dev/gpiomem`
//! - the `BME680` is reached through an I²C character device
//! - the `MH-Z19C` is reached through a serial port
//!
//! Each entry point in [`sensors`] owns its transport for the duration of a
//! single measurement. The only state kept across calls is the GPIO register
//! window, which is mapped once per process and shared without locking:
//! concurrent GPIO-based reads must be serialized by the caller.

#![deny(missing_docs)]

/// Runtime configuration.
pub mod config;
pub mod edge;
/// Error management.
pub mod error;
pub mod gpio;
/// Measurement entry points, one per sensor.
pub mod sensors;
/// Memory-mapped register window.
#[allow(unsafe_code)]
pub mod window;

pub use config::Config;
pub use error::{Error, Result};
pub use sensors::{read_bme680, read_dht22, read_mhz19c};
