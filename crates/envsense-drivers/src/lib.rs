//! `envsense-drivers` is a library crate that provides architecture-agnostic
//! drivers for the environmental sensors read by `envsense`.
//!
//! All drivers are implemented using only the [`embedded-hal`] and
//! [`embedded-io`] traits, ensuring compatibility with any platform
//! that supports these abstractions.
//!
//! The transport helpers ([`line`], [`bus`] and [`serial`]) are always
//! available, while every sensor driver sits behind its own feature.
//!
//! [`embedded-hal`]: https://crates.io/crates/embedded-hal
//! [`embedded-io`]: https://crates.io/crates/embedded-io

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![no_std]

pub mod bus;
pub mod line;
pub mod serial;

/// The `BME680` driver.
#[cfg(feature = "bme680")]
pub mod bme680;

/// The `DHT22` driver.
#[cfg(feature = "dht22")]
pub mod dht22;

/// The `MH-Z19C` driver.
#[cfg(feature = "mhz19c")]
pub mod mhz19c;
