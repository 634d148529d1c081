use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use envsense_drivers::bme680::{Address, Settings};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Runtime configuration of every sensor transport.
///
/// Missing sections and fields take their default values, so an empty JSON
/// object is a valid configuration for a Raspberry Pi 3 with the sensors on
/// their usual connections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Memory-mapped GPIO block.
    pub gpio: GpioConfig,
    /// `DHT22` line.
    pub dht22: Dht22Config,
    /// `BME680` bus.
    pub bme680: Bme680Config,
    /// `MH-Z19C` serial port.
    pub mhz19c: Mhz19cConfig,
}

impl Config {
    /// Loads a [`Config`] from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;

        Self::from_json(&contents).map_err(|e| match e {
            Error::Config(reason) => Error::Config(format!("{}: {reason}", path.display())),
            e => e,
        })
    }

    /// Parses a [`Config`] from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the string is not a valid configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }
}

/// Location of the GPIO register block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GpioConfig {
    /// Device exposing the GPIO registers.
    pub device: PathBuf,
    /// Physical address of the register block.
    pub base: u64,
    /// Number of bytes to map.
    pub length: usize,
    /// Root of the sysfs GPIO interface, used for edge waiting.
    pub sysfs: PathBuf,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/gpiomem"),
            // BCM2835 peripherals at 0x3F00_0000, GPIO block at +0x20_0000.
            base: 0x3F20_0000,
            length: 4096,
            sysfs: PathBuf::from("/sys/class/gpio"),
        }
    }
}

/// `DHT22` connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Dht22Config {
    /// BCM index of the data line.
    pub pin: u8,
}

impl Default for Dht22Config {
    fn default() -> Self {
        Self { pin: 17 }
    }
}

/// `BME680` connection and measurement settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Bme680Config {
    /// I²C character device.
    pub bus: PathBuf,
    /// Slave address.
    pub address: Address,
    /// Filter and oversampling settings.
    pub settings: Settings,
}

impl Default for Bme680Config {
    fn default() -> Self {
        Self {
            bus: PathBuf::from("/dev/i2c-1"),
            address: Address::default(),
            settings: Settings::default(),
        }
    }
}

/// `MH-Z19C` connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Mhz19cConfig {
    /// Serial device.
    pub port: PathBuf,
    /// Line speed in bauds.
    pub baud_rate: u32,
    /// Read timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Mhz19cConfig {
    /// Returns the read timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for Mhz19cConfig {
    fn default() -> Self {
        Self {
            port: PathBuf::from("/dev/ttyS0"),
            baud_rate: 9600,
            timeout_ms: 1000,
        }
    }
}
