use envsense_drivers::bme680::{self, Bme680};
use envsense_drivers::dht22::{self, Dht22};
use envsense_drivers::mhz19c::{self, Mhz19c};

use embedded_io_adapters::std::FromStd;

use linux_embedded_hal::i2cdev::linux::LinuxI2CDevice;
use linux_embedded_hal::{Delay, I2cdev};

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits, TTYPort};

use tracing::{debug, warn};

use crate::config::{Config, Mhz19cConfig};
use crate::error::{Error, Result};
use crate::gpio::{Gpio, Pin, StdClock};
use crate::window;

/// Reads humidity and temperature from the `DHT22` sensor.
///
/// Maps the GPIO register window on first use. Discarded attempts are
/// retried inside the driver and logged.
///
/// # Errors
///
/// Returns an error if the configured pin is invalid, if the register window
/// cannot be mapped, or if every attempt fails.
pub fn read_dht22(config: &Config) -> Result<dht22::Measurement> {
    let pin = Pin::new(config.dht22.pin)?;
    let window = window::ensure_initialized(&config.gpio)?;

    let mut sensor = Dht22::new(Gpio::new(window).line(pin), StdClock::new(), Delay);

    let measurement = sensor
        .read_with(|attempt, fault| {
            warn!(
                "DHT22 attempt {attempt} on GPIO {} failed: {fault:?}.",
                pin.index()
            );
        })
        .map_err(Error::from_dht22)?;

    debug!(
        "DHT22 on GPIO {}: {:.1} °C, {:.1} %RH.",
        pin.index(),
        measurement.temperature,
        measurement.humidity
    );

    Ok(measurement)
}

/// Reads temperature, pressure and humidity from the `BME680` sensor.
///
/// # Errors
///
/// Returns an error if the I²C device cannot be opened or the sensor address
/// cannot be selected, if a bus transaction fails, or if the sensor does not
/// complete the conversion in time.
pub fn read_bme680(config: &Config) -> Result<bme680::Measurement> {
    let bus = &config.bme680;
    let resource = bus.bus.display().to_string();

    let address = bus.address as u8;

    // `I2cdev` only selects the slave address on its first transaction.
    let _slave = LinuxI2CDevice::new(&bus.bus, u16::from(address))
        .map_err(|e| Error::unavailable(&resource, e))?;
    let i2c = I2cdev::new(&bus.bus).map_err(|e| Error::unavailable(&resource, e))?;
    debug!("Opened {resource} for the BME680 at {address:#04x}.");

    let mut sensor = Bme680::with_settings(i2c, Delay, bus.address, bus.settings);
    let measurement = sensor
        .read()
        .map_err(|e| Error::from_bme680(&resource, e))?;

    debug!(
        "BME680 on {resource}: {:.2} °C, {:.2} hPa, {:.3} %RH.",
        measurement.temperature, measurement.pressure, measurement.humidity
    );

    Ok(measurement)
}

/// Reads the CO₂ concentration from the `MH-Z19C` sensor.
///
/// # Errors
///
/// Returns an error if the serial port cannot be opened, if the response is
/// late or incomplete, or if it fails validation.
pub fn read_mhz19c(config: &Config) -> Result<mhz19c::Measurement> {
    let resource = config.mhz19c.port.display().to_string();
    let port = open_serial(&config.mhz19c).map_err(|e| Error::unavailable(&resource, e))?;

    let mut sensor = Mhz19c::new(FromStd::new(port));
    let measurement = sensor.read().map_err(|e| {
        let e = Error::from_mhz19c(&resource, e);
        warn!("Discarding MH-Z19C response: {e}.");
        e
    })?;

    debug!("MH-Z19C on {resource}: {} ppm.", measurement.co2);

    Ok(measurement)
}

// 8N1 raw mode with a bounded read timeout.
fn open_serial(config: &Mhz19cConfig) -> serialport::Result<TTYPort> {
    let port = serialport::new(config.port.to_string_lossy(), config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(config.timeout())
        .open_native()?;

    // Bytes received before the command belong to no response.
    port.clear(ClearBuffer::Input)?;

    Ok(port)
}
