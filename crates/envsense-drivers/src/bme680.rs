//! # BME680 Driver
//!
//! This module provides a synchronous, architecture-agnostic driver for the
//! `BME680` environmental sensor, reading temperature, pressure and humidity
//! over the I²C protocol.
//!
//! Each reading triggers a single conversion in *forced mode*, waits for the
//! sensor to flag new data and then converts the raw ADC counts into physical
//! units through the integer compensation formulas published by Bosch. The
//! compensation depends on factory calibration constants stored in the
//! sensor, which are fetched again for every reading.
//!
//! The gas sensing part of the `BME680` is not driven.
//!
//! For detailed specifications, refer to the
//! [datasheet](https://www.bosch-sensortec.com/media/boschsensortec/downloads/datasheets/bst-bme680-ds001.pdf)
//! and the reference [`BME68x` API](https://github.com/boschsensortec/BME68x_SensorAPI).

use core::result::Result::{self, Err, Ok};

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::bus::Bus;

// Register map.
const REG_COEFF_1: u8 = 0x8A;
const REG_COEFF_2: u8 = 0xE1;
const REG_COEFF_3: u8 = 0x00;
const REG_STATUS: u8 = 0x1D;
const REG_DATA: u8 = 0x1F;
const REG_CTRL_HUM: u8 = 0x72;
const REG_CTRL_MEAS: u8 = 0x74;
const REG_CONFIG: u8 = 0x75;

// Lengths of the calibration ranges and of the data burst.
const COEFF_1_LEN: usize = 23;
const COEFF_2_LEN: usize = 14;
const COEFF_3_LEN: usize = 5;
const DATA_LEN: usize = 8;

/// Total number of calibration bytes read from the sensor.
pub const CALIBRATION_LEN: usize = COEFF_1_LEN + COEFF_2_LEN + COEFF_3_LEN;

const NEW_DATA: u8 = 0x80; // Status bit set once a conversion completed.
const FORCED_MODE: u8 = 0b01;

const MAX_STATUS_POLLS: usize = 10;
const STATUS_POLL_DELAY_MS: u32 = 10;

// Humidity is computed in thousandths of a percent.
const HUMIDITY_MAX: i32 = 100_000;

/// I²C address of the `BME680` sensor.
///
/// The sensor supports two possible addresses depending on how the SDO pin
/// is connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Address {
    /// Primary: `0x76` when SDO is connected to GND.
    Primary = 0x76,
    /// Secondary: `0x77` when SDO is connected to VDDIO.
    #[default]
    Secondary = 0x77,
}

impl TryFrom<u8> for Address {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x76 => Ok(Self::Primary),
            0x77 => Ok(Self::Secondary),
            other => Err(other),
        }
    }
}

/// Oversampling rate of a single measurement channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Oversampling {
    /// The channel is not measured.
    Skipped = 0b000,
    /// One sample.
    X1 = 0b001,
    /// Two samples.
    X2 = 0b010,
    /// Four samples.
    X4 = 0b011,
    /// Eight samples.
    X8 = 0b100,
    /// Sixteen samples.
    X16 = 0b101,
}

/// Coefficient of the IIR filter applied to temperature and pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Filter {
    /// Filter disabled.
    Off = 0b000,
    /// Coefficient 1.
    C1 = 0b001,
    /// Coefficient 3.
    C3 = 0b010,
    /// Coefficient 7.
    C7 = 0b011,
    /// Coefficient 15.
    C15 = 0b100,
    /// Coefficient 31.
    C31 = 0b101,
    /// Coefficient 63.
    C63 = 0b110,
    /// Coefficient 127.
    C127 = 0b111,
}

/// Measurement settings applied before every forced conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Settings {
    /// IIR filter coefficient.
    pub filter: Filter,
    /// Humidity oversampling.
    pub humidity: Oversampling,
    /// Temperature oversampling.
    pub temperature: Oversampling,
    /// Pressure oversampling.
    pub pressure: Oversampling,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            filter: Filter::C3,
            humidity: Oversampling::X2,
            temperature: Oversampling::X8,
            pressure: Oversampling::X4,
        }
    }
}

impl Settings {
    #[inline]
    const fn config(self) -> u8 {
        (self.filter as u8) << 2
    }

    #[inline]
    const fn ctrl_hum(self) -> u8 {
        self.humidity as u8
    }

    #[inline]
    const fn ctrl_meas(self) -> u8 {
        // Writing the mode bits starts the conversion.
        ((self.temperature as u8) << 5) | ((self.pressure as u8) << 2) | FORCED_MODE
    }
}

/// A single temperature, pressure and humidity measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Measurement {
    /// Temperature in degrees Celsius (°C).
    pub temperature: f32,
    /// Pressure in hectopascal (hPa).
    pub pressure: f32,
    /// Relative humidity as a percentage (% RH).
    pub humidity: f32,
}

/// Factory calibration constants of a `BME680` sensor.
///
/// Field names follow the `par_*` coefficients of the datasheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CalibrationConstants {
    /// Temperature coefficient 1.
    pub t1: u16,
    /// Temperature coefficient 2.
    pub t2: i16,
    /// Temperature coefficient 3.
    pub t3: i8,

    /// Pressure coefficient 1.
    pub p1: u16,
    /// Pressure coefficient 2.
    pub p2: i16,
    /// Pressure coefficient 3.
    pub p3: i8,
    /// Pressure coefficient 4.
    pub p4: i16,
    /// Pressure coefficient 5.
    pub p5: i16,
    /// Pressure coefficient 6.
    pub p6: i8,
    /// Pressure coefficient 7.
    pub p7: i8,
    /// Pressure coefficient 8.
    pub p8: i16,
    /// Pressure coefficient 9.
    pub p9: i16,
    /// Pressure coefficient 10.
    pub p10: u8,

    /// Humidity coefficient 1, 12 bits.
    pub h1: u16,
    /// Humidity coefficient 2, 12 bits.
    pub h2: u16,
    /// Humidity coefficient 3.
    pub h3: i8,
    /// Humidity coefficient 4.
    pub h4: i8,
    /// Humidity coefficient 5.
    pub h5: i8,
    /// Humidity coefficient 6.
    pub h6: u8,
    /// Humidity coefficient 7.
    pub h7: i8,

    /// Heater resistance correction value.
    pub res_heat_val: i8,
    /// Heater resistance range.
    pub res_heat_range: u8,
    /// Gas resistance range switching error.
    pub range_sw_err: i8,
}

impl CalibrationConstants {
    /// Decodes the constants from the three calibration ranges read in
    /// sequence from `0x8A`, `0xE1` and `0x00`.
    #[must_use]
    pub fn from_registers(c: &[u8; CALIBRATION_LEN]) -> Self {
        let unsigned = |lsb: usize| u16::from_le_bytes([c[lsb], c[lsb + 1]]);
        let signed = |lsb: usize| i16::from_le_bytes([c[lsb], c[lsb + 1]]);
        let byte = |at: usize| i8::from_le_bytes([c[at]]);

        Self {
            t1: unsigned(31),
            t2: signed(0),
            t3: byte(2),

            p1: unsigned(4),
            p2: signed(6),
            p3: byte(8),
            p4: signed(10),
            p5: signed(12),
            p6: byte(15),
            p7: byte(14),
            p8: signed(18),
            p9: signed(20),
            p10: c[22],

            // The two humidity coefficients share the nibbles of byte 24.
            h1: (u16::from(c[25]) << 4) | u16::from(c[24] & 0x0F),
            h2: (u16::from(c[23]) << 4) | u16::from(c[24] >> 4),
            h3: byte(26),
            h4: byte(27),
            h5: byte(28),
            h6: c[29],
            h7: byte(30),

            res_heat_val: byte(37),
            res_heat_range: (c[39] & 0x30) >> 4,
            range_sw_err: (byte(41) & i8::from_le_bytes([0xF0])) / 16,
        }
    }

    /// Converts a raw sample into physical units.
    #[must_use]
    pub fn compensate(&self, raw: RawSample) -> Measurement {
        // Both pressure and humidity depend on the fine temperature.
        let (fine, temperature) = self.compensate_temperature(raw.temperature);
        let pressure = self.compensate_pressure(raw.pressure, fine);
        let humidity = self.compensate_humidity(raw.humidity, fine);

        Measurement {
            temperature: f32::from(temperature) / 100.0,
            pressure: pressure as f32 / 100.0,
            humidity: humidity as f32 / 1000.0,
        }
    }

    /// Returns the fine temperature and the temperature in hundredths of a
    /// degree Celsius.
    #[must_use]
    pub fn compensate_temperature(&self, adc: u32) -> (FineTemperature, i16) {
        let var1 = (i64::from(adc) >> 3) - (i64::from(self.t1) << 1);
        let var2 = (var1 * i64::from(self.t2)) >> 11;
        let var3 = ((var1 >> 1) * (var1 >> 1)) >> 12;
        let var3 = (var3 * (i64::from(self.t3) << 4)) >> 14;

        let t_fine = (var2 + var3) as i32;

        (FineTemperature(t_fine), ((t_fine * 5 + 128) >> 8) as i16)
    }

    /// Returns the pressure in pascal.
    #[must_use]
    pub fn compensate_pressure(&self, adc: u32, fine: FineTemperature) -> u32 {
        // Above this threshold the division is performed first to avoid
        // overflowing, below it last to preserve precision.
        const OVERFLOW_CHECK: i32 = 1 << 30;

        let p1 = i32::from(self.p1);
        let p2 = i32::from(self.p2);
        let p3 = i32::from(self.p3);
        let p4 = i32::from(self.p4);
        let p5 = i32::from(self.p5);
        let p6 = i32::from(self.p6);
        let p7 = i32::from(self.p7);
        let p8 = i32::from(self.p8);
        let p9 = i32::from(self.p9);
        let p10 = i32::from(self.p10);

        let mut var1 = (fine.0 >> 1) - 64000;
        let mut var2 = ((((var1 >> 2).wrapping_mul(var1 >> 2)) >> 11).wrapping_mul(p6)) >> 2;
        var2 = var2.wrapping_add(var1.wrapping_mul(p5) << 1);
        var2 = (var2 >> 2).wrapping_add(p4 << 16);
        var1 = ((((var1 >> 2).wrapping_mul(var1 >> 2) >> 13).wrapping_mul(p3 << 5)) >> 3)
            .wrapping_add(p2.wrapping_mul(var1) >> 1);
        var1 >>= 18;
        var1 = (32768 + var1).wrapping_mul(p1) >> 15;

        if var1 == 0 {
            // Blank calibration, the division below is undefined.
            return 0;
        }

        let mut pressure = 1_048_576 - adc as i32;
        pressure = (pressure.wrapping_sub(var2 >> 12) as u32).wrapping_mul(3125) as i32;
        pressure = if pressure >= OVERFLOW_CHECK {
            pressure.wrapping_div(var1) << 1
        } else {
            (pressure << 1).wrapping_div(var1)
        };

        let var1 = p9.wrapping_mul((pressure >> 3).wrapping_mul(pressure >> 3) >> 13) >> 12;
        let var2 = (pressure >> 2).wrapping_mul(p8) >> 13;
        let var3 = (pressure >> 8)
            .wrapping_mul(pressure >> 8)
            .wrapping_mul(pressure >> 8)
            .wrapping_mul(p10)
            >> 17;

        let correction = var1.wrapping_add(var2).wrapping_add(var3).wrapping_add(p7 << 7);

        pressure.wrapping_add(correction >> 4) as u32
    }

    /// Returns the relative humidity in thousandths of a percent, clamped to
    /// `[0, 100000]`.
    #[must_use]
    pub fn compensate_humidity(&self, adc: u16, fine: FineTemperature) -> u32 {
        let h1 = i32::from(self.h1);
        let h2 = i32::from(self.h2);
        let h3 = i32::from(self.h3);
        let h4 = i32::from(self.h4);
        let h5 = i32::from(self.h5);
        let h6 = i32::from(self.h6);
        let h7 = i32::from(self.h7);

        let temp_scaled = (fine.0 * 5 + 128) >> 8;

        let var1 = (i32::from(adc) - h1 * 16) - ((temp_scaled.wrapping_mul(h3) / 100) >> 1);
        let quadratic = (temp_scaled.wrapping_mul(temp_scaled.wrapping_mul(h5) / 100) >> 6) / 100;
        let var2 = h2.wrapping_mul(
            (temp_scaled.wrapping_mul(h4) / 100)
                .wrapping_add(quadratic)
                .wrapping_add(1 << 14),
        ) >> 10;
        let var3 = var1.wrapping_mul(var2);
        let var4 = ((h6 << 7) + (temp_scaled.wrapping_mul(h7) / 100)) >> 4;
        let var5 = ((var3 >> 14).wrapping_mul(var3 >> 14)) >> 10;
        let var6 = var4.wrapping_mul(var5) >> 1;
        let humidity = (var3.wrapping_add(var6) >> 10).wrapping_mul(1000) >> 12;

        humidity.clamp(0, HUMIDITY_MAX) as u32
    }
}

/// Intermediate temperature shared by the pressure and humidity
/// compensation.
///
/// Only [`CalibrationConstants::compensate_temperature`] produces it, so
/// temperature is always compensated first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FineTemperature(i32);

impl FineTemperature {
    /// Returns the raw fine temperature value.
    #[must_use]
    pub const fn value(self) -> i32 {
        self.0
    }
}

/// Raw ADC counts of a single conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    /// Pressure, 20 bits.
    pub pressure: u32,
    /// Temperature, 20 bits.
    pub temperature: u32,
    /// Humidity, 16 bits.
    pub humidity: u16,
}

impl RawSample {
    /// Extracts the three channels from the data registers `0x1F..=0x26`.
    #[must_use]
    pub fn from_registers(b: &[u8; DATA_LEN]) -> Self {
        // Pressure and temperature are left-aligned on 20 bits.
        let twenty_bits = |msb: u8, lsb: u8, xlsb: u8| {
            (u32::from(msb) << 12) | (u32::from(lsb) << 4) | (u32::from(xlsb) >> 4)
        };

        Self {
            pressure: twenty_bits(b[0], b[1], b[2]),
            temperature: twenty_bits(b[3], b[4], b[5]),
            humidity: u16::from_be_bytes([b[6], b[7]]),
        }
    }
}

/// Errors that may occur when interacting with the `BME680` sensor.
#[derive(Debug)]
pub enum Bme680Error<E> {
    /// I²C bus error.
    I2c(E),
    /// The sensor did not flag new data within the polling budget.
    DataNotReady,
}

impl<E> From<E> for Bme680Error<E> {
    fn from(e: E) -> Self {
        Bme680Error::I2c(e)
    }
}

/// The `BME680` driver.
pub struct Bme680<I2C, D>
where
    D: DelayNs,
{
    bus: Bus<I2C>,
    delay: D,
    settings: Settings,
}

impl<I2C, E, D> Bme680<I2C, D>
where
    I2C: I2c<u8, Error = E>,
    D: DelayNs,
{
    /// Creates a new [`Bme680`] driver with the given I²C bus, delay provider,
    /// and address.
    ///
    /// Measurement settings are initialized to their default values.
    #[must_use]
    pub fn new(i2c: I2C, delay: D, address: Address) -> Self {
        Self::with_settings(i2c, delay, address, Settings::default())
    }

    /// Creates a new [`Bme680`] driver with explicit measurement settings.
    #[must_use]
    pub fn with_settings(i2c: I2C, delay: D, address: Address, settings: Settings) -> Self {
        Self {
            bus: Bus::new(i2c, address as u8),
            delay,
            settings,
        }
    }

    /// Performs a forced-mode measurement.
    ///
    /// # Errors
    ///
    /// Returns an error if communication over I²C fails or if the sensor
    /// does not complete the conversion in time.
    pub fn read(&mut self) -> Result<Measurement, Bme680Error<E>> {
        let calibration = self.read_calibration()?;

        self.start_forced_measurement()?;
        self.wait_for_new_data()?;

        let raw = self.read_raw_sample()?;

        Ok(calibration.compensate(raw))
    }

    /// Reads the factory calibration constants.
    ///
    /// # Errors
    ///
    /// Returns an error if communication over I²C fails.
    pub fn read_calibration(&mut self) -> Result<CalibrationConstants, E> {
        let mut c = [0u8; CALIBRATION_LEN];
        let (first, rest) = c.split_at_mut(COEFF_1_LEN);
        let (second, third) = rest.split_at_mut(COEFF_2_LEN);

        self.bus.read_block(REG_COEFF_1, first)?;
        self.bus.read_block(REG_COEFF_2, second)?;
        self.bus.read_block(REG_COEFF_3, third)?;

        Ok(CalibrationConstants::from_registers(&c))
    }

    /// Releases the I²C bus and the delay provider.
    pub fn release(self) -> (I2C, D) {
        (self.bus.release(), self.delay)
    }

    fn start_forced_measurement(&mut self) -> Result<(), E> {
        self.bus.write_register(REG_CONFIG, self.settings.config())?;
        self.bus.write_register(REG_CTRL_HUM, self.settings.ctrl_hum())?;
        self.bus.write_register(REG_CTRL_MEAS, self.settings.ctrl_meas())
    }

    fn wait_for_new_data(&mut self) -> Result<(), Bme680Error<E>> {
        for _ in 0..MAX_STATUS_POLLS {
            if self.bus.read_register(REG_STATUS)? & NEW_DATA != 0 {
                return Ok(());
            }
            self.delay.delay_ms(STATUS_POLL_DELAY_MS);
        }

        Err(Bme680Error::DataNotReady)
    }

    fn read_raw_sample(&mut self) -> Result<RawSample, E> {
        let mut data = [0u8; DATA_LEN];
        self.bus.read_block(REG_DATA, &mut data)?;

        Ok(RawSample::from_registers(&data))
    }
}
