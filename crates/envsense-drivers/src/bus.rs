//! # Bus Transactions
//!
//! Register-oriented access to an I²C device.
//!
//! Every sensor behind this module exposes a flat register map: a read
//! selects a register address and then clocks out one or more bytes, a write
//! sends the register address followed by a single data byte.

use core::result::Result::{self, Ok};

use embedded_hal::i2c::I2c;

/// A register-oriented I²C device at a fixed slave address.
pub struct Bus<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C, E> Bus<I2C>
where
    I2C: I2c<u8, Error = E>,
{
    /// Creates a [`Bus`] addressing the device at `address`.
    #[must_use]
    pub const fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Returns the slave address of the device.
    #[must_use]
    pub const fn address(&self) -> u8 {
        self.address
    }

    /// Reads a single register.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying I²C transaction fails.
    pub fn read_register(&mut self, register: u8) -> Result<u8, E> {
        let mut value = [0u8; 1];
        self.read_block(register, &mut value)?;

        Ok(value[0])
    }

    /// Fills `buffer` with consecutive registers starting at `register`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying I²C transaction fails.
    pub fn read_block(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), E> {
        self.i2c.write_read(self.address, &[register], buffer)
    }

    /// Writes `value` into `register`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying I²C transaction fails.
    pub fn write_register(&mut self, register: u8, value: u8) -> Result<(), E> {
        self.i2c.write(self.address, &[register, value])
    }

    /// Releases the underlying I²C bus.
    pub fn release(self) -> I2C {
        self.i2c
    }
}
