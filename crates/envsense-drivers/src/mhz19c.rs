//! # MH-Z19C Driver
//!
//! This module provides a synchronous, architecture-agnostic driver for the
//! `MH-Z19C` NDIR CO₂ sensor, connected over a UART configured as 9600 baud,
//! 8 data bits, no parity and one stop bit.
//!
//! Every exchange with the sensor is a 9-byte command followed by a 9-byte
//! response. A response is accepted only if its start byte, command echo and
//! checksum are all valid; there is no internal retry.
//!
//! For detailed specifications, refer to the
//! [datasheet](https://www.winsen-sensor.com/d/files/infrared-gas-sensor/mh-z19c-pins-type-co2-manual-ver1_0.pdf).

use core::result::Result::{self, Err, Ok};

use embedded_io::{Read, Write};

use crate::serial::{FramedSerial, SerialError};

/// Length of every command and response frame.
pub const FRAME_LEN: usize = 9;

const START: u8 = 0xFF;
const SENSOR_NUMBER: u8 = 0x01;
const READ_CO2: u8 = 0x86;

/// A single CO₂ concentration measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Measurement {
    /// CO₂ concentration in parts per million (ppm).
    pub co2: u16,
}

/// Errors that may occur when interacting with the `MH-Z19C` sensor.
#[derive(Debug)]
pub enum Mhz19cError<E> {
    /// Serial stream error.
    Serial(E),
    /// The response ended before all of its bytes were received.
    Truncated,
    /// The start byte or the command echo is not the expected one.
    FramingMismatch {
        /// Offset of the mismatching byte.
        offset: usize,
        /// Expected value.
        expected: u8,
        /// Received value.
        found: u8,
    },
    /// The checksum does not match the frame contents.
    ChecksumMismatch {
        /// Checksum computed over the received bytes.
        expected: u8,
        /// Received checksum.
        found: u8,
    },
}

impl<E> From<SerialError<E>> for Mhz19cError<E> {
    fn from(e: SerialError<E>) -> Self {
        match e {
            SerialError::Io(e) => Mhz19cError::Serial(e),
            SerialError::Truncated => Mhz19cError::Truncated,
        }
    }
}

/// A 9-byte frame exchanged with the sensor.
///
/// Byte 0 is the start marker, byte 1 the sensor number in commands and the
/// command echo in responses, byte 8 the checksum over bytes 1 to 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialFrame([u8; FRAME_LEN]);

impl SerialFrame {
    /// Builds a command frame with zeroed arguments.
    #[must_use]
    pub fn command(command: u8) -> Self {
        let mut bytes = [0u8; FRAME_LEN];
        bytes[0] = START;
        bytes[1] = SENSOR_NUMBER;
        bytes[2] = command;
        bytes[8] = checksum(&bytes);

        Self(bytes)
    }

    /// Wraps received bytes without validating them.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; FRAME_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes of the frame.
    #[must_use]
    pub const fn bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    /// Validates the frame as the response to `command`.
    ///
    /// # Errors
    ///
    /// Returns [`Mhz19cError::FramingMismatch`] if the start byte or the
    /// command echo are wrong, [`Mhz19cError::ChecksumMismatch`] if the
    /// checksum does not match.
    pub fn validate<E>(&self, command: u8) -> Result<(), Mhz19cError<E>> {
        for (offset, expected) in [(0, START), (1, command)] {
            let found = self.0[offset];
            if found != expected {
                return Err(Mhz19cError::FramingMismatch {
                    offset,
                    expected,
                    found,
                });
            }
        }

        let expected = checksum(&self.0);
        let found = self.0[8];
        if found != expected {
            return Err(Mhz19cError::ChecksumMismatch { expected, found });
        }

        Ok(())
    }

    /// Returns the big-endian value carried by bytes 2 and 3.
    #[must_use]
    pub const fn value(&self) -> u16 {
        u16::from_be_bytes([self.0[2], self.0[3]])
    }
}

/// Computes the checksum of a frame: the two's complement of the sum of
/// bytes 1 to 7.
#[must_use]
pub fn checksum(frame: &[u8; FRAME_LEN]) -> u8 {
    let sum = frame[1..8].iter().fold(0u8, |sum, byte| sum.wrapping_add(*byte));

    0xFF_u8.wrapping_sub(sum).wrapping_add(1)
}

/// The `MH-Z19C` driver.
pub struct Mhz19c<S> {
    serial: FramedSerial<S>,
}

impl<S> Mhz19c<S>
where
    S: Read + Write,
{
    /// Creates a [`Mhz19c`] driver over the given serial stream.
    #[must_use]
    pub const fn new(stream: S) -> Self {
        Self {
            serial: FramedSerial::new(stream),
        }
    }

    /// Reads the CO₂ concentration.
    ///
    /// # Errors
    ///
    /// Returns an error if the serial exchange fails or if the response does
    /// not pass validation.
    pub fn read(&mut self) -> Result<Measurement, Mhz19cError<S::Error>> {
        let command = SerialFrame::command(READ_CO2);
        let response = SerialFrame::from_bytes(self.serial.exchange(command.bytes())?);

        response.validate(READ_CO2)?;

        Ok(Measurement {
            co2: response.value(),
        })
    }

    /// Releases the underlying serial stream.
    pub fn release(self) -> S {
        self.serial.release()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use core::convert::Infallible;

    use crate::serial::tests::MemoryStream;

    const READ_CO2_COMMAND: [u8; FRAME_LEN] = [0xFF, 0x01, 0x86, 0x00, 0x00, 0x00, 0x00, 0x00, 0x79];

    fn response(high: u8, low: u8) -> [u8; FRAME_LEN] {
        let mut bytes = [0xFF, 0x86, high, low, 0x00, 0x00, 0x00, 0x00, 0x00];
        bytes[8] = checksum(&bytes);
        bytes
    }

    #[test]
    fn test_read_co2_command() {
        assert_eq!(SerialFrame::command(READ_CO2).bytes(), &READ_CO2_COMMAND);
    }

    #[test]
    fn test_checksum() {
        assert_eq!(checksum(&READ_CO2_COMMAND), 0x79);
        assert_eq!(response(0x03, 0x20)[8], 0x57);
    }

    #[test]
    fn test_read() {
        let mut mhz19c = Mhz19c::new(MemoryStream::new(&response(0x03, 0x20)));

        let measurement = mhz19c.read().unwrap();
        assert_eq!(measurement.co2, 800);

        assert_eq!(mhz19c.release().written, READ_CO2_COMMAND);
    }

    #[test]
    fn test_single_byte_mutations_are_rejected() {
        let valid = response(0x03, 0x20);
        assert!(SerialFrame::from_bytes(valid).validate::<Infallible>(READ_CO2).is_ok());

        for offset in 1..FRAME_LEN {
            let mut mutated = valid;
            mutated[offset] ^= 0x01;

            let result = SerialFrame::from_bytes(mutated).validate::<Infallible>(READ_CO2);
            assert!(result.is_err(), "mutating byte {offset} must be detected");
        }
    }

    #[test]
    fn test_wrong_start_byte() {
        let mut bytes = response(0x01, 0x90);
        bytes[0] = 0xFE;

        let result = SerialFrame::from_bytes(bytes).validate::<Infallible>(READ_CO2);
        assert!(matches!(
            result,
            Err(Mhz19cError::FramingMismatch {
                offset: 0,
                expected: 0xFF,
                found: 0xFE
            })
        ));
    }

    #[test]
    fn test_wrong_command_echo() {
        let mut bytes = response(0x01, 0x90);
        bytes[1] = 0x87;
        bytes[8] = checksum(&bytes);

        let mut mhz19c = Mhz19c::new(MemoryStream::new(&bytes));
        assert!(matches!(
            mhz19c.read(),
            Err(Mhz19cError::FramingMismatch { offset: 1, .. })
        ));
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut bytes = response(0x01, 0x90);
        bytes[8] = bytes[8].wrapping_add(1);

        let mut mhz19c = Mhz19c::new(MemoryStream::new(&bytes));
        assert!(matches!(
            mhz19c.read(),
            Err(Mhz19cError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_truncated_response() {
        let bytes = response(0x01, 0x90);

        let mut mhz19c = Mhz19c::new(MemoryStream::new(&bytes[..6]));
        assert!(matches!(mhz19c.read(), Err(Mhz19cError::Truncated)));
    }
}
