//! # DHT22 Driver
//!
//! This module provides an architecture-agnostic driver for the `DHT22`
//! temperature and humidity sensor.
//! The driver is synchronous to meet the strict timing requirements of the
//! sensor's single-wire protocol: every level transition is awaited by
//! busy-polling the line against a monotonic [`Clock`], and the value of each
//! data bit is recovered by measuring how long the sensor keeps the line
//! high.
//!
//! The `DHT22` sensor provides the following measurements:
//! - **Humidity**: Relative humidity as a percentage (% RH)
//! - **Temperature**: Temperature in degrees Celsius (°C)
//!
//! A single reading walks through the following phases:
//!
//! ```text
//! RequestPulse → ReleaseHigh → AckLow → AckHigh → AckLow2 → {BitHigh → BitLow} × 40
//! ```
//!
//! Any timeout or checksum mismatch discards the attempt. [`Dht22::read`]
//! retries after a back-off, up to a bounded number of attempts.
//!
//! For detailed specifications, refer to the
//! [datasheet](https://www.alldatasheet.com/datasheet-pdf/pdf/1132459/ETC2/DHT22.html)
//! and the description of the proprietary
//! [communication protocol](https://www.ocfreaks.com/basics-interfacing-dht11-dht22-humidity-temperature-sensor-mcu/).

use core::result::Result::{self, Err, Ok};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin, PinState};

use crate::line::{Clock, Direction, Mode, WaitError, wait_for_level};

// Protocol-specific timing constants.
const REQUEST_LOW_MS: u32 = 20; // Host pulls the line low to request a reading.
const PHASE_TIMEOUT_US: u32 = 100; // Budget shared by every awaited transition.
const ONE_BIT_HIGH_US: u32 = 50; // A high pulse at least this long encodes a 1.
const RETRY_BACKOFF_MS: u32 = 2_000; // The sensor needs ~2 s between readings.

/// Maximum number of attempts performed by [`Dht22::read`].
pub const MAX_ATTEMPTS: usize = 5;

/// Number of bits transmitted by the sensor in a single reading.
pub const FRAME_BITS: usize = 40;

/// A single humidity and temperature measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Measurement {
    /// Relative humidity as a percentage (% RH).
    pub humidity: f32,
    /// Temperature in degrees Celsius (°C).
    pub temperature: f32,
}

/// Protocol phase in which a transition was awaited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// First acknowledgement pulse, sensor pulls the line low.
    AckLow,
    /// Sensor releases the line high.
    AckHigh,
    /// Sensor pulls the line low right before the first data bit.
    AckLow2,
    /// Start of the high pulse of the given bit.
    BitHigh(usize),
    /// End of the high pulse of the given bit.
    BitLow(usize),
}

/// Reason why a single attempt was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The awaited transition did not occur within the phase budget.
    Timeout(Phase),
    /// Data checksum mismatch.
    ChecksumMismatch,
}

/// Outcome of a single reading attempt.
#[derive(Debug)]
pub enum Attempt<E> {
    /// The frame was received and validated.
    Success(Measurement),
    /// The attempt failed in a way that a later attempt may not.
    Retryable(Fault),
    /// The line itself failed, retrying is pointless.
    Fatal(E),
}

/// Errors that may occur when interacting with the `DHT22` sensor.
#[derive(Debug)]
pub enum Dht22Error<E> {
    /// GPIO pin errors.
    Pin(E),
    /// Every attempt failed, the last one for the contained reason.
    RetriesExhausted(Fault),
}

impl<E> From<E> for Dht22Error<E> {
    fn from(e: E) -> Self {
        Dht22Error::Pin(e)
    }
}

/// The 40 bits of a reading, in transmission order.
///
/// Bits 0-15 carry the humidity, bits 16-31 the temperature (bit 16 being the
/// sign) and bits 32-39 the checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitFrame([bool; FRAME_BITS]);

impl BitFrame {
    /// Creates a [`BitFrame`] from bits in transmission order.
    #[must_use]
    pub const fn new(bits: [bool; FRAME_BITS]) -> Self {
        Self(bits)
    }

    /// Creates a [`BitFrame`] transmitting `bytes`, most significant bit first.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 5]) -> Self {
        let mut bits = [false; FRAME_BITS];
        for (i, bit) in bits.iter_mut().enumerate() {
            *bit = bytes[i / 8] & (0x80 >> (i % 8)) != 0;
        }

        Self(bits)
    }

    /// Packs the bits into bytes: humidity high and low, temperature high
    /// and low, checksum.
    #[must_use]
    pub fn bytes(&self) -> [u8; 5] {
        let mut bytes = [0u8; 5];
        for (i, bit) in self.0.iter().enumerate() {
            if *bit {
                bytes[i / 8] |= 0x80 >> (i % 8); // Bits are transmitted MSB first.
            }
        }

        bytes
    }

    /// Validates the checksum and decodes the measurement.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::ChecksumMismatch`] if the transmitted checksum does
    /// not match the data bytes.
    pub fn decode(&self) -> Result<Measurement, Fault> {
        let [hh, hl, th, tl, checksum] = self.bytes();

        validate_checksum(hh, hl, th, tl, checksum)?;

        Ok(Measurement {
            humidity: decode_humidity(hh, hl),
            temperature: decode_temperature(th, tl),
        })
    }
}

#[inline]
fn validate_checksum(hh: u8, hl: u8, th: u8, tl: u8, checksum: u8) -> Result<(), Fault> {
    // The checksum is the low 8 bits of the sum of the first four bytes.
    let sum = hh.wrapping_add(hl).wrapping_add(th).wrapping_add(tl);

    if sum == checksum {
        Ok(())
    } else {
        Err(Fault::ChecksumMismatch)
    }
}

#[inline]
fn decode_humidity(high: u8, low: u8) -> f32 {
    // The sensor sends humidity * 10.
    f32::from(u16::from_be_bytes([high, low])) / 10.0
}

#[inline]
fn decode_temperature(high: u8, low: u8) -> f32 {
    // The first transmitted bit is a sign flag, the remaining 15 bits the magnitude.
    let t = f32::from(u16::from_be_bytes([high & 0x7F, low])) / 10.0;

    if high & 0x80 != 0 { -t } else { t }
}

/// The `DHT22` driver.
pub struct Dht22<P, C, D>
where
    P: InputPin + OutputPin + Direction,
    C: Clock,
    D: DelayNs,
{
    pin: P,
    clock: C,
    delay: D,
}

impl<P, C, D> Dht22<P, C, D>
where
    P: InputPin + OutputPin + Direction,
    C: Clock,
    D: DelayNs,
{
    /// Creates a [`Dht22`] driver for the given line, clock and delay
    /// provider.
    #[must_use]
    pub fn new(pin: P, clock: C, delay: D) -> Self {
        Self { pin, clock, delay }
    }

    /// Reads a single humidity and temperature measurement.
    ///
    /// Discarded attempts are retried after a back-off, for at most
    /// [`MAX_ATTEMPTS`] attempts in total.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Driving or sampling the line fails
    /// - Every attempt timed out or failed checksum validation
    pub fn read(&mut self) -> Result<Measurement, Dht22Error<P::Error>> {
        self.read_with(|_, _| {})
    }

    /// Same as [`Dht22::read`], calling `on_retry` with the attempt number
    /// (starting from 1) and the fault of every attempt that is going to be
    /// retried.
    ///
    /// # Errors
    ///
    /// See [`Dht22::read`].
    pub fn read_with<F>(&mut self, mut on_retry: F) -> Result<Measurement, Dht22Error<P::Error>>
    where
        F: FnMut(usize, Fault),
    {
        let mut attempts = 1;

        loop {
            match self.read_once() {
                Attempt::Success(measurement) => return Ok(measurement),
                Attempt::Fatal(e) => return Err(Dht22Error::Pin(e)),
                Attempt::Retryable(fault) if attempts >= MAX_ATTEMPTS => {
                    return Err(Dht22Error::RetriesExhausted(fault));
                }
                Attempt::Retryable(fault) => {
                    on_retry(attempts, fault);
                    attempts += 1;
                    self.delay.delay_ms(RETRY_BACKOFF_MS);
                }
            }
        }
    }

    /// Performs a single reading attempt, without retrying.
    ///
    /// The line is left as an output driven high, its idle level, whatever
    /// the outcome.
    pub fn read_once(&mut self) -> Attempt<P::Error> {
        // A line that cannot be parked is broken, even after a timeout.
        let frame = match (self.acquire(), self.park()) {
            (Err(Attempt::Fatal(e)), _) | (_, Err(e)) => return Attempt::Fatal(e),
            (Err(attempt), Ok(())) => return attempt,
            (Ok(frame), Ok(())) => frame,
        };

        match frame.decode() {
            Ok(measurement) => Attempt::Success(measurement),
            Err(fault) => Attempt::Retryable(fault),
        }
    }

    /// Releases the line, the clock and the delay provider.
    pub fn release(self) -> (P, C, D) {
        (self.pin, self.clock, self.delay)
    }

    fn acquire(&mut self) -> Result<BitFrame, Attempt<P::Error>> {
        self.send_request()?;
        self.wait_for_acknowledgement()?;
        self.read_bits()
    }

    fn send_request(&mut self) -> Result<(), Attempt<P::Error>> {
        // RequestPulse: hold the line low long enough for the sensor to wake up.
        self.pin.set_mode(Mode::Output).map_err(Attempt::Fatal)?;
        self.pin.set_low().map_err(Attempt::Fatal)?;
        self.delay.delay_ms(REQUEST_LOW_MS);

        // ReleaseHigh: hand the line over to the sensor.
        self.pin.set_high().map_err(Attempt::Fatal)?;
        self.pin.set_mode(Mode::Input).map_err(Attempt::Fatal)?;

        Ok(())
    }

    fn wait_for_acknowledgement(&mut self) -> Result<(), Attempt<P::Error>> {
        // The sensor answers with a low pulse, a high pulse and then pulls
        // the line low again right before the first data bit.
        let _ = self.wait(Phase::AckLow, PinState::Low)?;
        let _ = self.wait(Phase::AckHigh, PinState::High)?;
        let _ = self.wait(Phase::AckLow2, PinState::Low)?;

        Ok(())
    }

    fn read_bits(&mut self) -> Result<BitFrame, Attempt<P::Error>> {
        let mut bits = [false; FRAME_BITS];

        // Each bit is a fixed low pulse followed by a high pulse whose
        // duration encodes the bit value.
        for (index, bit) in bits.iter_mut().enumerate() {
            let _ = self.wait(Phase::BitHigh(index), PinState::High)?;
            let high_us = self.wait(Phase::BitLow(index), PinState::Low)?;

            *bit = high_us >= ONE_BIT_HIGH_US;
        }

        Ok(BitFrame::new(bits))
    }

    fn park(&mut self) -> Result<(), P::Error> {
        self.pin.set_mode(Mode::Output)?;
        self.pin.set_high()
    }

    #[inline]
    fn wait(&mut self, phase: Phase, level: PinState) -> Result<u32, Attempt<P::Error>> {
        wait_for_level(&mut self.pin, &self.clock, level, PHASE_TIMEOUT_US).map_err(|e| match e {
            WaitError::Pin(e) => Attempt::Fatal(e),
            WaitError::Timeout => Attempt::Retryable(Fault::Timeout(phase)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    extern crate std;
    use std::collections::VecDeque;
    use std::vec::Vec;

    use core::cell::{Cell, RefCell};

    use embedded_hal::digital::{self, ErrorKind, ErrorType};
    use embedded_hal_mock::eh1::delay::NoopDelay;

    type Waveform = Vec<(PinState, u64)>;

    // Simulated wire shared by the fake line and the fake clock.
    //
    // Every clock read advances time by 1 µs. Once the host switches the
    // line to input, the level follows the next queued waveform, starting
    // from the time of the switch; past its end the pull-up keeps it high.
    // Samples and switches to output are counted so that a given one can be
    // made to fail.
    struct Wire {
        now: Cell<u64>,
        mode: Cell<Mode>,
        driven: Cell<PinState>,
        released_at: Cell<u64>,
        current: RefCell<Waveform>,
        queued: RefCell<VecDeque<Waveform>>,
        requests: Cell<usize>,
        samples: Cell<usize>,
        outputs: Cell<usize>,
        failing_sample: Cell<Option<usize>>,
        failing_output: Cell<Option<usize>>,
    }

    impl Wire {
        fn new(waveforms: impl IntoIterator<Item = Waveform>) -> Self {
            Self {
                now: Cell::new(0),
                mode: Cell::new(Mode::Input),
                driven: Cell::new(PinState::High),
                released_at: Cell::new(0),
                current: RefCell::new(Vec::new()),
                queued: RefCell::new(waveforms.into_iter().collect()),
                requests: Cell::new(0),
                samples: Cell::new(0),
                outputs: Cell::new(0),
                failing_sample: Cell::new(None),
                failing_output: Cell::new(None),
            }
        }

        fn sample(&self) -> Result<PinState, LineFault> {
            let samples = self.samples.get() + 1;
            self.samples.set(samples);

            if self.failing_sample.get() == Some(samples) {
                Err(LineFault)
            } else {
                Ok(self.level())
            }
        }

        fn level(&self) -> PinState {
            if self.mode.get() == Mode::Output {
                return self.driven.get();
            }

            let mut offset = self.now.get() - self.released_at.get();
            for &(level, duration) in self.current.borrow().iter() {
                if offset < duration {
                    return level;
                }
                offset -= duration;
            }

            PinState::High
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct LineFault;

    impl digital::Error for LineFault {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    struct FakeLine<'a>(&'a Wire);

    impl ErrorType for FakeLine<'_> {
        type Error = LineFault;
    }

    impl InputPin for FakeLine<'_> {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            Ok(self.0.sample()? == PinState::High)
        }

        fn is_low(&mut self) -> Result<bool, Self::Error> {
            Ok(self.0.sample()? == PinState::Low)
        }
    }

    impl OutputPin for FakeLine<'_> {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            if self.0.mode.get() == Mode::Output {
                self.0.requests.set(self.0.requests.get() + 1);
            }
            self.0.driven.set(PinState::Low);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.0.driven.set(PinState::High);
            Ok(())
        }
    }

    impl Direction for FakeLine<'_> {
        fn set_mode(&mut self, mode: Mode) -> Result<(), Self::Error> {
            if mode == Mode::Output {
                let outputs = self.0.outputs.get() + 1;
                self.0.outputs.set(outputs);
                if self.0.failing_output.get() == Some(outputs) {
                    return Err(LineFault);
                }
            }
            if mode == Mode::Input {
                self.0.released_at.set(self.0.now.get());
                let next = self.0.queued.borrow_mut().pop_front().unwrap_or_default();
                let _previous = self.0.current.replace(next);
            }
            self.0.mode.set(mode);
            Ok(())
        }
    }

    struct FakeClock<'a>(&'a Wire);

    impl Clock for FakeClock<'_> {
        fn now_us(&self) -> u64 {
            let now = self.0.now.get() + 1;
            self.0.now.set(now);
            now
        }
    }

    // Accumulates every requested delay.
    #[derive(Default)]
    struct RecordingDelay {
        total_ns: u64,
    }

    impl DelayNs for RecordingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += u64::from(ns);
        }
    }

    // Sensor answer transmitting `bytes`.
    fn response(bytes: [u8; 5]) -> Waveform {
        let mut waveform = Vec::new();

        // Release delay, then the acknowledgement pulses.
        waveform.push((PinState::High, 30));
        waveform.push((PinState::Low, 80));
        waveform.push((PinState::High, 80));

        for i in 0..FRAME_BITS {
            let one = bytes[i / 8] & (0x80 >> (i % 8)) != 0;
            waveform.push((PinState::Low, 50));
            waveform.push((PinState::High, if one { 70 } else { 26 }));
        }

        // End of transmission.
        waveform.push((PinState::Low, 50));

        waveform
    }

    fn frame(humidity: u16, temperature: u16) -> [u8; 5] {
        let [hh, hl] = humidity.to_be_bytes();
        let [th, tl] = temperature.to_be_bytes();
        let checksum = hh.wrapping_add(hl).wrapping_add(th).wrapping_add(tl);

        [hh, hl, th, tl, checksum]
    }

    #[test]
    fn test_send_request() {
        let wire = Wire::new([]);
        let mut dht22 = Dht22::new(FakeLine(&wire), FakeClock(&wire), NoopDelay::new());

        assert!(dht22.send_request().is_ok());

        assert_eq!(wire.requests.get(), 1);
        assert_eq!(wire.mode.get(), Mode::Input);
        assert_eq!(wire.driven.get(), PinState::High);
    }

    #[test]
    fn test_read_bits() {
        let bytes = frame(652, 351);
        let wire = Wire::new([response(bytes)]);
        let mut dht22 = Dht22::new(FakeLine(&wire), FakeClock(&wire), NoopDelay::new());

        assert!(dht22.send_request().is_ok());
        assert!(dht22.wait_for_acknowledgement().is_ok());

        let Ok(bits) = dht22.read_bits() else {
            panic!("the waveform carries a whole frame");
        };
        assert_eq!(bits.bytes(), bytes);
    }

    #[test]
    fn test_read() {
        let wire = Wire::new([response(frame(652, 351))]);
        let mut dht22 = Dht22::new(FakeLine(&wire), FakeClock(&wire), NoopDelay::new());

        let measurement = dht22.read().unwrap();
        assert!((measurement.humidity - 65.2).abs() < 1e-4);
        assert!((measurement.temperature - 35.1).abs() < 1e-4);

        // The line is parked as a high output.
        assert_eq!(wire.requests.get(), 1);
        assert_eq!(wire.mode.get(), Mode::Output);
        assert_eq!(wire.driven.get(), PinState::High);
    }

    #[test]
    fn test_read_negative_temperature() {
        let wire = Wire::new([response(frame(1000, 0x8000 | 101))]);
        let mut dht22 = Dht22::new(FakeLine(&wire), FakeClock(&wire), NoopDelay::new());

        let measurement = dht22.read().unwrap();
        assert!((measurement.humidity - 100.0).abs() < 1e-4);
        assert!((measurement.temperature + 10.1).abs() < 1e-4);
    }

    #[test]
    fn test_ack_timeout_is_retryable() {
        // The sensor never answers: the line stays high after release.
        let wire = Wire::new([]);
        let mut dht22 = Dht22::new(FakeLine(&wire), FakeClock(&wire), NoopDelay::new());

        let attempt = dht22.read_once();
        assert!(matches!(
            attempt,
            Attempt::Retryable(Fault::Timeout(Phase::AckLow))
        ));
    }

    #[test]
    fn test_read_gives_up_after_max_attempts() {
        let wire = Wire::new([]);
        let mut dht22 = Dht22::new(FakeLine(&wire), FakeClock(&wire), RecordingDelay::default());

        let result = dht22.read();
        assert!(matches!(
            result,
            Err(Dht22Error::RetriesExhausted(Fault::Timeout(Phase::AckLow)))
        ));
        assert_eq!(wire.requests.get(), MAX_ATTEMPTS);

        // One request pulse per attempt, one back-off between attempts.
        let (_, _, delay) = dht22.release();
        let expected_ms = 20 * 5 + 2_000 * 4;
        assert_eq!(delay.total_ns, expected_ms * 1_000_000);
    }

    #[test]
    fn test_read_with_reports_retried_attempts() {
        let wire = Wire::new([]);
        let mut dht22 = Dht22::new(FakeLine(&wire), FakeClock(&wire), NoopDelay::new());

        let mut retried = Vec::new();
        let result = dht22.read_with(|attempt, fault| retried.push((attempt, fault)));
        assert!(result.is_err());

        // The last attempt is reported through the error, not the callback.
        let expected: Vec<_> = (1..MAX_ATTEMPTS)
            .map(|attempt| (attempt, Fault::Timeout(Phase::AckLow)))
            .collect();
        assert_eq!(retried, expected);
    }

    #[test]
    fn test_read_recovers_after_checksum_mismatch() {
        let mut corrupted = frame(450, 220);
        corrupted[4] ^= 0x01;

        let wire = Wire::new([response(corrupted), response(frame(450, 220))]);
        let mut dht22 = Dht22::new(FakeLine(&wire), FakeClock(&wire), NoopDelay::new());

        let measurement = dht22.read().unwrap();
        assert!((measurement.humidity - 45.0).abs() < 1e-4);
        assert!((measurement.temperature - 22.0).abs() < 1e-4);
        assert_eq!(wire.requests.get(), 2);
    }

    #[test]
    fn test_persistent_checksum_mismatch() {
        let mut corrupted = frame(450, 220);
        corrupted[0] ^= 0x10;

        let wire = Wire::new((0..MAX_ATTEMPTS).map(|_| response(corrupted)));
        let mut dht22 = Dht22::new(FakeLine(&wire), FakeClock(&wire), NoopDelay::new());

        let result = dht22.read();
        assert!(matches!(
            result,
            Err(Dht22Error::RetriesExhausted(Fault::ChecksumMismatch))
        ));
    }

    #[test]
    fn test_truncated_transmission() {
        // The sensor goes quiet in the middle of bit 12.
        let mut waveform = response(frame(450, 220));
        waveform.truncate(3 + 2 * 12 + 1);

        let wire = Wire::new([waveform]);
        let mut dht22 = Dht22::new(FakeLine(&wire), FakeClock(&wire), NoopDelay::new());

        let attempt = dht22.read_once();
        assert!(matches!(
            attempt,
            Attempt::Retryable(Fault::Timeout(Phase::BitLow(12)))
        ));
    }

    #[test]
    fn test_line_error_is_not_retried() {
        // Sampling fails while the acknowledgement is awaited.
        let wire = Wire::new([response(frame(450, 220))]);
        wire.failing_sample.set(Some(3));
        let mut dht22 = Dht22::new(FakeLine(&wire), FakeClock(&wire), RecordingDelay::default());

        let result = dht22.read();
        assert!(matches!(result, Err(Dht22Error::Pin(LineFault))));
        assert_eq!(wire.requests.get(), 1);

        // The line is still parked, and no back-off is spent.
        assert_eq!(wire.mode.get(), Mode::Output);
        assert_eq!(wire.driven.get(), PinState::High);
        let (_, _, delay) = dht22.release();
        assert_eq!(delay.total_ns, 20 * 1_000_000);
    }

    #[test]
    fn test_park_error_after_timeout_is_fatal() {
        // The sensor never answers, then the line cannot be switched back to
        // output: the second switch of the first attempt fails.
        let wire = Wire::new([]);
        wire.failing_output.set(Some(2));
        let mut dht22 = Dht22::new(FakeLine(&wire), FakeClock(&wire), NoopDelay::new());

        let result = dht22.read();
        assert!(matches!(result, Err(Dht22Error::Pin(LineFault))));
        assert_eq!(wire.requests.get(), 1);
    }

    #[test]
    fn test_park_error_after_success_is_fatal() {
        let wire = Wire::new([response(frame(450, 220))]);
        wire.failing_output.set(Some(2));
        let mut dht22 = Dht22::new(FakeLine(&wire), FakeClock(&wire), NoopDelay::new());

        assert!(matches!(dht22.read_once(), Attempt::Fatal(LineFault)));
    }

    #[test]
    fn test_decode_frames() {
        let cases: [(u16, u16, f32, f32); 4] = [
            (0x0258, 0x00FA, 60.0, 25.0),
            (0x0258, 0x80FA, 60.0, -25.0),
            (0x0000, 0x0000, 0.0, 0.0),
            (0x03E8, 0x8190, 100.0, -40.0),
        ];

        for (humidity, temperature, expected_humidity, expected_temperature) in cases {
            let measurement = BitFrame::from_bytes(frame(humidity, temperature))
                .decode()
                .unwrap();

            assert!((measurement.humidity - expected_humidity).abs() < f32::EPSILON);
            assert!((measurement.temperature - expected_temperature).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn test_validate_checksum() {
        assert!(validate_checksum(1, 2, 3, 4, 10).is_ok());
        assert_eq!(
            validate_checksum(1, 2, 3, 4, 9),
            Err(Fault::ChecksumMismatch)
        );

        // Only the low 8 bits of the sum are transmitted.
        assert!(validate_checksum(0xFF, 0x02, 0x00, 0x00, 0x01).is_ok());
    }

    #[test]
    fn test_bit_frame_layout() {
        let mut bits = [false; FRAME_BITS];
        bits[15] = true; // Humidity LSB.
        bits[16] = true; // Temperature sign.
        bits[39] = true; // Checksum LSB.

        assert_eq!(BitFrame::new(bits).bytes(), [0x00, 0x01, 0x80, 0x00, 0x01]);
    }
}
