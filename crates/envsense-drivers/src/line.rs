//! # Digital Line
//!
//! Building blocks shared by the drivers that bit-bang a single data line.
//!
//! [`embedded-hal`] exposes level reads and writes but neither pin direction
//! changes nor a time source, both of which are required by protocols where
//! the host and the sensor take turns driving the same wire. This module
//! fills that gap with the [`Direction`] and [`Clock`] traits and provides
//! [`wait_for_level`], a busy-polling primitive bounded by a deadline.
//!
//! [`embedded-hal`]: https://crates.io/crates/embedded-hal

use core::result::Result::{self, Err, Ok};

use embedded_hal::digital::{ErrorType, InputPin, PinState};

/// Direction of a digital line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// The line is sampled, the host does not drive it.
    Input,
    /// The line is driven by the host.
    Output,
}

/// A digital line whose direction can be switched at runtime.
pub trait Direction: ErrorType {
    /// Configures the line as an input or as an output.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying hardware rejects the change.
    fn set_mode(&mut self, mode: Mode) -> Result<(), Self::Error>;
}

impl<T: Direction + ?Sized> Direction for &mut T {
    #[inline]
    fn set_mode(&mut self, mode: Mode) -> Result<(), Self::Error> {
        T::set_mode(self, mode)
    }
}

/// A monotonic time source with microsecond resolution.
///
/// The value never decreases and is unaffected by wall-clock adjustments.
pub trait Clock {
    /// Returns the microseconds elapsed since an arbitrary fixed origin.
    fn now_us(&self) -> u64;
}

impl<T: Clock + ?Sized> Clock for &T {
    #[inline]
    fn now_us(&self) -> u64 {
        T::now_us(self)
    }
}

/// Errors returned by [`wait_for_level`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError<E> {
    /// Reading the line failed.
    Pin(E),
    /// The deadline elapsed before the requested level was observed.
    Timeout,
}

impl<E> From<E> for WaitError<E> {
    fn from(e: E) -> Self {
        WaitError::Pin(e)
    }
}

/// Busy-polls `pin` until it reaches `level` or `timeout_us` microseconds
/// elapse.
///
/// On success, returns the microseconds elapsed between the call and the
/// first sample showing `level`. The loop never sleeps: the sensors served by
/// this primitive signal with pulses lasting tens of microseconds.
///
/// # Errors
///
/// Returns [`WaitError::Timeout`] once the deadline elapses, or
/// [`WaitError::Pin`] if sampling the line fails.
pub fn wait_for_level<P, C>(
    pin: &mut P,
    clock: &C,
    level: PinState,
    timeout_us: u32,
) -> Result<u32, WaitError<P::Error>>
where
    P: InputPin + ?Sized,
    C: Clock + ?Sized,
{
    let start = clock.now_us();

    loop {
        let reached = match level {
            PinState::High => pin.is_high()?,
            PinState::Low => pin.is_low()?,
        };

        let elapsed = clock.now_us().saturating_sub(start);

        if reached {
            return Ok(u32::try_from(elapsed).unwrap_or(u32::MAX));
        }

        if elapsed >= u64::from(timeout_us) {
            return Err(WaitError::Timeout);
        }
    }
}
