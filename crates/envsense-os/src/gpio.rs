//! Digital lines of the first GPIO bank, driven through their registers.
//!
//! Register layout of the BCM283x GPIO block, in 32-bit words:
//!
//! | Word    | Register   | Use                                     |
//! |---------|------------|-----------------------------------------|
//! | 0 - 5   | `GPFSELn`  | 3-bit function select, 10 pins per word |
//! | 7       | `GPSET0`   | writing 1 drives the pin high           |
//! | 10      | `GPCLR0`   | writing 1 drives the pin low            |
//! | 13      | `GPLEV0`   | current level of pins 0-31              |

use std::convert::Infallible;
use std::time::Instant;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin, PinState};

use envsense_drivers::line::{self, Clock, Direction, Mode, WaitError};

use crate::error::{Error, Result};
use crate::window::Registers;

const GPSET0: usize = 7;
const GPCLR0: usize = 10;
const GPLEV0: usize = 13;

/// Number of 32-bit words a register block must span for [`Gpio`].
pub const REGISTER_WORDS: usize = GPLEV0 + 1;

const FSEL_MASK: u32 = 0b111;
const FSEL_OUTPUT: u32 = 0b001;

/// Number of pins reachable through the first register bank.
pub const PIN_COUNT: u8 = 32;

/// A BCM pin index of the first register bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pin(u8);

impl Pin {
    /// Creates a [`Pin`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `index` is not lower than [`PIN_COUNT`].
    pub fn new(index: u8) -> Result<Self> {
        if index < PIN_COUNT {
            Ok(Self(index))
        } else {
            Err(Error::Config(format!(
                "GPIO {index} is outside the first bank (0-{})",
                PIN_COUNT - 1
            )))
        }
    }

    /// Returns the pin index.
    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }

    // Word of the `GPFSELn` register holding the pin function.
    #[inline]
    const fn fsel_word(self) -> usize {
        self.0 as usize / 10
    }

    #[inline]
    const fn fsel_shift(self) -> u32 {
        (self.0 as u32 % 10) * 3
    }

    // Bit of the pin in `GPSET0`, `GPCLR0` and `GPLEV0`.
    #[inline]
    const fn bank_bit(self) -> u32 {
        1 << (self.0 % 32)
    }
}

/// GPIO operations over a register block.
pub struct Gpio<'a, R: ?Sized> {
    registers: &'a R,
}

impl<R: ?Sized> Clone for Gpio<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: ?Sized> Copy for Gpio<'_, R> {}

impl<'a, R> Gpio<'a, R>
where
    R: Registers + ?Sized,
{
    /// Creates a [`Gpio`] over `registers`.
    #[must_use]
    pub const fn new(registers: &'a R) -> Self {
        Self { registers }
    }

    /// Configures `pin` as an input or an output.
    ///
    /// Only the function field of `pin` changes, the other pins sharing the
    /// register keep their configuration.
    pub fn set_direction(&self, pin: Pin, mode: Mode) {
        let word = pin.fsel_word();
        let shift = pin.fsel_shift();

        let mut value = self.registers.read(word) & !(FSEL_MASK << shift);
        if mode == Mode::Output {
            value |= FSEL_OUTPUT << shift;
        }

        self.registers.write(word, value);
    }

    /// Returns the level of `pin`.
    #[must_use]
    pub fn read_level(&self, pin: Pin) -> PinState {
        PinState::from(self.registers.read(GPLEV0) & pin.bank_bit() != 0)
    }

    /// Drives `pin` to `level`.
    ///
    /// The set and clear registers ignore zero bits, so no other pin is
    /// affected.
    pub fn write_level(&self, pin: Pin, level: PinState) {
        let word = match level {
            PinState::High => GPSET0,
            PinState::Low => GPCLR0,
        };

        self.registers.write(word, pin.bank_bit());
    }

    /// Busy-waits until `pin` reaches `level`, returning the elapsed
    /// microseconds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if `timeout_us` microseconds elapse first.
    pub fn wait_for_level(&self, pin: Pin, level: PinState, timeout_us: u32) -> Result<u32> {
        let clock = StdClock::new();

        line::wait_for_level(&mut self.line(pin), &clock, level, timeout_us).map_err(|e| match e {
            WaitError::Timeout => Error::Timeout {
                sensor: "GPIO",
                detail: format!(
                    "GPIO {} did not reach {level:?} within {timeout_us} µs",
                    pin.index()
                ),
            },
            WaitError::Pin(e) => match e {},
        })
    }

    /// Returns an [`embedded-hal`] view of `pin`.
    ///
    /// [`embedded-hal`]: https://crates.io/crates/embedded-hal
    #[must_use]
    pub const fn line(&self, pin: Pin) -> GpioLine<'a, R> {
        GpioLine { gpio: *self, pin }
    }
}

/// A single pin, implementing the digital traits used by the drivers.
pub struct GpioLine<'a, R: ?Sized> {
    gpio: Gpio<'a, R>,
    pin: Pin,
}

impl<R: ?Sized> ErrorType for GpioLine<'_, R> {
    type Error = Infallible;
}

impl<R: Registers + ?Sized> InputPin for GpioLine<'_, R> {
    fn is_high(&mut self) -> core::result::Result<bool, Self::Error> {
        Ok(self.gpio.read_level(self.pin) == PinState::High)
    }

    fn is_low(&mut self) -> core::result::Result<bool, Self::Error> {
        Ok(self.gpio.read_level(self.pin) == PinState::Low)
    }
}

impl<R: Registers + ?Sized> OutputPin for GpioLine<'_, R> {
    fn set_low(&mut self) -> core::result::Result<(), Self::Error> {
        self.gpio.write_level(self.pin, PinState::Low);
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), Self::Error> {
        self.gpio.write_level(self.pin, PinState::High);
        Ok(())
    }
}

impl<R: Registers + ?Sized> Direction for GpioLine<'_, R> {
    fn set_mode(&mut self, mode: Mode) -> core::result::Result<(), Self::Error> {
        self.gpio.set_direction(self.pin, mode);
        Ok(())
    }
}

/// Monotonic [`Clock`] backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    origin: Instant,
}

impl StdClock {
    /// Creates a [`StdClock`] counting from now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now_us(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_micros()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    // In-memory register block.
    struct FakeRegisters {
        words: [Cell<u32>; 14],
        writes: Cell<usize>,
    }

    impl FakeRegisters {
        fn new() -> Self {
            Self {
                words: Default::default(),
                writes: Cell::new(0),
            }
        }
    }

    impl Registers for FakeRegisters {
        fn read(&self, word: usize) -> u32 {
            self.words[word].get()
        }

        fn write(&self, word: usize, value: u32) {
            self.words[word].set(value);
            self.writes.set(self.writes.get() + 1);
        }
    }

    fn pin(index: u8) -> Pin {
        Pin::new(index).unwrap()
    }

    #[test]
    fn test_pin_range() {
        assert_eq!(pin(0).index(), 0);
        assert_eq!(pin(31).index(), 31);
        assert!(matches!(Pin::new(32), Err(Error::Config(_))));
    }

    #[test]
    fn test_set_direction() {
        let registers = FakeRegisters::new();
        registers.words[1].set(u32::MAX);
        let gpio = Gpio::new(&registers);

        // Pin 17 owns bits 21-23 of GPFSEL1.
        gpio.set_direction(pin(17), Mode::Output);
        assert_eq!(registers.words[1].get(), !(0b110 << 21));

        gpio.set_direction(pin(17), Mode::Input);
        assert_eq!(registers.words[1].get(), !(0b111 << 21));
    }

    #[test]
    fn test_set_direction_preserves_neighbours() {
        let registers = FakeRegisters::new();
        let gpio = Gpio::new(&registers);

        gpio.set_direction(pin(4), Mode::Output);
        gpio.set_direction(pin(9), Mode::Output);
        gpio.set_direction(pin(4), Mode::Input);

        assert_eq!(registers.words[0].get(), 0b001 << 27);
    }

    #[test]
    fn test_write_level() {
        let registers = FakeRegisters::new();
        let gpio = Gpio::new(&registers);

        gpio.write_level(pin(17), PinState::High);
        assert_eq!(registers.words[GPSET0].get(), 1 << 17);

        gpio.write_level(pin(3), PinState::Low);
        assert_eq!(registers.words[GPCLR0].get(), 1 << 3);

        // Plain writes, never read-modify-write.
        assert_eq!(registers.words[GPSET0].get(), 1 << 17);
        assert_eq!(registers.writes.get(), 2);
    }

    #[test]
    fn test_read_level() {
        let registers = FakeRegisters::new();
        registers.words[GPLEV0].set(1 << 31 | 1 << 17);
        let gpio = Gpio::new(&registers);

        assert_eq!(gpio.read_level(pin(17)), PinState::High);
        assert_eq!(gpio.read_level(pin(31)), PinState::High);
        assert_eq!(gpio.read_level(pin(16)), PinState::Low);
    }

    #[test]
    fn test_wait_for_level() {
        let registers = FakeRegisters::new();
        registers.words[GPLEV0].set(1 << 17);
        let gpio = Gpio::new(&registers);

        assert!(gpio.wait_for_level(pin(17), PinState::High, 100).is_ok());

        let e = gpio.wait_for_level(pin(17), PinState::Low, 100).unwrap_err();
        assert!(matches!(e, Error::Timeout { sensor: "GPIO", .. }));
        assert_eq!(
            e.to_string(),
            "GPIO timed out: GPIO 17 did not reach Low within 100 µs"
        );
    }

    #[test]
    fn test_line() {
        let registers = FakeRegisters::new();
        let gpio = Gpio::new(&registers);
        let mut line = gpio.line(pin(22));

        line.set_mode(Mode::Output).unwrap();
        line.set_high().unwrap();
        assert_eq!(registers.words[2].get(), 0b001 << 6);
        assert_eq!(registers.words[GPSET0].get(), 1 << 22);

        registers.words[GPLEV0].set(0);
        assert!(line.is_low().unwrap());
    }

    #[test]
    fn test_std_clock_is_monotonic() {
        let clock = StdClock::new();
        let first = clock.now_us();
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(clock.now_us() >= first + 2_000);
    }
}
