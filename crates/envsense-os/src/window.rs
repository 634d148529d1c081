use std::ffi::c_void;
use std::fs::OpenOptions;
use std::num::NonZeroUsize;
use std::os::unix::fs::OpenOptionsExt;
use std::ptr::NonNull;
use std::sync::OnceLock;

use nix::libc;
use nix::sys::mman::{MapFlags, ProtFlags, mmap, munmap};

use tracing::{debug, warn};

use crate::config::GpioConfig;
use crate::error::{Error, Result};
use crate::gpio::REGISTER_WORDS;

/// Word-addressed access to a block of 32-bit hardware registers.
pub trait Registers {
    /// Reads the register at `word`.
    fn read(&self, word: usize) -> u32;

    /// Writes `value` into the register at `word`.
    fn write(&self, word: usize, value: u32);
}

/// A block of device memory mapped into the process.
///
/// Accesses are volatile and unsynchronized: callers sharing a window across
/// threads must serialize their read-modify-write sequences themselves.
pub struct RegisterWindow {
    base: NonNull<u32>,
    len: usize,
}

// SAFETY: the mapping is valid for the whole lifetime of the value and is
// only ever accessed through volatile reads and writes of whole words.
unsafe impl Send for RegisterWindow {}
// SAFETY: see above.
unsafe impl Sync for RegisterWindow {}

static WINDOW: OnceLock<RegisterWindow> = OnceLock::new();

/// Returns the process-wide register window, mapping it on first use.
///
/// Later calls return the window mapped by the first successful one,
/// whatever their configuration.
///
/// # Errors
///
/// Returns [`Error::TransportUnavailable`] if the device cannot be opened or
/// mapped, and [`Error::Config`] if the configured block is unusable.
pub fn ensure_initialized(config: &GpioConfig) -> Result<&'static RegisterWindow> {
    if let Some(window) = WINDOW.get() {
        return Ok(window);
    }

    let window = RegisterWindow::map(config)?;

    // If another thread won the race, its window is kept and ours unmapped.
    Ok(WINDOW.get_or_init(|| window))
}

impl RegisterWindow {
    /// Maps `config.length` bytes of `config.device` starting at
    /// `config.base`.
    ///
    /// The block must span at least [`REGISTER_WORDS`] words.
    ///
    /// Prefer [`ensure_initialized`], which maps the block once per process.
    ///
    /// # Errors
    ///
    /// See [`ensure_initialized`].
    pub fn map(config: &GpioConfig) -> Result<Self> {
        let resource = config.device.display().to_string();

        let length = NonZeroUsize::new(config.length)
            .filter(|length| length.get() % size_of::<u32>() == 0)
            .ok_or_else(|| {
                Error::Config(format!(
                    "GPIO window length {} is not a positive multiple of 4",
                    config.length
                ))
            })?;
        if length.get() < REGISTER_WORDS * size_of::<u32>() {
            return Err(Error::Config(format!(
                "GPIO window length {} is shorter than the {} bytes of the GPIO registers",
                config.length,
                REGISTER_WORDS * size_of::<u32>()
            )));
        }
        let offset = libc::off_t::try_from(config.base).map_err(|_| {
            Error::Config(format!("GPIO base {:#x} is out of range", config.base))
        })?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(&config.device)
            .map_err(|e| Error::unavailable(&resource, e))?;

        // SAFETY: a fresh shared mapping is requested, nothing else in the
        // process aliases it. The descriptor may be closed once mapped.
        let base = unsafe {
            mmap(
                None,
                length,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                &file,
                offset,
            )
        }
        .map_err(|e| Error::unavailable(&resource, e))?;

        debug!(
            "Mapped {} bytes of {resource} at {:#x}.",
            length.get(),
            config.base
        );

        Ok(Self {
            base: base.cast(),
            len: length.get() / size_of::<u32>(),
        })
    }

    /// Returns the number of 32-bit words in the window.
    #[must_use]
    pub const fn words(&self) -> usize {
        self.len
    }

    fn word(&self, word: usize) -> *mut u32 {
        assert!(
            word < self.len,
            "register {word} outside a window of {} words",
            self.len
        );

        // SAFETY: `word` is within the mapping.
        unsafe { self.base.as_ptr().add(word) }
    }
}

impl Registers for RegisterWindow {
    fn read(&self, word: usize) -> u32 {
        // SAFETY: `word()` returns an aligned pointer inside the mapping.
        unsafe { self.word(word).read_volatile() }
    }

    fn write(&self, word: usize, value: u32) {
        // SAFETY: `word()` returns an aligned pointer inside the mapping.
        unsafe { self.word(word).write_volatile(value) }
    }
}

impl Drop for RegisterWindow {
    fn drop(&mut self) {
        let base: NonNull<c_void> = self.base.cast();

        // SAFETY: the mapping was created in `map` with this exact length and
        // no reference into it outlives `self`.
        if let Err(e) = unsafe { munmap(base, self.len * size_of::<u32>()) } {
            warn!("Unable to unmap the GPIO window: {e}.");
        }
    }
}
