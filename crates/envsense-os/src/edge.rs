//! Edge waiting through the sysfs GPIO interface.
//!
//! Unlike the register-level driver in [`crate::gpio`], this path lets the
//! kernel watch the line and sleeps until an edge occurs, at the cost of
//! exporting the pin for the duration of the wait.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use nix::poll::{PollFd, PollFlags, PollTimeout, poll};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::gpio::Pin;

// Attribute files appear asynchronously after an export and may stay
// unwritable until udev has fixed their permissions.
const ATTRIBUTE_RETRY: Duration = Duration::from_millis(100);
const ATTRIBUTE_RETRY_INTERVAL: Duration = Duration::from_millis(1);

/// Signal transition to wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// High to low.
    Falling,
    /// Low to high.
    Rising,
    /// Any transition.
    Both,
}

impl Edge {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Falling => "falling",
            Self::Rising => "rising",
            Self::Both => "both",
        }
    }
}

/// The sysfs GPIO interface rooted at a given directory.
#[derive(Debug, Clone)]
pub struct Sysfs {
    root: PathBuf,
}

impl Default for Sysfs {
    fn default() -> Self {
        Self::new("/sys/class/gpio")
    }
}

impl Sysfs {
    /// Creates a [`Sysfs`] interface rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Blocks until `edge` occurs on `pin` or `timeout` elapses.
    ///
    /// A `None` timeout waits forever. Returns whether an edge was observed.
    /// The pin is exported for the duration of the call and unexported on
    /// every exit path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransportUnavailable`] if the pin cannot be exported
    /// or configured, and [`Error::Transport`] if polling fails.
    pub fn wait_for_edge(&self, pin: Pin, edge: Edge, timeout: Option<Duration>) -> Result<bool> {
        let _exported = Exported::new(&self.root, pin)?;
        let directory = self.root.join(format!("gpio{}", pin.index()));

        write_attribute(&directory.join("direction"), "in")?;
        write_attribute(&directory.join("edge"), edge.as_str())?;

        let value = directory.join("value");
        let mut file = open_attribute(&value, OpenOptions::new().read(true))?;

        // Consume the current value, otherwise the first poll returns
        // immediately.
        let mut current = [0u8; 1];
        let _read = file
            .read(&mut current)
            .map_err(|e| Error::transport(value.display().to_string(), e))?;

        debug!("Waiting for a {} edge on GPIO {}.", edge.as_str(), pin.index());

        let observed = poll_priority(&file, timeout)
            .map_err(|e| Error::transport(value.display().to_string(), e))?;

        Ok(observed)
    }
}

/// Blocks until `edge` occurs on `pin` or `timeout` elapses, through the
/// default sysfs root.
///
/// # Errors
///
/// See [`Sysfs::wait_for_edge`].
pub fn wait_for_edge(pin: Pin, edge: Edge, timeout: Option<Duration>) -> Result<bool> {
    Sysfs::default().wait_for_edge(pin, edge, timeout)
}

// An exported pin, unexported when dropped.
struct Exported<'a> {
    root: &'a Path,
    pin: Pin,
}

impl<'a> Exported<'a> {
    fn new(root: &'a Path, pin: Pin) -> Result<Self> {
        let export = root.join("export");

        match write_control(&export, pin) {
            Ok(()) => {}
            // Left behind by an earlier run, reuse it.
            Err(e) if already_exported(&e) => {
                debug!("GPIO {} is already exported.", pin.index());
            }
            Err(e) => return Err(Error::unavailable(export.display().to_string(), e)),
        }

        Ok(Self { root, pin })
    }
}

impl Drop for Exported<'_> {
    fn drop(&mut self) {
        if let Err(e) = write_control(&self.root.join("unexport"), self.pin) {
            warn!("Unable to unexport GPIO {}: {e}.", self.pin.index());
        }
    }
}

// The kernel answers EBUSY when exporting a line that is already exported.
fn already_exported(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::ResourceBusy
}

fn write_control(path: &Path, pin: Pin) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;

    file.write_all(pin.index().to_string().as_bytes())
}

fn write_attribute(path: &Path, value: &str) -> Result<()> {
    let mut file = open_attribute(path, OpenOptions::new().write(true).truncate(true))?;

    file.write_all(value.as_bytes())
        .map_err(|e| Error::unavailable(path.display().to_string(), e))
}

fn open_attribute(path: &Path, options: &OpenOptions) -> Result<File> {
    let start = Instant::now();

    loop {
        match options.open(path) {
            Ok(file) => return Ok(file),
            Err(e) if start.elapsed() >= ATTRIBUTE_RETRY => {
                return Err(Error::unavailable(path.display().to_string(), e));
            }
            Err(_) => thread::sleep(ATTRIBUTE_RETRY_INTERVAL),
        }
    }
}

fn poll_priority(file: &File, timeout: Option<Duration>) -> nix::Result<bool> {
    let timeout = timeout.map_or(PollTimeout::NONE, |timeout| {
        i32::try_from(timeout.as_millis())
            .ok()
            .and_then(|ms| PollTimeout::try_from(ms).ok())
            .unwrap_or(PollTimeout::MAX)
    });

    let mut fds = [PollFd::new(
        file.as_fd(),
        PollFlags::POLLPRI | PollFlags::POLLERR,
    )];

    Ok(poll(&mut fds, timeout)? > 0)
}
