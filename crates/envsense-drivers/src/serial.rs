//! # Framed Serial
//!
//! Fixed-length command/response exchanges over a byte stream.
//!
//! The sensors served by this module answer every command with a response of
//! the same length, so an exchange writes a whole frame and then blocks until
//! exactly as many bytes have been received or the stream reports an error.

use core::result::Result::{self, Err, Ok};

use embedded_io::{Read, ReadExactError, Write};

/// Errors that may occur during a framed exchange.
#[derive(Debug)]
pub enum SerialError<E> {
    /// Stream I/O error.
    Io(E),
    /// The stream ended before a whole response frame was received.
    Truncated,
}

impl<E> From<E> for SerialError<E> {
    fn from(e: E) -> Self {
        SerialError::Io(e)
    }
}

/// A framed command/response channel over a byte stream.
pub struct FramedSerial<S> {
    stream: S,
}

impl<S> FramedSerial<S>
where
    S: Read + Write,
{
    /// Creates a [`FramedSerial`] over the given stream.
    #[must_use]
    pub const fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Sends `command` and returns the response frame of the same length.
    ///
    /// # Errors
    ///
    /// Returns an error if writing or reading the stream fails, or if the
    /// stream ends before `N` response bytes are received.
    pub fn exchange<const N: usize>(
        &mut self,
        command: &[u8; N],
    ) -> Result<[u8; N], SerialError<S::Error>> {
        self.stream.write_all(command)?;
        self.stream.flush()?;

        let mut response = [0u8; N];
        match self.stream.read_exact(&mut response) {
            Ok(()) => Ok(response),
            Err(ReadExactError::UnexpectedEof) => Err(SerialError::Truncated),
            Err(ReadExactError::Other(e)) => Err(SerialError::Io(e)),
        }
    }

    /// Releases the underlying stream.
    pub fn release(self) -> S {
        self.stream
    }
}
