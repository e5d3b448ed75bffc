//! Transport layer for I/O abstraction

use crate::error::Result;

mod serial;
pub use serial::SerialTransport;

mod mock;
pub use mock::MockTransport;

/// Byte-stream transport to the Teensy
pub trait Transport: Send {
    /// Read data into buffer, returns number of bytes read (0 when none pending)
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write data from buffer, returns number of bytes written
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Flush any pending writes (blocking until complete)
    fn flush(&mut self) -> Result<()>;

    /// Number of bytes buffered and ready to read
    fn available(&mut self) -> Result<usize>;
}

/// Write an entire buffer, retrying partial writes
pub fn write_all(transport: &mut dyn Transport, data: &[u8]) -> Result<()> {
    let mut written = 0;
    while written < data.len() {
        written += transport.write(&data[written..])?;
    }
    Ok(())
}
