use crate::base::error::{Error, Result};
use crate::base::ring_byte_buffer::RingByteBuffer;
use crate::base::traits::ByteTransport;
use log::{error, trace, warn};
use std::io;
use std::time::{Duration, Instant};

const DEFAULT_CHANNEL_READ_BUFFER_SIZE: usize = 1024;

/// Byte transport over any blocking `Read + Write` stream, such as an opened serial port.
///
/// The stream should be configured with a short read timeout: that timeout is
/// the suspension point while [`read_byte`](ByteTransport::read_byte) waits
/// for data, and the channel checks its own deadline between reads.
///
/// # Examples
/// ```ignore
/// let port = serialport::new("/dev/ttyUSB0", 115200)
///     .timeout(Duration::from_millis(10))
///     .open()?;
/// let mut channel = Channel::new(port);
///
/// channel.write(&Command::GetHealth.frame())?;
/// ```
#[derive(Debug)]
pub struct Channel<T: ?Sized> {
    stream: Box<T>,
    read_buffer: RingByteBuffer,
}

impl<T: ?Sized> Channel<T>
where
    T: io::Read + io::Write,
{
    /// Create a new `Channel` with the default read buffer size
    pub fn new(stream: Box<T>) -> Channel<T> {
        trace!(
            "Creating new Channel with default buffer size {}",
            DEFAULT_CHANNEL_READ_BUFFER_SIZE
        );
        Channel::with_read_buffer_size(stream, DEFAULT_CHANNEL_READ_BUFFER_SIZE)
    }

    /// Create a new `Channel` with non-default ring buffer capacity
    pub fn with_read_buffer_size(stream: Box<T>, read_buffer_size: usize) -> Channel<T> {
        trace!("Creating new Channel with buffer size {}", read_buffer_size);
        Channel {
            stream,
            read_buffer: RingByteBuffer::with_capacity(read_buffer_size),
        }
    }

    /// Number of received bytes buffered but not consumed yet
    pub fn buffered(&self) -> usize {
        self.read_buffer.len()
    }

    /// Gives the underlying stream back
    pub fn into_inner(self) -> Box<T> {
        self.stream
    }

    /// Pull whatever the stream has into the ring buffer.
    ///
    /// Returns `Ok(0)` when the stream timed out or would block, and an
    /// `UnexpectedEof` error when the stream is closed.
    fn fill(&mut self) -> Result<usize> {
        match self.read_buffer.read_from(&mut *self.stream) {
            Ok(0) if self.read_buffer.free_space() > 0 => {
                error!("Stream reached end of file");
                Err(Error::IoError(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream closed",
                )))
            }
            Ok(bytes_read) => {
                trace!(
                    "Read {} bytes from stream (buffer len: {})",
                    bytes_read,
                    self.read_buffer.len()
                );
                Ok(bytes_read)
            }
            Err(e)
                if e.kind() == io::ErrorKind::TimedOut
                    || e.kind() == io::ErrorKind::WouldBlock =>
            {
                trace!("Stream read timed out");
                Ok(0)
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(0),
            Err(e) => {
                error!("IO error reading from stream: {}", e);
                Err(e.into())
            }
        }
    }
}

impl<T: ?Sized> ByteTransport for Channel<T>
where
    T: io::Read + io::Write,
{
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        trace!("Channel write: {:02X?}", bytes);
        if let Err(e) = self.stream.write_all(bytes) {
            error!("IO error during write_all: {}", e);
            return Err(e.into());
        }
        self.stream.flush()?;
        trace!("Stream flushed");
        Ok(bytes.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.read_buffer.is_empty() {
            self.fill()?;
        }
        let read = io::Read::read(&mut self.read_buffer, buf)?;
        trace!("Channel read {} of {} requested bytes", read, buf.len());
        Ok(read)
    }

    fn bytes_available(&mut self) -> Result<bool> {
        Ok(!self.read_buffer.is_empty())
    }

    fn read_byte(&mut self, timeout: Option<Duration>) -> Result<u8> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if let Some(byte) = self.read_buffer.pop_front() {
                return Ok(byte);
            }

            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    warn!("Timed out after {:?} waiting for a byte", timeout);
                    return Err(Error::OperationTimeout);
                }
            }

            self.fill()?;
        }
    }

    fn discard_input(&mut self) -> Result<usize> {
        let dropped = self.read_buffer.clear();
        if dropped > 0 {
            warn!("Discarded {} stale bytes from channel", dropped);
        }
        Ok(dropped)
    }
}
