use std::cmp::min;
use std::io::{self, Read, Write};

/// Fixed-capacity circular byte buffer sitting between a stream and the response matcher.
///
/// Bytes are appended at the tail by [`read_from`](RingByteBuffer::read_from)
/// (or `Write`) and consumed from the head, one at a time with
/// [`pop_front`](RingByteBuffer::pop_front) or in bulk through `Read`.
///
/// # Example
///
/// ```rust
/// use std::io::Write;
/// use rplidar_serial::base::RingByteBuffer;
///
/// let mut buffer = RingByteBuffer::with_capacity(8);
/// buffer.write(&[0xA5, 0x5A]).unwrap();
/// assert_eq!(buffer.pop_front(), Some(0xA5));
/// assert_eq!(buffer.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RingByteBuffer {
    buf: Vec<u8>,
    head: usize,
    size: usize,
}

impl RingByteBuffer {
    /// Creates an empty buffer able to hold `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> RingByteBuffer {
        RingByteBuffer {
            buf: vec![0; capacity],
            head: 0,
            size: 0,
        }
    }

    /// Number of unread bytes.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Number of bytes that can still be appended.
    pub fn free_space(&self) -> usize {
        self.buf.len() - self.size
    }

    fn tail(&self) -> usize {
        (self.head + self.size) % self.buf.len()
    }

    /// Contiguous run of the oldest unread bytes.
    ///
    /// When the unread data wraps around the end of the storage only the
    /// first part is returned; skip it to reach the rest.
    pub fn current_read_slice(&self) -> &[u8] {
        let end = min(self.head + self.size, self.buf.len());
        &self.buf[self.head..end]
    }

    /// Drops up to `bytes` unread bytes, returning how many were dropped.
    pub fn skip_bytes(&mut self, bytes: usize) -> usize {
        let skipped = min(self.size, bytes);
        if skipped > 0 {
            self.head = (self.head + skipped) % self.buf.len();
            self.size -= skipped;
        }
        skipped
    }

    /// Removes and returns the oldest unread byte.
    pub fn pop_front(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let byte = self.buf[self.head];
        self.skip_bytes(1);
        Some(byte)
    }

    /// Drops all unread bytes, returning how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.size;
        self.head = 0;
        self.size = 0;
        dropped
    }

    fn current_write_slice(&mut self) -> &mut [u8] {
        let start = self.tail();
        let end = min(self.buf.len(), start + self.free_space());
        &mut self.buf[start..end]
    }

    fn mark_bytes_as_written(&mut self, bytes: usize) {
        self.size += min(self.free_space(), bytes);
    }

    /// Performs a single read from `upstream` into the free space.
    ///
    /// Returns the number of bytes appended; 0 either means the buffer is
    /// full or the upstream reported end-of-stream, check
    /// [`free_space`](RingByteBuffer::free_space) to tell them apart.
    /// Timeouts and `WouldBlock` from the upstream are reported as errors so
    /// the caller can decide how to wait.
    pub fn read_from(&mut self, upstream: &mut (impl Read + ?Sized)) -> io::Result<usize> {
        if self.free_space() == 0 {
            return Ok(0);
        }
        let read = upstream.read(self.current_write_slice())?;
        self.mark_bytes_as_written(read);
        Ok(read)
    }
}

impl Read for RingByteBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut copied = 0;
        // at most two passes: before and after the wrap point
        for _ in 0..2 {
            let slice = self.current_read_slice();
            let n = min(slice.len(), buf.len() - copied);
            buf[copied..copied + n].copy_from_slice(&slice[..n]);
            self.skip_bytes(n);
            copied += n;
        }
        Ok(copied)
    }
}

impl Write for RingByteBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut written = 0;
        for _ in 0..2 {
            let slice = self.current_write_slice();
            let n = min(slice.len(), data.len() - written);
            slice[..n].copy_from_slice(&data[written..written + n]);
            self.mark_bytes_as_written(n);
            written += n;
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
