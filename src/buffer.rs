//! Bounded capture buffer for process output.
//!
//! Each captured stream writes into a [`CappedBuffer`] that stops accepting
//! bytes once its cap is reached. Excess data is discarded, bounding memory
//! independent of how verbose the underlying tool is.

use std::fmt;

/// A fixed-capacity byte buffer that keeps the first `cap` bytes written.
///
/// Unlike a ring buffer, no eviction happens: once full, further writes are
/// counted but dropped. `total_bytes_written` still reflects everything the
/// process produced, so callers can report how much was discarded.
#[derive(Debug, Clone)]
pub struct CappedBuffer {
    buf: Vec<u8>,
    cap: usize,
    total_bytes_written: usize,
}

impl CappedBuffer {
    /// Create a new buffer that retains at most `cap` bytes.
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap.min(8192)),
            cap,
            total_bytes_written: 0,
        }
    }

    /// Write a chunk, retaining only what still fits under the cap.
    pub fn write(&mut self, data: &[u8]) {
        self.total_bytes_written += data.len();
        let room = self.cap.saturating_sub(self.buf.len());
        if room > 0 {
            let take = room.min(data.len());
            self.buf.extend_from_slice(&data[..take]);
        }
    }

    /// Current number of retained bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Total bytes written, including discarded bytes.
    #[must_use]
    pub const fn total_bytes_written(&self) -> usize {
        self.total_bytes_written
    }

    /// Whether any data was discarded.
    #[must_use]
    pub const fn was_truncated(&self) -> bool {
        self.total_bytes_written > self.cap
    }

    /// Consume the buffer, yielding the retained bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

impl fmt::Display for CappedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retains_everything_under_cap() {
        let mut buffer = CappedBuffer::new(10);
        buffer.write(b"hello");
        assert_eq!(buffer.to_string(), "hello");
        assert_eq!(buffer.len(), 5);
        assert!(!buffer.was_truncated());
    }

    #[test]
    fn stops_accepting_at_cap() {
        let mut buffer = CappedBuffer::new(10);
        buffer.write(b"hello");
        buffer.write(b"world");
        buffer.write(b"!");

        // 11 bytes written, first 10 kept, the rest dropped.
        assert_eq!(buffer.len(), 10);
        assert_eq!(buffer.to_string(), "helloworld");
        assert_eq!(buffer.total_bytes_written(), 11);
        assert!(buffer.was_truncated());
    }

    #[test]
    fn oversized_single_write_is_clipped() {
        let mut buffer = CappedBuffer::new(5);
        buffer.write(b"hello world");
        assert_eq!(buffer.to_string(), "hello");
        assert_eq!(buffer.total_bytes_written(), 11);
        assert!(buffer.was_truncated());
    }

    #[test]
    fn exact_capacity_is_not_truncation() {
        let mut buffer = CappedBuffer::new(10);
        buffer.write(b"1234567890");
        assert_eq!(buffer.to_string(), "1234567890");
        assert!(!buffer.was_truncated());
    }

    #[test]
    fn empty_buffer() {
        let buffer = CappedBuffer::new(10);
        assert!(buffer.is_empty());
        assert_eq!(buffer.to_string(), "");
        assert!(!buffer.was_truncated());
    }

    #[test]
    fn invalid_utf8_is_replaced_on_display() {
        let mut buffer = CappedBuffer::new(10);
        buffer.write(&[0xFF, 0xFE, 0xFD]);
        assert!(!buffer.to_string().is_empty());
    }
}
