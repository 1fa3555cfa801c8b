use std::cmp;

/// A byte sink that exposes its spare capacity for scatter-style fills.
///
/// Both [`Buffer`](crate::Buffer) and [`BufIo`](crate::BufIo) implement
/// this, which is what lets [`Reader::read_into`] fill either one directly
/// without an intermediate copy.
///
/// [`Reader::read_into`]: crate::Reader::read_into
pub trait MutBuf {
    /// Number of bytes that can still be written.
    fn room(&self) -> usize;

    /// The writable spare capacity, `room()` bytes long.
    fn tail(&mut self) -> &mut [u8];

    /// Marks `n` bytes of the tail as filled after an external write.
    fn add(&mut self, n: usize);
}

/// Result of [`Buffer::read_line`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LineStatus {
    /// A complete line was copied into the destination.
    Found,
    /// No newline yet; more data is needed.
    Partial,
    /// The destination filled up before the line was complete.
    DstFull,
}

/// A fixed-capacity FIFO byte buffer.
///
/// Bytes are appended at the back and consumed from the front. The buffer
/// never grows; `append` copies at most the remaining room. Whenever the
/// last byte is consumed both cursors snap back to the start, so a drained
/// buffer always has its full capacity available again.
pub struct Buffer {
    data: Box<[u8]>,
    first: usize,
    last: usize,
}

impl Buffer {
    /// Creates a buffer with the platform's stdio capacity (`BUFSIZ`).
    pub fn new() -> Buffer {
        Buffer::with_capacity(libc::BUFSIZ as usize)
    }

    pub fn with_capacity(capacity: usize) -> Buffer {
        assert!(capacity > 0, "capacity must be positive");
        Buffer {
            data: vec![0; capacity].into_boxed_slice(),
            first: 0,
            last: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of unread bytes.
    pub fn len(&self) -> usize {
        self.last - self.first
    }

    pub fn is_empty(&self) -> bool {
        self.first == self.last
    }

    /// The unread bytes, oldest first.
    pub fn data(&self) -> &[u8] {
        &self.data[self.first..self.last]
    }

    /// Drops all buffered bytes.
    pub fn clear(&mut self) {
        self.first = 0;
        self.last = 0;
    }

    /// Copies up to `room()` bytes from `bytes` to the back of the buffer
    /// and returns how many were copied. The buffer does not grow.
    pub fn append(&mut self, bytes: &[u8]) -> usize {
        let n = cmp::min(bytes.len(), self.room());
        self.data[self.last..self.last + n].copy_from_slice(&bytes[..n]);
        self.last += n;
        n
    }

    /// Removes and returns the first `min(n, len)` bytes.
    pub fn read(&mut self, n: usize) -> Vec<u8> {
        let n = cmp::min(n, self.len());
        let out = self.data[self.first..self.first + n].to_vec();
        self.consume(n);
        out
    }

    /// Removes and returns all unread bytes.
    pub fn read_all(&mut self) -> Vec<u8> {
        self.read(self.len())
    }

    /// Discards up to `n` bytes from the front; returns how many were
    /// discarded.
    pub fn skip(&mut self, n: usize) -> usize {
        let n = cmp::min(n, self.len());
        self.consume(n);
        n
    }

    /// Copies bytes into `dst` up to the next `'\n'`, consuming them from
    /// `self`. The delimiter itself is consumed when a line is found and is
    /// copied into `dst` only if `include_delim` is set.
    ///
    /// Returns [`LineStatus::Partial`] when no newline has arrived yet and
    /// [`LineStatus::DstFull`] when `dst` ran out of room first; in both
    /// cases the bytes copied so far have already been consumed, so the
    /// caller can retry with the same `dst` after more data (or more room)
    /// shows up.
    pub fn read_line(&mut self, dst: &mut Buffer, include_delim: bool) -> LineStatus {
        let len = self.len();
        let mut status = LineStatus::Partial;
        let mut pos = 0;

        while pos < len && self.data[self.first + pos] != b'\n' {
            if !dst.push(self.data[self.first + pos]) {
                status = LineStatus::DstFull;
                break;
            }
            pos += 1;
        }

        if status == LineStatus::Partial && pos < len {
            status = LineStatus::Found;

            if include_delim {
                if dst.push(self.data[self.first + pos]) {
                    pos += 1;
                } else {
                    // The delimiter stays behind for the retry.
                    status = LineStatus::DstFull;
                }
            } else {
                pos += 1;
            }
        }

        self.consume(pos);
        status
    }

    fn push(&mut self, byte: u8) -> bool {
        if self.room() == 0 {
            return false;
        }
        self.data[self.last] = byte;
        self.last += 1;
        true
    }

    fn consume(&mut self, n: usize) {
        self.first += n;
        if self.first >= self.last {
            self.first = 0;
            self.last = 0;
        }
    }
}

impl MutBuf for Buffer {
    fn room(&self) -> usize {
        self.data.len() - self.last
    }

    fn tail(&mut self) -> &mut [u8] {
        &mut self.data[self.last..]
    }

    fn add(&mut self, n: usize) {
        self.last += n;
        debug_assert!(self.last <= self.data.len());
    }
}

impl Default for Buffer {
    fn default() -> Buffer {
        Buffer::new()
    }
}
