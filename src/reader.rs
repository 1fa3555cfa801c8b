use std::cell::RefCell;
use std::io;

use crate::buffer::MutBuf;
use crate::error::Error;
use crate::interest::Interest;
use crate::io::{IoHandle, Park, Wake};

/// Replacement for the kernel `read` used by layered transports (TLS and
/// friends), carrying whatever context it needs by value.
///
/// Returning 0 reports end of stream; an error of kind
/// [`WouldBlock`](io::ErrorKind::WouldBlock) means "come back when the fd is
/// readable" and re-arms the wait. Any other error resolves the read with
/// its description.
///
/// Implemented for free by any `FnMut(&mut [u8]) -> io::Result<usize>`
/// closure.
pub trait ReadFn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<F> ReadFn for F
where
    F: FnMut(&mut [u8]) -> io::Result<usize>,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (self)(buf)
    }
}

/// Asynchronous reads from a non-blocking file descriptor.
///
/// A read first attempts the syscall directly; only when it would block does
/// the task suspend on readable readiness (plus an optional timeout). At
/// most one task may have a read in flight per `Reader`.
///
/// Created by [`Handle::reader`] or, with a transport override, by
/// [`Handle::reader_with`].
///
/// [`Handle::reader`]: crate::Handle::reader
/// [`Handle::reader_with`]: crate::Handle::reader_with
pub struct Reader {
    io: IoHandle,
    read_fn: Option<RefCell<Box<dyn ReadFn>>>,
}

impl Reader {
    pub(crate) fn new(io: IoHandle, read_fn: Option<Box<dyn ReadFn>>) -> Reader {
        Reader {
            io,
            read_fn: read_fn.map(RefCell::new),
        }
    }

    /// Reads up to `expected` bytes, suspending until at least one byte
    /// arrives, the optional `timeout` (seconds) expires, or the read is
    /// canceled.
    ///
    /// # Panics
    ///
    /// Panics if `expected` is 0 or another task is already waiting on this
    /// file descriptor.
    pub async fn read(&self, expected: usize, timeout: Option<f64>) -> Result<Vec<u8>, Error> {
        assert!(expected > 0, "expected size must be greater than 0");
        self.io.check_idle();
        self.io.set_timeout(timeout);

        let mut buf = vec![0u8; expected];
        loop {
            match self.raw_read(&mut buf) {
                Ok(0) => {
                    self.io.finish();
                    return Err(Error::Eof);
                }
                Ok(n) => {
                    self.io.finish();
                    buf.truncate(n);
                    return Ok(buf);
                }
                Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {
                    self.io.arm(Interest::READABLE)?;
                    Park::new().await;
                    match self.io.consume_wake() {
                        Wake::Timeout => return Err(Error::Timeout),
                        Wake::Canceled => {
                            self.io.finish();
                            return Err(Error::Canceled);
                        }
                        Wake::Ready => continue,
                    }
                }
                Err(err) => {
                    self.io.finish();
                    return Err(Error::Os(err));
                }
            }
        }
    }

    /// Reads directly into `buf`'s spare capacity and advances its write
    /// cursor, returning the byte count. This is the copy-free variant of
    /// [`read`](Reader::read) for parser buffers.
    ///
    /// `expected` is clamped to the buffer's room; negative values mean
    /// "as much as fits". Fails with [`Error::BufferFull`] when the buffer
    /// has no room, without touching the file descriptor.
    ///
    /// # Panics
    ///
    /// Panics if `expected` is 0 or another task is already waiting on this
    /// file descriptor.
    pub async fn read_into<B: MutBuf>(
        &self,
        buf: &mut B,
        expected: isize,
        timeout: Option<f64>,
    ) -> Result<usize, Error> {
        assert!(expected != 0, "expected size must be greater than 0");
        self.io.check_idle();

        let room = buf.room();
        if room == 0 {
            return Err(Error::BufferFull);
        }
        let expected = if expected < 0 || expected as usize > room {
            room
        } else {
            expected as usize
        };
        self.io.set_timeout(timeout);

        loop {
            match self.raw_read(&mut buf.tail()[..expected]) {
                Ok(0) => {
                    self.io.finish();
                    return Err(Error::Eof);
                }
                Ok(n) => {
                    self.io.finish();
                    buf.add(n);
                    return Ok(n);
                }
                Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {
                    self.io.arm(Interest::READABLE)?;
                    Park::new().await;
                    match self.io.consume_wake() {
                        Wake::Timeout => return Err(Error::Timeout),
                        Wake::Canceled => {
                            self.io.finish();
                            return Err(Error::Canceled);
                        }
                        Wake::Ready => continue,
                    }
                }
                Err(err) => {
                    self.io.finish();
                    return Err(Error::Os(err));
                }
            }
        }
    }

    /// Cancels a read in flight, resuming the reading task with a canceled
    /// result. Fire-and-forget; a no-op when nothing is waiting. The file
    /// descriptor stays usable.
    pub fn cancel(&self) {
        self.io.cancel();
    }

    fn raw_read(&self, buf: &mut [u8]) -> io::Result<usize> {
        match &self.read_fn {
            Some(read_fn) => read_fn.borrow_mut().read(buf),
            None => {
                let n = syscall!(read(
                    self.io.fd(),
                    buf.as_mut_ptr() as *mut libc::c_void,
                    buf.len(),
                ))?;
                Ok(n as usize)
            }
        }
    }
}
