use std::cell::RefCell;
use std::fs::File;
use std::io;
use std::os::fd::AsRawFd;
use std::path::Path;

use crate::error::Error;
use crate::interest::Interest;
use crate::io::{IoHandle, Park, Wake};

/// Replacement for the kernel `write` used by layered transports (TLS and
/// friends), carrying whatever context it needs by value.
///
/// An error of kind [`WouldBlock`](io::ErrorKind::WouldBlock) means "come
/// back when the fd is writable" and re-arms the wait. Any other error
/// resolves the write with its description.
///
/// Implemented for free by any `FnMut(&[u8]) -> io::Result<usize>` closure.
pub trait WriteFn {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
}

impl<F> WriteFn for F
where
    F: FnMut(&[u8]) -> io::Result<usize>,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (self)(buf)
    }
}

/// Asynchronous writes to a non-blocking file descriptor.
///
/// A write first attempts the syscall directly; on a partial write or
/// would-block the task suspends on writable readiness and keeps going
/// until every byte is out, the optional timeout expires, or the write is
/// canceled. The input bytes are borrowed for the whole operation, so they
/// cannot go away while the write is suspended.
///
/// Created by [`Handle::writer`] or, with a transport override, by
/// [`Handle::writer_with`].
///
/// [`Handle::writer`]: crate::Handle::writer
/// [`Handle::writer_with`]: crate::Handle::writer_with
pub struct Writer {
    io: IoHandle,
    write_fn: Option<RefCell<Box<dyn WriteFn>>>,
}

impl Writer {
    pub(crate) fn new(io: IoHandle, write_fn: Option<Box<dyn WriteFn>>) -> Writer {
        Writer {
            io,
            write_fn: write_fn.map(RefCell::new),
        }
    }

    /// Writes all of `data`, returning its length once every byte is out.
    ///
    /// # Panics
    ///
    /// Panics if another task is already waiting on this file descriptor.
    pub async fn write(&self, data: &[u8], timeout: Option<f64>) -> Result<usize, Error> {
        self.io.check_idle();
        self.io.set_timeout(timeout);

        let total = data.len();
        let mut written = 0;

        loop {
            match self.raw_write(&data[written..]) {
                Ok(n) => {
                    written += n;
                    if written >= total {
                        self.io.finish();
                        return Ok(total);
                    }
                }
                Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {}
                Err(err) => {
                    self.io.finish();
                    return Err(Error::Os(err));
                }
            }

            self.io.arm(Interest::WRITABLE)?;
            Park::new().await;
            match self.io.consume_wake() {
                Wake::Timeout => return Err(Error::Timeout),
                Wake::Canceled => {
                    self.io.finish();
                    return Err(Error::Canceled);
                }
                Wake::Ready => {}
            }
        }
    }

    /// Transfers `len` bytes of the file at `path`, starting at `offset`,
    /// into the writer's file descriptor with a zero-copy kernel transfer.
    /// The source file is opened once and closed exactly once, on every exit
    /// path.
    ///
    /// # Panics
    ///
    /// Panics if another task is already waiting on this file descriptor.
    pub async fn sendfile<P: AsRef<Path>>(
        &self,
        path: P,
        offset: u64,
        len: usize,
        timeout: Option<f64>,
    ) -> Result<usize, Error> {
        self.io.check_idle();
        self.io.set_timeout(timeout);

        let file = File::open(path)?;
        let in_fd = file.as_raw_fd();
        let mut offset = offset as libc::off_t;
        let total = len;
        let mut sent = 0;

        loop {
            match syscall!(sendfile(self.io.fd(), in_fd, &mut offset, total - sent)) {
                Ok(n) => {
                    sent += n as usize;
                    if sent >= total {
                        self.io.finish();
                        return Ok(total);
                    }
                }
                Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {}
                Err(err) => {
                    self.io.finish();
                    return Err(Error::Os(err));
                }
            }

            self.io.arm(Interest::WRITABLE)?;
            Park::new().await;
            match self.io.consume_wake() {
                Wake::Timeout => return Err(Error::Timeout),
                Wake::Canceled => {
                    self.io.finish();
                    return Err(Error::Canceled);
                }
                Wake::Ready => {}
            }
        }
    }

    /// Cancels a write in flight, resuming the writing task with a canceled
    /// result. Fire-and-forget; a no-op when nothing is waiting. The file
    /// descriptor stays usable; bytes already written stay written.
    pub fn cancel(&self) {
        self.io.cancel();
    }

    fn raw_write(&self, data: &[u8]) -> io::Result<usize> {
        match &self.write_fn {
            Some(write_fn) => write_fn.borrow_mut().write(data),
            None => {
                let n = syscall!(write(
                    self.io.fd(),
                    data.as_ptr() as *const libc::c_void,
                    data.len(),
                ))?;
                Ok(n as usize)
            }
        }
    }
}
