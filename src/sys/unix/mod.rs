mod selector;

pub(crate) use self::selector::{Events, Selector};

use std::io;
use std::os::fd::RawFd;

/// Put the file descriptor into non-blocking mode.
///
/// Leaves the flags untouched when `O_NONBLOCK` is already set.
pub(crate) fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = syscall!(fcntl(fd, libc::F_GETFL))?;
    if flags & libc::O_NONBLOCK != 0 {
        return Ok(());
    }
    syscall!(fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK)).map(|_| ())
}
