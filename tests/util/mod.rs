// Not all functions are used by all tests.
#![allow(dead_code)]

use std::fs::File;
use std::os::fd::{FromRawFd, OwnedFd};
use std::os::unix::net::UnixStream;
use std::sync::Once;

pub fn init() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// A connected pair of stream sockets. The runtime switches them to
/// non-blocking mode when they are wrapped.
pub fn socket_pair() -> (UnixStream, UnixStream) {
    UnixStream::pair().expect("unable to create socket pair")
}

/// A pipe as (read end, write end).
pub fn pipe() -> (OwnedFd, OwnedFd) {
    let mut fds = [0; 2];
    let res = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };
    assert_eq!(res, 0, "unable to create pipe");
    unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) }
}

/// Wraps a pipe end for std-style blocking writes from test code.
pub fn pipe_writer(fd: OwnedFd) -> File {
    File::from(fd)
}
