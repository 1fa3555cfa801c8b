use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::ptr;

use libc::{EPOLLERR, EPOLLHUP, EPOLLIN, EPOLLOUT};
use log::trace;

use crate::interest::Interest;
use crate::token::Token;

/// Readiness selector backed by epoll.
///
/// Registrations are level-triggered: a waiter that does not drain a ready
/// file descriptor is woken again on the next `select`. Error and hangup
/// conditions are always part of the armed event mask.
#[derive(Debug)]
pub(crate) struct Selector {
    ep: OwnedFd,
}

impl Selector {
    pub fn new() -> io::Result<Selector> {
        // SAFETY: `epoll_create1(2)` ensures the fd is valid.
        let ep = unsafe { OwnedFd::from_raw_fd(syscall!(epoll_create1(libc::EPOLL_CLOEXEC))?) };
        Ok(Selector { ep })
    }

    /// Wait for events, for at most `timeout_ms` milliseconds. A negative
    /// timeout blocks until an event arrives.
    pub fn select(&self, events: &mut Events, timeout_ms: i32) -> io::Result<()> {
        events.inner.clear();
        syscall!(epoll_wait(
            self.ep.as_raw_fd(),
            events.inner.as_mut_ptr(),
            events.inner.capacity() as i32,
            timeout_ms,
        ))
        .map(|n_events| {
            // This is safe because `epoll_wait` ensures that `n_events` are
            // assigned.
            unsafe { events.inner.set_len(n_events as usize) };
        })
    }

    pub fn register(&self, fd: RawFd, token: Token, interest: Interest) -> io::Result<()> {
        trace!("registering event source with selector: fd={}, token={:?}, interest={:?}", fd, token, interest);
        let mut event = libc::epoll_event {
            events: interest_to_epoll(interest),
            u64: usize::from(token) as u64,
        };

        let ep = self.ep.as_raw_fd();
        syscall!(epoll_ctl(ep, libc::EPOLL_CTL_ADD, fd, &mut event)).map(|_| ())
    }

    #[allow(dead_code)]
    pub fn reregister(&self, fd: RawFd, token: Token, interest: Interest) -> io::Result<()> {
        trace!("reregistering event source with selector: fd={}, token={:?}, interest={:?}", fd, token, interest);
        let mut event = libc::epoll_event {
            events: interest_to_epoll(interest),
            u64: usize::from(token) as u64,
        };

        let ep = self.ep.as_raw_fd();
        syscall!(epoll_ctl(ep, libc::EPOLL_CTL_MOD, fd, &mut event)).map(|_| ())
    }

    pub fn deregister(&self, fd: RawFd) -> io::Result<()> {
        trace!("deregistering event source from selector: fd={}", fd);
        let ep = self.ep.as_raw_fd();
        syscall!(epoll_ctl(ep, libc::EPOLL_CTL_DEL, fd, ptr::null_mut())).map(|_| ())
    }
}

impl AsRawFd for Selector {
    fn as_raw_fd(&self) -> RawFd {
        self.ep.as_raw_fd()
    }
}

fn interest_to_epoll(interest: Interest) -> u32 {
    // Error and hangup always wake the waiter; they are not maskable.
    let mut kind = EPOLLERR | EPOLLHUP;

    if interest.is_readable() {
        kind |= EPOLLIN;
    }

    if interest.is_writable() {
        kind |= EPOLLOUT;
    }

    kind as u32
}

/// A batch of readiness events as filled in by `Selector::select`.
pub(crate) struct Events {
    inner: Vec<libc::epoll_event>,
}

impl Events {
    pub fn with_capacity(capacity: usize) -> Events {
        Events {
            inner: Vec::with_capacity(capacity),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Token> + '_ {
        self.inner.iter().map(|event| Token(event.u64 as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

    fn pipe() -> (OwnedFd, OwnedFd) {
        let mut fds = [0; 2];
        syscall!(pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC)).unwrap();
        unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) }
    }

    #[test]
    fn register_select_deregister() {
        let selector = Selector::new().unwrap();
        let mut events = Events::with_capacity(8);
        let (rd, wr) = pipe();

        selector
            .register(rd.as_raw_fd(), Token(1), Interest::READABLE)
            .unwrap();

        selector.select(&mut events, 0).unwrap();
        assert_eq!(events.iter().count(), 0);

        syscall!(write(wr.as_raw_fd(), b"x".as_ptr() as *const libc::c_void, 1)).unwrap();

        selector.select(&mut events, 100).unwrap();
        assert_eq!(events.iter().collect::<Vec<_>>(), vec![Token(1)]);

        // Level-triggered: the byte is still unread, so the fd stays ready.
        selector.select(&mut events, 0).unwrap();
        assert_eq!(events.iter().collect::<Vec<_>>(), vec![Token(1)]);

        selector
            .reregister(rd.as_raw_fd(), Token(2), Interest::READABLE)
            .unwrap();
        selector.select(&mut events, 0).unwrap();
        assert_eq!(events.iter().collect::<Vec<_>>(), vec![Token(2)]);

        selector.deregister(rd.as_raw_fd()).unwrap();
        selector.select(&mut events, 0).unwrap();
        assert_eq!(events.iter().count(), 0);
    }
}
