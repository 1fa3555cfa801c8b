use std::cell::RefCell;
use std::future::Future;
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::error::Error;
use crate::interest::Interest;
use crate::runtime::Inner;
use crate::token::Token;

/// Why a suspended I/O operation was resumed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Wake {
    /// Readiness arrived, or the task was resumed explicitly; retry the
    /// operation.
    Ready,
    /// The operation's timer fired first.
    Timeout,
    /// `cancel()` was called.
    Canceled,
}

/// Shared wait state for one non-blocking file descriptor.
pub(crate) struct IoState {
    pub fd: RawFd,
    /// Soft deadline in seconds for the in-flight operation; 0 means none.
    pub timeout: f64,
    pub is_timeout: bool,
    pub is_canceled: bool,
    /// The task suspended on this fd, if any. At most one task may wait.
    pub task: Option<crate::TaskId>,
    /// Selector registration while a wait is in flight.
    pub token: Option<Token>,
    /// Armed timeout timer while a wait is in flight.
    pub timer: Option<u64>,
}

impl IoState {
    fn new(fd: RawFd) -> IoState {
        IoState {
            fd,
            timeout: 0.0,
            is_timeout: false,
            is_canceled: false,
            task: None,
            token: None,
            timer: None,
        }
    }
}

/// An asynchronous wrapper around a non-blocking file descriptor.
///
/// Created by [`Handle::io`]; the file descriptor is switched to
/// non-blocking mode on creation. The handle never closes the descriptor —
/// its lifetime stays with the embedder.
///
/// [`Handle::io`]: crate::Handle::io
pub struct IoHandle {
    pub(crate) state: Rc<RefCell<IoState>>,
    pub(crate) inner: Rc<Inner>,
}

impl IoHandle {
    pub(crate) fn new(inner: Rc<Inner>, fd: RawFd) -> io::Result<IoHandle> {
        crate::sys::set_nonblocking(fd)?;
        Ok(IoHandle {
            state: Rc::new(RefCell::new(IoState::new(fd))),
            inner,
        })
    }

    /// Suspends the current task until the file descriptor is ready for
    /// `interest`, an optional `timeout` in seconds expires, or the wait is
    /// [canceled](IoHandle::cancel). Error and hangup conditions count as
    /// ready.
    ///
    /// # Panics
    ///
    /// Panics if another task is already waiting on this handle, or when
    /// called outside of a spawned task.
    pub async fn wait(&self, interest: Interest, timeout: Option<f64>) -> Result<(), Error> {
        self.check_idle();
        self.set_timeout(timeout);
        self.arm(interest)?;

        Park::new().await;

        match self.consume_wake() {
            Wake::Timeout => Err(Error::Timeout),
            Wake::Canceled => {
                self.finish();
                Err(Error::Canceled)
            }
            Wake::Ready => {
                self.finish();
                Ok(())
            }
        }
    }

    /// Cancels a pending wait, resuming the waiter with a canceled result.
    /// Fire-and-forget; a no-op when nothing is waiting.
    pub fn cancel(&self) {
        let task = {
            let mut state = self.state.borrow_mut();
            if state.task.is_none() {
                return;
            }
            state.is_canceled = true;
            state.task.take()
        };

        if let Some(task) = task {
            self.inner.resume(task);
        }
    }

    pub(crate) fn fd(&self) -> RawFd {
        self.state.borrow().fd
    }

    /// Asserts that no other task is suspended on this handle.
    pub(crate) fn check_idle(&self) {
        if self.state.borrow().task.is_some() {
            panic!("another coroutine is already waiting on this fd");
        }
    }

    pub(crate) fn set_timeout(&self, timeout: Option<f64>) {
        self.state.borrow_mut().timeout = timeout.unwrap_or(0.0);
    }

    /// Registers the fd (arming the timeout timer if one is configured), or
    /// just re-parks the current task when the registration from an earlier
    /// would-block is still live.
    pub(crate) fn arm(&self, interest: Interest) -> Result<(), Error> {
        if self.state.borrow().token.is_some() {
            self.inner.rearm_io(&self.state);
            Ok(())
        } else {
            self.inner.register_io(&self.state, interest).map_err(Error::Os)
        }
    }

    /// Classifies the wake-up after a suspension, clearing the flag it
    /// consumed.
    ///
    /// On `Timeout` the expiry drain has already deregistered the fd; on
    /// `Canceled` and `Ready` the registration is still live and the caller
    /// settles it via [`IoHandle::finish`].
    pub(crate) fn consume_wake(&self) -> Wake {
        let mut state = self.state.borrow_mut();
        if state.is_timeout {
            state.is_timeout = false;
            Wake::Timeout
        } else if state.is_canceled {
            state.is_canceled = false;
            Wake::Canceled
        } else {
            Wake::Ready
        }
    }

    /// Releases everything the in-flight operation acquired: selector
    /// registration and timeout timer. Idempotent.
    pub(crate) fn finish(&self) {
        self.inner.deregister_io(&self.state);
    }
}

impl AsRawFd for IoHandle {
    fn as_raw_fd(&self) -> RawFd {
        self.state.borrow().fd
    }
}

/// Suspends the current task exactly once; the scheduler resumes it via a
/// timer, fd readiness, cancelation, or an explicit resume.
pub(crate) struct Park {
    yielded: bool,
}

impl Park {
    pub fn new() -> Park {
        Park { yielded: false }
    }
}

impl Future for Park {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            Poll::Pending
        }
    }
}
