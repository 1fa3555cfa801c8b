//! An embeddable single-threaded coroutine I/O runtime.
//!
//! Corio lets cooperative tasks write straight-line code while performing
//! non-blocking network, file, and timer operations. A [`Runtime`] drives a
//! readiness selector and a monotonic timer list from one thread; tasks
//! suspend at the documented I/O and sleep calls and are resumed when their
//! file descriptor becomes ready, their timer fires, or they are resumed
//! explicitly.
//!
//! The pieces:
//!
//! * [`Runtime`] / [`Handle`] — the scheduler loop and the cloneable
//!   reference used to spawn tasks and create I/O objects.
//! * [`IoHandle`] — a non-blocking fd with a [`wait`]/[`cancel`] protocol.
//! * [`Reader`] / [`Writer`] — fd-backed helpers that encapsulate the
//!   retry loop around `read`/`write`, including partial writes, zero-copy
//!   file transfer, timeouts, cancelation, and transport overrides.
//! * [`Buffer`] / [`BufIo`] — the FIFO byte queue and the parser buffer
//!   used by line- and protocol-oriented code.
//!
//! [`wait`]: IoHandle::wait
//! [`cancel`]: IoHandle::cancel
//!
//! # Examples
//!
//! An echo pair over a Unix socket pair:
//!
//! ```no_run
//! use std::os::unix::net::UnixStream;
//! use std::os::fd::AsRawFd;
//! use corio::Runtime;
//!
//! let rt = Runtime::new().unwrap();
//! let (a, b) = UnixStream::pair().unwrap();
//!
//! let h = rt.handle().clone();
//! rt.handle().spawn(async move {
//!     let reader = h.reader(a.as_raw_fd()).unwrap();
//!     let data = reader.read(5, Some(1.0)).await.unwrap();
//!     assert_eq!(data, b"hello");
//!     h.stop();
//! });
//!
//! let h = rt.handle().clone();
//! rt.handle().spawn(async move {
//!     let writer = h.writer(b.as_raw_fd()).unwrap();
//!     writer.write(b"hello", None).await.unwrap();
//! });
//!
//! rt.run().unwrap();
//! ```
//!
//! # Scheduling model
//!
//! Strictly single-threaded and cooperative: there is no preemption and no
//! work stealing, and runtime state must not be shared across OS threads.
//! An uncaught panic inside a task is fatal by design — the panic hook (see
//! [`Handle::set_panic_hook`]) may annotate it, after which the process
//! exits with a non-zero status.

#![cfg(unix)]

#[macro_use]
mod macros;

mod buffer;
mod bufio;
mod error;
mod interest;
mod io;
mod reader;
mod runtime;
mod sys;
mod task;
mod time;
mod timer;
mod token;
mod writer;

pub use buffer::{Buffer, LineStatus, MutBuf};
pub use bufio::BufIo;
pub use error::Error;
pub use interest::Interest;
pub use io::IoHandle;
pub use reader::{ReadFn, Reader};
pub use runtime::{Handle, Runtime};
pub use task::TaskId;
pub use time::now;
pub use writer::{WriteFn, Writer};
