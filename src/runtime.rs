use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::io;
use std::os::fd::RawFd;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::process;
use std::ptr;
use std::rc::Rc;
use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

use log::trace;

use crate::interest::Interest;
use crate::io::{IoHandle, IoState};
use crate::reader::{ReadFn, Reader};
use crate::sys::{Events, Selector};
use crate::task::{Registry, TaskId};
use crate::time;
use crate::timer::{Holder, TimerQueue};
use crate::token::Token;
use crate::writer::{WriteFn, Writer};

/// Upper bound on readiness events collected per selector wait.
const MAX_EVENTS: usize = 128;

type PanicHook = Box<dyn Fn(&str, &str)>;

/// A single-threaded cooperative I/O runtime.
///
/// The runtime drives tasks spawned through its [`Handle`]: the scheduler
/// loop alternates between expiring timers and waiting for file-descriptor
/// readiness, resuming the suspended task behind each event. Exactly one
/// task executes at any moment; tasks yield only at the documented
/// suspension points (`sleep`, `wait`, reads and writes).
///
/// # Examples
///
/// ```no_run
/// use corio::Runtime;
///
/// let rt = Runtime::new().unwrap();
/// let handle = rt.handle().clone();
///
/// handle.clone().spawn(async move {
///     handle.sleep(1.0).await;
///     println!("tick");
///     handle.stop();
/// });
///
/// rt.run().unwrap();
/// ```
pub struct Runtime {
    inner: Rc<Inner>,
    handle: Handle,
}

/// A cheaply cloneable reference to a [`Runtime`].
///
/// All task and I/O operations go through a handle, which keeps the runtime
/// explicit in every API instead of relying on process-wide state. Handles
/// must stay on the runtime's thread.
#[derive(Clone)]
pub struct Handle {
    inner: Rc<Inner>,
}

pub(crate) struct Inner {
    selector: Selector,
    events: RefCell<Events>,
    tasks: RefCell<Registry>,
    timers: RefCell<TimerQueue>,
    waiters: RefCell<WaiterSlab>,
    /// The task currently being polled.
    current: Cell<Option<TaskId>>,
    quit: Cell<bool>,
    panic_hook: RefCell<Option<PanicHook>>,
}

impl Runtime {
    /// Creates a runtime with a fresh selector instance.
    pub fn new() -> io::Result<Runtime> {
        let inner = Rc::new(Inner {
            selector: Selector::new()?,
            events: RefCell::new(Events::with_capacity(MAX_EVENTS)),
            tasks: RefCell::new(Registry::new()),
            timers: RefCell::new(TimerQueue::new()),
            waiters: RefCell::new(WaiterSlab::new()),
            current: Cell::new(None),
            quit: Cell::new(false),
            panic_hook: RefCell::new(None),
        });
        Ok(Runtime {
            handle: Handle {
                inner: inner.clone(),
            },
            inner,
        })
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Runs the scheduler loop until [`stop`](Handle::stop) is called.
    ///
    /// Returns an error only when the selector itself fails; interrupted
    /// waits are retried. May not be called from inside a task.
    pub fn run(&self) -> io::Result<()> {
        trace!("scheduler loop starting");
        let inner = &self.inner;

        while !inner.quit.get() {
            let now = time::now_ms();
            inner.drain_expired(now);

            if inner.quit.get() {
                break;
            }

            let timeout = inner.timers.borrow().next_timeout_ms(now);

            let mut events = inner.events.borrow_mut();
            match inner.selector.select(&mut events, timeout) {
                Ok(()) => {}
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }

            for token in events.iter() {
                inner.resume_io(token);
            }
        }

        trace!("scheduler loop finished");
        Ok(())
    }

    /// Requests the scheduler loop to exit after the current iteration.
    pub fn stop(&self) {
        self.inner.quit.set(true);
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        // Unfinished tasks own Handle clones back into the runtime; dropping
        // them here breaks the reference cycle so the selector closes.
        self.inner.tasks.borrow_mut().clear();
    }
}

impl Handle {
    /// Spawns a task and resumes it immediately, so it runs until its first
    /// suspension point before `spawn` returns.
    pub fn spawn<F>(&self, future: F) -> TaskId
    where
        F: Future<Output = ()> + 'static,
    {
        let id = self.inner.tasks.borrow_mut().insert(Box::pin(future));
        trace!("spawning task {:?}", id);
        self.inner.resume(id);
        id
    }

    /// Resumes a suspended task. Dead task ids are ignored. Resuming a task
    /// that is suspended on a sleep ends the sleep early; resuming one that
    /// is suspended on I/O makes it retry the operation.
    pub fn resume(&self, task: TaskId) {
        self.inner.resume(task);
    }

    /// Number of live tasks.
    pub fn count(&self) -> usize {
        self.inner.tasks.borrow().len()
    }

    /// Ids of all live tasks.
    pub fn all(&self) -> Vec<TaskId> {
        self.inner.tasks.borrow().ids()
    }

    /// Requests the scheduler loop to exit after the current iteration.
    pub fn stop(&self) {
        self.inner.quit.set(true);
    }

    /// Installs a hook that is invoked with the task's panic message and a
    /// scheduler backtrace before the process terminates on an uncaught
    /// task panic. The hook annotates the failure; it cannot prevent
    /// termination.
    pub fn set_panic_hook<F>(&self, hook: F)
    where
        F: Fn(&str, &str) + 'static,
    {
        *self.inner.panic_hook.borrow_mut() = Some(Box::new(hook));
    }

    /// Suspends the current task for `seconds`. Non-positive delays resume
    /// the task on the next scheduler iteration.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a spawned task.
    pub async fn sleep(&self, seconds: f64) {
        Sleep {
            inner: self.inner.clone(),
            seconds,
            timer: None,
            started: false,
        }
        .await
    }

    /// Wraps a file descriptor for asynchronous readiness waits, switching
    /// it to non-blocking mode. Closing the descriptor remains the caller's
    /// responsibility.
    pub fn io(&self, fd: RawFd) -> io::Result<IoHandle> {
        IoHandle::new(self.inner.clone(), fd)
    }

    /// Creates a [`Reader`] over `fd`, switching it to non-blocking mode.
    pub fn reader(&self, fd: RawFd) -> io::Result<Reader> {
        Ok(Reader::new(IoHandle::new(self.inner.clone(), fd)?, None))
    }

    /// Creates a [`Reader`] whose reads go through `read_fn` instead of the
    /// kernel, for layered transports such as TLS.
    pub fn reader_with(&self, fd: RawFd, read_fn: Box<dyn ReadFn>) -> io::Result<Reader> {
        Ok(Reader::new(
            IoHandle::new(self.inner.clone(), fd)?,
            Some(read_fn),
        ))
    }

    /// Creates a [`Writer`] over `fd`, switching it to non-blocking mode.
    pub fn writer(&self, fd: RawFd) -> io::Result<Writer> {
        Ok(Writer::new(IoHandle::new(self.inner.clone(), fd)?, None))
    }

    /// Creates a [`Writer`] whose writes go through `write_fn` instead of
    /// the kernel, for layered transports such as TLS.
    pub fn writer_with(&self, fd: RawFd, write_fn: Box<dyn WriteFn>) -> io::Result<Writer> {
        Ok(Writer::new(
            IoHandle::new(self.inner.clone(), fd)?,
            Some(write_fn),
        ))
    }
}

impl Inner {
    /// Polls a task once. Completion clears its registry slot; an uncaught
    /// panic reports through the panic hook and terminates the process.
    pub(crate) fn resume(self: &Rc<Self>, id: TaskId) {
        let fut = self.tasks.borrow_mut().take(id);
        let Some(mut fut) = fut else { return };

        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        let prev = self.current.replace(Some(id));
        let result = panic::catch_unwind(AssertUnwindSafe(|| fut.as_mut().poll(&mut cx)));
        self.current.set(prev);

        match result {
            Ok(Poll::Ready(())) => {
                trace!("task {:?} finished", id);
                self.tasks.borrow_mut().remove(id);
            }
            Ok(Poll::Pending) => self.tasks.borrow_mut().restore(id, fut),
            Err(payload) => self.propagate_panic(payload),
        }
    }

    fn propagate_panic(&self, payload: Box<dyn Any + Send>) -> ! {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "task panicked".to_string()
        };
        let backtrace = Backtrace::force_capture().to_string();

        match &*self.panic_hook.borrow() {
            Some(hook) => hook(&message, &backtrace),
            None => {
                eprintln!("{message}");
                eprintln!("{backtrace}");
            }
        }

        process::exit(1);
    }

    /// Fires every timer due at `now`, in deadline order.
    fn drain_expired(self: &Rc<Self>, now: u64) {
        loop {
            let timer = self.timers.borrow_mut().pop_expired(now);
            let Some(timer) = timer else { break };

            match timer.holder {
                Holder::Task(id) => self.resume(id),
                Holder::Io(token) => {
                    let state = self.waiters.borrow().get(token);
                    if let Some(state) = state {
                        let task = {
                            let mut state = state.borrow_mut();
                            state.is_timeout = true;
                            state.timer = None;
                            self.unregister_fd(&mut state);
                            state.task.take()
                        };
                        if let Some(task) = task {
                            self.resume(task);
                        }
                    }
                }
            }

            self.timers.borrow_mut().release(timer);
        }
    }

    /// Resumes the task behind a readiness event. The registration may have
    /// disappeared while earlier events in the same batch ran; stale tokens
    /// are skipped.
    fn resume_io(self: &Rc<Self>, token: Token) {
        let state = self.waiters.borrow().get(token);
        let Some(state) = state else { return };

        let task = state.borrow_mut().task.take();
        if let Some(task) = task {
            self.resume(task);
        }
    }

    /// Registers the fd with the selector on behalf of the current task and
    /// arms the timeout timer if the state carries one.
    pub(crate) fn register_io(
        self: &Rc<Self>,
        state: &Rc<RefCell<IoState>>,
        interest: Interest,
    ) -> io::Result<()> {
        let task = self.current_task();
        let mut st = state.borrow_mut();

        let token = self.waiters.borrow_mut().insert(state.clone());
        if let Err(err) = self.selector.register(st.fd, token, interest) {
            self.waiters.borrow_mut().remove(token);
            return Err(err);
        }

        st.token = Some(token);
        st.task = Some(task);
        if st.timeout > 0.0 {
            let now = time::now_ms();
            st.timer = Some(
                self.timers
                    .borrow_mut()
                    .start(now, st.timeout, Holder::Io(token)),
            );
        }

        Ok(())
    }

    /// Re-parks the current task on a registration that is still live after
    /// a would-block retry.
    pub(crate) fn rearm_io(self: &Rc<Self>, state: &Rc<RefCell<IoState>>) {
        let task = self.current_task();
        state.borrow_mut().task = Some(task);
    }

    /// Stops the timeout timer and drops the selector registration.
    /// Idempotent; both halves may have been released already.
    pub(crate) fn deregister_io(&self, state: &Rc<RefCell<IoState>>) {
        let mut st = state.borrow_mut();
        if let Some(id) = st.timer.take() {
            self.timers.borrow_mut().stop(id);
        }
        self.unregister_fd(&mut st);
    }

    fn unregister_fd(&self, state: &mut IoState) {
        if let Some(token) = state.token.take() {
            self.waiters.borrow_mut().remove(token);
            if let Err(err) = self.selector.deregister(state.fd) {
                trace!("deregistering fd {} failed: {}", state.fd, err);
            }
        }
    }

    fn current_task(&self) -> TaskId {
        self.current
            .get()
            .expect("suspension point used outside of a running task")
    }
}

/// Suspends a task until its timer fires. A second poll (an early explicit
/// resume) disarms the timer and completes.
struct Sleep {
    inner: Rc<Inner>,
    seconds: f64,
    timer: Option<u64>,
    started: bool,
}

impl Future for Sleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if !self.started {
            self.started = true;
            let task = self.inner.current_task();
            let now = time::now_ms();
            let id = self
                .inner
                .timers
                .borrow_mut()
                .start(now, self.seconds, Holder::Task(task));
            self.timer = Some(id);
            Poll::Pending
        } else {
            if let Some(id) = self.timer.take() {
                self.inner.timers.borrow_mut().stop(id);
            }
            Poll::Ready(())
        }
    }
}

/// Live selector registrations, indexed by token.
struct WaiterSlab {
    slots: Vec<Option<Rc<RefCell<IoState>>>>,
    free: Vec<usize>,
}

impl WaiterSlab {
    fn new() -> WaiterSlab {
        WaiterSlab {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    fn insert(&mut self, state: Rc<RefCell<IoState>>) -> Token {
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(state);
                Token(index)
            }
            None => {
                self.slots.push(Some(state));
                Token(self.slots.len() - 1)
            }
        }
    }

    fn get(&self, token: Token) -> Option<Rc<RefCell<IoState>>> {
        self.slots.get(token.0).and_then(|slot| slot.clone())
    }

    fn remove(&mut self, token: Token) {
        if let Some(slot) = self.slots.get_mut(token.0) {
            if slot.take().is_some() {
                self.free.push(token.0);
            }
        }
    }
}

// Resumption is routed through the scheduler itself (timer expiry, fd
// readiness, cancel, explicit resume), never through wakers, so polls get a
// placeholder context that ignores wakes.
fn noop_waker() -> Waker {
    const VTABLE: RawWakerVTable = RawWakerVTable::new(
        |_| RawWaker::new(ptr::null(), &VTABLE),
        |_| {},
        |_| {},
        |_| {},
    );
    unsafe { Waker::from_raw(RawWaker::new(ptr::null(), &VTABLE)) }
}
