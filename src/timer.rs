use std::collections::VecDeque;

use crate::task::TaskId;
use crate::token::Token;

/// Recycled timer boxes kept around between arms.
const MAX_TIMER_CACHE: usize = 32;

/// Who gets notified when a timer fires.
#[derive(Copy, Clone, Debug)]
pub(crate) enum Holder {
    /// Resume this task directly (a plain sleep).
    Task(TaskId),
    /// Flag a timeout on the I/O waiter registered under this token.
    Io(Token),
}

#[derive(Debug)]
pub(crate) struct Timer {
    pub id: u64,
    /// Absolute deadline in monotonic milliseconds.
    pub deadline: u64,
    pub holder: Holder,
}

/// Pending timers ordered by deadline.
///
/// Insertion keeps the list sorted; timers with equal deadlines fire in
/// arming order. Expired and stopped timers have their allocations recycled
/// through a small cache.
#[derive(Debug)]
pub(crate) struct TimerQueue {
    active: VecDeque<Box<Timer>>,
    cache: Vec<Box<Timer>>,
    next_id: u64,
}

impl TimerQueue {
    pub fn new() -> TimerQueue {
        TimerQueue {
            active: VecDeque::new(),
            cache: Vec::new(),
            next_id: 0,
        }
    }

    /// Arms a timer `delay_secs` from `now` and returns its id. Non-positive
    /// delays arm for `now`, which fires on the next expiry drain.
    pub fn start(&mut self, now: u64, delay_secs: f64, holder: Holder) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        let deadline = now + (delay_secs * 1000.0) as u64;

        let timer = self.alloc(id, deadline, holder);
        let at = self.active.partition_point(|t| t.deadline <= deadline);
        self.active.insert(at, timer);

        id
    }

    /// Disarms the timer if it is still pending.
    pub fn stop(&mut self, id: u64) {
        if let Some(pos) = self.active.iter().position(|t| t.id == id) {
            if let Some(timer) = self.active.remove(pos) {
                self.release(timer);
            }
        }
    }

    /// Milliseconds until the earliest deadline: -1 with no timers pending,
    /// 0 when the head is already due.
    pub fn next_timeout_ms(&self, now: u64) -> i32 {
        match self.active.front() {
            None => -1,
            Some(timer) => timer.deadline.saturating_sub(now).min(i32::MAX as u64) as i32,
        }
    }

    /// Unlinks and returns the earliest timer if it is due at `now`.
    pub fn pop_expired(&mut self, now: u64) -> Option<Box<Timer>> {
        if self.active.front().map_or(false, |t| t.deadline <= now) {
            self.active.pop_front()
        } else {
            None
        }
    }

    /// Returns a fired or stopped timer's allocation to the cache.
    pub fn release(&mut self, mut timer: Box<Timer>) {
        if self.cache.len() < MAX_TIMER_CACHE {
            timer.deadline = 0;
            self.cache.push(timer);
        }
    }

    fn alloc(&mut self, id: u64, deadline: u64, holder: Holder) -> Box<Timer> {
        match self.cache.pop() {
            Some(mut timer) => {
                *timer = Timer {
                    id,
                    deadline,
                    holder,
                };
                timer
            }
            None => Box::new(Timer {
                id,
                deadline,
                holder,
            }),
        }
    }
}
