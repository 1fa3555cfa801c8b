use std::future::Future;
use std::pin::Pin;

pub(crate) type TaskFuture = Pin<Box<dyn Future<Output = ()>>>;

/// Identifies a task spawned on a [`Runtime`](crate::Runtime).
///
/// Ids are stable for the lifetime of the task: once the task completes,
/// its id goes stale and operations on it become no-ops, even if the
/// registry slot is later reused.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TaskId {
    index: usize,
    seq: u64,
}

impl TaskId {
    #[cfg(test)]
    pub(crate) fn for_test(index: usize) -> TaskId {
        TaskId { index, seq: 0 }
    }
}

enum Slot {
    Vacant,
    Occupied {
        seq: u64,
        /// `None` while the task is being polled; the future is moved out
        /// of the registry for the duration of the poll so resuming can
        /// nest.
        future: Option<TaskFuture>,
    },
}

/// Registry of live tasks.
///
/// Slots are reused, with a per-task sequence number guarding against stale
/// ids. The registry only tracks liveness; it imposes no ordering.
pub(crate) struct Registry {
    slots: Vec<Slot>,
    free: Vec<usize>,
    next_seq: u64,
    len: usize,
}

impl Registry {
    pub fn new() -> Registry {
        Registry {
            slots: Vec::new(),
            free: Vec::new(),
            next_seq: 0,
            len: 0,
        }
    }

    pub fn insert(&mut self, future: TaskFuture) -> TaskId {
        self.next_seq += 1;
        let seq = self.next_seq;
        let slot = Slot::Occupied {
            seq,
            future: Some(future),
        };

        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = slot;
                index
            }
            None => {
                self.slots.push(slot);
                self.slots.len() - 1
            }
        };

        self.len += 1;
        TaskId { index, seq }
    }

    /// Takes the task's future out for polling. Returns `None` if the task
    /// is dead or already being polled.
    pub fn take(&mut self, id: TaskId) -> Option<TaskFuture> {
        match self.slots.get_mut(id.index) {
            Some(Slot::Occupied { seq, future }) if *seq == id.seq => future.take(),
            _ => None,
        }
    }

    /// Puts a still-pending future back after a poll.
    pub fn restore(&mut self, id: TaskId, fut: TaskFuture) {
        if let Some(Slot::Occupied { seq, future }) = self.slots.get_mut(id.index) {
            if *seq == id.seq {
                *future = Some(fut);
            }
        }
    }

    /// Clears a completed task's slot.
    pub fn remove(&mut self, id: TaskId) {
        if let Some(slot) = self.slots.get_mut(id.index) {
            if matches!(slot, Slot::Occupied { seq, .. } if *seq == id.seq) {
                *slot = Slot::Vacant;
                self.free.push(id.index);
                self.len -= 1;
            }
        }
    }

    /// Drops every task, dead or alive.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn ids(&self) -> Vec<TaskId> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied { seq, .. } => Some(TaskId { index, seq: *seq }),
                Slot::Vacant => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> TaskFuture {
        Box::pin(async {})
    }

    #[test]
    fn insert_take_restore_remove() {
        let mut registry = Registry::new();
        let id = registry.insert(noop());
        assert_eq!(registry.len(), 1);

        let fut = registry.take(id).unwrap();
        // Taken out: a nested take sees the task as busy.
        assert!(registry.take(id).is_none());
        registry.restore(id, fut);
        assert!(registry.take(id).is_some());

        registry.remove(id);
        assert_eq!(registry.len(), 0);
        assert!(registry.take(id).is_none());
    }

    #[test]
    fn stale_ids_miss_reused_slots() {
        let mut registry = Registry::new();
        let first = registry.insert(noop());
        registry.remove(first);

        let second = registry.insert(noop());
        assert!(registry.take(first).is_none());
        assert!(registry.take(second).is_some());
        assert_eq!(registry.ids(), vec![second]);
    }
}
