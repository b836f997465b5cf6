//! Cooperative single-threaded timer queue.
//!
//! Tasks are plain values owned by the queue until they come due; the owner
//! pulls them with [`Scheduler::pop_due`] and dispatches them itself. Nothing
//! runs behind the owner's back, so a cancelled handle can never fire.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// A task whose deadline has passed.
#[derive(Debug, Clone, PartialEq)]
pub struct Due<T> {
    pub handle: TimerHandle,
    pub task: T,
    /// When the task was meant to run.
    pub deadline_ns: u64,
    /// How far past the deadline it was popped.
    pub late_ns: u64,
}

#[derive(Debug, Clone)]
struct Entry<T> {
    handle: TimerHandle,
    task: T,
    period_ns: Option<u64>,
}

/// Ordered by (deadline, insertion sequence) so equal deadlines fire FIFO.
type Key = (u64, u64);

#[derive(Debug, Clone)]
pub struct Scheduler<T> {
    queue: BTreeMap<Key, Entry<T>>,
    index: HashMap<TimerHandle, Key>,
    next_handle: u64,
    next_seq: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            queue: BTreeMap::new(),
            index: HashMap::new(),
            next_handle: 1,
            next_seq: 0,
        }
    }
}

impl<T: Clone> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `task` to run once, `delay_ns` after `now_ns`.
    pub fn after(&mut self, now_ns: u64, delay_ns: u64, task: T) -> TimerHandle {
        let handle = self.allocate_handle();
        self.insert(now_ns.saturating_add(delay_ns), handle, task, None);
        handle
    }

    /// Schedules `task` to run every `interval_ns`, first at `now + interval`.
    /// The same handle stays valid for every repetition until cancelled.
    pub fn every(&mut self, now_ns: u64, interval_ns: u64, task: T) -> TimerHandle {
        let period = interval_ns.max(1);
        let handle = self.allocate_handle();
        self.insert(now_ns.saturating_add(period), handle, task, Some(period));
        handle
    }

    /// Reschedules a chained one-shot relative to the deadline it was meant to
    /// run at rather than the moment it actually ran. Overrun shortens the next
    /// delay; it never pushes the deadline into the past.
    pub fn after_from(&mut self, deadline_ns: u64, now_ns: u64, period_ns: u64, task: T) -> TimerHandle {
        let target = deadline_ns.saturating_add(period_ns);
        if target < now_ns {
            debug!(
                overrun_ns = now_ns - target,
                period_ns, "timer chain fell behind, firing immediately"
            );
        }
        let handle = self.allocate_handle();
        self.insert(target.max(now_ns), handle, task, None);
        handle
    }

    /// Removes a pending task. Returns false when the handle already fired
    /// (one-shot) or was cancelled before.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.index.remove(&handle) {
            Some(key) => self.queue.remove(&key).is_some(),
            None => false,
        }
    }

    pub fn cancel_all(&mut self) -> usize {
        let n = self.queue.len();
        self.queue.clear();
        self.index.clear();
        n
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.index.contains_key(&handle)
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.queue.keys().next().map(|(deadline, _)| *deadline)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Pops the earliest task whose deadline is at or before `now_ns`.
    /// Repeating tasks are re-armed on the next slot after `now_ns`.
    pub fn pop_due(&mut self, now_ns: u64) -> Option<Due<T>> {
        let (&key, _) = self.queue.iter().next()?;
        let (deadline, _) = key;
        if deadline > now_ns {
            return None;
        }
        let entry = self.queue.remove(&key)?;
        self.index.remove(&entry.handle);

        let due = Due {
            handle: entry.handle,
            task: entry.task.clone(),
            deadline_ns: deadline,
            late_ns: now_ns - deadline,
        };

        if let Some(period) = entry.period_ns {
            let missed = (now_ns - deadline) / period;
            if missed > 0 {
                debug!(missed, period_ns = period, "repeating timer skipped slots");
            }
            let next = deadline + period * (missed + 1);
            self.insert(next, entry.handle, entry.task, Some(period));
        }

        Some(due)
    }

    fn allocate_handle(&mut self) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    fn insert(&mut self, deadline: u64, handle: TimerHandle, task: T, period_ns: Option<u64>) {
        let key = (deadline, self.next_seq);
        self.next_seq += 1;
        self.index.insert(handle, key);
        self.queue.insert(
            key,
            Entry {
                handle,
                task,
                period_ns,
            },
        );
    }
}
