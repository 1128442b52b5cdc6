//! Single-threaded task queue with virtual time.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

type Task = Box<dyn FnOnce()>;

/// A cooperative scheduler driving deferred continuations.
///
/// Tasks are never run at registration; they wait for the next
/// [`run_until_idle`](Self::run_until_idle) or [`advance`](Self::advance).
/// Tasks due at the same instant run in registration order. Clones share one
/// queue, so transports and tests can hold their own handle.
#[derive(Clone, Default)]
pub struct Scheduler {
    inner: Rc<RefCell<SchedulerInner>>,
}

#[derive(Default)]
struct SchedulerInner {
    now: Duration,
    next_seq: u64,
    queue: BTreeMap<(Duration, u64), Task>,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    /// Returns the number of tasks waiting to run.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    /// Runs `task` on the next turn.
    pub fn defer(&self, task: impl FnOnce() + 'static) {
        self.defer_after(Duration::ZERO, task);
    }

    /// Runs `task` once virtual time has moved `delay` past now.
    pub fn defer_after(&self, delay: Duration, task: impl FnOnce() + 'static) {
        let mut inner = self.inner.borrow_mut();
        let due = inner.now.saturating_add(delay);
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.queue.insert((due, seq), Box::new(task));
    }

    /// Runs every task that is due, including tasks they schedule for now.
    ///
    /// Returns the number of tasks run.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while let Some(task) = self.pop_due(self.now()) {
            task();
            ran += 1;
        }
        ran
    }

    /// Moves virtual time forward by `delay`, running tasks as they fall due.
    ///
    /// Returns the number of tasks run.
    pub fn advance(&self, delay: Duration) -> usize {
        let target = self.now().saturating_add(delay);
        let mut ran = self.run_until_idle();
        while let Some(task) = self.pop_due(target) {
            task();
            ran += 1;
            ran += self.run_until_idle();
        }
        self.inner.borrow_mut().now = target;
        ran + self.run_until_idle()
    }

    /// Removes the earliest task due at or before `limit`, moving the clock
    /// up to its due time. The borrow is released before the task runs.
    fn pop_due(&self, limit: Duration) -> Option<Task> {
        let mut inner = self.inner.borrow_mut();
        let (&(due, seq), _) = inner.queue.first_key_value()?;
        if due > limit {
            return None;
        }
        let task = inner.queue.remove(&(due, seq))?;
        if due > inner.now {
            inner.now = due;
        }
        Some(task)
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Scheduler")
            .field("now", &inner.now)
            .field("pending", &inner.queue.len())
            .finish()
    }
}
