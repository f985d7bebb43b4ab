//! Scheduling capability and a deterministic clock for tests and rehearsal.
//!
//! All interleaving in the story comes from callbacks handed to a
//! [`Scheduler`]. Nothing blocks. Callbacks run to completion even if the
//! entity they target was torn down in the meantime, so every callback
//! re-checks its target before touching it. Only [`Scheduler::cancel`] can
//! stop a callback from running, and the story uses it for a single timer.

use crate::constants::FRAME_INTERVAL_MS;
use fnv::FnvHashMap;
use std::cell::{Cell, RefCell};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Deferred unit of work.
pub type Task = Box<dyn FnOnce()>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        TimerId(raw)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// One-shot delayed and paint-aligned callbacks.
pub trait Scheduler {
    /// Milliseconds since an arbitrary fixed origin.
    fn now_ms(&self) -> u64;

    /// Run `task` once, `delay_ms` from now. Tasks with equal due times run
    /// in the order they were scheduled.
    fn after(&self, delay_ms: u32, task: Task) -> TimerId;

    /// Run `task` before the next paint.
    fn next_frame(&self, task: Task);

    /// Drop a pending task. Unknown or already-fired ids are ignored.
    fn cancel(&self, id: TimerId);
}

/// Scheduler whose time only moves when told to.
///
/// Frames are modelled as timers [`FRAME_INTERVAL_MS`] in the future.
#[derive(Default)]
pub struct ManualClock {
    now: Cell<u64>,
    next_seq: Cell<u64>,
    queue: RefCell<BinaryHeap<Reverse<(u64, u64)>>>,
    tasks: RefCell<FnvHashMap<u64, Task>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks still waiting to run.
    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Due time of the earliest live task.
    pub fn next_due(&self) -> Option<u64> {
        let mut queue = self.queue.borrow_mut();
        let tasks = self.tasks.borrow();
        while let Some(Reverse((due, seq))) = queue.peek().copied() {
            if tasks.contains_key(&seq) {
                return Some(due);
            }
            // cancelled
            queue.pop();
        }
        None
    }

    pub fn advance(&self, delta_ms: u64) {
        self.advance_to(self.now.get() + delta_ms);
    }

    /// Run every task due at or before `target_ms`, in due order, moving the
    /// clock to each task's due time before running it. Tasks scheduled by
    /// running tasks are picked up if they fall inside the window.
    pub fn advance_to(&self, target_ms: u64) {
        loop {
            let next = {
                let mut queue = self.queue.borrow_mut();
                let ready = matches!(queue.peek(), Some(Reverse((due, _))) if *due <= target_ms);
                if ready {
                    queue.pop()
                } else {
                    None
                }
            };
            let Some(Reverse((due, seq))) = next else {
                break;
            };
            let task = self.tasks.borrow_mut().remove(&seq);
            if let Some(task) = task {
                if due > self.now.get() {
                    self.now.set(due);
                }
                task();
            }
        }
        if target_ms > self.now.get() {
            self.now.set(target_ms);
        }
    }

    /// Keep advancing until nothing is pending. Returns the final time.
    pub fn run_until_idle(&self) -> u64 {
        while let Some(due) = self.next_due() {
            self.advance_to(due);
        }
        self.now.get()
    }

    fn push(&self, due: u64, task: Task) -> TimerId {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        self.tasks.borrow_mut().insert(seq, task);
        self.queue.borrow_mut().push(Reverse((due, seq)));
        TimerId(seq)
    }
}

impl Scheduler for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }

    fn after(&self, delay_ms: u32, task: Task) -> TimerId {
        self.push(self.now.get() + delay_ms as u64, task)
    }

    fn next_frame(&self, task: Task) {
        self.push(self.now.get() + FRAME_INTERVAL_MS as u64, task);
    }

    fn cancel(&self, id: TimerId) {
        self.tasks.borrow_mut().remove(&id.0);
    }
}
