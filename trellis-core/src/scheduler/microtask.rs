//! Microtask Queue
//!
//! The host drives the queue: after each synchronous segment of work (an
//! event dispatch, a timer callback) it calls [`run_microtasks`], which runs
//! queued tasks in FIFO order until the queue is empty. Tasks queued by a
//! running task join the same drain.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use tracing::trace;

use crate::runtime::Runtime;

pub type Microtask = Box<dyn FnOnce()>;

#[derive(Default)]
pub(crate) struct MicrotaskQueue {
    tasks: RefCell<VecDeque<Microtask>>,
    draining: Cell<bool>,
}

impl MicrotaskQueue {
    fn push(&self, task: Microtask) {
        self.tasks.borrow_mut().push_back(task);
    }

    fn pop(&self) -> Option<Microtask> {
        self.tasks.borrow_mut().pop_front()
    }

    fn len(&self) -> usize {
        self.tasks.borrow().len()
    }
}

/// Clears the draining flag even if a task panics.
struct DrainGuard;

impl Drop for DrainGuard {
    fn drop(&mut self) {
        Runtime::try_with(|rt| rt.microtasks.draining.set(false));
    }
}

/// Queue `task` to run at the end of the current tick.
pub fn queue_microtask(task: impl FnOnce() + 'static) {
    Runtime::with(|rt| rt.microtasks.push(Box::new(task)));
}

/// Run queued microtasks until none remain. Returns how many ran.
///
/// A call from inside a running microtask returns 0 immediately; the outer
/// drain picks up anything queued meanwhile.
pub fn run_microtasks() -> usize {
    if Runtime::with(|rt| rt.microtasks.draining.replace(true)) {
        return 0;
    }
    let _guard = DrainGuard;

    let mut ran = 0;
    while let Some(task) = Runtime::with(|rt| rt.microtasks.pop()) {
        task();
        ran += 1;
    }
    trace!(ran, "microtasks drained");
    ran
}

/// Number of microtasks waiting to run.
pub fn pending_microtasks() -> usize {
    Runtime::with(|rt| rt.microtasks.len())
}
