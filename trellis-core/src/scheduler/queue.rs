//! Job Queue
//!
//! A batching scheduler for effects. Pass [`queue_job`] as an effect's
//! scheduler and every trigger within one tick collapses into a single
//! re-run, performed when the microtask queue drains.
//!
//! ```rust,ignore
//! let runner = effect(render, EffectOptions::default().scheduler(queue_job));
//! state.set("a", 1);
//! state.set("b", 2);
//! run_microtasks(); // render runs once
//! ```
//!
//! A job that panics is reported through the error channel and the flush
//! moves on to the next job.
//!
//! A job that keeps re-queueing itself within one flush (an effect with
//! `allow_recurse` writing to its own dependencies) is dropped after
//! `recursion_limit` runs and reported through the error channel.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, trace};

use super::microtask::queue_microtask;
use crate::error::{panic_message, report_error, ErrorCode, RuntimeError};
use crate::reactive::{EffectHandle, EffectId};
use crate::runtime::Runtime;

#[derive(Default)]
pub(crate) struct JobQueue {
    queue: RefCell<VecDeque<EffectHandle>>,
    flush_pending: Cell<bool>,
    flushing: Cell<bool>,
}

impl JobQueue {
    /// Enqueue unless already waiting. Returns whether a flush must be
    /// scheduled.
    fn push(&self, job: EffectHandle) -> bool {
        let mut queue = self.queue.borrow_mut();
        if queue.iter().any(|queued| queued.id() == job.id()) {
            return false;
        }
        queue.push_back(job);
        drop(queue);

        if self.flush_pending.get() || self.flushing.get() {
            return false;
        }
        self.flush_pending.set(true);
        true
    }

    fn pop(&self) -> Option<EffectHandle> {
        self.queue.borrow_mut().pop_front()
    }

    fn len(&self) -> usize {
        self.queue.borrow().len()
    }
}

struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        Runtime::try_with(|rt| rt.jobs.flushing.set(false));
    }
}

/// Schedule `job` to run once when the current tick's microtasks drain.
pub fn queue_job(job: EffectHandle) {
    trace!(job = job.id().raw(), "queue job");
    if Runtime::with(|rt| rt.jobs.push(job)) {
        queue_microtask(flush_jobs);
    }
}

/// Run every queued job now, including jobs queued while flushing.
pub fn flush_jobs() {
    let limit = Runtime::with(|rt| {
        rt.jobs.flush_pending.set(false);
        rt.jobs.flushing.set(true);
        rt.config().recursion_limit
    });
    let _guard = FlushGuard;

    let mut runs: HashMap<EffectId, usize> = HashMap::new();
    while let Some(job) = Runtime::with(|rt| rt.jobs.pop()) {
        let count = runs.entry(job.id()).or_default();
        *count += 1;
        if *count > limit {
            report_error(RuntimeError::RecursionLimit {
                code: ErrorCode::Scheduler,
                limit,
            });
            continue;
        }
        if !job.is_active() {
            continue;
        }
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| job.run())) {
            report_error(RuntimeError::Panicked {
                code: ErrorCode::Scheduler,
                message: panic_message(payload.as_ref()),
            });
        }
    }
    debug!(jobs = runs.len(), "flushed job queue");
}

/// Run `f` after the pending job flush.
pub fn next_tick(f: impl FnOnce() + 'static) {
    queue_microtask(f);
}

/// Number of jobs waiting for the next flush.
pub fn pending_jobs() -> usize {
    Runtime::with(|rt| rt.jobs.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{clear_error_handler, set_error_handler};
    use crate::reactive::{effect, reactive, EffectOptions, Value};
    use crate::scheduler::run_microtasks;
    use serde_json::json;
    use std::rc::Rc;

    #[test]
    fn triggers_in_one_tick_run_once() {
        let state = reactive(json!({"a": 0, "b": 0})).into_proxy().unwrap();
        let runs = Rc::new(Cell::new(0));

        let (s, r) = (state.clone(), runs.clone());
        let _runner = effect(
            move || {
                r.set(r.get() + 1);
                s.get("a");
                s.get("b");
            },
            EffectOptions::default().scheduler(queue_job),
        );

        state.set("a", 1);
        state.set("b", 1);
        assert_eq!(runs.get(), 1);
        assert_eq!(pending_jobs(), 1);

        run_microtasks();
        assert_eq!(runs.get(), 2);
        assert_eq!(pending_jobs(), 0);
    }

    #[test]
    fn next_tick_runs_after_the_flush() {
        let state = reactive(json!({"n": 0})).into_proxy().unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let (s, log) = (state.clone(), seen.clone());
        let _runner = effect(
            move || log.borrow_mut().push(s.get("n")),
            EffectOptions::default().scheduler(queue_job),
        );

        state.set("n", 1);
        let log = seen.clone();
        next_tick(move || log.borrow_mut().push(Value::from("tick")));
        run_microtasks();

        assert_eq!(*seen.borrow(), vec![Value::from(0), Value::from(1), Value::from("tick")]);
    }

    #[test]
    fn runaway_jobs_hit_the_recursion_limit() {
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = errors.clone();
        set_error_handler(move |err| sink.borrow_mut().push(err.to_string()));

        let state = reactive(json!({"n": 0})).into_proxy().unwrap();
        let s = state.clone();
        let runner = effect(
            move || {
                let n = s.get("n").as_f64().unwrap_or(0.0);
                s.set("n", n + 1.0);
            },
            EffectOptions::default().allow_recurse().scheduler(queue_job),
        );

        run_microtasks();
        let limit = Runtime::current_config().recursion_limit;
        assert_eq!(errors.borrow().len(), 1);
        assert_eq!(runner.run_count(), limit + 1);
        assert_eq!(pending_jobs(), 0);

        runner.stop();
        clear_error_handler();
    }

    #[test]
    fn panicking_jobs_are_reported_and_the_flush_continues() {
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = errors.clone();
        set_error_handler(move |err| sink.borrow_mut().push(err.to_string()));

        let state = reactive(json!({"n": 0})).into_proxy().unwrap();
        let runs = Rc::new(Cell::new(0));

        let s = state.clone();
        let _bad = effect(
            move || {
                if s.get("n").as_f64() == Some(1.0) {
                    panic!("render failed");
                }
            },
            EffectOptions::default().scheduler(queue_job),
        );
        let (s, r) = (state.clone(), runs.clone());
        let _good = effect(
            move || {
                s.get("n");
                r.set(r.get() + 1);
            },
            EffectOptions::default().scheduler(queue_job),
        );

        state.set("n", 1);
        run_microtasks();

        assert_eq!(runs.get(), 2);
        assert_eq!(
            *errors.borrow(),
            vec!["panic during execution of scheduler flush: render failed".to_owned()]
        );
        clear_error_handler();
    }
}
