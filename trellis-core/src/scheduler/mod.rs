//! Scheduling
//!
//! The runtime has no event loop of its own. The host calls
//! [`run_microtasks`] at the end of every synchronous segment; everything
//! deferred (tick clock resets, batched effect re-runs, `next_tick`
//! callbacks) rides on that queue.

mod clock;
mod microtask;
mod queue;

pub(crate) use clock::TickClock;
pub(crate) use microtask::MicrotaskQueue;
pub(crate) use queue::JobQueue;

pub use clock::{get_now, set_clock, wall_clock_now, Clock, SystemClock};
pub use microtask::{pending_microtasks, queue_microtask, run_microtasks, Microtask};
pub use queue::{flush_jobs, next_tick, pending_jobs, queue_job};
