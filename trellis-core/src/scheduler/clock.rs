//! Tick Clock
//!
//! [`get_now`] returns one timestamp per tick: the first call captures the
//! clock and caches it, and a microtask queued at that moment clears the
//! cache once the tick's synchronous work and earlier microtasks are done.
//! Every listener attached within a tick therefore carries the exact same
//! `attached` time.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::trace;

use super::microtask::queue_microtask;
use crate::runtime::Runtime;

/// A source of wall-clock time in milliseconds.
///
/// Events are compared against the same clock, so the host must stamp
/// native events with it too.
pub trait Clock {
    fn now(&self) -> f64;
}

/// Milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs_f64() * 1000.0)
            .unwrap_or_default()
    }
}

pub(crate) struct TickClock {
    clock: RefCell<Rc<dyn Clock>>,
    cached: Cell<Option<f64>>,
}

impl Default for TickClock {
    fn default() -> Self {
        Self {
            clock: RefCell::new(Rc::new(SystemClock)),
            cached: Cell::new(None),
        }
    }
}

impl TickClock {
    fn clock(&self) -> Rc<dyn Clock> {
        Rc::clone(&self.clock.borrow())
    }
}

/// Replace this thread's clock. Clears any cached tick timestamp.
pub fn set_clock(clock: impl Clock + 'static) {
    let previous = Runtime::with(|rt| {
        rt.tick.cached.set(None);
        rt.tick.clock.replace(Rc::new(clock))
    });
    drop(previous);
}

/// Current time from the clock, uncached.
pub fn wall_clock_now() -> f64 {
    let clock = Runtime::with(|rt| rt.tick.clock());
    clock.now()
}

/// The timestamp of the current tick.
pub fn get_now() -> f64 {
    if let Some(cached) = Runtime::with(|rt| rt.tick.cached.get()) {
        return cached;
    }

    let now = wall_clock_now();
    Runtime::with(|rt| rt.tick.cached.set(Some(now)));
    queue_microtask(|| {
        Runtime::with(|rt| rt.tick.cached.set(None));
    });
    trace!(now, "tick timestamp captured");
    now
}
