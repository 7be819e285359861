//! Reactive Runtime
//!
//! The runtime is the central state aggregate that connects proxies, refs,
//! effects, and the scheduler. There is one per thread, created empty on
//! first use and dropped at thread exit.
//!
//! # What It Holds
//!
//! - the tracking context (stack of running effects, pause state)
//! - the target registry (target → key → dependency set)
//! - the proxy cache (source → live proxy, per proxy kind)
//! - the microtask and job queues
//! - the tick clock used to stamp event listeners
//! - the error channel and the active configuration
//!
//! # Borrowing
//!
//! Each part guards its own state. Callers take a short borrow, copy out
//! what they need (a run list, the next task), release the borrow, and only
//! then call user code. This keeps effects, handlers, and tasks free to
//! re-enter the runtime.

use std::cell::Cell;

use tracing::debug;

use crate::config::RuntimeConfig;
use crate::error::ErrorChannel;
use crate::reactive::{ProxyCache, TargetId, TargetRegistry, TrackingContext};
use crate::scheduler::{JobQueue, MicrotaskQueue, TickClock};

thread_local! {
    static RUNTIME: Runtime = Runtime::new();
}

/// Per-thread reactive runtime state.
pub struct Runtime {
    pub(crate) context: TrackingContext,
    pub(crate) targets: TargetRegistry,
    pub(crate) proxies: ProxyCache,
    pub(crate) microtasks: MicrotaskQueue,
    pub(crate) jobs: JobQueue,
    pub(crate) tick: TickClock,
    pub(crate) errors: ErrorChannel,
    config: Cell<RuntimeConfig>,
}

impl Runtime {
    fn new() -> Self {
        Self {
            context: TrackingContext::new(),
            targets: TargetRegistry::default(),
            proxies: ProxyCache::default(),
            microtasks: MicrotaskQueue::default(),
            jobs: JobQueue::default(),
            tick: TickClock::default(),
            errors: ErrorChannel::default(),
            config: Cell::new(RuntimeConfig::default()),
        }
    }

    /// Access this thread's runtime.
    pub(crate) fn with<R>(f: impl FnOnce(&Runtime) -> R) -> R {
        RUNTIME.with(f)
    }

    /// Access this thread's runtime unless it is already being torn down.
    pub(crate) fn try_with<R>(f: impl FnOnce(&Runtime) -> R) -> Option<R> {
        RUNTIME.try_with(f).ok()
    }

    pub(crate) fn config(&self) -> RuntimeConfig {
        self.config.get()
    }

    /// Replace this thread's configuration.
    pub fn configure(config: RuntimeConfig) {
        debug!(?config, "runtime configured");
        Self::with(|rt| rt.config.set(config));
    }

    /// This thread's active configuration.
    pub fn current_config() -> RuntimeConfig {
        Self::with(|rt| rt.config())
    }

    /// Forget everything recorded about a target that was dropped.
    pub(crate) fn release_target(id: TargetId) {
        Self::try_with(|rt| {
            rt.targets.forget(id);
            rt.proxies.forget(id);
        });
    }

    /// Number of targets with at least one recorded dependency.
    pub fn tracked_target_count() -> usize {
        Self::with(|rt| rt.targets.len())
    }

    /// Number of live cached proxies.
    pub fn cached_proxy_count() -> usize {
        Self::with(|rt| rt.proxies.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{effect, reactive, EffectOptions, ObjectAccess, RawObject, Value};

    #[test]
    fn configuration_is_per_thread() {
        let config = RuntimeConfig {
            recursion_limit: 7,
            ..RuntimeConfig::default()
        };
        Runtime::configure(config);
        assert_eq!(Runtime::current_config().recursion_limit, 7);

        let other = std::thread::spawn(|| Runtime::current_config().recursion_limit)
            .join()
            .unwrap();
        assert_eq!(other, RuntimeConfig::default().recursion_limit);

        Runtime::configure(RuntimeConfig::default());
    }

    #[test]
    fn dropped_targets_leave_the_registry() {
        let before = Runtime::tracked_target_count();
        let raw = RawObject::from_entries([("n", 1)]);
        let state = reactive(raw.clone()).into_proxy().unwrap();

        let s = state.clone();
        let runner = effect(
            move || {
                s.get("n");
            },
            EffectOptions::default().lazy(),
        );
        runner.run();
        assert_eq!(Runtime::tracked_target_count(), before + 1);

        runner.stop();
        drop((runner, state));
        assert_eq!(raw.get("n"), Value::from(1));
        drop(raw);
        assert_eq!(Runtime::tracked_target_count(), before);
    }
}
