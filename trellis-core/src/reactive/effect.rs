//! Effect Implementation
//!
//! An Effect is a re-runnable computation that re-executes whenever the
//! reactive data it read last time changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies (unless it is lazy).
//!
//! 2. When any dependency changes, the effect is handed to its scheduler, or
//!    re-run synchronously if it has none.
//!
//! 3. Before re-running, the effect leaves every dependency set it belongs
//!    to and collects fresh ones during execution. Branches that did not run
//!    this time no longer re-trigger it.
//!
//! # Recursion
//!
//! An effect is never re-entered while it is on the run stack. Writes it
//! performs to its own dependencies (`count += 1` inside the effect) do not
//! trigger it again unless it opted into [`EffectOptions::allow_recurse`],
//! and even then a synchronous re-run of a running effect is skipped.
//!
//! # Stopping
//!
//! [`stop`] removes the effect from all dependency sets and marks it
//! inactive for good. Running a stopped effect calls its function directly
//! with no dependency collection.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use super::context::ReactiveContext;
use super::dep::WeakDep;
use super::subscriber::{EffectId, Subscriber};
use crate::runtime::Runtime;

/// Decides when a triggered effect re-runs.
pub type Scheduler = Rc<dyn Fn(EffectHandle)>;

/// Options accepted by [`effect`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    lazy: bool,
    scheduler: Option<Scheduler>,
    allow_recurse: bool,
    on_stop: Option<Rc<dyn Fn()>>,
}

impl EffectOptions {
    /// Do not run on creation.
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    /// Hand triggered re-runs to `scheduler` instead of running immediately.
    pub fn scheduler(mut self, scheduler: impl Fn(EffectHandle) + 'static) -> Self {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    /// Let the effect be triggered by its own writes.
    pub fn allow_recurse(mut self) -> Self {
        self.allow_recurse = true;
        self
    }

    /// Called once when the effect is stopped.
    pub fn on_stop(mut self, on_stop: impl Fn() + 'static) -> Self {
        self.on_stop = Some(Rc::new(on_stop));
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler.is_some())
            .field("allow_recurse", &self.allow_recurse)
            .field("on_stop", &self.on_stop.is_some())
            .finish()
    }
}

struct EffectCore<T> {
    id: EffectId,
    func: RefCell<Box<dyn FnMut() -> T>>,
    active: Cell<bool>,
    deps: RefCell<Vec<WeakDep>>,
    run_count: Cell<usize>,
    options: EffectOptions,
}

impl<T: 'static> EffectCore<T> {
    fn run(this: &Rc<Self>) -> Option<T> {
        if !this.active.get() {
            let mut func = this.func.try_borrow_mut().ok()?;
            return Some(func());
        }

        if Runtime::with(|rt| rt.context.is_running(this.id)) {
            trace!(effect = this.id.raw(), "skipping re-entrant run");
            return None;
        }

        this.cleanup();
        let subscriber: Rc<dyn Subscriber> = this.clone();
        let _ctx = ReactiveContext::enter(subscriber);
        let mut func = this.func.try_borrow_mut().ok()?;

        trace!(effect = this.id.raw(), "run effect");
        this.run_count.set(this.run_count.get() + 1);
        Some(func())
    }

    /// Leave every dependency set this effect belongs to.
    fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.deps.borrow_mut());
        for dep in deps {
            if let Some(dep) = dep.upgrade() {
                dep.remove(self.id);
            }
        }
    }

    fn dependency_count(&self) -> usize {
        self.deps
            .borrow()
            .iter()
            .filter(|dep| dep.upgrade().is_some())
            .count()
    }
}

impl<T: 'static> Subscriber for EffectCore<T> {
    fn id(&self) -> EffectId {
        self.id
    }

    fn is_active(&self) -> bool {
        self.active.get()
    }

    fn allow_recurse(&self) -> bool {
        self.options.allow_recurse
    }

    fn record_dependency(&self, dep: WeakDep) {
        self.deps.borrow_mut().push(dep);
    }

    fn notify(self: Rc<Self>) {
        match self.options.scheduler.clone() {
            Some(scheduler) => scheduler(EffectHandle(self)),
            None => {
                EffectCore::run(&self);
            }
        }
    }

    fn rerun(self: Rc<Self>) {
        EffectCore::run(&self);
    }

    fn stop(&self) {
        if !self.active.replace(false) {
            return;
        }
        self.cleanup();
        trace!(effect = self.id.raw(), "stop effect");
        if let Some(on_stop) = &self.options.on_stop {
            on_stop();
        }
    }
}

/// A running reactive computation and the runner that re-executes it.
///
/// Clones share the same effect.
pub struct ReactiveEffect<T: 'static> {
    core: Rc<EffectCore<T>>,
}

impl<T: 'static> ReactiveEffect<T> {
    /// Create an effect. Runs `func` immediately unless the options are lazy.
    pub fn new<F>(func: F, options: EffectOptions) -> Self
    where
        F: FnMut() -> T + 'static,
    {
        let lazy = options.lazy;
        let effect = Self {
            core: Rc::new(EffectCore {
                id: EffectId::new(),
                func: RefCell::new(Box::new(func)),
                active: Cell::new(true),
                deps: RefCell::new(Vec::new()),
                run_count: Cell::new(0),
                options,
            }),
        };

        if !lazy {
            effect.run();
        }

        effect
    }

    /// Run the effect now, re-collecting its dependencies.
    ///
    /// Returns `None` when the effect is already running further up the
    /// stack.
    pub fn run(&self) -> Option<T> {
        EffectCore::run(&self.core)
    }

    /// Stop the effect. Idempotent.
    pub fn stop(&self) {
        self.core.stop();
    }

    pub fn is_active(&self) -> bool {
        self.core.active.get()
    }

    pub fn id(&self) -> EffectId {
        self.core.id
    }

    /// Number of tracked runs so far.
    pub fn run_count(&self) -> usize {
        self.core.run_count.get()
    }

    /// Number of dependency sets the effect currently belongs to.
    pub fn dependency_count(&self) -> usize {
        self.core.dependency_count()
    }

    /// A type-erased handle to this effect.
    pub fn handle(&self) -> EffectHandle {
        EffectHandle(self.core.clone())
    }
}

impl<T: 'static> Clone for ReactiveEffect<T> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

impl<T: 'static> fmt::Debug for ReactiveEffect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveEffect")
            .field("id", &self.core.id)
            .field("active", &self.is_active())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

/// A type-erased effect, as passed to schedulers.
#[derive(Clone)]
pub struct EffectHandle(Rc<dyn Subscriber>);

impl EffectHandle {
    pub fn id(&self) -> EffectId {
        self.0.id()
    }

    /// Run the effect now, bypassing its scheduler.
    pub fn run(&self) {
        Rc::clone(&self.0).rerun();
    }

    pub fn stop(&self) {
        self.0.stop();
    }

    pub fn is_active(&self) -> bool {
        self.0.is_active()
    }
}

impl fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectHandle")
            .field("id", &self.id())
            .field("active", &self.is_active())
            .finish()
    }
}

/// Create an effect running `func`.
pub fn effect<T, F>(func: F, options: EffectOptions) -> ReactiveEffect<T>
where
    T: 'static,
    F: FnMut() -> T + 'static,
{
    ReactiveEffect::new(func, options)
}

/// Stop `effect`: it leaves all dependency sets and never re-runs on trigger.
pub fn stop<T: 'static>(effect: &ReactiveEffect<T>) {
    effect.stop();
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{reactive, Key, Value};
    use serde_json::json;

    fn counter() -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
        let count = Rc::new(Cell::new(0));
        (count.clone(), count)
    }

    #[test]
    fn effect_runs_on_creation() {
        let (runs, runs_clone) = counter();
        let _effect = effect(move || runs_clone.set(runs_clone.get() + 1), EffectOptions::default());

        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let (runs, runs_clone) = counter();
        let effect = effect(
            move || runs_clone.set(runs_clone.get() + 1),
            EffectOptions::default().lazy(),
        );

        assert_eq!(runs.get(), 0);
        assert_eq!(effect.run_count(), 0);

        effect.run();
        assert_eq!(runs.get(), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn runner_returns_the_function_result() {
        let state = reactive(json!({"n": 21})).into_proxy().unwrap();
        let s = state.clone();
        let runner = effect(
            move || s.get("n").as_f64().unwrap_or(0.0) * 2.0,
            EffectOptions::default().lazy(),
        );
        assert_eq!(runner.run(), Some(42.0));
    }

    #[test]
    fn effect_reruns_when_dependency_changes() {
        let state = reactive(json!({"count": 0})).into_proxy().unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let (s, log) = (state.clone(), seen.clone());
        let _effect = effect(
            move || log.borrow_mut().push(s.get("count")),
            EffectOptions::default(),
        );

        state.set("count", 1);
        state.set("count", 2);
        assert_eq!(*seen.borrow(), vec![Value::from(0), Value::from(1), Value::from(2)]);
    }

    #[test]
    fn branch_switching_recollects_dependencies() {
        let state = reactive(json!({"ok": true, "text": "hello"})).into_proxy().unwrap();
        let (runs, runs_clone) = counter();

        let s = state.clone();
        let effect = effect(
            move || {
                runs_clone.set(runs_clone.get() + 1);
                if s.get("ok").truthy() {
                    s.get("text");
                }
            },
            EffectOptions::default(),
        );
        assert_eq!(effect.dependency_count(), 2);

        state.set("ok", false);
        assert_eq!(runs.get(), 2);
        assert_eq!(effect.dependency_count(), 1);

        // `text` is no longer read, so changing it does nothing.
        state.set("text", "world");
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn self_increment_does_not_loop() {
        let state = reactive(json!({"n": 0})).into_proxy().unwrap();
        let s = state.clone();
        let effect = effect(
            move || {
                let n = s.get("n").as_f64().unwrap_or(0.0);
                s.set("n", n + 1.0);
            },
            EffectOptions::default(),
        );

        assert_eq!(state.get("n"), Value::from(1));
        assert_eq!(effect.run_count(), 1);

        state.set("n", 10);
        assert_eq!(state.get("n"), Value::from(11));
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn scheduler_receives_the_effect() {
        let state = reactive(json!({"n": 0})).into_proxy().unwrap();
        let queued: Rc<RefCell<Vec<EffectHandle>>> = Rc::new(RefCell::new(Vec::new()));
        let (runs, runs_clone) = counter();

        let (s, q) = (state.clone(), queued.clone());
        let effect = effect(
            move || {
                runs_clone.set(runs_clone.get() + 1);
                s.get("n");
            },
            EffectOptions::default().scheduler(move |job| q.borrow_mut().push(job)),
        );
        assert_eq!(runs.get(), 1);

        state.set("n", 1);
        assert_eq!(runs.get(), 1);
        assert_eq!(queued.borrow().len(), 1);
        assert_eq!(queued.borrow()[0].id(), effect.id());

        let job = queued.borrow_mut().remove(0);
        job.run();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn stopped_effect_does_not_rerun() {
        let state = reactive(json!({"n": 0})).into_proxy().unwrap();
        let (runs, runs_clone) = counter();
        let (stops, stops_clone) = counter();

        let s = state.clone();
        let effect = effect(
            move || {
                runs_clone.set(runs_clone.get() + 1);
                s.get("n");
            },
            EffectOptions::default().on_stop(move || stops_clone.set(stops_clone.get() + 1)),
        );

        stop(&effect);
        stop(&effect);
        assert!(!effect.is_active());
        assert_eq!(stops.get(), 1);
        assert_eq!(effect.dependency_count(), 0);

        state.set("n", 1);
        assert_eq!(runs.get(), 1);

        // Manual runs pass straight through without collecting dependencies.
        effect.run();
        assert_eq!(runs.get(), 2);
        assert_eq!(effect.dependency_count(), 0);
        state.set("n", 2);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn nested_effects_track_independently() {
        let state = reactive(json!({"outer": 0, "inner": 0})).into_proxy().unwrap();
        let (outer_runs, outer_clone) = counter();
        let (inner_runs, inner_clone) = counter();
        let inner_effects = Rc::new(RefCell::new(Vec::new()));

        let (s, holder) = (state.clone(), inner_effects.clone());
        let _outer = effect(
            move || {
                outer_clone.set(outer_clone.get() + 1);
                let (inner_state, inner_count) = (s.clone(), inner_clone.clone());
                let inner = effect(
                    move || {
                        inner_count.set(inner_count.get() + 1);
                        inner_state.get("inner");
                    },
                    EffectOptions::default(),
                );
                holder.borrow_mut().push(inner);
                s.get("outer");
            },
            EffectOptions::default(),
        );
        assert_eq!((outer_runs.get(), inner_runs.get()), (1, 1));

        state.set("inner", 1);
        assert_eq!((outer_runs.get(), inner_runs.get()), (1, 2));

        state.set("outer", 1);
        assert_eq!(outer_runs.get(), 2);
    }

    #[test]
    fn effects_run_in_subscription_order() {
        let state = reactive(json!({"n": 0})).into_proxy().unwrap();
        let order = Rc::new(RefCell::new(Vec::new()));

        let effects: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|name| {
                let (s, order) = (state.clone(), order.clone());
                effect(
                    move || {
                        s.get(Key::from("n"));
                        order.borrow_mut().push(name);
                    },
                    EffectOptions::default(),
                )
            })
            .collect();
        order.borrow_mut().clear();

        state.set("n", 1);
        assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
        drop(effects);
    }
}
