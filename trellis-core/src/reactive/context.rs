//! Reactive Context
//!
//! The reactive context tracks which effect is currently running. This
//! enables automatic dependency tracking: when a reactive property is read,
//! the effect on top of the stack is registered as a dependent.
//!
//! # Implementation
//!
//! The runtime keeps a stack of running effects. Entering an effect run
//! pushes it; the returned guard pops it when dropped, so the stack stays
//! balanced even if the effect panics. Nested effects (an effect created or
//! run inside another effect's function) simply push on top.
//!
//! Tracking can also be paused globally. Pausing saves the previous state on
//! a second stack so that pause/reset pairs nest correctly.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::subscriber::{EffectId, Subscriber};
use crate::runtime::Runtime;

/// Per-runtime tracking state.
pub(crate) struct TrackingContext {
    stack: RefCell<Vec<Rc<dyn Subscriber>>>,
    should_track: Cell<bool>,
    saved: RefCell<Vec<bool>>,
}

impl TrackingContext {
    pub(crate) fn new() -> Self {
        Self {
            stack: RefCell::new(Vec::new()),
            should_track: Cell::new(true),
            saved: RefCell::new(Vec::new()),
        }
    }

    /// The effect that reads should be attributed to, if any.
    pub(crate) fn active_effect(&self) -> Option<Rc<dyn Subscriber>> {
        if !self.should_track.get() {
            return None;
        }
        self.stack.borrow().last().cloned()
    }

    /// Whether the effect is anywhere on the stack.
    pub(crate) fn is_running(&self, id: EffectId) -> bool {
        self.stack.borrow().iter().any(|effect| effect.id() == id)
    }

    pub(crate) fn depth(&self) -> usize {
        self.stack.borrow().len()
    }

    pub(crate) fn is_tracking(&self) -> bool {
        self.should_track.get() && self.depth() > 0
    }

    fn push(&self, effect: Rc<dyn Subscriber>) {
        self.stack.borrow_mut().push(effect);
    }

    fn pop(&self) -> Option<Rc<dyn Subscriber>> {
        self.stack.borrow_mut().pop()
    }

    pub(crate) fn pause(&self) {
        self.saved.borrow_mut().push(self.should_track.get());
        self.should_track.set(false);
    }

    pub(crate) fn enable(&self) {
        self.saved.borrow_mut().push(self.should_track.get());
        self.should_track.set(true);
    }

    pub(crate) fn reset(&self) {
        let last = self.saved.borrow_mut().pop();
        self.should_track.set(last.unwrap_or(true));
    }
}

/// Guard that pops the running effect when dropped.
pub(crate) struct ReactiveContext {
    effect_id: EffectId,
}

impl ReactiveContext {
    /// Enter a run of `effect`.
    ///
    /// Tracking is force-enabled for the duration of the run, even when the
    /// caller paused it, and restored afterwards.
    pub(crate) fn enter(effect: Rc<dyn Subscriber>) -> Self {
        let effect_id = effect.id();
        Runtime::with(|rt| {
            rt.context.enable();
            rt.context.push(effect);
        });
        Self { effect_id }
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let popped = Runtime::try_with(|rt| {
            let popped = rt.context.pop();
            rt.context.reset();
            popped
        })
        .flatten();

        if let Some(effect) = popped {
            debug_assert_eq!(
                effect.id(),
                self.effect_id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.effect_id,
                effect.id()
            );
        }
    }
}

/// Guard that pauses tracking until dropped.
pub(crate) struct PauseTracking;

impl PauseTracking {
    pub(crate) fn new() -> Self {
        Runtime::with(|rt| rt.context.pause());
        Self
    }
}

impl Drop for PauseTracking {
    fn drop(&mut self) {
        Runtime::try_with(|rt| rt.context.reset());
    }
}

/// Stop attributing reads to the running effect until [`reset_tracking`].
pub fn pause_tracking() {
    Runtime::with(|rt| rt.context.pause());
}

/// Attribute reads to the running effect until [`reset_tracking`], even
/// inside a paused region.
pub fn enable_tracking() {
    Runtime::with(|rt| rt.context.enable());
}

/// Undo the most recent [`pause_tracking`] or [`enable_tracking`].
pub fn reset_tracking() {
    Runtime::with(|rt| rt.context.reset());
}

/// Run `f` without tracking any reads it performs.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let _paused = PauseTracking::new();
    f()
}

/// Whether a read right now would be tracked.
pub fn is_tracking() -> bool {
    Runtime::with(|rt| rt.context.is_tracking())
}
