//! Subscriber types for the reactive system.
//!
//! A subscriber is anything that can sit in a dependency set and be notified
//! when one of its dependencies changes. Effects are the only subscriber kind;
//! the trait erases their return type so dependency sets can hold effects of
//! any `T`.

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::dep::WeakDep;

/// Unique identifier for an effect.
///
/// Each effect gets a unique ID when created. This ID keys dependency set
/// membership and makes de-duplication of run lists cheap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectId(u64);

impl EffectId {
    /// Generate a new unique effect ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}

/// A computation that can be subscribed to dependency sets.
pub(crate) trait Subscriber {
    fn id(&self) -> EffectId;

    /// Whether the subscriber has not been stopped.
    fn is_active(&self) -> bool;

    /// Whether the subscriber may be re-triggered by its own writes.
    fn allow_recurse(&self) -> bool;

    /// Remember that this subscriber sits in `dep`, for cleanup before re-runs.
    fn record_dependency(&self, dep: WeakDep);

    /// A dependency changed: hand off to the scheduler, or run now.
    fn notify(self: Rc<Self>);

    /// Run immediately, bypassing any scheduler.
    fn rerun(self: Rc<Self>);

    /// Leave every dependency set and never run tracked again.
    fn stop(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_ids_are_unique() {
        let id1 = EffectId::new();
        let id2 = EffectId::new();
        let id3 = EffectId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }
}
