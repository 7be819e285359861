//! Dependency Sets
//!
//! A dependency set holds the effects subscribed to one observed property
//! (or to one ref). Membership is insertion-ordered and duplicate-free, which
//! fixes the order in which synchronous effects re-run on a trigger.
//!
//! Dependency sets own their subscribers; subscribers point back at their
//! dependency sets weakly. Dropping a target's dependency map therefore
//! releases the effects that only it kept alive, and an effect cleaning up
//! never resurrects a set that is already gone.
//!
//! A set owned by a target's dependency map leaves that map as soon as its
//! last subscriber does, so keys an effect stopped reading cost nothing.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::trace;

use super::context::TrackingContext;
use super::subscriber::{EffectId, Subscriber};
use super::value::{Key, TargetId};
use crate::runtime::Runtime;

#[derive(Default)]
struct DepInner {
    subscribers: RefCell<IndexMap<EffectId, Rc<dyn Subscriber>>>,
    owner: Option<(TargetId, Key)>,
}

/// A set of subscribers tied to one observed property.
#[derive(Clone, Default)]
pub(crate) struct Dep(Rc<DepInner>);

impl Dep {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A set registered under `key` in `target`'s dependency map.
    pub(crate) fn for_key(target: TargetId, key: Key) -> Self {
        Self(Rc::new(DepInner {
            subscribers: RefCell::default(),
            owner: Some((target, key)),
        }))
    }

    pub(crate) fn ptr_eq(&self, other: &Dep) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn contains(&self, id: EffectId) -> bool {
        self.0.subscribers.borrow().contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.0.subscribers.borrow().len()
    }

    /// Snapshot of the current subscribers, in subscription order.
    pub(crate) fn subscribers(&self) -> Vec<Rc<dyn Subscriber>> {
        self.0.subscribers.borrow().values().cloned().collect()
    }

    pub(crate) fn remove(&self, id: EffectId) {
        let removed = self.0.subscribers.borrow_mut().shift_remove(&id);
        drop(removed);
        if let Some((target, key)) = &self.0.owner {
            if self.len() == 0 {
                Runtime::try_with(|rt| rt.targets.prune(*target, key, self));
            }
        }
    }

    pub(crate) fn downgrade(&self) -> WeakDep {
        WeakDep(Rc::downgrade(&self.0))
    }

    /// Link `effect` and this set in both directions.
    pub(crate) fn track(&self, effect: &Rc<dyn Subscriber>) {
        if self.contains(effect.id()) {
            return;
        }
        self.0
            .subscribers
            .borrow_mut()
            .insert(effect.id(), Rc::clone(effect));
        effect.record_dependency(self.downgrade());
    }

    /// Link the active effect, if any, to this set.
    pub(crate) fn track_active(&self) {
        if let Some(effect) = Runtime::with(|rt| rt.context.active_effect()) {
            trace!(effect = effect.id().raw(), "track ref");
            self.track(&effect);
        }
    }

    /// Notify every subscriber of this set.
    pub(crate) fn trigger(&self) {
        let run_list = Runtime::with(|rt| {
            let mut run_list = RunList::default();
            run_list.add(self, &rt.context);
            run_list
        });
        run_list.run();
    }
}

/// Weak back-reference from a subscriber to a set it belongs to.
pub(crate) struct WeakDep(Weak<DepInner>);

impl WeakDep {
    pub(crate) fn upgrade(&self) -> Option<Dep> {
        self.0.upgrade().map(Dep)
    }
}

/// The de-duplicated effects one trigger will notify.
///
/// Collected in full before any effect runs, so effects re-subscribing while
/// the list is being processed do not extend it.
#[derive(Default)]
pub(crate) struct RunList {
    effects: IndexMap<EffectId, Rc<dyn Subscriber>>,
}

impl RunList {
    pub(crate) fn add(&mut self, dep: &Dep, context: &TrackingContext) {
        for effect in dep.subscribers() {
            if context.is_running(effect.id()) && !effect.allow_recurse() {
                continue;
            }
            self.effects.entry(effect.id()).or_insert(effect);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.effects.len()
    }

    pub(crate) fn run(self) {
        for (_, effect) in self.effects {
            // An earlier effect in this list may have stopped a later one.
            if effect.is_active() {
                effect.notify();
            }
        }
    }
}
