//! Target Registry
//!
//! The registry maps each observed raw target to its dependency map, and
//! each dependency map maps property keys to dependency sets. Both levels are
//! created lazily on the first tracked read.
//!
//! # How It Works
//!
//! 1. When an effect reads a reactive property, [`track`] records the effect
//!    in the dependency set for `(target, key)`.
//!
//! 2. When a reactive property is written, [`trigger`] collects every
//!    dependency set the write can affect:
//!    a. the set for the written key itself
//!    b. the enumeration set, when an object key is added or removed
//!    c. the length set, when an array grows through an index write
//!    d. the length set and every index at or past the new length, when an
//!       array's length is assigned
//!
//! 3. The collected effects are de-duplicated into one run list, which is
//!    snapshotted before any effect runs.
//!
//! Entries are removed when their target is dropped (see
//! [`RawObject`](super::RawObject)), so the registry never keeps a target's
//! subscribers alive past the target itself. A dependency set also leaves
//! its map when its last subscriber unsubscribes, and a map with no sets
//! left leaves the registry.

use std::cell::RefCell;
use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::trace;

use super::dep::{Dep, RunList};
use super::operations::{TrackOp, TriggerOp};
use super::value::{Key, RawObject, TargetId};
use crate::runtime::Runtime;

/// Key → dependency set, for one target.
pub(crate) type DepsMap = IndexMap<Key, Dep>;

#[derive(Default)]
pub(crate) struct TargetRegistry {
    targets: RefCell<HashMap<TargetId, DepsMap>>,
}

impl TargetRegistry {
    /// The dependency set for `(target, key)`, created if missing.
    pub(crate) fn dep_for(&self, target: TargetId, key: &Key) -> Dep {
        self.targets
            .borrow_mut()
            .entry(target)
            .or_default()
            .entry(key.clone())
            .or_insert_with(|| Dep::for_key(target, key.clone()))
            .clone()
    }

    /// Drop `dep` from `target`'s map if it is still the set registered
    /// under `key`, and the map itself once it is empty.
    pub(crate) fn prune(&self, target: TargetId, key: &Key, dep: &Dep) {
        let Ok(mut targets) = self.targets.try_borrow_mut() else {
            return;
        };
        let Some(deps) = targets.get_mut(&target) else {
            return;
        };
        if deps.get(key).is_some_and(|current| current.ptr_eq(dep)) {
            deps.shift_remove(key);
        }
        if deps.is_empty() {
            targets.remove(&target);
        }
    }

    pub(crate) fn with_deps<R>(&self, target: TargetId, f: impl FnOnce(&DepsMap) -> R) -> Option<R> {
        self.targets.borrow().get(&target).map(f)
    }

    /// Drop the dependency map of a target that no longer exists.
    pub(crate) fn forget(&self, target: TargetId) {
        let removed = self
            .targets
            .try_borrow_mut()
            .ok()
            .and_then(|mut targets| targets.remove(&target));
        drop(removed);
    }

    pub(crate) fn contains(&self, target: TargetId) -> bool {
        self.targets.borrow().contains_key(&target)
    }

    pub(crate) fn len(&self) -> usize {
        self.targets.borrow().len()
    }
}

/// Record a dependency of the active effect on `(target, key)`.
///
/// No-op when no effect is running or tracking is paused.
pub fn track(target: TargetId, op: TrackOp, key: &Key) {
    let Some(effect) = Runtime::with(|rt| rt.context.active_effect()) else {
        return;
    };
    trace!(target = target.raw(), %op, %key, effect = effect.id().raw(), "track");
    let dep = Runtime::with(|rt| rt.targets.dep_for(target, key));
    dep.track(&effect);
}

/// Notify the effects that depend on `key` of `target`.
///
/// `new_length` is the assigned length when `key` is an array's length.
pub fn trigger(target: &RawObject, op: TriggerOp, key: &Key, new_length: Option<usize>) {
    let is_array = target.is_array();
    let run_list = Runtime::with(|rt| {
        let mut run_list = RunList::default();
        rt.targets.with_deps(target.id(), |deps| {
            if is_array && key.is_length() {
                let new_length = new_length.unwrap_or(0);
                for (dep_key, dep) in deps {
                    let truncated = dep_key.as_index().is_some_and(|index| index >= new_length);
                    if dep_key.is_length() || truncated {
                        run_list.add(dep, &rt.context);
                    }
                }
                return;
            }

            if let Some(dep) = deps.get(key) {
                run_list.add(dep, &rt.context);
            }
            let shape_key = match op {
                TriggerOp::Add if !is_array => Some(Key::iterate()),
                TriggerOp::Add if key.as_index().is_some() => Some(Key::length()),
                TriggerOp::Delete if !is_array => Some(Key::iterate()),
                _ => None,
            };
            if let Some(dep) = shape_key.and_then(|shape_key| deps.get(&shape_key)) {
                run_list.add(dep, &rt.context);
            }
        });
        run_list
    });

    trace!(target = target.id().raw(), %op, %key, effects = run_list.len(), "trigger");
    run_list.run();
}
