//! Reactive Primitives
//!
//! This module implements the core reactive system: proxies, refs, and
//! effects.
//!
//! # Concepts
//!
//! ## Proxies
//!
//! A proxy ([`reactive`], [`readonly`], and their shallow variants) wraps a
//! plain object or array. Reading a property through it inside an effect
//! registers the effect as a dependent of that property; writing the
//! property re-runs every dependent.
//!
//! ## Refs
//!
//! A [`Ref`] is a reactive container for a single value, tracked and
//! triggered as a whole.
//!
//! ## Effects
//!
//! An [`effect`] is a computation that runs whenever its dependencies
//! change. Dependencies are re-collected on every run.
//!
//! # Implementation Notes
//!
//! All bookkeeping lives in the thread-local [`Runtime`](crate::Runtime):
//! the stack of running effects and the registry mapping each observed
//! target and key to its dependency set. Values are `Rc`-based and never
//! cross threads.

mod context;
mod dep;
mod effect;
mod operations;
mod proxy;
mod refs;
mod registry;
mod subscriber;
mod value;

pub(crate) use context::TrackingContext;
pub(crate) use proxy::ProxyCache;
pub(crate) use registry::TargetRegistry;

pub use context::{enable_tracking, is_tracking, pause_tracking, reset_tracking, untrack};
pub use effect::{effect, stop, EffectHandle, EffectOptions, ReactiveEffect, Scheduler};
pub use operations::{TrackOp, TriggerOp};
pub use proxy::{
    is_proxy, is_reactive, is_readonly, is_shallow, mark_raw, reactive, readonly, shallow_reactive,
    shallow_readonly, to_raw, ProxyKind, Reactive, ReactiveFlag,
};
pub use refs::{create_ref, is_ref, shallow_ref, trigger_ref, unref, Ref};
pub use registry::{track, trigger};
pub use subscriber::EffectId;
pub use value::{Key, RawObject, Symbol, TargetId, Value, MAX_ARRAY_LENGTH};

/// Property access shared by raw targets and proxies.
///
/// On a [`RawObject`] these are plain reads and writes. On a [`Reactive`]
/// proxy they track and trigger.
pub trait ObjectAccess {
    fn get(&self, key: impl Into<Key>) -> Value;

    /// Returns `false` if the write was rejected.
    fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool;

    fn has(&self, key: impl Into<Key>) -> bool;

    /// Returns `true` if the key existed and was removed.
    fn delete_key(&self, key: impl Into<Key>) -> bool;

    fn keys(&self) -> Vec<Key>;
}
