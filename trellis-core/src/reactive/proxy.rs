//! Reactive Proxies
//!
//! A proxy wraps a raw target and performs dependency tracking and
//! triggering inside each access method. Four variants exist:
//!
//! | variant            | tracks reads | accepts writes | wraps nested objects |
//! |--------------------|--------------|----------------|----------------------|
//! | `reactive`         | yes          | yes            | yes, lazily          |
//! | `shallow_reactive` | yes          | yes            | no                   |
//! | `readonly`         | no           | no             | yes, as readonly     |
//! | `shallow_readonly` | no           | no             | no                   |
//!
//! A readonly wrap of a reactive proxy layers over it: reads go through the
//! reactive proxy (and are tracked there), writes are rejected.
//!
//! Wrapping is identity-stable: the same source wrapped with the same
//! variant yields the same proxy for as long as that proxy is alive.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::warn;

use super::context::PauseTracking;
use super::operations::{TrackOp, TriggerOp};
use super::registry::{track, trigger};
use super::value::{array_length, has_changed, Key, RawObject, TargetId, Value};
use super::ObjectAccess;
use crate::error::ReactiveError;
use crate::runtime::Runtime;

/// The flavor of a proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyKind {
    Reactive,
    ShallowReactive,
    Readonly,
    ShallowReadonly,
}

impl ProxyKind {
    pub fn is_readonly(self) -> bool {
        matches!(self, ProxyKind::Readonly | ProxyKind::ShallowReadonly)
    }

    pub fn is_shallow(self) -> bool {
        matches!(self, ProxyKind::ShallowReactive | ProxyKind::ShallowReadonly)
    }
}

impl fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProxyKind::Reactive => "reactive",
            ProxyKind::ShallowReactive => "shallow reactive",
            ProxyKind::Readonly => "readonly",
            ProxyKind::ShallowReadonly => "shallow readonly",
        })
    }
}

/// Reserved marker keys answered by every proxy without tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactiveFlag {
    Skip,
    IsReactive,
    IsReadonly,
    IsShallow,
    IsRef,
    Raw,
}

impl ReactiveFlag {
    pub const fn key(self) -> &'static str {
        match self {
            ReactiveFlag::Skip => "__v_skip",
            ReactiveFlag::IsReactive => "__v_isReactive",
            ReactiveFlag::IsReadonly => "__v_isReadonly",
            ReactiveFlag::IsShallow => "__v_isShallow",
            ReactiveFlag::IsRef => "__v_isRef",
            ReactiveFlag::Raw => "__v_raw",
        }
    }

    fn from_key(key: &Key) -> Option<Self> {
        let name = key.as_str()?;
        [
            ReactiveFlag::Skip,
            ReactiveFlag::IsReactive,
            ReactiveFlag::IsReadonly,
            ReactiveFlag::IsShallow,
            ReactiveFlag::IsRef,
            ReactiveFlag::Raw,
        ]
        .into_iter()
        .find(|flag| flag.key() == name)
    }
}

#[derive(Clone)]
enum ProxySource {
    Raw(RawObject),
    Proxy(Reactive),
}

impl ProxySource {
    fn id(&self) -> TargetId {
        match self {
            ProxySource::Raw(raw) => raw.id(),
            ProxySource::Proxy(proxy) => proxy.0.id,
        }
    }
}

struct ProxyInner {
    id: TargetId,
    kind: ProxyKind,
    source: ProxySource,
}

impl Drop for ProxyInner {
    fn drop(&mut self) {
        let (source, kind) = (self.source.id(), self.kind);
        Runtime::try_with(|rt| rt.proxies.release(source, kind));
    }
}

/// Cache of live proxies by `(source, kind)`.
#[derive(Default)]
pub(crate) struct ProxyCache {
    proxies: RefCell<HashMap<(TargetId, ProxyKind), Weak<ProxyInner>>>,
}

impl ProxyCache {
    fn lookup(&self, source: TargetId, kind: ProxyKind) -> Option<Reactive> {
        self.proxies
            .borrow()
            .get(&(source, kind))
            .and_then(Weak::upgrade)
            .map(Reactive)
    }

    fn insert(&self, source: TargetId, kind: ProxyKind, proxy: &Reactive) {
        self.proxies
            .borrow_mut()
            .insert((source, kind), Rc::downgrade(&proxy.0));
    }

    fn release(&self, source: TargetId, kind: ProxyKind) {
        if let Ok(mut proxies) = self.proxies.try_borrow_mut() {
            if proxies.get(&(source, kind)).is_some_and(|p| p.strong_count() == 0) {
                proxies.remove(&(source, kind));
            }
        }
    }

    /// Drop every cache entry for a source that no longer exists.
    pub(crate) fn forget(&self, source: TargetId) {
        if let Ok(mut proxies) = self.proxies.try_borrow_mut() {
            proxies.retain(|(id, _), _| *id != source);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.proxies.borrow().len()
    }
}

/// A reactive or readonly view of a raw target.
///
/// Clones are the same proxy; equality is identity.
#[derive(Clone)]
pub struct Reactive(Rc<ProxyInner>);

impl Reactive {
    pub fn kind(&self) -> ProxyKind {
        self.0.kind
    }

    /// The raw target beneath every proxy layer.
    pub fn raw(&self) -> RawObject {
        match &self.0.source {
            ProxySource::Raw(raw) => raw.clone(),
            ProxySource::Proxy(inner) => inner.raw(),
        }
    }

    pub fn is_array(&self) -> bool {
        self.raw().is_array()
    }

    /// Whether writes through a mutable proxy reach this view: true for
    /// mutable proxies and for readonly views over one.
    fn observes_mutations(&self) -> bool {
        match (&self.0.source, self.kind().is_readonly()) {
            (_, false) => true,
            (ProxySource::Proxy(inner), true) => inner.observes_mutations(),
            (ProxySource::Raw(_), true) => false,
        }
    }

    fn flag(&self, flag: ReactiveFlag) -> Value {
        match flag {
            ReactiveFlag::IsReactive => Value::Bool(self.observes_mutations()),
            ReactiveFlag::IsReadonly => Value::Bool(self.kind().is_readonly()),
            ReactiveFlag::IsShallow => Value::Bool(self.kind().is_shallow()),
            ReactiveFlag::IsRef => Value::Bool(false),
            ReactiveFlag::Skip => Value::Bool(self.raw().is_marked_raw()),
            ReactiveFlag::Raw => Value::Object(self.raw()),
        }
    }

    /// Read a property.
    ///
    /// Mutable proxies record the read against the running effect. Deep
    /// proxies wrap nested objects on the way out and unwrap refs stored
    /// under object keys.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        self.get_key(&key.into())
    }

    fn get_key(&self, key: &Key) -> Value {
        if let Some(flag) = ReactiveFlag::from_key(key) {
            return self.flag(flag);
        }

        let kind = self.kind();
        let value = match &self.0.source {
            ProxySource::Raw(raw) => {
                if !kind.is_readonly() {
                    track_read(raw, key);
                }
                let value = raw.read(key);
                if kind.is_shallow() {
                    return value;
                }
                match value {
                    Value::Ref(inner) if !(raw.is_array() && key.as_index().is_some()) => {
                        return inner.get();
                    }
                    other => other,
                }
            }
            ProxySource::Proxy(inner) => {
                let value = inner.get_key(key);
                if kind.is_shallow() {
                    return value;
                }
                value
            }
        };

        match value {
            Value::Object(_) | Value::Proxy(_) if kind.is_readonly() => readonly(value),
            Value::Object(_) | Value::Proxy(_) => reactive(value),
            other => other,
        }
    }

    /// Write a property, returning the error instead of logging it.
    pub fn try_set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<(), ReactiveError> {
        let key = key.into();
        let value: Value = value.into();
        let raw = self.writable_target(&key, TriggerOp::Set)?;
        let shallow = self.kind().is_shallow();
        let value = if shallow { value } else { value.to_raw() };
        let old = raw.read(&key);

        if !shallow && !raw.is_array() {
            if let Value::Ref(target) = &old {
                if !matches!(value, Value::Ref(_)) {
                    target.set(value);
                    return Ok(());
                }
            }
        }

        if raw.is_array() && key.is_length() {
            let new_length =
                array_length(&value).ok_or_else(|| ReactiveError::InvalidArrayLength(value.clone()))?;
            let old_length = raw.len();
            let removed = raw.set_length(new_length)?;
            drop(removed);
            if new_length != old_length {
                trigger(&raw, TriggerOp::Set, &key, Some(new_length));
            }
            return Ok(());
        }

        let had_key = raw.has_own(&key);
        raw.write(key.clone(), value.clone())?;
        if !had_key {
            trigger(&raw, TriggerOp::Add, &key, None);
        } else if has_changed(&value, &old) {
            trigger(&raw, TriggerOp::Set, &key, None);
        }
        Ok(())
    }

    /// Write a property. Returns `false` if the write was rejected.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        match self.try_set(key, value) {
            Ok(()) => true,
            Err(ReactiveError::ReadonlyViolation { .. }) => false,
            Err(err) => {
                warn!(%err, "set rejected");
                false
            }
        }
    }

    /// Whether the property exists. Tracked on mutable proxies.
    pub fn has(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        match &self.0.source {
            ProxySource::Raw(raw) => {
                if !self.kind().is_readonly() {
                    track(raw.id(), TrackOp::Has, &key);
                }
                raw.has_own(&key)
            }
            ProxySource::Proxy(inner) => inner.has(key),
        }
    }

    /// Remove a property, returning the error instead of logging it.
    ///
    /// `Ok(true)` if the key existed.
    pub fn try_delete(&self, key: impl Into<Key>) -> Result<bool, ReactiveError> {
        let key = key.into();
        let raw = self.writable_target(&key, TriggerOp::Delete)?;
        let had_key = raw.has_own(&key);
        let removed = raw.remove(&key);
        if had_key && removed.is_some() {
            drop(removed);
            trigger(&raw, TriggerOp::Delete, &key, None);
        }
        Ok(had_key)
    }

    /// Remove a property. `true` if the key existed and was removed.
    pub fn delete_key(&self, key: impl Into<Key>) -> bool {
        self.try_delete(key).unwrap_or(false)
    }

    /// Own keys. Tracks the enumeration of the target on mutable proxies.
    pub fn keys(&self) -> Vec<Key> {
        match &self.0.source {
            ProxySource::Raw(raw) => {
                if !self.kind().is_readonly() {
                    track(raw.id(), TrackOp::Iterate, &iteration_key(raw));
                }
                raw.own_keys()
            }
            ProxySource::Proxy(inner) => inner.keys(),
        }
    }

    /// Values of all own keys, read through this proxy.
    pub fn values(&self) -> Vec<Value> {
        self.keys().iter().map(|key| self.get_key(key)).collect()
    }

    /// Key/value pairs of all own keys, read through this proxy.
    pub fn entries(&self) -> Vec<(Key, Value)> {
        self.keys()
            .into_iter()
            .map(|key| {
                let value = self.get_key(&key);
                (key, value)
            })
            .collect()
    }

    /// Array length, or number of own keys for objects.
    pub fn len(&self) -> usize {
        if self.is_array() {
            array_length(&self.get_key(&Key::length())).unwrap_or(0)
        } else {
            self.keys().len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append to an array, returning the new length.
    ///
    /// The length read is not tracked, so an effect that pushes does not
    /// subscribe to the length it changes.
    pub fn push(&self, value: impl Into<Value>) -> Result<usize, ReactiveError> {
        if !self.is_array() {
            return Err(ReactiveError::NotAnArray);
        }
        let _paused = PauseTracking::new();
        let len = self.len();
        self.try_set(len, value)?;
        Ok(len + 1)
    }

    /// Remove and return the last element of an array.
    pub fn pop(&self) -> Result<Value, ReactiveError> {
        if !self.is_array() {
            return Err(ReactiveError::NotAnArray);
        }
        let _paused = PauseTracking::new();
        self.writable_target(&Key::length(), TriggerOp::Set)?;
        let len = self.len();
        if len == 0 {
            return Ok(Value::Undefined);
        }
        let last = self.get_key(&Key::Index(len - 1));
        self.try_set(Key::length(), len - 1)?;
        Ok(last)
    }

    /// Position of `needle` in an array, comparing by identity.
    ///
    /// Tracks every element, and also matches when `needle` is a proxy of
    /// a stored raw object.
    pub fn index_of(&self, needle: &Value) -> Option<usize> {
        let raw = match &self.0.source {
            ProxySource::Proxy(inner) => return inner.index_of(needle),
            ProxySource::Raw(raw) if raw.is_array() => raw,
            ProxySource::Raw(_) => return None,
        };
        if !self.kind().is_readonly() {
            track(raw.id(), TrackOp::Get, &Key::length());
            for index in 0..raw.len() {
                track(raw.id(), TrackOp::Get, &Key::Index(index));
            }
        }
        let values = raw.values();
        let needle_raw = needle.to_raw();
        values
            .iter()
            .position(|value| value.same_value(needle))
            .or_else(|| values.iter().position(|value| value.same_value(&needle_raw)))
    }

    pub fn includes(&self, needle: &Value) -> bool {
        self.index_of(needle).is_some()
    }

    fn writable_target(&self, key: &Key, op: TriggerOp) -> Result<RawObject, ReactiveError> {
        match (&self.0.source, self.kind().is_readonly()) {
            (ProxySource::Raw(raw), false) => Ok(raw.clone()),
            _ => {
                if Runtime::with(|rt| rt.config().warn_on_readonly) {
                    warn!(%key, %op, "operation failed: target is readonly");
                }
                Err(ReactiveError::ReadonlyViolation { key: key.clone(), op })
            }
        }
    }
}

fn iteration_key(raw: &RawObject) -> Key {
    if raw.is_array() {
        Key::length()
    } else {
        Key::iterate()
    }
}

fn track_read(raw: &RawObject, key: &Key) {
    track(raw.id(), TrackOp::Get, key);
    // Reading past the end depends on the array growing.
    if let Some(index) = key.as_index() {
        if raw.is_array() && index >= raw.len() {
            track(raw.id(), TrackOp::Get, &Key::length());
        }
    }
}

impl ObjectAccess for Reactive {
    fn get(&self, key: impl Into<Key>) -> Value {
        Reactive::get(self, key)
    }

    fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        Reactive::set(self, key, value)
    }

    fn has(&self, key: impl Into<Key>) -> bool {
        Reactive::has(self, key)
    }

    fn delete_key(&self, key: impl Into<Key>) -> bool {
        Reactive::delete_key(self, key)
    }

    fn keys(&self) -> Vec<Key> {
        Reactive::keys(self)
    }
}

impl PartialEq for Reactive {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactive")
            .field("id", &self.0.id.raw())
            .field("kind", &self.0.kind)
            .field("target", &self.raw())
            .finish()
    }
}

fn create_proxy(target: Value, kind: ProxyKind) -> Value {
    let source = match target {
        Value::Object(raw) if raw.is_marked_raw() => return Value::Object(raw),
        Value::Object(raw) => ProxySource::Raw(raw),
        // Only a readonly wrap of a mutable proxy adds a layer.
        Value::Proxy(proxy) if kind.is_readonly() && !proxy.kind().is_readonly() => {
            ProxySource::Proxy(proxy)
        }
        Value::Proxy(proxy) => return Value::Proxy(proxy),
        other => {
            warn!(value = ?other, "value cannot be made {kind}");
            return other;
        }
    };

    let source_id = source.id();
    if let Some(existing) = Runtime::with(|rt| rt.proxies.lookup(source_id, kind)) {
        return Value::Proxy(existing);
    }

    let proxy = Reactive(Rc::new(ProxyInner {
        id: TargetId::next(),
        kind,
        source,
    }));
    Runtime::with(|rt| rt.proxies.insert(source_id, kind, &proxy));
    Value::Proxy(proxy)
}

/// Deep mutable proxy of `target`. Non-objects pass through unchanged.
pub fn reactive(target: impl Into<Value>) -> Value {
    create_proxy(target.into(), ProxyKind::Reactive)
}

/// Mutable proxy tracking only root-level properties.
pub fn shallow_reactive(target: impl Into<Value>) -> Value {
    create_proxy(target.into(), ProxyKind::ShallowReactive)
}

/// Deep readonly view of `target`.
pub fn readonly(target: impl Into<Value>) -> Value {
    create_proxy(target.into(), ProxyKind::Readonly)
}

/// Readonly view of root-level properties only.
pub fn shallow_readonly(target: impl Into<Value>) -> Value {
    create_proxy(target.into(), ProxyKind::ShallowReadonly)
}

fn proxy_flag(value: &Value, flag: ReactiveFlag) -> bool {
    match value {
        Value::Proxy(proxy) => proxy.get(flag.key()).truthy(),
        _ => false,
    }
}

/// Whether writes through some mutable proxy are observed by `value`.
pub fn is_reactive(value: &Value) -> bool {
    proxy_flag(value, ReactiveFlag::IsReactive)
}

pub fn is_readonly(value: &Value) -> bool {
    proxy_flag(value, ReactiveFlag::IsReadonly)
}

pub fn is_shallow(value: &Value) -> bool {
    match value {
        Value::Ref(r) => r.is_shallow(),
        other => proxy_flag(other, ReactiveFlag::IsShallow),
    }
}

pub fn is_proxy(value: &Value) -> bool {
    matches!(value, Value::Proxy(_))
}

/// The raw object beneath any proxy layers.
pub fn to_raw(value: &Value) -> Value {
    match value {
        Value::Proxy(proxy) => proxy.get(ReactiveFlag::Raw.key()),
        other => other.clone(),
    }
}

/// Exclude `value` from ever being proxied. Returns it unchanged.
pub fn mark_raw(value: Value) -> Value {
    if let Value::Object(raw) = &value {
        raw.mark_raw();
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{create_ref, effect, EffectOptions, MAX_ARRAY_LENGTH};
    use serde_json::json;
    use std::cell::Cell;

    fn proxy(value: Value) -> Reactive {
        value.into_proxy().unwrap()
    }

    fn run_counter<F: Fn() + 'static>(read: F) -> Rc<Cell<usize>> {
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let runner = effect(
            move || {
                runs_clone.set(runs_clone.get() + 1);
                read();
            },
            EffectOptions::default(),
        );
        // Keep the effect alive for the whole test through its subscriptions.
        drop(runner);
        runs
    }

    #[test]
    fn wrapping_is_identity_stable() {
        let raw = Value::from(json!({"a": 1}));
        let a = reactive(raw.clone());
        let b = reactive(raw.clone());
        assert_eq!(a, b);
        assert_eq!(reactive(a.clone()), a);
        assert_eq!(readonly(raw.clone()), readonly(raw.clone()));
        assert_ne!(readonly(raw.clone()), reactive(raw));
    }

    #[test]
    fn primitives_pass_through() {
        assert_eq!(reactive(1), Value::from(1));
        assert_eq!(readonly("x"), Value::from("x"));
        assert_eq!(reactive(Value::Null), Value::Null);
    }

    #[test]
    fn marked_raw_objects_are_never_wrapped() {
        let raw = mark_raw(Value::from(json!({"a": 1})));
        assert!(!is_proxy(&reactive(raw.clone())));
        assert!(proxy(reactive(json!({"inner": {}}))).get(ReactiveFlag::Skip.key()) == Value::Bool(false));
    }

    #[test]
    fn introspection_flags() {
        let raw = Value::from(json!({"a": 1}));
        let r = reactive(raw.clone());
        let ro = readonly(raw.clone());
        let ro_over_r = readonly(r.clone());
        let sr = shallow_reactive(Value::from(json!({})));

        assert!(is_reactive(&r) && !is_readonly(&r) && !is_shallow(&r));
        assert!(!is_reactive(&ro) && is_readonly(&ro));
        assert!(is_reactive(&ro_over_r) && is_readonly(&ro_over_r));
        assert!(is_shallow(&sr) && is_reactive(&sr));
        assert!(!is_reactive(&raw));
        assert_eq!(to_raw(&ro_over_r), raw);
        assert_eq!(reactive(ro.clone()), ro);
    }

    #[test]
    fn nested_objects_are_wrapped_lazily() {
        let state = proxy(reactive(json!({"nested": {"x": 1}})));
        let nested = state.get("nested");
        assert!(is_reactive(&nested));
        assert_eq!(nested, state.get("nested"));

        let view = proxy(readonly(json!({"nested": {"x": 1}})));
        assert!(is_readonly(&view.get("nested")));

        let shallow = proxy(shallow_reactive(json!({"nested": {"x": 1}})));
        assert!(!is_proxy(&shallow.get("nested")));
    }

    #[test]
    fn shallow_nested_mutation_is_not_tracked() {
        let state = proxy(shallow_reactive(json!({"nested": {"x": 1}})));
        let s = state.clone();
        let runs = run_counter(move || {
            if let Value::Object(nested) = s.get("nested") {
                nested.get("x");
            }
        });

        let nested = state.get("nested");
        nested.as_object().unwrap().set("x", 2);
        assert_eq!(runs.get(), 1);

        state.set("nested", json!({"x": 3}));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn deep_nested_mutation_is_tracked() {
        let state = proxy(reactive(json!({"nested": {"x": 1}})));
        let s = state.clone();
        let runs = run_counter(move || {
            s.get("nested").as_proxy().unwrap().get("x");
        });

        state.get("nested").as_proxy().unwrap().set("x", 2);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn same_value_writes_do_not_trigger() {
        let state = proxy(reactive(json!({"n": 1})));
        state.set("nan", f64::NAN);
        let s = state.clone();
        let runs = run_counter(move || {
            s.get("n");
            s.get("nan");
        });

        state.set("n", 1);
        state.set("nan", f64::NAN);
        assert_eq!(runs.get(), 1);

        state.set("n", 2);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn readonly_rejects_mutation() {
        let raw = Value::from(json!({"n": 1}));
        let view = proxy(readonly(reactive(raw.clone())));

        assert!(!view.set("n", 2));
        assert!(matches!(
            view.try_set("n", 2),
            Err(ReactiveError::ReadonlyViolation { op: TriggerOp::Set, .. })
        ));
        assert!(matches!(
            view.try_delete("n"),
            Err(ReactiveError::ReadonlyViolation { op: TriggerOp::Delete, .. })
        ));
        assert_eq!(raw.as_object().unwrap().get("n"), Value::from(1));
    }

    #[test]
    fn readonly_does_not_track() {
        let view = proxy(readonly(json!({"n": 1})));
        let v = view.clone();
        let runner = effect(
            move || {
                v.get("n");
            },
            EffectOptions::default(),
        );
        assert_eq!(runner.dependency_count(), 0);
    }

    #[test]
    fn readonly_over_reactive_tracks_through_inner() {
        let state = reactive(json!({"n": 1}));
        let view = proxy(readonly(state.clone()));
        let v = view.clone();
        let runs = run_counter(move || {
            v.get("n");
        });

        state.as_proxy().unwrap().set("n", 2);
        assert_eq!(runs.get(), 2);
        assert_eq!(view.get("n"), Value::from(2));
    }

    #[test]
    fn adding_and_deleting_keys_triggers_enumeration() {
        let state = proxy(reactive(json!({"a": 1})));
        let s = state.clone();
        let runs = run_counter(move || {
            s.keys();
        });

        state.set("a", 5);
        assert_eq!(runs.get(), 1);

        state.set("b", 2);
        assert_eq!(runs.get(), 2);

        assert!(state.delete_key("a"));
        assert_eq!(runs.get(), 3);

        assert!(!state.delete_key("missing"));
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn has_tracks_membership() {
        let state = proxy(reactive(json!({})));
        let s = state.clone();
        let runs = run_counter(move || {
            s.has("flag");
        });

        state.set("flag", true);
        assert_eq!(runs.get(), 2);
        state.delete_key("flag");
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn array_push_triggers_length_dependents() {
        let list = proxy(reactive(json!([1, 2])));
        let l = list.clone();
        let runs = run_counter(move || {
            l.len();
        });

        assert_eq!(list.push(3).unwrap(), 3);
        assert_eq!(runs.get(), 2);

        assert_eq!(list.pop().unwrap(), Value::from(3));
        assert_eq!(runs.get(), 3);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn truncating_length_triggers_dropped_indices() {
        let list = proxy(reactive(json!([1, 2, 3])));
        let l = list.clone();
        let runs = run_counter(move || {
            l.get(2usize);
        });

        list.set(0usize, 10);
        assert_eq!(runs.get(), 1);

        list.set(Key::length(), 1);
        assert_eq!(runs.get(), 2);
        assert_eq!(list.get(2usize), Value::Undefined);
    }

    #[test]
    fn out_of_bounds_read_reacts_to_growth() {
        let list = proxy(reactive(json!([])));
        let l = list.clone();
        let runs = run_counter(move || {
            l.get(3usize);
        });

        list.push(1).unwrap();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn pushing_inside_an_effect_does_not_self_subscribe() {
        let list = proxy(reactive(json!([])));
        let l = list.clone();
        let runner = effect(
            move || {
                l.push(1).unwrap();
            },
            EffectOptions::default(),
        );
        assert_eq!(runner.dependency_count(), 0);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn invalid_array_writes_are_errors() {
        let list = proxy(reactive(json!([])));
        assert!(matches!(list.try_set("name", 1), Err(ReactiveError::InvalidArrayKey(_))));
        assert!(matches!(
            list.try_set(Key::length(), -1),
            Err(ReactiveError::InvalidArrayLength(_))
        ));
        let obj = proxy(reactive(json!({})));
        assert!(matches!(obj.push(1), Err(ReactiveError::NotAnArray)));
    }

    #[test]
    fn out_of_range_array_writes_are_rejected() {
        let list = proxy(reactive(json!([1, 2])));
        let runs = Rc::new(Cell::new(0));
        let (l, r) = (list.clone(), runs.clone());
        let _runner = effect(
            move || {
                l.len();
                r.set(r.get() + 1);
            },
            EffectOptions::default(),
        );

        assert!(matches!(
            list.try_set(usize::MAX, 1),
            Err(ReactiveError::InvalidArrayKey(Key::Index(usize::MAX)))
        ));
        assert!(matches!(
            list.try_set(MAX_ARRAY_LENGTH, 1),
            Err(ReactiveError::InvalidArrayKey(_))
        ));
        assert!(matches!(
            list.try_set(Key::length(), 1e300),
            Err(ReactiveError::InvalidArrayLength(_))
        ));
        assert!(matches!(
            list.try_set(Key::length(), MAX_ARRAY_LENGTH as f64 + 1.0),
            Err(ReactiveError::InvalidArrayLength(_))
        ));
        assert!(!list.set(usize::MAX, 1));

        assert_eq!(list.len(), 2);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn index_of_sees_through_proxies() {
        let item = Value::from(json!({"id": 1}));
        let list = proxy(reactive(Value::Object(RawObject::from_values([item.clone()]))));
        let wrapped = list.get(0usize);
        assert!(is_proxy(&wrapped));
        assert_eq!(list.index_of(&wrapped), Some(0));
        assert!(list.includes(&item));
        assert_eq!(list.index_of(&Value::from(json!({"id": 1}))), None);
    }

    #[test]
    fn refs_in_objects_are_unwrapped() {
        let count = create_ref(1);
        let state = proxy(reactive(Value::Object(RawObject::from_entries([(
            "count",
            Value::Ref(count.clone()),
        )]))));

        assert_eq!(state.get("count"), Value::from(1));
        state.set("count", 2);
        assert_eq!(count.get(), Value::from(2));

        let list = proxy(reactive(Value::Object(RawObject::from_values([Value::Ref(count.clone())]))));
        assert!(matches!(list.get(0usize), Value::Ref(_)));
    }

    #[test]
    fn storing_a_proxy_stores_its_raw() {
        let inner = reactive(json!({"x": 1}));
        let state = proxy(reactive(json!({})));
        state.set("inner", inner.clone());
        assert!(matches!(state.raw().get("inner"), Value::Object(_)));
        assert_eq!(state.get("inner"), inner);
    }

    #[test]
    fn cache_entries_are_released_with_the_proxy() {
        let before = Runtime::with(|rt| rt.proxies.len());
        {
            let state = reactive(json!({"a": 1}));
            assert!(is_proxy(&state));
            assert_eq!(Runtime::with(|rt| rt.proxies.len()), before + 1);
        }
        assert_eq!(Runtime::with(|rt| rt.proxies.len()), before);
    }
}
