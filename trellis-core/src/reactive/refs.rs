//! Refs
//!
//! A ref is a single reactive cell. Reading [`Ref::get`] inside an effect
//! subscribes the effect; [`Ref::set`] with a changed value notifies it.
//!
//! A deep ref converts object values to reactive proxies on the way in and
//! compares new values against the raw form of the old one, so assigning
//! the proxy of the object already held is not a change. A shallow ref
//! stores exactly what it is given.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use super::dep::Dep;
use super::proxy::reactive;
use super::value::{has_changed, Value};

struct RefInner {
    raw: RefCell<Value>,
    value: RefCell<Value>,
    shallow: bool,
    dep: Dep,
}

/// A reactive single-value cell. Clones share the cell.
#[derive(Clone)]
pub struct Ref(Rc<RefInner>);

impl Ref {
    fn with(value: Value, shallow: bool) -> Self {
        let (raw, value) = if shallow {
            (value.clone(), value)
        } else {
            (value.to_raw(), to_reactive(value))
        };
        Self(Rc::new(RefInner {
            raw: RefCell::new(raw),
            value: RefCell::new(value),
            shallow,
            dep: Dep::new(),
        }))
    }

    /// A deep ref holding `value`.
    pub fn new(value: impl Into<Value>) -> Self {
        Self::with(value.into(), false)
    }

    /// A ref that does not convert or track inside its value.
    pub fn shallow(value: impl Into<Value>) -> Self {
        Self::with(value.into(), true)
    }

    /// Read the value, subscribing the running effect.
    pub fn get(&self) -> Value {
        self.0.dep.track_active();
        self.peek()
    }

    /// Read the value without subscribing.
    pub fn peek(&self) -> Value {
        self.0.value.borrow().clone()
    }

    /// Replace the value. Subscribers run only if it changed.
    pub fn set(&self, value: impl Into<Value>) {
        let value: Value = value.into();
        let new_raw = if self.0.shallow { value.clone() } else { value.to_raw() };
        if !has_changed(&new_raw, &self.0.raw.borrow()) {
            return;
        }

        let new_value = if self.0.shallow { value } else { to_reactive(value) };
        let old_raw = self.0.raw.replace(new_raw);
        let old_value = self.0.value.replace(new_value);
        drop((old_raw, old_value));

        trace!(subscribers = self.0.dep.len(), "ref changed");
        self.0.dep.trigger();
    }

    pub fn is_shallow(&self) -> bool {
        self.0.shallow
    }

    pub fn ptr_eq(&self, other: &Ref) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Number of effects currently subscribed.
    pub fn subscriber_count(&self) -> usize {
        self.0.dep.len()
    }

    /// Notify subscribers without changing the value.
    pub fn trigger(&self) {
        self.0.dep.trigger();
    }
}

fn to_reactive(value: Value) -> Value {
    match value {
        Value::Object(_) => reactive(value),
        other => other,
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("value", &self.peek())
            .field("shallow", &self.0.shallow)
            .finish()
    }
}

/// Create a deep ref. A value that already is a ref is returned unchanged.
pub fn create_ref(value: impl Into<Value>) -> Ref {
    match value.into() {
        Value::Ref(existing) => existing,
        other => Ref::new(other),
    }
}

/// Create a shallow ref. A value that already is a ref is returned unchanged.
pub fn shallow_ref(value: impl Into<Value>) -> Ref {
    match value.into() {
        Value::Ref(existing) => existing,
        other => Ref::shallow(other),
    }
}

pub fn is_ref(value: &Value) -> bool {
    matches!(value, Value::Ref(_))
}

/// The ref's current value (tracked), or `value` itself if it is not a ref.
pub fn unref(value: &Value) -> Value {
    match value {
        Value::Ref(r) => r.get(),
        other => other.clone(),
    }
}

/// Force subscribers of a shallow ref to run after mutating inside it.
pub fn trigger_ref(r: &Ref) {
    r.trigger();
}
