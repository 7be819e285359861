//! Dynamic Values
//!
//! Reactive state is dynamically shaped: objects map keys to values, arrays
//! hold ordered values, and either may nest arbitrarily. This module defines
//! the value model that proxies, refs, and the dependency registry operate on.
//!
//! # Identity
//!
//! Objects, proxies, and refs are reference types. Cloning a [`Value`] that
//! holds one of them clones the handle, not the data, and equality between
//! them is identity. Primitive values compare by content, with `NaN` equal to
//! itself so that re-assigning `NaN` is never considered a change.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use super::proxy::Reactive;
use super::refs::Ref;
use super::ObjectAccess;
use crate::error::ReactiveError;
use crate::runtime::Runtime;

/// Unique identifier for a raw target or a proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    /// Generate a new unique target ID.
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

const ITERATE_SYMBOL: u64 = 0;

/// A unique, non-string property key.
///
/// Two symbols are equal only if they were produced by the same call to
/// [`Symbol::new`]; the description is informational.
#[derive(Clone)]
pub struct Symbol {
    id: u64,
    description: Rc<str>,
}

impl Symbol {
    /// Create a fresh symbol.
    pub fn new(description: &str) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(ITERATE_SYMBOL + 1);
        Self {
            id: COUNTER.fetch_add(1, Ordering::Relaxed),
            description: Rc::from(description),
        }
    }

    fn iterate() -> Self {
        Self {
            id: ITERATE_SYMBOL,
            description: Rc::from("iterate"),
        }
    }

    /// The description given at creation.
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Symbol {}

impl std::hash::Hash for Symbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description)
    }
}

/// A property key.
///
/// Canonical integer strings (`"0"`, `"17"`, but not `"07"`) are normalized to
/// [`Key::Index`] on conversion, so `"3"` and `3usize` address the same slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A string property name.
    Str(Rc<str>),
    /// An integer index.
    Index(usize),
    /// A symbol.
    Symbol(Symbol),
}

impl Key {
    /// Name of the array length property.
    pub const LENGTH: &'static str = "length";

    /// The reserved sentinel key under which enumeration is tracked.
    pub fn iterate() -> Self {
        Key::Symbol(Symbol::iterate())
    }

    /// The array length key.
    pub fn length() -> Self {
        Key::Str(Rc::from(Self::LENGTH))
    }

    /// Whether this is the array length key.
    pub fn is_length(&self) -> bool {
        matches!(self, Key::Str(name) if &**name == Self::LENGTH)
    }

    /// Whether this is the enumeration sentinel.
    pub fn is_iterate(&self) -> bool {
        matches!(self, Key::Symbol(symbol) if symbol.id == ITERATE_SYMBOL)
    }

    /// The integer index, if this key is one.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(index) => Some(*index),
            _ => None,
        }
    }

    /// The string name, if this key is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Key::Str(name) => Some(name),
            _ => None,
        }
    }
}

fn parse_index(name: &str) -> Option<usize> {
    let canonical = !name.is_empty()
        && name.bytes().all(|b| b.is_ascii_digit())
        && (name == "0" || !name.starts_with('0'));
    if canonical {
        name.parse().ok()
    } else {
        None
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        match parse_index(name) {
            Some(index) => Key::Index(index),
            None => Key::Str(Rc::from(name)),
        }
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::from(name.as_str())
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<Symbol> for Key {
    fn from(symbol: Symbol) -> Self {
        Key::Symbol(symbol)
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Str(name) => f.write_str(name),
            Key::Index(index) => write!(f, "{index}"),
            Key::Symbol(symbol) => write!(f, "{symbol:?}"),
        }
    }
}

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    /// Absence of a value.
    #[default]
    Undefined,
    /// Explicit null.
    Null,
    /// A boolean.
    Bool(bool),
    /// A number.
    Number(f64),
    /// An immutable string.
    Str(Rc<str>),
    /// A plain (non-reactive) object or array.
    Object(RawObject),
    /// A reactive or readonly proxy.
    Proxy(Reactive),
    /// A single-value reactive box.
    Ref(Ref),
}

impl Value {
    /// Whether the value is object-like (a raw object or a proxy).
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Proxy(_))
    }

    /// Whether the value is `Undefined` or `Null`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// JavaScript-style truthiness.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Object(_) | Value::Proxy(_) | Value::Ref(_) => true,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&RawObject> {
        match self {
            Value::Object(raw) => Some(raw),
            _ => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&Reactive> {
        match self {
            Value::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }

    pub fn as_ref(&self) -> Option<&Ref> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// Consume the value, returning the proxy it holds.
    pub fn into_proxy(self) -> Option<Reactive> {
        match self {
            Value::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }

    /// Consume the value, returning the ref it holds.
    pub fn into_ref(self) -> Option<Ref> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// Strip any proxy layers, returning the underlying raw object.
    ///
    /// Non-proxy values are returned as-is.
    pub fn to_raw(&self) -> Value {
        match self {
            Value::Proxy(proxy) => Value::Object(proxy.raw()),
            other => other.clone(),
        }
    }

    /// Identity/value comparison used for change detection.
    ///
    /// Numbers compare numerically except that `NaN` equals `NaN`; strings by
    /// content; objects, proxies, and refs by identity.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Proxy(a), Value::Proxy(b)) => a == b,
            (Value::Ref(a), Value::Ref(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Snapshot the value as JSON.
    ///
    /// Cyclic object graphs are not supported.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Largest length an array may have.
pub const MAX_ARRAY_LENGTH: usize = u32::MAX as usize;

/// Interpret a value as an array length: a non-negative integral number no
/// larger than [`MAX_ARRAY_LENGTH`].
pub(crate) fn array_length(value: &Value) -> Option<usize> {
    value
        .as_f64()
        .filter(|n| n.is_finite() && n.fract() == 0.0)
        .filter(|n| (0.0..=MAX_ARRAY_LENGTH as f64).contains(n))
        .map(|n| n as usize)
}

/// Pad `items` with `Undefined` up to `len`, failing instead of aborting
/// when the allocation cannot be made.
fn grow(items: &mut Vec<Value>, len: usize) -> Result<(), std::collections::TryReserveError> {
    items.try_reserve_exact(len.saturating_sub(items.len()))?;
    items.resize(len, Value::Undefined);
    Ok(())
}

/// Whether assigning `new` over `old` counts as a change.
pub(crate) fn has_changed(new: &Value, old: &Value) -> bool {
    !new.same_value(old)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Object(raw) => raw.fmt(f),
            Value::Proxy(proxy) => proxy.fmt(f),
            Value::Ref(r) => r.fmt(f),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<RawObject> for Value {
    fn from(raw: RawObject) -> Self {
        Value::Object(raw)
    }
}

impl From<Reactive> for Value {
    fn from(proxy: Reactive) -> Self {
        Value::Proxy(proxy)
    }
}

impl From<Ref> for Value {
    fn from(r: Ref) -> Self {
        Value::Ref(r)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                Value::Object(RawObject::from_values(items.into_iter().map(Value::from)))
            }
            serde_json::Value::Object(map) => Value::Object(RawObject::from_entries(
                map.into_iter().map(|(k, v)| (Key::from(k), Value::from(v))),
            )),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Undefined | Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => {
                // 2^53: the integer range an f64 represents exactly
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            Value::Str(s) => serializer.serialize_str(s),
            Value::Object(raw) => raw.serialize(serializer),
            Value::Proxy(proxy) => proxy.raw().serialize(serializer),
            Value::Ref(r) => r.peek().serialize(serializer),
        }
    }
}

pub(crate) enum RawData {
    Object(IndexMap<Key, Value>),
    Array(Vec<Value>),
}

struct RawInner {
    id: TargetId,
    data: RefCell<RawData>,
    skip: Cell<bool>,
}

impl Drop for RawInner {
    fn drop(&mut self) {
        Runtime::release_target(self.id);
    }
}

/// A plain, non-reactive object or array.
///
/// Reads and writes through a `RawObject` are never tracked and never
/// trigger effects; wrap it with [`reactive`](super::reactive) for that.
/// Dropping the last handle removes the target's entries from the runtime's
/// dependency registry and proxy cache.
#[derive(Clone)]
pub struct RawObject(Rc<RawInner>);

impl RawObject {
    fn with_data(data: RawData) -> Self {
        Self(Rc::new(RawInner {
            id: TargetId::next(),
            data: RefCell::new(data),
            skip: Cell::new(false),
        }))
    }

    /// Create an empty object.
    pub fn object() -> Self {
        Self::with_data(RawData::Object(IndexMap::new()))
    }

    /// Create an empty array.
    pub fn array() -> Self {
        Self::with_data(RawData::Array(Vec::new()))
    }

    /// Create an object from key/value pairs, in order.
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Key>,
        V: Into<Value>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::with_data(RawData::Object(map))
    }

    /// Create an array from values, in order.
    pub fn from_values<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::with_data(RawData::Array(values.into_iter().map(Into::into).collect()))
    }

    pub fn id(&self) -> TargetId {
        self.0.id
    }

    pub fn is_array(&self) -> bool {
        matches!(*self.0.data.borrow(), RawData::Array(_))
    }

    /// Number of elements (arrays) or own keys (objects).
    pub fn len(&self) -> usize {
        match &*self.0.data.borrow() {
            RawData::Object(map) => map.len(),
            RawData::Array(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Exclude this object from ever being wrapped in a proxy.
    pub fn mark_raw(&self) {
        self.0.skip.set(true);
    }

    pub fn is_marked_raw(&self) -> bool {
        self.0.skip.get()
    }

    /// Whether both handles refer to the same object.
    pub fn ptr_eq(&self, other: &RawObject) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn read(&self, key: &Key) -> Value {
        match &*self.0.data.borrow() {
            RawData::Object(map) => map.get(key).cloned().unwrap_or_default(),
            RawData::Array(items) => match key {
                Key::Index(index) => items.get(*index).cloned().unwrap_or_default(),
                key if key.is_length() => Value::from(items.len()),
                _ => Value::Undefined,
            },
        }
    }

    pub(crate) fn has_own(&self, key: &Key) -> bool {
        match &*self.0.data.borrow() {
            RawData::Object(map) => map.contains_key(key),
            RawData::Array(items) => match key {
                Key::Index(index) => *index < items.len(),
                key => key.is_length(),
            },
        }
    }

    /// Store a value. Array writes past the end pad with `Undefined`.
    pub(crate) fn write(&self, key: Key, value: Value) -> Result<(), ReactiveError> {
        let previous = match &mut *self.0.data.borrow_mut() {
            RawData::Object(map) => map.insert(key, value),
            RawData::Array(items) => {
                let Key::Index(index) = key else {
                    return Err(ReactiveError::InvalidArrayKey(key));
                };
                if index >= MAX_ARRAY_LENGTH {
                    return Err(ReactiveError::InvalidArrayKey(key));
                }
                if index >= items.len() && grow(items, index + 1).is_err() {
                    return Err(ReactiveError::InvalidArrayKey(key));
                }
                Some(std::mem::replace(&mut items[index], value))
            }
        };
        drop(previous);
        Ok(())
    }

    /// Truncate or extend an array. Returns the removed elements.
    pub(crate) fn set_length(&self, len: usize) -> Result<Vec<Value>, ReactiveError> {
        match &mut *self.0.data.borrow_mut() {
            RawData::Array(items) if len < items.len() => Ok(items.split_off(len)),
            RawData::Array(items) => {
                if len > MAX_ARRAY_LENGTH || grow(items, len).is_err() {
                    return Err(ReactiveError::InvalidArrayLength(Value::from(len)));
                }
                Ok(Vec::new())
            }
            RawData::Object(_) => Ok(Vec::new()),
        }
    }

    /// Remove a key. Array slots become holes (`Undefined`) and the length is
    /// unchanged.
    pub(crate) fn remove(&self, key: &Key) -> Option<Value> {
        match &mut *self.0.data.borrow_mut() {
            RawData::Object(map) => map.shift_remove(key),
            RawData::Array(items) => match key {
                Key::Index(index) if *index < items.len() => {
                    Some(std::mem::take(&mut items[*index]))
                }
                _ => None,
            },
        }
    }

    /// Own enumerable keys: insertion order for objects, indices for arrays.
    pub(crate) fn own_keys(&self) -> Vec<Key> {
        match &*self.0.data.borrow() {
            RawData::Object(map) => map.keys().cloned().collect(),
            RawData::Array(items) => (0..items.len()).map(Key::Index).collect(),
        }
    }

    pub(crate) fn values(&self) -> Vec<Value> {
        match &*self.0.data.borrow() {
            RawData::Object(map) => map.values().cloned().collect(),
            RawData::Array(items) => items.clone(),
        }
    }
}

impl ObjectAccess for RawObject {
    fn get(&self, key: impl Into<Key>) -> Value {
        self.read(&key.into())
    }

    fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        let key = key.into();
        let value: Value = value.into();
        if self.is_array() && key.is_length() {
            let Some(len) = array_length(&value) else {
                return false;
            };
            return self.set_length(len).is_ok();
        }
        self.write(key, value).is_ok()
    }

    fn has(&self, key: impl Into<Key>) -> bool {
        self.has_own(&key.into())
    }

    fn delete_key(&self, key: impl Into<Key>) -> bool {
        self.remove(&key.into()).is_some()
    }

    fn keys(&self) -> Vec<Key> {
        self.own_keys()
    }
}

impl PartialEq for RawObject {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for RawObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_array() { "Array" } else { "Object" };
        f.debug_struct(kind)
            .field("id", &self.0.id.raw())
            .field("len", &self.len())
            .finish()
    }
}

impl Serialize for RawObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &*self.0.data.borrow() {
            RawData::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            RawData::Object(map) => {
                let mut out = serializer.serialize_map(None)?;
                for (key, value) in map {
                    if matches!(key, Key::Symbol(_)) {
                        continue;
                    }
                    out.serialize_entry(&key.to_string(), value)?;
                }
                out.end()
            }
        }
    }
}
