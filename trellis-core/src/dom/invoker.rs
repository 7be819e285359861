//! Invokers
//!
//! An invoker is the one native listener registered per (element, event
//! name). Handler updates replace its value in place, so the host never sees
//! listener churn while a handler stays bound.
//!
//! Every invoker records the tick it was attached in. An event stamped
//! before that tick was dispatched before this binding existed (typically a
//! listener attached by a reactive update that the same event caused) and
//! is dropped.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use super::element::{Event, NativeEvent};
use super::events::EventValue;
use crate::error::{call_with_async_error_handling, ErrorCode};
use crate::runtime::Runtime;
use crate::scheduler::{get_now, wall_clock_now};

struct InvokerInner {
    value: RefCell<EventValue>,
    attached: f64,
}

/// A stable native listener dispatching to the currently bound handlers.
///
/// Clones are the same invoker.
#[derive(Clone)]
pub struct Invoker(Rc<InvokerInner>);

impl Invoker {
    /// Create an invoker attached at the current tick.
    pub fn new(value: EventValue) -> Self {
        Self(Rc::new(InvokerInner {
            value: RefCell::new(value),
            attached: get_now(),
        }))
    }

    pub fn attached(&self) -> f64 {
        self.0.attached
    }

    pub fn value(&self) -> EventValue {
        self.0.value.borrow().clone()
    }

    pub fn set_value(&self, value: EventValue) {
        let previous = self.0.value.replace(value);
        drop(previous);
    }

    pub fn ptr_eq(&self, other: &Invoker) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Handle a native event.
    pub fn invoke(&self, native: &mut dyn NativeEvent) {
        match native.time_stamp() {
            None => native.set_time_stamp(wall_clock_now()),
            Some(time_stamp) if time_stamp < self.attached() => {
                if Runtime::with(|rt| rt.config().stale_event_check) {
                    return;
                }
            }
            Some(_) => {}
        }

        // Snapshot so handlers can rebind this invoker while it runs.
        let value = self.value();
        trace!(event = native.event_type(), handlers = value.len(), "invoke");
        let mut event = Event::new(native);
        match &value {
            EventValue::Single(handler) => call_with_async_error_handling(
                std::slice::from_ref(handler),
                &mut event,
                ErrorCode::NativeEventHandler,
            ),
            EventValue::List(handlers) => {
                for handler in handlers {
                    if event.is_immediate_propagation_stopped() {
                        break;
                    }
                    call_with_async_error_handling(
                        std::slice::from_ref(handler),
                        &mut event,
                        ErrorCode::NativeEventHandler,
                    );
                }
            }
        }
    }
}

impl fmt::Debug for Invoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invoker")
            .field("attached", &self.0.attached)
            .field("handlers", &self.0.value.borrow().len())
            .finish()
    }
}

/// Per-element map from raw event name to its invoker.
#[derive(Default)]
pub struct InvokerCache {
    invokers: RefCell<HashMap<String, Invoker>>,
}

impl InvokerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, raw_name: &str) -> Option<Invoker> {
        self.invokers.borrow().get(raw_name).cloned()
    }

    pub(crate) fn insert(&self, raw_name: &str, invoker: Invoker) {
        let previous = self.invokers.borrow_mut().insert(raw_name.to_owned(), invoker);
        drop(previous);
    }

    pub(crate) fn remove(&self, raw_name: &str) -> Option<Invoker> {
        self.invokers.borrow_mut().remove(raw_name)
    }

    pub fn len(&self) -> usize {
        self.invokers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw names with a bound invoker, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.invokers.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for InvokerCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvokerCache").field("names", &self.names()).finish()
    }
}
