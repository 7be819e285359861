//! Capabilities the event layer needs from a host DOM.

use std::cell::OnceCell;

use super::invoker::{Invoker, InvokerCache};

/// A native event as dispatched by the host.
pub trait NativeEvent {
    fn event_type(&self) -> &str;

    /// Dispatch timestamp in milliseconds, if the host set one.
    fn time_stamp(&self) -> Option<f64>;

    fn set_time_stamp(&mut self, time_stamp: f64);

    /// Prevent other native listeners from seeing this event.
    fn stop_immediate_propagation(&mut self);
}

/// The event as seen by handlers.
///
/// Wraps the native event with a `stopped` flag so that stopping immediate
/// propagation also skips the remaining handlers bound to the same invoker.
pub struct Event<'a> {
    native: &'a mut dyn NativeEvent,
    stopped: bool,
}

impl<'a> Event<'a> {
    pub fn new(native: &'a mut dyn NativeEvent) -> Self {
        Self {
            native,
            stopped: false,
        }
    }

    pub fn event_type(&self) -> &str {
        self.native.event_type()
    }

    pub fn time_stamp(&self) -> Option<f64> {
        self.native.time_stamp()
    }

    pub fn stop_immediate_propagation(&mut self) {
        self.stopped = true;
        self.native.stop_immediate_propagation();
    }

    pub fn is_immediate_propagation_stopped(&self) -> bool {
        self.stopped
    }

    pub fn native(&self) -> &(dyn NativeEvent + 'a) {
        &*self.native
    }

    pub fn native_mut(&mut self) -> &mut (dyn NativeEvent + 'a) {
        &mut *self.native
    }
}

/// Options passed to the host's `addEventListener`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    pub once: bool,
    pub passive: bool,
    pub capture: bool,
}

/// A host element that event listeners can be bound to.
///
/// The element owns an empty slot for its [`InvokerCache`], which is filled
/// the first time a handler is bound. The slot must not be exposed as an
/// ordinary property of the element.
pub trait Element {
    fn invoker_slot(&self) -> &OnceCell<InvokerCache>;

    /// The element's invoker cache, created on first use.
    fn invoker_cache(&self) -> &InvokerCache {
        self.invoker_slot().get_or_init(InvokerCache::new)
    }

    fn add_event_listener(&self, name: &str, invoker: &Invoker, options: Option<&ListenerOptions>);

    fn remove_event_listener(&self, name: &str, invoker: &Invoker, options: Option<&ListenerOptions>);
}
