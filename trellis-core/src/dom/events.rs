//! Event Patching
//!
//! [`patch_event`] is what a renderer calls when an element's `onXxx`
//! property changes between renders.
//!
//! | bound before | bound after | effect                                   |
//! |--------------|-------------|------------------------------------------|
//! | no           | yes         | create an invoker, add the native listener |
//! | yes          | yes         | swap the invoker's handlers in place     |
//! | yes          | no          | remove the native listener, clear the slot |
//! | no           | no          | nothing                                  |
//!
//! An empty handler list counts as "not bound".

use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;
use tracing::debug;

use super::element::{Element, Event, ListenerOptions};
use super::invoker::Invoker;
use crate::error::HandlerResult;
use crate::shared::hyphenate;

/// A user event handler.
pub type Handler = Rc<dyn Fn(&mut Event<'_>) -> HandlerResult>;

/// Wrap a closure as a [`Handler`].
pub fn handler(f: impl Fn(&mut Event<'_>) -> HandlerResult + 'static) -> Handler {
    Rc::new(f)
}

/// The handlers bound to one event name.
#[derive(Clone)]
pub enum EventValue {
    Single(Handler),
    List(SmallVec<[Handler; 2]>),
}

impl EventValue {
    pub fn single(handler: Handler) -> Self {
        EventValue::Single(handler)
    }

    pub fn list(handlers: impl IntoIterator<Item = Handler>) -> Self {
        EventValue::List(handlers.into_iter().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        match self {
            EventValue::Single(_) => 1,
            EventValue::List(handlers) => handlers.len(),
        }
    }
}

impl From<Handler> for EventValue {
    fn from(handler: Handler) -> Self {
        EventValue::Single(handler)
    }
}

impl fmt::Debug for EventValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventValue::Single(_) => f.write_str("EventValue::Single"),
            EventValue::List(handlers) => write!(f, "EventValue::List({})", handlers.len()),
        }
    }
}

/// Bind, rebind, or unbind the handlers for `raw_name` on `el`.
///
/// `None` or an empty list unbinds.
pub fn patch_event<E: Element + ?Sized>(el: &E, raw_name: &str, next: Option<EventValue>) {
    let next = next.filter(|value| !value.is_empty());
    let cache = match (&next, el.invoker_slot().get()) {
        (None, None) => return,
        (None, Some(cache)) => cache,
        (Some(_), _) => el.invoker_cache(),
    };

    match (next, cache.get(raw_name)) {
        (Some(value), Some(existing)) => existing.set_value(value),
        (Some(value), None) => {
            let (name, options) = parse_name(raw_name);
            let invoker = Invoker::new(value);
            cache.insert(raw_name, invoker.clone());
            debug!(raw_name, event = %name, attached = invoker.attached(), "attach listener");
            el.add_event_listener(&name, &invoker, options.as_ref());
        }
        (None, Some(existing)) => {
            let (name, options) = parse_name(raw_name);
            debug!(raw_name, event = %name, "detach listener");
            el.remove_event_listener(&name, &existing, options.as_ref());
            cache.remove(raw_name);
        }
        (None, None) => {}
    }
}

const MODIFIERS: [&str; 3] = ["Once", "Passive", "Capture"];

/// Split a raw event property name into the native event name and its
/// listener options.
///
/// `"on:my-event"` keeps everything after the colon verbatim; `"onClick"`
/// hyphenates the rest (`"onDoubleClick"` → `"double-click"`). Option
/// suffixes such as `Once` are not supported: they stay part of the name
/// and the options are always `None`.
pub fn parse_name(raw_name: &str) -> (String, Option<ListenerOptions>) {
    if let Some(modifier) = MODIFIERS.iter().find(|m| raw_name.ends_with(**m)) {
        debug!(raw_name, modifier, "listener option modifiers are not supported");
    }

    let rest = raw_name
        .char_indices()
        .nth(2)
        .map_or("", |(index, _)| &raw_name[index..]);
    let name = match rest.strip_prefix(':') {
        Some(verbatim) => verbatim.to_owned(),
        None => hyphenate(rest),
    };
    (name, None)
}
