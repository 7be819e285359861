//! DOM Event Binding
//!
//! Keeps native event listeners in sync with the handlers a renderer binds
//! through `onXxx` properties. The host DOM is reached only through the
//! [`Element`] and [`NativeEvent`] traits.

mod element;
mod events;
mod invoker;

pub use element::{Element, Event, ListenerOptions, NativeEvent};
pub use events::{handler, parse_name, patch_event, EventValue, Handler};
pub use invoker::{Invoker, InvokerCache};
