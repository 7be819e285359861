//! Error types and the runtime error channel.
//!
//! Programming errors on reactive data ([`ReactiveError`]) are returned to
//! the caller. Failures inside user callbacks the runtime invokes on its own
//! (event handlers, queued jobs) cannot be returned to anyone, so they are
//! reported through a per-thread channel instead: a handler installed with
//! [`set_error_handler`], or `tracing::error!` when none is installed.

use std::cell::RefCell;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use tracing::error;

use crate::dom::{Event, Handler};
use crate::reactive::{Key, TriggerOp, Value};
use crate::runtime::Runtime;

/// Errors from operations on reactive targets.
#[derive(Debug, thiserror::Error)]
pub enum ReactiveError {
    /// A write or delete through a readonly proxy.
    #[error("{op} operation on key \"{key}\" failed: target is readonly")]
    ReadonlyViolation { key: Key, op: TriggerOp },

    /// An array length that is not a non-negative integer.
    #[error("invalid array length: {0:?}")]
    InvalidArrayLength(Value),

    /// A non-index, non-length key written to an array.
    #[error("invalid array key: {0}")]
    InvalidArrayKey(Key),

    /// An array operation on a plain object.
    #[error("target is not an array")]
    NotAnArray,
}

/// Where a reported failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NativeEventHandler,
    Scheduler,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorCode::NativeEventHandler => "native event handler",
            ErrorCode::Scheduler => "scheduler flush",
        })
    }
}

/// Error returned by a failing event handler.
pub type HandlerFailure = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type HandlerResult = Result<(), HandlerFailure>;

/// Failures reported through the error channel.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("unhandled error during execution of {code}: {source}")]
    Handler {
        code: ErrorCode,
        #[source]
        source: HandlerFailure,
    },

    /// A job kept re-queueing itself within one flush.
    #[error("maximum recursive updates exceeded ({limit}) during {code}")]
    RecursionLimit { code: ErrorCode, limit: usize },

    /// A callback the runtime invoked panicked.
    #[error("panic during execution of {code}: {message}")]
    Panicked { code: ErrorCode, message: String },
}

impl RuntimeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RuntimeError::Handler { code, .. }
            | RuntimeError::RecursionLimit { code, .. }
            | RuntimeError::Panicked { code, .. } => *code,
        }
    }
}

/// Errors loading a [`RuntimeConfig`](crate::RuntimeConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid runtime configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
}

type ErrorHook = Rc<dyn Fn(&RuntimeError)>;

#[derive(Default)]
pub(crate) struct ErrorChannel {
    hook: RefCell<Option<ErrorHook>>,
}

impl ErrorChannel {
    fn report(&self, err: RuntimeError) {
        let hook = self.hook.borrow().clone();
        match hook {
            Some(hook) => hook(&err),
            None => error!(code = %err.code(), "{err}"),
        }
    }
}

/// Route reported failures to `hook` instead of the log.
pub fn set_error_handler(hook: impl Fn(&RuntimeError) + 'static) {
    let hook: ErrorHook = Rc::new(hook);
    Runtime::with(|rt| *rt.errors.hook.borrow_mut() = Some(hook));
}

/// Restore logging of reported failures.
pub fn clear_error_handler() {
    let previous = Runtime::with(|rt| rt.errors.hook.borrow_mut().take());
    drop(previous);
}

/// Report a failure that has no caller to return to.
pub fn report_error(err: RuntimeError) {
    Runtime::with(|rt| rt.errors.report(err));
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// Call each handler with `event`, reporting failures instead of returning
/// them. Returned errors and panics are both reported; a failing handler
/// does not prevent the next one from running.
pub fn call_with_async_error_handling(handlers: &[Handler], event: &mut Event<'_>, code: ErrorCode) {
    for handler in handlers {
        match panic::catch_unwind(AssertUnwindSafe(|| handler(&mut *event))) {
            Ok(Ok(())) => {}
            Ok(Err(source)) => report_error(RuntimeError::Handler { code, source }),
            Err(payload) => report_error(RuntimeError::Panicked {
                code,
                message: panic_message(payload.as_ref()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Key;

    #[test]
    fn error_display() {
        let err = ReactiveError::ReadonlyViolation {
            key: Key::from("count"),
            op: TriggerOp::Set,
        };
        assert_eq!(
            err.to_string(),
            "set operation on key \"count\" failed: target is readonly"
        );

        let err = RuntimeError::RecursionLimit {
            code: ErrorCode::Scheduler,
            limit: 100,
        };
        assert_eq!(
            err.to_string(),
            "maximum recursive updates exceeded (100) during scheduler flush"
        );
    }

    #[test]
    fn reports_reach_the_installed_handler() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        set_error_handler(move |err| sink.borrow_mut().push(err.code()));

        report_error(RuntimeError::RecursionLimit {
            code: ErrorCode::Scheduler,
            limit: 1,
        });
        assert_eq!(*seen.borrow(), vec![ErrorCode::Scheduler]);

        clear_error_handler();
        report_error(RuntimeError::Handler {
            code: ErrorCode::NativeEventHandler,
            source: "boom".into(),
        });
        assert_eq!(seen.borrow().len(), 1);
    }
}
