//! Trellis Core
//!
//! This crate provides the core runtime for the Trellis UI framework.
//! It implements:
//!
//! - Reactive primitives (proxies, refs, effects) with automatic
//!   dependency tracking
//! - DOM event binding with stable per-element invokers
//! - A tick clock and microtask queue driven by the host
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: proxies, refs, effects, and dependency tracking
//! - `dom`: event listener patching against a host DOM
//! - `scheduler`: microtasks, the tick clock, and the batched job queue
//! - `error`, `config`: error taxonomy and runtime configuration
//!
//! All state is per thread; see [`Runtime`].
//!
//! # Example
//!
//! ```rust
//! use trellis_core::reactive::{effect, reactive, EffectOptions};
//! use serde_json::json;
//!
//! let state = reactive(json!({"count": 0})).into_proxy().unwrap();
//!
//! let s = state.clone();
//! let runner = effect(
//!     move || println!("count: {:?}", s.get("count")),
//!     EffectOptions::default(),
//! );
//!
//! // The effect re-runs and prints "count: 1".
//! state.set("count", 1);
//! runner.stop();
//! ```

pub mod config;
pub mod dom;
pub mod error;
pub mod reactive;
pub mod scheduler;
pub mod shared;

mod runtime;

pub use config::RuntimeConfig;
pub use runtime::Runtime;
