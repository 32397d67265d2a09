//! Trellis Core
//!
//! This crate provides fine-grained reactive state tracking. It implements:
//!
//! - Reactive wrappers around plain property bags (deep and shallow, mutable
//!   and readonly)
//! - Refs for standalone tracked values
//! - Lazily recomputed, cached computed values
//! - Effects that re-run whenever the data they read changes
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `data`: The dynamic `Value` model and the raw `Object` property bag
//! - `reactive`: Wrappers, refs, computed values, effects and the runtime
//! - `graph`: The dependency graph (`target → key → subscribers`)
//!
//! Everything is scoped to a `Runtime`. The free functions re-exported here
//! (`reactive`, `effect`, `create_ref`, ...) use a thread-local default
//! runtime; create your own with `Runtime::new()` for isolation.
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_core::{computed, effect, reactive, Object};
//!
//! // Wrap a plain object
//! let product = reactive([("price", 5), ("quantity", 2)].into_iter().collect::<Object>());
//!
//! // Derive a value from it
//! let p = product.clone();
//! let total = computed(move || {
//!     p.get("price").as_i64().unwrap_or(0) * p.get("quantity").as_i64().unwrap_or(0)
//! });
//!
//! // React to changes
//! effect(move || println!("total: {}", total.get()));
//!
//! // Update the object
//! product.set("quantity", 3);
//! // Effect automatically runs, prints: "total: 15"
//! ```

pub mod data;
pub mod reactive;

mod config;
mod error;
mod graph;

pub use config::Config;
pub use data::{Key, Object, ObjectId, Value};
pub use error::{Error, Result};
pub use reactive::{
    computed, create_ref, effect, is_proxy, is_reactive, is_readonly, is_ref, reactive, readonly,
    shallow_reactive, shallow_readonly, to_raw, un_ref, Computed, Effect, IntoTarget, MaybeRef,
    Proxy, ProxyKind, ReactiveFlag, Ref, Runtime, SubscriberId, Target,
};
