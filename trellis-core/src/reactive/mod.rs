//! Reactive Primitives
//!
//! This module implements the reactive system: reactive objects, refs,
//! computed values and effects, all coordinated by a `Runtime`.
//!
//! # Concepts
//!
//! ## Reactive Objects
//!
//! `reactive(obj)` returns a `Proxy` around a raw `Object`. Reading a
//! property through the proxy inside an effect subscribes the effect to that
//! property; writing a different value through the proxy re-runs every
//! subscriber. Readonly and shallow variants exist for state that must not
//! change or whose nested objects should stay raw.
//!
//! ## Refs
//!
//! A `Ref` is a single tracked value, for state that is not naturally a
//! property of an object.
//!
//! ## Computed Values
//!
//! A `Computed` caches a derived value. It re-evaluates lazily, on the first
//! read after one of its dependencies changed.
//!
//! ## Effects
//!
//! An `Effect` is a computation that re-runs whenever its dependencies change.
//! Effects synchronize reactive state with everything else.
//!
//! # Implementation Notes
//!
//! Dependencies are discovered automatically. While an effect runs it sits on
//! top of the runtime's context stack, and every tracked read records the
//! effect in the dependency set of the property (or ref) being read. Nested
//! effect runs push and pop, so the outer effect keeps collecting afterwards.

mod computed;
mod context;
mod effect;
mod proxy;
mod refs;
mod runtime;
mod subscriber;

pub use computed::{computed, Computed};
pub use effect::{effect, Effect};
pub use proxy::{
    is_proxy, is_reactive, is_readonly, reactive, readonly, shallow_reactive, shallow_readonly,
    to_raw, IntoTarget, Proxy, ProxyKind, ReactiveFlag, Target,
};
pub use refs::{create_ref, is_ref, un_ref, MaybeRef, Ref};
pub use runtime::Runtime;
pub use subscriber::SubscriberId;

pub(crate) use runtime::WeakRuntime;
pub(crate) use subscriber::Subscriber;

#[cfg(test)]
pub(crate) use subscriber::mock as tests_support;
