//! Plain Data
//!
//! Reactive wrappers need something to wrap. This module provides a small
//! dynamic data model: shared, identity-carrying objects holding ordered
//! properties, and the `Value` enum stored in those properties.
//!
//! Objects are compared by identity, never by contents. Two objects with the
//! same properties are still two different dependency targets.

mod object;
mod value;

pub use object::{Key, Object, ObjectId, WeakObject};
pub use value::Value;
