//! Error types.
//!
//! The reactive core is permissive: missing dependency records and writes to
//! readonly wrappers are not errors on the default paths. These variants back
//! the opt-in strict APIs (`Proxy::try_set`) and value conversions.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("cannot set `{key}`: target is readonly")]
    ReadonlyWrite { key: String },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}
