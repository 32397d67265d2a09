//! Dependency Graph
//!
//! This module holds the bookkeeping that connects reactive sources to the
//! computations reading them.
//!
//! # Overview
//!
//! - A `Dep` is a set of subscribers. Every tracked property, ref and
//!   computed value owns one.
//! - The `TargetMap` finds the `Dep` of a `(target, key)` pair. It is keyed by
//!   object identity and never keeps an object alive.
//!
//! Subscribers hold weak back-references to the sets they joined. Stopping a
//! subscriber walks those back-references and removes it from each set, so
//! cleanup is proportional to the number of dependencies rather than to the
//! size of the graph.

mod dep;
mod target;

pub(crate) use dep::{Dep, DepId};
pub(crate) use target::TargetMap;
