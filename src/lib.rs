#![forbid(unsafe_code)]
//! safenav: null-safe member-access rewriting for composable queries.
//!
//! Umbrella crate over the workspace members:
//! - `safenav-core`: expression trees, values, the queryable/provider contract.
//! - `safenav-rewrite`: rewriters and the rewrite-on-execute query proxy.
//! - `safenav-exec`: the in-memory query engine.


pub use safenav_core::prelude::*;
pub use safenav_exec::{MemoryProvider, MemoryQuery};
pub use safenav_rewrite::{
    rewrite, rewrite_ordered, to_nullsafe, to_nullsafe_ordered, to_nullsafe_typed,
    to_nullsafe_with, ExprRewriter, FnRewriter, NullsafeExt, NullsafeRewriter,
};
