#![forbid(unsafe_code)]
//! safenav-core: typed expression trees, runtime values, and the
//! queryable/provider contract shared by the rewriter and query engines.
//!
//! Design:
//! - `Expr` is an immutable `Arc` handle; rewriting shares untouched subtrees.
//! - `Type` is a small closed model: value types with a zero value, reference
//!   types whose zero value is `Value::Null`, and the list-like shapes.
//! - `Queryable`/`QueryProvider` are the seams a query engine implements.
//!
//! NOTE: no I/O, no async, no execution here.

pub mod config;
pub mod error;
pub mod expr;
pub mod hash;
pub mod prelude;
pub mod query;
pub mod types;
pub mod value;

pub use error::{Error, Result};
