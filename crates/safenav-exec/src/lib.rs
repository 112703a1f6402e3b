#![forbid(unsafe_code)]
//! safenav-exec: an in-memory query engine for safenav expression trees.
//!
//! `MemoryProvider` evaluates trees directly against `Value`s with the same
//! failure behavior a real backend has for unguarded member chains, which
//! makes it the reference engine for the rewrite crate's tests.
//!
//! Design:
//! - `runtime::Engine` is a recursive evaluator with a depth ceiling.
//! - `MemoryQuery` never caches; every `enumerate` executes its tree again.

pub mod metrics;
pub mod provider;
pub mod runtime;

pub use provider::{MemoryProvider, MemoryQuery};
pub use runtime::Engine;
