#![forbid(unsafe_code)]
//! safenav-rewrite: wrap any query so its expression tree is rewritten right
//! before execution, and the null-safe member-access rewrite built on it.
//!
//! Design:
//! - One provider/proxy pair (`RewriteProvider`, `RewriteQuery`) is
//!   parameterized by an `ExprRewriter`; null safety is one instance.
//! - Composition on a wrapped query goes through `RewriteProvider`, which
//!   wraps every derived query again, so protection survives any chain of
//!   filter/select/order calls.
//! - The tree is rewritten on execution only, once per realization.
//!
//! ```ignore
//! let safe = to_nullsafe(Some(&query))?;
//! let rows = safe.to_list()?;
//! ```

use std::sync::Arc;

use safenav_core::config::RewriteConfig;
use safenav_core::error::{Error, Result};
use safenav_core::query::{QueryRef, Queryable, TypedQuery};
use safenav_core::value::FromValue;

pub mod fallback;
pub mod nullsafe;
pub mod provider;
pub mod query;
pub mod rewriter;

pub use fallback::default_for;
pub use nullsafe::NullsafeRewriter;
pub use provider::RewriteProvider;
pub use query::RewriteQuery;
pub use rewriter::{walk, ExprRewriter, FnRewriter};

/// Wrap `query`, picking the ordered variant when asked to.
///
/// A query already wrapped by a rewriter with the same key is returned
/// as-is, so converting twice never guards twice. A proxy of the same
/// rewrite family with a different key (or missing the ordered capability)
/// is rebuilt over its inner provider instead of being wrapped again.
pub(crate) fn wrap(query: &QueryRef, rewriter: Arc<dyn ExprRewriter>, ordered: bool) -> QueryRef {
    if let Some(existing) = query.as_any().downcast_ref::<RewriteQuery>() {
        if existing.rewriter_name() == rewriter.name() {
            if existing.rewriter_key() == rewriter.key() && (existing.is_ordered() || !ordered) {
                return Arc::clone(query);
            }
            let ordered = ordered || existing.is_ordered();
            return Arc::new(existing.rebuilt(rewriter, ordered));
        }
    }

    if ordered {
        Arc::new(RewriteQuery::ordered(query, rewriter))
    } else {
        Arc::new(RewriteQuery::plain(query, rewriter))
    }
}

/// Wrap `query` with `rewriter`; the ordered capability is carried over.
pub fn rewrite(query: Option<&QueryRef>, rewriter: Option<Arc<dyn ExprRewriter>>) -> Result<QueryRef> {
    let query = query.ok_or(Error::MissingArgument("query"))?;
    let rewriter = rewriter.ok_or(Error::MissingArgument("rewriter"))?;
    Ok(wrap(query, rewriter, query.is_ordered()))
}

/// Wrap an ordered `query` with `rewriter` as an ordered query.
///
/// Fails with `Error::NotOrdered` when `query` does not report the ordered
/// capability.
pub fn rewrite_ordered(
    query: Option<&QueryRef>,
    rewriter: Option<Arc<dyn ExprRewriter>>,
) -> Result<QueryRef> {
    let query = query.ok_or(Error::MissingArgument("query"))?;
    let rewriter = rewriter.ok_or(Error::MissingArgument("rewriter"))?;
    if !query.is_ordered() {
        return Err(Error::NotOrdered);
    }
    Ok(wrap(query, rewriter, true))
}

fn nullsafe_rewriter(config: RewriteConfig) -> Arc<dyn ExprRewriter> {
    Arc::new(NullsafeRewriter::with_config(config))
}

/// Make member-access chains in `query` null-safe.
pub fn to_nullsafe(query: Option<&QueryRef>) -> Result<QueryRef> {
    rewrite(query, Some(nullsafe_rewriter(RewriteConfig::default())))
}

/// `to_nullsafe` with an explicit rewrite configuration.
pub fn to_nullsafe_with(query: Option<&QueryRef>, config: RewriteConfig) -> Result<QueryRef> {
    rewrite(query, Some(nullsafe_rewriter(config)))
}

/// `to_nullsafe` for an ordered query; `Error::NotOrdered` otherwise.
pub fn to_nullsafe_ordered(query: Option<&QueryRef>) -> Result<QueryRef> {
    rewrite_ordered(query, Some(nullsafe_rewriter(RewriteConfig::default())))
}

/// Element-typed `to_nullsafe`.
pub fn to_nullsafe_typed<T: FromValue>(query: Option<&TypedQuery<T>>) -> Result<TypedQuery<T>> {
    let query = query.ok_or(Error::MissingArgument("query"))?;
    to_nullsafe(Some(query.query())).map(TypedQuery::new)
}

/// Method-style conversions for values that are known to be present.
pub trait NullsafeExt: Sized {
    fn nullsafe(&self) -> Self;
    fn rewrite_with(&self, rewriter: Arc<dyn ExprRewriter>) -> Self;
}

impl NullsafeExt for QueryRef {
    fn nullsafe(&self) -> Self {
        wrap(self, nullsafe_rewriter(RewriteConfig::default()), self.is_ordered())
    }

    fn rewrite_with(&self, rewriter: Arc<dyn ExprRewriter>) -> Self {
        wrap(self, rewriter, self.is_ordered())
    }
}

impl<T: FromValue> NullsafeExt for TypedQuery<T> {
    fn nullsafe(&self) -> Self {
        TypedQuery::new(self.query().nullsafe())
    }

    fn rewrite_with(&self, rewriter: Arc<dyn ExprRewriter>) -> Self {
        TypedQuery::new(self.query().rewrite_with(rewriter))
    }
}
