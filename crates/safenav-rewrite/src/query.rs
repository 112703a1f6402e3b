//! Query proxy that defers to a `RewriteProvider`.

use std::any::Any;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use safenav_core::error::Result;
use safenav_core::expr::Expr;
use safenav_core::query::{execute_sequence, QueryProvider, QueryRef, Queryable};
use safenav_core::types::Type;
use safenav_core::value::Value;

use crate::provider::RewriteProvider;
use crate::rewriter::ExprRewriter;

/// Facade over another query.
///
/// Element type and expression are copied from the wrapped query as-is;
/// rewriting waits for execution. The realized sequence is computed at most
/// once, even when several threads enumerate at the same time. A failed
/// realization is not remembered and the next `enumerate` tries again.
pub struct RewriteQuery {
    element_type: Type,
    expression: Expr,
    provider: Arc<RewriteProvider>,
    ordered: bool,
    realized: OnceCell<Arc<Vec<Value>>>,
}

impl RewriteQuery {
    fn with_ordering(inner: &QueryRef, rewriter: Arc<dyn ExprRewriter>, ordered: bool) -> Self {
        Self {
            element_type: inner.element_type().clone(),
            expression: inner.expression().clone(),
            provider: Arc::new(RewriteProvider::new(inner.provider(), rewriter)),
            ordered,
            realized: OnceCell::new(),
        }
    }

    pub fn plain(inner: &QueryRef, rewriter: Arc<dyn ExprRewriter>) -> Self {
        Self::with_ordering(inner, rewriter, false)
    }

    /// Variant carrying the ordered capability.
    pub fn ordered(inner: &QueryRef, rewriter: Arc<dyn ExprRewriter>) -> Self {
        Self::with_ordering(inner, rewriter, true)
    }

    /// A proxy over the same inner query with `rewriter` in place of this
    /// one's. The new proxy talks to the inner provider directly, so rewrite
    /// layers never stack.
    pub fn rebuilt(&self, rewriter: Arc<dyn ExprRewriter>, ordered: bool) -> Self {
        Self {
            element_type: self.element_type.clone(),
            expression: self.expression.clone(),
            provider: Arc::new(RewriteProvider::new(
                Arc::clone(self.provider.inner()),
                rewriter,
            )),
            ordered,
            realized: OnceCell::new(),
        }
    }

    pub fn rewriter_name(&self) -> &'static str {
        self.provider.rewriter().name()
    }

    pub fn rewriter_key(&self) -> String {
        self.provider.rewriter().key()
    }

    /// Whether the sequence has already been materialized.
    pub fn is_realized(&self) -> bool {
        self.realized.get().is_some()
    }
}

impl Queryable for RewriteQuery {
    fn element_type(&self) -> &Type {
        &self.element_type
    }

    fn expression(&self) -> &Expr {
        &self.expression
    }

    fn provider(&self) -> Arc<dyn QueryProvider> {
        self.provider.clone()
    }

    fn is_ordered(&self) -> bool {
        self.ordered
    }

    fn enumerate(&self) -> Result<Arc<Vec<Value>>> {
        self.realized
            .get_or_try_init(|| {
                #[cfg(feature = "tracing")]
                tracing::trace!(rewriter = self.rewriter_name(), "realizing rewritten query");
                execute_sequence(self.provider.as_ref(), &self.expression)
            })
            .map(Arc::clone)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
