//! Provider decorator that rewrites trees right before execution.

use std::sync::Arc;

use safenav_core::error::Result;
use safenav_core::expr::Expr;
use safenav_core::query::{QueryProvider, QueryRef};
use safenav_core::types::Type;
use safenav_core::value::Value;

use crate::rewriter::ExprRewriter;

/// Wraps the real provider.
///
/// - `create_query` never rewrites; it re-wraps whatever the inner provider
///   builds so every derived query stays protected.
/// - `execute` is the only place a tree is rewritten. Inner failures are
///   returned unchanged.
pub struct RewriteProvider {
    inner: Arc<dyn QueryProvider>,
    rewriter: Arc<dyn ExprRewriter>,
}

impl RewriteProvider {
    pub fn new(inner: Arc<dyn QueryProvider>, rewriter: Arc<dyn ExprRewriter>) -> Self {
        Self { inner, rewriter }
    }

    pub fn rewriter(&self) -> &Arc<dyn ExprRewriter> {
        &self.rewriter
    }

    pub fn inner(&self) -> &Arc<dyn QueryProvider> {
        &self.inner
    }
}

impl QueryProvider for RewriteProvider {
    fn create_query(&self, expression: Expr, element_type: Type) -> Result<QueryRef> {
        let query = self.inner.create_query(expression, element_type)?;
        let ordered = query.is_ordered();
        Ok(crate::wrap(&query, Arc::clone(&self.rewriter), ordered))
    }

    fn execute(&self, expression: &Expr) -> Result<Value> {
        let rewritten = self.rewriter.rewrite(expression);

        #[cfg(feature = "tracing")]
        if let (Ok(before), Ok(after)) = (
            safenav_core::hash::fingerprint(expression),
            safenav_core::hash::fingerprint(&rewritten),
        ) {
            tracing::debug!(
                rewriter = self.rewriter.name(),
                before = %before.short(),
                after = %after.short(),
                nodes = rewritten.node_count(),
                "rewrote query tree"
            );
        }

        self.inner.execute(&rewritten)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use safenav_core::error::Error;
    use safenav_exec::MemoryProvider;

    use crate::nullsafe::NullsafeRewriter;

    /// Records every tree it is asked to execute, then fails.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl QueryProvider for Recorder {
        fn create_query(&self, _expression: Expr, _element_type: Type) -> Result<QueryRef> {
            Err(Error::Unsupported("recorder builds no queries".into()))
        }

        fn execute(&self, expression: &Expr) -> Result<Value> {
            self.seen
                .lock()
                .expect("recorder lock")
                .push(expression.to_string());
            Err(Error::Unsupported("recorder executes nothing".into()))
        }
    }

    #[test]
    fn execute_hands_the_rewritten_tree_to_the_inner_provider() {
        let recorder = Arc::new(Recorder::default());
        let provider = RewriteProvider::new(recorder.clone(), Arc::new(NullsafeRewriter::new()));
        let e = Expr::parameter("a", Type::record("A")).field("n", Type::Int32);

        let err = provider.execute(&e).unwrap_err();
        assert_eq!(err, Error::Unsupported("recorder executes nothing".into()));

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(
            seen.as_slice(),
            ["((a == default(A)) ? default(i32) : a.n)".to_string()]
        );
    }

    #[test]
    fn create_query_failures_propagate() {
        let provider = RewriteProvider::new(
            Arc::new(Recorder::default()),
            Arc::new(NullsafeRewriter::new()),
        );
        let err = provider
            .create_query(Expr::int32(1), Type::Int32)
            .err()
            .expect("inner provider refuses");
        assert!(matches!(err, Error::Unsupported(_)));
    }

    #[test]
    fn derived_queries_are_wrapped_again() {
        let provider = RewriteProvider::new(
            Arc::new(MemoryProvider::new()),
            Arc::new(NullsafeRewriter::new()),
        );
        let source = Expr::constant(Value::seq(vec![Value::Int32(1)]), Type::sequence(Type::Int32))
            .unwrap();
        let query = provider.create_query(source, Type::Int32).unwrap();
        assert!(query
            .as_any()
            .downcast_ref::<crate::query::RewriteQuery>()
            .is_some());
    }
}
