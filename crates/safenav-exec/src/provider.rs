//! `QueryProvider`/`Queryable` over in-memory data.

use std::any::Any;
use std::sync::Arc;

use safenav_core::config::EngineConfig;
use safenav_core::error::Result;
use safenav_core::expr::{Expr, ExprKind};
use safenav_core::query::{execute_sequence, QueryProvider, QueryRef, Queryable};
use safenav_core::types::Type;
use safenav_core::value::Value;

use crate::metrics::emit_span;
use crate::runtime::Engine;

/// Cheap to clone; clones share the engine.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    engine: Arc<Engine>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(cfg: EngineConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            engine: Arc::new(Engine::new(cfg)),
        })
    }

    /// Register the value returned for the static member `name`.
    pub fn with_static(mut self, name: impl Into<String>, value: Value) -> Self {
        Arc::make_mut(&mut self.engine).set_static(name, value);
        self
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Source query over `values`, backed by this provider.
    pub fn from_values(&self, element_type: Type, values: Vec<Value>) -> Result<QueryRef> {
        let source = Expr::constant(Value::seq(values), Type::sequence(element_type.clone()))?;
        self.create_query(source, element_type)
    }
}

impl QueryProvider for MemoryProvider {
    fn create_query(&self, expression: Expr, element_type: Type) -> Result<QueryRef> {
        Ok(Arc::new(MemoryQuery {
            ordered: is_ordering_root(&expression),
            element_type,
            expression,
            provider: self.clone(),
        }))
    }

    fn execute(&self, expression: &Expr) -> Result<Value> {
        emit_span(
            "execute",
            &[("nodes", expression.node_count().to_string())],
        );
        let out = self.engine.evaluate(expression);

        #[cfg(feature = "tracing")]
        if let Err(e) = &out {
            tracing::debug!(error = %e, "in-memory execution failed");
        }

        out
    }
}

fn is_ordering_root(expression: &Expr) -> bool {
    matches!(expression.kind(), ExprKind::Call { method, .. } if method.is_ordering())
}

/// A query whose tree is evaluated by a `MemoryProvider`.
///
/// Results are not cached: every `enumerate` runs the tree again.
pub struct MemoryQuery {
    element_type: Type,
    expression: Expr,
    provider: MemoryProvider,
    ordered: bool,
}

impl MemoryQuery {
    /// Source query over `values` on a default provider.
    pub fn from_values(element_type: Type, values: Vec<Value>) -> Result<QueryRef> {
        MemoryProvider::new().from_values(element_type, values)
    }
}

impl Queryable for MemoryQuery {
    fn element_type(&self) -> &Type {
        &self.element_type
    }

    fn expression(&self) -> &Expr {
        &self.expression
    }

    fn provider(&self) -> Arc<dyn QueryProvider> {
        Arc::new(self.provider.clone())
    }

    fn is_ordered(&self) -> bool {
        self.ordered
    }

    fn enumerate(&self) -> Result<Arc<Vec<Value>>> {
        execute_sequence(&self.provider, &self.expression)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
