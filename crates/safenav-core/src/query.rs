//! The queryable/provider contract and the composition surface on top of it.
//!
//! A query is a typed expression tree plus the provider that can build
//! derived queries from it and execute it. Composition only ever builds a
//! bigger tree and asks the provider for a new query; nothing touches data
//! until `enumerate`, `count` or `first` is called.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::expr::{Expr, ExprKind, Method};
use crate::types::Type;
use crate::value::{FromValue, Value};

/// Execution engine behind a queryable.
///
/// Implementations must be referentially transparent: executing the same
/// tree twice yields equivalent results unless the underlying data changed.
pub trait QueryProvider: Send + Sync {
    /// Build a query over `expression` whose elements are `element_type`.
    fn create_query(&self, expression: Expr, element_type: Type) -> Result<QueryRef>;

    /// Evaluate `expression` to a single value (a `Value::Seq` for
    /// sequence-typed trees).
    fn execute(&self, expression: &Expr) -> Result<Value>;
}

/// A composable, lazily executed query.
pub trait Queryable: Send + Sync {
    fn element_type(&self) -> &Type;

    fn expression(&self) -> &Expr;

    fn provider(&self) -> Arc<dyn QueryProvider>;

    /// The ordered capability: secondary orderings are only valid on
    /// queries that report `true`.
    fn is_ordered(&self) -> bool;

    /// Materialize the query's elements.
    fn enumerate(&self) -> Result<Arc<Vec<Value>>>;

    fn as_any(&self) -> &dyn Any;
}

pub type QueryRef = Arc<dyn Queryable>;

/// Execute a sequence-typed tree and unwrap the resulting sequence.
pub fn execute_sequence(provider: &dyn QueryProvider, expression: &Expr) -> Result<Arc<Vec<Value>>> {
    match provider.execute(expression)? {
        Value::Seq(items) => Ok(items),
        other => Err(Error::TypeMismatch(format!(
            "query produced {} instead of a sequence",
            other.kind()
        ))),
    }
}

/// Check that `lambda` takes one `elem` parameter; returns the body type.
fn lambda_over(lambda: &Expr, elem: &Type) -> Result<Type> {
    match lambda.kind() {
        ExprKind::Lambda { params, body } if params.len() == 1 => {
            if &params[0].ty != elem {
                return Err(Error::TypeMismatch(format!(
                    "lambda parameter '{}' is {}, query elements are {elem}",
                    params[0].name, params[0].ty
                )));
            }
            Ok(body.ty().clone())
        }
        _ => Err(Error::TypeMismatch(format!(
            "expected a one-parameter lambda, found {lambda}"
        ))),
    }
}

/// Composition helpers. Each builds a `Call` node over the current tree
/// and routes it through the query's own provider.
pub trait QueryableExt {
    fn filter(&self, predicate: Expr) -> Result<QueryRef>;
    fn select(&self, selector: Expr) -> Result<QueryRef>;
    fn order_by(&self, key: Expr) -> Result<QueryRef>;
    fn order_by_descending(&self, key: Expr) -> Result<QueryRef>;
    fn then_by(&self, key: Expr) -> Result<QueryRef>;
    fn then_by_descending(&self, key: Expr) -> Result<QueryRef>;
    fn take(&self, n: i32) -> Result<QueryRef>;
    fn skip(&self, n: i32) -> Result<QueryRef>;
    fn count(&self) -> Result<i32>;
    fn first(&self) -> Result<Value>;
    fn to_list(&self) -> Result<Vec<Value>>;
}

fn compose(query: &QueryRef, method: Method, arg: Expr, elem: Type) -> Result<QueryRef> {
    let expr = Expr::call(
        method,
        vec![query.expression().clone(), arg],
        Type::sequence(elem.clone()),
    );
    query.provider().create_query(expr, elem)
}

impl QueryableExt for QueryRef {
    fn filter(&self, predicate: Expr) -> Result<QueryRef> {
        let body = lambda_over(&predicate, self.element_type())?;
        if body != Type::Bool {
            return Err(Error::TypeMismatch(format!(
                "filter predicate must be bool, found {body}"
            )));
        }
        compose(self, Method::Where, predicate, self.element_type().clone())
    }

    fn select(&self, selector: Expr) -> Result<QueryRef> {
        let out = lambda_over(&selector, self.element_type())?;
        compose(self, Method::Select, selector, out)
    }

    fn order_by(&self, key: Expr) -> Result<QueryRef> {
        lambda_over(&key, self.element_type())?;
        compose(self, Method::OrderBy, key, self.element_type().clone())
    }

    fn order_by_descending(&self, key: Expr) -> Result<QueryRef> {
        lambda_over(&key, self.element_type())?;
        compose(self, Method::OrderByDescending, key, self.element_type().clone())
    }

    fn then_by(&self, key: Expr) -> Result<QueryRef> {
        if !self.is_ordered() {
            return Err(Error::NotOrdered);
        }
        lambda_over(&key, self.element_type())?;
        compose(self, Method::ThenBy, key, self.element_type().clone())
    }

    fn then_by_descending(&self, key: Expr) -> Result<QueryRef> {
        if !self.is_ordered() {
            return Err(Error::NotOrdered);
        }
        lambda_over(&key, self.element_type())?;
        compose(self, Method::ThenByDescending, key, self.element_type().clone())
    }

    fn take(&self, n: i32) -> Result<QueryRef> {
        compose(self, Method::Take, Expr::int32(n), self.element_type().clone())
    }

    fn skip(&self, n: i32) -> Result<QueryRef> {
        compose(self, Method::Skip, Expr::int32(n), self.element_type().clone())
    }

    fn count(&self) -> Result<i32> {
        let expr = Expr::call(Method::Count, vec![self.expression().clone()], Type::Int32);
        i32::from_value(&self.provider().execute(&expr)?)
    }

    fn first(&self) -> Result<Value> {
        let expr = Expr::call(
            Method::First,
            vec![self.expression().clone()],
            self.element_type().clone(),
        );
        self.provider().execute(&expr)
    }

    fn to_list(&self) -> Result<Vec<Value>> {
        Ok(self.enumerate()?.as_ref().clone())
    }
}

/// Element-typed view over a query; decoding happens on materialization.
pub struct TypedQuery<T> {
    inner: QueryRef,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for TypedQuery<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _marker: PhantomData,
        }
    }
}

impl<T: FromValue> TypedQuery<T> {
    pub fn new(inner: QueryRef) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    pub fn query(&self) -> &QueryRef {
        &self.inner
    }

    pub fn into_inner(self) -> QueryRef {
        self.inner
    }

    pub fn is_ordered(&self) -> bool {
        self.inner.is_ordered()
    }

    pub fn to_list(&self) -> Result<Vec<T>> {
        self.inner.enumerate()?.iter().map(T::from_value).collect()
    }

    pub fn first(&self) -> Result<T> {
        T::from_value(&self.inner.first()?)
    }
}
