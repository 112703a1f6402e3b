//! Proxy behavior: laziness, single realization, ordering and entry points.

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use safenav::{
    rewrite, rewrite_ordered, to_nullsafe, to_nullsafe_ordered, to_nullsafe_typed,
    to_nullsafe_with, BinaryOp, Error, Expr, ExprKind, ExprRewriter, MemoryProvider,
    NullsafeExt, Param, QueryProvider, QueryRef, Queryable, QueryableExt, Record, Result,
    RewriteConfig, Type, TypedQuery, Value,
};
use safenav_core::query::execute_sequence;
use safenav_rewrite::{walk, RewriteQuery};

/// Provider that counts executions, records the trees it runs, and can fail
/// a number of them up front.
#[derive(Clone)]
struct Counting {
    inner: MemoryProvider,
    calls: Arc<AtomicUsize>,
    failures_left: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<String>>>,
}

impl Counting {
    fn new() -> Self {
        Self {
            inner: MemoryProvider::new(),
            calls: Arc::new(AtomicUsize::new(0)),
            failures_left: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    fn failing(times: usize) -> Self {
        let p = Self::new();
        p.failures_left.store(times, Ordering::SeqCst);
        p
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn source(&self, values: Vec<i32>) -> QueryRef {
        self.values(Type::Int32, values.into_iter().map(Value::Int32).collect())
    }

    fn values(&self, element_type: Type, values: Vec<Value>) -> QueryRef {
        let expr = Expr::constant(Value::seq(values), Type::sequence(element_type.clone())).unwrap();
        self.create_query(expr, element_type).unwrap()
    }
}

impl QueryProvider for Counting {
    fn create_query(&self, expression: Expr, element_type: Type) -> Result<QueryRef> {
        let ordered = matches!(
            expression.kind(),
            ExprKind::Call { method, .. } if method.is_ordering()
        );
        Ok(Arc::new(CountingQuery {
            element_type,
            expression,
            provider: self.clone(),
            ordered,
        }))
    }

    fn execute(&self, expression: &Expr) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(expression.to_string());
        let fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(Error::Unsupported("backend unavailable".into()));
        }
        self.inner.execute(expression)
    }
}

struct CountingQuery {
    element_type: Type,
    expression: Expr,
    provider: Counting,
    ordered: bool,
}

impl Queryable for CountingQuery {
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

fn identity() -> Expr {
    let x = Param::new("x", Type::Int32);
    Expr::lambda(vec![x.clone()], x.expr())
}

fn above(n: i32) -> Expr {
    let x = Param::new("x", Type::Int32);
    Expr::lambda(
        vec![x.clone()],
        Expr::binary(BinaryOp::Greater, x.expr(), Expr::int32(n)).unwrap(),
    )
}

#[test]
fn composing_never_executes() {
    let provider = Counting::new();
    let safe = to_nullsafe(Some(&provider.source(vec![4, 1, 3]))).unwrap();
    let q = safe
        .filter(above(1))
        .and_then(|q| q.order_by(identity()))
        .and_then(|q| q.then_by(identity()))
        .unwrap();
    assert_eq!(provider.calls(), 0);

    assert_eq!(q.to_list().unwrap(), vec![Value::Int32(3), Value::Int32(4)]);
    assert_eq!(provider.calls(), 1);
}

#[test]
fn enumeration_is_memoized() {
    let provider = Counting::new();
    let safe = provider.source(vec![1, 2]).nullsafe();

    let first = safe.enumerate().unwrap();
    let second = safe.enumerate().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(provider.calls(), 1);

    let realized = safe
        .as_any()
        .downcast_ref::<RewriteQuery>()
        .map(|q| q.is_realized());
    assert_eq!(realized, Some(true));
}

#[test]
fn concurrent_enumeration_realizes_once() {
    let provider = Counting::new();
    let safe = provider.source((0..100).collect()).nullsafe();
    let threads = 8;
    let barrier = Barrier::new(threads);

    let (barrier, safe) = (&barrier, &safe);
    let results: Vec<Arc<Vec<Value>>> = thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                s.spawn(move || {
                    barrier.wait();
                    safe.enumerate().unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(provider.calls(), 1);
    assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
    assert_eq!(results[0].len(), 100);
}

#[test]
fn failed_realization_is_retried() {
    let provider = Counting::failing(1);
    let safe = provider.source(vec![7]).nullsafe();

    assert_eq!(
        safe.enumerate().unwrap_err(),
        Error::Unsupported("backend unavailable".into())
    );
    assert_eq!(safe.to_list().unwrap(), vec![Value::Int32(7)]);
    assert_eq!(provider.calls(), 2);
}

#[test]
fn engine_errors_pass_through_unchanged() {
    let provider = Counting::new();
    let empty = provider.source(vec![]).nullsafe();
    assert_eq!(empty.first().unwrap_err(), Error::Empty);
}

#[test]
fn to_nullsafe_is_idempotent() {
    let provider = Counting::new();
    let q = provider.source(vec![1]);
    let once = to_nullsafe(Some(&q)).unwrap();
    let twice = to_nullsafe(Some(&once)).unwrap();
    assert!(Arc::ptr_eq(&once, &twice));

    let sorted = q.order_by(identity()).unwrap();
    let ordered = to_nullsafe_ordered(Some(&sorted)).unwrap();
    let again = to_nullsafe_ordered(Some(&ordered)).unwrap();
    assert!(Arc::ptr_eq(&ordered, &again));
    let plain_entry = to_nullsafe(Some(&ordered)).unwrap();
    assert!(Arc::ptr_eq(&ordered, &plain_entry));
}

fn a_type() -> Type {
    Type::record("A")
}

/// Records of type `A` with an optional `more: Collection<A>` and an `n`.
fn a_records(provider: &Counting) -> QueryRef {
    let present = Value::record(
        Record::new("A")
            .with("n", Value::Int32(4))
            .with("more", Value::Null),
    );
    provider.values(a_type(), vec![present, Value::Null])
}

fn select_n(q: &QueryRef) -> QueryRef {
    let a = Param::new("a", a_type());
    q.select(Expr::lambda(vec![a.clone()], a.expr().field("n", Type::Int32)))
        .unwrap()
}

#[test]
fn converting_twice_executes_a_single_guard_layer() {
    let single = Counting::new();
    let expected = select_n(&to_nullsafe(Some(&a_records(&single))).unwrap())
        .to_list()
        .unwrap();

    let double = Counting::new();
    let once = to_nullsafe(Some(&a_records(&double))).unwrap();
    let twice = to_nullsafe(Some(&select_n(&once))).unwrap();
    assert_eq!(twice.to_list().unwrap(), expected);
    assert_eq!(double.seen(), single.seen());

    let sorted_single = Counting::new();
    let by_n = |q: &QueryRef| {
        let a = Param::new("a", a_type());
        q.order_by(Expr::lambda(vec![a.clone()], a.expr().field("n", Type::Int32)))
            .unwrap()
    };
    to_nullsafe(Some(&by_n(&a_records(&sorted_single))))
        .unwrap()
        .to_list()
        .unwrap();

    let sorted_double = Counting::new();
    let safe = to_nullsafe(Some(&by_n(&a_records(&sorted_double)))).unwrap();
    to_nullsafe_ordered(Some(&safe)).unwrap().to_list().unwrap();
    assert_eq!(sorted_double.seen(), sorted_single.seen());
    assert_eq!(sorted_double.seen().len(), 1);
}

#[test]
fn a_different_config_is_honored_on_an_already_safe_query() {
    let a = Param::new("a", a_type());
    let more = Expr::lambda(
        vec![a.clone()],
        a.expr().field("more", Type::collection(a_type())),
    );

    let provider = Counting::new();
    let safe = to_nullsafe(Some(&a_records(&provider))).unwrap();
    let cfg = RewriteConfig {
        collection_fallbacks: false,
        ..RewriteConfig::default()
    };
    let plain_defaults = to_nullsafe_with(Some(&safe), cfg).unwrap();
    assert!(!Arc::ptr_eq(&safe, &plain_defaults));

    assert_eq!(
        plain_defaults.select(more.clone()).unwrap().to_list().unwrap(),
        vec![Value::Null, Value::Null]
    );
    assert_eq!(
        safe.select(more).unwrap().to_list().unwrap(),
        vec![Value::seq(vec![]), Value::seq(vec![])]
    );
    // Neither run stacked a second rewrite over the first.
    assert!(provider.seen().iter().all(|t| t.matches("a == default(A)").count() == 1));
}

#[test]
fn ordered_entry_points_reject_unordered_queries() {
    let provider = Counting::new();
    let plain = to_nullsafe(Some(&provider.source(vec![1]))).unwrap();
    assert_eq!(to_nullsafe_ordered(Some(&plain)).err(), Some(Error::NotOrdered));
    assert_eq!(
        rewrite_ordered(
            Some(&provider.source(vec![1])),
            Some(Arc::new(safenav::NullsafeRewriter::new()))
        )
        .err(),
        Some(Error::NotOrdered)
    );
}

#[test]
fn ordering_capability_survives_conversion() {
    let provider = Counting::new();
    let sorted = provider
        .source(vec![2, 3, 1])
        .order_by_descending(identity())
        .unwrap();

    let safe = to_nullsafe(Some(&sorted)).unwrap();
    assert!(safe.is_ordered());
    let then = safe.then_by_descending(identity()).unwrap();
    assert_eq!(
        then.to_list().unwrap(),
        vec![Value::Int32(3), Value::Int32(2), Value::Int32(1)]
    );

    let plain = to_nullsafe(Some(&provider.source(vec![1]))).unwrap();
    assert!(!plain.is_ordered());
    assert_eq!(plain.then_by(identity()).err(), Some(Error::NotOrdered));
}

#[test]
fn absent_arguments_fail_at_call_time() {
    assert_eq!(to_nullsafe(None).err(), Some(Error::MissingArgument("query")));
    assert_eq!(
        to_nullsafe_ordered(None).err(),
        Some(Error::MissingArgument("query"))
    );
    assert_eq!(
        to_nullsafe_typed::<i32>(None).err(),
        Some(Error::MissingArgument("query"))
    );
    assert_eq!(
        rewrite(None, Some(Arc::new(safenav::NullsafeRewriter::new()))).err(),
        Some(Error::MissingArgument("query"))
    );

    let q = Counting::new().source(vec![1]);
    assert_eq!(
        rewrite(Some(&q), None).err(),
        Some(Error::MissingArgument("rewriter"))
    );
    assert_eq!(
        rewrite_ordered(Some(&q), None).err(),
        Some(Error::MissingArgument("rewriter"))
    );
}

#[test]
fn typed_queries_convert_too() {
    let provider = Counting::new();
    let typed: TypedQuery<i32> = TypedQuery::new(provider.source(vec![5, 6]));
    let safe = to_nullsafe_typed(Some(&typed)).unwrap();
    assert_eq!(safe.to_list().unwrap(), vec![5, 6]);
    assert_eq!(safe.nullsafe().first().unwrap(), 5);
}

/// Turns every `i32` literal into its double.
struct Doubler;

impl ExprRewriter for Doubler {
    fn name(&self) -> &'static str {
        "doubler"
    }

    fn rewrite(&self, expr: &Expr) -> Expr {
        match expr.kind() {
            ExprKind::Constant(Value::Int32(n)) => Expr::int32(n * 2),
            _ => walk(self, expr),
        }
    }
}

#[test]
fn custom_rewriters_run_through_the_same_proxy() {
    let doubler: Arc<dyn ExprRewriter> = Arc::new(Doubler);

    let provider = Counting::new();
    let q = rewrite(Some(&provider.source(vec![1, 3, 5])), Some(doubler.clone())).unwrap();
    let filtered = q.filter(above(2)).unwrap();

    // The source constant is a sequence; only the predicate's literal changes.
    assert_eq!(filtered.to_list().unwrap(), vec![Value::Int32(5)]);
    assert_eq!(
        provider.source(vec![1, 3, 5]).filter(above(2)).unwrap().to_list().unwrap(),
        vec![Value::Int32(3), Value::Int32(5)]
    );

    let layered = q.nullsafe();
    assert!(!Arc::ptr_eq(&q, &layered));
    assert_eq!(
        layered.filter(above(2)).unwrap().to_list().unwrap(),
        vec![Value::Int32(5)]
    );

    let same = q.rewrite_with(doubler);
    assert!(Arc::ptr_eq(&q, &same));
}
