//! Runtime: evaluate expression trees against in-memory values.
//!
//! Behavior:
//! - Lambdas are only evaluated as arguments of a `Call`; their parameter is
//!   bound per element on a scope stack.
//! - Member access on an absent receiver fails with `NullReference`, the way
//!   an unguarded chain would fail in a real engine.
//! - `&&`, `||` and conditionals evaluate lazily, so a guard that fires keeps
//!   the guarded access from ever running.
//! - `ThenBy` re-sorts the base sequence on the full key list of its
//!   ordering chain; sorting is stable.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use safenav_core::config::EngineConfig;
use safenav_core::error::{Error, Result};
use safenav_core::expr::{BinaryOp, Expr, ExprKind, Method};
use safenav_core::types::Type;
use safenav_core::value::{Record, Value};

/// Stateless evaluator. Holds configuration and the static-member registry.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    cfg: EngineConfig,
    statics: HashMap<String, Value>,
}

/// Parameter bindings of the lambdas currently being evaluated.
#[derive(Default)]
struct Scope {
    frames: Vec<(String, Value)>,
}

impl Scope {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.frames
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

/// One key of an ordering chain.
struct SortKey<'a> {
    selector: &'a Expr,
    descending: bool,
}

impl Engine {
    pub fn new(cfg: EngineConfig) -> Self {
        Self {
            cfg,
            statics: HashMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    /// Register a value for the static member `name`.
    pub fn set_static(&mut self, name: impl Into<String>, value: Value) {
        self.statics.insert(name.into(), value);
    }

    pub fn evaluate(&self, expr: &Expr) -> Result<Value> {
        let mut scope = Scope::default();
        self.eval(expr, &mut scope, 0)
    }

    fn eval(&self, expr: &Expr, scope: &mut Scope, depth: usize) -> Result<Value> {
        if depth >= self.cfg.max_depth {
            return Err(Error::DepthExceeded(self.cfg.max_depth));
        }
        let depth = depth + 1;

        match expr.kind() {
            ExprKind::Constant(v) => Ok(v.clone()),
            ExprKind::Parameter(name) => scope
                .lookup(name)
                .cloned()
                .ok_or_else(|| Error::UnboundParameter(name.clone())),
            ExprKind::Default => Ok(expr.ty().zero_value()),
            ExprKind::NewList => Ok(Value::seq(Vec::new())),
            ExprKind::Convert(inner) => self.eval(inner, scope, depth),
            ExprKind::Member { receiver, member } => {
                let Some(receiver) = receiver else {
                    return self.statics.get(member).cloned().ok_or_else(|| {
                        Error::UnknownMember {
                            ty: "static".into(),
                            member: member.clone(),
                        }
                    });
                };
                let target = self.eval(receiver, scope, depth)?;
                read_member(&target, member)
            }
            ExprKind::Conditional {
                test,
                if_true,
                if_false,
            } => {
                if self.eval_bool(test, scope, depth)? {
                    self.eval(if_true, scope, depth)
                } else {
                    self.eval(if_false, scope, depth)
                }
            }
            ExprKind::Not(inner) => Ok(Value::Bool(!self.eval_bool(inner, scope, depth)?)),
            ExprKind::Binary { op, left, right } => match op {
                BinaryOp::AndAlso => Ok(Value::Bool(
                    self.eval_bool(left, scope, depth)? && self.eval_bool(right, scope, depth)?,
                )),
                BinaryOp::OrElse => Ok(Value::Bool(
                    self.eval_bool(left, scope, depth)? || self.eval_bool(right, scope, depth)?,
                )),
                _ => {
                    let l = self.eval(left, scope, depth)?;
                    let r = self.eval(right, scope, depth)?;
                    binary(*op, &l, &r)
                }
            },
            ExprKind::NewRecord { fields } => {
                let type_name = match expr.ty() {
                    Type::Record(name) => name.clone(),
                    other => {
                        return Err(Error::TypeMismatch(format!(
                            "record construction typed as {other}"
                        )))
                    }
                };
                let mut record = Record::new(type_name);
                for (name, e) in fields {
                    record = record.with(name.clone(), self.eval(e, scope, depth)?);
                }
                Ok(Value::record(record))
            }
            ExprKind::Lambda { .. } => Err(Error::Unsupported(format!(
                "lambda outside of a call: {expr}"
            ))),
            ExprKind::Call { method, args } => self.call(expr, *method, args, scope, depth),
        }
    }

    fn eval_bool(&self, expr: &Expr, scope: &mut Scope, depth: usize) -> Result<bool> {
        let v = self.eval(expr, scope, depth)?;
        v.as_bool()
            .ok_or_else(|| Error::TypeMismatch(format!("expected bool, found {}", v.kind())))
    }

    fn eval_seq(&self, expr: &Expr, scope: &mut Scope, depth: usize) -> Result<Arc<Vec<Value>>> {
        match self.eval(expr, scope, depth)? {
            Value::Seq(items) => Ok(items),
            Value::Null => Err(Error::NullReference {
                member: format!("{expr}"),
            }),
            other => Err(Error::TypeMismatch(format!(
                "expected a sequence, found {}",
                other.kind()
            ))),
        }
    }

    /// Apply a one-parameter lambda to `item`.
    fn apply(
        &self,
        lambda: &Expr,
        item: &Value,
        scope: &mut Scope,
        depth: usize,
    ) -> Result<Value> {
        let ExprKind::Lambda { params, body } = lambda.kind() else {
            return Err(Error::TypeMismatch(format!("expected a lambda, found {lambda}")));
        };
        let [param] = params.as_slice() else {
            return Err(Error::Unsupported(format!(
                "lambda with {} parameters",
                params.len()
            )));
        };

        scope.frames.push((param.name.clone(), item.clone()));
        let out = self.eval(body, scope, depth);
        scope.frames.pop();
        out
    }

    fn call(
        &self,
        expr: &Expr,
        method: Method,
        args: &[Expr],
        scope: &mut Scope,
        depth: usize,
    ) -> Result<Value> {
        let source = args
            .first()
            .ok_or_else(|| Error::Unsupported(format!("{} without a source", method.name())))?;
        let arg = |i: usize| {
            args.get(i).ok_or_else(|| {
                Error::Unsupported(format!("{} is missing argument {i}", method.name()))
            })
        };

        match method {
            Method::Where => {
                let predicate = arg(1)?;
                let items = self.eval_seq(source, scope, depth)?;
                let mut out = Vec::new();
                for item in items.iter() {
                    let keep = self.apply(predicate, item, scope, depth)?;
                    if keep.as_bool().unwrap_or(false) {
                        out.push(item.clone());
                    }
                }
                Ok(Value::seq(out))
            }
            Method::Select => {
                let selector = arg(1)?;
                let items = self.eval_seq(source, scope, depth)?;
                let out = items
                    .iter()
                    .map(|item| self.apply(selector, item, scope, depth))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::seq(out))
            }
            Method::OrderBy
            | Method::OrderByDescending
            | Method::ThenBy
            | Method::ThenByDescending => self.order(expr, scope, depth),
            Method::Take | Method::Skip => {
                let n = match self.eval(arg(1)?, scope, depth)? {
                    Value::Int32(n) => n.max(0) as usize,
                    other => {
                        return Err(Error::TypeMismatch(format!(
                            "{} needs an i32 count, found {}",
                            method.name(),
                            other.kind()
                        )))
                    }
                };
                let items = self.eval_seq(source, scope, depth)?;
                let out: Vec<Value> = if method == Method::Take {
                    items.iter().take(n).cloned().collect()
                } else {
                    items.iter().skip(n).cloned().collect()
                };
                Ok(Value::seq(out))
            }
            Method::Count => {
                let items = self.eval_seq(source, scope, depth)?;
                Ok(Value::Int32(items.len() as i32))
            }
            Method::First => {
                let items = self.eval_seq(source, scope, depth)?;
                items.first().cloned().ok_or(Error::Empty)
            }
            Method::Any => {
                let items = self.eval_seq(source, scope, depth)?;
                match args.get(1) {
                    None => Ok(Value::Bool(!items.is_empty())),
                    Some(predicate) => {
                        for item in items.iter() {
                            if self.apply(predicate, item, scope, depth)?.as_bool() == Some(true) {
                                return Ok(Value::Bool(true));
                            }
                        }
                        Ok(Value::Bool(false))
                    }
                }
            }
            Method::Sum => {
                let items = self.eval_seq(source, scope, depth)?;
                let mut total = expr.ty().zero_value();
                for item in items.iter() {
                    let v = match args.get(1) {
                        Some(selector) => self.apply(selector, item, scope, depth)?,
                        None => item.clone(),
                    };
                    if v.is_null() {
                        continue;
                    }
                    total = binary(BinaryOp::Add, &total, &v)?;
                }
                Ok(total)
            }
        }
    }

    /// Evaluate an ordering chain `ThenBy(ThenBy(OrderBy(src, k1), k2), k3)`.
    fn order(&self, expr: &Expr, scope: &mut Scope, depth: usize) -> Result<Value> {
        let mut keys = Vec::new();
        let mut cursor = expr;
        let base = loop {
            let ExprKind::Call { method, args } = cursor.kind() else {
                return Err(Error::NotOrdered);
            };
            let (Some(source), Some(selector)) = (args.first(), args.get(1)) else {
                return Err(Error::Unsupported(format!(
                    "{} needs a source and a key",
                    method.name()
                )));
            };
            match method {
                Method::OrderBy | Method::OrderByDescending => {
                    keys.push(SortKey {
                        selector,
                        descending: *method == Method::OrderByDescending,
                    });
                    break source;
                }
                Method::ThenBy | Method::ThenByDescending => {
                    keys.push(SortKey {
                        selector,
                        descending: *method == Method::ThenByDescending,
                    });
                    cursor = source;
                }
                _ => return Err(Error::NotOrdered),
            }
        };
        keys.reverse();

        let items = self.eval_seq(base, scope, depth)?;
        let mut rows = Vec::with_capacity(items.len());
        for item in items.iter() {
            let row_keys = keys
                .iter()
                .map(|k| self.apply(k.selector, item, scope, depth))
                .collect::<Result<Vec<_>>>()?;
            rows.push((row_keys, item.clone()));
        }

        rows.sort_by(|(a, _), (b, _)| {
            for (i, key) in keys.iter().enumerate() {
                let ord = a[i].sort_cmp(&b[i]);
                let ord = if key.descending { ord.reverse() } else { ord };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });

        Ok(Value::seq(rows.into_iter().map(|(_, v)| v).collect()))
    }
}

fn read_member(target: &Value, member: &str) -> Result<Value> {
    match target {
        Value::Null => Err(Error::NullReference {
            member: member.to_string(),
        }),
        Value::Record(record) => record.get(member).cloned().ok_or_else(|| Error::UnknownMember {
            ty: record.type_name.clone(),
            member: member.to_string(),
        }),
        other => other.builtin_member(member).ok_or_else(|| Error::UnknownMember {
            ty: other.kind().to_string(),
            member: member.to_string(),
        }),
    }
}

fn binary(op: BinaryOp, l: &Value, r: &Value) -> Result<Value> {
    let ord = || l.sort_cmp(r);
    let any_null = l.is_null() || r.is_null();

    let out = match op {
        BinaryOp::Equal => Value::Bool(l == r),
        BinaryOp::NotEqual => Value::Bool(l != r),
        // Ordering comparisons against an absent value are false.
        BinaryOp::Less => Value::Bool(!any_null && ord() == Ordering::Less),
        BinaryOp::LessOrEqual => Value::Bool(!any_null && ord() != Ordering::Greater),
        BinaryOp::Greater => Value::Bool(!any_null && ord() == Ordering::Greater),
        BinaryOp::GreaterOrEqual => Value::Bool(!any_null && ord() != Ordering::Less),
        BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply => arithmetic(op, l, r)?,
        BinaryOp::AndAlso | BinaryOp::OrElse => match (l.as_bool(), r.as_bool()) {
            (Some(a), Some(b)) if op == BinaryOp::AndAlso => Value::Bool(a && b),
            (Some(a), Some(b)) => Value::Bool(a || b),
            _ => {
                return Err(Error::TypeMismatch(format!(
                    "'{}' on {} and {}",
                    op.symbol(),
                    l.kind(),
                    r.kind()
                )))
            }
        },
    };
    Ok(out)
}

fn arithmetic(op: BinaryOp, l: &Value, r: &Value) -> Result<Value> {
    let out = match (l, r) {
        (Value::Int32(a), Value::Int32(b)) => Value::Int32(match op {
            BinaryOp::Add => a.wrapping_add(*b),
            BinaryOp::Subtract => a.wrapping_sub(*b),
            _ => a.wrapping_mul(*b),
        }),
        (Value::Int64(a), Value::Int64(b)) => Value::Int64(match op {
            BinaryOp::Add => a.wrapping_add(*b),
            BinaryOp::Subtract => a.wrapping_sub(*b),
            _ => a.wrapping_mul(*b),
        }),
        (Value::Float64(a), Value::Float64(b)) => Value::Float64(match op {
            BinaryOp::Add => a + b,
            BinaryOp::Subtract => a - b,
            _ => a * b,
        }),
        _ => {
            return Err(Error::TypeMismatch(format!(
                "'{}' on {} and {}",
                op.symbol(),
                l.kind(),
                r.kind()
            )))
        }
    };
    Ok(out)
}
