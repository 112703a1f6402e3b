//! Typed, immutable expression trees.
//!
//! An `Expr` is a cheap handle to a shared node. Rewriting never mutates a
//! node: it builds new nodes and keeps pointers to untouched subtrees, so a
//! rewritten tree shares everything it did not change with its input.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Type;
use crate::value::Value;

/// Query and sequence operators understood by providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Where,
    Select,
    OrderBy,
    OrderByDescending,
    ThenBy,
    ThenByDescending,
    Take,
    Skip,
    Count,
    First,
    Sum,
    Any,
}

impl Method {
    pub fn name(self) -> &'static str {
        match self {
            Method::Where => "Where",
            Method::Select => "Select",
            Method::OrderBy => "OrderBy",
            Method::OrderByDescending => "OrderByDescending",
            Method::ThenBy => "ThenBy",
            Method::ThenByDescending => "ThenByDescending",
            Method::Take => "Take",
            Method::Skip => "Skip",
            Method::Count => "Count",
            Method::First => "First",
            Method::Sum => "Sum",
            Method::Any => "Any",
        }
    }

    /// Operators whose output carries the ordered capability.
    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            Method::OrderBy | Method::OrderByDescending | Method::ThenBy | Method::ThenByDescending
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Add,
    Subtract,
    Multiply,
    /// Short-circuit conjunction.
    AndAlso,
    /// Short-circuit disjunction.
    OrElse,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessOrEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterOrEqual => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::AndAlso => "&&",
            BinaryOp::OrElse => "||",
        }
    }

    fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::Less
                | BinaryOp::LessOrEqual
                | BinaryOp::Greater
                | BinaryOp::GreaterOrEqual
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    /// Reference to this parameter inside a lambda body.
    pub fn expr(&self) -> Expr {
        Expr::parameter(self.name.clone(), self.ty.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Constant(Value),
    Parameter(String),
    /// The zero value of the node's type.
    Default,
    /// `receiver.member`; `None` receiver is a static member.
    Member {
        receiver: Option<Expr>,
        member: String,
    },
    Call {
        method: Method,
        args: Vec<Expr>,
    },
    Conditional {
        test: Expr,
        if_true: Expr,
        if_false: Expr,
    },
    Binary {
        op: BinaryOp,
        left: Expr,
        right: Expr,
    },
    Not(Expr),
    /// Upcast of the operand to the node's type.
    Convert(Expr),
    /// Lambda; the node's type is the body's result type.
    Lambda {
        params: Vec<Param>,
        body: Expr,
    },
    /// A fresh, empty instance of the node's `List<T>` type.
    NewList,
    /// Record construction; the node's type names the record.
    NewRecord {
        fields: Vec<(String, Expr)>,
    },
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct ExprNode {
    pub kind: ExprKind,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr(Arc<ExprNode>);

impl Expr {
    /// Build a node without type checks. Rewriters use this when the typing
    /// of the replacement follows from the node being replaced.
    pub fn new(kind: ExprKind, ty: Type) -> Self {
        Expr(Arc::new(ExprNode { kind, ty }))
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    pub fn ty(&self) -> &Type {
        &self.0.ty
    }

    /// Same node, not merely an equal one.
    pub fn ptr_eq(&self, other: &Expr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    // --- checked constructors ---

    pub fn constant(value: Value, ty: Type) -> Result<Self> {
        if !value.conforms_to(&ty) {
            return Err(Error::TypeMismatch(format!(
                "constant {value} does not conform to {ty}"
            )));
        }
        Ok(Self::new(ExprKind::Constant(value), ty))
    }

    pub fn int32(v: i32) -> Self {
        Self::new(ExprKind::Constant(Value::Int32(v)), Type::Int32)
    }

    pub fn boolean(v: bool) -> Self {
        Self::new(ExprKind::Constant(Value::Bool(v)), Type::Bool)
    }

    pub fn string(v: impl Into<String>) -> Self {
        Self::new(ExprKind::Constant(Value::Str(v.into())), Type::Str)
    }

    pub fn null(ty: Type) -> Result<Self> {
        Self::constant(Value::Null, ty)
    }

    pub fn parameter(name: impl Into<String>, ty: Type) -> Self {
        Self::new(ExprKind::Parameter(name.into()), ty)
    }

    pub fn default_of(ty: Type) -> Self {
        Self::new(ExprKind::Default, ty)
    }

    /// `self.member` of the given result type.
    pub fn field(&self, member: impl Into<String>, ty: Type) -> Self {
        Self::new(
            ExprKind::Member {
                receiver: Some(self.clone()),
                member: member.into(),
            },
            ty,
        )
    }

    pub fn static_member(member: impl Into<String>, ty: Type) -> Self {
        Self::new(
            ExprKind::Member {
                receiver: None,
                member: member.into(),
            },
            ty,
        )
    }

    pub fn call(method: Method, args: Vec<Expr>, ty: Type) -> Self {
        Self::new(ExprKind::Call { method, args }, ty)
    }

    pub fn condition(test: Expr, if_true: Expr, if_false: Expr) -> Result<Self> {
        if test.ty() != &Type::Bool {
            return Err(Error::TypeMismatch(format!(
                "condition test must be bool, found {}",
                test.ty()
            )));
        }
        if if_true.ty() != if_false.ty() {
            return Err(Error::TypeMismatch(format!(
                "condition branches disagree: {} vs {}",
                if_true.ty(),
                if_false.ty()
            )));
        }
        let ty = if_true.ty().clone();
        Ok(Self::new(
            ExprKind::Conditional {
                test,
                if_true,
                if_false,
            },
            ty,
        ))
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Result<Self> {
        let (lt, rt) = (left.ty(), right.ty());
        let ty = match op {
            BinaryOp::AndAlso | BinaryOp::OrElse => {
                if lt != &Type::Bool || rt != &Type::Bool {
                    return Err(Error::TypeMismatch(format!(
                        "'{}' needs bool operands, found {lt} and {rt}",
                        op.symbol()
                    )));
                }
                Type::Bool
            }
            _ if op.is_comparison() => {
                if !(lt.is_assignable_from(rt) || rt.is_assignable_from(lt)) {
                    return Err(Error::TypeMismatch(format!(
                        "cannot compare {lt} with {rt}"
                    )));
                }
                Type::Bool
            }
            _ => {
                let numeric = matches!(lt, Type::Int32 | Type::Int64 | Type::Float64);
                if lt != rt || !numeric {
                    return Err(Error::TypeMismatch(format!(
                        "'{}' needs matching numeric operands, found {lt} and {rt}",
                        op.symbol()
                    )));
                }
                lt.clone()
            }
        };
        Ok(Self::new(ExprKind::Binary { op, left, right }, ty))
    }

    pub fn equal(left: Expr, right: Expr) -> Result<Self> {
        Self::binary(BinaryOp::Equal, left, right)
    }

    pub fn or_else(left: Expr, right: Expr) -> Result<Self> {
        Self::binary(BinaryOp::OrElse, left, right)
    }

    pub fn not(operand: Expr) -> Result<Self> {
        if operand.ty() != &Type::Bool {
            return Err(Error::TypeMismatch(format!(
                "'!' needs a bool operand, found {}",
                operand.ty()
            )));
        }
        Ok(Self::new(ExprKind::Not(operand), Type::Bool))
    }

    pub fn convert(operand: Expr, ty: Type) -> Result<Self> {
        if !ty.is_assignable_from(operand.ty()) {
            return Err(Error::TypeMismatch(format!(
                "cannot convert {} to {ty}",
                operand.ty()
            )));
        }
        Ok(Self::new(ExprKind::Convert(operand), ty))
    }

    pub fn lambda(params: Vec<Param>, body: Expr) -> Self {
        let ty = body.ty().clone();
        Self::new(ExprKind::Lambda { params, body }, ty)
    }

    pub fn new_list(elem: Type) -> Self {
        Self::new(ExprKind::NewList, Type::list(elem))
    }

    pub fn new_record(type_name: impl Into<String>, fields: Vec<(String, Expr)>) -> Self {
        Self::new(ExprKind::NewRecord { fields }, Type::Record(type_name.into()))
    }

    // --- generic child access ---

    /// Direct sub-expressions in evaluation order.
    pub fn children(&self) -> Vec<&Expr> {
        match self.kind() {
            ExprKind::Constant(_)
            | ExprKind::Parameter(_)
            | ExprKind::Default
            | ExprKind::NewList => Vec::new(),
            ExprKind::Member { receiver, .. } => receiver.iter().collect(),
            ExprKind::Call { args, .. } => args.iter().collect(),
            ExprKind::Conditional {
                test,
                if_true,
                if_false,
            } => vec![test, if_true, if_false],
            ExprKind::Binary { left, right, .. } => vec![left, right],
            ExprKind::Not(e) | ExprKind::Convert(e) => vec![e],
            ExprKind::Lambda { body, .. } => vec![body],
            ExprKind::NewRecord { fields } => fields.iter().map(|(_, e)| e).collect(),
        }
    }

    /// Rebuild this node with every child replaced by `f(child)`.
    ///
    /// Node kind, member names and result type are kept. When `f` hands
    /// back the very same child for every slot, the original handle is
    /// returned and no allocation happens.
    pub fn map_children(&self, mut f: impl FnMut(&Expr) -> Expr) -> Expr {
        let mut changed = false;
        let mut visit = |e: &Expr| {
            let out = f(e);
            changed |= !out.ptr_eq(e);
            out
        };

        let kind = match self.kind() {
            ExprKind::Constant(_)
            | ExprKind::Parameter(_)
            | ExprKind::Default
            | ExprKind::NewList => return self.clone(),
            ExprKind::Member { receiver, member } => ExprKind::Member {
                receiver: receiver.as_ref().map(&mut visit),
                member: member.clone(),
            },
            ExprKind::Call { method, args } => ExprKind::Call {
                method: *method,
                args: args.iter().map(&mut visit).collect(),
            },
            ExprKind::Conditional {
                test,
                if_true,
                if_false,
            } => ExprKind::Conditional {
                test: visit(test),
                if_true: visit(if_true),
                if_false: visit(if_false),
            },
            ExprKind::Binary { op, left, right } => ExprKind::Binary {
                op: *op,
                left: visit(left),
                right: visit(right),
            },
            ExprKind::Not(e) => ExprKind::Not(visit(e)),
            ExprKind::Convert(e) => ExprKind::Convert(visit(e)),
            ExprKind::Lambda { params, body } => ExprKind::Lambda {
                params: params.clone(),
                body: visit(body),
            },
            ExprKind::NewRecord { fields } => ExprKind::NewRecord {
                fields: fields
                    .iter()
                    .map(|(name, e)| (name.clone(), visit(e)))
                    .collect(),
            },
        };

        if changed {
            Expr::new(kind, self.ty().clone())
        } else {
            self.clone()
        }
    }

    /// Number of nodes in the tree (shared subtrees counted per use).
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(|c| c.node_count()).sum::<usize>()
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::Constant(v) => write!(f, "{v}"),
            ExprKind::Parameter(name) => write!(f, "{name}"),
            ExprKind::Default => write!(f, "default({})", self.ty()),
            ExprKind::Member {
                receiver: Some(r),
                member,
            } => write!(f, "{r}.{member}"),
            ExprKind::Member {
                receiver: None,
                member,
            } => write!(f, "::{member}"),
            ExprKind::Call { method, args } => {
                write!(f, "{}(", method.name())?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ")")
            }
            ExprKind::Conditional {
                test,
                if_true,
                if_false,
            } => write!(f, "({test} ? {if_true} : {if_false})"),
            ExprKind::Binary { op, left, right } => {
                write!(f, "({left} {} {right})", op.symbol())
            }
            ExprKind::Not(e) => write!(f, "!{e}"),
            ExprKind::Convert(e) => write!(f, "({}){e}", self.ty()),
            ExprKind::Lambda { params, body } => {
                let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
                write!(f, "{} => {body}", names.join(", "))
            }
            ExprKind::NewList => write!(f, "new {}()", self.ty()),
            ExprKind::NewRecord { fields } => {
                write!(f, "new {} {{ ", self.ty())?;
                for (i, (name, e)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name} = {e}")?;
                }
                write!(f, " }}")
            }
        }
    }
}
