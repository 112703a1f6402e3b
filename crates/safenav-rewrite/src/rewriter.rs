//! Tree rewriters: a single recursive transformer over `Expr`.
//!
//! Implementors override the hooks they care about; every other node kind
//! goes through `walk`, which rewrites each child and rebuilds the node only
//! when some child actually changed.

use safenav_core::expr::{Expr, ExprKind};

/// A pure, total transformation of expression trees.
///
/// Invariant: the rewritten tree is type-compatible with its input at every
/// node; result types never change.
pub trait ExprRewriter: Send + Sync {
    /// Stable name of the rewrite family.
    fn name(&self) -> &'static str;

    /// Identity including configuration. Two rewriters with equal keys
    /// produce equal trees.
    fn key(&self) -> String {
        self.name().to_string()
    }

    fn rewrite(&self, expr: &Expr) -> Expr {
        match expr.kind() {
            ExprKind::Member { receiver, member } => {
                self.rewrite_member(expr, receiver.as_ref(), member)
            }
            _ => walk(self, expr),
        }
    }

    /// Hook for `receiver.member` nodes.
    fn rewrite_member(&self, node: &Expr, receiver: Option<&Expr>, member: &str) -> Expr {
        let _ = (receiver, member);
        walk(self, node)
    }
}

/// Rewrite every child of `expr`, keeping its shape.
pub fn walk<R: ExprRewriter + ?Sized>(rewriter: &R, expr: &Expr) -> Expr {
    expr.map_children(|child| rewriter.rewrite(child))
}

/// Adapter turning a plain function into a rewriter.
pub struct FnRewriter<F> {
    name: &'static str,
    f: F,
}

impl<F> FnRewriter<F>
where
    F: Fn(&Expr) -> Expr + Send + Sync,
{
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }
}

impl<F> ExprRewriter for FnRewriter<F>
where
    F: Fn(&Expr) -> Expr + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn rewrite(&self, expr: &Expr) -> Expr {
        (self.f)(expr)
    }
}
