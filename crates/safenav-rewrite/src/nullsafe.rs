//! Null-safe member access.
//!
//! Every `receiver.member` node becomes
//!
//! ```text
//! (receiver' == default(R)) ? fallback : receiver.member
//! ```
//!
//! where `receiver'` is the already rewritten receiver, so a chain `a.b.c.d`
//! is guarded innermost-first and each guard only looks at its immediate
//! receiver. When the fallback is a fresh empty collection the test becomes
//! `(receiver' == default(R)) || (receiver.member == default(T))`: an absent
//! collection behind a present receiver yields the empty collection too.
//!
//! Guards short-circuit, so the original access is never evaluated once a
//! guard fires. When the receiver itself falls back to an empty collection,
//! the access is rebuilt on `receiver'` instead of the original receiver.

use safenav_core::config::RewriteConfig;
use safenav_core::expr::{BinaryOp, Expr, ExprKind};
use safenav_core::types::Type;

use crate::fallback::{fallback_for, is_trivial_fallback};
use crate::rewriter::ExprRewriter;

pub const NULLSAFE: &str = "nullsafe";

#[derive(Debug, Clone, Default)]
pub struct NullsafeRewriter {
    config: RewriteConfig,
}

impl NullsafeRewriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RewriteConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RewriteConfig {
        &self.config
    }
}

fn is_default(expr: Expr) -> Expr {
    let zero = Expr::default_of(expr.ty().clone());
    Expr::new(
        ExprKind::Binary {
            op: BinaryOp::Equal,
            left: expr,
            right: zero,
        },
        Type::Bool,
    )
}

impl ExprRewriter for NullsafeRewriter {
    fn name(&self) -> &'static str {
        NULLSAFE
    }

    fn key(&self) -> String {
        format!(
            "{NULLSAFE}(double_guard={},collection_fallbacks={})",
            self.config.double_guard, self.config.collection_fallbacks
        )
    }

    fn rewrite_member(&self, node: &Expr, receiver: Option<&Expr>, member: &str) -> Expr {
        // Static members have nothing to guard.
        let Some(receiver) = receiver else {
            return node.clone();
        };

        let guarded_receiver = self.rewrite(receiver);
        let fallback = fallback_for(node.ty(), &self.config);

        // A receiver with a collection fallback is never absent once guarded,
        // so the access reads through the guarded receiver.
        let access = if is_trivial_fallback(&fallback_for(receiver.ty(), &self.config)) {
            node.clone()
        } else {
            Expr::new(
                ExprKind::Member {
                    receiver: Some(guarded_receiver.clone()),
                    member: member.to_string(),
                },
                node.ty().clone(),
            )
        };

        let receiver_absent = is_default(guarded_receiver);
        let test = if self.config.double_guard && !is_trivial_fallback(&fallback) {
            Expr::new(
                ExprKind::Binary {
                    op: BinaryOp::OrElse,
                    left: receiver_absent,
                    right: is_default(access.clone()),
                },
                Type::Bool,
            )
        } else {
            receiver_absent
        };

        Expr::new(
            ExprKind::Conditional {
                test,
                if_true: fallback,
                if_false: access,
            },
            node.ty().clone(),
        )
    }
}
