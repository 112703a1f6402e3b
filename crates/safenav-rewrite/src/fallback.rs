//! Fallback values substituted when a member chain breaks.
//!
//! | result type       | fallback                                   |
//! |-------------------|--------------------------------------------|
//! | `Sequence<T>`     | new empty `List<T>`, upcast to `Sequence<T>`   |
//! | `Collection<T>`   | new empty `List<T>`, upcast to `Collection<T>` |
//! | anything else     | `default(T)`                               |
//!
//! Only the two abstract shapes qualify. A member declared as a concrete
//! `List<T>` falls back to its zero value like any other reference type.

use safenav_core::config::RewriteConfig;
use safenav_core::expr::{Expr, ExprKind};
use safenav_core::types::Type;

/// Fallback expression of exactly `ty`.
pub fn default_for(ty: &Type) -> Expr {
    match ty {
        Type::Sequence(elem) | Type::Collection(elem) => Expr::new(
            ExprKind::Convert(Expr::new_list(elem.as_ref().clone())),
            ty.clone(),
        ),
        _ => Expr::default_of(ty.clone()),
    }
}

/// `default_for`, honoring `collection_fallbacks`.
pub fn fallback_for(ty: &Type, config: &RewriteConfig) -> Expr {
    if config.collection_fallbacks {
        default_for(ty)
    } else {
        Expr::default_of(ty.clone())
    }
}

/// True when the fallback is the type's plain zero value.
pub fn is_trivial_fallback(fallback: &Expr) -> bool {
    matches!(fallback.kind(), ExprKind::Default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abstract_collections_get_empty_lists() {
        for ty in [
            Type::sequence(Type::Int32),
            Type::collection(Type::record("A")),
        ] {
            let fb = default_for(&ty);
            assert_eq!(fb.ty(), &ty);
            assert!(!is_trivial_fallback(&fb));
            match fb.kind() {
                ExprKind::Convert(inner) => {
                    assert!(matches!(inner.kind(), ExprKind::NewList));
                    assert_eq!(inner.ty().element_type(), ty.element_type());
                }
                other => panic!("unexpected fallback {other:?}"),
            }
        }
    }

    #[test]
    fn everything_else_gets_its_zero_value() {
        for ty in [
            Type::Int32,
            Type::Date,
            Type::Str,
            Type::record("A"),
            Type::list(Type::Int32),
        ] {
            let fb = default_for(&ty);
            assert!(is_trivial_fallback(&fb), "{ty}");
            assert_eq!(fb.ty(), &ty);
        }
    }

    #[test]
    fn collection_fallbacks_can_be_disabled() {
        let cfg = RewriteConfig {
            collection_fallbacks: false,
            ..RewriteConfig::default()
        };
        let fb = fallback_for(&Type::sequence(Type::Int32), &cfg);
        assert!(is_trivial_fallback(&fb));
    }
}
