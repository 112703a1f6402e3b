//! Convenient re-exports for downstream crates.

pub use crate::config::{EngineConfig, RewriteConfig};
pub use crate::error::{Error, Result};
pub use crate::expr::{BinaryOp, Expr, ExprKind, Method, Param};
pub use crate::hash::{fingerprint, Hash256};
pub use crate::query::{QueryProvider, QueryRef, Queryable, QueryableExt, TypedQuery};
pub use crate::types::Type;
pub use crate::value::{FromValue, Record, Value};
