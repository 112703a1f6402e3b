//! Static types carried by every expression node.
//!
//! A handful of value types with a zero value, and reference types whose
//! zero value is the absence marker (`Value::Null`). `Sequence` and `Collection` are the two abstract
//! collection shapes; `List` is the concrete list that backs them.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Bool,
    Int32,
    Int64,
    Float64,
    Date,
    Str,
    /// Named record (reference type).
    Record(String),
    /// Concrete, materialized list.
    List(Box<Type>),
    /// Abstract lazily-iterable sequence of `T`.
    Sequence(Box<Type>),
    /// Abstract sized collection of `T`.
    Collection(Box<Type>),
}

impl Type {
    pub fn record(name: impl Into<String>) -> Self {
        Type::Record(name.into())
    }

    pub fn list(elem: Type) -> Self {
        Type::List(Box::new(elem))
    }

    pub fn sequence(elem: Type) -> Self {
        Type::Sequence(Box::new(elem))
    }

    pub fn collection(elem: Type) -> Self {
        Type::Collection(Box::new(elem))
    }

    /// Value types can never hold the absence marker.
    pub fn is_value_type(&self) -> bool {
        matches!(
            self,
            Type::Bool | Type::Int32 | Type::Int64 | Type::Float64 | Type::Date
        )
    }

    /// True for any of the three list-like shapes.
    pub fn is_enumerable(&self) -> bool {
        self.element_type().is_some()
    }

    pub fn element_type(&self) -> Option<&Type> {
        match self {
            Type::List(t) | Type::Sequence(t) | Type::Collection(t) => Some(t),
            _ => None,
        }
    }

    /// The value a slot of this type holds before anything is assigned.
    pub fn zero_value(&self) -> Value {
        match self {
            Type::Bool => Value::Bool(false),
            Type::Int32 => Value::Int32(0),
            Type::Int64 => Value::Int64(0),
            Type::Float64 => Value::Float64(0.0),
            Type::Date => Value::Date(NaiveDate::MIN),
            Type::Str
            | Type::Record(_)
            | Type::List(_)
            | Type::Sequence(_)
            | Type::Collection(_) => Value::Null,
        }
    }

    /// Whether a value of `other` may be stored in a slot of `self` without
    /// conversion beyond an upcast.
    ///
    /// A list upcasts to either abstract shape, a collection to a sequence.
    pub fn is_assignable_from(&self, other: &Type) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (Type::Sequence(a), Type::List(b))
            | (Type::Sequence(a), Type::Collection(b))
            | (Type::Collection(a), Type::List(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => write!(f, "bool"),
            Type::Int32 => write!(f, "i32"),
            Type::Int64 => write!(f, "i64"),
            Type::Float64 => write!(f, "f64"),
            Type::Date => write!(f, "date"),
            Type::Str => write!(f, "str"),
            Type::Record(name) => write!(f, "{name}"),
            Type::List(t) => write!(f, "List<{t}>"),
            Type::Sequence(t) => write!(f, "Sequence<{t}>"),
            Type::Collection(t) => write!(f, "Collection<{t}>"),
        }
    }
}
