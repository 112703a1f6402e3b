//! Runtime values produced and consumed by query providers.
//!
//! Records and sequences sit behind `Arc` so values can be cloned freely
//! while a provider walks data.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Type;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// The absence marker.
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Str(String),
    Date(NaiveDate),
    Record(Arc<Record>),
    Seq(Arc<Vec<Value>>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn seq(values: Vec<Value>) -> Self {
        Value::Seq(Arc::new(values))
    }

    pub fn record(record: Record) -> Self {
        Value::Record(Arc::new(record))
    }

    /// Short, stable name of the runtime shape (used in error messages).
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int32(_) => "i32",
            Value::Int64(_) => "i64",
            Value::Float64(_) => "f64",
            Value::Str(_) => "str",
            Value::Date(_) => "date",
            Value::Record(_) => "record",
            Value::Seq(_) => "sequence",
        }
    }

    /// Whether this value may live in a slot of type `ty`.
    pub fn conforms_to(&self, ty: &Type) -> bool {
        match (self, ty) {
            (Value::Null, t) => !t.is_value_type(),
            (Value::Bool(_), Type::Bool)
            | (Value::Int32(_), Type::Int32)
            | (Value::Int64(_), Type::Int64)
            | (Value::Float64(_), Type::Float64)
            | (Value::Str(_), Type::Str)
            | (Value::Date(_), Type::Date) => true,
            (Value::Record(r), Type::Record(name)) => &r.type_name == name,
            (Value::Seq(items), t) => match t.element_type() {
                Some(elem) => items.iter().all(|v| v.conforms_to(elem)),
                None => false,
            },
            _ => false,
        }
    }

    pub fn as_seq(&self) -> Option<&Arc<Vec<Value>>> {
        match self {
            Value::Seq(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Total order used by sorting operators.
    ///
    /// Nulls are sorted first, then values are compared by type. Values of
    /// unrelated shapes compare equal so a stable sort keeps their order.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        use Value::*;

        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Null, _) => Ordering::Less,
            (_, Null) => Ordering::Greater,
            (Bool(x), Bool(y)) => x.cmp(y),
            (Int32(x), Int32(y)) => x.cmp(y),
            (Int64(x), Int64(y)) => x.cmp(y),
            (Float64(x), Float64(y)) => {
                if x.is_nan() && y.is_nan() {
                    Ordering::Equal
                } else if x.is_nan() {
                    Ordering::Greater
                } else if y.is_nan() {
                    Ordering::Less
                } else {
                    x.partial_cmp(y).unwrap_or(Ordering::Equal)
                }
            }
            (Str(x), Str(y)) => x.cmp(y),
            (Date(x), Date(y)) => x.cmp(y),
            _ => Ordering::Equal,
        }
    }

    /// Read a built-in member off a non-record value (`year` of a date,
    /// `count` of a sequence, `length` of a string).
    pub fn builtin_member(&self, member: &str) -> Option<Value> {
        match (self, member) {
            (Value::Date(d), "year") => Some(Value::Int32(d.year())),
            (Value::Date(d), "month") => Some(Value::Int32(d.month() as i32)),
            (Value::Date(d), "day") => Some(Value::Int32(d.day() as i32)),
            (Value::Seq(items), "count") => Some(Value::Int32(items.len() as i32)),
            (Value::Str(s), "length") => Some(Value::Int32(s.chars().count() as i32)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}L"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Date(d) => write!(f, "{d}"),
            Value::Record(r) => write!(f, "{}{{..}}", r.type_name),
            Value::Seq(items) => write!(f, "[{} items]", items.len()),
        }
    }
}

/// A named bag of fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub type_name: String,
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field assignment.
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Decode one field into a Rust type.
    pub fn field<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self.get(name).ok_or_else(|| Error::UnknownMember {
            ty: self.type_name.clone(),
            member: name.to_string(),
        })?;
        T::from_value(value)
    }
}

/// Conversion out of a runtime value, used by typed query views.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

fn mismatch(expected: &str, found: &Value) -> Error {
    Error::TypeMismatch(format!("expected {expected}, found {}", found.kind()))
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch("bool", other)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int32(v) => Ok(*v),
            other => Err(mismatch("i32", other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int64(v) => Ok(*v),
            Value::Int32(v) => Ok(i64::from(*v)),
            other => Err(mismatch("i64", other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Float64(v) => Ok(*v),
            other => Err(mismatch("f64", other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Str(s) => Ok(s.clone()),
            other => Err(mismatch("str", other)),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Date(d) => Ok(*d),
            other => Err(mismatch("date", other)),
        }
    }
}

impl FromValue for Arc<Record> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Record(r) => Ok(Arc::clone(r)),
            other => Err(mismatch("record", other)),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Seq(items) => items.iter().map(T::from_value).collect(),
            other => Err(mismatch("sequence", other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::record(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nulls_sort_first() {
        let mut values = vec![Value::Int32(3), Value::Null, Value::Int32(1)];
        values.sort_by(|a, b| a.sort_cmp(b));
        assert_eq!(values, vec![Value::Null, Value::Int32(1), Value::Int32(3)]);
    }

    #[test]
    fn date_members() {
        let d = Value::Date(NaiveDate::from_ymd_opt(1977, 5, 25).expect("valid date"));
        assert_eq!(d.builtin_member("year"), Some(Value::Int32(1977)));
        assert_eq!(d.builtin_member("month"), Some(Value::Int32(5)));
        assert_eq!(d.builtin_member("day"), Some(Value::Int32(25)));
        assert_eq!(d.builtin_member("weekday"), None);
    }

    #[test]
    fn decode_record_fields() {
        let rec = Record::new("B")
            .with("year", Value::Int32(1980))
            .with("others", Value::seq(vec![Value::Int32(3), Value::Int32(6)]));
        assert_eq!(rec.field::<i32>("year").unwrap(), 1980);
        assert_eq!(rec.field::<Vec<i32>>("others").unwrap(), vec![3, 6]);
        assert!(matches!(
            rec.field::<i32>("missing"),
            Err(Error::UnknownMember { .. })
        ));
        assert_eq!(Option::<i32>::from_value(&Value::Null).unwrap(), None);
    }

    #[test]
    fn sequences_conform_to_every_list_shape() {
        let v = Value::seq(vec![Value::Int32(1)]);
        assert!(v.conforms_to(&Type::sequence(Type::Int32)));
        assert!(v.conforms_to(&Type::list(Type::Int32)));
        assert!(!v.conforms_to(&Type::sequence(Type::Str)));
        assert!(Value::Null.conforms_to(&Type::Str));
        assert!(!Value::Null.conforms_to(&Type::Int32));
    }
}
