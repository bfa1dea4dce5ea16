//! Field values carried by records
//!
//! Supported kinds:
//! - null (missing or unset)
//! - bool, int (i64), float (f64), text
//! - date (`chrono::NaiveDate`)
//! - related record (a composite value with its own schema)

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::Value;

use super::record::Record;
use crate::errors::{QueryError, QueryResult};

/// A single field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    /// A related record, compared through its schema's default ordering
    Related(Arc<Record>),
}

impl FieldValue {
    /// Returns true for null
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Returns the related record, if any
    pub fn as_related(&self) -> Option<&Arc<Record>> {
        match self {
            FieldValue::Related(r) => Some(r),
            _ => None,
        }
    }

    /// Returns the kind name for error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Int(_) => "int",
            FieldValue::Float(_) => "float",
            FieldValue::Text(_) => "text",
            FieldValue::Date(_) => "date",
            FieldValue::Related(_) => "related",
        }
    }

    /// Rank used when two values of different kinds meet.
    ///
    /// bool < number < text < date < related. Null is placed by policy.
    pub(crate) fn kind_rank(&self) -> u8 {
        match self {
            FieldValue::Null => 0,
            FieldValue::Bool(_) => 1,
            FieldValue::Int(_) | FieldValue::Float(_) => 2,
            FieldValue::Text(_) => 3,
            FieldValue::Date(_) => 4,
            FieldValue::Related(_) => 5,
        }
    }

    /// Converts to JSON. Related records collapse to their primary key.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Int(i) => Value::from(*i),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            FieldValue::Related(r) => r.pk().to_json(),
        }
    }

    /// Converts a JSON scalar into a value without any context.
    pub fn from_json(value: &Value) -> QueryResult<Self> {
        match value {
            Value::Null => Ok(FieldValue::Null),
            Value::Bool(b) => Ok(FieldValue::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(FieldValue::Int(i))
                } else {
                    n.as_f64()
                        .map(FieldValue::Float)
                        .ok_or_else(|| QueryError::invalid(format!("unrepresentable number {}", n)))
                }
            }
            Value::String(s) => Ok(FieldValue::Text(s.clone())),
            other => Err(QueryError::invalid(format!(
                "expected a scalar, got {}",
                other
            ))),
        }
    }

    /// Converts a JSON criterion into a value comparable with `self`.
    ///
    /// Dates are parsed from `YYYY-MM-DD` strings and related records are
    /// matched by primary key.
    pub fn coerce_criterion(&self, value: &Value) -> QueryResult<Self> {
        match (self, value) {
            (FieldValue::Date(_), Value::String(s)) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(FieldValue::Date)
                .map_err(|e| QueryError::invalid(format!("'{}' is not a date: {}", s, e))),
            (FieldValue::Related(r), other) => r.pk().coerce_criterion(other),
            (_, other) => FieldValue::from_json(other),
        }
    }

    /// Text form used by the string lookups.
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Related(r) => r.pk().as_text(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::Related(r) => write!(f, "{}({})", r.schema().name(), r.pk()),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int(v.into())
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(v: NaiveDate) -> Self {
        FieldValue::Date(v)
    }
}

impl From<Arc<Record>> for FieldValue {
    fn from(v: Arc<Record>) -> Self {
        FieldValue::Related(v)
    }
}

impl From<Record> for FieldValue {
    fn from(v: Record) -> Self {
        FieldValue::Related(Arc::new(v))
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FieldValue::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_scalars() {
        assert_eq!(FieldValue::from_json(&json!(3)).unwrap(), FieldValue::Int(3));
        assert_eq!(
            FieldValue::from_json(&json!("a")).unwrap(),
            FieldValue::Text("a".into())
        );
        assert_eq!(FieldValue::from_json(&json!(null)).unwrap(), FieldValue::Null);
        assert!(FieldValue::from_json(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_coerce_date() {
        let current = FieldValue::Date(NaiveDate::from_ymd_opt(2001, 6, 12).unwrap());
        let coerced = current.coerce_criterion(&json!("1990-08-14")).unwrap();
        assert_eq!(
            coerced,
            FieldValue::Date(NaiveDate::from_ymd_opt(1990, 8, 14).unwrap())
        );
        assert!(current.coerce_criterion(&json!("not a date")).is_err());
    }

    #[test]
    fn test_option_conversion() {
        let none: Option<i64> = None;
        assert!(FieldValue::from(none).is_null());
        assert_eq!(FieldValue::from(Some(20i64)), FieldValue::Int(20));
    }

    #[test]
    fn test_date_to_json() {
        let d = FieldValue::Date(NaiveDate::from_ymd_opt(1979, 1, 1).unwrap());
        assert_eq!(d.to_json(), json!("1979-01-01"));
    }
}
