//! Predicate filtering
//!
//! Evaluates lookups (`exact`, `gt`, `in`, `icontains`, ...) against field
//! values. Related records match by primary key. Values of kinds that
//! cannot be ordered against each other never match a comparison lookup.

use std::cmp::Ordering;

use serde_json::Value;

use crate::errors::{QueryError, QueryResult};
use crate::planner::{LookupKind, Predicate};
use crate::record::{FieldAccess, FieldValue};

/// Evaluates predicates against records
pub struct PredicateFilter;

impl PredicateFilter {
    /// Checks if an item matches all predicates (AND semantics)
    pub fn matches<T: FieldAccess + ?Sized>(item: &T, predicates: &[Predicate]) -> QueryResult<bool> {
        for pred in predicates {
            if !Self::matches_predicate(item, pred)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Checks if an item matches a single predicate
    pub fn matches_predicate<T: FieldAccess + ?Sized>(item: &T, predicate: &Predicate) -> QueryResult<bool> {
        let actual = item.field(&predicate.field)?;
        Self::matches_value(&actual, predicate.lookup, &predicate.value)
    }

    /// Applies one lookup to an already resolved value
    pub fn matches_value(actual: &FieldValue, lookup: LookupKind, operand: &Value) -> QueryResult<bool> {
        if lookup == LookupKind::IsNull {
            return match operand {
                Value::Bool(b) => Ok(actual.is_null() == *b),
                other => Err(QueryError::invalid(format!(
                    "isnull expects a boolean, got {}",
                    other
                ))),
            };
        }

        if actual.is_null() {
            // Only `exact: null` matches a null
            return Ok(lookup == LookupKind::Exact && operand.is_null());
        }

        match lookup {
            LookupKind::Exact => Self::ordered(actual, operand, |o| o == Ordering::Equal),
            LookupKind::Gt => Self::ordered(actual, operand, |o| o == Ordering::Greater),
            LookupKind::Gte => Self::ordered(actual, operand, |o| o != Ordering::Less),
            LookupKind::Lt => Self::ordered(actual, operand, |o| o == Ordering::Less),
            LookupKind::Lte => Self::ordered(actual, operand, |o| o != Ordering::Greater),
            LookupKind::In => {
                let choices = Self::array(operand, "in")?;
                for choice in choices {
                    if Self::ordered(actual, choice, |o| o == Ordering::Equal)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            LookupKind::Range => {
                let bounds = Self::array(operand, "range")?;
                if bounds.len() != 2 {
                    return Err(QueryError::invalid("range expects exactly two bounds"));
                }
                Ok(Self::ordered(actual, &bounds[0], |o| o != Ordering::Less)?
                    && Self::ordered(actual, &bounds[1], |o| o != Ordering::Greater)?)
            }
            LookupKind::IExact => Self::text(actual, operand, true, |a, b| a == b),
            LookupKind::Contains => Self::text(actual, operand, false, |a, b| a.contains(b)),
            LookupKind::IContains => Self::text(actual, operand, true, |a, b| a.contains(b)),
            LookupKind::StartsWith => Self::text(actual, operand, false, |a, b| a.starts_with(b)),
            LookupKind::IStartsWith => Self::text(actual, operand, true, |a, b| a.starts_with(b)),
            LookupKind::EndsWith => Self::text(actual, operand, false, |a, b| a.ends_with(b)),
            LookupKind::IEndsWith => Self::text(actual, operand, true, |a, b| a.ends_with(b)),
            LookupKind::IsNull => Ok(false),
        }
    }

    fn ordered(actual: &FieldValue, operand: &Value, accept: impl Fn(Ordering) -> bool) -> QueryResult<bool> {
        let expected = actual.coerce_criterion(operand)?;
        Ok(Self::scalar_cmp(actual, &expected).map_or(false, accept))
    }

    fn text(
        actual: &FieldValue,
        operand: &Value,
        fold_case: bool,
        test: impl Fn(&str, &str) -> bool,
    ) -> QueryResult<bool> {
        let expected = FieldValue::from_json(operand)?;
        if expected.is_null() {
            return Ok(false);
        }
        let (mut a, mut b) = (actual.as_text(), expected.as_text());
        if fold_case {
            a = a.to_lowercase();
            b = b.to_lowercase();
        }
        Ok(test(&a, &b))
    }

    fn array<'a>(operand: &'a Value, lookup: &str) -> QueryResult<&'a Vec<Value>> {
        operand
            .as_array()
            .ok_or_else(|| QueryError::invalid(format!("{} expects an array, got {}", lookup, operand)))
    }

    /// Orders two scalars of compatible kinds; `None` when incomparable.
    fn scalar_cmp(a: &FieldValue, b: &FieldValue) -> Option<Ordering> {
        use FieldValue::*;

        match (a, b) {
            (Related(r), other) => Self::scalar_cmp(r.pk(), other),
            (other, Related(r)) => Self::scalar_cmp(other, r.pk()),
            (Bool(x), Bool(y)) => Some(x.cmp(y)),
            (Int(x), Int(y)) => Some(x.cmp(y)),
            (Int(x), Float(y)) => (*x as f64).partial_cmp(y),
            (Float(x), Int(y)) => x.partial_cmp(&(*y as f64)),
            (Float(x), Float(y)) => x.partial_cmp(y),
            (Text(x), Text(y)) => Some(x.cmp(y)),
            (Date(x), Date(y)) => Some(x.cmp(y)),
            _ => None,
        }
    }
}
