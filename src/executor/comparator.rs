//! Ordering comparator
//!
//! Built once from an ordered list of keys, then reused for every
//! comparison. Values compare by kind rank first:
//! bool < number < text < date < related. Ints and floats compare
//! numerically. Nulls go to one end according to [`NullOrdering`].
//!
//! Two related records compare through their schema's default ordering
//! (primary key when none is declared). Related records whose schemas
//! declare different default orderings cannot be compared. The nested
//! comparator for a related schema is built on first use and shared by
//! every clone.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::errors::{QueryError, QueryResult};
use crate::observability::MetricsRegistry;
use crate::planner::OrderKey;
use crate::record::{FieldAccess, FieldValue, Record};

/// Where nulls sort relative to populated values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullOrdering {
    /// Null is greater than every value
    #[default]
    Greatest,
    /// Null is smaller than every value
    Least,
}

impl NullOrdering {
    pub fn as_str(&self) -> &'static str {
        match self {
            NullOrdering::Greatest => "greatest",
            NullOrdering::Least => "least",
        }
    }
}

/// A reusable multi-key comparator
#[derive(Debug, Clone)]
pub struct Comparator {
    keys: Vec<OrderKey>,
    nulls: NullOrdering,
    metrics: Option<Arc<MetricsRegistry>>,
    /// Nested comparators by related schema name
    related: Arc<RwLock<BTreeMap<String, Arc<Comparator>>>>,
}

impl Comparator {
    /// Creates a comparator over the given keys
    pub fn new(keys: Vec<OrderKey>, nulls: NullOrdering) -> Self {
        Self {
            keys,
            nulls,
            metrics: None,
            related: Arc::default(),
        }
    }

    /// Counts every comparison in the given registry
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Returns the ordering keys
    pub fn keys(&self) -> &[OrderKey] {
        &self.keys
    }

    pub fn null_ordering(&self) -> NullOrdering {
        self.nulls
    }

    /// Compares two items key by key; the first non-equal key decides.
    pub fn compare<T: FieldAccess + ?Sized>(&self, a: &T, b: &T) -> QueryResult<Ordering> {
        if let Some(metrics) = &self.metrics {
            metrics.increment_comparisons();
        }

        for key in &self.keys {
            let left = a.field(&key.field)?;
            let right = b.field(&key.field)?;
            let ordering = self.compare_values(&left, &right)?;
            let ordering = if key.is_descending() {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return Ok(ordering);
            }
        }

        Ok(Ordering::Equal)
    }

    /// Compares two values of possibly different kinds.
    pub fn compare_values(&self, a: &FieldValue, b: &FieldValue) -> QueryResult<Ordering> {
        use FieldValue::*;

        let ordering = match (a, b) {
            (Null, Null) => Ordering::Equal,
            (Null, _) => self.null_side(),
            (_, Null) => self.null_side().reverse(),
            (Bool(x), Bool(y)) => x.cmp(y),
            (Int(x), Int(y)) => x.cmp(y),
            (Int(x), Float(y)) => (*x as f64).total_cmp(y),
            (Float(x), Int(y)) => x.total_cmp(&(*y as f64)),
            (Float(x), Float(y)) => x.total_cmp(y),
            (Text(x), Text(y)) => x.cmp(y),
            (Date(x), Date(y)) => x.cmp(y),
            (Related(x), Related(y)) => return self.compare_related(x, y),
            _ => a.kind_rank().cmp(&b.kind_rank()),
        };

        Ok(ordering)
    }

    fn null_side(&self) -> Ordering {
        match self.nulls {
            NullOrdering::Greatest => Ordering::Greater,
            NullOrdering::Least => Ordering::Less,
        }
    }

    fn compare_related(&self, a: &Record, b: &Record) -> QueryResult<Ordering> {
        let (left, right) = (a.schema(), b.schema());
        if left.ordering() != right.ordering() {
            let choices: Vec<&str> = left
                .fields()
                .iter()
                .filter(|f| right.has_field(f))
                .map(String::as_str)
                .collect();
            return Err(QueryError::OrderingConflict(format!(
                "default ordering differs between {} and {}; common fields: {}",
                left.name(),
                right.name(),
                choices.join(", ")
            )));
        }

        self.related_comparator(left.name(), || left.comparison_ordering())
            .compare(a, b)
    }

    fn related_comparator(
        &self,
        schema: &str,
        keys: impl FnOnce() -> Vec<OrderKey>,
    ) -> Arc<Comparator> {
        if let Some(nested) = self
            .related
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(schema)
        {
            return Arc::clone(nested);
        }

        let mut related = self.related.write().unwrap_or_else(PoisonError::into_inner);
        let nested = related
            .entry(schema.to_string())
            .or_insert_with(|| Arc::new(Comparator::new(keys(), self.nulls)));
        Arc::clone(nested)
    }
}
