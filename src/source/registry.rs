//! Source registry and tagging
//!
//! Each source gets a stable index when it joins a composition. Indices
//! survive filtering, reordering and reversal, and are never handed out
//! twice within one lineage.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::SubQuery;
use crate::errors::{QueryError, QueryResult};
use crate::executor::PredicateFilter;
use crate::planner::{LookupKind, Predicate};
use crate::record::FieldValue;

/// Stable index of a source within a composition lineage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceIndex(pub usize);

impl fmt::Display for SourceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A source paired with its index
#[derive(Debug, Clone)]
pub struct TaggedSource {
    pub query: Arc<dyn SubQuery>,
    pub index: SourceIndex,
}

impl TaggedSource {
    /// Same index, different query
    pub fn with_query(&self, query: Arc<dyn SubQuery>) -> Self {
        Self {
            query,
            index: self.index,
        }
    }
}

/// Ordered list of tagged sources plus the next free index
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<TaggedSource>,
    next_index: usize,
}

impl SourceRegistry {
    /// Tags sources with their position
    pub fn tag(queries: Vec<Arc<dyn SubQuery>>) -> Self {
        let mut registry = Self::default();
        for query in queries {
            registry.append(query);
        }
        registry
    }

    /// Appends a source under a fresh index
    pub fn append(&mut self, query: Arc<dyn SubQuery>) -> SourceIndex {
        let index = SourceIndex(self.next_index);
        self.next_index += 1;
        self.sources.push(TaggedSource { query, index });
        index
    }

    /// Returns the tagged sources in current order
    pub fn sources(&self) -> &[TaggedSource] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Index the next appended source will receive
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    /// Same lineage, different source list
    pub fn with_sources(&self, sources: Vec<TaggedSource>) -> Self {
        Self {
            sources,
            next_index: self.next_index,
        }
    }

    /// Applies `f` to every query, keeping indices
    pub fn map_queries<F>(&self, f: F) -> Self
    where
        F: Fn(&dyn SubQuery) -> Arc<dyn SubQuery>,
    {
        self.with_sources(
            self.sources
                .iter()
                .map(|s| s.with_query(f(s.query.as_ref())))
                .collect(),
        )
    }

    /// Reverses the source order
    pub fn reversed(&self) -> Self {
        self.with_sources(self.sources.iter().rev().cloned().collect())
    }

    /// For each source, whether its index satisfies every predicate
    pub fn index_mask(&self, predicates: &[Predicate]) -> QueryResult<Vec<bool>> {
        self.sources
            .iter()
            .map(|s| index_matches(s.index, predicates))
            .collect()
    }

    /// Keeps sources whose index satisfies every predicate
    pub fn filter_by_index(&self, predicates: &[Predicate]) -> QueryResult<Self> {
        let mask = self.index_mask(predicates)?;
        Ok(self.select(&mask, true))
    }

    /// Keeps sources whose index fails at least one predicate
    pub fn exclude_by_index(&self, predicates: &[Predicate]) -> QueryResult<Self> {
        let mask = self.index_mask(predicates)?;
        Ok(self.select(&mask, false))
    }

    fn select(&self, mask: &[bool], keep: bool) -> Self {
        self.with_sources(
            self.sources
                .iter()
                .zip(mask)
                .filter(|(_, m)| **m == keep)
                .map(|(s, _)| s.clone())
                .collect(),
        )
    }
}

/// Evaluates `#` predicates against one index
fn index_matches(index: SourceIndex, predicates: &[Predicate]) -> QueryResult<bool> {
    let actual = FieldValue::Int(index.0 as i64);
    for pred in predicates {
        pred.validate_source_lookup()?;
        let operand = cast_index_operand(pred.lookup, &pred.value)?;
        if !PredicateFilter::matches_value(&actual, pred.lookup, &operand)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Numeric lookups need integers; string lookups compare text forms.
fn cast_index_operand(lookup: LookupKind, value: &Value) -> QueryResult<Value> {
    match lookup {
        LookupKind::In | LookupKind::Range => {
            let items = value.as_array().ok_or_else(|| {
                QueryError::invalid(format!("'{}' expects a list of indices", lookup.name()))
            })?;
            items
                .iter()
                .map(cast_index)
                .collect::<QueryResult<Vec<_>>>()
                .map(Value::Array)
        }
        LookupKind::Exact
        | LookupKind::Gt
        | LookupKind::Gte
        | LookupKind::Lt
        | LookupKind::Lte => cast_index(value),
        _ => Ok(value.clone()),
    }
}

fn cast_index(value: &Value) -> QueryResult<Value> {
    match value {
        Value::Number(n) if n.is_i64() => Ok(value.clone()),
        Value::Number(n) => n
            .as_f64()
            .filter(|f| f.fract() == 0.0)
            .map(|f| Value::from(f as i64))
            .ok_or_else(|| QueryError::invalid(format!("'{}' is not a source index", n))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| QueryError::invalid(format!("'{}' is not a source index", s))),
        other => Err(QueryError::invalid(format!(
            "'{}' is not a source index",
            other
        ))),
    }
}
