//! Result types for sequence evaluation

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::QueryResult;
use crate::record::{FieldAccess, FieldPath, FieldValue, Record, Schema};
use crate::source::SourceIndex;

/// A record paired with the index of the source that produced it.
///
/// The `#` pseudo-field resolves to the source index; every other path
/// goes to the record.
#[derive(Debug, Clone, PartialEq)]
pub struct Tagged {
    source: SourceIndex,
    record: Arc<Record>,
}

impl Tagged {
    /// Tags a record with its source
    pub fn new(source: SourceIndex, record: Arc<Record>) -> Self {
        Self { source, record }
    }

    /// Returns the producing source's index
    pub fn source(&self) -> SourceIndex {
        self.source
    }

    /// Returns the record
    pub fn record(&self) -> &Arc<Record> {
        &self.record
    }

    /// Returns the record's schema
    pub fn schema(&self) -> &Arc<Schema> {
        self.record.schema()
    }

    /// Resolves a path given as a string (`#`, `title`, `author__name`)
    pub fn get(&self, path: &str) -> QueryResult<FieldValue> {
        self.field(&FieldPath::parse(path))
    }

    /// Drops the tag
    pub fn into_record(self) -> Arc<Record> {
        self.record
    }
}

impl FieldAccess for Tagged {
    fn field(&self, path: &FieldPath) -> QueryResult<FieldValue> {
        if path.is_source_index() {
            return Ok(FieldValue::Int(self.source.0 as i64));
        }
        self.record.lookup(path)
    }
}

/// Outcome of a delete across all sources
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteSummary {
    /// Rows deleted in total
    pub total: usize,
    /// Rows deleted per schema name
    pub per_schema: BTreeMap<String, usize>,
}

impl DeleteSummary {
    /// Creates an empty summary
    pub fn new() -> Self {
        Self::default()
    }

    /// Records rows deleted from one source
    pub fn add(&mut self, schema: &str, count: usize) {
        self.total += count;
        *self.per_schema.entry(schema.to_string()).or_insert(0) += count;
    }

    /// Returns true if nothing was deleted
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}
