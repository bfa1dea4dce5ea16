//! Iterators handed out by a composition

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::errors::QueryResult;
use crate::executor::{ConcatIter, MergeIter, Tagged};
use crate::record::{FieldAccess, FieldPath, SOURCE_FIELD};

enum Inner {
    Empty,
    Cached(std::vec::IntoIter<Tagged>),
    Concat(ConcatIter),
    Merge(MergeIter),
}

/// Lazy stream of tagged records
pub struct SequenceIter {
    inner: Inner,
}

impl SequenceIter {
    pub(crate) fn empty() -> Self {
        Self { inner: Inner::Empty }
    }

    pub(crate) fn cached(rows: Vec<Tagged>) -> Self {
        Self {
            inner: Inner::Cached(rows.into_iter()),
        }
    }

    pub(crate) fn concat(iter: ConcatIter) -> Self {
        Self {
            inner: Inner::Concat(iter),
        }
    }

    pub(crate) fn merge(iter: MergeIter) -> Self {
        Self {
            inner: Inner::Merge(iter),
        }
    }
}

impl std::fmt::Debug for SequenceIter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceIter").finish_non_exhaustive()
    }
}

impl Iterator for SequenceIter {
    type Item = QueryResult<Tagged>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            Inner::Empty => None,
            Inner::Cached(rows) => rows.next().map(Ok),
            Inner::Concat(iter) => iter.next(),
            Inner::Merge(iter) => iter.next(),
        }
    }
}

/// Projects each record to a JSON map that includes its `#`
pub struct ValuesIter {
    rows: SequenceIter,
    fields: Vec<FieldPath>,
}

impl ValuesIter {
    pub(crate) fn new(rows: SequenceIter, fields: Vec<FieldPath>) -> Self {
        Self { rows, fields }
    }

    fn project(&self, row: &Tagged) -> QueryResult<Map<String, Value>> {
        let mut map = Map::new();
        map.insert(SOURCE_FIELD.to_string(), Value::from(row.source().0));

        if self.fields.is_empty() {
            let schema = row.schema();
            let relations: BTreeSet<&str> = schema
                .fields()
                .iter()
                .filter(|f| schema.relation(f).is_some())
                .map(String::as_str)
                .collect();
            for field in schema.fields() {
                let value = row.record().lookup(&FieldPath::parse(field))?;
                if relations.contains(field.as_str()) {
                    map.insert(format!("{}_id", field), value.to_json());
                } else {
                    map.insert(field.clone(), value.to_json());
                }
            }
        } else {
            for path in &self.fields {
                map.insert(path.to_string(), row.field(path)?.to_json());
            }
        }

        Ok(map)
    }
}

impl Iterator for ValuesIter {
    type Item = QueryResult<Map<String, Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(row.and_then(|row| self.project(&row)))
    }
}
