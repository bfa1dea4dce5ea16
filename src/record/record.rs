//! Records and field paths

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::schema::Schema;
use super::value::FieldValue;
use crate::errors::{QueryError, QueryResult};

/// Separator between path segments (`author__name`)
pub const LOOKUP_SEP: &str = "__";

/// Pseudo-field naming the source index of an element
pub const SOURCE_FIELD: &str = "#";

/// A segmented field path such as `author__name`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parses a path; `__` and `.` both separate segments
    pub fn parse(raw: &str) -> Self {
        let segments = raw
            .split(LOOKUP_SEP)
            .flat_map(|s| s.split('.'))
            .map(str::to_string)
            .collect();
        Self { segments }
    }

    /// Builds a path from already split segments
    pub fn from_segments(segments: Vec<String>) -> Self {
        Self { segments }
    }

    /// Returns the segments
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// True for the `#` pseudo-field
    pub fn is_source_index(&self) -> bool {
        self.segments.len() == 1 && self.segments[0] == SOURCE_FIELD
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join(LOOKUP_SEP))
    }
}

/// Read access to fields by path
pub trait FieldAccess {
    /// Resolves a field path to a value
    fn field(&self, path: &FieldPath) -> QueryResult<FieldValue>;
}

impl<T: FieldAccess + ?Sized> FieldAccess for Arc<T> {
    fn field(&self, path: &FieldPath) -> QueryResult<FieldValue> {
        (**self).field(path)
    }
}

/// A record produced by a source
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    schema: Arc<Schema>,
    values: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Creates an empty record of the given schema
    pub fn new(schema: &Arc<Schema>) -> Self {
        Self {
            schema: Arc::clone(schema),
            values: BTreeMap::new(),
        }
    }

    /// Sets a field, builder style
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(field, value);
        self
    }

    /// Sets a field
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        let field = field.into();
        let field = self.schema.canonical(&field).to_string();
        self.values.insert(field, value.into());
    }

    /// Returns the schema
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Returns the stored value of a top-level field
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(self.schema.canonical(field))
    }

    /// Returns the primary key (null when unset)
    pub fn pk(&self) -> &FieldValue {
        static NULL: FieldValue = FieldValue::Null;
        self.values.get(self.schema.pk()).unwrap_or(&NULL)
    }

    /// Returns all stored values
    pub fn values(&self) -> &BTreeMap<String, FieldValue> {
        &self.values
    }

    /// Resolves a field path, following relations.
    ///
    /// Unknown fields fail with a field error; declared but unset fields
    /// resolve to null.
    pub fn lookup(&self, path: &FieldPath) -> QueryResult<FieldValue> {
        self.resolve(path.segments())
            .map_err(|_| QueryError::field(self.schema.name(), path.to_string()))
    }

    fn resolve(&self, segments: &[String]) -> Result<FieldValue, ()> {
        let (head, rest) = segments.split_first().ok_or(())?;
        let name = self.schema.canonical(head);

        let value = if let Some(v) = self.values.get(name) {
            v.clone()
        } else if let Some(rel) = self.schema.relation_id_target(name) {
            match self.values.get(rel) {
                Some(FieldValue::Related(r)) => r.pk().clone(),
                _ => FieldValue::Null,
            }
        } else if self.schema.has_field(name) {
            FieldValue::Null
        } else {
            return Err(());
        };

        if rest.is_empty() {
            return Ok(value);
        }

        match value {
            FieldValue::Related(r) => r.resolve(rest),
            FieldValue::Null => {
                let target = self.schema.relation(name).ok_or(())?;
                target.check_path(rest).map_err(|_| ())?;
                Ok(FieldValue::Null)
            }
            _ => Err(()),
        }
    }
}

impl FieldAccess for Record {
    fn field(&self, path: &FieldPath) -> QueryResult<FieldValue> {
        self.lookup(path)
    }
}
