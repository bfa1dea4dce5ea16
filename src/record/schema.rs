//! Record schemas
//!
//! A schema names a record type and declares:
//! - the primary key field (default `id`)
//! - plain fields and relation fields (with the related schema)
//! - an optional default ordering, used when a related record of this
//!   schema is itself an ordering key
//! - an optional "latest by" field for earliest()/latest()

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::{QueryError, QueryResult};
use crate::planner::OrderKey;

/// Name of the primary key alias usable in any path
pub const PK_ALIAS: &str = "pk";

/// Schema of one record type
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    name: String,
    pk: String,
    fields: Vec<String>,
    relations: BTreeMap<String, Arc<Schema>>,
    ordering: Vec<OrderKey>,
    latest_by: Option<String>,
}

impl Schema {
    /// Creates a schema with only an `id` primary key
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pk: "id".to_string(),
            fields: vec!["id".to_string()],
            relations: BTreeMap::new(),
            ordering: Vec::new(),
            latest_by: None,
        }
    }

    /// Renames the primary key field
    pub fn with_pk(mut self, pk: impl Into<String>) -> Self {
        let pk = pk.into();
        self.fields.retain(|f| *f != self.pk);
        if !self.fields.contains(&pk) {
            self.fields.insert(0, pk.clone());
        }
        self.pk = pk;
        self
    }

    /// Adds plain fields
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for field in fields {
            let field = field.into();
            if !self.fields.contains(&field) {
                self.fields.push(field);
            }
        }
        self
    }

    /// Adds a relation field pointing at another schema
    pub fn with_relation(mut self, field: impl Into<String>, target: &Arc<Schema>) -> Self {
        let field = field.into();
        if !self.fields.contains(&field) {
            self.fields.push(field.clone());
        }
        self.relations.insert(field, Arc::clone(target));
        self
    }

    /// Sets the default ordering (`-` prefix for descending)
    pub fn with_ordering<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ordering = keys.into_iter().map(|k| OrderKey::parse(k.as_ref())).collect();
        self
    }

    /// Sets the field used by earliest()/latest() when none is given
    pub fn with_latest_by(mut self, field: impl Into<String>) -> Self {
        self.latest_by = Some(field.into());
        self
    }

    /// Wraps the schema for sharing between records
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Returns the schema name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the primary key field name
    pub fn pk(&self) -> &str {
        &self.pk
    }

    /// Returns all field names, primary key first
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Returns the declared default ordering (possibly empty)
    pub fn ordering(&self) -> &[OrderKey] {
        &self.ordering
    }

    /// Returns the ordering used to compare records of this schema:
    /// the default ordering, or the primary key when none is declared
    pub fn comparison_ordering(&self) -> Vec<OrderKey> {
        if self.ordering.is_empty() {
            vec![OrderKey::asc(PK_ALIAS)]
        } else {
            self.ordering.clone()
        }
    }

    /// Returns the latest-by field, if declared
    pub fn latest_by(&self) -> Option<&str> {
        self.latest_by.as_deref()
    }

    /// Returns the related schema of a relation field
    pub fn relation(&self, field: &str) -> Option<&Arc<Schema>> {
        self.relations.get(field)
    }

    /// Maps the `pk` alias to the real primary key name
    pub fn canonical<'a>(&'a self, field: &'a str) -> &'a str {
        if field == PK_ALIAS {
            &self.pk
        } else {
            field
        }
    }

    /// Returns true if the field is declared (including `pk` and `<relation>_id`)
    pub fn has_field(&self, field: &str) -> bool {
        let field = self.canonical(field);
        self.fields.iter().any(|f| f == field) || self.relation_id_target(field).is_some()
    }

    /// For `author_id`, returns `author` when `author` is a relation
    pub fn relation_id_target<'a>(&self, field: &'a str) -> Option<&'a str> {
        field
            .strip_suffix("_id")
            .filter(|rel| self.relations.contains_key(*rel))
    }

    /// Checks that a segmented path resolves on this schema.
    ///
    /// Fails with a field error naming the full path.
    pub fn check_path(&self, segments: &[String]) -> QueryResult<()> {
        self.check_segments(segments)
            .map_err(|_| QueryError::field(&self.name, segments.join("__")))
    }

    fn check_segments(&self, segments: &[String]) -> Result<(), ()> {
        let (head, rest) = segments.split_first().ok_or(())?;
        if !self.has_field(head) {
            return Err(());
        }
        if rest.is_empty() {
            return Ok(());
        }
        match self.relation(self.canonical(head)) {
            Some(target) => target.check_segments(rest),
            None => Err(()),
        }
    }
}
