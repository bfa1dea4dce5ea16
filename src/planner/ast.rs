//! Query description structures
//!
//! Defines ordering keys and filter criteria shared by the planner, the
//! executor and the sources.

use std::fmt;

use serde_json::Value;

use crate::errors::{QueryError, QueryResult};
use crate::record::{FieldPath, LOOKUP_SEP, SOURCE_FIELD};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    /// Returns the opposite direction
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// One ordering key: a field path and a direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    /// Field to sort by (`#` for the source index)
    pub field: FieldPath,
    /// Sort direction
    pub direction: SortDirection,
}

impl OrderKey {
    /// Parses `title` or `-title`
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix('-') {
            Some(rest) => Self::desc(rest),
            None => Self::asc(raw),
        }
    }

    pub fn asc(field: &str) -> Self {
        Self {
            field: FieldPath::parse(field),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: FieldPath::parse(field),
            direction: SortDirection::Desc,
        }
    }

    /// True if this key orders by source index
    pub fn is_source_index(&self) -> bool {
        self.field.is_source_index()
    }

    pub fn is_descending(&self) -> bool {
        self.direction == SortDirection::Desc
    }

    /// Returns the same key in the opposite direction
    pub fn reversed(&self) -> Self {
        Self {
            field: self.field.clone(),
            direction: self.direction.flipped(),
        }
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_descending() {
            write!(f, "-")?;
        }
        write!(f, "{}", self.field)
    }
}

/// Parses a list of `-field` strings
pub fn parse_order_keys<I, S>(fields: I) -> Vec<OrderKey>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fields.into_iter().map(|f| OrderKey::parse(f.as_ref())).collect()
}

/// Removes every `#` key; what remains is pushed down to sources
pub fn strip_source_keys(keys: &[OrderKey]) -> Vec<OrderKey> {
    keys.iter().filter(|k| !k.is_source_index()).cloned().collect()
}

/// Lookup kinds understood in criteria keys (`pages__gt`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    Exact,
    IExact,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Range,
    Contains,
    IContains,
    StartsWith,
    IStartsWith,
    EndsWith,
    IEndsWith,
    IsNull,
}

impl LookupKind {
    /// Maps a lookup suffix to its kind
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "exact" => LookupKind::Exact,
            "iexact" => LookupKind::IExact,
            "gt" => LookupKind::Gt,
            "gte" => LookupKind::Gte,
            "lt" => LookupKind::Lt,
            "lte" => LookupKind::Lte,
            "in" => LookupKind::In,
            "range" => LookupKind::Range,
            "contains" => LookupKind::Contains,
            "icontains" => LookupKind::IContains,
            "startswith" => LookupKind::StartsWith,
            "istartswith" => LookupKind::IStartsWith,
            "endswith" => LookupKind::EndsWith,
            "iendswith" => LookupKind::IEndsWith,
            "isnull" => LookupKind::IsNull,
            _ => return None,
        };
        Some(kind)
    }

    /// Returns the lookup suffix
    pub fn name(&self) -> &'static str {
        match self {
            LookupKind::Exact => "exact",
            LookupKind::IExact => "iexact",
            LookupKind::Gt => "gt",
            LookupKind::Gte => "gte",
            LookupKind::Lt => "lt",
            LookupKind::Lte => "lte",
            LookupKind::In => "in",
            LookupKind::Range => "range",
            LookupKind::Contains => "contains",
            LookupKind::IContains => "icontains",
            LookupKind::StartsWith => "startswith",
            LookupKind::IStartsWith => "istartswith",
            LookupKind::EndsWith => "endswith",
            LookupKind::IEndsWith => "iendswith",
            LookupKind::IsNull => "isnull",
        }
    }

    /// Lookups allowed against the source index
    pub fn supports_source_index(&self) -> bool {
        !matches!(self, LookupKind::IsNull)
    }
}

/// A single criterion: field path, lookup kind and JSON operand
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Field path (without the lookup suffix)
    pub field: FieldPath,
    /// Lookup kind
    pub lookup: LookupKind,
    /// Operand
    pub value: Value,
}

impl Predicate {
    /// Parses `field__path__lookup`. A trailing segment that is not a
    /// known lookup stays part of the path.
    pub fn parse(key: &str, value: Value) -> Self {
        let mut segments: Vec<String> = key.split(LOOKUP_SEP).map(str::to_string).collect();
        let lookup = match segments.last().and_then(|s| LookupKind::from_name(s)) {
            Some(kind) if segments.len() > 1 => {
                segments.pop();
                kind
            }
            _ => LookupKind::Exact,
        };
        let field = if segments.len() == 1 {
            FieldPath::parse(&segments[0])
        } else {
            FieldPath::from_segments(segments)
        };
        Self {
            field,
            lookup,
            value,
        }
    }

    /// True if the predicate targets the `#` pseudo-field in any form
    pub fn targets_source_index(&self) -> bool {
        self.field
            .segments()
            .first()
            .map_or(false, |s| s == SOURCE_FIELD)
    }

    /// Validates a `#` predicate: no sub-path, supported lookup only
    pub fn validate_source_lookup(&self) -> QueryResult<()> {
        let segments = self.field.segments();
        if segments.len() > 1 {
            return Err(QueryError::unsupported_lookup(segments[1..].join(LOOKUP_SEP)));
        }
        if !self.lookup.supports_source_index() {
            return Err(QueryError::unsupported_lookup(self.lookup.name()));
        }
        Ok(())
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.lookup.name(), self.value)
    }
}

/// A conjunction of predicates, as passed to filter()/exclude()
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    predicates: Vec<Predicate>,
}

impl Criteria {
    /// Creates empty criteria
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `key = value`, where key may carry a lookup suffix
    pub fn and(mut self, key: &str, value: Value) -> Self {
        self.predicates.push(Predicate::parse(key, value));
        self
    }

    /// Adds an already parsed predicate
    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Returns the predicates
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Splits into `#` predicates and criteria for the sources.
    ///
    /// Fails immediately on unsupported `#` lookups.
    pub fn split_source_index(&self) -> QueryResult<(Vec<Predicate>, Criteria)> {
        let mut source = Vec::new();
        let mut rest = Criteria::new();
        for pred in &self.predicates {
            if pred.targets_source_index() {
                pred.validate_source_lookup()?;
                source.push(pred.clone());
            } else {
                rest.predicates.push(pred.clone());
            }
        }
        Ok((source, rest))
    }
}

impl<K: AsRef<str>> FromIterator<(K, Value)> for Criteria {
    fn from_iter<T: IntoIterator<Item = (K, Value)>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Criteria::new(), |c, (k, v)| c.and(k.as_ref(), v))
    }
}
