//! Sub-query sources
//!
//! A source is an independently queryable, homogeneous collection of
//! records. The sequence engine only relies on the [`SubQuery`] contract;
//! [`MemoryTable`] is the in-process reference backend.
//!
//! Every derived query (`filter`, `order_by`, `slice`, ...) is a new value.
//! Field errors are deferred to evaluation (`count`, `exists`, `fetch`).

mod memory;
mod registry;

pub use memory::{MemoryQuery, MemoryTable, QueryStats, StatsSnapshot};
pub use registry::{SourceIndex, SourceRegistry, TaggedSource};

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::QueryResult;
use crate::executor::NullOrdering;
use crate::planner::{Criteria, OrderKey};
use crate::record::{FieldValue, Record, Schema};

/// A pull-based stream of records
pub type RecordStream = Box<dyn Iterator<Item = QueryResult<Arc<Record>>>>;

/// Contract every source of a composition satisfies
pub trait SubQuery: fmt::Debug + Send + Sync {
    /// Schema of every record this query yields
    fn schema(&self) -> &Arc<Schema>;

    /// Number of records under the current filter and window
    fn count(&self) -> QueryResult<usize>;

    /// True if at least one record matches
    fn exists(&self) -> QueryResult<bool> {
        Ok(self.count()? > 0)
    }

    /// Opens a stream in this query's order
    fn fetch(&self) -> QueryResult<RecordStream>;

    /// Keeps records matching every predicate
    fn filter(&self, criteria: &Criteria) -> Arc<dyn SubQuery>;

    /// Drops records matching every predicate
    fn exclude(&self, criteria: &Criteria) -> Arc<dyn SubQuery>;

    /// Replaces the ordering; a reversed query stays reversed
    fn order_by(&self, keys: &[OrderKey]) -> Arc<dyn SubQuery>;

    /// Reverses the ordering
    fn reverse(&self) -> Arc<dyn SubQuery>;

    /// True if an explicit or default ordering applies
    fn is_ordered(&self) -> bool;

    /// Narrows to `[start, stop)` relative to the current window
    fn slice(&self, start: usize, stop: Option<usize>) -> Arc<dyn SubQuery>;

    /// First record, if any
    fn first(&self) -> QueryResult<Option<Arc<Record>>> {
        self.slice(0, Some(1)).fetch()?.next().transpose()
    }

    /// Last record, if any
    fn last(&self) -> QueryResult<Option<Arc<Record>>> {
        let count = self.count()?;
        if count == 0 {
            return Ok(None);
        }
        self.slice(count - 1, Some(count)).fetch()?.next().transpose()
    }

    /// Where this source sorts nulls
    fn null_ordering(&self) -> NullOrdering {
        NullOrdering::default()
    }

    /// ANDs another query of the same schema into this one
    fn intersect(&self, other: &dyn SubQuery) -> QueryResult<Arc<dyn SubQuery>>;

    /// Sets fields on every matching record; returns the number updated
    fn update(&self, assignments: &BTreeMap<String, FieldValue>) -> QueryResult<usize>;

    /// Deletes every matching record; returns the number deleted
    fn delete(&self) -> QueryResult<usize>;

    /// Human-readable description of this query
    fn explain(&self) -> String;

    fn as_any(&self) -> &dyn Any;
}
