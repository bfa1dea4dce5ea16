//! In-memory reference backend
//!
//! A `MemoryTable` holds rows of one schema. Queries over it are cheap
//! descriptions (conditions, ordering, window) evaluated on demand, so
//! every `count`, `exists` and `fetch` re-reads the table.
//!
//! Rows iterate in insertion order unless an explicit or default ordering
//! applies. Reversing an unordered query changes nothing.
//!
//! Each table keeps counters of the work done against it, so callers can
//! assert how many queries and row pulls an operation cost.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, PoisonError, RwLock};

use super::{RecordStream, SubQuery};
use crate::errors::{QueryError, QueryResult};
use crate::executor::{Comparator, NullOrdering, PredicateFilter};
use crate::planner::{strip_source_keys, Criteria, OrderKey, Window};
use crate::record::{FieldValue, Record, Schema};

/// Work counters for one table
#[derive(Debug, Default)]
pub struct QueryStats {
    counts: AtomicU64,
    exists_checks: AtomicU64,
    fetches: AtomicU64,
    rows_pulled: AtomicU64,
}

impl QueryStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            counts: self.counts.load(AtomicOrdering::Relaxed),
            exists_checks: self.exists_checks.load(AtomicOrdering::Relaxed),
            fetches: self.fetches.load(AtomicOrdering::Relaxed),
            rows_pulled: self.rows_pulled.load(AtomicOrdering::Relaxed),
        }
    }

    fn reset(&self) {
        for counter in [
            &self.counts,
            &self.exists_checks,
            &self.fetches,
            &self.rows_pulled,
        ] {
            counter.store(0, AtomicOrdering::Relaxed);
        }
    }
}

/// Snapshot of [`QueryStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// count() calls
    pub counts: u64,
    /// exists() calls
    pub exists_checks: u64,
    /// Streams opened
    pub fetches: u64,
    /// Rows handed out by streams
    pub rows_pulled: u64,
}

/// A table of records sharing one schema
#[derive(Debug)]
pub struct MemoryTable {
    schema: Arc<Schema>,
    rows: RwLock<Vec<Arc<Record>>>,
    nulls: NullOrdering,
    stats: QueryStats,
}

impl MemoryTable {
    /// Creates an empty table
    pub fn new(schema: &Arc<Schema>) -> Arc<Self> {
        Self::with_null_ordering(schema, NullOrdering::default())
    }

    /// Creates an empty table sorting nulls by the given policy
    pub fn with_null_ordering(schema: &Arc<Schema>, nulls: NullOrdering) -> Arc<Self> {
        Arc::new(Self {
            schema: Arc::clone(schema),
            rows: RwLock::new(Vec::new()),
            nulls,
            stats: QueryStats::default(),
        })
    }

    /// Returns the schema
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Appends a row
    pub fn insert(&self, record: Record) -> Arc<Record> {
        let record = Arc::new(record);
        self.rows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&record));
        record
    }

    /// Number of stored rows
    pub fn len(&self) -> usize {
        self.rows.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A query over every row
    pub fn query(self: &Arc<Self>) -> Arc<dyn SubQuery> {
        Arc::new(self.all())
    }

    /// A concrete query over every row
    pub fn all(self: &Arc<Self>) -> MemoryQuery {
        MemoryQuery {
            table: Arc::clone(self),
            conditions: Vec::new(),
            ordering: None,
            reversed: false,
            window: Window::default(),
            deferred: None,
        }
    }

    /// Work done against this table so far
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    fn snapshot_rows(&self) -> Vec<Arc<Record>> {
        self.rows.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[derive(Debug, Clone)]
struct Condition {
    criteria: Criteria,
    negated: bool,
}

/// A lazily evaluated query over a [`MemoryTable`]
#[derive(Debug, Clone)]
pub struct MemoryQuery {
    table: Arc<MemoryTable>,
    conditions: Vec<Condition>,
    /// Explicit ordering; `None` falls back to the schema default
    ordering: Option<Vec<OrderKey>>,
    reversed: bool,
    window: Window,
    /// Error surfaced on evaluation (operation applied after slicing)
    deferred: Option<QueryError>,
}

impl MemoryQuery {
    /// Returns the backing table
    pub fn table(&self) -> &Arc<MemoryTable> {
        &self.table
    }

    fn derive(&self, f: impl FnOnce(&mut MemoryQuery)) -> Arc<dyn SubQuery> {
        let mut next = self.clone();
        f(&mut next);
        Arc::new(next)
    }

    fn guard_window(&self, next: &mut MemoryQuery, operation: &'static str) {
        if self.window.is_sliced() && next.deferred.is_none() {
            next.deferred = Some(QueryError::SliceTaken(operation));
        }
    }

    fn effective_ordering(&self) -> Vec<OrderKey> {
        match &self.ordering {
            Some(keys) => keys.clone(),
            None => self.table.schema.ordering().to_vec(),
        }
    }

    fn sort_keys(&self) -> Vec<OrderKey> {
        let keys = self.effective_ordering();
        if self.reversed {
            keys.iter().map(OrderKey::reversed).collect()
        } else {
            keys
        }
    }

    fn validate(&self) -> QueryResult<()> {
        if let Some(err) = &self.deferred {
            return Err(err.clone());
        }
        let schema = &self.table.schema;
        for cond in &self.conditions {
            for pred in cond.criteria.predicates() {
                schema.check_path(pred.field.segments())?;
            }
        }
        for key in self.effective_ordering() {
            schema.check_path(key.field.segments())?;
        }
        Ok(())
    }

    fn matches(&self, row: &Record) -> QueryResult<bool> {
        for cond in &self.conditions {
            let hit = PredicateFilter::matches(row, cond.criteria.predicates())?;
            if hit == cond.negated {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Matching rows in order, before the window
    fn matching_rows(&self) -> QueryResult<Vec<Arc<Record>>> {
        self.validate()?;

        let mut matched = Vec::new();
        for row in self.table.snapshot_rows() {
            if self.matches(&row)? {
                matched.push(row);
            }
        }

        let keys = self.sort_keys();
        if !keys.is_empty() {
            let comparator = Comparator::new(keys, self.table.nulls);
            let mut failure = None;
            matched.sort_by(|a, b| {
                comparator.compare(a, b).unwrap_or_else(|e| {
                    failure.get_or_insert(e);
                    std::cmp::Ordering::Equal
                })
            });
            if let Some(err) = failure {
                return Err(err);
            }
        }

        Ok(matched)
    }

    fn evaluate(&self) -> QueryResult<Vec<Arc<Record>>> {
        let rows = self.matching_rows()?;
        let take = self.window.len().unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(self.window.low).take(take).collect())
    }

    fn contains(rows: &[Arc<Record>], row: &Arc<Record>) -> bool {
        rows.iter().any(|r| Arc::ptr_eq(r, row))
    }
}

impl SubQuery for MemoryQuery {
    fn schema(&self) -> &Arc<Schema> {
        &self.table.schema
    }

    fn count(&self) -> QueryResult<usize> {
        QueryStats::bump(&self.table.stats.counts);
        Ok(self.evaluate()?.len())
    }

    fn exists(&self) -> QueryResult<bool> {
        QueryStats::bump(&self.table.stats.exists_checks);
        Ok(!self.evaluate()?.is_empty())
    }

    fn fetch(&self) -> QueryResult<RecordStream> {
        QueryStats::bump(&self.table.stats.fetches);
        let rows = self.evaluate()?;
        let table = Arc::clone(&self.table);
        Ok(Box::new(rows.into_iter().map(move |row| {
            QueryStats::bump(&table.stats.rows_pulled);
            Ok(row)
        })))
    }

    fn filter(&self, criteria: &Criteria) -> Arc<dyn SubQuery> {
        self.derive(|next| {
            self.guard_window(next, "filter");
            next.conditions.push(Condition {
                criteria: criteria.clone(),
                negated: false,
            });
        })
    }

    fn exclude(&self, criteria: &Criteria) -> Arc<dyn SubQuery> {
        self.derive(|next| {
            self.guard_window(next, "filter");
            // An empty negated condition would match every row.
            if criteria.is_empty() {
                return;
            }
            next.conditions.push(Condition {
                criteria: criteria.clone(),
                negated: true,
            });
        })
    }

    fn order_by(&self, keys: &[OrderKey]) -> Arc<dyn SubQuery> {
        self.derive(|next| {
            self.guard_window(next, "reorder");
            next.ordering = Some(strip_source_keys(keys));
        })
    }

    fn reverse(&self) -> Arc<dyn SubQuery> {
        self.derive(|next| {
            self.guard_window(next, "reverse");
            next.reversed = !next.reversed;
        })
    }

    fn is_ordered(&self) -> bool {
        !self.effective_ordering().is_empty()
    }

    fn slice(&self, start: usize, stop: Option<usize>) -> Arc<dyn SubQuery> {
        self.derive(|next| next.window = self.window.narrow(start, stop))
    }

    fn null_ordering(&self) -> NullOrdering {
        self.table.nulls
    }

    fn intersect(&self, other: &dyn SubQuery) -> QueryResult<Arc<dyn SubQuery>> {
        let other = other
            .as_any()
            .downcast_ref::<MemoryQuery>()
            .filter(|o| Arc::ptr_eq(&o.table, &self.table))
            .ok_or_else(|| {
                QueryError::invalid(format!(
                    "cannot intersect with a query over a different table than {}",
                    self.table.schema.name()
                ))
            })?;
        if self.window.is_sliced() || other.window.is_sliced() {
            return Err(QueryError::SliceTaken("combine queries"));
        }
        let conditions = other.conditions.clone();
        Ok(self.derive(|next| next.conditions.extend(conditions)))
    }

    fn update(&self, assignments: &BTreeMap<String, FieldValue>) -> QueryResult<usize> {
        if self.window.is_sliced() {
            return Err(QueryError::SliceTaken("update"));
        }
        for field in assignments.keys() {
            self.table.schema.check_path(std::slice::from_ref(field))?;
        }

        let matched = self.matching_rows()?;
        let mut rows = self.table.rows.write().unwrap_or_else(PoisonError::into_inner);
        let mut updated = 0;
        for row in rows.iter_mut() {
            if Self::contains(&matched, row) {
                let mut record = Record::clone(&**row);
                for (field, value) in assignments {
                    record.set(field.clone(), value.clone());
                }
                *row = Arc::new(record);
                updated += 1;
            }
        }
        Ok(updated)
    }

    fn delete(&self) -> QueryResult<usize> {
        if self.window.is_sliced() {
            return Err(QueryError::SliceTaken("delete"));
        }
        let matched = self.matching_rows()?;
        let mut rows = self.table.rows.write().unwrap_or_else(PoisonError::into_inner);
        let before = rows.len();
        rows.retain(|row| !Self::contains(&matched, row));
        Ok(before - rows.len())
    }

    fn explain(&self) -> String {
        let mut out = format!("SCAN {}", self.table.schema.name());
        for cond in &self.conditions {
            let preds: Vec<String> = cond.criteria.predicates().iter().map(|p| p.to_string()).collect();
            let verb = if cond.negated { "EXCLUDE" } else { "FILTER" };
            out.push_str(&format!(" {} [{}]", verb, preds.join(" AND ")));
        }
        let keys = self.sort_keys();
        if !keys.is_empty() {
            let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
            out.push_str(&format!(" ORDER BY [{}]", keys.join(", ")));
        }
        if self.window.is_sliced() {
            out.push_str(&format!(" WINDOW {}", self.window));
        }
        out
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_table() -> Arc<MemoryTable> {
        let schema = Schema::new("Book").with_fields(["title", "pages"]).shared();
        let table = MemoryTable::new(&schema);
        for (id, title, pages) in [(1, "Fiction", Some(10)), (2, "Biography", Some(20)), (3, "Atlas", None)] {
            table.insert(
                Record::new(&schema)
                    .with("id", id)
                    .with("title", title)
                    .with("pages", pages),
            );
        }
        table
    }

    fn titles(query: &dyn SubQuery) -> Vec<String> {
        query
            .fetch()
            .unwrap()
            .map(|r| r.unwrap().get("title").unwrap().as_text())
            .collect()
    }

    #[test]
    fn test_insertion_order_when_unordered() {
        let table = make_table();
        let q = table.query();
        assert_eq!(titles(q.as_ref()), vec!["Fiction", "Biography", "Atlas"]);
        assert!(!q.is_ordered());
        // Reversing an unordered query is a no-op
        assert_eq!(titles(q.reverse().as_ref()), vec!["Fiction", "Biography", "Atlas"]);
    }

    #[test]
    fn test_filter_exclude_order() {
        let table = make_table();
        let q = table.query().order_by(&[OrderKey::asc("title")]);
        assert_eq!(titles(q.as_ref()), vec!["Atlas", "Biography", "Fiction"]);
        assert_eq!(titles(q.reverse().as_ref()), vec!["Fiction", "Biography", "Atlas"]);

        let q = table.query().filter(&Criteria::new().and("pages__gte", json!(10)));
        assert_eq!(q.count().unwrap(), 2);

        let q = table.query().exclude(&Criteria::new().and("title", json!("Atlas")));
        assert_eq!(titles(q.as_ref()), vec!["Fiction", "Biography"]);
    }

    #[test]
    fn test_nulls_sort_by_table_policy() {
        let table = make_table();
        let q = table.query().order_by(&[OrderKey::asc("pages")]);
        assert_eq!(titles(q.as_ref()), vec!["Fiction", "Biography", "Atlas"]);

        let schema = Arc::clone(table.schema());
        let least = MemoryTable::with_null_ordering(&schema, NullOrdering::Least);
        for record in table.snapshot_rows() {
            least.insert(Record::clone(&record));
        }
        let q = least.query().order_by(&[OrderKey::asc("pages")]);
        assert_eq!(titles(q.as_ref()), vec!["Atlas", "Fiction", "Biography"]);
    }

    #[test]
    fn test_slices_compose() {
        let table = make_table();
        let q = table.query().slice(1, None);
        assert_eq!(titles(q.as_ref()), vec!["Biography", "Atlas"]);
        let q = q.slice(0, Some(1));
        assert_eq!(titles(q.as_ref()), vec!["Biography"]);
        assert_eq!(q.count().unwrap(), 1);
        assert_eq!(table.query().slice(5, Some(9)).count().unwrap(), 0);
    }

    #[test]
    fn test_first_and_last() {
        let table = make_table();
        let q = table.query();
        assert_eq!(q.first().unwrap().unwrap().pk(), &FieldValue::Int(1));
        assert_eq!(q.last().unwrap().unwrap().pk(), &FieldValue::Int(3));

        let empty = q.filter(&Criteria::new().and("pages__gt", json!(100)));
        assert!(empty.first().unwrap().is_none());
        assert!(empty.last().unwrap().is_none());
    }

    #[test]
    fn test_field_error_is_deferred() {
        let table = make_table();
        let q = table.query().filter(&Criteria::new().and("isbn", json!("x")));
        let err = q.count().unwrap_err();
        assert_eq!(err, QueryError::field("Book", "isbn"));
        assert!(q.fetch().is_err());
    }

    #[test]
    fn test_filter_after_slice_is_deferred_error() {
        let table = make_table();
        let q = table.query().slice(0, Some(1)).filter(&Criteria::new());
        assert_eq!(q.count().unwrap_err(), QueryError::SliceTaken("filter"));
    }

    #[test]
    fn test_stats_track_pulls() {
        let table = make_table();
        let mut stream = table.query().fetch().unwrap();
        stream.next();
        stream.next();

        let stats = table.stats();
        assert_eq!(stats.fetches, 1);
        assert_eq!(stats.rows_pulled, 2);

        table.reset_stats();
        assert_eq!(table.stats(), StatsSnapshot::default());
    }

    #[test]
    fn test_update_and_delete() {
        let table = make_table();
        let mut assignments = BTreeMap::new();
        assignments.insert("pages".to_string(), FieldValue::Int(99));

        let q = table.query().filter(&Criteria::new().and("pages__isnull", json!(true)));
        assert_eq!(q.update(&assignments).unwrap(), 1);
        assert_eq!(
            table.query().filter(&Criteria::new().and("pages", json!(99))).count().unwrap(),
            1
        );

        let q = table.query().filter(&Criteria::new().and("pages__lt", json!(50)));
        assert_eq!(q.delete().unwrap(), 2);
        assert_eq!(table.len(), 1);

        assert!(table.query().slice(0, Some(1)).delete().is_err());
    }

    #[test]
    fn test_intersect_same_table() {
        let table = make_table();
        let a = table.query().filter(&Criteria::new().and("pages__gte", json!(10)));
        let b = table.query().filter(&Criteria::new().and("title__startswith", json!("B")));
        let both = a.intersect(b.as_ref()).unwrap();
        assert_eq!(titles(both.as_ref()), vec!["Biography"]);

        let other = make_table();
        assert!(a.intersect(other.query().as_ref()).is_err());
    }

    #[test]
    fn test_empty_exclude_is_noop() {
        let table = make_table();
        let q = table.query().exclude(&Criteria::new());
        assert_eq!(q.count().unwrap(), 3);
        assert_eq!(titles(q.as_ref()), vec!["Fiction", "Biography", "Atlas"]);
        assert!(!q.explain().contains("EXCLUDE"));
    }
}
