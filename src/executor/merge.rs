//! Stable k-way merge
//!
//! Merges sources that are each already sorted by the merge keys. The
//! working list holds one head per live source, in source order. Each step
//! stably sorts the heads and takes the front (the back when reversed), so
//! ties go to whichever source comes first in the working list.
//!
//! The merge is lazy:
//! - sources are opened on the first `next()`
//! - the source that supplied the last element is refilled only when the
//!   next element is requested
//! - once `high` elements have been produced nothing more is pulled

use std::cmp::Ordering;
use std::sync::Arc;

use super::comparator::Comparator;
use super::result::Tagged;
use crate::errors::{QueryError, QueryResult};
use crate::observability::{Event, Logger, MetricsRegistry};
use crate::planner::Window;
use crate::source::{RecordStream, SourceIndex, TaggedSource};

struct Head {
    source: SourceIndex,
    stream: RecordStream,
    current: Tagged,
}

/// Lazy k-way merge over pre-sorted sources
pub struct MergeIter {
    pending: Option<Vec<TaggedSource>>,
    heads: Vec<Head>,
    comparator: Comparator,
    standard_ordering: bool,
    window: Window,
    position: usize,
    stale: Option<usize>,
    done: bool,
    metrics: Arc<MetricsRegistry>,
}

impl MergeIter {
    /// Creates a merge; nothing is opened until the first `next()`.
    pub fn new(
        sources: Vec<TaggedSource>,
        comparator: Comparator,
        standard_ordering: bool,
        window: Window,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            pending: Some(sources),
            heads: Vec::new(),
            comparator,
            standard_ordering,
            window,
            position: 0,
            stale: None,
            done: false,
            metrics,
        }
    }

    fn prime(&mut self) -> QueryResult<()> {
        let sources = match self.pending.take() {
            Some(sources) => sources,
            None => return Ok(()),
        };

        for source in sources {
            self.metrics.increment_source_fetches();
            let mut stream = source
                .query
                .fetch()
                .map_err(|e| Self::source_failed(source.index, e))?;
            match stream.next() {
                Some(Ok(record)) => self.heads.push(Head {
                    source: source.index,
                    current: Tagged::new(source.index, record),
                    stream,
                }),
                Some(Err(err)) => return Err(Self::source_failed(source.index, err)),
                None => {}
            }
        }

        Logger::info(
            Event::MergeBegin.as_str(),
            &[
                ("sources", &self.heads.len().to_string()),
                ("window", &self.window.to_string()),
            ],
        );
        Ok(())
    }

    fn refill(&mut self) -> QueryResult<()> {
        if let Some(pos) = self.stale.take() {
            let head = &mut self.heads[pos];
            match head.stream.next() {
                Some(Ok(record)) => head.current = Tagged::new(head.source, record),
                Some(Err(err)) => return Err(Self::source_failed(head.source, err)),
                None => {
                    self.heads.remove(pos);
                }
            }
        }
        Ok(())
    }

    /// Position in `heads` of the next element
    fn select(&self) -> QueryResult<usize> {
        if self.heads.len() == 1 {
            return Ok(0);
        }

        let heads = &self.heads;
        let comparator = &self.comparator;
        let mut failure = None;
        let mut order: Vec<usize> = (0..heads.len()).collect();
        order.sort_by(|&a, &b| {
            comparator
                .compare(&heads[a].current, &heads[b].current)
                .unwrap_or_else(|e| {
                    failure.get_or_insert(e);
                    Ordering::Equal
                })
        });
        if let Some(err) = failure {
            return Err(err);
        }

        Ok(if self.standard_ordering {
            order[0]
        } else {
            order[order.len() - 1]
        })
    }

    fn step(&mut self) -> QueryResult<Option<Tagged>> {
        loop {
            if self.window.high.map_or(false, |h| self.position >= h) {
                return Ok(None);
            }
            self.prime()?;
            self.refill()?;
            if self.heads.is_empty() {
                return Ok(None);
            }

            let pos = self.select()?;
            let value = self.heads[pos].current.clone();
            self.stale = Some(pos);

            let position = self.position;
            self.position += 1;
            if position >= self.window.low {
                self.metrics.increment_emitted();
                return Ok(Some(value));
            }
            self.metrics.increment_skipped();
        }
    }

    fn source_failed(index: SourceIndex, err: QueryError) -> QueryError {
        Logger::error(
            Event::SourceFailed.as_str(),
            &[("source", &index.to_string()), ("code", err.code())],
        );
        err
    }
}

impl Iterator for MergeIter {
    type Item = QueryResult<Tagged>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(value)) => Some(Ok(value)),
            Ok(None) => {
                self.done = true;
                Logger::info(
                    Event::MergeComplete.as_str(),
                    &[("position", &self.position.to_string())],
                );
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::NullOrdering;
    use crate::planner::OrderKey;
    use crate::record::{FieldValue, Record, Schema};
    use crate::source::{MemoryTable, SourceRegistry};

    fn make_table(name: &str, values: &[i64]) -> Arc<MemoryTable> {
        let schema = Schema::new(name).with_fields(["x"]).shared();
        let table = MemoryTable::new(&schema);
        for (i, v) in values.iter().enumerate() {
            table.insert(Record::new(&schema).with("id", i as i64).with("x", *v));
        }
        table
    }

    fn merge(tables: &[Arc<MemoryTable>], standard: bool, window: Window) -> Vec<(usize, i64)> {
        let key = OrderKey::asc("x");
        let queries = tables
            .iter()
            .map(|t| {
                let q = t.query().order_by(&[key.clone()]);
                if standard {
                    q
                } else {
                    q.reverse()
                }
            })
            .collect();
        let registry = SourceRegistry::tag(queries);
        let comparator = Comparator::new(vec![key], NullOrdering::Greatest);
        MergeIter::new(
            registry.sources().to_vec(),
            comparator,
            standard,
            window,
            Arc::new(MetricsRegistry::new()),
        )
        .map(|t| {
            let t = t.unwrap();
            match t.get("x").unwrap() {
                FieldValue::Int(x) => (t.source().0, x),
                other => panic!("unexpected {:?}", other),
            }
        })
        .collect()
    }

    #[test]
    fn test_interleaves_by_value() {
        let tables = [make_table("A", &[1, 4, 6]), make_table("B", &[2, 3, 7])];
        let xs: Vec<i64> = merge(&tables, true, Window::default()).into_iter().map(|p| p.1).collect();
        assert_eq!(xs, vec![1, 2, 3, 4, 6, 7]);
    }

    #[test]
    fn test_ties_follow_working_list_order() {
        let tables = [make_table("A", &[1, 2]), make_table("B", &[1, 2])];
        let out = merge(&tables, true, Window::default());
        assert_eq!(out, vec![(0, 1), (1, 1), (0, 2), (1, 2)]);
    }

    #[test]
    fn test_reversed_merge_takes_back() {
        let tables = [make_table("A", &[1, 4]), make_table("B", &[2, 3])];
        let xs: Vec<i64> = merge(&tables, false, Window::default()).into_iter().map(|p| p.1).collect();
        assert_eq!(xs, vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_window_is_respected() {
        let tables = [make_table("A", &[1, 4, 6]), make_table("B", &[2, 3, 7])];
        let xs: Vec<i64> = merge(&tables, true, Window::new(2, Some(4)))
            .into_iter()
            .map(|p| p.1)
            .collect();
        assert_eq!(xs, vec![3, 4]);
    }

    #[test]
    fn test_empty_sources_are_skipped() {
        let tables = [make_table("A", &[]), make_table("B", &[5]), make_table("C", &[])];
        assert_eq!(merge(&tables, true, Window::default()), vec![(1, 5)]);
        assert!(merge(&[], true, Window::default()).is_empty());
    }

    #[test]
    fn test_stops_pulling_at_high_mark() {
        let tables = [make_table("A", &[1, 3, 5, 7]), make_table("B", &[2, 4, 6, 8])];
        let out = merge(&tables, true, Window::new(0, Some(3)));
        assert_eq!(out.len(), 3);

        // Three rows consumed plus the head still waiting in the other source.
        let pulled: u64 = tables.iter().map(|t| t.stats().rows_pulled).sum();
        assert_eq!(pulled, 4);
    }

    #[test]
    fn test_zero_high_mark_opens_nothing() {
        let tables = [make_table("A", &[1])];
        assert!(merge(&tables, true, Window::new(0, Some(0))).is_empty());
        assert_eq!(tables[0].stats().fetches, 0);
    }

    #[test]
    fn test_comparator_error_ends_merge() {
        let author = Schema::new("Author").with_ordering(["id"]).shared();
        let publisher = Schema::new("Publisher").shared();
        let a = Schema::new("A").with_relation("owner", &author).shared();
        let b = Schema::new("B").with_relation("owner", &publisher).shared();
        let ta = MemoryTable::new(&a);
        let tb = MemoryTable::new(&b);
        ta.insert(Record::new(&a).with("id", 1).with("owner", Record::new(&author).with("id", 1)));
        tb.insert(Record::new(&b).with("id", 1).with("owner", Record::new(&publisher).with("id", 1)));

        let registry = SourceRegistry::tag(vec![ta.query(), tb.query()]);
        let comparator = Comparator::new(vec![OrderKey::asc("owner")], NullOrdering::Greatest);
        let mut iter = MergeIter::new(
            registry.sources().to_vec(),
            comparator,
            true,
            Window::default(),
            Arc::new(MetricsRegistry::new()),
        );

        let err = iter.next().unwrap().unwrap_err();
        assert_eq!(err.code(), "SEQ_ORDERING_CONFLICT");
        assert!(iter.next().is_none());
    }
}
