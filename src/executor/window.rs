//! Window trimming for concatenated sources
//!
//! Counts each source once, drops sources entirely outside `[low, high)`
//! and slices the two edge sources so only the requested rows are read.

use crate::errors::QueryResult;
use crate::source::TaggedSource;

/// Result of trimming
#[derive(Debug, Clone)]
pub struct TrimOutcome {
    /// Sources to iterate, edges re-sliced
    pub sources: Vec<TaggedSource>,
    /// Sources dropped without being iterated
    pub dropped: usize,
    /// Combined count before trimming
    pub total: usize,
}

/// Computes the sources needed for a window over their concatenation
pub struct WindowTrimmer;

impl WindowTrimmer {
    /// Trims `sources` to `[low, high)`.
    ///
    /// Negative marks count from the end of the concatenation.
    pub fn trim(sources: &[TaggedSource], low: isize, high: Option<isize>) -> QueryResult<TrimOutcome> {
        let counts = sources
            .iter()
            .map(|s| s.query.count())
            .collect::<QueryResult<Vec<usize>>>()?;

        let mut prefix = Vec::with_capacity(counts.len() + 1);
        prefix.push(0usize);
        for count in &counts {
            let last = prefix[prefix.len() - 1];
            prefix.push(last + count);
        }
        let total = prefix[prefix.len() - 1];

        let low = Self::normalize(low, total);
        let high = high.map_or(total, |h| Self::normalize(h, total));

        if low >= high {
            return Ok(TrimOutcome {
                sources: Vec::new(),
                dropped: sources.len(),
                total,
            });
        }

        // First source whose cumulative count passes `low`, and first whose
        // cumulative count reaches `high`.
        let start = prefix[1..].partition_point(|&c| c <= low);
        let end = prefix[1..].partition_point(|&c| c < high);

        let local_low = low - prefix[start];
        let local_high = high - prefix[end];

        let mut kept = Vec::with_capacity(end - start + 1);
        for i in start..=end {
            if counts[i] == 0 {
                continue;
            }
            let source = &sources[i];
            let from = if i == start { local_low } else { 0 };
            let to = if i == end { local_high } else { counts[i] };

            if from == 0 && to == counts[i] {
                kept.push(source.clone());
            } else if i == end {
                kept.push(source.with_query(source.query.slice(from, Some(to))));
            } else {
                kept.push(source.with_query(source.query.slice(from, None)));
            }
        }

        Ok(TrimOutcome {
            dropped: sources.len() - kept.len(),
            sources: kept,
            total,
        })
    }

    fn normalize(mark: isize, total: usize) -> usize {
        if mark < 0 {
            total.saturating_sub(mark.unsigned_abs())
        } else {
            (mark as usize).min(total)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Record, Schema};
    use crate::source::{MemoryTable, SourceRegistry};
    use std::sync::Arc;

    fn make_sources(sizes: &[usize]) -> (Vec<Arc<MemoryTable>>, SourceRegistry) {
        let mut tables = Vec::new();
        let mut queries = Vec::new();
        for (s, size) in sizes.iter().enumerate() {
            let schema = Schema::new(format!("S{}", s)).with_fields(["n"]).shared();
            let table = MemoryTable::new(&schema);
            for i in 0..*size {
                table.insert(Record::new(&schema).with("id", i as i64).with("n", (s * 100 + i) as i64));
            }
            queries.push(table.query());
            tables.push(table);
        }
        (tables, SourceRegistry::tag(queries))
    }

    fn values(outcome: &TrimOutcome) -> Vec<i64> {
        let mut out = Vec::new();
        for source in &outcome.sources {
            for row in source.query.fetch().unwrap() {
                match row.unwrap().get("n") {
                    Some(crate::record::FieldValue::Int(n)) => out.push(*n),
                    other => panic!("unexpected {:?}", other),
                }
            }
        }
        out
    }

    fn full(sizes: &[usize]) -> Vec<i64> {
        sizes
            .iter()
            .enumerate()
            .flat_map(|(s, size)| (0..*size).map(move |i| (s * 100 + i) as i64))
            .collect()
    }

    #[test]
    fn test_window_matches_concatenation_slice() {
        let sizes = [2, 0, 3, 1];
        let (_, registry) = make_sources(&sizes);
        let all = full(&sizes);

        for low in 0..=all.len() {
            for high in low..=all.len() + 1 {
                let outcome = WindowTrimmer::trim(registry.sources(), low as isize, Some(high as isize)).unwrap();
                let end = high.min(all.len());
                assert_eq!(values(&outcome), all[low..end].to_vec(), "window [{}:{}]", low, high);
            }
        }
    }

    #[test]
    fn test_boundary_aligned_window_keeps_whole_sources() {
        let (_, registry) = make_sources(&[2, 2, 2]);
        let outcome = WindowTrimmer::trim(registry.sources(), 2, Some(4)).unwrap();

        assert_eq!(outcome.sources.len(), 1);
        assert_eq!(outcome.sources[0].index.0, 1);
        assert_eq!(outcome.dropped, 2);
        assert_eq!(values(&outcome), vec![100, 101]);
    }

    #[test]
    fn test_window_straddling_single_source() {
        let (_, registry) = make_sources(&[2, 5, 2]);
        let outcome = WindowTrimmer::trim(registry.sources(), 3, Some(5)).unwrap();
        assert_eq!(outcome.sources.len(), 1);
        assert_eq!(values(&outcome), vec![101, 102]);
    }

    #[test]
    fn test_negative_marks() {
        let (_, registry) = make_sources(&[2, 2]);
        let outcome = WindowTrimmer::trim(registry.sources(), -3, Some(-1)).unwrap();
        assert_eq!(values(&outcome), vec![1, 100]);
        assert_eq!(outcome.total, 4);
    }

    #[test]
    fn test_unbounded_and_empty() {
        let (_, registry) = make_sources(&[2, 2]);
        let outcome = WindowTrimmer::trim(registry.sources(), 1, None).unwrap();
        assert_eq!(values(&outcome), vec![1, 100, 101]);

        let outcome = WindowTrimmer::trim(registry.sources(), 3, Some(2)).unwrap();
        assert!(outcome.sources.is_empty());
    }

    #[test]
    fn test_each_source_counted_once() {
        let (tables, registry) = make_sources(&[3, 3, 3]);
        let outcome = WindowTrimmer::trim(registry.sources(), 4, Some(5)).unwrap();
        assert_eq!(values(&outcome), vec![101]);

        for table in &tables {
            assert_eq!(table.stats().counts, 1);
        }
        // Only the retained source was read
        assert_eq!(tables[0].stats().fetches, 0);
        assert_eq!(tables[1].stats().fetches, 1);
        assert_eq!(tables[2].stats().fetches, 0);
    }
}
