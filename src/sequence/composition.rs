//! Query composition
//!
//! A [`Composition`] behaves like a single query over the union of its
//! sources. Every builder returns a new composition; nothing touches a
//! source until the composition is iterated, counted or materialized.

use std::cell::OnceCell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::iter::{SequenceIter, ValuesIter};
use crate::config::SequenceConfig;
use crate::errors::{QueryError, QueryResult};
use crate::executor::{
    Comparator, ConcatIter, DeleteSummary, MergeIter, Tagged, WindowTrimmer,
};
use crate::observability::{Event, Logger, MetricsRegistry};
use crate::planner::{
    parse_order_keys, strip_source_keys, Criteria, ExplainPlan, MergePlanner, OrderKey, Plan,
    PlanKind, SourceExplain, Window,
};
use crate::record::{FieldPath, FieldValue};
use crate::source::{SourceRegistry, SubQuery, TaggedSource};

/// A lazy, ordered, sliceable sequence over heterogeneous sub-queries
pub struct Composition {
    registry: SourceRegistry,
    order_spec: Vec<OrderKey>,
    standard_ordering: bool,
    window: Window,
    config: Arc<SequenceConfig>,
    metrics: Arc<MetricsRegistry>,
    cache: OnceCell<Vec<Tagged>>,
}

impl Clone for Composition {
    /// Clones share sources, config and metrics, never the cache.
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            order_spec: self.order_spec.clone(),
            standard_ordering: self.standard_ordering,
            window: self.window,
            config: Arc::clone(&self.config),
            metrics: Arc::clone(&self.metrics),
            cache: OnceCell::new(),
        }
    }
}

impl fmt::Debug for Composition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Composition")
            .field("sources", &self.registry.len())
            .field("order_spec", &self.order_spec)
            .field("standard_ordering", &self.standard_ordering)
            .field("window", &self.window)
            .field("cached", &self.cache.get().is_some())
            .finish()
    }
}

impl Composition {
    /// Composes the given queries; each is tagged with its position.
    pub fn new(queries: Vec<Arc<dyn SubQuery>>) -> Self {
        Self::with_config(queries, SequenceConfig::default())
    }

    /// Composes the given queries under an explicit configuration
    pub fn with_config(queries: Vec<Arc<dyn SubQuery>>, config: SequenceConfig) -> Self {
        Self {
            registry: SourceRegistry::tag(queries),
            order_spec: Vec::new(),
            standard_ordering: true,
            window: Window::default(),
            config: Arc::new(config),
            metrics: Arc::new(MetricsRegistry::new()),
            cache: OnceCell::new(),
        }
    }

    fn derive(&self, registry: SourceRegistry) -> Self {
        Self {
            registry,
            ..self.clone()
        }
    }

    fn guard_slice(&self, operation: &'static str) -> QueryResult<()> {
        if self.window.is_sliced() {
            return Err(QueryError::SliceTaken(operation));
        }
        Ok(())
    }

    // =========================================================================
    // Builders
    // =========================================================================

    /// An equivalent composition with a fresh cache
    pub fn all(&self) -> Self {
        self.clone()
    }

    /// A composition with no sources
    pub fn none(&self) -> Self {
        self.derive(self.registry.with_sources(Vec::new()))
    }

    /// Keeps records matching every predicate.
    ///
    /// `#` predicates select whole sources; the rest are pushed down.
    pub fn filter(&self, criteria: &Criteria) -> QueryResult<Self> {
        self.guard_slice("filter")?;
        let (by_index, rest) = criteria.split_source_index()?;

        let mut registry = self.registry.filter_by_index(&by_index)?;
        if !rest.is_empty() {
            registry = registry.map_queries(|q| q.filter(&rest));
        }
        Ok(self.derive(registry))
    }

    /// Drops records matching every predicate.
    ///
    /// A source whose index matches the `#` predicates loses the records
    /// matching the remaining ones, or goes away entirely if nothing
    /// remains. Other sources are untouched.
    pub fn exclude(&self, criteria: &Criteria) -> QueryResult<Self> {
        self.guard_slice("exclude")?;
        let (by_index, rest) = criteria.split_source_index()?;

        if by_index.is_empty() {
            if rest.is_empty() {
                return Ok(self.clone());
            }
            return Ok(self.derive(self.registry.map_queries(|q| q.exclude(&rest))));
        }

        let mask = self.registry.index_mask(&by_index)?;
        let mut sources = Vec::with_capacity(self.registry.len());
        for (source, matched) in self.registry.sources().iter().zip(mask) {
            if !matched {
                sources.push(source.clone());
            } else if !rest.is_empty() {
                sources.push(source.with_query(source.query.exclude(&rest)));
            }
        }
        Ok(self.derive(self.registry.with_sources(sources)))
    }

    /// Replaces the ordering.
    ///
    /// Accepts field paths with an optional `-` prefix; `#` orders by
    /// source index. An empty list clears the ordering.
    pub fn order_by<I, S>(&self, fields: I) -> QueryResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.guard_slice("reorder")?;
        let order_spec = parse_order_keys(fields);
        let pushed = strip_source_keys(&order_spec);

        // Sources keep their reversed flag across order_by.
        let mut next = self.derive(self.registry.map_queries(|q| q.order_by(&pushed)));
        next.order_spec = order_spec;
        Ok(next)
    }

    /// Reverses the sequence
    pub fn reverse(&self) -> QueryResult<Self> {
        self.guard_slice("reverse")?;
        let mut next = self.derive(self.registry.reversed().map_queries(|q| q.reverse()));
        next.standard_ordering = !self.standard_ordering;
        Ok(next)
    }

    /// Narrows the window to `[start, stop)` of the current sequence
    pub fn slice(&self, start: usize, stop: Option<usize>) -> Self {
        let mut next = self.clone();
        next.window = self.window.narrow(start, stop);
        next
    }

    /// Appends a source under a fresh index
    pub fn union(&self, query: Arc<dyn SubQuery>) -> QueryResult<Self> {
        self.guard_slice("combine queries")?;
        let mut registry = self.registry.clone();
        registry.append(self.align(query));
        Ok(self.derive(registry))
    }

    /// Appends every source of another composition under fresh indices
    pub fn union_with(&self, other: &Composition) -> QueryResult<Self> {
        self.guard_slice("combine queries")?;
        other.guard_slice("combine queries")?;
        let mut registry = self.registry.clone();
        for source in other.registry.sources() {
            registry.append(self.align(Arc::clone(&source.query)));
        }
        Ok(self.derive(registry))
    }

    /// ANDs `query` into every source of the same schema and drops the rest
    pub fn intersect(&self, query: &dyn SubQuery) -> QueryResult<Self> {
        self.guard_slice("combine queries")?;
        let name = query.schema().name();
        let mut sources = Vec::new();
        for source in self.registry.sources() {
            if source.query.schema().name() == name {
                sources.push(source.with_query(source.query.intersect(query)?));
            }
        }
        Ok(self.derive(self.registry.with_sources(sources)))
    }

    /// Brings a joining query into this composition's ordering
    fn align(&self, query: Arc<dyn SubQuery>) -> Arc<dyn SubQuery> {
        if self.order_spec.is_empty() {
            return query;
        }
        let query = query.order_by(&strip_source_keys(&self.order_spec));
        if self.standard_ordering {
            query
        } else {
            query.reverse()
        }
    }

    // =========================================================================
    // Evaluation
    // =========================================================================

    /// Plan for the current state
    ///
    /// A source-ordered plan on a reversed composition walks the indices
    /// the other way.
    pub fn plan(&self) -> Plan {
        let mut plan = MergePlanner::select_plan(&self.order_spec, self.registry.len(), self.window);
        if plan.kind == PlanKind::SourceOrdered && !self.standard_ordering {
            plan.reverse_sources = !plan.reverse_sources;
        }
        plan
    }

    /// Sources in the order a concatenation-style plan reads them
    fn walk_order(&self, plan: &Plan) -> Vec<TaggedSource> {
        let mut sources = self.registry.sources().to_vec();
        if plan.kind == PlanKind::SourceOrdered {
            sources.sort_by_key(|s| s.index);
            if plan.reverse_sources {
                sources.reverse();
            }
        }
        sources
    }

    /// Comparator for `keys`; every source must sort nulls the same way.
    fn comparator(&self, keys: Vec<OrderKey>) -> QueryResult<Comparator> {
        let nulls = self.config.null_ordering;
        for source in self.registry.sources() {
            let theirs = source.query.null_ordering();
            if theirs != nulls {
                return Err(QueryError::OrderingConflict(format!(
                    "source {} ({}) sorts nulls {}, composition sorts nulls {}",
                    source.index,
                    source.query.schema().name(),
                    theirs.as_str(),
                    nulls.as_str()
                )));
            }
        }
        Ok(Comparator::new(keys, nulls).with_metrics(Arc::clone(&self.metrics)))
    }

    fn open(&self) -> QueryResult<SequenceIter> {
        let plan = self.plan();
        Logger::info(
            Event::PlanSelected.as_str(),
            &[
                ("plan", plan.kind.as_str()),
                ("sources", &self.registry.len().to_string()),
                ("window", &plan.window.to_string()),
            ],
        );

        match plan.kind {
            PlanKind::Empty => Ok(SequenceIter::empty()),
            PlanKind::Concatenation | PlanKind::SourceOrdered => {
                if plan.kind == PlanKind::Concatenation {
                    self.metrics.increment_plans_concatenation();
                } else {
                    self.metrics.increment_plans_source_ordered();
                }

                let mut sources = self.walk_order(&plan);
                if plan.trim {
                    let outcome = WindowTrimmer::trim(
                        &sources,
                        signed_mark(plan.window.low),
                        plan.window.high.map(signed_mark),
                    )?;
                    self.metrics.add_sources_trimmed(outcome.dropped as u64);
                    Logger::info(
                        Event::WindowTrimmed.as_str(),
                        &[
                            ("dropped", &outcome.dropped.to_string()),
                            ("kept", &outcome.sources.len().to_string()),
                            ("total", &outcome.total.to_string()),
                        ],
                    );
                    sources = outcome.sources;
                }
                Ok(SequenceIter::concat(ConcatIter::new(
                    sources,
                    Arc::clone(&self.metrics),
                )))
            }
            PlanKind::InterleavedMerge => {
                self.metrics.increment_plans_merge();
                let comparator = self.comparator(plan.merge_keys.clone())?;
                Ok(SequenceIter::merge(MergeIter::new(
                    self.registry.sources().to_vec(),
                    comparator,
                    self.standard_ordering,
                    plan.window,
                    Arc::clone(&self.metrics),
                )))
            }
        }
    }

    /// Iterates the sequence, serving from the cache once it is filled
    pub fn iter(&self) -> QueryResult<SequenceIter> {
        match self.cache.get() {
            Some(rows) => Ok(SequenceIter::cached(rows.clone())),
            None => self.open(),
        }
    }

    /// Iterates the sequence without reading or filling the cache
    pub fn iterator(&self) -> QueryResult<SequenceIter> {
        self.open()
    }

    /// Materializes the sequence into the cache and returns it
    pub fn evaluate(&self) -> QueryResult<&[Tagged]> {
        if let Some(rows) = self.cache.get() {
            return Ok(rows.as_slice());
        }
        let rows = self.open()?.collect::<QueryResult<Vec<_>>>()?;
        Logger::info(
            Event::CacheFilled.as_str(),
            &[("rows", &rows.len().to_string())],
        );
        Ok(self.cache.get_or_init(|| rows).as_slice())
    }

    /// Number of materialized records
    pub fn len(&self) -> QueryResult<usize> {
        Ok(self.evaluate()?.len())
    }

    pub fn is_empty(&self) -> QueryResult<bool> {
        Ok(!self.exists()?)
    }

    /// Number of records, from the cache or from per-source counts
    pub fn count(&self) -> QueryResult<usize> {
        if let Some(rows) = self.cache.get() {
            return Ok(rows.len());
        }
        if self.window.is_empty() {
            return Ok(0);
        }
        let mut total = 0usize;
        for source in self.registry.sources() {
            total += source.query.count()?;
        }
        Ok(self.window.clamp(total))
    }

    /// True if the sequence has at least one record
    pub fn exists(&self) -> QueryResult<bool> {
        if let Some(rows) = self.cache.get() {
            return Ok(!rows.is_empty());
        }
        if self.window.is_sliced() {
            return Ok(self.count()? > 0);
        }
        for source in self.registry.sources() {
            if source.query.exists()? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Record at position `index`
    pub fn get_index(&self, index: usize) -> QueryResult<Tagged> {
        if let Some(rows) = self.cache.get() {
            return rows.get(index).cloned().ok_or(QueryError::IndexOutOfRange(index));
        }
        self.slice(index, Some(index.saturating_add(1)))
            .iterator()?
            .next()
            .ok_or(QueryError::IndexOutOfRange(index))?
    }

    /// Every `step`-th record of `[start, stop)`, materialized
    pub fn slice_step(&self, start: usize, stop: Option<usize>, step: usize) -> QueryResult<Vec<Tagged>> {
        if step == 0 {
            return Err(QueryError::invalid("slice step cannot be zero"));
        }
        self.slice(start, stop)
            .iterator()?
            .step_by(step)
            .collect()
    }

    /// The single record matching `criteria`
    pub fn get(&self, criteria: &Criteria) -> QueryResult<Tagged> {
        let target = if criteria.is_empty() {
            self.clone()
        } else {
            self.filter(criteria)?
        };

        let mut rows = target.iterator()?;
        let found = match rows.next() {
            Some(row) => row?,
            None => {
                let described: Vec<String> =
                    criteria.predicates().iter().map(|p| p.to_string()).collect();
                return Err(QueryError::DoesNotExist(format!("[{}]", described.join(", "))));
            }
        };
        if let Some(row) = rows.next() {
            row?;
            return Err(QueryError::MultipleObjectsReturned {
                found: target.count()?,
            });
        }
        Ok(found)
    }

    /// First record in sequence order
    pub fn first(&self) -> QueryResult<Option<Tagged>> {
        if let Some(rows) = self.cache.get() {
            return Ok(rows.first().cloned());
        }
        if self.window.is_sliced() {
            return self.iterator()?.next().transpose();
        }
        self.extreme(true)
    }

    /// Last record in sequence order
    pub fn last(&self) -> QueryResult<Option<Tagged>> {
        if self.window.is_sliced() || self.cache.get().is_some() {
            return Ok(self.evaluate()?.last().cloned());
        }
        self.extreme(false)
    }

    /// Picks the first or last record from each source's own end.
    fn extreme(&self, from_start: bool) -> QueryResult<Option<Tagged>> {
        let sources = self.registry.sources();

        if self.order_spec.is_empty() {
            if from_start {
                for source in sources {
                    if let Some(record) = source.query.first()? {
                        return Ok(Some(Tagged::new(source.index, record)));
                    }
                }
            } else {
                for source in sources.iter().rev() {
                    if let Some(record) = source.query.last()? {
                        return Ok(Some(Tagged::new(source.index, record)));
                    }
                }
            }
            return Ok(None);
        }

        let comparator = self.comparator(self.order_spec.clone())?;
        // Reversed sequences start at the largest element.
        let want_max = from_start != self.standard_ordering;

        let mut best: Option<Tagged> = None;
        for source in sources {
            let record = if from_start {
                source.query.first()?
            } else {
                source.query.last()?
            };
            let candidate = match record {
                Some(record) => Tagged::new(source.index, record),
                None => continue,
            };
            let replace = match &best {
                None => true,
                Some(current) => {
                    let ordering = comparator.compare(&candidate, current)?;
                    if want_max {
                        ordering != Ordering::Less
                    } else {
                        ordering == Ordering::Less
                    }
                }
            };
            if replace {
                best = Some(candidate);
            }
        }
        Ok(best)
    }

    /// First record by `fields`, or by each schema's latest-by field
    pub fn earliest(&self, fields: &[&str]) -> QueryResult<Tagged> {
        let keys = self.latest_keys(fields)?;
        self.order_by(&keys)?
            .first()?
            .ok_or_else(|| QueryError::DoesNotExist(format!("earliest by {}", keys.join(", "))))
    }

    /// Last record by `fields`, or by each schema's latest-by field
    pub fn latest(&self, fields: &[&str]) -> QueryResult<Tagged> {
        let keys = self.latest_keys(fields)?;
        let reversed: Vec<String> = parse_order_keys(&keys)
            .iter()
            .map(|k| k.reversed().to_string())
            .collect();
        self.order_by(&reversed)?
            .first()?
            .ok_or_else(|| QueryError::DoesNotExist(format!("latest by {}", keys.join(", "))))
    }

    fn latest_keys(&self, fields: &[&str]) -> QueryResult<Vec<String>> {
        if !fields.is_empty() {
            return Ok(fields.iter().map(|f| f.to_string()).collect());
        }

        let mut chosen: Option<&str> = None;
        for source in self.registry.sources() {
            let schema = source.query.schema();
            let field = schema.latest_by().ok_or_else(|| {
                QueryError::invalid(format!(
                    "earliest() and latest() need fields or a latest-by field on {}",
                    schema.name()
                ))
            })?;
            match chosen {
                None => chosen = Some(field),
                Some(existing) if existing != field => {
                    return Err(QueryError::invalid(format!(
                        "sources disagree on latest-by field ('{}' vs '{}')",
                        existing, field
                    )))
                }
                Some(_) => {}
            }
        }

        chosen
            .map(|f| vec![f.to_string()])
            .ok_or_else(|| QueryError::invalid("earliest() and latest() need fields"))
    }

    /// Projects each record to a map of `fields`, always including `#`.
    ///
    /// With no fields every schema field is included; relations appear as
    /// `<field>_id` holding the related primary key.
    pub fn values(&self, fields: &[&str]) -> QueryResult<ValuesIter> {
        let paths: Vec<FieldPath> = fields.iter().map(|f| FieldPath::parse(f)).collect();
        Ok(ValuesIter::new(self.iter()?, paths))
    }

    /// Applies `assignments` to every record in every source
    pub fn update(&self, assignments: &BTreeMap<String, FieldValue>) -> QueryResult<usize> {
        self.guard_slice("update")?;
        let mut total = 0;
        for source in self.registry.sources() {
            total += source.query.update(assignments)?;
        }
        Logger::info(
            Event::UpdateComplete.as_str(),
            &[
                ("sources", &self.registry.len().to_string()),
                ("updated", &total.to_string()),
            ],
        );
        Ok(total)
    }

    /// Deletes every record in every source
    pub fn delete(&self) -> QueryResult<DeleteSummary> {
        self.guard_slice("delete")?;
        let mut summary = DeleteSummary::new();
        for source in self.registry.sources() {
            let deleted = source.query.delete()?;
            summary.add(source.query.schema().name(), deleted);
        }
        Logger::info(
            Event::DeleteComplete.as_str(),
            &[("deleted", &summary.total.to_string())],
        );
        Ok(summary)
    }

    /// Describes how the sequence will be evaluated
    pub fn explain(&self) -> ExplainPlan {
        let plan = self.plan();
        let sources: Vec<SourceExplain> = self
            .walk_order(&plan)
            .iter()
            .map(|s| SourceExplain {
                index: s.index.0,
                schema: s.query.schema().name().to_string(),
                detail: s.query.explain(),
            })
            .collect();
        ExplainPlan::from_plan(
            &plan,
            self.order_spec.iter().map(|k| k.to_string()).collect(),
            self.standard_ordering,
            sources,
        )
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Tagged sources in current order
    pub fn sources(&self) -> &[TaggedSource] {
        self.registry.sources()
    }

    /// True if an ordering has been requested
    pub fn is_ordered(&self) -> bool {
        !self.order_spec.is_empty()
    }

    pub fn order_spec(&self) -> &[OrderKey] {
        &self.order_spec
    }

    /// False after an odd number of reverse() calls
    pub fn standard_ordering(&self) -> bool {
        self.standard_ordering
    }

    pub fn window(&self) -> Window {
        self.window
    }

    /// True once the cache has been filled
    pub fn is_cached(&self) -> bool {
        self.cache.get().is_some()
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn config(&self) -> &SequenceConfig {
        &self.config
    }
}

/// Window marks past `isize::MAX` still lie beyond every source.
fn signed_mark(mark: usize) -> isize {
    isize::try_from(mark).unwrap_or(isize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Record, Schema};
    use crate::source::MemoryTable;
    use serde_json::json;

    fn make_composition() -> (Arc<MemoryTable>, Arc<MemoryTable>, Composition) {
        let a = Schema::new("A").with_fields(["n"]).shared();
        let b = Schema::new("B").with_fields(["n"]).shared();
        let ta = MemoryTable::new(&a);
        let tb = MemoryTable::new(&b);
        for (i, n) in [5, 1, 3].iter().enumerate() {
            ta.insert(Record::new(&a).with("id", i as i64 + 1).with("n", *n));
        }
        for (i, n) in [4, 2].iter().enumerate() {
            tb.insert(Record::new(&b).with("id", i as i64 + 1).with("n", *n));
        }
        let seq = Composition::new(vec![ta.query(), tb.query()]);
        (ta, tb, seq)
    }

    fn ns(seq: &Composition) -> Vec<i64> {
        seq.iter()
            .unwrap()
            .map(|t| match t.unwrap().get("n").unwrap() {
                FieldValue::Int(n) => n,
                other => panic!("unexpected {:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_unordered_concatenates() {
        let (_, _, seq) = make_composition();
        assert_eq!(ns(&seq), vec![5, 1, 3, 4, 2]);
        assert_eq!(seq.count().unwrap(), 5);
    }

    #[test]
    fn test_order_by_merges() {
        let (_, _, seq) = make_composition();
        let ordered = seq.order_by(["n"]).unwrap();
        assert_eq!(ns(&ordered), vec![1, 2, 3, 4, 5]);
        assert_eq!(ns(&ordered.reverse().unwrap()), vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_reverse_then_order_by_stays_reversed() {
        let (_, _, seq) = make_composition();
        let reversed = seq.reverse().unwrap().order_by(["n"]).unwrap();
        assert_eq!(ns(&reversed), vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_source_index_ordering() {
        let (_, _, seq) = make_composition();
        assert_eq!(ns(&seq.order_by(["#", "n"]).unwrap()), vec![1, 3, 5, 2, 4]);
        assert_eq!(ns(&seq.order_by(["-#", "n"]).unwrap()), vec![2, 4, 1, 3, 5]);
    }

    #[test]
    fn test_slicing_after_slice_is_allowed_but_filter_is_not() {
        let (_, _, seq) = make_composition();
        let window = seq.slice(1, Some(4)).slice(1, None);
        assert_eq!(ns(&window), vec![3, 4]);

        let err = window.filter(&Criteria::new().and("n", json!(1))).unwrap_err();
        assert_eq!(err, QueryError::SliceTaken("filter"));
        assert!(window.order_by(["n"]).is_err());
        assert!(window.reverse().is_err());
    }

    #[test]
    fn test_cache_is_per_instance() {
        let (ta, _, seq) = make_composition();
        assert_eq!(seq.len().unwrap(), 5);
        assert!(seq.is_cached());

        ta.insert(Record::new(ta.schema()).with("id", 9).with("n", 9));
        assert_eq!(seq.count().unwrap(), 5);
        assert_eq!(seq.all().count().unwrap(), 6);
        assert!(!seq.all().is_cached());
    }

    #[test]
    fn test_first_and_last() {
        let (_, _, seq) = make_composition();
        let ordered = seq.order_by(["n"]).unwrap();
        assert_eq!(ordered.first().unwrap().unwrap().get("n").unwrap(), FieldValue::Int(1));
        assert_eq!(ordered.last().unwrap().unwrap().get("n").unwrap(), FieldValue::Int(5));

        let reversed = ordered.reverse().unwrap();
        assert_eq!(reversed.first().unwrap().unwrap().get("n").unwrap(), FieldValue::Int(5));
        assert_eq!(reversed.last().unwrap().unwrap().get("n").unwrap(), FieldValue::Int(1));

        assert_eq!(seq.first().unwrap().unwrap().get("n").unwrap(), FieldValue::Int(5));
        assert_eq!(seq.last().unwrap().unwrap().get("n").unwrap(), FieldValue::Int(2));
        assert!(seq.none().first().unwrap().is_none());
    }

    #[test]
    fn test_get_index_and_step() {
        let (_, _, seq) = make_composition();
        assert_eq!(seq.get_index(3).unwrap().get("n").unwrap(), FieldValue::Int(4));
        assert_eq!(seq.get_index(5).unwrap_err(), QueryError::IndexOutOfRange(5));

        let stepped = seq.slice_step(0, None, 2).unwrap();
        assert_eq!(stepped.len(), 3);
        assert!(seq.slice_step(0, None, 0).is_err());
    }

    #[test]
    fn test_plan_metrics() {
        let (_, _, seq) = make_composition();
        seq.iter().unwrap().for_each(drop);
        seq.order_by(["n"]).unwrap().iter().unwrap().for_each(drop);
        seq.order_by(["#"]).unwrap().iter().unwrap().for_each(drop);

        let snapshot = seq.metrics().snapshot();
        assert_eq!(snapshot.plans_concatenation, 1);
        assert_eq!(snapshot.plans_merge, 1);
        assert_eq!(snapshot.plans_source_ordered, 1);
    }

    #[test]
    fn test_slice_past_isize_max_is_empty() {
        let (_, _, seq) = make_composition();

        let beyond = seq.slice(usize::MAX, None);
        assert_eq!(beyond.count().unwrap(), 0);
        assert!(ns(&beyond).is_empty());

        let wide = seq.slice(3, Some(usize::MAX));
        assert_eq!(wide.count().unwrap(), 2);
        assert_eq!(ns(&wide), vec![4, 2]);
    }

    #[test]
    fn test_empty_exclude_keeps_everything() {
        let (_, _, seq) = make_composition();

        let kept = seq.exclude(&Criteria::new()).unwrap();
        assert_eq!(kept.count().unwrap(), 5);
        assert_eq!(ns(&kept), vec![5, 1, 3, 4, 2]);

        let narrowed = seq.exclude(&Criteria::new().and("#", json!(0))).unwrap();
        assert_eq!(ns(&narrowed), vec![4, 2]);
    }
}
