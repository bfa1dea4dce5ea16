//! Concatenation of sources

use std::collections::VecDeque;
use std::sync::Arc;

use super::result::Tagged;
use crate::errors::QueryResult;
use crate::observability::{Event, Logger, MetricsRegistry};
use crate::source::{RecordStream, SourceIndex, TaggedSource};

/// Yields every record of each source in turn.
///
/// A source is only opened once the previous one is exhausted. The first
/// error ends the iteration.
pub struct ConcatIter {
    pending: VecDeque<TaggedSource>,
    current: Option<(SourceIndex, RecordStream)>,
    metrics: Arc<MetricsRegistry>,
    done: bool,
}

impl ConcatIter {
    pub fn new(sources: Vec<TaggedSource>, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            pending: sources.into(),
            current: None,
            metrics,
            done: false,
        }
    }

    fn fail(&mut self, index: SourceIndex, err: crate::errors::QueryError) -> Option<QueryResult<Tagged>> {
        self.done = true;
        Logger::error(
            Event::SourceFailed.as_str(),
            &[("source", &index.to_string()), ("code", err.code())],
        );
        Some(Err(err))
    }
}

impl Iterator for ConcatIter {
    type Item = QueryResult<Tagged>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            if let Some((index, stream)) = &mut self.current {
                let index = *index;
                match stream.next() {
                    Some(Ok(record)) => {
                        self.metrics.increment_emitted();
                        return Some(Ok(Tagged::new(index, record)));
                    }
                    Some(Err(err)) => return self.fail(index, err),
                    None => self.current = None,
                }
                continue;
            }

            let source = match self.pending.pop_front() {
                Some(source) => source,
                None => {
                    self.done = true;
                    break;
                }
            };
            self.metrics.increment_source_fetches();
            match source.query.fetch() {
                Ok(stream) => self.current = Some((source.index, stream)),
                Err(err) => return self.fail(source.index, err),
            }
        }
        None
    }
}
