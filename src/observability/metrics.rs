//! Metrics registry for query sequences
//!
//! - Counters only
//! - Monotonic increase
//! - Shared by a composition and every clone derived from it

use std::sync::atomic::{AtomicU64, Ordering};

/// Registry of evaluation counters
///
/// All counters use Relaxed atomics.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Concatenation plans chosen
    plans_concatenation: AtomicU64,
    /// Source-ordered plans chosen
    plans_source_ordered: AtomicU64,
    /// Interleaved merge plans chosen
    plans_merge: AtomicU64,
    /// Elements handed to the caller
    elements_emitted: AtomicU64,
    /// Elements pulled but before the window
    elements_skipped: AtomicU64,
    /// Comparator invocations
    comparisons: AtomicU64,
    /// Sources dropped by window trimming
    sources_trimmed: AtomicU64,
    /// Streams opened on sources
    source_fetches: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_plans_concatenation(&self) {
        self.plans_concatenation.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_plans_source_ordered(&self) {
        self.plans_source_ordered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_plans_merge(&self) {
        self.plans_merge.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment elements emitted
    pub fn increment_emitted(&self) {
        self.elements_emitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment elements skipped before the window
    pub fn increment_skipped(&self) {
        self.elements_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment comparator invocations
    pub fn increment_comparisons(&self) {
        self.comparisons.fetch_add(1, Ordering::Relaxed);
    }

    /// Add sources dropped by trimming
    pub fn add_sources_trimmed(&self, count: u64) {
        self.sources_trimmed.fetch_add(count, Ordering::Relaxed);
    }

    /// Increment source streams opened
    pub fn increment_source_fetches(&self) {
        self.source_fetches.fetch_add(1, Ordering::Relaxed);
    }

    /// Get comparator invocations
    pub fn comparisons(&self) -> u64 {
        self.comparisons.load(Ordering::Relaxed)
    }

    /// Get current snapshot of all metrics as JSON
    pub fn to_json(&self) -> String {
        let s = self.snapshot();
        format!(
            r#"{{"plans_concatenation":{},"plans_source_ordered":{},"plans_merge":{},"elements_emitted":{},"elements_skipped":{},"comparisons":{},"sources_trimmed":{},"source_fetches":{}}}"#,
            s.plans_concatenation,
            s.plans_source_ordered,
            s.plans_merge,
            s.elements_emitted,
            s.elements_skipped,
            s.comparisons,
            s.sources_trimmed,
            s.source_fetches,
        )
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            plans_concatenation: self.plans_concatenation.load(Ordering::Relaxed),
            plans_source_ordered: self.plans_source_ordered.load(Ordering::Relaxed),
            plans_merge: self.plans_merge.load(Ordering::Relaxed),
            elements_emitted: self.elements_emitted.load(Ordering::Relaxed),
            elements_skipped: self.elements_skipped.load(Ordering::Relaxed),
            comparisons: self.comparisons.load(Ordering::Relaxed),
            sources_trimmed: self.sources_trimmed.load(Ordering::Relaxed),
            source_fetches: self.source_fetches.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub plans_concatenation: u64,
    pub plans_source_ordered: u64,
    pub plans_merge: u64,
    pub elements_emitted: u64,
    pub elements_skipped: u64,
    pub comparisons: u64,
    pub sources_trimmed: u64,
    pub source_fetches: u64,
}
