//! Merge-plan selection
//!
//! Chooses how a composition is evaluated, in strict priority order:
//! 1. No ordering: concatenate sources (trimmed to the window if sliced)
//! 2. Leading `#` key: keep whole sources together, reversed for `-#`,
//!    then treat as concatenation
//! 3. Anything else: interleaved k-way merge over pre-sorted sources
//!
//! Same inputs always give the same plan.

use std::cmp::min;
use std::fmt;

use super::ast::{strip_source_keys, OrderKey};

/// A half-open `[low, high)` window over a sequence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
    pub low: usize,
    /// `None` means unbounded
    pub high: Option<usize>,
}

impl Window {
    pub fn new(low: usize, high: Option<usize>) -> Self {
        Self { low, high }
    }

    /// True if any bound is set
    pub fn is_sliced(&self) -> bool {
        self.low != 0 || self.high.is_some()
    }

    /// True if the window cannot contain anything
    pub fn is_empty(&self) -> bool {
        self.high.map_or(false, |h| h <= self.low)
    }

    /// Number of positions, `None` when unbounded
    pub fn len(&self) -> Option<usize> {
        self.high.map(|h| h.saturating_sub(self.low))
    }

    /// Applies `[start, stop)` relative to this window.
    ///
    /// Slicing a slice never widens it.
    pub fn narrow(&self, start: usize, stop: Option<usize>) -> Self {
        let mut high = self.high;
        if let Some(stop) = stop {
            let stop = self.low.saturating_add(stop);
            high = Some(high.map_or(stop, |h| min(h, stop)));
        }
        let start = self.low.saturating_add(start);
        let low = high.map_or(start, |h| min(h, start));
        Self { low, high }
    }

    /// Clamps a total count to this window
    pub fn clamp(&self, total: usize) -> usize {
        let end = self.high.map_or(total, |h| min(h, total));
        end.saturating_sub(self.low)
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.high {
            Some(h) => write!(f, "[{}:{}]", self.low, h),
            None => write!(f, "[{}:]", self.low),
        }
    }
}

/// Evaluation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanKind {
    /// Nothing to evaluate
    Empty,
    /// Sources one after another
    Concatenation,
    /// Sources ordered as wholes by index
    SourceOrdered,
    /// Elements interleaved by value
    InterleavedMerge,
}

impl PlanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanKind::Empty => "EMPTY",
            PlanKind::Concatenation => "CONCAT",
            PlanKind::SourceOrdered => "SOURCE_ORDERED",
            PlanKind::InterleavedMerge => "MERGE",
        }
    }
}

impl fmt::Display for PlanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable evaluation plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Chosen strategy
    pub kind: PlanKind,
    /// Source-ordered plans only: walk sources from the highest index down
    pub reverse_sources: bool,
    /// Concatenation-style plans only: trim sources to the window
    pub trim: bool,
    /// Keys each source is sorted by (no `#`)
    pub source_keys: Vec<OrderKey>,
    /// Keys the merge compares by
    pub merge_keys: Vec<OrderKey>,
    /// Window over the combined sequence
    pub window: Window,
}

/// Plan selector
pub struct MergePlanner;

impl MergePlanner {
    /// Selects the evaluation plan for an ordering, a source count and a window.
    pub fn select_plan(order_spec: &[OrderKey], source_count: usize, window: Window) -> Plan {
        let source_keys = strip_source_keys(order_spec);

        let (kind, reverse_sources) = if source_count == 0 || window.is_empty() {
            (PlanKind::Empty, false)
        } else {
            match order_spec.first() {
                None => (PlanKind::Concatenation, false),
                Some(lead) if lead.is_source_index() => {
                    (PlanKind::SourceOrdered, lead.is_descending())
                }
                Some(_) => (PlanKind::InterleavedMerge, false),
            }
        };

        let trim = matches!(kind, PlanKind::Concatenation | PlanKind::SourceOrdered)
            && window.is_sliced();

        let merge_keys = if kind == PlanKind::InterleavedMerge {
            order_spec.to_vec()
        } else {
            Vec::new()
        };

        Plan {
            kind,
            reverse_sources,
            trim,
            source_keys,
            merge_keys,
            window,
        }
    }
}
