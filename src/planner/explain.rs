//! Explain output
//!
//! Deterministic, human-readable description of how a composition will be
//! evaluated.

use std::fmt;

use super::planner::{Plan, Window};

/// One source line of an explain plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceExplain {
    /// Source index
    pub index: usize,
    /// Schema name
    pub schema: String,
    /// The source's own description
    pub detail: String,
}

/// Explain plan output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplainPlan {
    /// Strategy name
    pub plan: String,
    /// Whether source-ordered evaluation walks sources backwards
    pub reverse_sources: bool,
    /// Whether sources are trimmed to the window
    pub trimmed: bool,
    /// Requested ordering
    pub ordering: Vec<String>,
    /// False once reverse() has been applied an odd number of times
    pub standard_ordering: bool,
    /// Window over the combined sequence
    pub window: Window,
    /// Sources in evaluation order
    pub sources: Vec<SourceExplain>,
}

impl ExplainPlan {
    /// Creates an explain plan from a selected plan
    pub fn from_plan(
        plan: &Plan,
        ordering: Vec<String>,
        standard_ordering: bool,
        sources: Vec<SourceExplain>,
    ) -> Self {
        Self {
            plan: plan.kind.as_str().to_string(),
            reverse_sources: plan.reverse_sources,
            trimmed: plan.trim,
            ordering,
            standard_ordering,
            window: plan.window,
            sources,
        }
    }
}

impl fmt::Display for ExplainPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== EXPLAIN PLAN ===")?;
        writeln!(f, "Plan: {}", self.plan)?;
        if !self.ordering.is_empty() {
            writeln!(f, "Ordering: {}", self.ordering.join(", "))?;
        }
        if !self.standard_ordering {
            writeln!(f, "Reversed: yes")?;
        }
        if self.reverse_sources {
            writeln!(f, "Sources: last to first")?;
        }
        if self.window.is_sliced() {
            writeln!(f, "Window: {}", self.window)?;
        }
        if self.trimmed {
            writeln!(f, "Trim: per-source counts")?;
        }
        writeln!(f, "Sources:")?;
        for source in &self.sources {
            writeln!(f, "  #{} {}: {}", source.index, source.schema, source.detail)?;
        }
        Ok(())
    }
}
