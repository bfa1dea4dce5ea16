//! Observable sequence events
//!
//! Events are explicit and typed; the logger only sees their names.

use std::fmt;

/// Observable events of the sequence engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Configuration loaded from disk
    ConfigLoaded,

    /// An evaluation strategy was chosen
    PlanSelected,
    /// Sources outside the window were dropped
    WindowTrimmed,

    /// K-way merge primed its sources
    MergeBegin,
    /// K-way merge ran to the end of its window
    MergeComplete,

    /// The result cache was filled
    CacheFilled,

    /// A source failed during evaluation
    SourceFailed,

    /// Bulk write through every source
    UpdateComplete,
    DeleteComplete,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::PlanSelected => "PLAN_SELECTED",
            Event::WindowTrimmed => "WINDOW_TRIMMED",
            Event::MergeBegin => "MERGE_BEGIN",
            Event::MergeComplete => "MERGE_COMPLETE",
            Event::CacheFilled => "CACHE_FILLED",
            Event::SourceFailed => "SOURCE_FAILED",
            Event::UpdateComplete => "UPDATE_COMPLETE",
            Event::DeleteComplete => "DELETE_COMPLETE",
        }
    }

    /// True if this event reports a failure
    pub fn is_failure(&self) -> bool {
        matches!(self, Event::SourceFailed)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
