//! Sequence execution
//!
//! Consumes a [`Plan`](crate::planner::Plan) and produces tagged records:
//!
//! 1. Concatenation-style plans trim sources to the window, then chain them
//! 2. Interleaved plans run a stable k-way merge over pre-sorted sources
//!
//! Errors from any source end the iteration at once; there are no partial
//! results followed by an error and no retries.

mod chain;
mod comparator;
mod filters;
mod merge;
mod result;
mod window;

pub use chain::ConcatIter;
pub use comparator::{Comparator, NullOrdering};
pub use filters::PredicateFilter;
pub use merge::MergeIter;
pub use result::{DeleteSummary, Tagged};
pub use window::{TrimOutcome, WindowTrimmer};
