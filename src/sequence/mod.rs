//! Query sequences
//!
//! [`Composition`] is the public façade: it tags sources, pushes filters and
//! orderings down to them, picks a plan and hands out lazy iterators.

mod composition;
mod iter;

pub use composition::Composition;
pub use iter::{SequenceIter, ValuesIter};
