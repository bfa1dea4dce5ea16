//! query-sequence - Lazy composition of heterogeneous sub-queries
//!
//! Presents several independent, homogeneous queries as one ordered,
//! filterable, sliceable sequence. Records keep the index of the source
//! that produced them, exposed as the `#` pseudo-field.
//!
//! Evaluation is lazy and pull-based: sources are only touched when the
//! sequence is counted, iterated or materialized.

pub mod config;
pub mod errors;
pub mod executor;
pub mod observability;
pub mod planner;
pub mod record;
pub mod sequence;
pub mod source;

pub use config::SequenceConfig;
pub use errors::{QueryError, QueryResult};
pub use executor::{Comparator, DeleteSummary, NullOrdering, Tagged};
pub use planner::{Criteria, ExplainPlan, OrderKey, PlanKind, Window};
pub use record::{FieldAccess, FieldValue, Record, Schema};
pub use sequence::{Composition, SequenceIter, ValuesIter};
pub use source::{MemoryTable, SourceIndex, SubQuery};
