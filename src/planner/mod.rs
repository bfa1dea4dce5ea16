//! Query description and plan selection
//!
//! - `ast`: ordering keys, lookups and criteria
//! - `planner`: windows and the merge-plan selector
//! - `explain`: readable plan output
//!
//! Planning is deterministic: same ordering, source count and window give
//! the same plan. Nothing here touches a source.

mod ast;
mod explain;
mod planner;

pub use ast::{
    parse_order_keys, strip_source_keys, Criteria, LookupKind, OrderKey, Predicate, SortDirection,
};
pub use explain::{ExplainPlan, SourceExplain};
pub use planner::{MergePlanner, Plan, PlanKind, Window};
