//! Observability for query sequences
//!
//! - Structured logging (JSON lines, level-gated)
//! - Typed engine events
//! - Relaxed atomic counters
//!
//! Observability is read-only: nothing here changes evaluation.
//!
//! ```ignore
//! use query_sequence::observability::{Event, Logger, MetricsRegistry};
//!
//! Logger::info(Event::PlanSelected.as_str(), &[("plan", "MERGE")]);
//!
//! let metrics = MetricsRegistry::new();
//! metrics.increment_plans_merge();
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
