//! Record model
//!
//! Sources produce records of their own schema. Schemas are shared
//! (`Arc<Schema>`) and never change once built; records are immutable
//! once they leave a source.

mod record;
mod schema;
mod value;

pub use record::{FieldAccess, FieldPath, Record, LOOKUP_SEP, SOURCE_FIELD};
pub use schema::{Schema, PK_ALIAS};
pub use value::FieldValue;
