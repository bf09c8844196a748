//! Client-side model instances.

mod collection;
mod record;
mod schema;

pub use collection::Collection;
pub use record::Record;
pub use schema::{FieldDef, FieldKind, Schema};
