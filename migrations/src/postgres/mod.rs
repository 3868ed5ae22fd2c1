//! PostgreSQL dialect: entity model, normalizer, grammar, diff and hints

pub mod collection;
pub mod ddl;
pub mod diff;
pub mod grammar;
pub mod hints;
pub mod interim;
mod snapshot;
pub mod statements;

pub use collection::{PostgresDdl, TableFull};
pub use ddl::*;
pub use diff::{Phase, ddl_diff};
pub use hints::suggestions;
pub use interim::{InterimSchema, interim_to_ddl};
pub use snapshot::PostgresSnapshot;
pub use statements::{ColumnChange, EnumValueAdd, JsonStatement};
