//! SQLite dialect: entity model, normalizer, grammar, diff and hints

pub mod collection;
pub mod ddl;
pub mod diff;
pub mod grammar;
pub mod hints;
pub mod interim;
mod snapshot;
pub mod statements;

pub use collection::{SqliteDdl, TableFull};
pub use ddl::*;
pub use diff::{Phase, ddl_diff};
pub use hints::suggestions;
pub use interim::{InterimSchema, interim_to_ddl};
pub use snapshot::SqliteSnapshot;
pub use statements::JsonStatement;
