//! # Drift
//!
//! Schema diffing for SQL migrations. Give it the schema you have and the
//! schema you want; it works out the statements in between.
//!
//! ```ignore
//! use drift::sqlite::{self, SqliteSnapshot};
//! use drift::{CreateAll, Mode};
//!
//! let prev = SqliteSnapshot::load(&path, drift::Dialect::SQLite)?.to_ddl()?;
//! let (next, errors) = sqlite::interim_to_ddl(schema);
//! let out = sqlite::ddl_diff(&prev, &next, &mut CreateAll, Mode::Default).await?;
//! ```
//!
//! Everything lives in [`drift_migrations`]; this crate re-exports it along
//! with [`Dialect`].
//!
//! ## Features
//!
//! - `tracing` - engine events through `tracing` (enabled by default)
//! - `interactive` - terminal rename prompts

pub use drift_migrations::*;
pub use drift_types::{Dialect, DialectParseError};
