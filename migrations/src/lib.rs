//! Drift Migrations - schema diff engine for drift
//!
//! This crate provides:
//! - Normalized entity stores for PostgreSQL, MySQL, SQLite and DSQL
//! - `interim_to_ddl` normalizers that turn a source schema into a store
//! - `ddl_diff`, which computes the ordered statements between two stores
//!   and asks a [`Resolver`] whether a create/drop pair is really a rename
//! - Data-loss hints probed against a live database through [`Db`]
//! - Snapshots and the `_journal.json` migration history
//!
//! # Generating a migration
//!
//! ```ignore
//! use drift_migrations::postgres::{self, PostgresSnapshot};
//! use drift_migrations::{CreateAll, Mode};
//!
//! let prev = PostgresSnapshot::load(&path, Dialect::PostgreSQL)?.to_ddl()?;
//! let (next, errors) = postgres::interim_to_ddl(schema);
//! assert!(errors.is_empty());
//!
//! let out = postgres::ddl_diff(&prev, &next, &mut CreateAll, Mode::Default).await?;
//! for row in out.grouped() {
//!     println!("{:?}.{:?}: +{} ~{} -{}", row.schema, row.table,
//!         row.inserted.len(), row.updated.len(), row.deleted.len());
//! }
//! ```
//!
//! # Pushing
//!
//! Push diffs the introspected database against the desired store in
//! [`Mode::Push`], then probes the database for lossy statements:
//!
//! ```ignore
//! let out = sqlite::ddl_diff(&live, &desired, &mut CreateAll, Mode::Push).await?;
//! let report = sqlite::suggestions(&db, &out.statements).await;
//! let plan = PushPlan::new(report, out.sql_statements(&renderer));
//! if plan.needs_confirmation(config.force) { /* ask */ }
//! ```
//!
//! # Features
//!
//! - `tracing` - resolver, rename and phase events (enabled by default)
//! - `interactive` - [`InteractiveResolver`] terminal prompts

pub mod casing;
pub mod collection;
pub mod config;
pub mod error;
pub mod filter;
pub mod group;
pub mod hints;
pub mod journal;
pub mod plan;
pub mod resolver;
pub mod snapshot;
mod trace;
pub mod traits;
pub mod version;

pub mod dsql;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use casing::Casing;
pub use collection::{Collection, KindDiff, diff_collections};
pub use config::{Config, ConfigError, DiffArgs};
pub use error::{
    DiffError, DuplicateKeyError, JournalError, QueryError, ResolveError, SchemaError,
    SnapshotError,
};
pub use filter::EntityFilter;
pub use group::{GroupedRow, Scope, Statement, group_diffs};
pub use hints::{Db, Hint, HintsReport, ProbeFailure, PushPlan, Row};
pub use journal::{Journal, JournalEntry};
pub use plan::{BREAKPOINT, DiffOutput, SqlRenderer};
pub use resolver::{
    ChannelResolver, CreateAll, KnownRename, KnownRenames, Rename, ResolveAnswer,
    ResolveRequest, Resolver, ResolverInput, ResolverOutput,
};
#[cfg(feature = "interactive")]
pub use resolver::InteractiveResolver;
pub use snapshot::{Meta, Snapshot};
pub use traits::{DiffType, Entity, EntityKey, EntityKind, KeyFilter, Mode};
pub use version::{
    DSQL_SNAPSHOT_VERSION, JOURNAL_VERSION, MYSQL_SNAPSHOT_VERSION, ORIGIN_UUID,
    POSTGRES_SNAPSHOT_VERSION, SQLITE_SNAPSHOT_VERSION, is_latest_version, is_supported_version,
    snapshot_version,
};

pub use drift_types::Dialect;
