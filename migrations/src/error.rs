//! Error taxonomy for the diff engine
//!
//! Structural schema problems are data ([`SchemaError`]), hint probe
//! failures are per statement ([`QueryError`]), everything else aborts.

use crate::traits::{EntityKey, EntityKind};
use drift_types::Dialect;
use thiserror::Error;

/// Two entities of the same kind ended up with the same natural key
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("duplicate {kind} key `{key}`")]
pub struct DuplicateKeyError {
    pub kind: EntityKind,
    pub key: EntityKey,
}

/// Error returned by a [`Resolver`](crate::resolver::Resolver)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The user cancelled the prompt
    #[error("rename resolution aborted")]
    Aborted,

    /// The resolver could not produce an answer
    #[error("resolver failed: {0}")]
    Failed(String),
}

/// Fatal errors from `ddl_diff`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiffError {
    #[error("diff aborted by resolver")]
    Aborted,

    #[error("resolver failed for {kind}: {message}")]
    Resolver { kind: EntityKind, message: String },

    /// A resolver answer referenced entities it was not offered, or used one twice
    #[error("invalid {kind} resolution: {reason}")]
    InvalidResolution { kind: EntityKind, reason: String },

    #[error(transparent)]
    DuplicateKey(#[from] DuplicateKeyError),
}

impl DiffError {
    pub(crate) fn from_resolve(kind: EntityKind, err: ResolveError) -> Self {
        match err {
            ResolveError::Aborted => DiffError::Aborted,
            ResolveError::Failed(message) => DiffError::Resolver { kind, message },
        }
    }
}

/// Structural finding reported by `interim_to_ddl`.
///
/// These are returned alongside the normalized store, never thrown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("duplicate {kind} `{name}`")]
    Duplicate { kind: EntityKind, name: String },

    #[error("foreign key `{fk}` references missing table `{table}`")]
    MissingFkTable { fk: String, table: String },

    #[error("foreign key `{fk}` references missing column `{table}.{column}`")]
    MissingFkColumn {
        fk: String,
        table: String,
        column: String,
    },

    #[error("foreign key `{fk}` has {from} columns but references {to}")]
    FkColumnCount { fk: String, from: usize, to: usize },

    #[error("{kind} `{name}` on `{table}` names unknown column `{column}`")]
    UnknownColumn {
        kind: EntityKind,
        name: String,
        table: String,
        column: String,
    },

    #[error("{kind} `{name}` is attached to unknown table `{table}`")]
    UnknownTable {
        kind: EntityKind,
        name: String,
        table: String,
    },

    #[error("column `{column}` uses unknown enum `{name}`")]
    UnknownEnum { column: String, name: String },

    #[error("invalid identity on `{column}`: {reason}")]
    InvalidIdentity { column: String, reason: String },

    #[error("invalid sequence `{name}`: {reason}")]
    InvalidSequence { name: String, reason: String },

    #[error("{kind} `{name}` is not supported by {dialect}")]
    Unsupported {
        kind: EntityKind,
        name: String,
        dialect: Dialect,
    },
}

/// A hint probe failed against the live database
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("query failed: {message}")]
pub struct QueryError {
    pub message: String,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Snapshot loading and saving errors
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid snapshot json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported {dialect} snapshot version {found} (latest is {latest})")]
    UnsupportedVersion {
        dialect: Dialect,
        found: String,
        latest: &'static str,
    },

    #[error("snapshot dialect {found} does not match {expected}")]
    DialectMismatch { expected: Dialect, found: Dialect },
}

/// Journal loading and saving errors
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("failed to access journal: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid journal json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("journal dialect {found} does not match {expected}")]
    DialectMismatch { expected: Dialect, found: Dialect },
}
