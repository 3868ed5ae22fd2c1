//! Aurora DSQL dialect
//!
//! DSQL speaks PostgreSQL and shares its entity model, but has no enums,
//! sequences, policies, roles, privileges, foreign keys or identity columns,
//! and runs every DDL statement in its own transaction.

use crate::error::{DiffError, SchemaError};
use crate::hints::{Db, HintsReport};
use crate::plan::DiffOutput;
use crate::postgres::{self, InterimSchema, JsonStatement, PostgresDdl, PostgresSnapshot};
use crate::resolver::Resolver;
use crate::snapshot::Snapshot;
use crate::traits::{Entity, EntityKind, Mode};
use drift_types::Dialect;

pub type DsqlDdl = PostgresDdl;

/// Report every entity DSQL cannot host
pub fn validate(ddl: &DsqlDdl) -> Vec<SchemaError> {
    fn unsupported<E: Entity>(entity: &E) -> SchemaError {
        SchemaError::Unsupported {
            kind: E::KIND,
            name: entity.identifier(),
            dialect: Dialect::DSQL,
        }
    }

    let mut errors = Vec::new();
    errors.extend(ddl.enums.sorted().into_iter().map(unsupported));
    errors.extend(ddl.sequences.sorted().into_iter().map(unsupported));
    errors.extend(ddl.roles.sorted().into_iter().map(unsupported));
    errors.extend(ddl.privileges.sorted().into_iter().map(unsupported));
    errors.extend(ddl.policies.sorted().into_iter().map(unsupported));
    errors.extend(ddl.fks.sorted().into_iter().map(unsupported));
    errors.extend(
        ddl.columns
            .sorted()
            .into_iter()
            .filter(|c| c.identity.is_some())
            .map(|c| SchemaError::Unsupported {
                kind: EntityKind::Column,
                name: format!("{} (identity)", c.identifier()),
                dialect: Dialect::DSQL,
            }),
    );
    errors
}

/// Normalize like PostgreSQL, then drop what DSQL cannot host.
///
/// Each dropped entity is reported as [`SchemaError::Unsupported`].
pub fn interim_to_ddl(interim: InterimSchema) -> (DsqlDdl, Vec<SchemaError>) {
    let (mut ddl, mut errors) = postgres::interim_to_ddl(interim);
    errors.extend(validate(&ddl));

    ddl.enums = Default::default();
    ddl.sequences = Default::default();
    ddl.roles = Default::default();
    ddl.privileges = Default::default();
    ddl.policies = Default::default();
    ddl.fks = Default::default();
    ddl.columns.retain(|c| c.identity.is_none());
    (ddl, errors)
}

/// Same engine as PostgreSQL; unsupported kinds never reach it
pub async fn ddl_diff<R: Resolver>(
    from: &DsqlDdl,
    to: &DsqlDdl,
    resolver: &mut R,
    mode: Mode,
) -> Result<DiffOutput<JsonStatement>, DiffError> {
    postgres::ddl_diff(from, to, resolver, mode).await
}

/// PostgreSQL hints, plus a warning that a multi-statement migration is
/// not atomic
pub async fn suggestions<D: Db>(db: &D, statements: &[JsonStatement]) -> HintsReport {
    let mut report = postgres::suggestions(db, statements).await;
    if statements.len() > 1 {
        report.warn(
            0,
            format!(
                "· DSQL runs each DDL statement in its own transaction, {} statements will not be applied atomically",
                statements.len()
            ),
        );
    }
    report
}

/// Empty origin a DSQL history starts from
pub fn empty_snapshot() -> PostgresSnapshot {
    Snapshot::empty(Dialect::DSQL)
}
