//! PostgreSQL snapshots
//!
//! The `ddl` array is the flat, sorted entity list of a [`PostgresDdl`].

use super::collection::PostgresDdl;
use super::ddl::PostgresEntity;
use crate::error::DuplicateKeyError;
use crate::snapshot::{Meta, Snapshot};
use drift_types::Dialect;

pub type PostgresSnapshot = Snapshot<PostgresEntity>;

impl PostgresSnapshot {
    /// Empty origin a PostgreSQL history starts from
    pub fn postgres() -> Self {
        Snapshot::empty(Dialect::PostgreSQL)
    }

    /// Snapshot the given store as the successor of `self`
    pub fn next_from(&self, ddl: &PostgresDdl, meta: Meta) -> Self {
        self.next(ddl.to_entities(), meta)
    }

    /// Rebuild the entity store
    pub fn to_ddl(&self) -> Result<PostgresDdl, DuplicateKeyError> {
        PostgresDdl::from_entities(self.ddl.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postgres::ddl::{Schema, Table};

    #[test]
    fn test_snapshot_round_trips_store() {
        let ddl = PostgresDdl::from_entities([
            PostgresEntity::Table(Table {
                schema: "public".into(),
                name: "users".into(),
                is_rls_enabled: false,
            }),
            PostgresEntity::Schema(Schema { name: "public".into() }),
        ])
        .unwrap();

        let snap = PostgresSnapshot::postgres().next_from(&ddl, Meta::new());
        assert!(matches!(snap.ddl[0], PostgresEntity::Schema(_)));

        let json = snap.to_json().unwrap();
        assert!(json.contains(r#""entityType": "tables""#));
        let loaded = PostgresSnapshot::from_json(&json, Dialect::PostgreSQL).unwrap();
        assert_eq!(loaded.to_ddl().unwrap(), ddl);
    }

    #[test]
    fn test_duplicate_entities_are_rejected() {
        let table = PostgresEntity::Table(Table {
            schema: "public".into(),
            name: "users".into(),
            is_rls_enabled: false,
        });
        let snap = PostgresSnapshot::postgres().next(vec![table.clone(), table], Meta::new());
        assert!(snap.to_ddl().is_err());
    }
}
