//! SQLite snapshots

use super::collection::SqliteDdl;
use super::ddl::SqliteEntity;
use crate::error::DuplicateKeyError;
use crate::snapshot::{Meta, Snapshot};
use drift_types::Dialect;

pub type SqliteSnapshot = Snapshot<SqliteEntity>;

impl SqliteSnapshot {
    /// Empty origin a SQLite history starts from
    pub fn sqlite() -> Self {
        Snapshot::empty(Dialect::SQLite)
    }

    /// Snapshot the given store as the successor of `self`
    pub fn next_from(&self, ddl: &SqliteDdl, meta: Meta) -> Self {
        self.next(ddl.to_entities(), meta)
    }

    pub fn to_ddl(&self) -> Result<SqliteDdl, DuplicateKeyError> {
        SqliteDdl::from_entities(self.ddl.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::ddl::Table;
    use crate::traits::EntityKind;

    #[test]
    fn test_snapshot_keeps_renames_and_store() {
        let ddl = SqliteDdl::from_entities([SqliteEntity::Table(Table {
            name: "people".into(),
            strict: true,
            without_rowid: false,
        })])
        .unwrap();
        let mut meta = Meta::new();
        meta.record(EntityKind::Table, "users", "people");

        let snap = SqliteSnapshot::sqlite().next_from(&ddl, meta);
        let loaded = SqliteSnapshot::from_json(&snap.to_json().unwrap(), Dialect::SQLite).unwrap();
        assert_eq!(loaded.to_ddl().unwrap(), ddl);
        assert_eq!(loaded.meta.tables.get("users").map(String::as_str), Some("people"));
        assert!(loaded.is_first());
    }
}
