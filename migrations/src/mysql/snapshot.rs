//! MySQL snapshots

use super::collection::MySqlDdl;
use super::ddl::MySqlEntity;
use crate::error::DuplicateKeyError;
use crate::snapshot::{Meta, Snapshot};
use drift_types::Dialect;

pub type MySqlSnapshot = Snapshot<MySqlEntity>;

impl MySqlSnapshot {
    /// Empty origin a MySQL history starts from
    pub fn mysql() -> Self {
        Snapshot::empty(Dialect::MySQL)
    }

    /// Snapshot the given store as the successor of `self`
    pub fn next_from(&self, ddl: &MySqlDdl, meta: Meta) -> Self {
        self.next(ddl.to_entities(), meta)
    }

    pub fn to_ddl(&self) -> Result<MySqlDdl, DuplicateKeyError> {
        MySqlDdl::from_entities(self.ddl.iter().cloned())
    }
}
