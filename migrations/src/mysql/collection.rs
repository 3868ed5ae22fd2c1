//! MySQL entity store

use super::ddl::{
    CheckConstraint, Column, ForeignKey, Index, MySqlEntity, PrimaryKey, Table, View,
};
use crate::collection::Collection;
use crate::error::DuplicateKeyError;
use crate::filter::EntityFilter;
use crate::traits::{Entity, EntityKey, KeyFilter};
use serde::Serialize;

/// Complete MySQL DDL store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MySqlDdl {
    pub tables: Collection<Table>,
    pub columns: Collection<Column>,
    pub pks: Collection<PrimaryKey>,
    pub indexes: Collection<Index>,
    pub fks: Collection<ForeignKey>,
    pub checks: Collection<CheckConstraint>,
    pub views: Collection<View>,
}

/// A table with its columns and constraints
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableFull {
    pub name: String,
    pub columns: Vec<Column>,
    pub pk: Option<PrimaryKey>,
    pub checks: Vec<CheckConstraint>,
    pub fks: Vec<ForeignKey>,
}

impl MySqlDdl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entities(
        entities: impl IntoIterator<Item = MySqlEntity>,
    ) -> Result<Self, DuplicateKeyError> {
        let mut ddl = Self::new();
        for entity in entities {
            ddl.push_entity(entity)?;
        }
        Ok(ddl)
    }

    pub fn push_entity(&mut self, entity: MySqlEntity) -> Result<(), DuplicateKeyError> {
        match entity {
            MySqlEntity::Table(e) => self.tables.push(e),
            MySqlEntity::Column(e) => self.columns.push(e),
            MySqlEntity::PrimaryKey(e) => self.pks.push(e),
            MySqlEntity::Index(e) => self.indexes.push(e),
            MySqlEntity::ForeignKey(e) => self.fks.push(e),
            MySqlEntity::CheckConstraint(e) => self.checks.push(e),
            MySqlEntity::View(e) => self.views.push(e),
        }
    }

    /// Flatten into snapshot order
    pub fn to_entities(&self) -> Vec<MySqlEntity> {
        fn sorted<E: Entity>(
            col: &Collection<E>,
            wrap: fn(E) -> MySqlEntity,
        ) -> impl Iterator<Item = MySqlEntity> + '_ {
            col.sorted().into_iter().cloned().map(wrap)
        }

        sorted(&self.tables, MySqlEntity::Table)
            .chain(sorted(&self.columns, MySqlEntity::Column))
            .chain(sorted(&self.pks, MySqlEntity::PrimaryKey))
            .chain(sorted(&self.indexes, MySqlEntity::Index))
            .chain(sorted(&self.fks, MySqlEntity::ForeignKey))
            .chain(sorted(&self.checks, MySqlEntity::CheckConstraint))
            .chain(sorted(&self.views, MySqlEntity::View))
            .collect()
    }

    pub fn sort(&mut self) {
        self.tables.sort();
        self.columns.sort();
        self.pks.sort();
        self.indexes.sort();
        self.fks.sort();
        self.checks.sort();
        self.views.sort();
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
            && self.columns.is_empty()
            && self.pks.is_empty()
            && self.indexes.is_empty()
            && self.fks.is_empty()
            && self.checks.is_empty()
            && self.views.is_empty()
    }

    pub fn table_full(&self, name: &str) -> Option<TableFull> {
        let table = self.tables.get(&EntityKey::simple(name))?;
        let filter = KeyFilter::on_table(name);
        Some(TableFull {
            name: table.name.clone(),
            columns: self.columns.list(&filter).into_iter().cloned().collect(),
            pk: self.pks.one(&filter).cloned(),
            checks: self.checks.list(&filter).into_iter().cloned().collect(),
            fks: self.fks.list(&filter).into_iter().cloned().collect(),
        })
    }

    /// Restrict the store to the tables a filter accepts; views are kept
    pub fn filtered(&self, filter: &EntityFilter) -> Self {
        let mut out = self.clone();
        out.tables.retain(|t| filter.table(&t.name));
        out.columns.retain(|c| filter.table(&c.table));
        out.pks.retain(|p| filter.table(&p.table));
        out.indexes.retain(|i| filter.table(&i.table));
        out.fks.retain(|f| filter.table(&f.table));
        out.checks.retain(|c| filter.table(&c.table));
        out
    }
}
