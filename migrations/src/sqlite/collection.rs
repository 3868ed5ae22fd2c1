//! SQLite entity store

use super::ddl::{
    CheckConstraint, Column, ForeignKey, Index, PrimaryKey, SqliteEntity, Table, UniqueConstraint,
    View,
};
use crate::collection::Collection;
use crate::error::DuplicateKeyError;
use crate::filter::EntityFilter;
use crate::traits::{Entity, EntityKey, KeyFilter};
use serde::Serialize;

/// Complete SQLite DDL store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqliteDdl {
    pub tables: Collection<Table>,
    pub columns: Collection<Column>,
    pub indexes: Collection<Index>,
    pub fks: Collection<ForeignKey>,
    pub pks: Collection<PrimaryKey>,
    pub uniques: Collection<UniqueConstraint>,
    pub checks: Collection<CheckConstraint>,
    pub views: Collection<View>,
}

/// Full table information for create and recreate
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableFull {
    pub name: String,
    pub columns: Vec<Column>,
    pub pk: Option<PrimaryKey>,
    pub fks: Vec<ForeignKey>,
    pub uniques: Vec<UniqueConstraint>,
    pub checks: Vec<CheckConstraint>,
    pub strict: bool,
    pub without_rowid: bool,
}

impl TableFull {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

impl SqliteDdl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entities(
        entities: impl IntoIterator<Item = SqliteEntity>,
    ) -> Result<Self, DuplicateKeyError> {
        let mut ddl = Self::new();
        for entity in entities {
            ddl.push_entity(entity)?;
        }
        Ok(ddl)
    }

    pub fn push_entity(&mut self, entity: SqliteEntity) -> Result<(), DuplicateKeyError> {
        match entity {
            SqliteEntity::Table(e) => self.tables.push(e),
            SqliteEntity::Column(e) => self.columns.push(e),
            SqliteEntity::Index(e) => self.indexes.push(e),
            SqliteEntity::ForeignKey(e) => self.fks.push(e),
            SqliteEntity::PrimaryKey(e) => self.pks.push(e),
            SqliteEntity::UniqueConstraint(e) => self.uniques.push(e),
            SqliteEntity::CheckConstraint(e) => self.checks.push(e),
            SqliteEntity::View(e) => self.views.push(e),
        }
    }

    /// Flatten into snapshot order
    pub fn to_entities(&self) -> Vec<SqliteEntity> {
        fn sorted<E: Entity>(
            col: &Collection<E>,
            wrap: fn(E) -> SqliteEntity,
        ) -> impl Iterator<Item = SqliteEntity> + '_ {
            col.sorted().into_iter().cloned().map(wrap)
        }

        sorted(&self.tables, SqliteEntity::Table)
            .chain(sorted(&self.columns, SqliteEntity::Column))
            .chain(sorted(&self.indexes, SqliteEntity::Index))
            .chain(sorted(&self.fks, SqliteEntity::ForeignKey))
            .chain(sorted(&self.pks, SqliteEntity::PrimaryKey))
            .chain(sorted(&self.uniques, SqliteEntity::UniqueConstraint))
            .chain(sorted(&self.checks, SqliteEntity::CheckConstraint))
            .chain(sorted(&self.views, SqliteEntity::View))
            .collect()
    }

    pub fn sort(&mut self) {
        self.tables.sort();
        self.columns.sort();
        self.indexes.sort();
        self.fks.sort();
        self.pks.sort();
        self.uniques.sort();
        self.checks.sort();
        self.views.sort();
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
            && self.columns.is_empty()
            && self.indexes.is_empty()
            && self.fks.is_empty()
            && self.pks.is_empty()
            && self.uniques.is_empty()
            && self.checks.is_empty()
            && self.views.is_empty()
    }

    /// Columns keep insertion order: SQLite rebuilds tables in that order
    pub fn table_full(&self, name: &str) -> Option<TableFull> {
        let table = self.tables.get(&EntityKey::simple(name))?;
        let filter = KeyFilter::on_table(name);
        Some(TableFull {
            name: table.name.clone(),
            columns: self.columns.list(&filter).into_iter().cloned().collect(),
            pk: self.pks.one(&filter).cloned(),
            fks: self.fks.list(&filter).into_iter().cloned().collect(),
            uniques: self.uniques.list(&filter).into_iter().cloned().collect(),
            checks: self.checks.list(&filter).into_iter().cloned().collect(),
            strict: table.strict,
            without_rowid: table.without_rowid,
        })
    }

    /// Restrict the store to the tables a filter accepts; views are kept
    pub fn filtered(&self, filter: &EntityFilter) -> Self {
        let mut out = self.clone();
        out.tables.retain(|t| filter.table(&t.name));
        out.columns.retain(|c| filter.table(&c.table));
        out.indexes.retain(|i| filter.table(&i.table));
        out.fks.retain(|f| filter.table(&f.table));
        out.pks.retain(|p| filter.table(&p.table));
        out.uniques.retain(|u| filter.table(&u.table));
        out.checks.retain(|c| filter.table(&c.table));
        out
    }
}
