//! SQLite DDL entity types
//!
//! A SQLite database has a single namespace: tables and views are keyed by
//! name, everything else by `(table, name)`.

use crate::traits::{Entity, EntityKey, EntityKind};
use serde::{Deserialize, Serialize};

/// Table entity
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub name: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub strict: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub without_rowid: bool,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GeneratedType {
    #[default]
    Stored,
    Virtual,
}

/// Generated column definition
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Generated {
    #[serde(rename = "as")]
    pub expression: String,
    #[serde(rename = "type")]
    pub gen_type: GeneratedType,
}

/// Column entity
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub table: String,
    pub name: String,
    #[serde(rename = "type")]
    pub sql_type: String,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub autoincrement: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<Generated>,
}

/// How an index came to exist
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndexOrigin {
    /// `CREATE INDEX`
    #[default]
    Manual,
    /// `sqlite_autoindex_*` backing a unique or primary key constraint
    Auto,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IndexColumn {
    pub value: String,
    #[serde(default)]
    pub is_expression: bool,
}

impl IndexColumn {
    pub fn column(name: impl Into<String>) -> Self {
        Self {
            value: name.into(),
            is_expression: false,
        }
    }
}

/// Index entity
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub table: String,
    pub name: String,
    #[serde(default)]
    pub name_explicit: bool,
    pub columns: Vec<IndexColumn>,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(rename = "where", default, skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<String>,
    #[serde(default)]
    pub origin: IndexOrigin,
}

/// Primary key entity
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryKey {
    pub table: String,
    pub name: String,
    #[serde(default)]
    pub name_explicit: bool,
    pub columns: Vec<String>,
}

/// Unique constraint entity
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UniqueConstraint {
    pub table: String,
    pub name: String,
    #[serde(default)]
    pub name_explicit: bool,
    pub columns: Vec<String>,
}

/// Check constraint entity
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckConstraint {
    pub table: String,
    pub name: String,
    pub value: String,
}

/// Foreign key entity
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKey {
    pub table: String,
    pub name: String,
    #[serde(default)]
    pub name_explicit: bool,
    pub columns: Vec<String>,
    pub table_to: String,
    pub columns_to: Vec<String>,
    pub on_update: String,
    pub on_delete: String,
}

impl ForeignKey {
    pub fn is_self_reference(&self) -> bool {
        self.table == self.table_to
    }
}

/// View entity
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default)]
    pub is_existing: bool,
}

/// Unified SQLite DDL entity, tagged by `entityType`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "entityType")]
pub enum SqliteEntity {
    #[serde(rename = "tables")]
    Table(Table),
    #[serde(rename = "columns")]
    Column(Column),
    #[serde(rename = "indexes")]
    Index(Index),
    #[serde(rename = "fks")]
    ForeignKey(ForeignKey),
    #[serde(rename = "pks")]
    PrimaryKey(PrimaryKey),
    #[serde(rename = "uniques")]
    UniqueConstraint(UniqueConstraint),
    #[serde(rename = "checks")]
    CheckConstraint(CheckConstraint),
    #[serde(rename = "views")]
    View(View),
}

impl SqliteEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            SqliteEntity::Table(_) => EntityKind::Table,
            SqliteEntity::Column(_) => EntityKind::Column,
            SqliteEntity::Index(_) => EntityKind::Index,
            SqliteEntity::ForeignKey(_) => EntityKind::ForeignKey,
            SqliteEntity::PrimaryKey(_) => EntityKind::PrimaryKey,
            SqliteEntity::UniqueConstraint(_) => EntityKind::UniqueConstraint,
            SqliteEntity::CheckConstraint(_) => EntityKind::CheckConstraint,
            SqliteEntity::View(_) => EntityKind::View,
        }
    }
}

macro_rules! named_entity {
    ($ty:ty, $kind:expr) => {
        impl Entity for $ty {
            const KIND: EntityKind = $kind;

            fn key(&self) -> EntityKey {
                EntityKey::simple(&self.name)
            }

            fn name(&self) -> &str {
                &self.name
            }
        }
    };
}

macro_rules! table_entity {
    ($ty:ty, $kind:expr) => {
        impl Entity for $ty {
            const KIND: EntityKind = $kind;

            fn key(&self) -> EntityKey {
                EntityKey::composite2(&self.table, &self.name)
            }

            fn table(&self) -> Option<&str> {
                Some(&self.table)
            }

            fn name(&self) -> &str {
                &self.name
            }

            fn parent_key(&self) -> Option<EntityKey> {
                Some(EntityKey::simple(&self.table))
            }
        }
    };
}

named_entity!(Table, EntityKind::Table);
named_entity!(View, EntityKind::View);

table_entity!(Column, EntityKind::Column);
table_entity!(Index, EntityKind::Index);
table_entity!(ForeignKey, EntityKind::ForeignKey);
table_entity!(PrimaryKey, EntityKind::PrimaryKey);
table_entity!(UniqueConstraint, EntityKind::UniqueConstraint);
table_entity!(CheckConstraint, EntityKind::CheckConstraint);
