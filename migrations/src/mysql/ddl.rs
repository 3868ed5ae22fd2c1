//! MySQL DDL entity types
//!
//! MySQL has no schemas inside a database, so table-level entities are keyed
//! by `(table, name)` and tables and views by name alone.

use crate::traits::{Entity, EntityKey, EntityKind};
use serde::{Deserialize, Serialize};

/// Table entity
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GeneratedType {
    Stored,
    Virtual,
}

/// Generated column definition
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Generated {
    #[serde(rename = "as")]
    pub expression: String,
    #[serde(rename = "type")]
    pub generated_type: GeneratedType,
}

/// Column entity
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub table: String,
    pub name: String,
    #[serde(rename = "type")]
    pub sql_type: String,
    pub not_null: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// `ON UPDATE CURRENT_TIMESTAMP`
    #[serde(default)]
    pub on_update_now: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated: Option<Generated>,
}

/// Primary key; MySQL always names it `PRIMARY`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryKey {
    pub table: String,
    pub name: String,
    pub columns: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IndexColumn {
    pub value: String,
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

/// Index entity; unique constraints are unique indexes
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub table: String,
    pub name: String,
    pub name_explicit: bool,
    pub columns: Vec<IndexColumn>,
    pub is_unique: bool,
    /// `btree` or `hash`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub using: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock: Option<String>,
}

/// Foreign key entity
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKey {
    pub table: String,
    pub name: String,
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

/// Check constraint entity
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckConstraint {
    pub table: String,
    pub name: String,
    pub value: String,
}

/// View entity
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub name: String,
    pub definition: String,
    /// `undefined`, `merge` or `temptable`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    /// `definer` or `invoker`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_security: Option<String>,
    /// `cascaded` or `local`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub with_check_option: Option<String>,
    #[serde(default)]
    pub is_existing: bool,
}

/// Unified MySQL DDL entity, tagged by `entityType`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "entityType")]
pub enum MySqlEntity {
    #[serde(rename = "tables")]
    Table(Table),
    #[serde(rename = "columns")]
    Column(Column),
    #[serde(rename = "pks")]
    PrimaryKey(PrimaryKey),
    #[serde(rename = "indexes")]
    Index(Index),
    #[serde(rename = "fks")]
    ForeignKey(ForeignKey),
    #[serde(rename = "checks")]
    CheckConstraint(CheckConstraint),
    #[serde(rename = "views")]
    View(View),
}

impl MySqlEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            MySqlEntity::Table(_) => EntityKind::Table,
            MySqlEntity::Column(_) => EntityKind::Column,
            MySqlEntity::PrimaryKey(_) => EntityKind::PrimaryKey,
            MySqlEntity::Index(_) => EntityKind::Index,
            MySqlEntity::ForeignKey(_) => EntityKind::ForeignKey,
            MySqlEntity::CheckConstraint(_) => EntityKind::CheckConstraint,
            MySqlEntity::View(_) => EntityKind::View,
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
table_entity!(PrimaryKey, EntityKind::PrimaryKey);
table_entity!(Index, EntityKind::Index);
table_entity!(ForeignKey, EntityKind::ForeignKey);
table_entity!(CheckConstraint, EntityKind::CheckConstraint);
