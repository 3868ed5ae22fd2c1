//! PostgreSQL DDL entity types
//!
//! These types represent the flat DDL entity array stored in snapshots.
//! Each entity has an `entityType` discriminator field and references parent
//! objects by name only.

use crate::traits::{Entity, EntityKey, EntityKind};
use serde::{Deserialize, Serialize};

// =============================================================================
// DDL Entity Types
// =============================================================================

/// Schema entity
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub name: String,
}

/// Enum entity
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Enum {
    pub schema: String,
    pub name: String,
    pub values: Vec<String>,
}

/// Sequence entity
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Sequence {
    pub schema: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub increment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_with: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle: Option<bool>,
}

/// Role entity
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub name: String,
    #[serde(default)]
    pub create_db: bool,
    #[serde(default)]
    pub create_role: bool,
    #[serde(default = "default_true")]
    pub inherit: bool,
}

/// Table privilege granted to a role
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Privilege {
    pub grantor: String,
    pub grantee: String,
    pub schema: String,
    pub table: String,
    /// `SELECT`, `INSERT`, ... or `ALL`
    #[serde(rename = "type")]
    pub privilege_type: String,
    pub is_grantable: bool,
}

/// Policy entity
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub schema: String,
    pub table: String,
    pub name: String,
    /// `PERMISSIVE` or `RESTRICTIVE`
    #[serde(rename = "as", default = "default_policy_as")]
    pub as_clause: String,
    /// `ALL`, `SELECT`, `INSERT`, `UPDATE` or `DELETE`
    #[serde(rename = "for", default = "default_policy_for")]
    pub for_clause: String,
    #[serde(default = "default_policy_to")]
    pub to: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub using: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub with_check: Option<String>,
}

/// Table entity
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub schema: String,
    pub name: String,
    #[serde(default)]
    pub is_rls_enabled: bool,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GeneratedType {
    Stored,
    Virtual,
}

/// Generated definition in column
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Generated {
    #[serde(rename = "as")]
    pub expression: String,
    #[serde(rename = "type")]
    pub generated_type: GeneratedType,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentityType {
    #[serde(rename = "always")]
    Always,
    #[serde(rename = "byDefault")]
    ByDefault,
}

/// Identity definition in column
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Backing sequence name
    pub name: String,
    #[serde(rename = "type")]
    pub identity_type: IdentityType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub increment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_with: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle: Option<bool>,
}

/// Column entity
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub schema: String,
    pub table: String,
    pub name: String,
    #[serde(rename = "type")]
    pub sql_type: String,
    /// Schema of a user-defined (enum) type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_schema: Option<String>,
    pub not_null: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated: Option<Generated>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
    /// Array dimensions, `0` for scalars
    #[serde(default)]
    pub dimensions: u32,
}

/// Index column definition
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IndexColumn {
    pub value: String,
    pub is_expression: bool,
    pub asc: bool,
    pub nulls_first: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opclass: Option<String>,
}

impl IndexColumn {
    pub fn column(name: impl Into<String>) -> Self {
        Self {
            value: name.into(),
            is_expression: false,
            asc: true,
            nulls_first: false,
            opclass: None,
        }
    }
}

/// Index entity
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub name_explicit: bool,
    pub columns: Vec<IndexColumn>,
    pub is_unique: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#where: Option<String>,
    pub method: String,
    pub concurrently: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub with: Option<String>,
}

/// Foreign Key entity
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKey {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub name_explicit: bool,
    pub columns: Vec<String>,
    pub schema_to: String,
    pub table_to: String,
    pub columns_to: Vec<String>,
    pub on_update: String,
    pub on_delete: String,
}

impl ForeignKey {
    pub fn is_self_reference(&self) -> bool {
        self.schema == self.schema_to && self.table == self.table_to
    }
}

/// Primary Key entity
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryKey {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub name_explicit: bool,
    pub columns: Vec<String>,
}

/// Unique Constraint entity
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UniqueConstraint {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub name_explicit: bool,
    pub columns: Vec<String>,
    pub nulls_not_distinct: bool,
}

/// Check Constraint entity
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckConstraint {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub value: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ViewWithOption {
    /// `local` or `cascaded`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_option: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_barrier: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_invoker: Option<bool>,

    // Materialized view options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fillfactor: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toast_tuple_target: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_workers: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autovacuum_enabled: Option<bool>,
    /// `auto`, `off` or `on`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vacuum_index_cleanup: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vacuum_truncate: Option<bool>,
}

/// View entity
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub schema: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    pub materialized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub with: Option<ViewWithOption>,
    /// Declared in the source but managed outside migrations
    #[serde(default)]
    pub is_existing: bool,
    #[serde(default)]
    pub with_no_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub using: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tablespace: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_policy_as() -> String {
    "PERMISSIVE".to_string()
}

fn default_policy_for() -> String {
    "ALL".to_string()
}

fn default_policy_to() -> Vec<String> {
    vec!["public".to_string()]
}

// =============================================================================
// Unified Entity Enum
// =============================================================================

/// Unified PostgreSQL DDL entity enum for serialization
///
/// Uses internally-tagged enum representation where `entityType` discriminates variants.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "entityType")]
pub enum PostgresEntity {
    #[serde(rename = "schemas")]
    Schema(Schema),
    #[serde(rename = "enums")]
    Enum(Enum),
    #[serde(rename = "sequences")]
    Sequence(Sequence),
    #[serde(rename = "roles")]
    Role(Role),
    #[serde(rename = "privileges")]
    Privilege(Privilege),
    #[serde(rename = "policies")]
    Policy(Policy),
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

impl PostgresEntity {
    /// Get the entity kind for this entity
    pub fn kind(&self) -> EntityKind {
        match self {
            PostgresEntity::Schema(_) => EntityKind::Schema,
            PostgresEntity::Enum(_) => EntityKind::Enum,
            PostgresEntity::Sequence(_) => EntityKind::Sequence,
            PostgresEntity::Role(_) => EntityKind::Role,
            PostgresEntity::Privilege(_) => EntityKind::Privilege,
            PostgresEntity::Policy(_) => EntityKind::Policy,
            PostgresEntity::Table(_) => EntityKind::Table,
            PostgresEntity::Column(_) => EntityKind::Column,
            PostgresEntity::Index(_) => EntityKind::Index,
            PostgresEntity::ForeignKey(_) => EntityKind::ForeignKey,
            PostgresEntity::PrimaryKey(_) => EntityKind::PrimaryKey,
            PostgresEntity::UniqueConstraint(_) => EntityKind::UniqueConstraint,
            PostgresEntity::CheckConstraint(_) => EntityKind::CheckConstraint,
            PostgresEntity::View(_) => EntityKind::View,
        }
    }
}

// =============================================================================
// Entity Trait Implementations
// =============================================================================

/// Schema-scoped entity: `(schema, name)`
macro_rules! schema_entity {
    ($ty:ty, $kind:expr) => {
        impl Entity for $ty {
            const KIND: EntityKind = $kind;

            fn key(&self) -> EntityKey {
                EntityKey::composite2(&self.schema, &self.name)
            }

            fn schema(&self) -> Option<&str> {
                Some(&self.schema)
            }

            fn name(&self) -> &str {
                &self.name
            }

            fn parent_key(&self) -> Option<EntityKey> {
                Some(EntityKey::simple(&self.schema))
            }
        }
    };
}

/// Table-level entity whose name is unique per schema (backed by an index)
macro_rules! indexed_entity {
    ($ty:ty, $kind:expr) => {
        impl Entity for $ty {
            const KIND: EntityKind = $kind;

            fn key(&self) -> EntityKey {
                EntityKey::composite2(&self.schema, &self.name)
            }

            fn schema(&self) -> Option<&str> {
                Some(&self.schema)
            }

            fn table(&self) -> Option<&str> {
                Some(&self.table)
            }

            fn name(&self) -> &str {
                &self.name
            }

            fn parent_key(&self) -> Option<EntityKey> {
                Some(EntityKey::composite2(&self.schema, &self.table))
            }
        }
    };
}

/// Table-level entity whose name is unique per table
macro_rules! table_entity {
    ($ty:ty, $kind:expr) => {
        impl Entity for $ty {
            const KIND: EntityKind = $kind;

            fn key(&self) -> EntityKey {
                EntityKey::composite3(&self.schema, &self.table, &self.name)
            }

            fn schema(&self) -> Option<&str> {
                Some(&self.schema)
            }

            fn table(&self) -> Option<&str> {
                Some(&self.table)
            }

            fn name(&self) -> &str {
                &self.name
            }

            fn parent_key(&self) -> Option<EntityKey> {
                Some(EntityKey::composite2(&self.schema, &self.table))
            }
        }
    };
}

impl Entity for Schema {
    const KIND: EntityKind = EntityKind::Schema;

    fn key(&self) -> EntityKey {
        EntityKey::simple(&self.name)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Entity for Role {
    const KIND: EntityKind = EntityKind::Role;

    fn key(&self) -> EntityKey {
        EntityKey::simple(&self.name)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Entity for Privilege {
    const KIND: EntityKind = EntityKind::Privilege;

    fn key(&self) -> EntityKey {
        EntityKey::composite3(
            &self.schema,
            &self.table,
            format!("{}:{}", self.grantee, self.privilege_type),
        )
    }

    fn schema(&self) -> Option<&str> {
        Some(&self.schema)
    }

    fn table(&self) -> Option<&str> {
        Some(&self.table)
    }

    fn name(&self) -> &str {
        &self.grantee
    }

    fn parent_key(&self) -> Option<EntityKey> {
        Some(EntityKey::composite2(&self.schema, &self.table))
    }
}

schema_entity!(Enum, EntityKind::Enum);
schema_entity!(Sequence, EntityKind::Sequence);
schema_entity!(Table, EntityKind::Table);
schema_entity!(View, EntityKind::View);

indexed_entity!(Index, EntityKind::Index);
indexed_entity!(PrimaryKey, EntityKind::PrimaryKey);
indexed_entity!(UniqueConstraint, EntityKind::UniqueConstraint);

table_entity!(Column, EntityKind::Column);
table_entity!(ForeignKey, EntityKind::ForeignKey);
table_entity!(CheckConstraint, EntityKind::CheckConstraint);
table_entity!(Policy, EntityKind::Policy);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_tag_roundtrip() {
        let json = r#"{"entityType":"tables","schema":"public","name":"users","isRlsEnabled":false}"#;
        let entity: PostgresEntity = serde_json::from_str(json).unwrap();
        assert_eq!(entity.kind(), EntityKind::Table);
        assert_eq!(serde_json::to_string(&entity).unwrap(), json);
    }

    #[test]
    fn test_policy_defaults() {
        let json = r#"{"schema":"public","table":"users","name":"p"}"#;
        let policy: Policy = serde_json::from_str(json).unwrap();
        assert_eq!(policy.as_clause, "PERMISSIVE");
        assert_eq!(policy.for_clause, "ALL");
        assert_eq!(policy.to, vec!["public"]);
    }

    #[test]
    fn test_keys() {
        let check = CheckConstraint {
            schema: "public".into(),
            table: "users".into(),
            name: "age_check".into(),
            value: "age > 0".into(),
        };
        assert_eq!(check.identifier(), "public.users.age_check");
        assert_eq!(check.parent_key(), Some(EntityKey::composite2("public", "users")));

        let privilege = Privilege {
            grantor: "postgres".into(),
            grantee: "reader".into(),
            schema: "public".into(),
            table: "users".into(),
            privilege_type: "SELECT".into(),
            is_grantable: false,
        };
        assert_eq!(privilege.identifier(), "public.users.reader:SELECT");
        assert_eq!(privilege.name(), "reader");
    }
}
