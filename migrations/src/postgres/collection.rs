//! PostgreSQL entity store
//!
//! One [`Collection`] per entity kind. Diffs clone a store and mutate the
//! clone, so the caller's stores are never touched.

use super::ddl::{
    CheckConstraint, Column, Enum, ForeignKey, Index, Policy, PostgresEntity, PrimaryKey,
    Privilege, Role, Schema, Sequence, Table, UniqueConstraint, View,
};
use crate::collection::Collection;
use crate::error::DuplicateKeyError;
use crate::filter::EntityFilter;
use crate::traits::{Entity, KeyFilter};
use serde::Serialize;

/// Complete PostgreSQL DDL store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostgresDdl {
    pub schemas: Collection<Schema>,
    pub enums: Collection<Enum>,
    pub sequences: Collection<Sequence>,
    pub roles: Collection<Role>,
    pub privileges: Collection<Privilege>,
    pub policies: Collection<Policy>,
    pub tables: Collection<Table>,
    pub columns: Collection<Column>,
    pub indexes: Collection<Index>,
    pub fks: Collection<ForeignKey>,
    pub pks: Collection<PrimaryKey>,
    pub uniques: Collection<UniqueConstraint>,
    pub checks: Collection<CheckConstraint>,
    pub views: Collection<View>,
}

/// A table with its columns and constraints
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableFull {
    pub schema: String,
    pub name: String,
    pub is_rls_enabled: bool,
    pub columns: Vec<Column>,
    pub pk: Option<PrimaryKey>,
    pub uniques: Vec<UniqueConstraint>,
    pub checks: Vec<CheckConstraint>,
    pub fks: Vec<ForeignKey>,
}

impl PostgresDdl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a flat entity list, rejecting duplicate keys
    pub fn from_entities(
        entities: impl IntoIterator<Item = PostgresEntity>,
    ) -> Result<Self, DuplicateKeyError> {
        let mut ddl = Self::new();
        for entity in entities {
            ddl.push_entity(entity)?;
        }
        Ok(ddl)
    }

    pub fn push_entity(&mut self, entity: PostgresEntity) -> Result<(), DuplicateKeyError> {
        match entity {
            PostgresEntity::Schema(e) => self.schemas.push(e),
            PostgresEntity::Enum(e) => self.enums.push(e),
            PostgresEntity::Sequence(e) => self.sequences.push(e),
            PostgresEntity::Role(e) => self.roles.push(e),
            PostgresEntity::Privilege(e) => self.privileges.push(e),
            PostgresEntity::Policy(e) => self.policies.push(e),
            PostgresEntity::Table(e) => self.tables.push(e),
            PostgresEntity::Column(e) => self.columns.push(e),
            PostgresEntity::Index(e) => self.indexes.push(e),
            PostgresEntity::ForeignKey(e) => self.fks.push(e),
            PostgresEntity::PrimaryKey(e) => self.pks.push(e),
            PostgresEntity::UniqueConstraint(e) => self.uniques.push(e),
            PostgresEntity::CheckConstraint(e) => self.checks.push(e),
            PostgresEntity::View(e) => self.views.push(e),
        }
    }

    /// Flatten into snapshot order: kind by kind, each sorted by natural key
    pub fn to_entities(&self) -> Vec<PostgresEntity> {
        fn sorted<E: Entity>(
            col: &Collection<E>,
            wrap: fn(E) -> PostgresEntity,
        ) -> impl Iterator<Item = PostgresEntity> + '_ {
            col.sorted().into_iter().cloned().map(wrap)
        }

        sorted(&self.schemas, PostgresEntity::Schema)
            .chain(sorted(&self.enums, PostgresEntity::Enum))
            .chain(sorted(&self.sequences, PostgresEntity::Sequence))
            .chain(sorted(&self.roles, PostgresEntity::Role))
            .chain(sorted(&self.tables, PostgresEntity::Table))
            .chain(sorted(&self.columns, PostgresEntity::Column))
            .chain(sorted(&self.pks, PostgresEntity::PrimaryKey))
            .chain(sorted(&self.uniques, PostgresEntity::UniqueConstraint))
            .chain(sorted(&self.checks, PostgresEntity::CheckConstraint))
            .chain(sorted(&self.indexes, PostgresEntity::Index))
            .chain(sorted(&self.fks, PostgresEntity::ForeignKey))
            .chain(sorted(&self.policies, PostgresEntity::Policy))
            .chain(sorted(&self.privileges, PostgresEntity::Privilege))
            .chain(sorted(&self.views, PostgresEntity::View))
            .collect()
    }

    /// Sort every collection by natural key
    pub fn sort(&mut self) {
        self.schemas.sort();
        self.enums.sort();
        self.sequences.sort();
        self.roles.sort();
        self.privileges.sort();
        self.policies.sort();
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
        self.schemas.is_empty()
            && self.enums.is_empty()
            && self.sequences.is_empty()
            && self.roles.is_empty()
            && self.privileges.is_empty()
            && self.policies.is_empty()
            && self.tables.is_empty()
            && self.columns.is_empty()
            && self.indexes.is_empty()
            && self.fks.is_empty()
            && self.pks.is_empty()
            && self.uniques.is_empty()
            && self.checks.is_empty()
            && self.views.is_empty()
    }

    /// Gather a table with its columns and constraints
    pub fn table_full(&self, schema: &str, name: &str) -> Option<TableFull> {
        let table = self.tables.one(&KeyFilter::schema(schema).named(name))?;
        let filter = KeyFilter::table(schema, name);
        Some(TableFull {
            schema: table.schema.clone(),
            name: table.name.clone(),
            is_rls_enabled: table.is_rls_enabled,
            columns: self.columns.list(&filter).into_iter().cloned().collect(),
            pk: self.pks.one(&filter).cloned(),
            uniques: self.uniques.list(&filter).into_iter().cloned().collect(),
            checks: self.checks.list(&filter).into_iter().cloned().collect(),
            fks: self.fks.list(&filter).into_iter().cloned().collect(),
        })
    }

    /// Restrict the store to the tables and schemas a filter accepts.
    ///
    /// Table-level entities follow their table; foreign keys into a
    /// filtered-out table are kept since they belong to the source table.
    pub fn filtered(&self, filter: &EntityFilter) -> Self {
        let in_schema = |schema: &str| filter.schema(schema);
        let on_table = |schema: &str, table: &str| filter.schema(schema) && filter.table(table);

        let mut out = self.clone();
        out.schemas.retain(|s| in_schema(&s.name));
        out.enums.retain(|e| in_schema(&e.schema));
        out.sequences.retain(|s| in_schema(&s.schema));
        out.views.retain(|v| in_schema(&v.schema));
        out.tables.retain(|t| on_table(&t.schema, &t.name));
        out.columns.retain(|c| on_table(&c.schema, &c.table));
        out.indexes.retain(|i| on_table(&i.schema, &i.table));
        out.fks.retain(|f| on_table(&f.schema, &f.table));
        out.pks.retain(|p| on_table(&p.schema, &p.table));
        out.uniques.retain(|u| on_table(&u.schema, &u.table));
        out.checks.retain(|c| on_table(&c.schema, &c.table));
        out.policies.retain(|p| on_table(&p.schema, &p.table));
        out.privileges.retain(|p| on_table(&p.schema, &p.table));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(schema: &str, name: &str) -> PostgresEntity {
        PostgresEntity::Table(Table {
            schema: schema.into(),
            name: name.into(),
            is_rls_enabled: false,
        })
    }

    fn column(schema: &str, table: &str, name: &str) -> PostgresEntity {
        PostgresEntity::Column(Column {
            schema: schema.into(),
            table: table.into(),
            name: name.into(),
            sql_type: "integer".into(),
            type_schema: None,
            not_null: true,
            default: None,
            generated: None,
            identity: None,
            dimensions: 0,
        })
    }

    #[test]
    fn test_from_entities_rejects_duplicates() {
        let err = PostgresDdl::from_entities([table("public", "users"), table("public", "users")])
            .unwrap_err();
        assert_eq!(err.kind, crate::traits::EntityKind::Table);
    }

    #[test]
    fn test_to_entities_is_sorted() {
        let ddl = PostgresDdl::from_entities([
            column("public", "users", "name"),
            table("public", "users"),
            column("public", "users", "id"),
            table("auth", "sessions"),
        ])
        .unwrap();
        let names: Vec<String> = ddl
            .to_entities()
            .iter()
            .map(|e| match e {
                PostgresEntity::Table(t) => format!("t:{}.{}", t.schema, t.name),
                PostgresEntity::Column(c) => format!("c:{}", c.name),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(names, ["t:auth.sessions", "t:public.users", "c:id", "c:name"]);
    }

    #[test]
    fn test_table_full() {
        let ddl = PostgresDdl::from_entities([
            table("public", "users"),
            column("public", "users", "id"),
            column("public", "posts", "id"),
        ])
        .unwrap();
        let full = ddl.table_full("public", "users").unwrap();
        assert_eq!(full.columns.len(), 1);
        assert!(full.pk.is_none());
        assert!(ddl.table_full("public", "missing").is_none());
    }

    #[test]
    fn test_filtered() {
        let ddl = PostgresDdl::from_entities([
            table("public", "users"),
            column("public", "users", "id"),
            table("public", "tmp_cache"),
            column("public", "tmp_cache", "id"),
            table("audit", "log"),
        ])
        .unwrap();
        let filter = EntityFilter::new(&["!tmp_*"], &["public"]).unwrap();
        let filtered = ddl.filtered(&filter);
        assert_eq!(filtered.tables.len(), 1);
        assert_eq!(filtered.columns.len(), 1);
    }
}
