//! PostgreSQL statement IR
//!
//! One variant per atomic DDL operation. Renderers and the hints pipeline
//! match on it exhaustively, so a new variant fails to compile until both
//! handle it.

use super::collection::TableFull;
use super::ddl::{
    CheckConstraint, Column, Enum, ForeignKey, Index, Policy, PrimaryKey, Privilege, Role,
    Sequence, Table, UniqueConstraint, View,
};
use crate::group::{Scope, Statement};
use crate::traits::DiffType;
use serde::Serialize;

/// Column attribute touched by an `alter_column`
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ColumnChange {
    Type,
    NotNull,
    Default,
    Identity,
}

/// Value added to an enum; `before` is `None` when appended
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct EnumValueAdd {
    pub value: String,
    pub before: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonStatement {
    CreateSchema {
        name: String,
    },
    DropSchema {
        name: String,
    },
    RenameSchema {
        from: String,
        to: String,
    },

    CreateEnum {
        #[serde(rename = "enum")]
        enum_: Enum,
    },
    DropEnum {
        #[serde(rename = "enum")]
        enum_: Enum,
    },
    RenameEnum {
        schema: String,
        from: String,
        to: String,
    },
    MoveEnum {
        name: String,
        from: String,
        to: String,
    },
    AlterEnum {
        to: Enum,
        values: Vec<EnumValueAdd>,
    },
    /// Values were removed or reordered; dependent columns go through text
    RecreateEnum {
        to: Enum,
        columns: Vec<Column>,
    },

    CreateSequence {
        sequence: Sequence,
    },
    DropSequence {
        sequence: Sequence,
    },
    RenameSequence {
        schema: String,
        from: String,
        to: String,
    },
    MoveSequence {
        name: String,
        from: String,
        to: String,
    },
    AlterSequence {
        sequence: Sequence,
    },

    CreateRole {
        role: Role,
    },
    DropRole {
        role: Role,
    },
    RenameRole {
        from: String,
        to: String,
    },
    AlterRole {
        role: Role,
    },
    GrantPrivilege {
        privilege: Privilege,
    },
    RevokePrivilege {
        privilege: Privilege,
    },

    CreateTable {
        table: TableFull,
    },
    DropTable {
        table: Table,
    },
    RenameTable {
        schema: String,
        from: String,
        to: String,
    },
    MoveTable {
        name: String,
        from: String,
        to: String,
    },
    EnableRls {
        table: Table,
    },
    DisableRls {
        table: Table,
    },

    AddColumn {
        column: Column,
    },
    DropColumn {
        column: Column,
    },
    RenameColumn {
        schema: String,
        table: String,
        from: String,
        to: String,
    },
    AlterColumn {
        from: Box<Column>,
        to: Box<Column>,
        changes: Vec<ColumnChange>,
    },
    /// Generated expression changed; the column is dropped and re-added
    RecreateColumn {
        column: Column,
    },

    CreateIndex {
        index: Index,
    },
    DropIndex {
        index: Index,
    },
    RenameIndex {
        schema: String,
        table: String,
        from: String,
        to: String,
    },
    AddPk {
        pk: PrimaryKey,
    },
    DropPk {
        pk: PrimaryKey,
    },
    AddUnique {
        unique: UniqueConstraint,
    },
    DropUnique {
        unique: UniqueConstraint,
    },
    AddCheck {
        check: CheckConstraint,
    },
    DropCheck {
        check: CheckConstraint,
    },
    CreateFk {
        fk: ForeignKey,
    },
    DropFk {
        fk: ForeignKey,
    },
    RenameConstraint {
        schema: String,
        table: String,
        from: String,
        to: String,
    },

    CreatePolicy {
        policy: Policy,
    },
    DropPolicy {
        policy: Policy,
    },
    RenamePolicy {
        schema: String,
        table: String,
        from: String,
        to: String,
    },
    AlterPolicy {
        from: Policy,
        to: Policy,
    },
    /// `as` or `for` changed, which `ALTER POLICY` cannot do
    RecreatePolicy {
        from: Policy,
        to: Policy,
    },

    CreateView {
        view: View,
    },
    DropView {
        view: View,
    },
    RenameView {
        schema: String,
        from: String,
        to: String,
        materialized: bool,
    },
    MoveView {
        name: String,
        from: String,
        to: String,
        materialized: bool,
    },
    /// Only `WITH` options changed
    AlterView {
        from: View,
        to: View,
    },
    RecreateView {
        from: View,
        to: View,
    },
}

impl Statement for JsonStatement {
    fn type_name(&self) -> &'static str {
        match self {
            Self::CreateSchema { .. } => "create_schema",
            Self::DropSchema { .. } => "drop_schema",
            Self::RenameSchema { .. } => "rename_schema",
            Self::CreateEnum { .. } => "create_enum",
            Self::DropEnum { .. } => "drop_enum",
            Self::RenameEnum { .. } => "rename_enum",
            Self::MoveEnum { .. } => "move_enum",
            Self::AlterEnum { .. } => "alter_enum",
            Self::RecreateEnum { .. } => "recreate_enum",
            Self::CreateSequence { .. } => "create_sequence",
            Self::DropSequence { .. } => "drop_sequence",
            Self::RenameSequence { .. } => "rename_sequence",
            Self::MoveSequence { .. } => "move_sequence",
            Self::AlterSequence { .. } => "alter_sequence",
            Self::CreateRole { .. } => "create_role",
            Self::DropRole { .. } => "drop_role",
            Self::RenameRole { .. } => "rename_role",
            Self::AlterRole { .. } => "alter_role",
            Self::GrantPrivilege { .. } => "grant_privilege",
            Self::RevokePrivilege { .. } => "revoke_privilege",
            Self::CreateTable { .. } => "create_table",
            Self::DropTable { .. } => "drop_table",
            Self::RenameTable { .. } => "rename_table",
            Self::MoveTable { .. } => "move_table",
            Self::EnableRls { .. } => "enable_rls",
            Self::DisableRls { .. } => "disable_rls",
            Self::AddColumn { .. } => "add_column",
            Self::DropColumn { .. } => "drop_column",
            Self::RenameColumn { .. } => "rename_column",
            Self::AlterColumn { .. } => "alter_column",
            Self::RecreateColumn { .. } => "recreate_column",
            Self::CreateIndex { .. } => "create_index",
            Self::DropIndex { .. } => "drop_index",
            Self::RenameIndex { .. } => "rename_index",
            Self::AddPk { .. } => "add_pk",
            Self::DropPk { .. } => "drop_pk",
            Self::AddUnique { .. } => "add_unique",
            Self::DropUnique { .. } => "drop_unique",
            Self::AddCheck { .. } => "add_check",
            Self::DropCheck { .. } => "drop_check",
            Self::CreateFk { .. } => "create_fk",
            Self::DropFk { .. } => "drop_fk",
            Self::RenameConstraint { .. } => "rename_constraint",
            Self::CreatePolicy { .. } => "create_policy",
            Self::DropPolicy { .. } => "drop_policy",
            Self::RenamePolicy { .. } => "rename_policy",
            Self::AlterPolicy { .. } => "alter_policy",
            Self::RecreatePolicy { .. } => "recreate_policy",
            Self::CreateView { .. } => "create_view",
            Self::DropView { .. } => "drop_view",
            Self::RenameView { .. } => "rename_view",
            Self::MoveView { .. } => "move_view",
            Self::AlterView { .. } => "alter_view",
            Self::RecreateView { .. } => "recreate_view",
        }
    }

    fn scope(&self) -> Scope {
        match self {
            Self::CreateSchema { name } | Self::DropSchema { name } => Scope::schema(Some(name)),
            Self::RenameSchema { to, .. } => Scope::schema(Some(to)),

            Self::CreateEnum { enum_ } | Self::DropEnum { enum_ } => {
                Scope::schema(Some(&enum_.schema))
            }
            Self::AlterEnum { to, .. } | Self::RecreateEnum { to, .. } => {
                Scope::schema(Some(&to.schema))
            }
            Self::RenameEnum { schema, .. }
            | Self::RenameSequence { schema, .. }
            | Self::RenameView { schema, .. } => Scope::schema(Some(schema)),
            Self::MoveEnum { to, .. } | Self::MoveSequence { to, .. } | Self::MoveView { to, .. } => {
                Scope::schema(Some(to))
            }
            Self::CreateSequence { sequence }
            | Self::DropSequence { sequence }
            | Self::AlterSequence { sequence } => Scope::schema(Some(&sequence.schema)),

            Self::CreateRole { .. }
            | Self::DropRole { .. }
            | Self::RenameRole { .. }
            | Self::AlterRole { .. } => Scope::schema(None),
            Self::GrantPrivilege { privilege } | Self::RevokePrivilege { privilege } => {
                Scope::table(Some(&privilege.schema), &privilege.table)
            }

            Self::CreateTable { table } => Scope::table(Some(&table.schema), &table.name),
            Self::DropTable { table } | Self::EnableRls { table } | Self::DisableRls { table } => {
                Scope::table(Some(&table.schema), &table.name)
            }
            Self::RenameTable { schema, to, .. } => Scope::table(Some(schema), to),
            Self::MoveTable { name, to, .. } => Scope::table(Some(to), name),

            Self::AddColumn { column }
            | Self::DropColumn { column }
            | Self::RecreateColumn { column } => Scope::table(Some(&column.schema), &column.table),
            Self::AlterColumn { to, .. } => Scope::table(Some(&to.schema), &to.table),
            Self::RenameColumn { schema, table, .. }
            | Self::RenameIndex { schema, table, .. }
            | Self::RenameConstraint { schema, table, .. }
            | Self::RenamePolicy { schema, table, .. } => Scope::table(Some(schema), table),

            Self::CreateIndex { index } | Self::DropIndex { index } => {
                Scope::table(Some(&index.schema), &index.table)
            }
            Self::AddPk { pk } | Self::DropPk { pk } => Scope::table(Some(&pk.schema), &pk.table),
            Self::AddUnique { unique } | Self::DropUnique { unique } => {
                Scope::table(Some(&unique.schema), &unique.table)
            }
            Self::AddCheck { check } | Self::DropCheck { check } => {
                Scope::table(Some(&check.schema), &check.table)
            }
            Self::CreateFk { fk } | Self::DropFk { fk } => Scope::table(Some(&fk.schema), &fk.table),

            Self::CreatePolicy { policy } | Self::DropPolicy { policy } => {
                Scope::table(Some(&policy.schema), &policy.table)
            }
            Self::AlterPolicy { to, .. } | Self::RecreatePolicy { to, .. } => {
                Scope::table(Some(&to.schema), &to.table)
            }

            Self::CreateView { view } | Self::DropView { view } => Scope::schema(Some(&view.schema)),
            Self::AlterView { to, .. } | Self::RecreateView { to, .. } => {
                Scope::schema(Some(&to.schema))
            }
        }
    }

    fn diff_type(&self) -> DiffType {
        match self {
            Self::CreateSchema { .. }
            | Self::CreateEnum { .. }
            | Self::CreateSequence { .. }
            | Self::CreateRole { .. }
            | Self::GrantPrivilege { .. }
            | Self::CreateTable { .. }
            | Self::EnableRls { .. }
            | Self::AddColumn { .. }
            | Self::CreateIndex { .. }
            | Self::AddPk { .. }
            | Self::AddUnique { .. }
            | Self::AddCheck { .. }
            | Self::CreateFk { .. }
            | Self::CreatePolicy { .. }
            | Self::CreateView { .. } => DiffType::Create,

            Self::DropSchema { .. }
            | Self::DropEnum { .. }
            | Self::DropSequence { .. }
            | Self::DropRole { .. }
            | Self::RevokePrivilege { .. }
            | Self::DropTable { .. }
            | Self::DisableRls { .. }
            | Self::DropColumn { .. }
            | Self::DropIndex { .. }
            | Self::DropPk { .. }
            | Self::DropUnique { .. }
            | Self::DropCheck { .. }
            | Self::DropFk { .. }
            | Self::DropPolicy { .. }
            | Self::DropView { .. } => DiffType::Drop,

            Self::RenameSchema { .. }
            | Self::RenameEnum { .. }
            | Self::MoveEnum { .. }
            | Self::AlterEnum { .. }
            | Self::RecreateEnum { .. }
            | Self::RenameSequence { .. }
            | Self::MoveSequence { .. }
            | Self::AlterSequence { .. }
            | Self::RenameRole { .. }
            | Self::AlterRole { .. }
            | Self::RenameTable { .. }
            | Self::MoveTable { .. }
            | Self::RenameColumn { .. }
            | Self::AlterColumn { .. }
            | Self::RecreateColumn { .. }
            | Self::RenameIndex { .. }
            | Self::RenameConstraint { .. }
            | Self::RenamePolicy { .. }
            | Self::AlterPolicy { .. }
            | Self::RecreatePolicy { .. }
            | Self::RenameView { .. }
            | Self::MoveView { .. }
            | Self::AlterView { .. }
            | Self::RecreateView { .. } => DiffType::Alter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::group_diffs;

    fn table(name: &str) -> Table {
        Table {
            schema: "public".into(),
            name: name.into(),
            is_rls_enabled: false,
        }
    }

    #[test]
    fn test_serialized_type_tag() {
        let stmt = JsonStatement::RenameTable {
            schema: "public".into(),
            from: "users".into(),
            to: "accounts".into(),
        };
        let json = serde_json::to_value(&stmt).unwrap();
        assert_eq!(json["type"], "rename_table");
        assert_eq!(stmt.type_name(), "rename_table");

        let stmt = JsonStatement::EnableRls { table: table("users") };
        assert_eq!(serde_json::to_value(&stmt).unwrap()["type"], "enable_rls");
    }

    #[test]
    fn test_grouping_by_table() {
        let statements = vec![
            JsonStatement::CreateSchema { name: "auth".into() },
            JsonStatement::DropTable { table: table("old") },
            JsonStatement::RenameColumn {
                schema: "public".into(),
                table: "users".into(),
                from: "name".into(),
                to: "full_name".into(),
            },
            JsonStatement::RenameRole {
                from: "a".into(),
                to: "b".into(),
            },
        ];
        let rows = group_diffs(&statements);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].schema.as_deref(), Some("auth"));
        assert!(rows[0].table.is_none());
        assert_eq!(rows[1].deleted.len(), 1);
        assert_eq!(rows[2].table.as_deref(), Some("users"));
        assert_eq!(rows[2].updated.len(), 1);
        assert!(rows[3].schema.is_none());
    }
}
