//! MySQL statement IR

use super::collection::TableFull;
use super::ddl::{CheckConstraint, Column, ForeignKey, Index, PrimaryKey, Table, View};
use crate::group::{Scope, Statement};
use crate::traits::DiffType;
use serde::Serialize;

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonStatement {
    CreateTable {
        table: TableFull,
    },
    DropTable {
        table: Table,
    },
    RenameTable {
        from: String,
        to: String,
    },

    AddColumn {
        column: Column,
    },
    DropColumn {
        column: Column,
    },
    RenameColumn {
        table: String,
        from: String,
        to: String,
    },
    /// `MODIFY COLUMN` with the full new definition
    AlterColumn {
        from: Box<Column>,
        to: Box<Column>,
    },
    /// Generated expression changed; drop and add again
    RecreateColumn {
        from: Box<Column>,
        to: Box<Column>,
    },

    CreateIndex {
        index: Index,
    },
    DropIndex {
        index: Index,
    },
    RenameIndex {
        table: String,
        from: String,
        to: String,
    },
    CreatePk {
        pk: PrimaryKey,
    },
    DropPk {
        pk: PrimaryKey,
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

    CreateView {
        view: View,
    },
    DropView {
        view: View,
    },
    RenameView {
        from: String,
        to: String,
    },
    AlterView {
        from: View,
        to: View,
    },
}

impl Statement for JsonStatement {
    fn type_name(&self) -> &'static str {
        match self {
            Self::CreateTable { .. } => "create_table",
            Self::DropTable { .. } => "drop_table",
            Self::RenameTable { .. } => "rename_table",
            Self::AddColumn { .. } => "add_column",
            Self::DropColumn { .. } => "drop_column",
            Self::RenameColumn { .. } => "rename_column",
            Self::AlterColumn { .. } => "alter_column",
            Self::RecreateColumn { .. } => "recreate_column",
            Self::CreateIndex { .. } => "create_index",
            Self::DropIndex { .. } => "drop_index",
            Self::RenameIndex { .. } => "rename_index",
            Self::CreatePk { .. } => "create_pk",
            Self::DropPk { .. } => "drop_pk",
            Self::AddCheck { .. } => "add_check",
            Self::DropCheck { .. } => "drop_check",
            Self::CreateFk { .. } => "create_fk",
            Self::DropFk { .. } => "drop_fk",
            Self::CreateView { .. } => "create_view",
            Self::DropView { .. } => "drop_view",
            Self::RenameView { .. } => "rename_view",
            Self::AlterView { .. } => "alter_view",
        }
    }

    fn scope(&self) -> Scope {
        match self {
            Self::CreateTable { table } => Scope::table(None, &table.name),
            Self::DropTable { table } => Scope::table(None, &table.name),
            Self::RenameTable { to, .. } => Scope::table(None, to),
            Self::AddColumn { column } | Self::DropColumn { column } => {
                Scope::table(None, &column.table)
            }
            Self::AlterColumn { to, .. } | Self::RecreateColumn { to, .. } => {
                Scope::table(None, &to.table)
            }
            Self::RenameColumn { table, .. } | Self::RenameIndex { table, .. } => {
                Scope::table(None, table)
            }
            Self::CreateIndex { index } | Self::DropIndex { index } => {
                Scope::table(None, &index.table)
            }
            Self::CreatePk { pk } | Self::DropPk { pk } => Scope::table(None, &pk.table),
            Self::AddCheck { check } | Self::DropCheck { check } => {
                Scope::table(None, &check.table)
            }
            Self::CreateFk { fk } | Self::DropFk { fk } => Scope::table(None, &fk.table),
            Self::CreateView { .. }
            | Self::DropView { .. }
            | Self::RenameView { .. }
            | Self::AlterView { .. } => Scope::schema(None),
        }
    }

    fn diff_type(&self) -> DiffType {
        match self {
            Self::CreateTable { .. }
            | Self::AddColumn { .. }
            | Self::CreateIndex { .. }
            | Self::CreatePk { .. }
            | Self::AddCheck { .. }
            | Self::CreateFk { .. }
            | Self::CreateView { .. } => DiffType::Create,

            Self::DropTable { .. }
            | Self::DropColumn { .. }
            | Self::DropIndex { .. }
            | Self::DropPk { .. }
            | Self::DropCheck { .. }
            | Self::DropFk { .. }
            | Self::DropView { .. } => DiffType::Drop,

            Self::RenameTable { .. }
            | Self::RenameColumn { .. }
            | Self::AlterColumn { .. }
            | Self::RecreateColumn { .. }
            | Self::RenameIndex { .. }
            | Self::RenameView { .. }
            | Self::AlterView { .. } => DiffType::Alter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::group_diffs;

    #[test]
    fn test_tag_and_grouping() {
        let statements = vec![
            JsonStatement::RenameTable {
                from: "users".into(),
                to: "accounts".into(),
            },
            JsonStatement::RenameColumn {
                table: "accounts".into(),
                from: "name".into(),
                to: "full_name".into(),
            },
            JsonStatement::DropView {
                view: View {
                    name: "v".into(),
                    definition: "select 1".into(),
                    algorithm: None,
                    sql_security: None,
                    with_check_option: None,
                    is_existing: false,
                },
            },
        ];
        assert_eq!(serde_json::to_value(&statements[0]).unwrap()["type"], "rename_table");

        let rows = group_diffs(&statements);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].table.as_deref(), Some("accounts"));
        assert_eq!(rows[0].updated.len(), 2);
        assert!(rows[1].schema.is_none() && rows[1].table.is_none());
        assert_eq!(rows[1].deleted.len(), 1);
    }
}
