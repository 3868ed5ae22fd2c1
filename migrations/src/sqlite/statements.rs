//! SQLite statement IR
//!
//! SQLite cannot alter a column or a constraint in place, so anything beyond
//! add/drop/rename becomes a [`JsonStatement::RecreateTable`]. Views and
//! indexes have no rename either and are dropped and created again.

use super::collection::TableFull;
use super::ddl::{Column, ForeignKey, Index, Table, View};
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
    /// Copy rows into a new table with the target shape, then swap names
    RecreateTable {
        from: Box<TableFull>,
        to: Box<TableFull>,
    },

    /// A single-column foreign key travels with its column
    AddColumn {
        column: Column,
        #[serde(skip_serializing_if = "Option::is_none")]
        fk: Option<ForeignKey>,
    },
    DropColumn {
        column: Column,
    },
    RenameColumn {
        table: String,
        from: String,
        to: String,
    },
    /// Virtual generated expression changed
    RecreateColumn {
        column: Column,
        #[serde(skip_serializing_if = "Option::is_none")]
        fk: Option<ForeignKey>,
    },

    CreateIndex {
        index: Index,
    },
    DropIndex {
        index: Index,
    },

    CreateView {
        view: View,
    },
    DropView {
        view: View,
    },
}

impl JsonStatement {
    /// Columns present before a recreate and missing after it
    pub fn dropped_columns(&self) -> Vec<&Column> {
        match self {
            Self::RecreateTable { from, to } => from
                .columns
                .iter()
                .filter(|c| to.column(&c.name).is_none())
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl Statement for JsonStatement {
    fn type_name(&self) -> &'static str {
        match self {
            Self::CreateTable { .. } => "create_table",
            Self::DropTable { .. } => "drop_table",
            Self::RenameTable { .. } => "rename_table",
            Self::RecreateTable { .. } => "recreate_table",
            Self::AddColumn { .. } => "add_column",
            Self::DropColumn { .. } => "drop_column",
            Self::RenameColumn { .. } => "rename_column",
            Self::RecreateColumn { .. } => "recreate_column",
            Self::CreateIndex { .. } => "create_index",
            Self::DropIndex { .. } => "drop_index",
            Self::CreateView { .. } => "create_view",
            Self::DropView { .. } => "drop_view",
        }
    }

    fn scope(&self) -> Scope {
        match self {
            Self::CreateTable { table } => Scope::table(None, &table.name),
            Self::DropTable { table } => Scope::table(None, &table.name),
            Self::RenameTable { to, .. } => Scope::table(None, to),
            Self::RecreateTable { to, .. } => Scope::table(None, &to.name),
            Self::AddColumn { column, .. }
            | Self::DropColumn { column }
            | Self::RecreateColumn { column, .. } => Scope::table(None, &column.table),
            Self::RenameColumn { table, .. } => Scope::table(None, table),
            Self::CreateIndex { index } | Self::DropIndex { index } => {
                Scope::table(None, &index.table)
            }
            Self::CreateView { .. } | Self::DropView { .. } => Scope::schema(None),
        }
    }

    fn diff_type(&self) -> DiffType {
        match self {
            Self::CreateTable { .. }
            | Self::AddColumn { .. }
            | Self::CreateIndex { .. }
            | Self::CreateView { .. } => DiffType::Create,

            Self::DropTable { .. }
            | Self::DropColumn { .. }
            | Self::DropIndex { .. }
            | Self::DropView { .. } => DiffType::Drop,

            Self::RenameTable { .. }
            | Self::RecreateTable { .. }
            | Self::RenameColumn { .. }
            | Self::RecreateColumn { .. } => DiffType::Alter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::group_diffs;

    fn column(name: &str) -> Column {
        Column {
            table: "users".into(),
            name: name.into(),
            sql_type: "integer".into(),
            not_null: false,
            autoincrement: false,
            default: None,
            generated: None,
        }
    }

    fn users(columns: &[&str]) -> TableFull {
        TableFull {
            name: "users".into(),
            columns: columns.iter().map(|c| column(c)).collect(),
            pk: None,
            fks: Vec::new(),
            uniques: Vec::new(),
            checks: Vec::new(),
            strict: false,
            without_rowid: false,
        }
    }

    #[test]
    fn test_add_column_omits_missing_fk() {
        let stmt = JsonStatement::AddColumn {
            column: column("age"),
            fk: None,
        };
        let json = serde_json::to_value(&stmt).unwrap();
        assert_eq!(json["type"], "add_column");
        assert!(json.get("fk").is_none());
    }

    #[test]
    fn test_recreate_reports_dropped_columns() {
        let stmt = JsonStatement::RecreateTable {
            from: Box::new(users(&["id", "name", "age"])),
            to: Box::new(users(&["id", "name"])),
        };
        let dropped: Vec<&str> = stmt.dropped_columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(dropped, ["age"]);

        let statements = [stmt];
        let rows = group_diffs(&statements);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].table.as_deref(), Some("users"));
        assert_eq!(rows[0].updated.len(), 1);
    }
}
