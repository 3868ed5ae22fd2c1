//! Data-loss hints for SQLite statements

use super::collection::TableFull;
use super::ddl::Column;
use super::statements::JsonStatement;
use crate::hints::{Db, HintsReport, LiveNames, probe_non_empty};

pub(crate) fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Query the table under the name it has before the migration runs
fn any_row(live: &LiveNames, table: &str) -> String {
    let (_, table) = live.table("", table);
    format!("select 1 from {} limit 1", quote_ident(&table))
}

fn needs_value(column: &Column) -> bool {
    column.not_null && column.default.is_none() && column.generated.is_none() && !column.autoincrement
}

/// Probe the database for every statement that could lose data or fail on
/// existing rows. Probes run one at a time in statement order.
pub async fn suggestions<D: Db>(db: &D, statements: &[JsonStatement]) -> HintsReport {
    let mut report = HintsReport::new();
    let mut live = LiveNames::new();

    for (index, statement) in statements.iter().enumerate() {
        match statement {
            JsonStatement::RenameTable { from, to } => {
                live.rename_table(("", from.as_str()), ("", to.as_str()));
            }
            JsonStatement::DropTable { table } => {
                if probe_non_empty(db, &any_row(&live, &table.name), index, &mut report).await {
                    report.warn(
                        index,
                        format!(
                            "· You're about to delete non-empty {} table",
                            quote_ident(&table.name)
                        ),
                    );
                }
            }
            JsonStatement::DropColumn { column } => {
                if probe_non_empty(db, &any_row(&live, &column.table), index, &mut report).await {
                    report.warn(index, drop_column_hint(column));
                }
            }
            JsonStatement::AddColumn { column, .. } if needs_value(column) => {
                if probe_non_empty(db, &any_row(&live, &column.table), index, &mut report).await {
                    report.warn(index, not_null_hint(column));
                }
            }
            JsonStatement::RecreateTable { from, to } => {
                let dropped = statement.dropped_columns();
                let added_not_null: Vec<&Column> = to
                    .columns
                    .iter()
                    .filter(|c| from.column(&c.name).is_none() && needs_value(c))
                    .collect();
                let new_uniques = added_uniques(from, to);
                if dropped.is_empty() && added_not_null.is_empty() && new_uniques.is_empty() {
                    continue;
                }
                // one probe covers every finding on the table
                if !probe_non_empty(db, &any_row(&live, &from.name), index, &mut report).await {
                    continue;
                }
                for column in dropped {
                    report.warn(index, drop_column_hint(column));
                }
                for column in added_not_null {
                    report.warn(index, not_null_hint(column));
                }
                for name in new_uniques {
                    report.warn(
                        index,
                        format!(
                            "· You're about to add {} unique constraint to a non-empty {} table which may fail",
                            quote_ident(name),
                            quote_ident(&to.name)
                        ),
                    );
                }
            }
            _ => {}
        }
    }

    report
}

fn added_uniques<'a>(from: &TableFull, to: &'a TableFull) -> Vec<&'a str> {
    to.uniques
        .iter()
        .filter(|u| !from.uniques.iter().any(|f| f.columns == u.columns))
        .map(|u| u.name.as_str())
        .collect()
}

fn drop_column_hint(column: &Column) -> String {
    format!(
        "· You're about to delete non-empty {} column in {} table",
        quote_ident(&column.name),
        quote_ident(&column.table)
    )
}

fn not_null_hint(column: &Column) -> String {
    format!(
        "· You're about to add not-null {} column without default value to a non-empty {} table",
        quote_ident(&column.name),
        quote_ident(&column.table)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hints::testing::{FakeDb, row};
    use crate::sqlite::ddl::{Table, UniqueConstraint};
    use serde_json::json;

    const PROBE: &str = "select 1 from `users` limit 1";

    fn non_empty() -> FakeDb {
        FakeDb::default().with(PROBE, vec![row(&[("1", json!(1))])])
    }

    fn column(name: &str, not_null: bool) -> Column {
        Column {
            table: "users".into(),
            name: name.into(),
            sql_type: "text".into(),
            not_null,
            autoincrement: false,
            default: None,
            generated: None,
        }
    }

    fn users(columns: Vec<Column>, uniques: Vec<UniqueConstraint>) -> Box<TableFull> {
        Box::new(TableFull {
            name: "users".into(),
            columns,
            pk: None,
            fks: Vec::new(),
            uniques,
            checks: Vec::new(),
            strict: false,
            without_rowid: false,
        })
    }

    #[tokio::test]
    async fn test_drop_non_empty_table() {
        let drop = || JsonStatement::DropTable {
            table: Table {
                name: "users".into(),
                strict: false,
                without_rowid: false,
            },
        };
        let report = suggestions(&non_empty(), &[drop()]).await;
        assert_eq!(report.messages(), ["· You're about to delete non-empty `users` table"]);
        assert!(suggestions(&FakeDb::default(), &[drop()]).await.is_empty());
    }

    #[tokio::test]
    async fn test_renamed_table_is_checked_under_its_old_name() {
        let mut from = users(vec![column("email", false), column("age", false)], Vec::new());
        let mut to = users(vec![column("email", false)], Vec::new());
        for table in [&mut from, &mut to] {
            table.name = "people".into();
            for c in table.columns.iter_mut() {
                c.table = "people".into();
            }
        }
        let statements = [
            JsonStatement::RenameTable {
                from: "users".into(),
                to: "people".into(),
            },
            JsonStatement::RecreateTable { from, to },
        ];

        let report = suggestions(&non_empty(), &statements).await;
        assert!(report.errors.is_empty());
        assert_eq!(
            report.messages(),
            ["· You're about to delete non-empty `age` column in `people` table"]
        );
        assert_eq!(report.hints[0].index, 1);

        // without the rename the new name has no rows to lose
        let report = suggestions(&non_empty(), &statements[1..]).await;
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn test_recreate_with_dropped_column_and_unique() {
        let unique = UniqueConstraint {
            table: "users".into(),
            name: "users_email_unique".into(),
            name_explicit: false,
            columns: vec!["email".into()],
        };
        let stmt = JsonStatement::RecreateTable {
            from: users(vec![column("email", false), column("age", false)], Vec::new()),
            to: users(vec![column("email", false)], vec![unique]),
        };
        let report = suggestions(&non_empty(), &[stmt]).await;
        assert_eq!(
            report.messages(),
            [
                "· You're about to delete non-empty `age` column in `users` table",
                "· You're about to add `users_email_unique` unique constraint to a non-empty `users` table which may fail",
            ]
        );
    }

    #[tokio::test]
    async fn test_recreate_without_loss_skips_probe() {
        let db = FakeDb::default().failing(PROBE);
        let stmt = JsonStatement::RecreateTable {
            from: users(vec![column("email", false)], Vec::new()),
            to: users(vec![column("email", true)], Vec::new()),
        };
        assert!(suggestions(&db, &[stmt]).await.is_empty());
    }

    #[tokio::test]
    async fn test_add_not_null_column() {
        let report = suggestions(
            &non_empty(),
            &[
                JsonStatement::AddColumn {
                    column: column("bio", false),
                    fk: None,
                },
                JsonStatement::AddColumn {
                    column: column("email", true),
                    fk: None,
                },
            ],
        )
        .await;
        assert_eq!(report.hints.len(), 1);
        assert_eq!(report.hints[0].index, 1);
    }
}
