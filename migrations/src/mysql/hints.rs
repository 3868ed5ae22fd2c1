//! Data-loss hints for MySQL statements

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
                    report.warn(
                        index,
                        format!(
                            "· You're about to delete non-empty {} column in {} table",
                            quote_ident(&column.name),
                            quote_ident(&column.table)
                        ),
                    );
                }
            }
            JsonStatement::DropPk { pk } => {
                if probe_non_empty(db, &any_row(&live, &pk.table), index, &mut report).await {
                    report.warn(
                        index,
                        format!(
                            "· You're about to drop {} primary key, this statement may fail and your table may lose primary key",
                            quote_ident(&pk.table)
                        ),
                    );
                }
            }
            JsonStatement::AddColumn { column }
                if column.not_null
                    && column.default.is_none()
                    && column.generated.is_none()
                    && !column.auto_increment =>
            {
                if probe_non_empty(db, &any_row(&live, &column.table), index, &mut report).await {
                    report.warn(
                        index,
                        format!(
                            "· You're about to add not-null {} column without default value to a non-empty {} table",
                            quote_ident(&column.name),
                            quote_ident(&column.table)
                        ),
                    );
                }
            }
            JsonStatement::CreateIndex { index: idx } if idx.is_unique => {
                if probe_non_empty(db, &any_row(&live, &idx.table), index, &mut report).await {
                    report.warn(
                        index,
                        format!(
                            "· You're about to add {} unique index to a non-empty {} table which may fail",
                            quote_ident(&idx.name),
                            quote_ident(&idx.table)
                        ),
                    );
                }
            }
            _ => {}
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hints::testing::{FakeDb, row};
    use crate::mysql::ddl::{Column, Index, IndexColumn, Table};
    use serde_json::json;

    const PROBE: &str = "select 1 from `users` limit 1";

    fn non_empty() -> FakeDb {
        FakeDb::default().with(PROBE, vec![row(&[("1", json!(1))])])
    }

    fn email(not_null: bool) -> Column {
        Column {
            table: "users".into(),
            name: "email".into(),
            sql_type: "varchar(255)".into(),
            not_null,
            auto_increment: false,
            default: None,
            on_update_now: false,
            charset: None,
            collation: None,
            generated: None,
        }
    }

    #[tokio::test]
    async fn test_drop_non_empty_table() {
        let table = Table { name: "users".into() };
        let report = suggestions(&non_empty(), &[JsonStatement::DropTable { table }]).await;
        assert_eq!(report.messages(), ["· You're about to delete non-empty `users` table"]);

        let table = Table { name: "users".into() };
        let report = suggestions(&FakeDb::default(), &[JsonStatement::DropTable { table }]).await;
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn test_add_column_hint_only_for_not_null_without_default() {
        let report = suggestions(
            &non_empty(),
            &[
                JsonStatement::AddColumn { column: email(false) },
                JsonStatement::AddColumn { column: email(true) },
            ],
        )
        .await;
        assert_eq!(report.hints.len(), 1);
        assert_eq!(report.hints[0].index, 1);
    }

    #[tokio::test]
    async fn test_unique_index_on_non_empty_table() {
        let index = |is_unique| Index {
            table: "users".into(),
            name: "users_email_unique".into(),
            name_explicit: false,
            columns: vec![IndexColumn::column("email")],
            is_unique,
            using: None,
            algorithm: None,
            lock: None,
        };
        let report = suggestions(
            &non_empty(),
            &[
                JsonStatement::CreateIndex { index: index(false) },
                JsonStatement::CreateIndex { index: index(true) },
            ],
        )
        .await;
        assert_eq!(report.hints.len(), 1);
        assert!(report.messages()[0].contains("`users_email_unique` unique index"));
    }

    #[tokio::test]
    async fn test_renamed_table_is_checked_under_its_old_name() {
        let mut bio = email(false);
        bio.table = "people".into();
        let report = suggestions(
            &non_empty(),
            &[
                JsonStatement::RenameTable {
                    from: "users".into(),
                    to: "people".into(),
                },
                JsonStatement::DropColumn { column: bio },
            ],
        )
        .await;
        assert!(report.errors.is_empty());
        assert_eq!(
            report.messages(),
            ["· You're about to delete non-empty `email` column in `people` table"]
        );
        assert_eq!(report.hints[0].index, 1);
    }

    #[tokio::test]
    async fn test_failed_probe_is_recorded() {
        let db = FakeDb::default().failing(PROBE);
        let report = suggestions(&db, &[JsonStatement::DropColumn { column: email(true) }]).await;
        assert!(report.hints.is_empty());
        assert_eq!(report.errors.len(), 1);
    }
}
