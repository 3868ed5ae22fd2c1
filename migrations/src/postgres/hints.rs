//! Data-loss hints for PostgreSQL statements

use super::statements::JsonStatement;
use crate::hints::{Db, HintsReport, LiveNames, probe_count, probe_non_empty, probe_string};

/// `"schema"."name"`
pub(crate) fn qualified(schema: &str, name: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(name))
}

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn any_row(schema: &str, table: &str) -> String {
    format!("select 1 from {} limit 1", qualified(schema, table))
}

/// Probe the database for every statement that could lose data or fail on
/// existing rows. Probes run one at a time in statement order, against the
/// names the database has before any statement runs.
pub async fn suggestions<D: Db>(db: &D, statements: &[JsonStatement]) -> HintsReport {
    let mut report = HintsReport::new();
    let mut live = LiveNames::new();

    for (index, statement) in statements.iter().enumerate() {
        match statement {
            JsonStatement::RenameSchema { from, to } => live.rename_schema(from, to),
            JsonStatement::MoveTable { name, from, to } => {
                live.rename_table(
                    (from.as_str(), name.as_str()),
                    (to.as_str(), name.as_str()),
                );
            }
            JsonStatement::RenameTable { schema, from, to } => {
                live.rename_table(
                    (schema.as_str(), from.as_str()),
                    (schema.as_str(), to.as_str()),
                );
            }
            JsonStatement::DropTable { table } => {
                let (schema, name) = live.table(&table.schema, &table.name);
                if probe_non_empty(db, &any_row(&schema, &name), index, &mut report).await {
                    let id = qualified(&table.schema, &table.name);
                    report.warn(index, format!("· You're about to delete non-empty {id} table"));
                }
            }
            JsonStatement::DropView { view } if view.materialized => {
                let schema = live.schema(&view.schema);
                if probe_non_empty(db, &any_row(&schema, &view.name), index, &mut report).await {
                    let id = qualified(&view.schema, &view.name);
                    report.warn(
                        index,
                        format!("· You're about to delete non-empty {id} materialized view"),
                    );
                }
            }
            JsonStatement::DropColumn { column } => {
                let (schema, name) = live.table(&column.schema, &column.table);
                if probe_non_empty(db, &any_row(&schema, &name), index, &mut report).await {
                    report.warn(
                        index,
                        format!(
                            "· You're about to delete non-empty {} column in {} table",
                            quote_ident(&column.name),
                            qualified(&column.schema, &column.table)
                        ),
                    );
                }
            }
            JsonStatement::DropSchema { name } => {
                let sql = format!(
                    "select count(*) as count from information_schema.tables where table_schema = {}",
                    quote_literal(&live.schema(name))
                );
                let count = probe_count(db, &sql, index, &mut report).await;
                if count > 0 {
                    report.warn(
                        index,
                        format!(
                            "· You're about to delete {} schema with {count} tables",
                            quote_ident(name)
                        ),
                    );
                }
            }
            JsonStatement::DropPk { pk } => {
                let (schema, table) = live.table(&pk.schema, &pk.table);
                if !probe_non_empty(db, &any_row(&schema, &table), index, &mut report).await {
                    continue;
                }
                let hint = format!(
                    "· You're about to drop {} primary key, this statement may fail and your table may lose primary key",
                    qualified(&pk.schema, &pk.table)
                );
                if pk.name_explicit {
                    report.warn(index, hint);
                    continue;
                }
                // the database may have named it differently
                let sql = format!(
                    "select constraint_name from information_schema.table_constraints \
                     where table_schema = {} and table_name = {} and constraint_type = 'PRIMARY KEY'",
                    quote_literal(&schema),
                    quote_literal(&table)
                );
                // corrections run before every other statement, so they use live names
                match probe_string(db, &sql, "constraint_name", index, &mut report).await {
                    Some(name) if name != pk.name => report.fix(
                        index,
                        Some(hint),
                        format!(
                            "ALTER TABLE {} DROP CONSTRAINT {};",
                            qualified(&schema, &table),
                            quote_ident(&name)
                        ),
                    ),
                    _ => report.warn(index, hint),
                }
            }
            JsonStatement::AddColumn { column }
                if column.not_null
                    && column.default.is_none()
                    && column.generated.is_none()
                    && column.identity.is_none() =>
            {
                let (schema, name) = live.table(&column.schema, &column.table);
                if probe_non_empty(db, &any_row(&schema, &name), index, &mut report).await {
                    report.warn(
                        index,
                        format!(
                            "· You're about to add not-null {} column without default value to a non-empty {} table",
                            quote_ident(&column.name),
                            qualified(&column.schema, &column.table)
                        ),
                    );
                }
            }
            JsonStatement::AddUnique { unique } => {
                let (schema, name) = live.table(&unique.schema, &unique.table);
                if probe_non_empty(db, &any_row(&schema, &name), index, &mut report).await {
                    report.warn(
                        index,
                        format!(
                            "· You're about to add {} unique constraint to a non-empty {} table which may fail",
                            quote_ident(&unique.name),
                            qualified(&unique.schema, &unique.table)
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
    use crate::postgres::ddl::{Column, PrimaryKey, Table};
    use serde_json::json;

    fn users() -> Table {
        Table {
            schema: "public".into(),
            name: "users".into(),
            is_rls_enabled: false,
        }
    }

    const PROBE: &str = r#"select 1 from "public"."users" limit 1"#;

    #[tokio::test]
    async fn test_drop_non_empty_table() {
        let db = FakeDb::default().with(PROBE, vec![row(&[("?column?", json!(1))])]);
        let report = suggestions(&db, &[JsonStatement::DropTable { table: users() }]).await;
        assert_eq!(report.hints.len(), 1);
        let message = report.messages()[0];
        assert!(message.contains("non-empty"));
        assert!(message.contains(r#""public"."users""#));
        assert!(report.is_lossy());
    }

    #[tokio::test]
    async fn test_drop_empty_table_is_quiet() {
        let db = FakeDb::default();
        let report = suggestions(&db, &[JsonStatement::DropTable { table: users() }]).await;
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn test_failed_probe_is_recorded_and_pass_continues() {
        let db = FakeDb::default()
            .failing(PROBE)
            .with(
                r#"select 1 from "public"."posts" limit 1"#,
                vec![row(&[("?column?", json!(1))])],
            );
        let posts = Table {
            name: "posts".into(),
            ..users()
        };
        let report = suggestions(
            &db,
            &[
                JsonStatement::DropTable { table: users() },
                JsonStatement::DropTable { table: posts },
            ],
        )
        .await;
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].index, 0);
        assert_eq!(report.hints.len(), 1);
        assert_eq!(report.hints[0].index, 1);
    }

    #[tokio::test]
    async fn test_unnamed_pk_gets_corrective_statement() {
        let lookup = "select constraint_name from information_schema.table_constraints \
                      where table_schema = 'public' and table_name = 'users' and constraint_type = 'PRIMARY KEY'";
        let db = FakeDb::default()
            .with(PROBE, vec![row(&[("?column?", json!(1))])])
            .with(lookup, vec![row(&[("constraint_name", json!("users_pk_legacy"))])]);
        let pk = PrimaryKey {
            schema: "public".into(),
            table: "users".into(),
            name: "users_pkey".into(),
            name_explicit: false,
            columns: vec!["id".into()],
        };
        let report = suggestions(&db, &[JsonStatement::DropPk { pk }]).await;
        assert_eq!(
            report.corrections(),
            [r#"ALTER TABLE "public"."users" DROP CONSTRAINT "users_pk_legacy";"#]
        );
    }

    #[tokio::test]
    async fn test_not_null_column_without_default() {
        let db = FakeDb::default().with(PROBE, vec![row(&[("?column?", json!(1))])]);
        let column = Column {
            schema: "public".into(),
            table: "users".into(),
            name: "email".into(),
            sql_type: "text".into(),
            type_schema: None,
            not_null: true,
            default: None,
            generated: None,
            identity: None,
            dimensions: 0,
        };
        let with_default = Column {
            default: Some("''".into()),
            ..column.clone()
        };
        let report = suggestions(
            &db,
            &[
                JsonStatement::AddColumn { column },
                JsonStatement::AddColumn {
                    column: with_default,
                },
            ],
        )
        .await;
        assert_eq!(report.hints.len(), 1);
        assert!(report.messages()[0].contains("not-null"));
    }

    #[tokio::test]
    async fn test_drop_schema_counts_tables() {
        let db = FakeDb::default().with(
            "select count(*) as count from information_schema.tables where table_schema = 'auth'",
            vec![row(&[("count", json!("3"))])],
        );
        let report = suggestions(&db, &[JsonStatement::DropSchema { name: "auth".into() }]).await;
        assert!(report.messages()[0].contains("3 tables"));
    }

    #[tokio::test]
    async fn test_renamed_table_is_checked_under_its_old_name() {
        let db = FakeDb::default().with(PROBE, vec![row(&[("?column?", json!(1))])]);
        let column = Column {
            schema: "public".into(),
            table: "people".into(),
            name: "bio".into(),
            sql_type: "text".into(),
            type_schema: None,
            not_null: false,
            default: None,
            generated: None,
            identity: None,
            dimensions: 0,
        };
        let report = suggestions(
            &db,
            &[
                JsonStatement::RenameTable {
                    schema: "public".into(),
                    from: "users".into(),
                    to: "people".into(),
                },
                JsonStatement::DropColumn { column },
            ],
        )
        .await;
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        assert_eq!(
            report.messages(),
            [r#"· You're about to delete non-empty "bio" column in "public"."people" table"#]
        );
        assert_eq!(report.hints[0].index, 1);
    }
}
