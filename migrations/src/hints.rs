//! Destructive-operation hints
//!
//! Dialect `suggestions` functions probe the live database through [`Db`]
//! and collect warnings plus corrective statements that must run before the
//! main statement list.

use crate::drift_trace_probe_failed;
use crate::error::QueryError;
use std::collections::HashMap;
use std::future::Future;

/// One result row, column name to value
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Minimal async database access for hint probes
pub trait Db {
    fn query(&self, sql: &str) -> impl Future<Output = Result<Vec<Row>, QueryError>>;
}

impl<D: Db> Db for &D {
    fn query(&self, sql: &str) -> impl Future<Output = Result<Vec<Row>, QueryError>> {
        (**self).query(sql)
    }
}

/// Finding for a single statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hint {
    /// Index of the statement in the diff output
    pub index: usize,
    /// Warning shown to the user; its presence asks for confirmation
    pub hint: Option<String>,
    /// Corrective SQL to run before the main statements
    pub statement: Option<String>,
}

/// A probe that failed; the pass carried on without it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeFailure {
    pub index: usize,
    pub error: QueryError,
}

/// Everything `suggestions` found
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HintsReport {
    pub hints: Vec<Hint>,
    pub errors: Vec<ProbeFailure>,
}

impl HintsReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, index: usize, hint: impl Into<String>) {
        self.hints.push(Hint {
            index,
            hint: Some(hint.into()),
            statement: None,
        });
    }

    /// Warning plus a corrective statement
    pub fn fix(&mut self, index: usize, hint: Option<String>, statement: impl Into<String>) {
        self.hints.push(Hint {
            index,
            hint,
            statement: Some(statement.into()),
        });
    }

    pub fn failed(&mut self, index: usize, error: QueryError) {
        drift_trace_probe_failed!(index, &error);
        self.errors.push(ProbeFailure { index, error });
    }

    /// Warning texts, in statement order
    pub fn messages(&self) -> Vec<&str> {
        self.hints.iter().filter_map(|h| h.hint.as_deref()).collect()
    }

    /// Corrective statements, in statement order
    pub fn corrections(&self) -> Vec<&str> {
        self.hints
            .iter()
            .filter_map(|h| h.statement.as_deref())
            .collect()
    }

    /// Any hint that would lose data or needs a look
    pub fn is_lossy(&self) -> bool {
        self.hints.iter().any(|h| h.hint.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.hints.is_empty() && self.errors.is_empty()
    }
}

/// Run a probe and report whether it returned at least one row
pub async fn probe_non_empty<D: Db>(
    db: &D,
    sql: &str,
    index: usize,
    report: &mut HintsReport,
) -> bool {
    match db.query(sql).await {
        Ok(rows) => !rows.is_empty(),
        Err(err) => {
            report.failed(index, err);
            false
        }
    }
}

/// Run a count probe and read the first column of the first row
pub async fn probe_count<D: Db>(
    db: &D,
    sql: &str,
    index: usize,
    report: &mut HintsReport,
) -> u64 {
    match db.query(sql).await {
        Ok(rows) => rows
            .first()
            .and_then(|row| row.values().next())
            .and_then(value_as_u64)
            .unwrap_or(0),
        Err(err) => {
            report.failed(index, err);
            0
        }
    }
}

/// Read a string column from the first row
pub async fn probe_string<D: Db>(
    db: &D,
    sql: &str,
    column: &str,
    index: usize,
    report: &mut HintsReport,
) -> Option<String> {
    match db.query(sql).await {
        Ok(rows) => rows
            .first()
            .and_then(|row| row.get(column))
            .and_then(|v| v.as_str())
            .map(str::to_string),
        Err(err) => {
            report.failed(index, err);
            None
        }
    }
}

fn value_as_u64(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        // drivers that return bigint counts as text
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Names the live database still uses while the statement list is read.
///
/// Hint queries run before any statement does, so a table renamed earlier in
/// the list is still queried under its old name. Dialects without schemas
/// pass `""` as the schema.
#[derive(Debug, Clone, Default)]
pub struct LiveNames {
    schemas: HashMap<String, String>,
    tables: HashMap<(String, String), (String, String)>,
}

impl LiveNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rename_schema(&mut self, from: &str, to: &str) {
        let live = self.schema(from);
        self.schemas.insert(to.to_string(), live);
    }

    pub fn rename_table(&mut self, from: (&str, &str), to: (&str, &str)) {
        let live = self.table(from.0, from.1);
        self.tables
            .insert((to.0.to_string(), to.1.to_string()), live);
    }

    pub fn schema(&self, name: &str) -> String {
        self.schemas
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// `(schema, table)` as the live database knows it
    pub fn table(&self, schema: &str, name: &str) -> (String, String) {
        match self.tables.get(&(schema.to_string(), name.to_string())) {
            Some(live) => live.clone(),
            None => (self.schema(schema), name.to_string()),
        }
    }
}

/// What a push will actually run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushPlan {
    /// Corrective statements first, then the rendered diff
    pub sql_statements: Vec<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<ProbeFailure>,
}

impl PushPlan {
    pub fn new(report: HintsReport, sql: Vec<String>) -> Self {
        let mut sql_statements: Vec<String> = report
            .corrections()
            .into_iter()
            .map(str::to_string)
            .collect();
        sql_statements.extend(sql);
        let warnings = report.messages().into_iter().map(str::to_string).collect();
        Self {
            sql_statements,
            warnings,
            errors: report.errors,
        }
    }

    /// A lossy push asks first, unless forced
    pub fn needs_confirmation(&self, force: bool) -> bool {
        !force && !self.warnings.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.sql_statements.is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FakeDb, row};
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_probes() {
        let db = FakeDb::default()
            .with("select 1", vec![row(&[("?column?", json!(1))])])
            .with("select count(*)", vec![row(&[("count", json!("3"))])])
            .failing("broken");
        let mut report = HintsReport::new();

        assert!(probe_non_empty(&db, "select 1", 0, &mut report).await);
        assert!(!probe_non_empty(&db, "select 2", 1, &mut report).await);
        assert_eq!(probe_count(&db, "select count(*)", 2, &mut report).await, 3);
        assert!(!probe_non_empty(&db, "broken", 3, &mut report).await);

        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].index, 3);
        assert!(report.hints.is_empty());
    }

    #[test]
    fn test_push_plan_runs_corrections_first() {
        let mut report = HintsReport::new();
        report.warn(1, "· You're about to delete non-empty users table");
        report.fix(0, None, "ALTER TABLE \"users\" DROP CONSTRAINT \"users_pkey\";");

        let plan = PushPlan::new(report, vec!["DROP TABLE \"users\";".into()]);
        assert_eq!(plan.sql_statements.len(), 2);
        assert!(plan.sql_statements[0].contains("DROP CONSTRAINT"));
        assert!(plan.needs_confirmation(false));
        assert!(!plan.needs_confirmation(true));
    }

    #[test]
    fn test_live_names_follow_chained_renames() {
        let mut live = LiveNames::new();
        live.rename_schema("app", "core");
        live.rename_table(("core", "users"), ("auth", "users"));
        live.rename_table(("auth", "users"), ("auth", "people"));

        assert_eq!(live.table("auth", "people"), ("app".to_string(), "users".to_string()));
        assert_eq!(live.table("core", "posts"), ("app".to_string(), "posts".to_string()));
        assert_eq!(live.table("", "untouched"), (String::new(), "untouched".to_string()));
    }

    #[test]
    fn test_correction_alone_does_not_ask() {
        let mut report = HintsReport::new();
        report.fix(0, None, "ALTER TABLE t DROP CONSTRAINT c;");
        assert!(!report.is_lossy());
        let plan = PushPlan::new(report, Vec::new());
        assert!(!plan.needs_confirmation(false));
        assert!(!plan.is_empty());
    }
}
