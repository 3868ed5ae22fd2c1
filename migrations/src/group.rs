//! Statement grouping for change summaries
//!
//! `group_diffs` is a pure projection: it never reorders statements inside
//! a bucket and never drops one.

use crate::traits::DiffType;

/// Where a statement applies
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Scope {
    pub schema: Option<String>,
    /// `None` for statements that are not about a table
    pub table: Option<String>,
}

impl Scope {
    pub fn table(schema: Option<&str>, table: &str) -> Self {
        Self {
            schema: schema.map(str::to_string),
            table: Some(table.to_string()),
        }
    }

    pub fn schema(schema: Option<&str>) -> Self {
        Self {
            schema: schema.map(str::to_string),
            table: None,
        }
    }
}

/// Common view over every dialect's statement enum
pub trait Statement {
    /// The serialized `type` tag, e.g. `create_table`
    fn type_name(&self) -> &'static str;

    fn scope(&self) -> Scope;

    /// Whether the statement creates, drops or changes something
    fn diff_type(&self) -> DiffType;
}

/// Statements for one `{schema, table}` scope
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedRow<'a, S> {
    pub schema: Option<String>,
    pub table: Option<String>,
    pub inserted: Vec<&'a S>,
    pub deleted: Vec<&'a S>,
    pub updated: Vec<&'a S>,
}

impl<S> GroupedRow<'_, S> {
    pub fn len(&self) -> usize {
        self.inserted.len() + self.deleted.len() + self.updated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Partition statements by scope, groups in order of first appearance
pub fn group_diffs<S: Statement>(statements: &[S]) -> Vec<GroupedRow<'_, S>> {
    let mut rows: Vec<GroupedRow<'_, S>> = Vec::new();
    for statement in statements {
        let scope = statement.scope();
        let pos = match rows
            .iter()
            .position(|r| r.schema == scope.schema && r.table == scope.table)
        {
            Some(pos) => pos,
            None => {
                rows.push(GroupedRow {
                    schema: scope.schema,
                    table: scope.table,
                    inserted: Vec::new(),
                    deleted: Vec::new(),
                    updated: Vec::new(),
                });
                rows.len() - 1
            }
        };
        let row = &mut rows[pos];
        match statement.diff_type() {
            DiffType::Create => row.inserted.push(statement),
            DiffType::Drop => row.deleted.push(statement),
            DiffType::Alter => row.updated.push(statement),
        }
    }
    rows
}
