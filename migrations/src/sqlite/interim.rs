//! Interim schema and its normalization into [`SqliteDdl`]

use super::collection::SqliteDdl;
use super::ddl::{
    CheckConstraint, Column, ForeignKey, Generated, Index, IndexColumn, IndexOrigin, PrimaryKey,
    Table, UniqueConstraint, View,
};
use super::grammar::{
    default_name_for_check, default_name_for_fk, default_name_for_index, default_name_for_pk,
    default_name_for_unique, normalize_action, normalize_type,
};
use crate::casing::Casing;
use crate::collection::Collection;
use crate::error::{DuplicateKeyError, SchemaError};
use crate::postgres::grammar::{parse_check_definition, parse_view_definition};
use crate::traits::{Entity, EntityKey, EntityKind, KeyFilter};

/// Column as read, with column-level key flags
#[derive(Debug, Clone, PartialEq)]
pub struct InterimColumn {
    pub table: String,
    pub name: String,
    pub sql_type: String,
    pub not_null: bool,
    pub autoincrement: bool,
    pub default: Option<String>,
    pub generated: Option<Generated>,
    pub is_pk: bool,
    pub is_unique: bool,
    pub unique_name: Option<String>,
}

impl InterimColumn {
    pub fn new(
        table: impl Into<String>,
        name: impl Into<String>,
        sql_type: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
            sql_type: sql_type.into(),
            not_null: false,
            autoincrement: false,
            default: None,
            generated: None,
            is_pk: false,
            is_unique: false,
            unique_name: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.is_pk = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    pub fn autoincrement(mut self) -> Self {
        self.autoincrement = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterimPrimaryKey {
    pub table: String,
    pub name: Option<String>,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterimUnique {
    pub table: String,
    pub name: Option<String>,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterimIndex {
    pub table: String,
    pub name: Option<String>,
    pub columns: Vec<IndexColumn>,
    pub is_unique: bool,
    pub where_clause: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterimForeignKey {
    pub table: String,
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub table_to: String,
    pub columns_to: Vec<String>,
    pub on_update: Option<String>,
    pub on_delete: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterimCheck {
    pub table: String,
    pub name: Option<String>,
    pub value: String,
}

/// Raw SQLite schema as produced by introspection or source extraction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterimSchema {
    pub tables: Vec<Table>,
    pub columns: Vec<InterimColumn>,
    pub pks: Vec<InterimPrimaryKey>,
    pub uniques: Vec<InterimUnique>,
    pub indexes: Vec<InterimIndex>,
    pub fks: Vec<InterimForeignKey>,
    pub checks: Vec<InterimCheck>,
    pub views: Vec<View>,
}

impl InterimSchema {
    pub fn apply_casing(&mut self, casing: Casing) {
        if casing == Casing::Preserve {
            return;
        }
        let recase = |names: &mut Vec<String>| {
            for name in names.iter_mut() {
                *name = casing.apply(name);
            }
        };
        for column in &mut self.columns {
            column.name = casing.apply(&column.name);
        }
        for pk in &mut self.pks {
            recase(&mut pk.columns);
        }
        for unique in &mut self.uniques {
            recase(&mut unique.columns);
        }
        for fk in &mut self.fks {
            recase(&mut fk.columns);
            recase(&mut fk.columns_to);
        }
        for index in &mut self.indexes {
            for column in index.columns.iter_mut().filter(|c| !c.is_expression) {
                column.value = casing.apply(&column.value);
            }
        }
    }
}

fn push_checked<E: Entity>(col: &mut Collection<E>, entity: E, errors: &mut Vec<SchemaError>) {
    if let Err(DuplicateKeyError { kind, key }) = col.push(entity) {
        errors.push(SchemaError::Duplicate {
            kind,
            name: key.to_string(),
        });
    }
}

/// Reports an unknown table; `true` when the table exists
fn known_table(
    ddl: &SqliteDdl,
    kind: EntityKind,
    name: &str,
    table: &str,
    errors: &mut Vec<SchemaError>,
) -> bool {
    let found = ddl.tables.contains(&EntityKey::simple(table));
    if !found {
        errors.push(SchemaError::UnknownTable {
            kind,
            name: name.to_string(),
            table: table.to_string(),
        });
    }
    found
}

/// Reports every column of `columns` missing from `table`
fn known_columns(
    ddl: &SqliteDdl,
    kind: EntityKind,
    name: &str,
    table: &str,
    columns: &[String],
    errors: &mut Vec<SchemaError>,
) -> bool {
    let mut ok = true;
    for column in columns {
        if !ddl.columns.contains(&EntityKey::composite2(table, column)) {
            errors.push(SchemaError::UnknownColumn {
                kind,
                name: name.to_string(),
                table: table.to_string(),
                column: column.clone(),
            });
            ok = false;
        }
    }
    ok
}

/// Normalize an interim schema into the canonical store
pub fn interim_to_ddl(interim: InterimSchema) -> (SqliteDdl, Vec<SchemaError>) {
    let mut ddl = SqliteDdl::new();
    let mut errors = Vec::new();

    for table in interim.tables {
        push_checked(&mut ddl.tables, table, &mut errors);
    }

    let mut column_pks: Vec<InterimPrimaryKey> = Vec::new();
    let mut uniques = interim.uniques;
    for column in interim.columns {
        if !known_table(&ddl, EntityKind::Column, &column.name, &column.table, &mut errors) {
            continue;
        }
        if column.is_pk {
            match column_pks.iter_mut().find(|pk| pk.table == column.table) {
                Some(pk) => pk.columns.push(column.name.clone()),
                None => column_pks.push(InterimPrimaryKey {
                    table: column.table.clone(),
                    name: None,
                    columns: vec![column.name.clone()],
                }),
            }
        }
        if column.is_unique {
            uniques.push(InterimUnique {
                table: column.table.clone(),
                name: column.unique_name.clone(),
                columns: vec![column.name.clone()],
            });
        }
        let normalized = Column {
            table: column.table,
            name: column.name,
            sql_type: normalize_type(&column.sql_type),
            not_null: column.not_null || column.is_pk,
            autoincrement: column.autoincrement,
            default: column.default.map(|d| d.trim().to_string()),
            generated: column.generated,
        };
        push_checked(&mut ddl.columns, normalized, &mut errors);
    }

    let mut pks = interim.pks;
    for pk in column_pks {
        if !pks.iter().any(|p| p.table == pk.table) {
            pks.push(pk);
        }
    }
    for pk in pks {
        let name_explicit = pk.name.is_some();
        let name = pk.name.unwrap_or_else(|| default_name_for_pk(&pk.table));
        if !known_table(&ddl, EntityKind::PrimaryKey, &name, &pk.table, &mut errors)
            || !known_columns(&ddl, EntityKind::PrimaryKey, &name, &pk.table, &pk.columns, &mut errors)
        {
            continue;
        }
        push_checked(
            &mut ddl.pks,
            PrimaryKey {
                table: pk.table,
                name,
                name_explicit,
                columns: pk.columns,
            },
            &mut errors,
        );
    }

    // AUTOINCREMENT is only legal on a lone INTEGER PRIMARY KEY
    for column in ddl.columns.iter().filter(|c| c.autoincrement) {
        let sole_pk = ddl
            .pks
            .one(&KeyFilter::on_table(&column.table))
            .is_some_and(|pk| pk.columns == [column.name.clone()]);
        if !sole_pk || column.sql_type != "integer" {
            errors.push(SchemaError::InvalidIdentity {
                column: column.identifier(),
                reason: "autoincrement requires a single-column integer primary key".into(),
            });
        }
    }

    for unique in uniques {
        let name_explicit = unique.name.is_some();
        let name = unique
            .name
            .unwrap_or_else(|| default_name_for_unique(&unique.table, &unique.columns));
        if !known_table(&ddl, EntityKind::UniqueConstraint, &name, &unique.table, &mut errors)
            || !known_columns(
                &ddl,
                EntityKind::UniqueConstraint,
                &name,
                &unique.table,
                &unique.columns,
                &mut errors,
            )
        {
            continue;
        }
        push_checked(
            &mut ddl.uniques,
            UniqueConstraint {
                table: unique.table,
                name,
                name_explicit,
                columns: unique.columns,
            },
            &mut errors,
        );
    }

    for index in interim.indexes {
        let plain: Vec<String> = index
            .columns
            .iter()
            .filter(|c| !c.is_expression)
            .map(|c| c.value.clone())
            .collect();
        let name_explicit = index.name.is_some();
        let name = index.name.unwrap_or_else(|| {
            let parts: Vec<String> = index
                .columns
                .iter()
                .map(|c| if c.is_expression { "expr".to_string() } else { c.value.clone() })
                .collect();
            default_name_for_index(&index.table, &parts)
        });
        if !known_table(&ddl, EntityKind::Index, &name, &index.table, &mut errors)
            || !known_columns(&ddl, EntityKind::Index, &name, &index.table, &plain, &mut errors)
        {
            continue;
        }
        push_checked(
            &mut ddl.indexes,
            Index {
                table: index.table,
                name,
                name_explicit,
                columns: index.columns,
                is_unique: index.is_unique,
                where_clause: index.where_clause.map(|w| parse_check_definition(&w)),
                origin: IndexOrigin::Manual,
            },
            &mut errors,
        );
    }

    let mut check_counts: Vec<(String, usize)> = Vec::new();
    for check in interim.checks {
        let name = match check.name {
            Some(name) => name,
            None => {
                let n = match check_counts.iter_mut().find(|(t, _)| *t == check.table) {
                    Some((_, n)) => {
                        *n += 1;
                        *n
                    }
                    None => {
                        check_counts.push((check.table.clone(), 1));
                        1
                    }
                };
                default_name_for_check(&check.table, n)
            }
        };
        if !known_table(&ddl, EntityKind::CheckConstraint, &name, &check.table, &mut errors) {
            continue;
        }
        push_checked(
            &mut ddl.checks,
            CheckConstraint {
                table: check.table,
                name,
                value: parse_check_definition(&check.value),
            },
            &mut errors,
        );
    }

    for fk in interim.fks {
        let name_explicit = fk.name.is_some();
        let name = fk.name.unwrap_or_else(|| {
            default_name_for_fk(&fk.table, &fk.columns, &fk.table_to, &fk.columns_to)
        });
        if fk.columns.len() != fk.columns_to.len() {
            errors.push(SchemaError::FkColumnCount {
                fk: name,
                from: fk.columns.len(),
                to: fk.columns_to.len(),
            });
            continue;
        }
        if !known_columns(&ddl, EntityKind::ForeignKey, &name, &fk.table, &fk.columns, &mut errors)
        {
            continue;
        }
        if !ddl.tables.contains(&EntityKey::simple(&fk.table_to)) {
            errors.push(SchemaError::MissingFkTable {
                fk: name,
                table: fk.table_to,
            });
            continue;
        }
        let missing: Vec<&String> = fk
            .columns_to
            .iter()
            .filter(|c| !ddl.columns.contains(&EntityKey::composite2(&fk.table_to, *c)))
            .collect();
        if !missing.is_empty() {
            for column in missing {
                errors.push(SchemaError::MissingFkColumn {
                    fk: name.clone(),
                    table: fk.table_to.clone(),
                    column: column.clone(),
                });
            }
            continue;
        }
        push_checked(
            &mut ddl.fks,
            ForeignKey {
                table: fk.table,
                name,
                name_explicit,
                columns: fk.columns,
                table_to: fk.table_to,
                columns_to: fk.columns_to,
                on_update: normalize_action(fk.on_update.as_deref()),
                on_delete: normalize_action(fk.on_delete.as_deref()),
            },
            &mut errors,
        );
    }

    for mut view in interim.views {
        view.definition = parse_view_definition(view.definition.as_deref());
        push_checked(&mut ddl.views, view, &mut errors);
    }

    ddl.sort();
    (ddl, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str) -> Table {
        Table {
            name: name.into(),
            strict: false,
            without_rowid: false,
        }
    }

    #[test]
    fn test_column_flags_become_constraints() {
        let interim = InterimSchema {
            tables: vec![table("users")],
            columns: vec![
                InterimColumn::new("users", "id", "INTEGER").primary_key().autoincrement(),
                InterimColumn::new("users", "email", "TEXT").unique(),
            ],
            ..Default::default()
        };
        let (ddl, errors) = interim_to_ddl(interim);
        assert!(errors.is_empty(), "{errors:?}");

        let pk = ddl.pks.iter().next().unwrap();
        assert_eq!(pk.name, "users_pk");
        assert!(!pk.name_explicit);
        let unique = ddl.uniques.iter().next().unwrap();
        assert_eq!(unique.name, "users_email_unique");
        let id = ddl.columns.get(&EntityKey::composite2("users", "id")).unwrap();
        assert_eq!(id.sql_type, "integer");
        assert!(id.not_null);
    }

    #[test]
    fn test_autoincrement_needs_integer_pk() {
        let interim = InterimSchema {
            tables: vec![table("t")],
            columns: vec![
                InterimColumn::new("t", "a", "text").primary_key().autoincrement(),
                InterimColumn::new("t", "b", "integer").autoincrement(),
            ],
            ..Default::default()
        };
        let (_, errors) = interim_to_ddl(interim);
        assert_eq!(errors.len(), 2);
        assert!(
            errors
                .iter()
                .all(|e| matches!(e, SchemaError::InvalidIdentity { .. }))
        );
    }

    #[test]
    fn test_dangling_references() {
        let interim = InterimSchema {
            tables: vec![table("posts")],
            columns: vec![InterimColumn::new("posts", "author_id", "integer")],
            fks: vec![InterimForeignKey {
                table: "posts".into(),
                name: None,
                columns: vec!["author_id".into()],
                table_to: "users".into(),
                columns_to: vec!["id".into()],
                on_update: None,
                on_delete: Some("cascade".into()),
            }],
            indexes: vec![InterimIndex {
                table: "posts".into(),
                name: None,
                columns: vec![IndexColumn::column("title")],
                is_unique: false,
                where_clause: None,
            }],
            ..Default::default()
        };
        let (ddl, errors) = interim_to_ddl(interim);
        assert!(ddl.fks.is_empty() && ddl.indexes.is_empty());
        assert!(matches!(&errors[0], SchemaError::UnknownColumn { name, .. } if name == "posts_title_idx"));
        assert!(matches!(&errors[1], SchemaError::MissingFkTable { table, .. } if table == "users"));
    }
}
