//! Interim schema and its normalization into [`MySqlDdl`]

use super::collection::MySqlDdl;
use super::ddl::{
    CheckConstraint, Column, ForeignKey, Generated, Index, IndexColumn, PrimaryKey, Table, View,
};
use super::grammar::{
    PRIMARY_KEY_NAME, default_name_for_check, default_name_for_fk, default_name_for_index,
    default_name_for_unique, normalize_action, normalize_type, type_for,
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
    pub auto_increment: bool,
    pub default: Option<String>,
    pub on_update_now: bool,
    pub charset: Option<String>,
    pub collation: Option<String>,
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
            auto_increment: false,
            default: None,
            on_update_now: false,
            charset: None,
            collation: None,
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

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
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
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterimIndex {
    pub table: String,
    pub name: Option<String>,
    pub columns: Vec<IndexColumn>,
    pub is_unique: bool,
    pub using: Option<String>,
    pub algorithm: Option<String>,
    pub lock: Option<String>,
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

/// Raw MySQL schema as produced by introspection or source extraction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterimSchema {
    pub tables: Vec<Table>,
    pub columns: Vec<InterimColumn>,
    pub pks: Vec<InterimPrimaryKey>,
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

/// Report every column of `columns` missing from `table`
fn known_columns(
    ddl: &MySqlDdl,
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
pub fn interim_to_ddl(interim: InterimSchema) -> (MySqlDdl, Vec<SchemaError>) {
    let mut ddl = MySqlDdl::new();
    let mut errors = Vec::new();

    for table in interim.tables {
        push_checked(&mut ddl.tables, table, &mut errors);
    }

    let mut column_pks: Vec<InterimPrimaryKey> = Vec::new();
    let mut column_uniques: Vec<InterimIndex> = Vec::new();
    for column in interim.columns {
        if !ddl.tables.contains(&EntityKey::simple(&column.table)) {
            errors.push(SchemaError::UnknownTable {
                kind: EntityKind::Column,
                name: column.name.clone(),
                table: column.table.clone(),
            });
            continue;
        }

        let sql_type = normalize_type(&column.sql_type);
        if column.auto_increment && !matches!(type_for(&sql_type).name(), "int" | "decimal") {
            errors.push(SchemaError::InvalidIdentity {
                column: format!("{}.{}", column.table, column.name),
                reason: format!("auto_increment requires a numeric type, found `{sql_type}`"),
            });
        }

        if column.is_pk {
            match column_pks.iter_mut().find(|pk| pk.table == column.table) {
                Some(pk) => pk.columns.push(column.name.clone()),
                None => column_pks.push(InterimPrimaryKey {
                    table: column.table.clone(),
                    columns: vec![column.name.clone()],
                }),
            }
        }
        if column.is_unique {
            column_uniques.push(InterimIndex {
                table: column.table.clone(),
                name: column.unique_name.clone(),
                columns: vec![IndexColumn::column(&column.name)],
                is_unique: true,
                using: None,
                algorithm: None,
                lock: None,
            });
        }

        let normalized = Column {
            table: column.table,
            name: column.name,
            sql_type,
            not_null: column.not_null || column.is_pk,
            auto_increment: column.auto_increment,
            default: column.default.map(|d| d.trim().to_string()),
            on_update_now: column.on_update_now,
            charset: column.charset.map(|c| c.to_ascii_lowercase()),
            collation: column.collation.map(|c| c.to_ascii_lowercase()),
            generated: column.generated,
        };
        push_checked(&mut ddl.columns, normalized, &mut errors);
    }

    // an explicit primary key wins over column flags
    let mut pks = interim.pks;
    for pk in column_pks {
        if !pks.iter().any(|p| p.table == pk.table) {
            pks.push(pk);
        }
    }
    for pk in pks {
        if !ddl.tables.contains(&EntityKey::simple(&pk.table)) {
            errors.push(SchemaError::UnknownTable {
                kind: EntityKind::PrimaryKey,
                name: PRIMARY_KEY_NAME.to_string(),
                table: pk.table,
            });
            continue;
        }
        if !known_columns(
            &ddl,
            EntityKind::PrimaryKey,
            PRIMARY_KEY_NAME,
            &pk.table,
            &pk.columns,
            &mut errors,
        ) {
            continue;
        }
        let _ = ddl.columns.update_where(
            |c| c.table == pk.table && pk.columns.contains(&c.name),
            |c| c.not_null = true,
        );
        push_checked(
            &mut ddl.pks,
            PrimaryKey {
                table: pk.table,
                name: PRIMARY_KEY_NAME.to_string(),
                columns: pk.columns,
            },
            &mut errors,
        );
    }

    for index in interim.indexes.into_iter().chain(column_uniques) {
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
            if index.is_unique {
                default_name_for_unique(&index.table, &parts)
            } else {
                default_name_for_index(&index.table, &parts)
            }
        });
        if !ddl.tables.contains(&EntityKey::simple(&index.table)) {
            errors.push(SchemaError::UnknownTable {
                kind: EntityKind::Index,
                name,
                table: index.table,
            });
            continue;
        }
        if !known_columns(&ddl, EntityKind::Index, &name, &index.table, &plain, &mut errors) {
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
                using: index.using.map(|u| u.to_ascii_lowercase()),
                algorithm: index.algorithm.map(|a| a.to_ascii_lowercase()),
                lock: index.lock.map(|l| l.to_ascii_lowercase()),
            },
            &mut errors,
        );
    }

    // auto_increment columns must lead some key
    for column in ddl.columns.iter().filter(|c| c.auto_increment) {
        let filter = KeyFilter::on_table(&column.table);
        let in_pk = ddl
            .pks
            .one(&filter)
            .is_some_and(|pk| pk.columns.first() == Some(&column.name));
        let in_index = ddl.indexes.list(&filter).into_iter().any(|i| {
            i.columns
                .first()
                .is_some_and(|c| !c.is_expression && c.value == column.name)
        });
        if !in_pk && !in_index {
            errors.push(SchemaError::InvalidIdentity {
                column: column.identifier(),
                reason: "auto_increment column must be the first column of a key".into(),
            });
        }
    }

    let mut check_counts: Vec<(String, usize)> = Vec::new();
    for check in interim.checks {
        if !ddl.tables.contains(&EntityKey::simple(&check.table)) {
            errors.push(SchemaError::UnknownTable {
                kind: EntityKind::CheckConstraint,
                name: check.name.unwrap_or_default(),
                table: check.table,
            });
            continue;
        }
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
        view.definition = parse_view_definition(Some(view.definition.as_str())).unwrap_or_default();
        view.algorithm = view.algorithm.map(|a| a.to_ascii_lowercase());
        view.sql_security = view.sql_security.map(|s| s.to_ascii_lowercase());
        view.with_check_option = view.with_check_option.map(|w| w.to_ascii_lowercase());
        push_checked(&mut ddl.views, view, &mut errors);
    }

    ddl.sort();
    (ddl, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str) -> Table {
        Table { name: name.into() }
    }

    #[test]
    fn test_column_flags_become_keys() {
        let interim = InterimSchema {
            tables: vec![table("users")],
            columns: vec![
                InterimColumn::new("users", "id", "INT(11)").primary_key().auto_increment(),
                InterimColumn::new("users", "email", "varchar(255)").not_null().unique(),
            ],
            ..Default::default()
        };
        let (ddl, errors) = interim_to_ddl(interim);
        assert!(errors.is_empty(), "{errors:?}");

        let pk = ddl.pks.iter().next().unwrap();
        assert_eq!(pk.name, "PRIMARY");
        assert_eq!(pk.columns, ["id"]);

        let index = ddl.indexes.iter().next().unwrap();
        assert_eq!(index.name, "users_email_unique");
        assert!(index.is_unique);
        assert!(!index.name_explicit);

        let id = ddl.columns.get(&EntityKey::composite2("users", "id")).unwrap();
        assert_eq!(id.sql_type, "int");
        assert!(id.not_null);
    }

    #[test]
    fn test_auto_increment_rules() {
        let interim = InterimSchema {
            tables: vec![table("t")],
            columns: vec![
                InterimColumn::new("t", "a", "varchar(10)").auto_increment(),
                InterimColumn::new("t", "b", "int").auto_increment(),
            ],
            ..Default::default()
        };
        let (_, errors) = interim_to_ddl(interim);
        assert_eq!(errors.len(), 3, "{errors:?}");
        assert!(errors
            .iter()
            .all(|e| matches!(e, SchemaError::InvalidIdentity { .. })));
    }

    #[test]
    fn test_fk_validation_and_checks() {
        let fk = |table_to: &str, columns_to: &[&str]| InterimForeignKey {
            table: "posts".into(),
            name: None,
            columns: vec!["author_id".into()],
            table_to: table_to.into(),
            columns_to: columns_to.iter().map(|c| c.to_string()).collect(),
            on_update: None,
            on_delete: Some("cascade".into()),
        };
        let interim = InterimSchema {
            tables: vec![table("users"), table("posts")],
            columns: vec![
                InterimColumn::new("users", "id", "int").primary_key(),
                InterimColumn::new("posts", "author_id", "int"),
            ],
            fks: vec![fk("users", &["id"]), fk("accounts", &["id"]), fk("users", &["id", "x"])],
            checks: vec![
                InterimCheck {
                    table: "posts".into(),
                    name: None,
                    value: "(author_id > 0)".into(),
                },
                InterimCheck {
                    table: "ghosts".into(),
                    name: None,
                    value: "1".into(),
                },
            ],
            ..Default::default()
        };
        let (ddl, errors) = interim_to_ddl(interim);
        assert_eq!(ddl.fks.len(), 1);
        let fk = ddl.fks.iter().next().unwrap();
        assert_eq!(fk.name, "posts_author_id_users_id_fk");
        assert_eq!(fk.on_delete, "CASCADE");

        let check = ddl.checks.iter().next().unwrap();
        assert_eq!(check.name, "posts_chk_1");
        assert_eq!(check.value, "author_id > 0");

        assert!(matches!(&errors[0], SchemaError::UnknownTable { kind: EntityKind::CheckConstraint, .. }));
        assert!(matches!(&errors[1], SchemaError::MissingFkTable { .. }));
        assert!(matches!(&errors[2], SchemaError::FkColumnCount { from: 1, to: 2, .. }));
    }

    #[test]
    fn test_duplicate_columns_reported() {
        let interim = InterimSchema {
            tables: vec![table("users")],
            columns: vec![
                InterimColumn::new("users", "id", "int"),
                InterimColumn::new("users", "id", "bigint"),
            ],
            ..Default::default()
        };
        let (ddl, errors) = interim_to_ddl(interim);
        assert_eq!(ddl.columns.len(), 1);
        assert!(matches!(
            &errors[0],
            SchemaError::Duplicate { kind: EntityKind::Column, .. }
        ));
    }
}
