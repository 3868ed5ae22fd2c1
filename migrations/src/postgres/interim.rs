//! Interim schema and its normalization into [`PostgresDdl`]
//!
//! Introspection and source-schema extraction both produce an
//! [`InterimSchema`]: entities as they were read, constraint names optional,
//! primary keys and uniques possibly declared on the column.
//! [`interim_to_ddl`] validates it and produces the canonical store.

use super::collection::PostgresDdl;
use super::ddl::{
    CheckConstraint, Column, Enum, ForeignKey, Generated, Identity, Index, IndexColumn, Policy,
    PrimaryKey, Privilege, Role, Schema, Sequence, Table, UniqueConstraint, View,
};
use super::grammar::{
    DEFAULT_INDEX_METHOD, default_name_for_check, default_name_for_fk, default_name_for_index,
    default_name_for_identity_sequence, default_name_for_pk, default_name_for_unique,
    is_identity_type, is_system_namespace, is_system_role, normalize_action, normalize_type,
    parse_check_definition, parse_view_definition,
};
use crate::casing::Casing;
use crate::collection::Collection;
use crate::error::{DuplicateKeyError, SchemaError};
use crate::traits::{Entity, EntityKind, KeyFilter};

/// Column as read, with column-level key flags
#[derive(Debug, Clone, PartialEq)]
pub struct InterimColumn {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub sql_type: String,
    pub type_schema: Option<String>,
    pub not_null: bool,
    pub default: Option<String>,
    pub generated: Option<Generated>,
    /// An empty identity name gets the default sequence name
    pub identity: Option<Identity>,
    pub dimensions: u32,
    pub is_pk: bool,
    pub is_unique: bool,
    pub unique_name: Option<String>,
    pub unique_nulls_not_distinct: bool,
}

impl InterimColumn {
    /// Nullable column with no flags
    pub fn new(
        schema: impl Into<String>,
        table: impl Into<String>,
        name: impl Into<String>,
        sql_type: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            name: name.into(),
            sql_type: sql_type.into(),
            type_schema: None,
            not_null: false,
            default: None,
            generated: None,
            identity: None,
            dimensions: 0,
            is_pk: false,
            is_unique: false,
            unique_name: None,
            unique_nulls_not_distinct: false,
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

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn enum_type(mut self, schema: impl Into<String>) -> Self {
        self.type_schema = Some(schema.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterimPrimaryKey {
    pub schema: String,
    pub table: String,
    pub name: Option<String>,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterimUnique {
    pub schema: String,
    pub table: String,
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub nulls_not_distinct: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterimCheck {
    pub schema: String,
    pub table: String,
    pub name: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterimIndex {
    pub schema: String,
    pub table: String,
    pub name: Option<String>,
    pub columns: Vec<IndexColumn>,
    pub is_unique: bool,
    pub r#where: Option<String>,
    pub method: Option<String>,
    pub concurrently: bool,
    pub with: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterimForeignKey {
    pub schema: String,
    pub table: String,
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub schema_to: String,
    pub table_to: String,
    pub columns_to: Vec<String>,
    pub on_update: Option<String>,
    pub on_delete: Option<String>,
}

/// Raw schema as produced by introspection or source extraction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterimSchema {
    pub schemas: Vec<Schema>,
    pub enums: Vec<Enum>,
    pub sequences: Vec<Sequence>,
    pub roles: Vec<Role>,
    pub privileges: Vec<Privilege>,
    pub policies: Vec<Policy>,
    pub tables: Vec<Table>,
    pub columns: Vec<InterimColumn>,
    pub indexes: Vec<InterimIndex>,
    pub pks: Vec<InterimPrimaryKey>,
    pub uniques: Vec<InterimUnique>,
    pub checks: Vec<InterimCheck>,
    pub fks: Vec<InterimForeignKey>,
    pub views: Vec<View>,
}

impl InterimSchema {
    /// Rename source-schema columns and every reference to them
    pub fn apply_casing(&mut self, casing: Casing) {
        if casing == Casing::Preserve {
            return;
        }
        for column in &mut self.columns {
            column.name = casing.apply(&column.name);
        }
        let recase = |names: &mut Vec<String>| {
            for name in names.iter_mut() {
                *name = casing.apply(name);
            }
        };
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

/// Push into a collection, turning a key collision into a finding
fn push_checked<E: Entity>(col: &mut Collection<E>, entity: E, errors: &mut Vec<SchemaError>) {
    if let Err(DuplicateKeyError { kind, key }) = col.push(entity) {
        errors.push(SchemaError::Duplicate {
            kind,
            name: key.to_string(),
        });
    }
}

fn parse_bound(value: Option<&str>) -> Option<i128> {
    value.and_then(|v| v.trim().parse().ok())
}

/// Shared identity/sequence option checks
fn check_sequence_options(
    increment: Option<&str>,
    min: Option<&str>,
    max: Option<&str>,
    start: Option<&str>,
) -> Result<(), String> {
    if parse_bound(increment) == Some(0) {
        return Err("increment must not be zero".into());
    }
    let (min, max, start) = (parse_bound(min), parse_bound(max), parse_bound(start));
    if let (Some(min), Some(max)) = (min, max)
        && min > max
    {
        return Err(format!("min value {min} is greater than max value {max}"));
    }
    if let Some(start) = start {
        if min.is_some_and(|min| start < min) || max.is_some_and(|max| start > max) {
            return Err(format!("start value {start} is outside [min, max]"));
        }
    }
    Ok(())
}

/// Normalize an interim schema into the canonical store.
///
/// Structural problems are returned alongside the store; entities that
/// cannot be placed are skipped.
pub fn interim_to_ddl(interim: InterimSchema) -> (PostgresDdl, Vec<SchemaError>) {
    let mut ddl = PostgresDdl::new();
    let mut errors = Vec::new();

    for schema in interim.schemas {
        if !is_system_namespace(&schema.name) {
            push_checked(&mut ddl.schemas, schema, &mut errors);
        }
    }

    for e in interim.enums {
        push_checked(&mut ddl.enums, e, &mut errors);
    }

    for sequence in interim.sequences {
        if let Err(reason) = check_sequence_options(
            sequence.increment.as_deref(),
            sequence.min_value.as_deref(),
            sequence.max_value.as_deref(),
            sequence.start_with.as_deref(),
        ) {
            errors.push(SchemaError::InvalidSequence {
                name: format!("{}.{}", sequence.schema, sequence.name),
                reason,
            });
        }
        push_checked(&mut ddl.sequences, sequence, &mut errors);
    }

    for role in interim.roles {
        if !is_system_role(&role.name) {
            push_checked(&mut ddl.roles, role, &mut errors);
        }
    }

    for table in interim.tables {
        push_checked(&mut ddl.tables, table, &mut errors);
    }

    let table_exists = |ddl: &PostgresDdl, schema: &str, table: &str| {
        ddl.tables
            .one(&KeyFilter::schema(schema).named(table))
            .is_some()
    };

    // Columns, collecting column-level keys on the way
    let mut column_pks: Vec<(String, String, Vec<String>)> = Vec::new();
    let mut column_uniques = Vec::new();
    for column in interim.columns {
        if !table_exists(&ddl, &column.schema, &column.table) {
            errors.push(SchemaError::UnknownTable {
                kind: EntityKind::Column,
                name: column.name.clone(),
                table: format!("{}.{}", column.schema, column.table),
            });
            continue;
        }

        let qualified = format!("{}.{}.{}", column.schema, column.table, column.name);
        let sql_type = match &column.type_schema {
            Some(type_schema) => {
                let enum_name = column.sql_type.trim_end_matches("[]");
                let known = ddl
                    .enums
                    .one(&KeyFilter::schema(type_schema).named(enum_name))
                    .is_some();
                if !known {
                    errors.push(SchemaError::UnknownEnum {
                        column: qualified.clone(),
                        name: format!("{type_schema}.{enum_name}"),
                    });
                }
                column.sql_type.trim().to_string()
            }
            None => normalize_type(&column.sql_type),
        };

        let identity = match column.identity {
            Some(mut identity) => {
                if !is_identity_type(&sql_type) {
                    errors.push(SchemaError::InvalidIdentity {
                        column: qualified.clone(),
                        reason: format!("identity requires an integer type, found `{sql_type}`"),
                    });
                }
                if let Err(reason) = check_sequence_options(
                    identity.increment.as_deref(),
                    identity.min_value.as_deref(),
                    identity.max_value.as_deref(),
                    identity.start_with.as_deref(),
                ) {
                    errors.push(SchemaError::InvalidIdentity {
                        column: qualified.clone(),
                        reason,
                    });
                }
                if identity.name.is_empty() {
                    identity.name = default_name_for_identity_sequence(&column.table, &column.name);
                }
                Some(identity)
            }
            None => None,
        };

        if column.is_pk {
            match column_pks
                .iter_mut()
                .find(|(s, t, _)| *s == column.schema && *t == column.table)
            {
                Some((_, _, cols)) => cols.push(column.name.clone()),
                None => column_pks.push((
                    column.schema.clone(),
                    column.table.clone(),
                    vec![column.name.clone()],
                )),
            }
        }
        if column.is_unique {
            let columns = vec![column.name.clone()];
            column_uniques.push(InterimUnique {
                schema: column.schema.clone(),
                table: column.table.clone(),
                name: column.unique_name.clone(),
                columns,
                nulls_not_distinct: column.unique_nulls_not_distinct,
            });
        }

        let normalized = Column {
            schema: column.schema,
            table: column.table,
            name: column.name,
            sql_type,
            type_schema: column.type_schema,
            // identity columns are implicitly not null
            not_null: column.not_null || column.is_pk || identity.is_some(),
            default: column.default.map(|d| d.trim().to_string()),
            generated: column.generated,
            identity,
            dimensions: column.dimensions,
        };
        push_checked(&mut ddl.columns, normalized, &mut errors);
    }

    let has_column = |ddl: &PostgresDdl, schema: &str, table: &str, column: &str| {
        ddl.columns
            .one(&KeyFilter::table(schema, table).named(column))
            .is_some()
    };
    let unknown_columns = |ddl: &PostgresDdl,
                           kind: EntityKind,
                           name: &str,
                           schema: &str,
                           table: &str,
                           columns: &[String],
                           errors: &mut Vec<SchemaError>| {
        let mut ok = true;
        for column in columns {
            if !has_column(ddl, schema, table, column) {
                errors.push(SchemaError::UnknownColumn {
                    kind,
                    name: name.to_string(),
                    table: format!("{schema}.{table}"),
                    column: column.clone(),
                });
                ok = false;
            }
        }
        ok
    };

    // Primary keys: an explicit constraint wins over column flags
    let mut pks = interim.pks;
    for (schema, table, columns) in column_pks {
        if !pks.iter().any(|pk| pk.schema == schema && pk.table == table) {
            pks.push(InterimPrimaryKey {
                schema,
                table,
                name: None,
                columns,
            });
        }
    }
    for pk in pks {
        let name_explicit = pk.name.is_some();
        let name = pk.name.unwrap_or_else(|| default_name_for_pk(&pk.table));
        if !table_exists(&ddl, &pk.schema, &pk.table) {
            errors.push(SchemaError::UnknownTable {
                kind: EntityKind::PrimaryKey,
                name,
                table: format!("{}.{}", pk.schema, pk.table),
            });
            continue;
        }
        if !unknown_columns(
            &ddl,
            EntityKind::PrimaryKey,
            &name,
            &pk.schema,
            &pk.table,
            &pk.columns,
            &mut errors,
        ) {
            continue;
        }
        // key columns are implicitly not null
        let _ = ddl.columns.update_where(
            |c| c.schema == pk.schema && c.table == pk.table && pk.columns.contains(&c.name),
            |c| c.not_null = true,
        );
        push_checked(
            &mut ddl.pks,
            PrimaryKey {
                schema: pk.schema,
                table: pk.table,
                name,
                name_explicit,
                columns: pk.columns,
            },
            &mut errors,
        );
    }

    for unique in interim.uniques.into_iter().chain(column_uniques) {
        let name_explicit = unique.name.is_some();
        let name = unique
            .name
            .unwrap_or_else(|| default_name_for_unique(&unique.table, &unique.columns));
        if !unknown_columns(
            &ddl,
            EntityKind::UniqueConstraint,
            &name,
            &unique.schema,
            &unique.table,
            &unique.columns,
            &mut errors,
        ) {
            continue;
        }
        push_checked(
            &mut ddl.uniques,
            UniqueConstraint {
                schema: unique.schema,
                table: unique.table,
                name,
                name_explicit,
                columns: unique.columns,
                nulls_not_distinct: unique.nulls_not_distinct,
            },
            &mut errors,
        );
    }

    let mut check_counts: Vec<(String, String, usize)> = Vec::new();
    for check in interim.checks {
        if !table_exists(&ddl, &check.schema, &check.table) {
            errors.push(SchemaError::UnknownTable {
                kind: EntityKind::CheckConstraint,
                name: check.name.unwrap_or_default(),
                table: format!("{}.{}", check.schema, check.table),
            });
            continue;
        }
        let name = match check.name {
            Some(name) => name,
            None => {
                let n = match check_counts
                    .iter_mut()
                    .find(|(s, t, _)| *s == check.schema && *t == check.table)
                {
                    Some((_, _, n)) => {
                        *n += 1;
                        *n
                    }
                    None => {
                        check_counts.push((check.schema.clone(), check.table.clone(), 1));
                        1
                    }
                };
                default_name_for_check(&check.table, n)
            }
        };
        push_checked(
            &mut ddl.checks,
            CheckConstraint {
                schema: check.schema,
                table: check.table,
                name,
                value: parse_check_definition(&check.value),
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
        if !table_exists(&ddl, &index.schema, &index.table) {
            errors.push(SchemaError::UnknownTable {
                kind: EntityKind::Index,
                name,
                table: format!("{}.{}", index.schema, index.table),
            });
            continue;
        }
        if !unknown_columns(
            &ddl,
            EntityKind::Index,
            &name,
            &index.schema,
            &index.table,
            &plain,
            &mut errors,
        ) {
            continue;
        }
        push_checked(
            &mut ddl.indexes,
            Index {
                schema: index.schema,
                table: index.table,
                name,
                name_explicit,
                columns: index.columns,
                is_unique: index.is_unique,
                r#where: index.r#where.map(|w| w.trim().to_string()),
                method: index
                    .method
                    .map(|m| m.to_ascii_lowercase())
                    .unwrap_or_else(|| DEFAULT_INDEX_METHOD.to_string()),
                concurrently: index.concurrently,
                with: index.with,
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
        if !unknown_columns(
            &ddl,
            EntityKind::ForeignKey,
            &name,
            &fk.schema,
            &fk.table,
            &fk.columns,
            &mut errors,
        ) {
            continue;
        }
        if !table_exists(&ddl, &fk.schema_to, &fk.table_to) {
            errors.push(SchemaError::MissingFkTable {
                fk: name,
                table: format!("{}.{}", fk.schema_to, fk.table_to),
            });
            continue;
        }
        let missing: Vec<&String> = fk
            .columns_to
            .iter()
            .filter(|c| !has_column(&ddl, &fk.schema_to, &fk.table_to, c))
            .collect();
        if !missing.is_empty() {
            for column in missing {
                errors.push(SchemaError::MissingFkColumn {
                    fk: name.clone(),
                    table: format!("{}.{}", fk.schema_to, fk.table_to),
                    column: column.clone(),
                });
            }
            continue;
        }
        push_checked(
            &mut ddl.fks,
            ForeignKey {
                schema: fk.schema,
                table: fk.table,
                name,
                name_explicit,
                columns: fk.columns,
                schema_to: fk.schema_to,
                table_to: fk.table_to,
                columns_to: fk.columns_to,
                on_update: normalize_action(fk.on_update.as_deref()),
                on_delete: normalize_action(fk.on_delete.as_deref()),
            },
            &mut errors,
        );
    }

    for policy in interim.policies {
        if !table_exists(&ddl, &policy.schema, &policy.table) {
            errors.push(SchemaError::UnknownTable {
                kind: EntityKind::Policy,
                name: policy.name,
                table: format!("{}.{}", policy.schema, policy.table),
            });
            continue;
        }
        let mut policy = policy;
        policy.as_clause = policy.as_clause.to_ascii_uppercase();
        policy.for_clause = policy.for_clause.to_ascii_uppercase();
        policy.to.sort();
        push_checked(&mut ddl.policies, policy, &mut errors);
    }

    for privilege in interim.privileges {
        if !table_exists(&ddl, &privilege.schema, &privilege.table) {
            errors.push(SchemaError::UnknownTable {
                kind: EntityKind::Privilege,
                name: privilege.grantee,
                table: format!("{}.{}", privilege.schema, privilege.table),
            });
            continue;
        }
        push_checked(&mut ddl.privileges, privilege, &mut errors);
    }

    for mut view in interim.views {
        view.definition = parse_view_definition(view.definition.as_deref());
        push_checked(&mut ddl.views, view, &mut errors);
    }

    ddl.sort();
    (ddl, errors)
}
