//! Schema diff for PostgreSQL
//!
//! `ddl_diff` walks entity kinds in dependency order. Renames a resolver
//! confirms are applied to a clone of the `from` store, so everything after
//! the rename compares like with like. Statements are bucketed by [`Phase`]
//! and flattened at the end.

use super::collection::PostgresDdl;
use super::ddl::{
    CheckConstraint, Column, Enum, ForeignKey, Index, IndexColumn, Policy, PrimaryKey, Privilege,
    Sequence, Table, UniqueConstraint, View,
};
use super::grammar::{defaults_commutative, expressions_commutative, types_commutative};
use super::statements::{ColumnChange, EnumValueAdd, JsonStatement};
use crate::collection::{Collection, diff_collections};
use crate::drift_trace_rename;
use crate::error::{DiffError, DuplicateKeyError};
use crate::plan::{
    DiffOutput, StatementPlan, TableEntity, changed_here, on_table, resolve_kind,
    resolve_on_table,
};
use crate::resolver::{Rename, Resolver, ResolverOutput};
use crate::snapshot::Meta;
use crate::traits::{Entity, KeyFilter, Mode};
use std::collections::HashSet;

/// Statement phases, in execution order
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// create and rename schema
    CreateSchemas,
    /// enums, sequences and roles, except drops
    Types,
    /// move, then rename table; every later statement uses the new name
    RenameTables,
    /// policies, views
    DropDependents,
    DropForeignKeys,
    /// indexes, uniques, checks, pks
    DropConstraints,
    DropTables,
    DropColumns,
    /// columns, indexes, constraints, policies, views
    Renames,
    CreateTables,
    Columns,
    Constraints,
    ForeignKeys,
    /// policies, rls, privileges
    Security,
    Views,
    /// sequences, enums, roles
    DropTypes,
    DropSchemas,
}

type Plan = StatementPlan<Phase, JsonStatement>;

type TableRef = (String, String);

/// Compute the ordered statements that turn `from` into `to`.
///
/// Neither store is modified. A resolver abort returns
/// [`DiffError::Aborted`] and nothing else.
pub async fn ddl_diff<R: Resolver>(
    from: &PostgresDdl,
    to: &PostgresDdl,
    resolver: &mut R,
    mode: Mode,
) -> Result<DiffOutput<JsonStatement>, DiffError> {
    let mut left = from.clone();
    let mut plan = Plan::new();
    let mut meta = Meta::new();

    // schemas
    let diff = diff_collections(&left.schemas, &to.schemas);
    let resolved = resolve_kind(resolver, diff.created, diff.deleted).await?;
    for rename in &resolved.renamed_or_moved {
        rename_schema(&mut left, &rename.from.name, &rename.to.name)?;
        note_rename(&mut meta, rename);
        plan.push(
            Phase::CreateSchemas,
            JsonStatement::RenameSchema {
                from: rename.from.name.clone(),
                to: rename.to.name.clone(),
            },
        );
    }
    for schema in resolved.created {
        plan.push(Phase::CreateSchemas, JsonStatement::CreateSchema { name: schema.name });
    }
    for schema in resolved.deleted {
        plan.push(Phase::DropSchemas, JsonStatement::DropSchema { name: schema.name });
    }

    // enums
    let diff = diff_collections(&left.enums, &to.enums);
    let resolved = resolve_kind(resolver, diff.created, diff.deleted).await?;
    for rename in &resolved.renamed_or_moved {
        rename_enum(&mut left, &rename.from, &rename.to)?;
        note_rename(&mut meta, rename);
        plan.extend(
            Phase::Types,
            relocate(
                rename,
                |name, from, to| JsonStatement::MoveEnum { name, from, to },
                |schema, from, to| JsonStatement::RenameEnum { schema, from, to },
            ),
        );
    }
    plan.extend(
        Phase::Types,
        resolved
            .created
            .into_iter()
            .map(|enum_| JsonStatement::CreateEnum { enum_ }),
    );
    plan.extend(
        Phase::DropTypes,
        resolved
            .deleted
            .into_iter()
            .map(|enum_| JsonStatement::DropEnum { enum_ }),
    );

    // sequences
    let diff = diff_collections(&left.sequences, &to.sequences);
    let resolved = resolve_kind(resolver, diff.created, diff.deleted).await?;
    for rename in &resolved.renamed_or_moved {
        place(&mut left.sequences, rename)?;
        note_rename(&mut meta, rename);
        plan.extend(
            Phase::Types,
            relocate(
                rename,
                |name, from, to| JsonStatement::MoveSequence { name, from, to },
                |schema, from, to| JsonStatement::RenameSequence { schema, from, to },
            ),
        );
    }
    plan.extend(
        Phase::Types,
        resolved
            .created
            .into_iter()
            .map(|sequence| JsonStatement::CreateSequence { sequence }),
    );
    plan.extend(
        Phase::DropTypes,
        resolved
            .deleted
            .into_iter()
            .map(|sequence| JsonStatement::DropSequence { sequence }),
    );

    // roles
    let diff = diff_collections(&left.roles, &to.roles);
    let resolved = resolve_kind(resolver, diff.created, diff.deleted).await?;
    for rename in &resolved.renamed_or_moved {
        rename_role(&mut left, &rename.from.name, &rename.to.name)?;
        note_rename(&mut meta, rename);
        plan.push(
            Phase::Types,
            JsonStatement::RenameRole {
                from: rename.from.name.clone(),
                to: rename.to.name.clone(),
            },
        );
    }
    plan.extend(
        Phase::Types,
        resolved
            .created
            .into_iter()
            .map(|role| JsonStatement::CreateRole { role }),
    );
    plan.extend(
        Phase::DropTypes,
        resolved
            .deleted
            .into_iter()
            .map(|role| JsonStatement::DropRole { role }),
    );

    // tables
    let diff = diff_collections(&left.tables, &to.tables);
    let resolved = resolve_kind(resolver, diff.created, diff.deleted).await?;
    let dropped: HashSet<TableRef> = resolved.deleted.iter().map(table_ref).collect();
    for table in &resolved.deleted {
        plan.push(Phase::DropTables, JsonStatement::DropTable { table: table.clone() });
    }
    for rename in &resolved.renamed_or_moved {
        rename_table(&mut left, &rename.from, &rename.to)?;
        note_rename(&mut meta, rename);
        plan.extend(
            Phase::RenameTables,
            relocate(
                rename,
                |name, from, to| JsonStatement::MoveTable { name, from, to },
                |schema, from, to| JsonStatement::RenameTable { schema, from, to },
            ),
        );
    }
    drop_fks_between_dropped(&left, &dropped, &mut plan);

    let common: Vec<TableRef> = to
        .tables
        .sorted()
        .into_iter()
        .filter(|t| left.tables.contains(&t.key()))
        .map(table_ref)
        .collect();

    // columns, per table
    for (schema, table) in &common {
        let filter = KeyFilter::table(schema, table);
        let diff = on_table(&left.columns, &to.columns, &filter);
        let resolved = resolve_kind(resolver, diff.created, diff.deleted).await?;
        for rename in &resolved.renamed_or_moved {
            rename_column(&mut left, schema, table, &rename.from.name, &rename.to.name)?;
            note_rename(&mut meta, rename);
            plan.push(
                Phase::Renames,
                JsonStatement::RenameColumn {
                    schema: schema.clone(),
                    table: table.clone(),
                    from: rename.from.name.clone(),
                    to: rename.to.name.clone(),
                },
            );
        }
        plan.extend(
            Phase::Columns,
            resolved
                .created
                .into_iter()
                .map(|column| JsonStatement::AddColumn { column }),
        );
        plan.extend(
            Phase::DropColumns,
            resolved
                .deleted
                .into_iter()
                .map(|column| JsonStatement::DropColumn { column }),
        );
    }

    // indexes, constraints and policies, per table
    for (schema, table) in &common {
        let filter = KeyFilter::table(schema, table);
        let resolved = resolve_on_table(resolver, &mut left.indexes, &to.indexes, &filter).await?;
        emit(
            &mut plan,
            resolved,
            |r: &Rename<Index>| JsonStatement::RenameIndex {
                schema: schema.clone(),
                table: table.clone(),
                from: r.from.name.clone(),
                to: r.to.name.clone(),
            },
            (Phase::Constraints, |index| JsonStatement::CreateIndex { index }),
            (Phase::DropConstraints, |index| JsonStatement::DropIndex { index }),
        );

        let resolved = resolve_on_table(resolver, &mut left.pks, &to.pks, &filter).await?;
        emit(
            &mut plan,
            resolved,
            |r: &Rename<PrimaryKey>| rename_constraint(schema, table, r),
            (Phase::Constraints, |pk| JsonStatement::AddPk { pk }),
            (Phase::DropConstraints, |pk| JsonStatement::DropPk { pk }),
        );

        let resolved = resolve_on_table(resolver, &mut left.uniques, &to.uniques, &filter).await?;
        emit(
            &mut plan,
            resolved,
            |r: &Rename<UniqueConstraint>| rename_constraint(schema, table, r),
            (Phase::Constraints, |unique| JsonStatement::AddUnique { unique }),
            (Phase::DropConstraints, |unique| JsonStatement::DropUnique { unique }),
        );

        let resolved = resolve_on_table(resolver, &mut left.checks, &to.checks, &filter).await?;
        emit(
            &mut plan,
            resolved,
            |r: &Rename<CheckConstraint>| rename_constraint(schema, table, r),
            (Phase::Constraints, |check| JsonStatement::AddCheck { check }),
            (Phase::DropConstraints, |check| JsonStatement::DropCheck { check }),
        );

        let resolved =
            resolve_on_table(resolver, &mut left.policies, &to.policies, &filter).await?;
        emit(
            &mut plan,
            resolved,
            |r: &Rename<Policy>| JsonStatement::RenamePolicy {
                schema: schema.clone(),
                table: table.clone(),
                from: r.from.name.clone(),
                to: r.to.name.clone(),
            },
            (Phase::Security, |policy| JsonStatement::CreatePolicy { policy }),
            (Phase::DropDependents, |policy| JsonStatement::DropPolicy { policy }),
        );
    }

    // views
    let diff = diff_collections(&left.views, &to.views);
    let resolved = resolve_kind(resolver, diff.created, diff.deleted).await?;
    for rename in &resolved.renamed_or_moved {
        place(&mut left.views, rename)?;
        note_rename(&mut meta, rename);
        let materialized = rename.to.materialized;
        plan.extend(
            Phase::Renames,
            relocate(
                rename,
                |name, from, to| JsonStatement::MoveView {
                    name,
                    from,
                    to,
                    materialized,
                },
                |schema, from, to| JsonStatement::RenameView {
                    schema,
                    from,
                    to,
                    materialized,
                },
            ),
        );
    }
    plan.extend(
        Phase::Views,
        resolved
            .created
            .into_iter()
            .filter(|v| !v.is_existing)
            .map(|view| JsonStatement::CreateView { view }),
    );
    plan.extend(
        Phase::DropDependents,
        resolved
            .deleted
            .into_iter()
            .filter(|v| !v.is_existing)
            .map(|view| JsonStatement::DropView { view }),
    );

    // foreign keys last, after every column and table rename has landed
    for (schema, table) in &common {
        let filter = KeyFilter::table(schema, table);
        let resolved = resolve_on_table(resolver, &mut left.fks, &to.fks, &filter).await?;
        emit(
            &mut plan,
            resolved,
            |r: &Rename<ForeignKey>| rename_constraint(schema, table, r),
            (Phase::ForeignKeys, |fk| JsonStatement::CreateFk { fk }),
            (Phase::DropForeignKeys, |fk| JsonStatement::DropFk { fk }),
        );
    }

    create_tables(&left, to, &mut plan);
    alter_common_tables(&left, to, &common, mode, &mut plan);
    alter_schema_objects(&left, to, mode, &mut plan);
    diff_privileges(&left, to, &dropped, &mut plan);

    Ok(DiffOutput {
        statements: plan.into_statements(),
        meta,
    })
}

fn rename_constraint<E: Entity>(schema: &str, table: &str, rename: &Rename<E>) -> JsonStatement {
    JsonStatement::RenameConstraint {
        schema: schema.to_string(),
        table: table.to_string(),
        from: rename.from.name().to_string(),
        to: rename.to.name().to_string(),
    }
}

fn table_ref(table: &Table) -> TableRef {
    (table.schema.clone(), table.name.clone())
}

fn note_rename<E: Entity>(meta: &mut Meta, rename: &Rename<E>) {
    let from = rename.from.identifier();
    let to = rename.to.identifier();
    drift_trace_rename!(E::KIND, from, to);
    meta.record(E::KIND, from, to);
}

// =============================================================================
// Rename plumbing
// =============================================================================

/// Schema-level entity that can be moved and renamed
trait Placed: Entity {
    fn place(&mut self, schema: &str, name: &str);
}

macro_rules! placed {
    ($($ty:ty),*) => {
        $(impl Placed for $ty {
            fn place(&mut self, schema: &str, name: &str) {
                self.schema = schema.to_string();
                self.name = name.to_string();
            }
        })*
    };
}

placed!(Enum, Sequence, Table, View);

impl TableEntity for Index {
    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn name_explicit(&self) -> bool {
        self.name_explicit
    }

    fn same_shape(&self, other: &Self) -> bool {
        self.columns == other.columns
            && self.is_unique == other.is_unique
            && self.r#where == other.r#where
            && self.method == other.method
            && self.with == other.with
    }
}

impl TableEntity for PrimaryKey {
    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn name_explicit(&self) -> bool {
        self.name_explicit
    }

    fn same_shape(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

impl TableEntity for UniqueConstraint {
    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn name_explicit(&self) -> bool {
        self.name_explicit
    }

    fn same_shape(&self, other: &Self) -> bool {
        self.columns == other.columns && self.nulls_not_distinct == other.nulls_not_distinct
    }
}

impl TableEntity for ForeignKey {
    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn name_explicit(&self) -> bool {
        self.name_explicit
    }

    fn same_shape(&self, other: &Self) -> bool {
        self.columns == other.columns
            && self.schema_to == other.schema_to
            && self.table_to == other.table_to
            && self.columns_to == other.columns_to
            && self.on_update == other.on_update
            && self.on_delete == other.on_delete
    }
}

impl TableEntity for CheckConstraint {
    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }
}

impl TableEntity for Policy {
    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }
}

fn emit<E, FR, FC, FD>(
    plan: &mut Plan,
    resolved: ResolverOutput<E>,
    rename: FR,
    create: (Phase, FC),
    drop: (Phase, FD),
) where
    FR: Fn(&Rename<E>) -> JsonStatement,
    FC: Fn(E) -> JsonStatement,
    FD: Fn(E) -> JsonStatement,
{
    plan.extend(Phase::Renames, resolved.renamed_or_moved.iter().map(rename));
    plan.extend(create.0, resolved.created.into_iter().map(create.1));
    plan.extend(drop.0, resolved.deleted.into_iter().map(drop.1));
}

/// Move then rename, whichever of the two happened
fn relocate<E, M, N>(rename: &Rename<E>, moved: M, renamed: N) -> Vec<JsonStatement>
where
    E: Entity,
    M: Fn(String, String, String) -> JsonStatement,
    N: Fn(String, String, String) -> JsonStatement,
{
    let (from_schema, to_schema) = (
        rename.from.schema().unwrap_or_default(),
        rename.to.schema().unwrap_or_default(),
    );
    let (from_name, to_name) = (rename.from.name(), rename.to.name());

    let mut out = Vec::new();
    if from_schema != to_schema {
        out.push(moved(
            from_name.to_string(),
            from_schema.to_string(),
            to_schema.to_string(),
        ));
    }
    if from_name != to_name {
        out.push(renamed(
            to_schema.to_string(),
            from_name.to_string(),
            to_name.to_string(),
        ));
    }
    out
}

fn place<E: Placed>(col: &mut Collection<E>, rename: &Rename<E>) -> Result<(), DuplicateKeyError> {
    let (schema, name) = (rename.from.schema().unwrap_or_default(), rename.from.name());
    col.update(&KeyFilter::schema(schema).named(name), |e| {
        e.place(
            rename.to.schema().unwrap_or_default(),
            rename.to.name(),
        )
    })?;
    Ok(())
}

fn rename_schema(ddl: &mut PostgresDdl, from: &str, to: &str) -> Result<(), DuplicateKeyError> {
    let filter = KeyFilter::schema(from);
    let set = to.to_string();

    ddl.schemas
        .update(&KeyFilter::all().named(from), |s| s.name = set.clone())?;
    ddl.enums.update(&filter, |e| e.schema = set.clone())?;
    ddl.sequences.update(&filter, |e| e.schema = set.clone())?;
    ddl.tables.update(&filter, |e| e.schema = set.clone())?;
    ddl.views.update(&filter, |e| e.schema = set.clone())?;
    ddl.columns.update(&filter, |e| e.schema = set.clone())?;
    ddl.indexes.update(&filter, |e| e.schema = set.clone())?;
    ddl.pks.update(&filter, |e| e.schema = set.clone())?;
    ddl.uniques.update(&filter, |e| e.schema = set.clone())?;
    ddl.checks.update(&filter, |e| e.schema = set.clone())?;
    ddl.fks.update(&filter, |e| e.schema = set.clone())?;
    ddl.policies.update(&filter, |e| e.schema = set.clone())?;
    ddl.privileges.update(&filter, |e| e.schema = set.clone())?;

    ddl.columns.update_where(
        |c| c.type_schema.as_deref() == Some(from),
        |c| c.type_schema = Some(set.clone()),
    )?;
    ddl.fks
        .update_where(|f| f.schema_to == from, |f| f.schema_to = set.clone())?;
    Ok(())
}

fn rename_enum(ddl: &mut PostgresDdl, from: &Enum, to: &Enum) -> Result<(), DuplicateKeyError> {
    place(
        &mut ddl.enums,
        &Rename {
            from: from.clone(),
            to: to.clone(),
        },
    )?;
    ddl.columns.update_where(
        |c| {
            c.type_schema.as_deref() == Some(from.schema.as_str())
                && c.sql_type.trim_end_matches("[]") == from.name
        },
        |c| {
            let dims = &c.sql_type[c.sql_type.trim_end_matches("[]").len()..];
            c.sql_type = format!("{}{dims}", to.name);
            c.type_schema = Some(to.schema.clone());
        },
    )?;
    Ok(())
}

fn rename_role(ddl: &mut PostgresDdl, from: &str, to: &str) -> Result<(), DuplicateKeyError> {
    ddl.roles
        .update(&KeyFilter::all().named(from), |r| r.name = to.to_string())?;
    ddl.policies.update_where(
        |p| p.to.iter().any(|r| r == from),
        |p| {
            for role in p.to.iter_mut().filter(|r| r.as_str() == from) {
                *role = to.to_string();
            }
        },
    )?;
    ddl.privileges.update_where(
        |p| p.grantee == from || p.grantor == from,
        |p| {
            if p.grantee == from {
                p.grantee = to.to_string();
            }
            if p.grantor == from {
                p.grantor = to.to_string();
            }
        },
    )?;
    Ok(())
}

fn rename_table(ddl: &mut PostgresDdl, from: &Table, to: &Table) -> Result<(), DuplicateKeyError> {
    place(
        &mut ddl.tables,
        &Rename {
            from: from.clone(),
            to: to.clone(),
        },
    )?;

    let filter = KeyFilter::table(&from.schema, &from.name);
    let (schema, table) = (to.schema.clone(), to.name.clone());
    macro_rules! retable {
        ($($col:ident),*) => {
            $(ddl.$col.update(&filter, |e| {
                e.schema = schema.clone();
                e.table = table.clone();
            })?;)*
        };
    }
    retable!(columns, indexes, pks, uniques, checks, fks, policies, privileges);

    ddl.fks.update_where(
        |f| f.schema_to == from.schema && f.table_to == from.name,
        |f| {
            f.schema_to = schema.clone();
            f.table_to = table.clone();
        },
    )?;
    Ok(())
}

fn rename_column(
    ddl: &mut PostgresDdl,
    schema: &str,
    table: &str,
    from: &str,
    to: &str,
) -> Result<(), DuplicateKeyError> {
    let filter = KeyFilter::table(schema, table);
    let swap = |cols: &mut Vec<String>| {
        for col in cols.iter_mut().filter(|c| c.as_str() == from) {
            *col = to.to_string();
        }
    };

    ddl.columns
        .update(&filter.named(from), |c| c.name = to.to_string())?;
    ddl.pks.update(&filter, |pk| swap(&mut pk.columns))?;
    ddl.uniques.update(&filter, |u| swap(&mut u.columns))?;
    ddl.fks.update(&filter, |fk| swap(&mut fk.columns))?;
    ddl.fks.update_where(
        |fk| fk.schema_to == schema && fk.table_to == table,
        |fk| swap(&mut fk.columns_to),
    )?;
    ddl.indexes.update(&filter, |idx| {
        for col in idx.columns.iter_mut() {
            if !col.is_expression && col.value == from {
                col.value = to.to_string();
            }
        }
    })?;
    Ok(())
}

// =============================================================================
// Tables
// =============================================================================

/// Foreign keys between two dropped tables go before any `drop_table`
fn drop_fks_between_dropped(left: &PostgresDdl, dropped: &HashSet<TableRef>, plan: &mut Plan) {
    for fk in left.fks.sorted() {
        let source = (fk.schema.clone(), fk.table.clone());
        let target = (fk.schema_to.clone(), fk.table_to.clone());
        if !fk.is_self_reference() && dropped.contains(&source) && dropped.contains(&target) {
            plan.push(Phase::DropForeignKeys, JsonStatement::DropFk { fk: fk.clone() });
        }
    }
}

/// Emit `create_table` for every table only in `to`, referenced tables first
fn create_tables(left: &PostgresDdl, to: &PostgresDdl, plan: &mut Plan) {
    let created: Vec<&Table> = to
        .tables
        .sorted()
        .into_iter()
        .filter(|t| !left.tables.contains(&t.key()))
        .collect();
    let pending: HashSet<TableRef> = created.iter().map(|t| table_ref(t)).collect();

    let mut emitted: HashSet<TableRef> = HashSet::new();
    for table in order_by_fks(created, to) {
        let Some(mut full) = to.table_full(&table.schema, &table.name) else {
            continue;
        };
        let (inline, deferred): (Vec<_>, Vec<_>) = full.fks.drain(..).partition(|fk| {
            let target = (fk.schema_to.clone(), fk.table_to.clone());
            !fk.is_self_reference()
                && if pending.contains(&target) {
                    emitted.contains(&target) && !targets_unique_index(to, fk)
                } else {
                    existing_target_ready(left, to, fk)
                }
        });
        full.fks = inline;
        plan.extend(
            Phase::ForeignKeys,
            deferred.into_iter().map(|fk| JsonStatement::CreateFk { fk }),
        );

        let filter = KeyFilter::table(&table.schema, &table.name);
        plan.extend(
            Phase::Constraints,
            to.indexes
                .sorted()
                .into_iter()
                .filter(|i| filter.matches(*i))
                .map(|index| JsonStatement::CreateIndex { index: index.clone() }),
        );
        plan.extend(
            Phase::Security,
            to.policies
                .sorted()
                .into_iter()
                .filter(|p| filter.matches(*p))
                .map(|policy| JsonStatement::CreatePolicy { policy: policy.clone() }),
        );

        emitted.insert(table_ref(table));
        plan.push(Phase::CreateTables, JsonStatement::CreateTable { table: full });
    }
}

fn index_on(columns: &[IndexColumn], names: &[String]) -> bool {
    columns.len() == names.len()
        && columns
            .iter()
            .zip(names)
            .all(|(c, name)| !c.is_expression && &c.value == name)
}

/// A unique index only lands after every `create_table`
fn targets_unique_index(to: &PostgresDdl, fk: &ForeignKey) -> bool {
    let filter = KeyFilter::table(&fk.schema_to, &fk.table_to);
    let keyed = |columns: &[String]| columns == fk.columns_to.as_slice();
    let inline_key = to.pks.list(&filter).iter().any(|pk| keyed(&pk.columns))
        || to.uniques.list(&filter).iter().any(|u| keyed(&u.columns));
    !inline_key
        && to
            .indexes
            .list(&filter)
            .iter()
            .any(|i| i.is_unique && index_on(&i.columns, &fk.columns_to))
}

/// Columns and constraints are added after tables are created, so an fk
/// into an existing table is inline only when nothing it references is
/// added or altered by this diff
fn existing_target_ready(left: &PostgresDdl, to: &PostgresDdl, fk: &ForeignKey) -> bool {
    let filter = KeyFilter::table(&fk.schema_to, &fk.table_to);
    let keyed = |columns: &[String]| columns == fk.columns_to.as_slice();
    !(changed_here(&left.columns, &to.columns, &filter, |c| fk.columns_to.contains(&c.name))
        || changed_here(&left.pks, &to.pks, &filter, |pk| keyed(&pk.columns))
        || changed_here(&left.uniques, &to.uniques, &filter, |u| keyed(&u.columns))
        || changed_here(&left.indexes, &to.indexes, &filter, |i| {
            i.is_unique && index_on(&i.columns, &fk.columns_to)
        }))
}

/// Kahn's algorithm over foreign keys between the given tables.
///
/// Ties and cycles fall back to natural-key order.
fn order_by_fks<'a>(mut remaining: Vec<&'a Table>, ddl: &PostgresDdl) -> Vec<&'a Table> {
    let deps = |table: &Table| -> Vec<TableRef> {
        ddl.fks
            .list(&KeyFilter::table(&table.schema, &table.name))
            .into_iter()
            .filter(|fk| !fk.is_self_reference())
            .map(|fk| (fk.schema_to.clone(), fk.table_to.clone()))
            .collect()
    };

    let mut ordered: Vec<&Table> = Vec::with_capacity(remaining.len());
    while !remaining.is_empty() {
        let waiting: HashSet<TableRef> = remaining.iter().map(|t| table_ref(t)).collect();
        let pos = remaining
            .iter()
            .position(|t| deps(*t).iter().all(|d| !waiting.contains(d)))
            .unwrap_or(0);
        ordered.push(remaining.remove(pos));
    }
    ordered
}

// =============================================================================
// Alters
// =============================================================================

fn alter_common_tables(
    left: &PostgresDdl,
    to: &PostgresDdl,
    common: &[TableRef],
    mode: Mode,
    plan: &mut Plan,
) {
    for (schema, table) in common {
        let filter = KeyFilter::table(schema, table);

        let l = left.tables.one(&KeyFilter::schema(schema).named(table));
        let r = to.tables.one(&KeyFilter::schema(schema).named(table));
        if let (Some(l), Some(r)) = (l, r) {
            let table = r.clone();
            match (l.is_rls_enabled, r.is_rls_enabled) {
                (false, true) => plan.push(Phase::Security, JsonStatement::EnableRls { table }),
                (true, false) => plan.push(Phase::Security, JsonStatement::DisableRls { table }),
                _ => {}
            }
        }

        for (l, r) in on_table(&left.columns, &to.columns, &filter).both {
            if let Some(stmt) = alter_column(l, r, mode) {
                plan.push(Phase::Columns, stmt);
            }
        }

        for (l, r) in on_table(&left.indexes, &to.indexes, &filter).both {
            let changed = l.columns != r.columns
                || l.is_unique != r.is_unique
                || l.method != r.method
                || l.with != r.with
                || !expressions_commutative(l.r#where.as_deref(), r.r#where.as_deref(), mode);
            if changed {
                plan.push(Phase::DropConstraints, JsonStatement::DropIndex { index: l });
                plan.push(Phase::Constraints, JsonStatement::CreateIndex { index: r });
            }
        }

        for (l, r) in on_table(&left.pks, &to.pks, &filter).both {
            if !l.same_shape(&r) {
                plan.push(Phase::DropConstraints, JsonStatement::DropPk { pk: l });
                plan.push(Phase::Constraints, JsonStatement::AddPk { pk: r });
            }
        }

        for (l, r) in on_table(&left.uniques, &to.uniques, &filter).both {
            if !l.same_shape(&r) {
                plan.push(Phase::DropConstraints, JsonStatement::DropUnique { unique: l });
                plan.push(Phase::Constraints, JsonStatement::AddUnique { unique: r });
            }
        }

        for (l, r) in on_table(&left.checks, &to.checks, &filter).both {
            if !expressions_commutative(Some(&l.value), Some(&r.value), mode) {
                plan.push(Phase::DropConstraints, JsonStatement::DropCheck { check: l });
                plan.push(Phase::Constraints, JsonStatement::AddCheck { check: r });
            }
        }

        for (l, r) in on_table(&left.fks, &to.fks, &filter).both {
            if !l.same_shape(&r) {
                plan.push(Phase::DropForeignKeys, JsonStatement::DropFk { fk: l });
                plan.push(Phase::ForeignKeys, JsonStatement::CreateFk { fk: r });
            }
        }

        for (l, r) in on_table(&left.policies, &to.policies, &filter).both {
            if let Some(stmt) = alter_policy(l, r, mode) {
                plan.push(Phase::Security, stmt);
            }
        }
    }
}

fn alter_column(from: Column, to: Column, mode: Mode) -> Option<JsonStatement> {
    let generated_same = match (&from.generated, &to.generated) {
        (None, None) => true,
        (Some(l), Some(r)) => {
            l.generated_type == r.generated_type
                && expressions_commutative(Some(&l.expression), Some(&r.expression), mode)
        }
        _ => false,
    };
    if !generated_same {
        return Some(JsonStatement::RecreateColumn { column: to });
    }

    let mut changes = Vec::new();
    if !types_commutative(&from.sql_type, &to.sql_type, mode)
        || from.type_schema != to.type_schema
        || from.dimensions != to.dimensions
    {
        changes.push(ColumnChange::Type);
    }
    if from.not_null != to.not_null {
        changes.push(ColumnChange::NotNull);
    }
    if !defaults_commutative(from.default.as_deref(), to.default.as_deref(), &to.sql_type, mode) {
        changes.push(ColumnChange::Default);
    }
    if from.identity != to.identity {
        changes.push(ColumnChange::Identity);
    }

    if changes.is_empty() {
        return None;
    }
    Some(JsonStatement::AlterColumn {
        from: Box::new(from),
        to: Box::new(to),
        changes,
    })
}

fn alter_policy(from: Policy, to: Policy, mode: Mode) -> Option<JsonStatement> {
    if from.as_clause != to.as_clause || from.for_clause != to.for_clause {
        return Some(JsonStatement::RecreatePolicy { from, to });
    }
    let same = from.to == to.to
        && expressions_commutative(from.using.as_deref(), to.using.as_deref(), mode)
        && expressions_commutative(from.with_check.as_deref(), to.with_check.as_deref(), mode);
    (!same).then_some(JsonStatement::AlterPolicy { from, to })
}

fn alter_schema_objects(left: &PostgresDdl, to: &PostgresDdl, mode: Mode, plan: &mut Plan) {
    for (l, r) in diff_collections(&left.enums, &to.enums).both {
        match enum_additions(&l.values, &r.values) {
            Some(values) if values.is_empty() => {}
            Some(values) => plan.push(Phase::Types, JsonStatement::AlterEnum { to: r, values }),
            None => {
                let columns = to
                    .columns
                    .sorted()
                    .into_iter()
                    .filter(|c| {
                        c.type_schema.as_deref() == Some(r.schema.as_str())
                            && c.sql_type.trim_end_matches("[]") == r.name
                    })
                    .cloned()
                    .collect();
                plan.push(Phase::Columns, JsonStatement::RecreateEnum { to: r, columns });
            }
        }
    }

    for (_, r) in diff_collections(&left.sequences, &to.sequences).altered() {
        plan.push(Phase::Types, JsonStatement::AlterSequence { sequence: r.clone() });
    }

    for (_, r) in diff_collections(&left.roles, &to.roles).altered() {
        plan.push(Phase::Types, JsonStatement::AlterRole { role: r.clone() });
    }

    for (l, r) in diff_collections(&left.views, &to.views).both {
        if l.is_existing || r.is_existing {
            continue;
        }
        let recreate = l.materialized != r.materialized
            || l.using != r.using
            || l.tablespace != r.tablespace
            || !expressions_commutative(l.definition.as_deref(), r.definition.as_deref(), mode);
        if recreate {
            plan.push(Phase::Views, JsonStatement::RecreateView { from: l, to: r });
        } else if l.with != r.with {
            plan.push(Phase::Views, JsonStatement::AlterView { from: l, to: r });
        }
    }
}

/// Values added to an enum, each placed before the next value that already
/// existed. `None` when values were removed or reordered.
fn enum_additions(from: &[String], to: &[String]) -> Option<Vec<EnumValueAdd>> {
    let kept: Vec<&String> = to.iter().filter(|v| from.contains(v)).collect();
    if kept.len() != from.len() || kept.iter().zip(from).any(|(a, b)| *a != b) {
        return None;
    }

    let added = to
        .iter()
        .enumerate()
        .filter(|(_, v)| !from.contains(v))
        .map(|(i, v)| EnumValueAdd {
            value: v.clone(),
            before: to[i + 1..].iter().find(|n| from.contains(n)).cloned(),
        })
        .collect();
    Some(added)
}

fn diff_privileges(
    left: &PostgresDdl,
    to: &PostgresDdl,
    dropped: &HashSet<TableRef>,
    plan: &mut Plan,
) {
    let diff = diff_collections(&left.privileges, &to.privileges);
    let revoke = |privilege: Privilege| JsonStatement::RevokePrivilege { privilege };
    let grant = |privilege: Privilege| JsonStatement::GrantPrivilege { privilege };

    for privilege in diff.deleted {
        if !dropped.contains(&(privilege.schema.clone(), privilege.table.clone())) {
            plan.push(Phase::Security, revoke(privilege));
        }
    }
    for (l, r) in diff.both.into_iter().filter(|(l, r)| l != r) {
        plan.push(Phase::Security, revoke(l));
        plan.push(Phase::Security, grant(r));
    }
    plan.extend(Phase::Security, diff.created.into_iter().map(grant));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::Statement;
    use crate::postgres::ddl::{PostgresEntity, Schema};
    use crate::resolver::{CreateAll, KnownRenames};
    use crate::traits::EntityKind;

    fn table(name: &str) -> PostgresEntity {
        PostgresEntity::Table(Table {
            schema: "public".into(),
            name: name.into(),
            is_rls_enabled: false,
        })
    }

    fn column(table: &str, name: &str, sql_type: &str) -> Column {
        Column {
            schema: "public".into(),
            table: table.into(),
            name: name.into(),
            sql_type: sql_type.into(),
            type_schema: None,
            not_null: false,
            default: None,
            generated: None,
            identity: None,
            dimensions: 0,
        }
    }

    fn pk(table: &str, columns: &[&str]) -> PostgresEntity {
        PostgresEntity::PrimaryKey(PrimaryKey {
            schema: "public".into(),
            table: table.into(),
            name: format!("{table}_pkey"),
            name_explicit: false,
            columns: columns.iter().map(|c| c.to_string()).collect(),
        })
    }

    fn fk(table: &str, column: &str, target: &str) -> PostgresEntity {
        PostgresEntity::ForeignKey(ForeignKey {
            schema: "public".into(),
            table: table.into(),
            name: format!("{table}_{column}_{target}_id_fk"),
            name_explicit: false,
            columns: vec![column.into()],
            schema_to: "public".into(),
            table_to: target.into(),
            columns_to: vec!["id".into()],
            on_update: "NO ACTION".into(),
            on_delete: "NO ACTION".into(),
        })
    }

    fn ddl(entities: Vec<PostgresEntity>) -> PostgresDdl {
        PostgresDdl::from_entities(entities).unwrap()
    }

    fn users() -> Vec<PostgresEntity> {
        vec![
            table("users"),
            PostgresEntity::Column(column("users", "id", "integer")),
            PostgresEntity::Column(column("users", "name", "text")),
            pk("users", &["id"]),
        ]
    }

    async fn diff(from: &PostgresDdl, to: &PostgresDdl) -> DiffOutput<JsonStatement> {
        ddl_diff(from, to, &mut CreateAll, Mode::Default).await.unwrap()
    }

    #[tokio::test]
    async fn test_same_store_is_empty() {
        let store = ddl(users());
        assert!(diff(&store, &store).await.is_empty());
        let out = ddl_diff(&store, &store, &mut CreateAll, Mode::Push)
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_create_table_inlines_columns_and_pk() {
        let out = diff(&PostgresDdl::new(), &ddl(users())).await;
        assert_eq!(out.type_names(), ["create_table"]);
        let JsonStatement::CreateTable { table } = &out.statements[0] else {
            panic!("expected create_table");
        };
        assert_eq!(table.columns.len(), 2);
        assert_eq!(table.pk.as_ref().unwrap().columns, ["id"]);
    }

    #[tokio::test]
    async fn test_schema_created_before_its_tables() {
        let mut entities = users();
        entities.push(PostgresEntity::Schema(Schema { name: "auth".into() }));
        entities.push(PostgresEntity::Table(Table {
            schema: "auth".into(),
            name: "sessions".into(),
            is_rls_enabled: false,
        }));
        let out = diff(&PostgresDdl::new(), &ddl(entities)).await;
        assert_eq!(out.type_names()[0], "create_schema");
        assert!(out.type_names()[1..].iter().all(|t| *t == "create_table"));
    }

    #[tokio::test]
    async fn test_created_tables_follow_fks() {
        let mut entities = users();
        entities.push(table("posts"));
        entities.push(PostgresEntity::Column(column("posts", "id", "integer")));
        entities.push(PostgresEntity::Column(column("posts", "author_id", "integer")));
        entities.push(fk("posts", "author_id", "users"));
        // "accounts" sorts first but depends on posts
        entities.push(table("accounts"));
        entities.push(PostgresEntity::Column(column("accounts", "post_id", "integer")));
        entities.push(fk("accounts", "post_id", "posts"));

        let out = diff(&PostgresDdl::new(), &ddl(entities)).await;
        let order: Vec<&str> = out
            .statements
            .iter()
            .filter_map(|s| match s {
                JsonStatement::CreateTable { table } => Some(table.name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(order, ["users", "posts", "accounts"]);
        // every fk target existed already, nothing deferred
        assert!(!out.type_names().contains(&"create_fk"));
    }

    #[tokio::test]
    async fn test_self_reference_is_deferred() {
        let mut entities = users();
        entities.push(PostgresEntity::Column(column("users", "parent_id", "integer")));
        entities.push(fk("users", "parent_id", "users"));
        let out = diff(&PostgresDdl::new(), &ddl(entities)).await;
        assert_eq!(out.type_names(), ["create_table", "create_fk"]);
    }

    #[tokio::test]
    async fn test_fk_dropped_before_table() {
        let mut before = users();
        before.push(table("posts"));
        before.push(PostgresEntity::Column(column("posts", "author_id", "integer")));
        before.push(fk("posts", "author_id", "users"));
        let mut after = users();
        after.push(table("posts"));
        after.push(PostgresEntity::Column(column("posts", "author_id", "integer")));

        // drop users too: the fk must still go first
        let after: Vec<_> = after
            .into_iter()
            .filter(|e| match e {
                PostgresEntity::Table(t) => t.name != "users",
                PostgresEntity::Column(c) => c.table != "users",
                PostgresEntity::PrimaryKey(p) => p.table != "users",
                _ => true,
            })
            .collect();

        let out = diff(&ddl(before), &ddl(after)).await;
        assert_eq!(out.type_names(), ["drop_fk", "drop_table"]);
    }

    #[tokio::test]
    async fn test_column_rename_with_known_renames() {
        let before = ddl(users());
        let mut after = users();
        after[2] = PostgresEntity::Column(column("users", "full_name", "text"));
        let after = ddl(after);

        let mut resolver =
            KnownRenames::new().with(EntityKind::Column, "public.users.name", "public.users.full_name");
        let out = ddl_diff(&before, &after, &mut resolver, Mode::Default)
            .await
            .unwrap();
        assert_eq!(out.type_names(), ["rename_column"]);
        assert_eq!(
            out.meta.columns.get("public.users.name").map(String::as_str),
            Some("public.users.full_name")
        );

        let out = diff(&before, &after).await;
        assert_eq!(out.type_names(), ["drop_column", "add_column"]);
    }

    #[tokio::test]
    async fn test_table_rename_keeps_default_constraint_names() {
        let before = ddl(users());
        let after = ddl(vec![
            table("accounts"),
            PostgresEntity::Column(column("accounts", "id", "integer")),
            PostgresEntity::Column(column("accounts", "name", "text")),
            pk("accounts", &["id"]),
        ]);
        let mut resolver = KnownRenames::new().with(EntityKind::Table, "public.users", "public.accounts");
        let out = ddl_diff(&before, &after, &mut resolver, Mode::Default)
            .await
            .unwrap();
        assert_eq!(out.type_names(), ["rename_table"]);
        assert_eq!(out.statements[0].scope().table.as_deref(), Some("accounts"));
    }

    #[tokio::test]
    async fn test_fk_of_renamed_table_dropped_under_new_name() {
        let posts = |name: &str| {
            vec![
                table(name),
                PostgresEntity::Column(column(name, "id", "integer")),
                PostgresEntity::Column(column(name, "author_id", "integer")),
            ]
        };
        let mut before = users();
        before.extend(posts("posts"));
        before.push(fk("posts", "author_id", "users"));
        let mut after = users();
        after.extend(posts("articles"));

        let mut resolver = KnownRenames::new().with(EntityKind::Table, "public.posts", "public.articles");
        let out = ddl_diff(&ddl(before), &ddl(after), &mut resolver, Mode::Default)
            .await
            .unwrap();
        assert_eq!(out.type_names(), ["rename_table", "drop_fk"]);
        let JsonStatement::DropFk { fk } = &out.statements[1] else {
            panic!("expected drop_fk");
        };
        assert_eq!(fk.table, "articles");
    }

    #[tokio::test]
    async fn test_unique_of_renamed_table_dropped_under_new_name() {
        let unique = |table: &str| {
            PostgresEntity::UniqueConstraint(UniqueConstraint {
                schema: "public".into(),
                table: table.into(),
                name: "users_name_unique".into(),
                name_explicit: true,
                columns: vec!["name".into()],
                nulls_not_distinct: false,
            })
        };
        let mut before = users();
        before.push(unique("users"));
        let after = ddl(vec![
            table("accounts"),
            PostgresEntity::Column(column("accounts", "id", "integer")),
            PostgresEntity::Column(column("accounts", "name", "text")),
            pk("accounts", &["id"]),
        ]);

        let mut resolver = KnownRenames::new().with(EntityKind::Table, "public.users", "public.accounts");
        let out = ddl_diff(&ddl(before), &after, &mut resolver, Mode::Default)
            .await
            .unwrap();
        assert_eq!(out.type_names(), ["rename_table", "drop_unique"]);
        assert_eq!(out.statements[1].scope().table.as_deref(), Some("accounts"));
    }

    #[tokio::test]
    async fn test_fk_to_column_added_in_same_diff_is_deferred() {
        let mut after = users();
        after.push(PostgresEntity::Column(column("users", "code", "text")));
        after.push(PostgresEntity::UniqueConstraint(UniqueConstraint {
            schema: "public".into(),
            table: "users".into(),
            name: "users_code_unique".into(),
            name_explicit: false,
            columns: vec!["code".into()],
            nulls_not_distinct: false,
        }));
        after.push(table("posts"));
        after.push(PostgresEntity::Column(column("posts", "author_code", "text")));
        let PostgresEntity::ForeignKey(mut by_code) = fk("posts", "author_code", "users") else {
            unreachable!()
        };
        by_code.columns_to = vec!["code".into()];
        after.push(PostgresEntity::ForeignKey(by_code));

        let out = diff(&ddl(users()), &ddl(after)).await;
        let names = out.type_names();
        let JsonStatement::CreateTable { table } = &out.statements[0] else {
            panic!("expected create_table first, got {names:?}");
        };
        assert!(table.fks.is_empty());
        let position = |name: &str| names.iter().position(|t| *t == name).unwrap();
        assert!(position("add_column") < position("create_fk"));
        assert!(position("add_unique") < position("create_fk"));
    }

    #[tokio::test]
    async fn test_fk_to_untouched_existing_table_stays_inline() {
        let mut after = users();
        after.push(table("posts"));
        after.push(PostgresEntity::Column(column("posts", "author_id", "integer")));
        after.push(fk("posts", "author_id", "users"));

        let out = diff(&ddl(users()), &ddl(after)).await;
        assert_eq!(out.type_names(), ["create_table"]);
        let JsonStatement::CreateTable { table } = &out.statements[0] else {
            unreachable!()
        };
        assert_eq!(table.fks.len(), 1);
    }

    #[tokio::test]
    async fn test_alter_column_collects_changes() {
        let before = ddl(users());
        let mut after = users();
        let mut name = column("users", "name", "varchar(255)");
        name.not_null = true;
        after[2] = PostgresEntity::Column(name);
        let out = diff(&before, &ddl(after)).await;
        let [JsonStatement::AlterColumn { changes, .. }] = out.statements.as_slice() else {
            panic!("expected one alter_column, got {:?}", out.type_names());
        };
        assert_eq!(changes, &[ColumnChange::Type, ColumnChange::NotNull]);
    }

    #[tokio::test]
    async fn test_push_mode_ignores_commutative_spellings() {
        let mut before = users();
        let mut created = column("users", "created_at", "timestamp(6)");
        created.default = Some("now()".into());
        before.push(PostgresEntity::Column(created));
        let mut after = users();
        let mut created = column("users", "created_at", "timestamp");
        created.default = Some("CURRENT_TIMESTAMP".into());
        after.push(PostgresEntity::Column(created));

        let (before, after) = (ddl(before), ddl(after));
        let push = ddl_diff(&before, &after, &mut CreateAll, Mode::Push)
            .await
            .unwrap();
        assert!(push.is_empty());
        let default = diff(&before, &after).await;
        assert_eq!(default.type_names(), ["alter_column"]);
    }

    #[tokio::test]
    async fn test_enum_value_added_before_existing() {
        let mood = |values: &[&str]| {
            PostgresEntity::Enum(Enum {
                schema: "public".into(),
                name: "mood".into(),
                values: values.iter().map(|v| v.to_string()).collect(),
            })
        };
        let out = diff(&ddl(vec![mood(&["sad", "happy"])]), &ddl(vec![mood(&["sad", "ok", "happy"])])).await;
        let [JsonStatement::AlterEnum { values, .. }] = out.statements.as_slice() else {
            panic!("expected alter_enum, got {:?}", out.type_names());
        };
        assert_eq!(values[0].value, "ok");
        assert_eq!(values[0].before.as_deref(), Some("happy"));

        let out = diff(&ddl(vec![mood(&["sad", "happy"])]), &ddl(vec![mood(&["happy"])])).await;
        assert_eq!(out.type_names(), ["recreate_enum"]);
    }

    #[tokio::test]
    async fn test_index_change_is_drop_and_create() {
        let index = |unique: bool| {
            PostgresEntity::Index(Index {
                schema: "public".into(),
                table: "users".into(),
                name: "users_name_index".into(),
                name_explicit: false,
                columns: vec![IndexColumn::column("name")],
                is_unique: unique,
                r#where: None,
                method: "btree".into(),
                concurrently: false,
                with: None,
            })
        };
        let mut before = users();
        before.push(index(false));
        let mut after = users();
        after.push(index(true));
        let out = diff(&ddl(before), &ddl(after)).await;
        assert_eq!(out.type_names(), ["drop_index", "create_index"]);
    }

    #[tokio::test]
    async fn test_rls_toggle() {
        let before = ddl(users());
        let mut after = users();
        after[0] = PostgresEntity::Table(Table {
            schema: "public".into(),
            name: "users".into(),
            is_rls_enabled: true,
        });
        let out = diff(&before, &ddl(after)).await;
        assert_eq!(out.type_names(), ["enable_rls"]);
    }

    #[test]
    fn test_enum_additions() {
        let s = |v: &[&str]| v.iter().map(|x| x.to_string()).collect::<Vec<_>>();
        let added = enum_additions(&s(&["a", "b"]), &s(&["a", "b", "c"])).unwrap();
        assert_eq!(added[0].before, None);
        assert!(enum_additions(&s(&["a", "b"]), &s(&["b", "a"])).is_none());
        assert!(enum_additions(&s(&["a"]), &s(&["a"])).unwrap().is_empty());
    }
}
