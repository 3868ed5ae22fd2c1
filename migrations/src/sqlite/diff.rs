//! Schema diff for SQLite
//!
//! SQLite can rename tables and columns and add or drop plain columns.
//! Any other change to an existing table is a table rebuild, see
//! [`JsonStatement::RecreateTable`]. Automatic indexes backing unique and
//! primary key constraints are owned by their constraint and never diffed.

use super::collection::SqliteDdl;
use super::ddl::{
    CheckConstraint, Column, ForeignKey, GeneratedType, Index, IndexOrigin, PrimaryKey, Table,
    UniqueConstraint,
};
use super::grammar::{defaults_commutative, expressions_commutative, types_commutative};
use super::statements::JsonStatement;
use crate::collection::diff_collections;
use crate::drift_trace_rename;
use crate::error::{DiffError, DuplicateKeyError};
use crate::plan::{DiffOutput, StatementPlan, TableEntity, on_table, resolve_kind, resolve_on_table};
use crate::resolver::{CreateAll, Rename, Resolver};
use crate::snapshot::Meta;
use crate::traits::{Entity, EntityKey, KeyFilter, Mode};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Statement phases, in execution order
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    DropViews,
    /// every later statement uses the new table name
    RenameTables,
    DropIndexes,
    RenameColumns,
    CreateTables,
    Columns,
    Recreate,
    DropColumns,
    DropTables,
    Indexes,
    Views,
}

type Plan = StatementPlan<Phase, JsonStatement>;

/// Compute the ordered statements that turn `from` into `to`.
///
/// Neither store is modified. A resolver abort returns
/// [`DiffError::Aborted`] and nothing else.
pub async fn ddl_diff<R: Resolver>(
    from: &SqliteDdl,
    to: &SqliteDdl,
    resolver: &mut R,
    mode: Mode,
) -> Result<DiffOutput<JsonStatement>, DiffError> {
    let mut left = from.clone();
    let mut target = to.clone();
    left.indexes.retain(|i| i.origin == IndexOrigin::Manual);
    target.indexes.retain(|i| i.origin == IndexOrigin::Manual);
    let to = &target;

    let mut plan = Plan::new();
    let mut meta = Meta::new();

    // tables
    let diff = diff_collections(&left.tables, &to.tables);
    let resolved = resolve_kind(resolver, diff.created, diff.deleted).await?;
    plan.extend(
        Phase::DropTables,
        resolved
            .deleted
            .into_iter()
            .map(|table| JsonStatement::DropTable { table }),
    );
    for rename in &resolved.renamed_or_moved {
        rename_table(&mut left, &rename.from.name, &rename.to.name)?;
        note_rename(&mut meta, rename);
        plan.push(
            Phase::RenameTables,
            JsonStatement::RenameTable {
                from: rename.from.name.clone(),
                to: rename.to.name.clone(),
            },
        );
    }

    let common: Vec<String> = to
        .tables
        .sorted()
        .into_iter()
        .filter(|t| left.tables.contains(&t.key()))
        .map(|t| t.name.clone())
        .collect();

    // columns, per table
    let mut added: HashMap<String, Vec<Column>> = HashMap::new();
    let mut dropped: HashMap<String, Vec<Column>> = HashMap::new();
    for table in &common {
        let diff = on_table(&left.columns, &to.columns, &KeyFilter::on_table(table));
        let resolved = resolve_kind(resolver, diff.created, diff.deleted).await?;
        for rename in &resolved.renamed_or_moved {
            rename_column(&mut left, table, &rename.from.name, &rename.to.name)?;
            note_rename(&mut meta, rename);
            plan.push(
                Phase::RenameColumns,
                JsonStatement::RenameColumn {
                    table: table.clone(),
                    from: rename.from.name.clone(),
                    to: rename.to.name.clone(),
                },
            );
        }
        added.insert(table.clone(), resolved.created);
        dropped.insert(table.clone(), resolved.deleted);
    }

    // constraints decide which tables get rebuilt
    let mut recreate: BTreeSet<String> = BTreeSet::new();
    let mut column_fks: HashMap<(String, String), ForeignKey> = HashMap::new();
    for table in &common {
        let table_added = added.get(table).map(Vec::as_slice).unwrap_or_default();
        let (changed, carried) = constraints_changed(&mut left, to, table, table_added, mode).await?;
        if changed {
            recreate.insert(table.clone());
        }
        for fk in carried {
            column_fks.insert((fk.table.clone(), fk.columns[0].clone()), fk);
        }
        if shape_changed(&left, to, table, table_added, mode) {
            recreate.insert(table.clone());
        }
    }

    for table in &common {
        let filter = KeyFilter::on_table(table);

        if recreate.contains(table) {
            if let (Some(from), Some(to_full)) = (left.table_full(table), to.table_full(table)) {
                plan.push(
                    Phase::Recreate,
                    JsonStatement::RecreateTable {
                        from: Box::new(from),
                        to: Box::new(to_full),
                    },
                );
            }
            // the rebuild drops every index on the old table
            plan.extend(
                Phase::Indexes,
                to.indexes
                    .list(&filter)
                    .into_iter()
                    .map(|index| JsonStatement::CreateIndex { index: index.clone() }),
            );
            continue;
        }

        for column in added.remove(table).unwrap_or_default() {
            let fk = column_fks.remove(&(column.table.clone(), column.name.clone()));
            plan.push(Phase::Columns, JsonStatement::AddColumn { column, fk });
        }
        plan.extend(
            Phase::DropColumns,
            dropped
                .remove(table)
                .unwrap_or_default()
                .into_iter()
                .map(|column| JsonStatement::DropColumn { column }),
        );
        for (l, r) in on_table(&left.columns, &to.columns, &filter).both {
            if column_change(&l, &r, mode) == ColumnChange::Recreate {
                let fk = single_column_fk(to, &r).cloned();
                plan.push(Phase::Columns, JsonStatement::RecreateColumn { column: r, fk });
            }
        }

        // no RENAME INDEX; only default names are carried over
        let resolved = resolve_on_table(&mut CreateAll, &mut left.indexes, &to.indexes, &filter).await?;
        plan.extend(
            Phase::Indexes,
            resolved
                .created
                .into_iter()
                .map(|index| JsonStatement::CreateIndex { index }),
        );
        plan.extend(
            Phase::DropIndexes,
            resolved
                .deleted
                .into_iter()
                .map(|index| JsonStatement::DropIndex { index }),
        );
        for (l, r) in on_table(&left.indexes, &to.indexes, &filter).both {
            if !index_same(&l, &r, mode) {
                plan.push(Phase::DropIndexes, JsonStatement::DropIndex { index: l });
                plan.push(Phase::Indexes, JsonStatement::CreateIndex { index: r });
            }
        }
    }

    create_tables(&left, to, &mut plan);
    diff_views(&left, to, resolver, mode, &mut meta, &mut plan).await?;

    Ok(DiffOutput {
        statements: plan.into_statements(),
        meta,
    })
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

macro_rules! rename_only {
    ($ty:ty) => {
        impl TableEntity for $ty {
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
    };
}

rename_only!(PrimaryKey);
rename_only!(UniqueConstraint);

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
            && self.where_clause == other.where_clause
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

    /// Generated `{table}_check_{n}` names follow the table
    fn name_explicit(&self) -> bool {
        !self.name.starts_with(&format!("{}_check_", self.table))
    }

    fn same_shape(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

fn rename_table(ddl: &mut SqliteDdl, from: &str, to: &str) -> Result<(), DuplicateKeyError> {
    ddl.tables
        .update(&KeyFilter::all().named(from), |t| t.name = to.to_string())?;

    let filter = KeyFilter::on_table(from);
    let table = to.to_string();
    macro_rules! retable {
        ($($col:ident),*) => {
            $(ddl.$col.update(&filter, |e| e.table = table.clone())?;)*
        };
    }
    retable!(columns, pks, uniques, indexes, checks, fks);

    ddl.fks
        .update_where(|f| f.table_to == from, |f| f.table_to = table.clone())?;
    Ok(())
}

fn rename_column(
    ddl: &mut SqliteDdl,
    table: &str,
    from: &str,
    to: &str,
) -> Result<(), DuplicateKeyError> {
    let filter = KeyFilter::on_table(table);
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
    ddl.fks
        .update_where(|fk| fk.table_to == table, |fk| swap(&mut fk.columns_to))?;
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
// Rebuild detection
// =============================================================================

/// Whether any constraint on `table` changed.
///
/// A new single-column foreign key on a newly added column is returned
/// separately; it is written inline with `ADD COLUMN` and needs no rebuild.
async fn constraints_changed(
    left: &mut SqliteDdl,
    to: &SqliteDdl,
    table: &str,
    added: &[Column],
    mode: Mode,
) -> Result<(bool, Vec<ForeignKey>), DiffError> {
    let filter = KeyFilter::on_table(table);
    let mut changed = false;

    let pks = resolve_on_table(&mut CreateAll, &mut left.pks, &to.pks, &filter).await?;
    changed |= !pks.created.is_empty() || !pks.deleted.is_empty();
    changed |= on_table(&left.pks, &to.pks, &filter)
        .both
        .iter()
        .any(|(l, r)| l.columns != r.columns);

    let uniques = resolve_on_table(&mut CreateAll, &mut left.uniques, &to.uniques, &filter).await?;
    changed |= !uniques.created.is_empty() || !uniques.deleted.is_empty();
    changed |= on_table(&left.uniques, &to.uniques, &filter)
        .both
        .iter()
        .any(|(l, r)| l.columns != r.columns);

    let checks = resolve_on_table(&mut CreateAll, &mut left.checks, &to.checks, &filter).await?;
    changed |= !checks.created.is_empty() || !checks.deleted.is_empty();
    changed |= on_table(&left.checks, &to.checks, &filter)
        .both
        .iter()
        .any(|(l, r)| !expressions_commutative(Some(&l.value), Some(&r.value), mode));

    let fks = resolve_on_table(&mut CreateAll, &mut left.fks, &to.fks, &filter).await?;
    changed |= !fks.deleted.is_empty();
    changed |= on_table(&left.fks, &to.fks, &filter)
        .both
        .iter()
        .any(|(l, r)| !l.same_shape(r));

    let (carried, other): (Vec<_>, Vec<_>) = fks.created.into_iter().partition(|fk| {
        fk.columns.len() == 1 && added.iter().any(|c| c.name == fk.columns[0])
    });
    changed |= !other.is_empty();

    Ok((changed, carried))
}

/// Table options, altered columns and stored generated additions
fn shape_changed(left: &SqliteDdl, to: &SqliteDdl, table: &str, added: &[Column], mode: Mode) -> bool {
    let key = EntityKey::simple(table);
    let options_changed = match (left.tables.get(&key), to.tables.get(&key)) {
        (Some(l), Some(r)) => l.strict != r.strict || l.without_rowid != r.without_rowid,
        _ => false,
    };

    let stored_added = added.iter().any(|c| {
        c.generated
            .as_ref()
            .is_some_and(|g| g.gen_type == GeneratedType::Stored)
    });

    let column_altered = on_table(&left.columns, &to.columns, &KeyFilter::on_table(table))
        .both
        .iter()
        .any(|(l, r)| column_change(l, r, mode) == ColumnChange::Rebuild);

    options_changed || stored_added || column_altered
}

#[derive(Debug, PartialEq, Eq)]
enum ColumnChange {
    None,
    /// Drop and add the column again
    Recreate,
    /// Rebuild the whole table
    Rebuild,
}

fn column_change(from: &Column, to: &Column, mode: Mode) -> ColumnChange {
    let same_definition = types_commutative(&from.sql_type, &to.sql_type, mode)
        && from.not_null == to.not_null
        && from.autoincrement == to.autoincrement
        && defaults_commutative(from.default.as_deref(), to.default.as_deref(), &to.sql_type, mode);
    if !same_definition {
        return ColumnChange::Rebuild;
    }

    match (&from.generated, &to.generated) {
        (None, None) => ColumnChange::None,
        (Some(l), Some(r)) if l.gen_type == r.gen_type => {
            if expressions_commutative(Some(&l.expression), Some(&r.expression), mode) {
                ColumnChange::None
            } else if r.gen_type == GeneratedType::Virtual {
                ColumnChange::Recreate
            } else {
                ColumnChange::Rebuild
            }
        }
        _ => ColumnChange::Rebuild,
    }
}

fn single_column_fk<'a>(ddl: &'a SqliteDdl, column: &Column) -> Option<&'a ForeignKey> {
    ddl.fks
        .list(&KeyFilter::on_table(&column.table))
        .into_iter()
        .find(|fk| fk.columns.len() == 1 && fk.columns[0] == column.name)
}

fn index_same(from: &Index, to: &Index, mode: Mode) -> bool {
    from.columns == to.columns
        && from.is_unique == to.is_unique
        && expressions_commutative(from.where_clause.as_deref(), to.where_clause.as_deref(), mode)
}

// =============================================================================
// Tables and views
// =============================================================================

/// Emit `create_table` for every table only in `to`, referenced tables first.
///
/// Foreign keys are always inline; SQLite has no `ADD CONSTRAINT`.
fn create_tables(left: &SqliteDdl, to: &SqliteDdl, plan: &mut Plan) {
    let created: Vec<&Table> = to
        .tables
        .sorted()
        .into_iter()
        .filter(|t| !left.tables.contains(&t.key()))
        .collect();

    for table in order_by_fks(created, to) {
        let Some(full) = to.table_full(&table.name) else {
            continue;
        };
        plan.extend(
            Phase::Indexes,
            to.indexes
                .list(&KeyFilter::on_table(&table.name))
                .into_iter()
                .map(|index| JsonStatement::CreateIndex { index: index.clone() }),
        );
        plan.push(Phase::CreateTables, JsonStatement::CreateTable { table: full });
    }
}

/// Kahn's algorithm over foreign keys; cycles fall back to name order
fn order_by_fks<'a>(mut remaining: Vec<&'a Table>, ddl: &SqliteDdl) -> Vec<&'a Table> {
    let deps = |table: &Table| -> Vec<String> {
        ddl.fks
            .list(&KeyFilter::on_table(&table.name))
            .into_iter()
            .filter(|fk| !fk.is_self_reference())
            .map(|fk| fk.table_to.clone())
            .collect()
    };

    let mut ordered = Vec::with_capacity(remaining.len());
    while !remaining.is_empty() {
        let waiting: HashSet<&str> = remaining.iter().map(|t| t.name.as_str()).collect();
        let pos = remaining
            .iter()
            .position(|t| deps(t).iter().all(|d| !waiting.contains(d.as_str())))
            .unwrap_or(0);
        ordered.push(remaining.remove(pos));
    }
    ordered
}

/// Renamed or changed views are dropped and created again
async fn diff_views<R: Resolver>(
    left: &SqliteDdl,
    to: &SqliteDdl,
    resolver: &mut R,
    mode: Mode,
    meta: &mut Meta,
    plan: &mut Plan,
) -> Result<(), DiffError> {
    let diff = diff_collections(&left.views, &to.views);
    let resolved = resolve_kind(resolver, diff.created, diff.deleted).await?;

    let mut created = resolved.created;
    let mut deleted = resolved.deleted;
    for rename in resolved.renamed_or_moved {
        note_rename(meta, &rename);
        deleted.push(rename.from);
        created.push(rename.to);
    }
    for (l, r) in diff.both {
        if !expressions_commutative(l.definition.as_deref(), r.definition.as_deref(), mode) {
            deleted.push(l);
            created.push(r);
        }
    }

    plan.extend(
        Phase::DropViews,
        deleted
            .into_iter()
            .filter(|v| !v.is_existing)
            .map(|view| JsonStatement::DropView { view }),
    );
    plan.extend(
        Phase::Views,
        created
            .into_iter()
            .filter(|v| !v.is_existing)
            .map(|view| JsonStatement::CreateView { view }),
    );
    Ok(())
}
