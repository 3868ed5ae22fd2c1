//! Schema diff for MySQL
//!
//! Same shape as the PostgreSQL diff without schemas, types or security.
//! MySQL can rename tables, columns, indexes and views; foreign keys and
//! checks are dropped and added again instead.

use super::collection::MySqlDdl;
use super::ddl::{CheckConstraint, Column, ForeignKey, Index, IndexColumn, Table};
use super::grammar::{
    collations_commutative, defaults_commutative, expressions_commutative, types_commutative,
};
use super::statements::JsonStatement;
use crate::collection::diff_collections;
use crate::drift_trace_rename;
use crate::error::{DiffError, DuplicateKeyError};
use crate::plan::{
    DiffOutput, StatementPlan, TableEntity, changed_here, on_table, resolve_kind,
    resolve_on_table,
};
use crate::resolver::{CreateAll, Rename, Resolver};
use crate::snapshot::Meta;
use crate::traits::{Entity, KeyFilter, Mode};
use std::collections::HashSet;

/// Statement phases, in execution order
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    DropViews,
    /// every later statement uses the new table name
    RenameTables,
    DropForeignKeys,
    /// indexes, checks, pks
    DropConstraints,
    DropTables,
    DropColumns,
    /// columns, indexes, views
    Renames,
    CreateTables,
    Columns,
    Constraints,
    ForeignKeys,
    Views,
}

type Plan = StatementPlan<Phase, JsonStatement>;

/// Compute the ordered statements that turn `from` into `to`.
///
/// Neither store is modified. A resolver abort returns
/// [`DiffError::Aborted`] and nothing else.
pub async fn ddl_diff<R: Resolver>(
    from: &MySqlDdl,
    to: &MySqlDdl,
    resolver: &mut R,
    mode: Mode,
) -> Result<DiffOutput<JsonStatement>, DiffError> {
    let mut left = from.clone();
    let mut plan = Plan::new();
    let mut meta = Meta::new();

    // tables
    let diff = diff_collections(&left.tables, &to.tables);
    let resolved = resolve_kind(resolver, diff.created, diff.deleted).await?;
    let dropped: HashSet<String> = resolved.deleted.iter().map(|t| t.name.clone()).collect();
    for table in &resolved.deleted {
        plan.push(Phase::DropTables, JsonStatement::DropTable { table: table.clone() });
    }
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
    drop_fks_between_dropped(&left, &dropped, &mut plan);

    let common: Vec<String> = to
        .tables
        .sorted()
        .into_iter()
        .filter(|t| left.tables.contains(&t.key()))
        .map(|t| t.name.clone())
        .collect();

    // columns, per table
    for table in &common {
        let filter = KeyFilter::on_table(table);
        let diff = on_table(&left.columns, &to.columns, &filter);
        let resolved = resolve_kind(resolver, diff.created, diff.deleted).await?;
        for rename in &resolved.renamed_or_moved {
            rename_column(&mut left, table, &rename.from.name, &rename.to.name)?;
            note_rename(&mut meta, rename);
            plan.push(
                Phase::Renames,
                JsonStatement::RenameColumn {
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

    // indexes and constraints, per table
    for table in &common {
        let filter = KeyFilter::on_table(table);
        let resolved = resolve_on_table(resolver, &mut left.indexes, &to.indexes, &filter).await?;
        plan.extend(
            Phase::Renames,
            resolved
                .renamed_or_moved
                .iter()
                .map(|r: &Rename<Index>| JsonStatement::RenameIndex {
                    table: table.clone(),
                    from: r.from.name.clone(),
                    to: r.to.name.clone(),
                }),
        );
        plan.extend(
            Phase::Constraints,
            resolved
                .created
                .into_iter()
                .map(|index| JsonStatement::CreateIndex { index }),
        );
        plan.extend(
            Phase::DropConstraints,
            resolved
                .deleted
                .into_iter()
                .map(|index| JsonStatement::DropIndex { index }),
        );

        let diff = on_table(&left.pks, &to.pks, &filter);
        plan.extend(
            Phase::Constraints,
            diff.created.into_iter().map(|pk| JsonStatement::CreatePk { pk }),
        );
        plan.extend(
            Phase::DropConstraints,
            diff.deleted.into_iter().map(|pk| JsonStatement::DropPk { pk }),
        );

        // no RENAME CONSTRAINT here; only default names are carried over
        let resolved = resolve_on_table(&mut CreateAll, &mut left.checks, &to.checks, &filter).await?;
        plan.extend(
            Phase::Constraints,
            resolved
                .created
                .into_iter()
                .map(|check| JsonStatement::AddCheck { check }),
        );
        plan.extend(
            Phase::DropConstraints,
            resolved
                .deleted
                .into_iter()
                .map(|check| JsonStatement::DropCheck { check }),
        );

        let resolved = resolve_on_table(&mut CreateAll, &mut left.fks, &to.fks, &filter).await?;
        plan.extend(
            Phase::ForeignKeys,
            resolved.created.into_iter().map(|fk| JsonStatement::CreateFk { fk }),
        );
        plan.extend(
            Phase::DropForeignKeys,
            resolved.deleted.into_iter().map(|fk| JsonStatement::DropFk { fk }),
        );
    }

    // views
    let diff = diff_collections(&left.views, &to.views);
    let resolved = resolve_kind(resolver, diff.created, diff.deleted).await?;
    for rename in &resolved.renamed_or_moved {
        left.views.update(&KeyFilter::all().named(&rename.from.name), |v| {
            v.name = rename.to.name.clone()
        })?;
        note_rename(&mut meta, rename);
        if !rename.to.is_existing {
            plan.push(
                Phase::Renames,
                JsonStatement::RenameView {
                    from: rename.from.name.clone(),
                    to: rename.to.name.clone(),
                },
            );
        }
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
        Phase::DropViews,
        resolved
            .deleted
            .into_iter()
            .filter(|v| !v.is_existing)
            .map(|view| JsonStatement::DropView { view }),
    );

    create_tables(&left, to, &mut plan);
    alter_common_tables(&left, to, &common, mode, &mut plan);
    alter_views(&left, to, mode, &mut plan);

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
            && self.using == other.using
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

    /// Generated `{table}_chk_{n}` names follow the table
    fn name_explicit(&self) -> bool {
        !self.name.starts_with(&format!("{}_chk_", self.table))
    }

    fn same_shape(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

fn rename_table(ddl: &mut MySqlDdl, from: &str, to: &str) -> Result<(), DuplicateKeyError> {
    ddl.tables
        .update(&KeyFilter::all().named(from), |t| t.name = to.to_string())?;

    let filter = KeyFilter::on_table(from);
    let table = to.to_string();
    macro_rules! retable {
        ($($col:ident),*) => {
            $(ddl.$col.update(&filter, |e| e.table = table.clone())?;)*
        };
    }
    retable!(columns, pks, indexes, checks, fks);

    ddl.fks
        .update_where(|f| f.table_to == from, |f| f.table_to = table.clone())?;
    Ok(())
}

fn rename_column(
    ddl: &mut MySqlDdl,
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
// Tables
// =============================================================================

fn drop_fks_between_dropped(left: &MySqlDdl, dropped: &HashSet<String>, plan: &mut Plan) {
    for fk in left.fks.sorted() {
        if !fk.is_self_reference() && dropped.contains(&fk.table) && dropped.contains(&fk.table_to)
        {
            plan.push(Phase::DropForeignKeys, JsonStatement::DropFk { fk: fk.clone() });
        }
    }
}

/// Emit `create_table` for every table only in `to`, referenced tables first
fn create_tables(left: &MySqlDdl, to: &MySqlDdl, plan: &mut Plan) {
    let created: Vec<&Table> = to
        .tables
        .sorted()
        .into_iter()
        .filter(|t| !left.tables.contains(&t.key()))
        .collect();
    let pending: HashSet<&str> = created.iter().map(|t| t.name.as_str()).collect();

    let mut emitted: HashSet<String> = HashSet::new();
    for table in order_by_fks(created, to) {
        let Some(mut full) = to.table_full(&table.name) else {
            continue;
        };
        let (inline, deferred): (Vec<_>, Vec<_>) = full.fks.drain(..).partition(|fk| {
            !fk.is_self_reference()
                && if pending.contains(fk.table_to.as_str()) {
                    emitted.contains(&fk.table_to) && !targets_index(to, fk)
                } else {
                    existing_target_ready(left, to, fk)
                }
        });
        full.fks = inline;
        plan.extend(
            Phase::ForeignKeys,
            deferred.into_iter().map(|fk| JsonStatement::CreateFk { fk }),
        );
        plan.extend(
            Phase::Constraints,
            to.indexes
                .list(&KeyFilter::on_table(&table.name))
                .into_iter()
                .map(|index| JsonStatement::CreateIndex { index: index.clone() }),
        );

        emitted.insert(table.name.clone());
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

/// Referenced by an index rather than the pk; indexes of a new table are
/// created after every `create_table`
fn targets_index(to: &MySqlDdl, fk: &ForeignKey) -> bool {
    let filter = KeyFilter::on_table(&fk.table_to);
    let by_pk = to.pks.list(&filter).iter().any(|pk| pk.columns == fk.columns_to);
    !by_pk
        && to
            .indexes
            .list(&filter)
            .iter()
            .any(|i| index_on(&i.columns, &fk.columns_to))
}

/// Columns, indexes and pks land after tables are created, so an fk into
/// an existing table is inline only when nothing it references is added or
/// altered by this diff
fn existing_target_ready(left: &MySqlDdl, to: &MySqlDdl, fk: &ForeignKey) -> bool {
    let filter = KeyFilter::on_table(&fk.table_to);
    !(changed_here(&left.columns, &to.columns, &filter, |c| fk.columns_to.contains(&c.name))
        || changed_here(&left.pks, &to.pks, &filter, |pk| pk.columns == fk.columns_to)
        || changed_here(&left.indexes, &to.indexes, &filter, |i| {
            index_on(&i.columns, &fk.columns_to)
        }))
}

/// Kahn's algorithm over foreign keys; cycles fall back to name order
fn order_by_fks<'a>(mut remaining: Vec<&'a Table>, ddl: &MySqlDdl) -> Vec<&'a Table> {
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

// =============================================================================
// Alters
// =============================================================================

fn alter_common_tables(
    left: &MySqlDdl,
    to: &MySqlDdl,
    common: &[String],
    mode: Mode,
    plan: &mut Plan,
) {
    for table in common {
        let filter = KeyFilter::on_table(table);

        for (l, r) in on_table(&left.columns, &to.columns, &filter).both {
            if let Some(stmt) = alter_column(l, r, mode) {
                plan.push(Phase::Columns, stmt);
            }
        }

        for (l, r) in on_table(&left.indexes, &to.indexes, &filter).both {
            if !l.same_shape(&r) {
                plan.push(Phase::DropConstraints, JsonStatement::DropIndex { index: l });
                plan.push(Phase::Constraints, JsonStatement::CreateIndex { index: r });
            }
        }

        for (l, r) in on_table(&left.pks, &to.pks, &filter).both {
            if l.columns != r.columns {
                plan.push(Phase::DropConstraints, JsonStatement::DropPk { pk: l });
                plan.push(Phase::Constraints, JsonStatement::CreatePk { pk: r });
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
        return Some(JsonStatement::RecreateColumn {
            from: Box::new(from),
            to: Box::new(to),
        });
    }

    let same = types_commutative(&from.sql_type, &to.sql_type, mode)
        && from.not_null == to.not_null
        && from.auto_increment == to.auto_increment
        && from.on_update_now == to.on_update_now
        && defaults_commutative(from.default.as_deref(), to.default.as_deref(), &to.sql_type, mode)
        && collations_commutative(
            (from.charset.as_deref(), from.collation.as_deref()),
            (to.charset.as_deref(), to.collation.as_deref()),
        );
    (!same).then(|| JsonStatement::AlterColumn {
        from: Box::new(from),
        to: Box::new(to),
    })
}

fn alter_views(left: &MySqlDdl, to: &MySqlDdl, mode: Mode, plan: &mut Plan) {
    for (l, r) in diff_collections(&left.views, &to.views).both {
        if l.is_existing || r.is_existing {
            continue;
        }
        let same = l.algorithm == r.algorithm
            && l.sql_security == r.sql_security
            && l.with_check_option == r.with_check_option
            && expressions_commutative(Some(&l.definition), Some(&r.definition), mode);
        if !same {
            plan.push(Phase::Views, JsonStatement::AlterView { from: l, to: r });
        }
    }
}
