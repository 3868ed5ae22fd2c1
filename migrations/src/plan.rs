//! Shared plumbing for every dialect's `ddl_diff`
//!
//! - [`resolve_kind`] consults a resolver and validates its answer
//! - [`resolve_on_table`] does the same for one table-level kind on one
//!   table, keeping default names that only changed with their table
//! - [`StatementPlan`] collects statements per phase and flattens them in
//!   phase order
//! - [`DiffOutput`] is what a diff hands back to the caller

use crate::collection::{Collection, KindDiff, diff_collections};
use crate::error::{DiffError, DuplicateKeyError};
use crate::group::{GroupedRow, Statement, group_diffs};
use crate::resolver::{Resolver, ResolverInput, ResolverOutput};
use crate::snapshot::Meta;
use crate::traits::{Entity, EntityKey, KeyFilter};
use crate::{drift_trace_phase, drift_trace_resolve};
use std::collections::HashSet;
use std::fmt::Debug;

/// Separator written between statements in a migration file
pub const BREAKPOINT: &str = "--> statement-breakpoint";

/// Ask the resolver about one kind in one scope.
///
/// The resolver is only consulted when there is at least one created and
/// one deleted candidate. Its answer must account for every candidate
/// exactly once.
pub async fn resolve_kind<E, R>(
    resolver: &mut R,
    created: Vec<E>,
    deleted: Vec<E>,
) -> Result<ResolverOutput<E>, DiffError>
where
    E: Entity,
    R: Resolver,
{
    let input = ResolverInput { created, deleted };
    if input.created.is_empty() || input.deleted.is_empty() {
        return Ok(ResolverOutput::unchanged(input));
    }

    drift_trace_resolve!(E::KIND, input.created.len(), input.deleted.len());
    let created_keys: Vec<EntityKey> = input.created.iter().map(E::key).collect();
    let deleted_keys: Vec<EntityKey> = input.deleted.iter().map(E::key).collect();

    let output = resolver
        .resolve(input)
        .await
        .map_err(|e| DiffError::from_resolve(E::KIND, e))?;

    validate(&created_keys, &deleted_keys, &output)?;
    Ok(output)
}

fn validate<E: Entity>(
    created: &[EntityKey],
    deleted: &[EntityKey],
    output: &ResolverOutput<E>,
) -> Result<(), DiffError> {
    let invalid = |reason: String| DiffError::InvalidResolution {
        kind: E::KIND,
        reason,
    };

    let check = |offered: &[EntityKey], returned: Vec<EntityKey>, side: &str| {
        let offered: HashSet<&EntityKey> = offered.iter().collect();
        let mut seen = HashSet::new();
        for key in &returned {
            if !offered.contains(key) {
                return Err(invalid(format!("{side} `{key}` was not offered")));
            }
            if !seen.insert(key.clone()) {
                return Err(invalid(format!("{side} `{key}` used twice")));
            }
        }
        if seen.len() != offered.len() {
            return Err(invalid(format!("not every {side} candidate was answered")));
        }
        Ok(())
    };

    check(
        created,
        output
            .created
            .iter()
            .map(E::key)
            .chain(output.renamed_or_moved.iter().map(|r| r.to.key()))
            .collect(),
        "created",
    )?;
    check(
        deleted,
        output
            .deleted
            .iter()
            .map(E::key)
            .chain(output.renamed_or_moved.iter().map(|r| r.from.key()))
            .collect(),
        "deleted",
    )
}

// =============================================================================
// Table-level resolution
// =============================================================================

/// Table-level entity resolved one table at a time
pub trait TableEntity: Entity {
    fn set_name(&mut self, name: &str);

    /// `false` when the name was filled in by the normalizer
    fn name_explicit(&self) -> bool {
        true
    }

    /// Equal in everything but the name
    fn same_shape(&self, _other: &Self) -> bool {
        false
    }
}

/// Key-set diff restricted to one table.
///
/// Index and constraint keys can be wider than the table, so both sides
/// are filtered first and a name reused on another table never pairs up.
pub fn on_table<E: Entity>(
    left: &Collection<E>,
    right: &Collection<E>,
    filter: &KeyFilter<'_>,
) -> KindDiff<E> {
    let l: Collection<E> = left.list(filter).into_iter().cloned().collect();
    let r: Collection<E> = right.list(filter).into_iter().cloned().collect();
    diff_collections(&l, &r)
}

/// Whether the diff creates or alters an entity on the filtered table that
/// `pick` selects. Compared after renames, so `left` must be the renamed
/// store.
pub fn changed_here<E: Entity>(
    left: &Collection<E>,
    right: &Collection<E>,
    filter: &KeyFilter<'_>,
    pick: impl Fn(&E) -> bool,
) -> bool {
    right
        .list(filter)
        .into_iter()
        .any(|e| pick(e) && left.get(&e.key()) != Some(e))
}

/// Resolve one table-level kind on one table and apply the renames to
/// `left`.
///
/// Default-named entities that only changed name are matched up first and
/// never reach the resolver; `left` takes the new name without a statement.
pub async fn resolve_on_table<E, R>(
    resolver: &mut R,
    left: &mut Collection<E>,
    right: &Collection<E>,
    filter: &KeyFilter<'_>,
) -> Result<ResolverOutput<E>, DiffError>
where
    E: TableEntity,
    R: Resolver,
{
    let diff = on_table(left, right, filter);
    let (created, deleted) = preserve_names(left, diff.created, diff.deleted)?;
    let resolved = resolve_kind(resolver, created, deleted).await?;
    for rename in &resolved.renamed_or_moved {
        left.update(&filter.named(rename.from.name()), |e| {
            e.set_name(rename.to.name())
        })?;
    }
    Ok(resolved)
}

fn preserve_names<E: TableEntity>(
    left: &mut Collection<E>,
    created: Vec<E>,
    mut deleted: Vec<E>,
) -> Result<(Vec<E>, Vec<E>), DuplicateKeyError> {
    let mut unmatched = Vec::new();
    for entity in created {
        let found = if entity.name_explicit() {
            None
        } else {
            deleted.iter().position(|d| d.same_shape(&entity))
        };
        match found {
            Some(pos) => {
                let old = deleted.remove(pos).key();
                left.update_where(|e| e.key() == old, |e| e.set_name(entity.name()))?;
            }
            None => unmatched.push(entity),
        }
    }
    Ok((unmatched, deleted))
}

/// Statements bucketed by phase
#[derive(Debug, Clone)]
pub struct StatementPlan<P, S> {
    items: Vec<(P, S)>,
}

impl<P, S> Default for StatementPlan<P, S> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<P: Ord + Copy + Debug, S> StatementPlan<P, S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, phase: P, statement: S) {
        self.items.push((phase, statement));
    }

    pub fn extend(&mut self, phase: P, statements: impl IntoIterator<Item = S>) {
        self.items
            .extend(statements.into_iter().map(|s| (phase, s)));
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Flatten in phase order; emission order is kept within a phase
    pub fn into_statements(mut self) -> Vec<S> {
        self.items.sort_by_key(|(phase, _)| *phase);

        let mut out = Vec::with_capacity(self.items.len());
        let mut current: Option<(P, usize)> = None;
        for (phase, statement) in self.items {
            match current.as_mut() {
                Some((p, count)) if *p == phase => *count += 1,
                _ => {
                    if let Some((_p, _count)) = current {
                        drift_trace_phase!(_p, _count);
                    }
                    current = Some((phase, 1));
                }
            }
            out.push(statement);
        }
        if let Some((_p, _count)) = current {
            drift_trace_phase!(_p, _count);
        }
        out
    }
}

/// Turns statements into SQL text. Dialect renderers live outside this crate.
pub trait SqlRenderer<S> {
    fn render(&self, statement: &S) -> Vec<String>;
}

/// Result of `ddl_diff`
#[derive(Debug, Clone, PartialEq)]
pub struct DiffOutput<S> {
    /// Ordered statement IR
    pub statements: Vec<S>,
    /// Renames applied during the diff, for the next snapshot's `_meta`
    pub meta: Meta,
}

impl<S> Default for DiffOutput<S> {
    fn default() -> Self {
        Self {
            statements: Vec::new(),
            meta: Meta::default(),
        }
    }
}

impl<S: Statement> DiffOutput<S> {
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Statements grouped by `{schema, table}` for the change summary
    pub fn grouped(&self) -> Vec<GroupedRow<'_, S>> {
        group_diffs(&self.statements)
    }

    /// Render every statement, in order
    pub fn sql_statements<R: SqlRenderer<S>>(&self, renderer: &R) -> Vec<String> {
        self.statements
            .iter()
            .flat_map(|s| renderer.render(s))
            .collect()
    }

    /// Migration file body
    pub fn to_migration_sql<R: SqlRenderer<S>>(&self, renderer: &R, breakpoints: bool) -> String {
        let separator = if breakpoints {
            format!("\n{BREAKPOINT}\n")
        } else {
            "\n".to_string()
        };
        self.sql_statements(renderer).join(&separator)
    }

    /// `type` tags of every statement, handy in tests and logs
    pub fn type_names(&self) -> Vec<&'static str> {
        self.statements.iter().map(S::type_name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolveError;
    use crate::resolver::{CreateAll, Rename};
    use crate::traits::EntityKind;

    #[derive(Clone, Debug, PartialEq)]
    struct Tbl(&'static str);

    impl Entity for Tbl {
        const KIND: EntityKind = EntityKind::Table;

        fn key(&self) -> EntityKey {
            EntityKey::simple(self.0)
        }

        fn name(&self) -> &str {
            self.0
        }
    }

    /// Renames the first deleted to the first created, then lies about the rest
    struct Liar;

    impl Resolver for Liar {
        async fn resolve<E: Entity>(
            &mut self,
            input: ResolverInput<E>,
        ) -> Result<ResolverOutput<E>, ResolveError> {
            Ok(ResolverOutput {
                created: input.created.clone(),
                deleted: Vec::new(),
                renamed_or_moved: vec![Rename {
                    from: input.deleted[0].clone(),
                    to: input.created[0].clone(),
                }],
            })
        }
    }

    struct Quitter;

    impl Resolver for Quitter {
        async fn resolve<E: Entity>(
            &mut self,
            _input: ResolverInput<E>,
        ) -> Result<ResolverOutput<E>, ResolveError> {
            Err(ResolveError::Aborted)
        }
    }

    #[tokio::test]
    async fn test_resolver_skipped_without_both_sides() {
        // Quitter would abort if it were asked
        let out = resolve_kind(&mut Quitter, vec![Tbl("a")], Vec::new())
            .await
            .unwrap();
        assert_eq!(out.created, vec![Tbl("a")]);
    }

    #[tokio::test]
    async fn test_abort_is_fatal() {
        let err = resolve_kind(&mut Quitter, vec![Tbl("a")], vec![Tbl("b")])
            .await
            .unwrap_err();
        assert_eq!(err, DiffError::Aborted);
    }

    #[tokio::test]
    async fn test_invalid_resolution_rejected() {
        let err = resolve_kind(&mut Liar, vec![Tbl("a")], vec![Tbl("b")])
            .await
            .unwrap_err();
        assert!(matches!(err, DiffError::InvalidResolution { .. }));
    }

    #[tokio::test]
    async fn test_create_all_passes_validation() {
        let out = resolve_kind(&mut CreateAll, vec![Tbl("a")], vec![Tbl("b")])
            .await
            .unwrap();
        assert!(out.renamed_or_moved.is_empty());
    }

    #[test]
    fn test_plan_orders_by_phase_and_keeps_emission_order() {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
        enum Phase {
            First,
            Second,
        }
        let mut plan = StatementPlan::new();
        plan.push(Phase::Second, "b1");
        plan.push(Phase::First, "a1");
        plan.push(Phase::Second, "b2");
        plan.extend(Phase::First, ["a2", "a3"]);
        assert_eq!(plan.len(), 5);
        assert_eq!(plan.into_statements(), vec!["a1", "a2", "a3", "b1", "b2"]);
    }
}
