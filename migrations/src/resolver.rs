//! Rename resolution protocol
//!
//! When one entity kind has both created and deleted candidates in the same
//! scope, the diff engine cannot tell a rename from a drop plus create. It
//! asks a [`Resolver`], one kind and scope at a time, and awaits the answer
//! before moving on.

use crate::error::ResolveError;
use crate::snapshot::Meta;
use crate::traits::{Entity, EntityKind};
use std::collections::HashSet;
use std::future::Future;
use tokio::sync::{mpsc, oneshot};

/// Candidates offered to a resolver, sorted by natural key
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverInput<E> {
    pub created: Vec<E>,
    pub deleted: Vec<E>,
}

/// One entity that was renamed and/or moved to another schema
#[derive(Debug, Clone, PartialEq)]
pub struct Rename<E> {
    pub from: E,
    pub to: E,
}

/// A resolver's answer.
///
/// Every input entity appears exactly once: either still in `created` /
/// `deleted`, or inside one `renamed_or_moved` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverOutput<E> {
    pub created: Vec<E>,
    pub deleted: Vec<E>,
    pub renamed_or_moved: Vec<Rename<E>>,
}

impl<E: Entity> ResolverOutput<E> {
    /// Nothing renamed
    pub fn unchanged(input: ResolverInput<E>) -> Self {
        Self {
            created: input.created,
            deleted: input.deleted,
            renamed_or_moved: Vec::new(),
        }
    }

    /// Build an answer from `(deleted index, created index)` pairs
    pub fn from_pairs(
        input: ResolverInput<E>,
        pairs: &[(usize, usize)],
    ) -> Result<Self, ResolveError> {
        let mut used_deleted = HashSet::new();
        let mut used_created = HashSet::new();
        for &(d, c) in pairs {
            if d >= input.deleted.len() || c >= input.created.len() {
                return Err(ResolveError::Failed(format!(
                    "answer ({d}, {c}) is out of range"
                )));
            }
            if !used_deleted.insert(d) || !used_created.insert(c) {
                return Err(ResolveError::Failed(format!(
                    "answer ({d}, {c}) reuses a candidate"
                )));
            }
        }

        let renamed_or_moved = pairs
            .iter()
            .map(|&(d, c)| Rename {
                from: input.deleted[d].clone(),
                to: input.created[c].clone(),
            })
            .collect();
        let created = input
            .created
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !used_created.contains(i))
            .map(|(_, e)| e)
            .collect();
        let deleted = input
            .deleted
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !used_deleted.contains(i))
            .map(|(_, e)| e)
            .collect();

        Ok(Self {
            created,
            deleted,
            renamed_or_moved,
        })
    }
}

/// Decides which created/deleted pairs are really renames or moves.
///
/// Implementations may block on a terminal, a channel or nothing at all.
/// The engine never calls a resolver concurrently.
pub trait Resolver {
    fn resolve<E: Entity>(
        &mut self,
        input: ResolverInput<E>,
    ) -> impl Future<Output = Result<ResolverOutput<E>, ResolveError>>;
}

impl<R: Resolver> Resolver for &mut R {
    fn resolve<E: Entity>(
        &mut self,
        input: ResolverInput<E>,
    ) -> impl Future<Output = Result<ResolverOutput<E>, ResolveError>> {
        (**self).resolve(input)
    }
}

// =============================================================================
// Deterministic resolvers
// =============================================================================

/// Never renames: every candidate stays a create or a drop.
///
/// This is what push and CI runs use.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateAll;

impl Resolver for CreateAll {
    async fn resolve<E: Entity>(
        &mut self,
        input: ResolverInput<E>,
    ) -> Result<ResolverOutput<E>, ResolveError> {
        Ok(ResolverOutput::unchanged(input))
    }
}

/// A rename the caller already knows about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownRename {
    pub kind: EntityKind,
    /// Dot separated identifier before the rename
    pub from: String,
    /// Dot separated identifier after the rename
    pub to: String,
}

/// Resolves renames from a fixed list, e.g. replayed `_meta` history
#[derive(Debug, Clone, Default)]
pub struct KnownRenames {
    renames: Vec<KnownRename>,
}

impl KnownRenames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rename; builder style
    pub fn with(
        mut self,
        kind: EntityKind,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        self.renames.push(KnownRename {
            kind,
            from: from.into(),
            to: to.into(),
        });
        self
    }

    /// Replay the schema, table and column renames stored in a snapshot
    pub fn from_meta(meta: &Meta) -> Self {
        let mut out = Self::new();
        for (kind, map) in [
            (EntityKind::Schema, &meta.schemas),
            (EntityKind::Table, &meta.tables),
            (EntityKind::Column, &meta.columns),
        ] {
            for (from, to) in map {
                out = out.with(kind, from.clone(), to.clone());
            }
        }
        out
    }

    pub fn renames(&self) -> &[KnownRename] {
        &self.renames
    }
}

impl Resolver for KnownRenames {
    async fn resolve<E: Entity>(
        &mut self,
        input: ResolverInput<E>,
    ) -> Result<ResolverOutput<E>, ResolveError> {
        let mut pairs = Vec::new();
        let mut taken = HashSet::new();
        for (c, created) in input.created.iter().enumerate() {
            let to = created.identifier();
            let Some(known) = self
                .renames
                .iter()
                .find(|r| r.kind == E::KIND && r.to == to)
            else {
                continue;
            };
            let found = input
                .deleted
                .iter()
                .enumerate()
                .find(|(d, deleted)| !taken.contains(d) && deleted.identifier() == known.from);
            if let Some((d, _)) = found {
                taken.insert(d);
                pairs.push((d, c));
            }
        }
        ResolverOutput::from_pairs(input, &pairs)
    }
}

// =============================================================================
// Channel resolver
// =============================================================================

/// Answer sent back through a [`ResolveRequest`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveAnswer {
    /// `(deleted index, created index)` pairs that are renames
    Pairs(Vec<(usize, usize)>),
    Abort,
}

/// A question forwarded to whoever owns the receiving end
#[derive(Debug)]
pub struct ResolveRequest {
    pub kind: EntityKind,
    /// Identifiers of the created candidates
    pub created: Vec<String>,
    /// Identifiers of the deleted candidates
    pub deleted: Vec<String>,
    pub reply: oneshot::Sender<ResolveAnswer>,
}

/// Forwards each resolution over a tokio channel, so a UI task can answer
/// without the engine knowing about it.
#[derive(Debug, Clone)]
pub struct ChannelResolver {
    tx: mpsc::Sender<ResolveRequest>,
}

impl ChannelResolver {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<ResolveRequest>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

impl Resolver for ChannelResolver {
    async fn resolve<E: Entity>(
        &mut self,
        input: ResolverInput<E>,
    ) -> Result<ResolverOutput<E>, ResolveError> {
        let (reply, answer) = oneshot::channel();
        let request = ResolveRequest {
            kind: E::KIND,
            created: input.created.iter().map(E::identifier).collect(),
            deleted: input.deleted.iter().map(E::identifier).collect(),
            reply,
        };
        self.tx
            .send(request)
            .await
            .map_err(|_| ResolveError::Failed("resolver channel closed".into()))?;

        match answer.await {
            Ok(ResolveAnswer::Pairs(pairs)) => ResolverOutput::from_pairs(input, &pairs),
            Ok(ResolveAnswer::Abort) => Err(ResolveError::Aborted),
            Err(_) => Err(ResolveError::Failed("resolver dropped the request".into())),
        }
    }
}

// =============================================================================
// Interactive resolver
// =============================================================================

/// Terminal prompt resolver.
///
/// Walks the created candidates one at a time and offers "create" or a
/// rename from each deleted candidate still in the pool. A matched deletion
/// leaves the pool. Cancelling the prompt aborts the whole diff.
#[cfg(feature = "interactive")]
#[derive(Debug, Clone, Copy, Default)]
pub struct InteractiveResolver;

#[cfg(feature = "interactive")]
impl Resolver for InteractiveResolver {
    async fn resolve<E: Entity>(
        &mut self,
        input: ResolverInput<E>,
    ) -> Result<ResolverOutput<E>, ResolveError> {
        use colored::Colorize;
        use inquire::{InquireError, Select};

        let label = E::KIND.label();
        let mut pool: Vec<usize> = (0..input.deleted.len()).collect();
        let mut pairs = Vec::new();

        for (c, created) in input.created.iter().enumerate() {
            if pool.is_empty() {
                break;
            }
            let to = created.identifier();
            let mut options = vec![format!("{} {} {}", "+".green(), to, "create".dimmed())];
            for &d in &pool {
                let from = &input.deleted[d];
                let verb = if from.schema() != created.schema() && from.name() == created.name() {
                    "move"
                } else if from.schema() != created.schema() {
                    "rename and move"
                } else {
                    "rename"
                };
                options.push(format!(
                    "{} {} › {} {}",
                    "~".yellow(),
                    from.identifier(),
                    to,
                    verb.dimmed()
                ));
            }

            let message = format!("Is {label} `{}` created or renamed from another {label}?", to.bold());
            let choice = Select::new(&message, options)
                .raw_prompt()
                .map_err(|err| match err {
                    InquireError::OperationCanceled | InquireError::OperationInterrupted => {
                        ResolveError::Aborted
                    }
                    other => ResolveError::Failed(other.to_string()),
                })?;

            if choice.index > 0 {
                let d = pool.remove(choice.index - 1);
                pairs.push((d, c));
            }
        }

        ResolverOutput::from_pairs(input, &pairs)
    }
}
