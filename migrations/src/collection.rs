//! Generic entity collection for DDL storage
//!
//! This module provides a shared `Collection<E>` type that works with any
//! entity implementing the `Entity` trait. Every dialect store is a set of
//! these, one per entity kind.

use crate::error::DuplicateKeyError;
use crate::traits::{DiffType, Entity, EntityKey, EntityKind, KeyFilter};
use std::collections::HashMap;

// =============================================================================
// Generic Entity Collection
// =============================================================================

/// Generic collection for any DDL entity type.
///
/// Provides O(1) lookup via an internal index, along with filtered
/// `list`/`update` over partial keys. Keys are unique within a collection.
#[derive(Debug, Clone)]
pub struct Collection<E: Entity> {
    entities: Vec<E>,
    /// Index from entity key to position for fast lookups
    index: HashMap<EntityKey, usize>,
}

impl<E: Entity> Default for Collection<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> PartialEq for Collection<E> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .entities
                .iter()
                .all(|e| other.get(&e.key()).is_some_and(|o| o == e))
    }
}

impl<E: Entity> Collection<E> {
    /// Create an empty collection
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Push an entity, rejecting a duplicate key
    pub fn push(&mut self, entity: E) -> Result<(), DuplicateKeyError> {
        let key = entity.key();
        if self.index.contains_key(&key) {
            return Err(DuplicateKeyError { kind: E::KIND, key });
        }
        let idx = self.entities.len();
        self.entities.push(entity);
        self.index.insert(key, idx);
        Ok(())
    }

    /// Get an entity by its key
    pub fn get(&self, key: &EntityKey) -> Option<&E> {
        self.index.get(key).map(|&idx| &self.entities[idx])
    }

    /// Check if an entity with the given key exists
    pub fn contains(&self, key: &EntityKey) -> bool {
        self.index.contains_key(key)
    }

    /// Delete an entity by key, returns the removed entity if found
    pub fn delete(&mut self, key: &EntityKey) -> Option<E> {
        let idx = self.index.remove(key)?;
        // Order matters for output, so no swap_remove here
        let removed = self.entities.remove(idx);
        self.rebuild_index();
        Some(removed)
    }

    /// Delete every entity matching the filter, returns the removed entities
    pub fn delete_where(&mut self, filter: &KeyFilter<'_>) -> Vec<E> {
        let (removed, kept): (Vec<E>, Vec<E>) = std::mem::take(&mut self.entities)
            .into_iter()
            .partition(|e| filter.matches(e));
        self.entities = kept;
        self.rebuild_index();
        removed
    }

    /// Keep only the entities the predicate accepts
    pub fn retain<P>(&mut self, predicate: P)
    where
        P: FnMut(&E) -> bool,
    {
        self.entities.retain(predicate);
        self.rebuild_index();
    }

    /// All entities matching a partial-key filter, in insertion order.
    ///
    /// No match yields an empty list.
    pub fn list(&self, filter: &KeyFilter<'_>) -> Vec<&E> {
        self.entities.iter().filter(|e| filter.matches(*e)).collect()
    }

    /// First entity matching the filter
    pub fn one(&self, filter: &KeyFilter<'_>) -> Option<&E> {
        self.entities.iter().find(|e| filter.matches(*e))
    }

    /// Patch every entity matching the filter in place.
    ///
    /// Returns the number of patched entities. If the patch makes two keys
    /// collide nothing is changed and the collision is reported.
    pub fn update<F>(&mut self, filter: &KeyFilter<'_>, set: F) -> Result<usize, DuplicateKeyError>
    where
        F: FnMut(&mut E),
    {
        self.update_where(|e| filter.matches(e), set)
    }

    /// Patch every entity matching a predicate in place.
    ///
    /// Same collision rules as [`Collection::update`].
    pub fn update_where<P, F>(&mut self, predicate: P, mut set: F) -> Result<usize, DuplicateKeyError>
    where
        P: Fn(&E) -> bool,
        F: FnMut(&mut E),
    {
        let mut patched = self.entities.clone();
        let mut count = 0;
        for entity in patched.iter_mut().filter(|e| predicate(&**e)) {
            set(entity);
            count += 1;
        }
        if count == 0 {
            return Ok(0);
        }

        let mut index = HashMap::with_capacity(patched.len());
        for (idx, entity) in patched.iter().enumerate() {
            let key = entity.key();
            if index.insert(key.clone(), idx).is_some() {
                return Err(DuplicateKeyError { kind: E::KIND, key });
            }
        }
        self.entities = patched;
        self.index = index;
        Ok(count)
    }

    /// Stable sort by natural key
    pub fn sort(&mut self) {
        self.entities.sort_by_key(|e| e.key());
        self.rebuild_index();
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (idx, entity) in self.entities.iter().enumerate() {
            self.index.insert(entity.key(), idx);
        }
    }

    /// Check if collection is empty
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Get the count of entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Iterate over entities
    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.entities.iter()
    }

    /// Entities sorted by natural key, without touching the collection
    pub fn sorted(&self) -> Vec<&E> {
        let mut all: Vec<&E> = self.entities.iter().collect();
        all.sort_by_key(|e| e.key());
        all
    }

    /// Convert to Vec, consuming the collection
    pub fn into_vec(self) -> Vec<E> {
        self.entities
    }
}

impl<E: Entity> FromIterator<E> for Collection<E> {
    /// Later duplicates are dropped
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        let mut col = Collection::new();
        for entity in iter {
            let _ = col.push(entity);
        }
        col
    }
}

// =============================================================================
// Entity Diff
// =============================================================================

/// Key-set difference for one entity kind
#[derive(Debug, Clone)]
pub struct KindDiff<E: Entity> {
    /// Only in the right-hand collection
    pub created: Vec<E>,
    /// Only in the left-hand collection
    pub deleted: Vec<E>,
    /// Present on both sides, `(left, right)`
    pub both: Vec<(E, E)>,
}

impl<E: Entity> KindDiff<E> {
    pub fn kind(&self) -> EntityKind {
        E::KIND
    }

    /// Pairs whose attributes differ by plain equality
    pub fn altered(&self) -> impl Iterator<Item = &(E, E)> {
        self.both.iter().filter(|(l, r)| l != r)
    }

    /// Classify a key against this diff
    pub fn diff_type_of(&self, key: &EntityKey) -> Option<DiffType> {
        if self.created.iter().any(|e| &e.key() == key) {
            Some(DiffType::Create)
        } else if self.deleted.iter().any(|e| &e.key() == key) {
            Some(DiffType::Drop)
        } else if self.altered().any(|(l, _)| &l.key() == key) {
            Some(DiffType::Alter)
        } else {
            None
        }
    }
}

/// Compute the key-set diff between two collections of the same entity type.
///
/// All three lists come out sorted by natural key.
pub fn diff_collections<E: Entity>(left: &Collection<E>, right: &Collection<E>) -> KindDiff<E> {
    diff_filtered(left, right, &KeyFilter::all())
}

/// Same as [`diff_collections`], restricted to a partial key
pub fn diff_filtered<E: Entity>(
    left: &Collection<E>,
    right: &Collection<E>,
    filter: &KeyFilter<'_>,
) -> KindDiff<E> {
    let mut created = Vec::new();
    let mut deleted = Vec::new();
    let mut both = Vec::new();

    for entity in left.sorted().into_iter().filter(|e| filter.matches(*e)) {
        match right.get(&entity.key()) {
            Some(other) => both.push((entity.clone(), other.clone())),
            None => deleted.push(entity.clone()),
        }
    }
    for entity in right.sorted().into_iter().filter(|e| filter.matches(*e)) {
        if !left.contains(&entity.key()) {
            created.push(entity.clone());
        }
    }

    KindDiff {
        created,
        deleted,
        both,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test entity
    #[derive(Clone, Debug, PartialEq)]
    struct TestEntity {
        table: String,
        name: String,
        value: i32,
    }

    impl Entity for TestEntity {
        const KIND: EntityKind = EntityKind::Column;

        fn key(&self) -> EntityKey {
            EntityKey::composite2(&self.table, &self.name)
        }

        fn table(&self) -> Option<&str> {
            Some(&self.table)
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    fn entity(table: &str, name: &str, value: i32) -> TestEntity {
        TestEntity {
            table: table.into(),
            name: name.into(),
            value,
        }
    }

    #[test]
    fn test_collection_push_and_get() {
        let mut col: Collection<TestEntity> = Collection::new();
        col.push(entity("t", "foo", 1)).unwrap();

        // Duplicate should fail
        let err = col.push(entity("t", "foo", 2)).unwrap_err();
        assert_eq!(err.kind, EntityKind::Column);

        // Get should return original
        let got = col.get(&EntityKey::composite2("t", "foo")).unwrap();
        assert_eq!(got.value, 1);
    }

    #[test]
    fn test_collection_delete_keeps_order() {
        let mut col: Collection<TestEntity> = Collection::new();
        col.push(entity("t", "a", 1)).unwrap();
        col.push(entity("t", "b", 2)).unwrap();
        col.push(entity("t", "c", 3)).unwrap();

        let removed = col.delete(&EntityKey::composite2("t", "a")).unwrap();
        assert_eq!(removed.name, "a");
        assert_eq!(col.len(), 2);

        let names: Vec<_> = col.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);
        assert!(col.contains(&EntityKey::composite2("t", "c")));
    }

    #[test]
    fn test_list_filter() {
        let mut col: Collection<TestEntity> = Collection::new();
        col.push(entity("users", "id", 1)).unwrap();
        col.push(entity("posts", "id", 2)).unwrap();
        col.push(entity("users", "email", 3)).unwrap();

        let users = col.list(&KeyFilter::on_table("users"));
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].name, "id");
        assert_eq!(users[1].name, "email");

        assert!(col.list(&KeyFilter::on_table("missing")).is_empty());
        assert_eq!(col.one(&KeyFilter::on_table("posts")).unwrap().value, 2);
    }

    #[test]
    fn test_update_patches_and_reindexes() {
        let mut col: Collection<TestEntity> = Collection::new();
        col.push(entity("users", "id", 1)).unwrap();
        col.push(entity("users", "email", 2)).unwrap();

        let count = col
            .update(&KeyFilter::on_table("users"), |e| e.table = "people".into())
            .unwrap();
        assert_eq!(count, 2);
        assert!(col.contains(&EntityKey::composite2("people", "id")));
        assert!(!col.contains(&EntityKey::composite2("users", "id")));
    }

    #[test]
    fn test_update_rejects_collision() {
        let mut col: Collection<TestEntity> = Collection::new();
        col.push(entity("users", "id", 1)).unwrap();
        col.push(entity("users", "email", 2)).unwrap();

        let err = col
            .update(&KeyFilter::on_table("users").named("email"), |e| {
                e.name = "id".into()
            })
            .unwrap_err();
        assert_eq!(err.key, EntityKey::composite2("users", "id"));

        // untouched
        assert!(col.contains(&EntityKey::composite2("users", "email")));
        assert_eq!(col.len(), 2);
    }

    #[test]
    fn test_update_no_match() {
        let mut col: Collection<TestEntity> = Collection::new();
        col.push(entity("users", "id", 1)).unwrap();
        let count = col
            .update(&KeyFilter::on_table("nope"), |e| e.value = 9)
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_diff_collections() {
        let left: Collection<TestEntity> = [
            entity("t", "keep", 1),
            entity("t", "drop", 2),
            entity("t", "alter", 3),
        ]
        .into_iter()
        .collect();
        let right: Collection<TestEntity> = [
            entity("t", "keep", 1),
            entity("t", "create", 4),
            entity("t", "alter", 99),
        ]
        .into_iter()
        .collect();

        let diff = diff_collections(&left, &right);

        assert_eq!(diff.created.len(), 1);
        assert_eq!(diff.created[0].name, "create");
        assert_eq!(diff.deleted.len(), 1);
        assert_eq!(diff.deleted[0].name, "drop");
        assert_eq!(diff.both.len(), 2);

        let altered: Vec<_> = diff.altered().collect();
        assert_eq!(altered.len(), 1);
        assert_eq!(altered[0].0.value, 3);
        assert_eq!(altered[0].1.value, 99);
        assert_eq!(
            diff.diff_type_of(&EntityKey::composite2("t", "alter")),
            Some(DiffType::Alter)
        );
    }

    #[test]
    fn test_sort_is_by_key() {
        let mut col: Collection<TestEntity> =
            [entity("b", "x", 1), entity("a", "y", 2), entity("a", "x", 3)]
                .into_iter()
                .collect();
        col.sort();
        let keys: Vec<_> = col.iter().map(|e| e.identifier()).collect();
        assert_eq!(keys, vec!["a.x", "a.y", "b.x"]);
    }
}
