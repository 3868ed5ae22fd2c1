//! Core traits for the entity store
//!
//! - `Entity` - DDL entities with a const KIND and a natural key
//! - `EntityKind` - Enum replacing string entity_type discrimination
//! - `EntityKey` - Natural key built from `{schema, table, name}`
//! - `Mode` - How permissive column comparisons are

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

// =============================================================================
// Entity System
// =============================================================================

/// Entity kind discriminator enum.
///
/// Uses `#[repr(u8)]` for efficient storage and comparison. The string form
/// matches the `entityType` tag in snapshot JSON.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum EntityKind {
    // Schema-level entities
    Schema = 0,
    Enum = 1,
    Sequence = 2,
    Role = 3,
    Privilege = 4,

    // Table-level entities
    Table = 10,
    Column = 11,
    Index = 12,
    ForeignKey = 13,
    PrimaryKey = 14,
    UniqueConstraint = 15,
    CheckConstraint = 16,

    // Other entities
    Policy = 20,
    View = 21,
}

impl EntityKind {
    /// Get the string representation for JSON serialization compatibility
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Schema => "schemas",
            Self::Enum => "enums",
            Self::Sequence => "sequences",
            Self::Role => "roles",
            Self::Privilege => "privileges",
            Self::Table => "tables",
            Self::Column => "columns",
            Self::Index => "indexes",
            Self::ForeignKey => "fks",
            Self::PrimaryKey => "pks",
            Self::UniqueConstraint => "uniques",
            Self::CheckConstraint => "checks",
            Self::Policy => "policies",
            Self::View => "views",
        }
    }

    /// Singular label used in prompts and log lines
    pub const fn label(self) -> &'static str {
        match self {
            Self::Schema => "schema",
            Self::Enum => "enum",
            Self::Sequence => "sequence",
            Self::Role => "role",
            Self::Privilege => "privilege",
            Self::Table => "table",
            Self::Column => "column",
            Self::Index => "index",
            Self::ForeignKey => "foreign key",
            Self::PrimaryKey => "primary key",
            Self::UniqueConstraint => "unique constraint",
            Self::CheckConstraint => "check constraint",
            Self::Policy => "policy",
            Self::View => "view",
        }
    }

    /// Parse from string (for deserialization)
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "schemas" => Some(Self::Schema),
            "enums" => Some(Self::Enum),
            "sequences" => Some(Self::Sequence),
            "roles" => Some(Self::Role),
            "privileges" => Some(Self::Privilege),
            "tables" => Some(Self::Table),
            "columns" => Some(Self::Column),
            "indexes" => Some(Self::Index),
            "fks" => Some(Self::ForeignKey),
            "pks" => Some(Self::PrimaryKey),
            "uniques" => Some(Self::UniqueConstraint),
            "checks" => Some(Self::CheckConstraint),
            "policies" => Some(Self::Policy),
            "views" => Some(Self::View),
            _ => None,
        }
    }
}

impl std::str::FromStr for EntityKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or(())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Entity key types for unique identification
///
/// Keys order lexicographically part by part, which is the deterministic
/// order every collection is sorted into before output.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKey {
    /// Simple name (e.g., table name, schema name)
    Simple(String),
    /// Two-part key (e.g., table.column)
    Composite2(String, String),
    /// Three-part key (e.g., schema.table.column for PostgreSQL)
    Composite3(String, String, String),
}

impl EntityKey {
    pub fn simple(name: impl Into<String>) -> Self {
        Self::Simple(name.into())
    }

    pub fn composite2(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self::Composite2(a.into(), b.into())
    }

    pub fn composite3(a: impl Into<String>, b: impl Into<String>, c: impl Into<String>) -> Self {
        Self::Composite3(a.into(), b.into(), c.into())
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple(a) => write!(f, "{a}"),
            Self::Composite2(a, b) => write!(f, "{a}.{b}"),
            Self::Composite3(a, b, c) => write!(f, "{a}.{b}.{c}"),
        }
    }
}

/// Partial-key filter used by [`Collection::list`](crate::collection::Collection::list)
/// and [`Collection::update`](crate::collection::Collection::update).
///
/// A `None` field matches anything.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyFilter<'a> {
    pub schema: Option<&'a str>,
    pub table: Option<&'a str>,
    pub name: Option<&'a str>,
}

impl<'a> KeyFilter<'a> {
    /// Matches everything
    pub const fn all() -> Self {
        Self {
            schema: None,
            table: None,
            name: None,
        }
    }

    pub const fn schema(schema: &'a str) -> Self {
        Self {
            schema: Some(schema),
            table: None,
            name: None,
        }
    }

    pub const fn table(schema: &'a str, table: &'a str) -> Self {
        Self {
            schema: Some(schema),
            table: Some(table),
            name: None,
        }
    }

    /// Table filter for dialects without schemas
    pub const fn on_table(table: &'a str) -> Self {
        Self {
            schema: None,
            table: Some(table),
            name: None,
        }
    }

    pub const fn named(mut self, name: &'a str) -> Self {
        self.name = Some(name);
        self
    }

    /// Check an entity against the filter
    pub fn matches<E: Entity>(&self, entity: &E) -> bool {
        fn field(want: Option<&str>, have: Option<&str>) -> bool {
            match want {
                None => true,
                Some(want) => have == Some(want),
            }
        }
        field(self.schema, entity.schema())
            && field(self.table, entity.table())
            && field(self.name, Some(entity.name()))
    }
}

/// Trait for DDL entities.
///
/// All DDL entity types (Table, Column, Index, etc.) implement this trait.
/// The `KIND` constant enables compile-time entity type discrimination.
/// Entities reference each other only through these natural-key parts.
pub trait Entity: Clone + PartialEq + fmt::Debug {
    /// The entity kind (discriminator)
    const KIND: EntityKind;

    /// Get the unique key for this entity
    fn key(&self) -> EntityKey;

    /// Schema the entity lives in, if the dialect has schemas
    fn schema(&self) -> Option<&str> {
        None
    }

    /// Owning table for table-level entities
    fn table(&self) -> Option<&str> {
        None
    }

    /// The entity's own name
    fn name(&self) -> &str;

    /// Get the parent entity key (if this entity belongs to a parent)
    fn parent_key(&self) -> Option<EntityKey> {
        None
    }

    /// Human readable, dot separated identifier
    fn identifier(&self) -> String {
        self.key().to_string()
    }
}

// =============================================================================
// Diff Types
// =============================================================================

/// Diff operation type
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffType {
    Create,
    Drop,
    Alter,
}

/// Comparison mode threaded through every grammar predicate.
///
/// `Push` compares a source schema against a live database, where
/// introspection reformats types and expressions, so it accepts more
/// spellings as equal than `Default`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Default,
    Push,
}

impl Mode {
    pub const fn is_push(self) -> bool {
        matches!(self, Mode::Push)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Col {
        table: String,
        name: String,
    }

    impl Entity for Col {
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

    #[test]
    fn test_entity_kind_str() {
        assert_eq!(EntityKind::Table.as_str(), "tables");
        assert_eq!(EntityKind::Column.as_str(), "columns");
        assert_eq!(EntityKind::ForeignKey.as_str(), "fks");
        assert_eq!(EntityKind::Privilege.label(), "privilege");
    }

    #[test]
    fn test_entity_kind_parse() {
        assert_eq!(EntityKind::from_str("tables"), Ok(EntityKind::Table));
        assert_eq!(EntityKind::from_str("privileges"), Ok(EntityKind::Privilege));
        assert_eq!(EntityKind::from_str("invalid"), Err(()));
    }

    #[test]
    fn test_entity_key_order_and_display() {
        let a = EntityKey::composite2("public", "a");
        let b = EntityKey::composite2("public", "b");
        assert!(a < b);
        assert_eq!(EntityKey::composite3("s", "t", "c").to_string(), "s.t.c");
    }

    #[test]
    fn test_key_filter_matches() {
        let col = Col {
            table: "users".into(),
            name: "id".into(),
        };
        assert!(KeyFilter::all().matches(&col));
        assert!(KeyFilter::all().named("id").matches(&col));
        assert!(!KeyFilter::all().named("email").matches(&col));
        // no schema on this entity, so a schema filter never matches
        assert!(!KeyFilter::schema("public").matches(&col));
        assert_eq!(col.identifier(), "users.id");
    }

    #[test]
    fn test_mode_default() {
        assert_eq!(Mode::default(), Mode::Default);
        assert!(Mode::Push.is_push());
    }
}
