//! Versioned snapshot files
//!
//! A snapshot is the serialized entity store of one migration step plus the
//! rename history (`_meta`) that produced it. Snapshots link to their
//! predecessor through `prevId`; the first one points at [`ORIGIN_UUID`].

use crate::error::SnapshotError;
use crate::traits::EntityKind;
use crate::version::{ORIGIN_UUID, is_supported_version, snapshot_version};
use drift_types::Dialect;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Rename history, old qualified name to new qualified name
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Meta {
    #[serde(default)]
    pub schemas: BTreeMap<String, String>,
    #[serde(default)]
    pub tables: BTreeMap<String, String>,
    #[serde(default)]
    pub columns: BTreeMap<String, String>,
}

impl Meta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a rename. Kinds other than schema, table and column are not
    /// tracked and are ignored.
    pub fn record(&mut self, kind: EntityKind, from: impl Into<String>, to: impl Into<String>) {
        let map = match kind {
            EntityKind::Schema => &mut self.schemas,
            EntityKind::Table => &mut self.tables,
            EntityKind::Column => &mut self.columns,
            _ => return,
        };
        map.insert(from.into(), to.into());
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty() && self.tables.is_empty() && self.columns.is_empty()
    }

    /// Fold a later step's renames into this history
    pub fn extend(&mut self, other: Meta) {
        self.schemas.extend(other.schemas);
        self.tables.extend(other.tables);
        self.columns.extend(other.columns);
    }
}

/// Just enough of a snapshot to validate it before parsing entities
#[derive(Deserialize)]
struct Header {
    version: String,
    dialect: Dialect,
}

/// Snapshot of one dialect's entity store
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot<E> {
    pub version: String,
    pub dialect: Dialect,
    pub id: String,
    pub prev_id: String,
    pub ddl: Vec<E>,
    #[serde(rename = "_meta", default)]
    pub meta: Meta,
}

impl<E> Snapshot<E>
where
    E: Serialize + DeserializeOwned,
{
    /// Create a snapshot with a fresh id
    pub fn new(dialect: Dialect, ddl: Vec<E>, prev_id: impl Into<String>, meta: Meta) -> Self {
        Self {
            version: snapshot_version(dialect).to_string(),
            dialect,
            id: uuid::Uuid::new_v4().to_string(),
            prev_id: prev_id.into(),
            ddl,
            meta,
        }
    }

    /// The empty schema every history starts from
    pub fn empty(dialect: Dialect) -> Self {
        Self {
            version: snapshot_version(dialect).to_string(),
            dialect,
            id: ORIGIN_UUID.to_string(),
            prev_id: ORIGIN_UUID.to_string(),
            ddl: Vec::new(),
            meta: Meta::default(),
        }
    }

    /// Next snapshot in the chain
    pub fn next(&self, ddl: Vec<E>, meta: Meta) -> Self {
        Self::new(self.dialect, ddl, self.id.clone(), meta)
    }

    /// Parse and validate a snapshot for `dialect`.
    ///
    /// Unknown or future versions and dialect mismatches are rejected before
    /// any entity is parsed.
    pub fn from_json(json: &str, dialect: Dialect) -> Result<Self, SnapshotError> {
        let header: Header = serde_json::from_str(json)?;
        if header.dialect != dialect {
            return Err(SnapshotError::DialectMismatch {
                expected: dialect,
                found: header.dialect,
            });
        }
        if !is_supported_version(dialect, &header.version) {
            return Err(SnapshotError::UnsupportedVersion {
                dialect,
                found: header.version,
                latest: snapshot_version(dialect),
            });
        }
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load snapshot from file
    pub fn load(path: &Path, dialect: Dialect) -> Result<Self, SnapshotError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents, dialect)
    }

    /// Save snapshot to file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let json = self.to_json()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.ddl.is_empty()
    }

    /// The empty snapshot a history starts from; never written to disk
    pub fn is_origin(&self) -> bool {
        self.id == ORIGIN_UUID
    }

    /// The first stored snapshot of a history, the direct successor of the
    /// origin
    pub fn is_first(&self) -> bool {
        self.prev_id == ORIGIN_UUID && !self.is_origin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    type ValueSnapshot = Snapshot<serde_json::Value>;

    #[test]
    fn test_empty_snapshot() {
        let snap = ValueSnapshot::empty(Dialect::PostgreSQL);
        assert!(snap.is_empty());
        assert!(snap.is_origin());
        assert!(!snap.is_first());
        assert_eq!(snap.version, "8");
    }

    #[test]
    fn test_next_links_prev_id() {
        let origin = ValueSnapshot::empty(Dialect::SQLite);
        let first = origin.next(vec![json!({"entityType": "tables", "name": "users"})], Meta::new());
        assert_eq!(first.prev_id, origin.id);
        assert_ne!(first.id, origin.id);
        assert!(first.is_first());
        assert!(!first.is_origin());

        let second = first.next(Vec::new(), Meta::new());
        assert_eq!(second.prev_id, first.id);
        assert!(!second.is_first());
    }

    #[test]
    fn test_meta_serializes_as_underscore_meta() {
        let mut meta = Meta::new();
        meta.record(EntityKind::Table, "public.users", "public.people");
        meta.record(EntityKind::Index, "ignored", "ignored");
        let snap = ValueSnapshot::new(Dialect::PostgreSQL, Vec::new(), ORIGIN_UUID, meta);

        let value: serde_json::Value = serde_json::from_str(&snap.to_json().unwrap()).unwrap();
        assert_eq!(value["_meta"]["tables"]["public.users"], "public.people");
        assert_eq!(value["prevId"], ORIGIN_UUID);
        assert!(value["_meta"]["columns"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_rejects_future_version() {
        let json = r#"{"version":"99","dialect":"postgresql","id":"x","prevId":"y","ddl":[]}"#;
        let err = ValueSnapshot::from_json(json, Dialect::PostgreSQL).unwrap_err();
        assert!(matches!(err, SnapshotError::UnsupportedVersion { .. }));
    }

    #[test]
    fn test_rejects_dialect_mismatch() {
        let json = r#"{"version":"7","dialect":"sqlite","id":"x","prevId":"y","ddl":[]}"#;
        let err = ValueSnapshot::from_json(json, Dialect::MySQL).unwrap_err();
        assert!(matches!(err, SnapshotError::DialectMismatch { .. }));
    }

    #[test]
    fn test_missing_meta_defaults() {
        let json = r#"{"version":"7","dialect":"sqlite","id":"x","prevId":"y","ddl":[]}"#;
        let snap = ValueSnapshot::from_json(json, Dialect::SQLite).unwrap();
        assert!(snap.meta.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/snapshot.json");
        let snap = ValueSnapshot::empty(Dialect::MySQL).next(Vec::new(), Meta::new());
        snap.save(&path).unwrap();

        let loaded = ValueSnapshot::load(&path, Dialect::MySQL).unwrap();
        assert_eq!(loaded, snap);
    }
}
