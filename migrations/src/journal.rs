//! Journal types for tracking migrations
//!
//! The journal (_journal.json) lists every generated migration in order and
//! tells the generator which snapshot to diff against next.

use crate::error::JournalError;
use crate::version::{JOURNAL_VERSION, snapshot_version};
use drift_types::Dialect;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Migration journal - tracks all migrations
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Journal {
    /// Journal format version
    pub version: String,
    /// Database dialect
    pub dialect: Dialect,
    /// List of migration entries
    pub entries: Vec<JournalEntry>,
}

/// A single migration entry in the journal
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct JournalEntry {
    /// Migration index (0-based)
    pub idx: u32,
    /// Snapshot version used for this migration
    pub version: String,
    /// Unix timestamp in milliseconds when migration was created
    pub when: u64,
    /// Migration tag/name (e.g., "0000_initial_migration")
    pub tag: String,
    /// Whether SQL statement breakpoints are enabled
    pub breakpoints: bool,
}

impl JournalEntry {
    /// Where this entry's snapshot lives under the migrations folder
    pub fn snapshot_path(&self, out: &Path) -> PathBuf {
        out.join(&self.tag).join("snapshot.json")
    }

    /// Where this entry's SQL lives under the migrations folder
    pub fn sql_path(&self, out: &Path) -> PathBuf {
        out.join(&self.tag).join("migration.sql")
    }
}

impl Journal {
    /// Create a new journal for the given dialect
    pub fn new(dialect: Dialect) -> Self {
        Self {
            version: JOURNAL_VERSION.to_string(),
            dialect,
            entries: Vec::new(),
        }
    }

    /// Get the next migration index
    pub fn next_idx(&self) -> u32 {
        self.entries.len() as u32
    }

    /// Tag for the next migration, `0003_name`
    pub fn next_tag(&self, name: &str) -> String {
        format!("{:04}_{}", self.next_idx(), name)
    }

    /// The most recent entry, whose snapshot the next diff starts from
    pub fn latest(&self) -> Option<&JournalEntry> {
        self.entries.last()
    }

    /// Add a new entry to the journal
    pub fn add_entry(&mut self, tag: String, breakpoints: bool) -> &JournalEntry {
        let entry = JournalEntry {
            idx: self.next_idx(),
            version: snapshot_version(self.dialect).to_string(),
            when: current_timestamp_ms(),
            tag,
            breakpoints,
        };
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    /// Load journal from a JSON string
    pub fn from_json(json: &str) -> Result<Self, JournalError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize journal to JSON string
    pub fn to_json(&self) -> Result<String, JournalError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load journal from file
    pub fn load(path: &Path) -> Result<Self, JournalError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load journal from file, or create new if doesn't exist.
    ///
    /// An existing journal for another dialect is an error.
    pub fn load_or_create(path: &Path, dialect: Dialect) -> Result<Self, JournalError> {
        if !path.exists() {
            return Ok(Self::new(dialect));
        }
        let journal = Self::load(path)?;
        if journal.dialect != dialect {
            return Err(JournalError::DialectMismatch {
                expected: dialect,
                found: journal.dialect,
            });
        }
        Ok(journal)
    }

    /// Save journal to file
    pub fn save(&self, path: &Path) -> Result<(), JournalError> {
        let json = self.to_json()?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Get current timestamp in milliseconds
fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_journal() {
        let journal = Journal::new(Dialect::SQLite);
        assert_eq!(journal.version, "7");
        assert_eq!(journal.dialect, Dialect::SQLite);
        assert!(journal.entries.is_empty());
        assert!(journal.latest().is_none());
    }

    #[test]
    fn test_add_entry() {
        let mut journal = Journal::new(Dialect::PostgreSQL);
        let tag = journal.next_tag("initial");
        assert_eq!(tag, "0000_initial");
        journal.add_entry(tag, true);

        assert_eq!(journal.entries.len(), 1);
        assert_eq!(journal.entries[0].idx, 0);
        assert_eq!(journal.entries[0].version, "8");
        assert!(journal.entries[0].breakpoints);
        assert_eq!(journal.next_tag("users"), "0001_users");
        assert_eq!(journal.latest().unwrap().tag, "0000_initial");
    }

    #[test]
    fn test_journal_serialization() {
        let mut journal = Journal::new(Dialect::MySQL);
        journal.add_entry("0000_test".to_string(), false);

        let json = journal.to_json().unwrap();
        let parsed = Journal::from_json(&json).unwrap();
        assert_eq!(parsed, journal);
    }

    #[test]
    fn test_load_or_create_checks_dialect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta/_journal.json");

        let fresh = Journal::load_or_create(&path, Dialect::DSQL).unwrap();
        assert!(fresh.entries.is_empty());
        fresh.save(&path).unwrap();

        let err = Journal::load_or_create(&path, Dialect::SQLite).unwrap_err();
        assert!(matches!(err, JournalError::DialectMismatch { .. }));
        assert!(Journal::load_or_create(&path, Dialect::DSQL).is_ok());
    }

    #[test]
    fn test_entry_paths() {
        let mut journal = Journal::new(Dialect::SQLite);
        let entry = journal.add_entry("0000_init".into(), true).clone();
        let out = Path::new("drift");
        assert_eq!(
            entry.snapshot_path(out),
            Path::new("drift/0000_init/snapshot.json")
        );
        assert_eq!(entry.sql_path(out), Path::new("drift/0000_init/migration.sql"));
    }
}
