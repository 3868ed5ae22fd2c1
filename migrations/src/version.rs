//! Version constants for drift snapshots and journals
//!
//! Readers accept anything from the minimum to the current version of a
//! dialect's snapshot format.

use drift_types::Dialect;

/// The origin UUID used for the first snapshot's prev_id
pub const ORIGIN_UUID: &str = "00000000-0000-0000-0000-000000000000";

/// Journal version - used in _journal.json
pub const JOURNAL_VERSION: &str = "7";

/// SQLite/Turso/LibSQL snapshot version
pub const SQLITE_SNAPSHOT_VERSION: &str = "7";

/// PostgreSQL snapshot version
pub const POSTGRES_SNAPSHOT_VERSION: &str = "8";

/// MySQL snapshot version
pub const MYSQL_SNAPSHOT_VERSION: &str = "6";

/// DSQL snapshot version
pub const DSQL_SNAPSHOT_VERSION: &str = "1";

/// Get the current snapshot version for a dialect
pub fn snapshot_version(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::SQLite => SQLITE_SNAPSHOT_VERSION,
        Dialect::PostgreSQL => POSTGRES_SNAPSHOT_VERSION,
        Dialect::MySQL => MYSQL_SNAPSHOT_VERSION,
        Dialect::DSQL => DSQL_SNAPSHOT_VERSION,
    }
}

/// Oldest snapshot version whose entity layout this crate reads
pub fn min_snapshot_version(dialect: Dialect) -> &'static str {
    // The flat entity layout starts at the current version for every dialect
    snapshot_version(dialect)
}

/// Check if a snapshot version is the latest for a given dialect
pub fn is_latest_version(dialect: Dialect, version: &str) -> bool {
    version == snapshot_version(dialect)
}

/// Check if a snapshot version is supported (not older than the flat layout,
/// not newer than current)
pub fn is_supported_version(dialect: Dialect, version: &str) -> bool {
    let parse = |v: &str| v.parse::<u32>().ok();
    match (
        parse(version),
        parse(min_snapshot_version(dialect)),
        parse(snapshot_version(dialect)),
    ) {
        (Some(v), Some(min), Some(latest)) => (min..=latest).contains(&v),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_versions() {
        assert_eq!(snapshot_version(Dialect::SQLite), "7");
        assert_eq!(snapshot_version(Dialect::PostgreSQL), "8");
        assert_eq!(snapshot_version(Dialect::MySQL), "6");
        assert_eq!(snapshot_version(Dialect::DSQL), "1");
    }

    #[test]
    fn test_is_latest_version() {
        assert!(is_latest_version(Dialect::SQLite, "7"));
        assert!(!is_latest_version(Dialect::SQLite, "6"));
        assert!(is_latest_version(Dialect::PostgreSQL, "8"));
    }

    #[test]
    fn test_is_supported_version() {
        assert!(is_supported_version(Dialect::PostgreSQL, "8"));
        assert!(!is_supported_version(Dialect::PostgreSQL, "9")); // Too new
        assert!(!is_supported_version(Dialect::PostgreSQL, "7")); // Old layout
        assert!(!is_supported_version(Dialect::SQLite, "seven"));
    }
}
