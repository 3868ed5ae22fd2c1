//! Unified database dialect enum
//!
//! Every snapshot, journal and config file names one of these dialects. The
//! diff engine picks its entity model, grammar and hint probes from it.

/// SQL dialect a schema belongs to
///
/// # Examples
///
/// ```
/// use drift_types::Dialect;
///
/// let dialect = Dialect::DSQL;
/// assert!(dialect.is_postgres_family());
/// assert!(!Dialect::SQLite.is_postgres_family());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Dialect {
    /// SQLite and its forks
    ///
    /// Compatible with: rusqlite, libsql, turso, d1
    #[default]
    SQLite,

    /// PostgreSQL
    PostgreSQL,

    /// MySQL
    MySQL,

    /// Aurora DSQL, a PostgreSQL-compatible engine without enums, sequences,
    /// policies or foreign keys
    DSQL,
}

impl Dialect {
    /// Every dialect, in declaration order
    pub const ALL: [Dialect; 4] = [
        Dialect::SQLite,
        Dialect::PostgreSQL,
        Dialect::MySQL,
        Dialect::DSQL,
    ];

    /// Returns `true` for dialects that share the PostgreSQL entity model
    #[inline]
    #[must_use]
    pub const fn is_postgres_family(&self) -> bool {
        matches!(self, Dialect::PostgreSQL | Dialect::DSQL)
    }

    /// Returns `true` if the dialect namespaces tables by schema
    #[inline]
    #[must_use]
    pub const fn has_schemas(&self) -> bool {
        self.is_postgres_family()
    }

    /// Parse a dialect from a string (case-insensitive)
    ///
    /// Supports various common aliases:
    /// - SQLite: `"sqlite"`, `"turso"`, `"libsql"`, `"d1"`
    /// - PostgreSQL: `"postgresql"`, `"postgres"`, `"pg"`
    /// - MySQL: `"mysql"`
    /// - DSQL: `"dsql"`, `"aurora-dsql"`
    ///
    /// # Examples
    ///
    /// ```
    /// use drift_types::Dialect;
    ///
    /// assert_eq!(Dialect::parse("sqlite"), Some(Dialect::SQLite));
    /// assert_eq!(Dialect::parse("pg"), Some(Dialect::PostgreSQL));
    /// assert_eq!(Dialect::parse("dsql"), Some(Dialect::DSQL));
    /// assert_eq!(Dialect::parse("unknown"), None);
    /// ```
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("sqlite")
            || s.eq_ignore_ascii_case("turso")
            || s.eq_ignore_ascii_case("libsql")
            || s.eq_ignore_ascii_case("d1")
        {
            Some(Dialect::SQLite)
        } else if s.eq_ignore_ascii_case("postgresql")
            || s.eq_ignore_ascii_case("postgres")
            || s.eq_ignore_ascii_case("pg")
        {
            Some(Dialect::PostgreSQL)
        } else if s.eq_ignore_ascii_case("mysql") {
            Some(Dialect::MySQL)
        } else if s.eq_ignore_ascii_case("dsql") || s.eq_ignore_ascii_case("aurora-dsql") {
            Some(Dialect::DSQL)
        } else {
            None
        }
    }

    /// Get the dialect name as a lowercase string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Dialect::SQLite => "sqlite",
            Dialect::PostgreSQL => "postgresql",
            Dialect::MySQL => "mysql",
            Dialect::DSQL => "dsql",
        }
    }

    /// Quote an identifier the way the dialect expects
    #[must_use]
    pub const fn quote_char(&self) -> char {
        match self {
            Dialect::MySQL => '`',
            _ => '"',
        }
    }
}

impl core::fmt::Display for Dialect {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Dialect {
    type Err = DialectParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dialect::parse(s).ok_or(DialectParseError)
    }
}

/// Error returned when parsing an unknown dialect string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialectParseError;

impl core::fmt::Display for DialectParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("unknown dialect")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DialectParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_parse() {
        assert_eq!(Dialect::parse("sqlite"), Some(Dialect::SQLite));
        assert_eq!(Dialect::parse("SQLite"), Some(Dialect::SQLite));
        assert_eq!(Dialect::parse("turso"), Some(Dialect::SQLite));
        assert_eq!(Dialect::parse("d1"), Some(Dialect::SQLite));

        assert_eq!(Dialect::parse("postgres"), Some(Dialect::PostgreSQL));
        assert_eq!(Dialect::parse("PG"), Some(Dialect::PostgreSQL));

        assert_eq!(Dialect::parse("MySQL"), Some(Dialect::MySQL));
        assert_eq!(Dialect::parse("DSQL"), Some(Dialect::DSQL));

        assert_eq!(Dialect::parse("unknown"), None);
        assert_eq!(Dialect::parse(""), None);
    }

    #[test]
    fn test_postgres_family() {
        assert!(Dialect::PostgreSQL.is_postgres_family());
        assert!(Dialect::DSQL.is_postgres_family());
        assert!(!Dialect::MySQL.is_postgres_family());
        assert!(!Dialect::SQLite.has_schemas());
    }

    #[test]
    fn test_dialect_display() {
        assert_eq!(format!("{}", Dialect::SQLite), "sqlite");
        assert_eq!(format!("{}", Dialect::PostgreSQL), "postgresql");
        assert_eq!(format!("{}", Dialect::DSQL), "dsql");
        assert_eq!(Dialect::MySQL.quote_char(), '`');
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_dialect_serde() {
        let json = serde_json::to_string(&Dialect::DSQL).unwrap();
        assert_eq!(json, "\"dsql\"");
        let parsed: Dialect = serde_json::from_str("\"postgresql\"").unwrap();
        assert_eq!(parsed, Dialect::PostgreSQL);
    }
}
