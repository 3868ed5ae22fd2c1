//! Configuration types for drift.toml
//!
//! The file is read with `toml`, then CLI flags from [`DiffArgs`] are layered
//! on top. Everything the engine needs (dialect, casing, filters, push
//! confirmation policy) comes out of [`Config`].

use crate::casing::Casing;
use crate::filter::EntityFilter;
use drift_types::Dialect;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod cli;
pub mod error;

pub use cli::DiffArgs;
pub use error::ConfigError;

/// Main configuration struct for drift.toml
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Database dialect (sqlite, postgresql, mysql, dsql)
    pub dialect: Dialect,
    /// Output directory for migrations
    #[serde(default = "default_out")]
    pub out: PathBuf,
    /// Enable SQL statement breakpoints
    #[serde(default = "default_breakpoints")]
    pub breakpoints: bool,
    /// Column name casing for source schemas
    #[serde(default)]
    pub casing: Casing,
    #[serde(default)]
    pub tables_filter: Vec<String>,
    #[serde(default)]
    pub schema_filter: Vec<String>,
    /// Always ask before a push, even without lossy hints
    #[serde(default)]
    pub strict: bool,
    /// Skip confirmation of lossy pushes
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub verbose: bool,
}

fn default_out() -> PathBuf {
    PathBuf::from("./drift")
}

fn default_breakpoints() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            out: default_out(),
            breakpoints: default_breakpoints(),
            casing: Casing::default(),
            tables_filter: Vec::new(),
            schema_filter: Vec::new(),
            strict: false,
            force: false,
            verbose: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load the file named by `args.config` (when it exists) and overlay the flags
    pub fn load(args: &DiffArgs) -> Result<Self, ConfigError> {
        let base = if args.config.exists() {
            Self::from_file(&args.config)?
        } else {
            Self::default()
        };
        base.apply_args(args)
    }

    /// Overlay CLI flags; flags win over the file
    pub fn apply_args(mut self, args: &DiffArgs) -> Result<Self, ConfigError> {
        if let Some(dialect) = &args.dialect {
            self.dialect =
                Dialect::parse(dialect).ok_or_else(|| ConfigError::UnknownDialect(dialect.clone()))?;
        }
        if let Some(out) = &args.out {
            self.out = out.clone();
        }
        if let Some(casing) = args.casing {
            self.casing = casing;
        }
        if let Some(breakpoints) = args.breakpoints {
            self.breakpoints = breakpoints;
        }
        if !args.tables_filter.is_empty() {
            self.tables_filter = args.tables_filter.clone();
        }
        if !args.schema_filter.is_empty() {
            self.schema_filter = args.schema_filter.clone();
        }
        self.force |= args.force;
        self.strict |= args.strict;
        self.verbose |= args.verbose;
        Ok(self)
    }

    /// Compile the table and schema globs
    pub fn entity_filter(&self) -> Result<EntityFilter, ConfigError> {
        EntityFilter::new(&self.tables_filter, &self.schema_filter).map_err(|e| {
            let pattern = self
                .tables_filter
                .iter()
                .chain(&self.schema_filter)
                .find(|p| glob::Pattern::new(p.trim_start_matches('!')).is_err())
                .cloned()
                .unwrap_or_default();
            ConfigError::InvalidPattern {
                pattern,
                message: e.msg.to_string(),
            }
        })
    }

    /// Get the meta directory path
    pub fn meta_dir(&self) -> PathBuf {
        self.out.join("meta")
    }

    /// Get the journal file path
    pub fn journal_path(&self) -> PathBuf {
        self.meta_dir().join("_journal.json")
    }

    /// Whether a push must ask before running
    pub fn confirm_push(&self, lossy: bool) -> bool {
        if self.force {
            return false;
        }
        self.strict || lossy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
dialect = "postgresql"
out = "./migrations"
breakpoints = false
casing = "snake_case"
tablesFilter = ["app_*", "!app_tmp"]
schemaFilter = ["public"]
"#;

        let config = Config::parse(toml).unwrap();
        assert_eq!(config.dialect, Dialect::PostgreSQL);
        assert_eq!(config.out, PathBuf::from("./migrations"));
        assert!(!config.breakpoints);
        assert_eq!(config.casing, Casing::SnakeCase);

        let filter = config.entity_filter().unwrap();
        assert!(filter.table("app_users"));
        assert!(!filter.table("app_tmp"));
        assert!(!filter.schema("auth"));
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.dialect, Dialect::SQLite);
        assert_eq!(config.out, PathBuf::from("./drift"));
        assert!(config.breakpoints);
        assert_eq!(config.journal_path(), PathBuf::from("./drift/meta/_journal.json"));
    }

    #[test]
    fn test_args_override_file() {
        let config = Config::parse("dialect = \"sqlite\"").unwrap();
        let args = DiffArgs {
            dialect: Some("dsql".into()),
            force: true,
            ..DiffArgs::default()
        };
        let config = config.apply_args(&args).unwrap();
        assert_eq!(config.dialect, Dialect::DSQL);
        assert!(!config.confirm_push(true));
    }

    #[test]
    fn test_unknown_dialect_flag() {
        let args = DiffArgs {
            dialect: Some("oracle".into()),
            ..DiffArgs::default()
        };
        let err = Config::default().apply_args(&args).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownDialect(_)));
    }

    #[test]
    fn test_strict_always_confirms() {
        let config = Config {
            strict: true,
            ..Config::default()
        };
        assert!(config.confirm_push(false));
        assert!(!Config::default().confirm_push(false));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drift.toml");
        std::fs::write(&path, "dialect = \"mysql\"\nverbose = true\n").unwrap();

        let args = DiffArgs {
            config: path,
            ..DiffArgs::default()
        };
        let config = Config::load(&args).unwrap();
        assert_eq!(config.dialect, Dialect::MySQL);
        assert!(config.verbose);
    }
}
