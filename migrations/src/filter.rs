//! Glob filters restricting which tables and schemas a diff sees
//!
//! Patterns follow `tablesFilter`/`schemaFilter` config semantics: plain
//! patterns include, `!`-prefixed patterns exclude, and an empty include
//! list includes everything.

use glob::Pattern;

/// Include/exclude globs for one name space
#[derive(Debug, Clone, Default)]
pub struct GlobSet {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl GlobSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, glob::PatternError> {
        let mut set = Self::default();
        for raw in patterns {
            let raw = raw.as_ref().trim();
            if let Some(negated) = raw.strip_prefix('!') {
                set.exclude.push(Pattern::new(negated)?);
            } else if !raw.is_empty() {
                set.include.push(Pattern::new(raw)?);
            }
        }
        Ok(set)
    }

    pub fn matches(&self, name: &str) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|p| p.matches(name));
        included && !self.exclude.iter().any(|p| p.matches(name))
    }
}

/// Table and schema filter handed to each dialect store's `filtered`
#[derive(Debug, Clone, Default)]
pub struct EntityFilter {
    pub tables: GlobSet,
    pub schemas: GlobSet,
}

impl EntityFilter {
    /// Accept everything
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new<S: AsRef<str>>(tables: &[S], schemas: &[S]) -> Result<Self, glob::PatternError> {
        Ok(Self {
            tables: GlobSet::new(tables)?,
            schemas: GlobSet::new(schemas)?,
        })
    }

    pub fn table(&self, name: &str) -> bool {
        self.tables.matches(name)
    }

    pub fn schema(&self, name: &str) -> bool {
        self.schemas.matches(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_matches_everything() {
        let filter = EntityFilter::all();
        assert!(filter.table("anything"));
        assert!(filter.schema("public"));
    }

    #[test]
    fn test_include_and_exclude() {
        let filter = EntityFilter::new(&["app_*", "!app_tmp_*"], &["!pg_*"]).unwrap();
        assert!(filter.table("app_users"));
        assert!(!filter.table("app_tmp_cache"));
        assert!(!filter.table("users"));
        assert!(filter.schema("public"));
        assert!(!filter.schema("pg_catalog"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(GlobSet::new(&["[unclosed"]).is_err());
    }
}
