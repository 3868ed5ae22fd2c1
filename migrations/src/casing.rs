//! Column name casing applied while normalizing a source schema

use heck::{ToLowerCamelCase, ToSnakeCase};
use serde::{Deserialize, Serialize};

/// How source-schema column names map to database names
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Casing {
    /// Keep names as written
    #[default]
    #[serde(rename = "preserve")]
    #[value(name = "preserve")]
    Preserve,
    #[serde(rename = "snake_case")]
    #[value(name = "snake_case")]
    SnakeCase,
    #[serde(rename = "camelCase")]
    #[value(name = "camelCase")]
    CamelCase,
}

impl Casing {
    pub fn apply(self, name: &str) -> String {
        match self {
            Casing::Preserve => name.to_string(),
            Casing::SnakeCase => name.to_snake_case(),
            Casing::CamelCase => name.to_lower_camel_case(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_casing() {
        assert_eq!(Casing::Preserve.apply("createdAt"), "createdAt");
        assert_eq!(Casing::SnakeCase.apply("createdAt"), "created_at");
        assert_eq!(Casing::CamelCase.apply("created_at"), "createdAt");
    }

    #[test]
    fn test_casing_serde_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            c: Casing,
        }
        let w: Wrapper = toml::from_str("c = \"camelCase\"").unwrap();
        assert_eq!(w.c, Casing::CamelCase);
    }
}
