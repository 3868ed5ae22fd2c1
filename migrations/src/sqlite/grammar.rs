//! SQLite type grammar and naming conventions
//!
//! SQLite only knows five storage classes, so the [`SqlType`] registry is
//! keyed on column affinity rather than on the declared type name.

use crate::postgres::grammar::{normalize_expression, strip_outer_parens};
use crate::traits::Mode;

// =============================================================================
// Naming Conventions
// =============================================================================

pub fn default_name_for_pk(table: &str) -> String {
    format!("{table}_pk")
}

pub fn default_name_for_fk(
    table: &str,
    columns: &[String],
    table_to: &str,
    columns_to: &[String],
) -> String {
    format!(
        "{}_{}_{}_{}_fk",
        table,
        columns.join("_"),
        table_to,
        columns_to.join("_")
    )
}

pub fn default_name_for_unique(table: &str, columns: &[String]) -> String {
    format!("{}_{}_unique", table, columns.join("_"))
}

pub fn default_name_for_index(table: &str, columns: &[String]) -> String {
    format!("{}_{}_idx", table, columns.join("_"))
}

pub fn default_name_for_check(table: &str, index: usize) -> String {
    format!("{table}_check_{index}")
}

// =============================================================================
// Type Canonicalization
// =============================================================================

/// Lower-cased, single-spaced, no spaces inside parameters
pub fn normalize_type(raw: &str) -> String {
    let collapsed = normalize_expression(&raw.to_ascii_lowercase());
    collapsed
        .replace("( ", "(")
        .replace(" )", ")")
        .replace(", ", ",")
        .replace(" (", "(")
}

/// Declared types compare case-insensitively in both modes
pub fn types_commutative(left: &str, right: &str, _mode: Mode) -> bool {
    normalize_type(left) == normalize_type(right)
}

/// Column affinity, in the order SQLite's own rules apply them
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Affinity {
    Integer,
    Text,
    Blob,
    Real,
    Numeric,
}

impl Affinity {
    /// `INT` wins over `CHAR`, which wins over `BLOB`, then `REAL`/`FLOA`/`DOUB`
    pub fn of(sql_type: &str) -> Self {
        let ty = sql_type.to_ascii_lowercase();
        if ty.contains("int") {
            Self::Integer
        } else if ty.contains("char") || ty.contains("clob") || ty.contains("text") {
            Self::Text
        } else if ty.contains("blob") || ty.trim().is_empty() {
            Self::Blob
        } else if ty.contains("real") || ty.contains("floa") || ty.contains("doub") {
            Self::Real
        } else {
            Self::Numeric
        }
    }
}

// =============================================================================
// SQL Type Registry
// =============================================================================

/// Descriptor for one affinity family
pub trait SqlType: Sync {
    fn name(&self) -> &'static str;

    fn is(&self, ty: &str) -> bool;

    /// Canonical default from `pragma_table_info.dflt_value`
    fn default_from_introspect(&self, raw: &str) -> String {
        strip_outer_parens(raw).to_string()
    }

    /// Canonical default from a source-schema value
    fn default_from_source(&self, value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::String(s) => quote_literal(s),
            serde_json::Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            serde_json::Value::Null => "NULL".to_string(),
            other => other.to_string(),
        }
    }
}

struct IntegerType;
struct RealType;
struct TextType;
struct BlobType;
struct NumericType;

impl SqlType for IntegerType {
    fn name(&self) -> &'static str {
        "integer"
    }

    fn is(&self, ty: &str) -> bool {
        Affinity::of(ty) == Affinity::Integer
    }

    /// Booleans are stored as `0`/`1`
    fn default_from_introspect(&self, raw: &str) -> String {
        match strip_outer_parens(raw).to_ascii_lowercase().as_str() {
            "true" => "1".to_string(),
            "false" => "0".to_string(),
            _ => strip_outer_parens(raw).to_string(),
        }
    }
}

impl SqlType for RealType {
    fn name(&self) -> &'static str {
        "real"
    }

    fn is(&self, ty: &str) -> bool {
        Affinity::of(ty) == Affinity::Real
    }
}

impl SqlType for TextType {
    fn name(&self) -> &'static str {
        "text"
    }

    fn is(&self, ty: &str) -> bool {
        Affinity::of(ty) == Affinity::Text
    }

    /// Objects and arrays are stored as JSON text
    fn default_from_source(&self, value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::String(s) => quote_literal(s),
            serde_json::Value::Null => "NULL".to_string(),
            other => quote_literal(&other.to_string()),
        }
    }
}

impl SqlType for BlobType {
    fn name(&self) -> &'static str {
        "blob"
    }

    fn is(&self, ty: &str) -> bool {
        Affinity::of(ty) == Affinity::Blob
    }

    /// `X'..'` literals compare without case
    fn default_from_introspect(&self, raw: &str) -> String {
        let raw = strip_outer_parens(raw);
        match raw.strip_prefix(['x', 'X']) {
            Some(hex) if hex.starts_with('\'') => format!("X{}", hex.to_ascii_uppercase()),
            _ => raw.to_string(),
        }
    }

    /// Strings become hex blob literals
    fn default_from_source(&self, value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::String(s) => {
                let hex: String = s.bytes().map(|b| format!("{b:02X}")).collect();
                format!("X'{hex}'")
            }
            serde_json::Value::Null => "NULL".to_string(),
            other => quote_literal(&other.to_string()),
        }
    }
}

impl SqlType for NumericType {
    fn name(&self) -> &'static str {
        "numeric"
    }

    fn is(&self, _ty: &str) -> bool {
        true
    }
}

static TYPES: &[&dyn SqlType] = &[
    &IntegerType,
    &TextType,
    &BlobType,
    &RealType,
    &NumericType,
];

pub fn type_for(raw: &str) -> &'static dyn SqlType {
    TYPES
        .iter()
        .copied()
        .find(|t| t.is(raw))
        .unwrap_or(&NumericType)
}

// =============================================================================
// Defaults and expressions
// =============================================================================

fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Whether two column defaults denote the same value for `sql_type`.
///
/// Push mode strips the parentheses `pragma_table_info` wraps expressions in.
pub fn defaults_commutative(
    left: Option<&str>,
    right: Option<&str>,
    sql_type: &str,
    mode: Mode,
) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(l), Some(r)) => {
            if l.trim() == r.trim() {
                return true;
            }
            if !mode.is_push() {
                return false;
            }
            let ty = type_for(sql_type);
            ty.default_from_introspect(l) == ty.default_from_introspect(r)
        }
        _ => false,
    }
}

/// Check, view and generated expressions compare with whitespace collapsed
pub fn expressions_commutative(left: Option<&str>, right: Option<&str>, mode: Mode) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(l), Some(r)) => {
            let (l, r) = if mode.is_push() {
                (strip_outer_parens(l), strip_outer_parens(r))
            } else {
                (l.trim(), r.trim())
            };
            normalize_expression(l) == normalize_expression(r)
        }
        _ => false,
    }
}

/// Canonical referential action, `NO ACTION` when unset
pub fn normalize_action(action: Option<&str>) -> String {
    match action {
        None => "NO ACTION".to_string(),
        Some(a) => normalize_expression(&a.to_ascii_uppercase()),
    }
}
