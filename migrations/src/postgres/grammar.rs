//! PostgreSQL SQL type grammar and naming conventions
//!
//! Type canonicalization, the [`SqlType`] registry and the mode-aware
//! commutativity predicates the diff uses to decide whether two spellings
//! denote the same column.

use crate::traits::Mode;
use regex::Regex;
use std::sync::LazyLock;

// =============================================================================
// Naming Conventions
// =============================================================================

/// PostgreSQL identifier max length
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Generate default name for a primary key constraint
pub fn default_name_for_pk(table: &str) -> String {
    format!("{}_pkey", table)
}

/// Generate default name for a foreign key constraint
pub fn default_name_for_fk(
    table: &str,
    columns: &[String],
    table_to: &str,
    columns_to: &[String],
) -> String {
    let desired = format!(
        "{}_{}_{}_{}_fkey",
        table,
        columns.join("_"),
        table_to,
        columns_to.join("_")
    );

    if desired.len() > MAX_IDENTIFIER_LEN {
        let hash = hash_string(&desired);
        if table.len() < MAX_IDENTIFIER_LEN - 18 {
            format!("{}_{}_fkey", table, hash)
        } else {
            format!("{}_fkey", hash)
        }
    } else {
        desired
    }
}

/// Generate default name for a unique constraint
pub fn default_name_for_unique(table: &str, columns: &[String]) -> String {
    format!("{}_{}_key", table, columns.join("_"))
}

/// Generate default name for an index
pub fn default_name_for_index(table: &str, columns: &[String]) -> String {
    format!("{}_{}_idx", table, columns.join("_"))
}

/// Generate default name for an identity sequence
pub fn default_name_for_identity_sequence(table: &str, column: &str) -> String {
    format!("{}_{}_seq", table, column)
}

/// Generate default name for a check constraint
pub fn default_name_for_check(table: &str, index: usize) -> String {
    format!("{}_check_{}", table, index)
}

/// Stable 12 hex digit digest for over-long constraint names
pub(crate) fn hash_string(s: &str) -> String {
    // FNV-1a, so names do not depend on the std hasher
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in s.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    format!("{:016x}", hash)[..12].to_string()
}

// =============================================================================
// Type Canonicalization
// =============================================================================

fn canonical_alias(name: &str) -> &str {
    match name {
        "int" | "int4" => "integer",
        "int2" => "smallint",
        "int8" => "bigint",
        "float4" => "real",
        "float8" | "double" => "double precision",
        "bool" => "boolean",
        "character varying" => "varchar",
        "character" | "bpchar" => "char",
        "decimal" => "numeric",
        "timestamp without time zone" => "timestamp",
        "timestamptz" => "timestamp with time zone",
        "time without time zone" => "time",
        "timetz" => "time with time zone",
        "serial4" => "serial",
        "serial2" => "smallserial",
        "serial8" => "bigserial",
        "varbit" => "bit varying",
        other => other,
    }
}

/// Canonical spelling of a built-in type.
///
/// Lower-cases keywords, collapses aliases (`int4` → `integer`,
/// `character varying` → `varchar`), strips whitespace inside parameters and
/// keeps array suffixes. Quoted user types are returned trimmed but
/// otherwise untouched.
pub fn normalize_type(raw: &str) -> String {
    let raw = raw.trim();
    if raw.contains('"') {
        return raw.to_string();
    }

    let mut base = raw.to_ascii_lowercase();
    let mut dims = 0;
    while let Some(stripped) = base.strip_suffix("[]") {
        base = stripped.trim_end().to_string();
        dims += 1;
    }

    let params = match (base.find('('), base.find(')')) {
        (Some(start), Some(end)) if start < end => {
            let params: String = base[start + 1..end]
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            base = format!("{} {}", &base[..start], &base[end + 1..]);
            Some(params)
        }
        _ => None,
    };

    let collapsed = base.split_whitespace().collect::<Vec<_>>().join(" ");
    let name = canonical_alias(&collapsed);

    let mut out = match params {
        None => name.to_string(),
        Some(p) => match name.split_once(' ') {
            // precision sits before the zone suffix
            Some((head @ ("timestamp" | "time"), tail)) => format!("{head}({p}) {tail}"),
            _ => format!("{name}({p})"),
        },
    };
    for _ in 0..dims {
        out.push_str("[]");
    }
    out
}

/// Split `"numeric(10,2)[]"` into `("numeric(10,2)", "[]")`
fn split_array_suffix(ty: &str) -> (&str, &str) {
    match ty.find("[]") {
        Some(pos) => (&ty[..pos], &ty[pos..]),
        None => (ty, ""),
    }
}

/// Spellings introspection produces for the same effective type
fn relax_type(ty: &str) -> String {
    let (base, dims) = split_array_suffix(ty);

    if let Some(inner) = base
        .strip_prefix("numeric(")
        .and_then(|rest| rest.strip_suffix(')'))
        && let Some((precision, "0")) = inner.split_once(',')
    {
        return format!("numeric({precision}){dims}");
    }

    let relaxed = match base {
        "char(1)" => "char".to_string(),
        other => other
            .replace("timestamp(6)", "timestamp")
            .replace("time(6)", "time"),
    };
    format!("{relaxed}{dims}")
}

/// Whether two type spellings denote the same effective type
pub fn types_commutative(left: &str, right: &str, mode: Mode) -> bool {
    let (left, right) = (normalize_type(left), normalize_type(right));
    if left == right {
        return true;
    }
    mode.is_push() && relax_type(&left) == relax_type(&right)
}

// =============================================================================
// SQL Type Registry
// =============================================================================

/// Descriptor for a family of built-in types
pub trait SqlType: Sync {
    /// Short family name, used in tests and logs
    fn name(&self) -> &'static str;

    /// Whether a canonical type spelling belongs to this family
    fn is(&self, ty: &str) -> bool;

    /// Canonical default from an introspected `column_default`
    fn default_from_introspect(&self, raw: &str) -> String {
        strip_casts(raw.trim()).to_string()
    }

    /// Canonical default from a source-schema value
    fn default_from_source(&self, value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::String(s) => quote_literal(s),
            serde_json::Value::Null => "NULL".to_string(),
            other => other.to_string(),
        }
    }
}

struct IntegerType;
struct NumericType;
struct BooleanType;
struct TextType;
struct JsonType;
struct TimestampType;
struct CustomType;

impl SqlType for IntegerType {
    fn name(&self) -> &'static str {
        "integer"
    }

    fn is(&self, ty: &str) -> bool {
        matches!(
            split_array_suffix(ty).0,
            "smallint" | "integer" | "bigint" | "smallserial" | "serial" | "bigserial"
        )
    }

    fn default_from_introspect(&self, raw: &str) -> String {
        // '42'::integer
        trim_quotes(strip_casts(raw.trim())).to_string()
    }

    fn default_from_source(&self, value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl SqlType for NumericType {
    fn name(&self) -> &'static str {
        "numeric"
    }

    fn is(&self, ty: &str) -> bool {
        let base = split_array_suffix(ty).0;
        base == "real"
            || base == "double precision"
            || base == "numeric"
            || base.starts_with("numeric(")
    }

    fn default_from_introspect(&self, raw: &str) -> String {
        trim_quotes(strip_casts(raw.trim())).to_string()
    }

    fn default_from_source(&self, value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl SqlType for BooleanType {
    fn name(&self) -> &'static str {
        "boolean"
    }

    fn is(&self, ty: &str) -> bool {
        split_array_suffix(ty).0 == "boolean"
    }

    fn default_from_introspect(&self, raw: &str) -> String {
        match trim_quotes(strip_casts(raw.trim())).to_ascii_lowercase().as_str() {
            "t" | "true" => "true".to_string(),
            "f" | "false" => "false".to_string(),
            other => other.to_string(),
        }
    }
}

impl SqlType for TextType {
    fn name(&self) -> &'static str {
        "text"
    }

    fn is(&self, ty: &str) -> bool {
        let base = split_array_suffix(ty).0;
        base == "text"
            || base == "varchar"
            || base == "char"
            || base.starts_with("varchar(")
            || base.starts_with("char(")
    }
}

impl SqlType for JsonType {
    fn name(&self) -> &'static str {
        "json"
    }

    fn is(&self, ty: &str) -> bool {
        matches!(split_array_suffix(ty).0, "json" | "jsonb")
    }

    fn default_from_source(&self, value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::String(s) => quote_literal(s),
            other => quote_literal(&other.to_string()),
        }
    }
}

impl SqlType for TimestampType {
    fn name(&self) -> &'static str {
        "timestamp"
    }

    fn is(&self, ty: &str) -> bool {
        let base = split_array_suffix(ty).0;
        base.starts_with("timestamp") || base.starts_with("time") || base == "date"
    }

    fn default_from_introspect(&self, raw: &str) -> String {
        let stripped = strip_casts(raw.trim());
        if is_current_timestamp(stripped) {
            "now()".to_string()
        } else {
            stripped.to_string()
        }
    }
}

impl SqlType for CustomType {
    fn name(&self) -> &'static str {
        "custom"
    }

    fn is(&self, _ty: &str) -> bool {
        true
    }
}

/// Registry in lookup order; `CustomType` matches everything and stays last
static TYPES: &[&dyn SqlType] = &[
    &IntegerType,
    &NumericType,
    &BooleanType,
    &TextType,
    &JsonType,
    &TimestampType,
    &CustomType,
];

/// Registry lookup for a raw type spelling
pub fn type_for(raw: &str) -> &'static dyn SqlType {
    let ty = normalize_type(raw);
    TYPES
        .iter()
        .copied()
        .find(|t| t.is(&ty))
        .unwrap_or(&CustomType)
}

// =============================================================================
// Defaults and expressions
// =============================================================================

static CAST_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)::("?[a-z_][a-z0-9_ ]*"?)(\([0-9, ]*\))?(\[\])*$"#).expect("valid regex")
});

/// `'a'::text` → `'a'`, repeated casts included
pub fn strip_casts(expr: &str) -> &str {
    let mut out = expr;
    while let Some(m) = CAST_SUFFIX.find(out) {
        out = out[..m.start()].trim_end();
    }
    out
}

fn trim_quotes(s: &str) -> &str {
    s.strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(s)
}

fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Strip redundant wrapping parentheses: `((1))` → `1`
pub fn strip_outer_parens(expr: &str) -> &str {
    let mut out = expr.trim();
    while out.starts_with('(') && out.ends_with(')') && wraps_whole(out) {
        out = out[1..out.len() - 1].trim();
    }
    out
}

/// Whether the first `(` closes at the final character
fn wraps_whole(expr: &str) -> bool {
    let mut depth = 0usize;
    for (i, c) in expr.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 && i != expr.len() - 1 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// `now()`, `CURRENT_TIMESTAMP` and friends
pub fn is_current_timestamp(expr: &str) -> bool {
    matches!(
        strip_outer_parens(expr).to_ascii_lowercase().as_str(),
        "now()" | "current_timestamp" | "current_timestamp()" | "transaction_timestamp()"
    )
}

/// Whether two column defaults denote the same value for `sql_type`
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
            let l = ty.default_from_introspect(strip_outer_parens(l));
            let r = ty.default_from_introspect(strip_outer_parens(r));
            l == r || (is_current_timestamp(&l) && is_current_timestamp(&r))
        }
        _ => false,
    }
}

/// Collapse whitespace in an expression
pub fn normalize_expression(expr: &str) -> String {
    expr.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Check, policy, view and generated expressions.
///
/// Push mode only compares presence: the database reformats expression text.
pub fn expressions_commutative(left: Option<&str>, right: Option<&str>, mode: Mode) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(l), Some(r)) => {
            mode.is_push()
                || normalize_expression(strip_outer_parens(l))
                    == normalize_expression(strip_outer_parens(r))
        }
        _ => false,
    }
}

// =============================================================================
// Identity Defaults
// =============================================================================

/// Default values for identity columns
pub struct IdentityDefaults;

impl IdentityDefaults {
    pub const START_WITH: &'static str = "1";
    pub const INCREMENT: &'static str = "1";
    pub const MIN: &'static str = "1";
    pub const CACHE: i64 = 1;

    /// Get the maximum value for an identity column based on type
    pub fn max_for(column_type: &str) -> &'static str {
        match column_type {
            "smallint" => "32767",
            "bigint" => "9223372036854775807",
            _ => "2147483647",
        }
    }
}

/// Integer types an identity column may use
pub fn is_identity_type(sql_type: &str) -> bool {
    matches!(
        normalize_type(sql_type).as_str(),
        "smallint" | "integer" | "bigint"
    )
}

// =============================================================================
// System Checks
// =============================================================================

/// System namespace names that should be skipped
pub const SYSTEM_NAMESPACE_NAMES: &[&str] = &["pg_toast", "pg_catalog", "information_schema"];

/// Check if a namespace is a system namespace
pub fn is_system_namespace(name: &str) -> bool {
    name.starts_with("pg_toast")
        || name.starts_with("pg_temp_")
        || SYSTEM_NAMESPACE_NAMES.contains(&name)
}

/// Check if a role is a system role
pub fn is_system_role(name: &str) -> bool {
    name == "postgres" || name.starts_with("pg_")
}

/// Canonical referential action, `NO ACTION` when unset
pub fn normalize_action(action: Option<&str>) -> String {
    match action {
        None => "NO ACTION".to_string(),
        Some(a) => a.trim().to_ascii_uppercase(),
    }
}

/// Default index method
pub const DEFAULT_INDEX_METHOD: &str = "btree";

// =============================================================================
// Parsing Helpers
// =============================================================================

/// Strip the `CHECK (...)` wrapper introspection returns
pub fn parse_check_definition(value: &str) -> String {
    let value = value.trim();
    let inner = value
        .strip_prefix("CHECK")
        .map(str::trim_start)
        .unwrap_or(value);
    strip_outer_parens(inner).to_string()
}

/// Normalize a view definition: collapsed whitespace, no trailing semicolon
pub fn parse_view_definition(value: Option<&str>) -> Option<String> {
    value.map(|v| {
        normalize_expression(v)
            .trim_end_matches(';')
            .trim_end()
            .to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_name_for_pk() {
        assert_eq!(default_name_for_pk("users"), "users_pkey");
    }

    #[test]
    fn test_default_name_for_fk() {
        let name = default_name_for_fk(
            "posts",
            &["author_id".to_string()],
            "users",
            &["id".to_string()],
        );
        assert_eq!(name, "posts_author_id_users_id_fkey");
    }

    #[test]
    fn test_long_fk_name_is_truncated() {
        let long = "a".repeat(40);
        let name = default_name_for_fk(&long, &["x".into()], &long, &["y".into()]);
        assert!(name.len() <= MAX_IDENTIFIER_LEN);
        assert_eq!(name, default_name_for_fk(&long, &["x".into()], &long, &["y".into()]));
    }

    #[test]
    fn test_default_name_for_unique_and_index() {
        assert_eq!(
            default_name_for_unique("users", &["email".to_string()]),
            "users_email_key"
        );
        assert_eq!(
            default_name_for_index("users", &["email".to_string(), "name".to_string()]),
            "users_email_name_idx"
        );
    }

    #[test]
    fn test_normalize_type() {
        assert_eq!(normalize_type("INT4"), "integer");
        assert_eq!(normalize_type("character varying(255)"), "varchar(255)");
        assert_eq!(normalize_type("numeric( 10, 2 )"), "numeric(10,2)");
        assert_eq!(normalize_type("decimal"), "numeric");
        assert_eq!(normalize_type("timestamptz"), "timestamp with time zone");
        assert_eq!(
            normalize_type("timestamp (3) with time zone"),
            "timestamp(3) with time zone"
        );
        assert_eq!(normalize_type("int[][]"), "integer[][]");
        assert_eq!(normalize_type("\"MyEnum\""), "\"MyEnum\"");
    }

    #[test]
    fn test_types_commutative() {
        assert!(types_commutative("int4", "integer", Mode::Default));
        assert!(!types_commutative("numeric(10,0)", "numeric(10)", Mode::Default));
        assert!(types_commutative("numeric(10,0)", "numeric(10)", Mode::Push));
        assert!(types_commutative("timestamp(6)", "timestamp", Mode::Push));
        assert!(types_commutative("character(1)", "char", Mode::Push));
        assert!(!types_commutative("integer", "bigint", Mode::Push));
    }

    #[test]
    fn test_type_for() {
        assert_eq!(type_for("int8").name(), "integer");
        assert_eq!(type_for("double").name(), "numeric");
        assert_eq!(type_for("character varying(20)").name(), "text");
        assert_eq!(type_for("timestamptz").name(), "timestamp");
        assert_eq!(type_for("geometry(point)").name(), "custom");
    }

    #[test]
    fn test_default_from_source() {
        assert_eq!(type_for("text").default_from_source(&json!("it's")), "'it''s'");
        assert_eq!(type_for("integer").default_from_source(&json!(42)), "42");
        assert_eq!(type_for("boolean").default_from_source(&json!(true)), "true");
        assert_eq!(
            type_for("jsonb").default_from_source(&json!({"a": 1})),
            "'{\"a\":1}'"
        );
    }

    #[test]
    fn test_default_from_introspect() {
        assert_eq!(type_for("text").default_from_introspect("'a'::text"), "'a'");
        assert_eq!(
            type_for("varchar").default_from_introspect("'a'::character varying"),
            "'a'"
        );
        assert_eq!(type_for("integer").default_from_introspect("'42'::integer"), "42");
        assert_eq!(type_for("boolean").default_from_introspect("'t'::boolean"), "true");
    }

    #[test]
    fn test_defaults_commutative() {
        assert!(defaults_commutative(None, None, "text", Mode::Default));
        assert!(!defaults_commutative(Some("'a'"), None, "text", Mode::Push));
        assert!(!defaults_commutative(Some("'a'::text"), Some("'a'"), "text", Mode::Default));
        assert!(defaults_commutative(Some("'a'::text"), Some("'a'"), "text", Mode::Push));
        assert!(defaults_commutative(
            Some("now()"),
            Some("CURRENT_TIMESTAMP"),
            "timestamp",
            Mode::Push
        ));
        assert!(defaults_commutative(Some("(1)"), Some("1"), "integer", Mode::Push));
    }

    #[test]
    fn test_expressions_commutative() {
        assert!(expressions_commutative(Some("a  > 1"), Some("(a > 1)"), Mode::Default));
        assert!(!expressions_commutative(Some("a > 1"), Some("a > 2"), Mode::Default));
        assert!(expressions_commutative(Some("a > 1"), Some("(a > 1::int)"), Mode::Push));
        assert!(!expressions_commutative(Some("a > 1"), None, Mode::Push));
    }

    #[test]
    fn test_strip_outer_parens() {
        assert_eq!(strip_outer_parens("((1))"), "1");
        assert_eq!(strip_outer_parens("(a) + (b)"), "(a) + (b)");
    }

    #[test]
    fn test_is_system_namespace() {
        assert!(is_system_namespace("pg_catalog"));
        assert!(is_system_namespace("pg_toast_12345"));
        assert!(!is_system_namespace("public"));
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(parse_check_definition("CHECK ((age > 0))"), "age > 0");
        assert_eq!(
            parse_view_definition(Some(" SELECT id\n   FROM users;")),
            Some("SELECT id FROM users".to_string())
        );
        assert_eq!(normalize_action(None), "NO ACTION");
        assert_eq!(normalize_action(Some("cascade")), "CASCADE");
    }

    #[test]
    fn test_identity_defaults() {
        assert_eq!(IdentityDefaults::max_for("smallint"), "32767");
        assert!(is_identity_type("int8"));
        assert!(!is_identity_type("text"));
    }
}
