//! MySQL type grammar and naming conventions

use crate::postgres::grammar::{hash_string, normalize_expression, strip_outer_parens};
use crate::traits::Mode;
use regex::Regex;
use std::sync::LazyLock;

// =============================================================================
// Naming Conventions
// =============================================================================

/// MySQL identifier max length
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// The only primary key name MySQL knows
pub const PRIMARY_KEY_NAME: &str = "PRIMARY";

pub fn default_name_for_fk(
    table: &str,
    columns: &[String],
    table_to: &str,
    columns_to: &[String],
) -> String {
    let desired = format!(
        "{}_{}_{}_{}_fk",
        table,
        columns.join("_"),
        table_to,
        columns_to.join("_")
    );
    if desired.len() <= MAX_IDENTIFIER_LEN {
        return desired;
    }
    let hash = hash_string(&desired);
    if table.len() < MAX_IDENTIFIER_LEN - 16 {
        format!("{table}_{hash}_fk")
    } else {
        format!("{hash}_fk")
    }
}

pub fn default_name_for_unique(table: &str, columns: &[String]) -> String {
    format!("{}_{}_unique", table, columns.join("_"))
}

pub fn default_name_for_index(table: &str, columns: &[String]) -> String {
    format!("{}_{}_index", table, columns.join("_"))
}

/// Same scheme as the server: `users_chk_1`
pub fn default_name_for_check(table: &str, index: usize) -> String {
    format!("{table}_chk_{index}")
}

// =============================================================================
// Type Canonicalization
// =============================================================================

/// Integer display widths: `int(11)`, `bigint(20) unsigned`
static DISPLAY_WIDTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(tinyint|smallint|mediumint|int|bigint)\(\d+\)").expect("valid regex")
});

fn canonical_alias(name: &str) -> &str {
    match name {
        "integer" => "int",
        "bool" => "boolean",
        "dec" | "numeric" | "fixed" => "decimal",
        "double precision" => "double",
        "character" => "char",
        "character varying" => "varchar",
        other => other,
    }
}

/// Canonical spelling of a column type.
///
/// Lower-cases, collapses aliases, strips whitespace inside parameters and
/// drops integer display widths except `tinyint(1)`, which is how MySQL
/// spells booleans. `decimal(10,0)` and `decimal(10)` become `decimal`.
pub fn normalize_type(raw: &str) -> String {
    let lowered = raw.trim().to_ascii_lowercase();

    let (head, params, tail) = match (lowered.find('('), lowered.rfind(')')) {
        (Some(start), Some(end)) if start < end => {
            let params: String = lowered[start + 1..end]
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            (
                lowered[..start].trim().to_string(),
                Some(params),
                lowered[end + 1..].trim().to_string(),
            )
        }
        _ => (lowered.clone(), None, String::new()),
    };

    let head = head.split_whitespace().collect::<Vec<_>>().join(" ");
    let name = canonical_alias(&head);
    let mut out = match params.as_deref() {
        Some("10,0" | "10") if name == "decimal" => name.to_string(),
        Some(p) => format!("{name}({p})"),
        None => name.to_string(),
    };
    if out != "tinyint(1)" {
        out = DISPLAY_WIDTH.replace(&out, "$1").into_owned();
    }
    let tail = tail.split_whitespace().collect::<Vec<_>>().join(" ");
    if !tail.is_empty() {
        out.push(' ');
        out.push_str(&tail);
    }
    out
}

/// Spellings that are the same type on every server
fn relax_type(ty: &str) -> &str {
    match ty {
        "tinyint(1)" => "boolean",
        "binary(1)" => "binary",
        "char(1)" => "char",
        other => other,
    }
}

/// Spellings introspection produces for a source type
fn relax_push(ty: &str) -> String {
    if let Some(rest) = ty.strip_prefix("real") {
        return format!("double{rest}");
    }
    if let Some(inner) = ty
        .strip_prefix("decimal(")
        .and_then(|rest| rest.strip_suffix(')'))
        && let Some((precision, "0")) = inner.split_once(',')
    {
        return format!("decimal({precision})");
    }
    ty.to_string()
}

pub fn types_commutative(left: &str, right: &str, mode: Mode) -> bool {
    let (left, right) = (normalize_type(left), normalize_type(right));
    let (left, right) = (relax_type(&left), relax_type(&right));
    if left == right {
        return true;
    }
    mode.is_push() && relax_push(left) == relax_push(right)
}

// =============================================================================
// Charsets and collations
// =============================================================================

fn canonical_charset(charset: &str) -> String {
    match charset.trim().to_ascii_lowercase().as_str() {
        "utf8" => "utf8mb3".to_string(),
        other => other.to_string(),
    }
}

/// Server default collation for a charset
pub fn default_collation(charset: &str) -> Option<&'static str> {
    let collation = match canonical_charset(charset).as_str() {
        "utf8mb4" => "utf8mb4_0900_ai_ci",
        "utf8mb3" => "utf8mb3_general_ci",
        "latin1" => "latin1_swedish_ci",
        "ascii" => "ascii_general_ci",
        "binary" => "binary",
        "utf16" => "utf16_general_ci",
        "utf32" => "utf32_general_ci",
        "ucs2" => "ucs2_general_ci",
        "cp1251" => "cp1251_general_ci",
        "gbk" => "gbk_chinese_ci",
        "big5" => "big5_chinese_ci",
        "sjis" => "sjis_japanese_ci",
        _ => return None,
    };
    Some(collation)
}

/// Whether two `(charset, collation)` pairs resolve to the same column
/// encoding. A missing side means the table default and equals anything.
pub fn collations_commutative(
    left: (Option<&str>, Option<&str>),
    right: (Option<&str>, Option<&str>),
) -> bool {
    let charset = match (left.0, right.0) {
        (Some(l), Some(r)) => {
            if canonical_charset(l) != canonical_charset(r) {
                return false;
            }
            Some(l)
        }
        (l, r) => l.or(r),
    };
    let canonical = |c: &str| c.trim().to_ascii_lowercase().replace("utf8_", "utf8mb3_");
    match (left.1, right.1) {
        (Some(l), Some(r)) => canonical(l) == canonical(r),
        (Some(c), None) | (None, Some(c)) => match charset.and_then(default_collation) {
            Some(default) => canonical(c) == default,
            None => true,
        },
        (None, None) => true,
    }
}

// =============================================================================
// SQL Type Registry
// =============================================================================

/// Descriptor for a family of MySQL types
pub trait SqlType: Sync {
    fn name(&self) -> &'static str;

    fn is(&self, ty: &str) -> bool;

    /// Canonical default from `information_schema.columns.COLUMN_DEFAULT`,
    /// which returns string literals unquoted
    fn default_from_introspect(&self, raw: &str) -> String {
        raw.trim().to_string()
    }

    fn default_from_source(&self, value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::String(s) => quote_literal(s),
            serde_json::Value::Null => "NULL".to_string(),
            other => other.to_string(),
        }
    }
}

struct IntType;
struct DecimalType;
struct BooleanType;
struct StringType;
struct JsonType;
struct DateTimeType;
struct CustomType;

fn base_name(ty: &str) -> &str {
    ty.split(['(', ' ']).next().unwrap_or(ty)
}

impl SqlType for IntType {
    fn name(&self) -> &'static str {
        "int"
    }

    fn is(&self, ty: &str) -> bool {
        ty != "tinyint(1)"
            && matches!(
                base_name(ty),
                "tinyint" | "smallint" | "mediumint" | "int" | "bigint" | "serial"
            )
    }

    fn default_from_source(&self, value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl SqlType for DecimalType {
    fn name(&self) -> &'static str {
        "decimal"
    }

    fn is(&self, ty: &str) -> bool {
        matches!(base_name(ty), "decimal" | "double" | "float" | "real")
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
        ty == "boolean" || ty == "tinyint(1)"
    }

    fn default_from_introspect(&self, raw: &str) -> String {
        match trim_quotes(raw.trim()) {
            "1" | "b'1'" => "true".to_string(),
            "0" | "b'0'" => "false".to_string(),
            other => other.to_ascii_lowercase(),
        }
    }
}

impl SqlType for StringType {
    fn name(&self) -> &'static str {
        "string"
    }

    fn is(&self, ty: &str) -> bool {
        matches!(
            base_name(ty),
            "char"
                | "varchar"
                | "tinytext"
                | "text"
                | "mediumtext"
                | "longtext"
                | "binary"
                | "varbinary"
                | "enum"
                | "set"
        )
    }

    fn default_from_introspect(&self, raw: &str) -> String {
        let raw = raw.trim();
        if raw.starts_with('(') || raw.starts_with('\'') {
            return raw.to_string();
        }
        quote_literal(raw)
    }
}

impl SqlType for JsonType {
    fn name(&self) -> &'static str {
        "json"
    }

    fn is(&self, ty: &str) -> bool {
        ty == "json"
    }

    /// `_utf8mb4\'{"a":1}\'` → `'{"a":1}'`
    fn default_from_introspect(&self, raw: &str) -> String {
        let raw = strip_outer_parens(raw.trim());
        let raw = raw.strip_prefix("_utf8mb4").unwrap_or(raw);
        raw.replace("\\'", "'")
    }

    fn default_from_source(&self, value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::String(s) => quote_literal(s),
            other => quote_literal(&other.to_string()),
        }
    }
}

impl SqlType for DateTimeType {
    fn name(&self) -> &'static str {
        "datetime"
    }

    fn is(&self, ty: &str) -> bool {
        matches!(
            base_name(ty),
            "date" | "datetime" | "timestamp" | "time" | "year"
        )
    }

    fn default_from_introspect(&self, raw: &str) -> String {
        let raw = raw.trim();
        if is_current_timestamp(raw) {
            return "CURRENT_TIMESTAMP".to_string();
        }
        if raw.starts_with('\'') {
            return raw.to_string();
        }
        quote_literal(raw)
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

/// `BooleanType` sits before `IntType`, which rejects `tinyint(1)` anyway
static TYPES: &[&dyn SqlType] = &[
    &BooleanType,
    &IntType,
    &DecimalType,
    &StringType,
    &JsonType,
    &DateTimeType,
    &CustomType,
];

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

fn trim_quotes(s: &str) -> &str {
    s.strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(s)
}

fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// `now()`, `(now())`, `CURRENT_TIMESTAMP`, `CURRENT_TIMESTAMP()` and
/// fractional variants such as `CURRENT_TIMESTAMP(3)`
pub fn is_current_timestamp(expr: &str) -> bool {
    let lowered = strip_outer_parens(expr).to_ascii_lowercase();
    let name = lowered.split('(').next().unwrap_or_default().trim();
    // `now() + interval 1 day` is not one
    matches!(name, "now" | "current_timestamp" | "localtimestamp")
        && (!lowered.contains('(') || lowered.ends_with(')'))
}

/// Fractional seconds of a current timestamp default, 0 when absent
fn timestamp_precision(expr: &str) -> u8 {
    let inner = strip_outer_parens(expr);
    inner
        .split_once('(')
        .and_then(|(_, rest)| rest.strip_suffix(')'))
        .and_then(|digits| digits.trim().parse().ok())
        .unwrap_or(0)
}

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
            if is_current_timestamp(l) && is_current_timestamp(r) {
                // introspection may drop the fractional precision
                return mode.is_push() || timestamp_precision(l) == timestamp_precision(r);
            }
            if !mode.is_push() {
                return false;
            }
            let ty = type_for(sql_type);
            let l = ty.default_from_introspect(strip_outer_parens(l));
            let r = ty.default_from_introspect(strip_outer_parens(r));
            l == r
        }
        _ => false,
    }
}

/// Check, view and generated expressions; push mode only compares presence
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

/// Canonical referential action, `NO ACTION` when unset
pub fn normalize_action(action: Option<&str>) -> String {
    match action {
        None => "NO ACTION".to_string(),
        Some(a) => a.trim().to_ascii_uppercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_type() {
        assert_eq!(normalize_type("INT(11)"), "int");
        assert_eq!(normalize_type("integer"), "int");
        assert_eq!(normalize_type("bigint(20) unsigned"), "bigint unsigned");
        assert_eq!(normalize_type("tinyint(1)"), "tinyint(1)");
        assert_eq!(normalize_type("decimal(10,0)"), "decimal");
        assert_eq!(normalize_type("DECIMAL( 10 )"), "decimal");
        assert_eq!(normalize_type("numeric(12, 2)"), "decimal(12,2)");
        assert_eq!(normalize_type("varchar(255)"), "varchar(255)");
        assert_eq!(normalize_type("enum('a','b')"), "enum('a','b')");
    }

    #[test]
    fn test_types_commutative_in_both_modes() {
        for mode in [Mode::Default, Mode::Push] {
            assert!(types_commutative("tinyint(1)", "boolean", mode));
            assert!(types_commutative("bool", "tinyint(1)", mode));
            assert!(types_commutative("binary(1)", "binary", mode));
            assert!(types_commutative("char(1)", "char", mode));
            assert!(types_commutative("int(11)", "int", mode));
        }
        assert!(!types_commutative("int", "bigint", Mode::Push));
    }

    #[test]
    fn test_types_commutative_push_only() {
        assert!(!types_commutative("double", "real", Mode::Default));
        assert!(types_commutative("double", "real", Mode::Push));
        assert!(types_commutative("double(10,2)", "real(10,2)", Mode::Push));
        assert!(!types_commutative("decimal(19,0)", "decimal(19)", Mode::Default));
        assert!(types_commutative("decimal(19,0)", "decimal(19)", Mode::Push));
    }

    #[test]
    fn test_collations_commutative() {
        assert!(collations_commutative((None, None), (Some("utf8mb4"), None)));
        assert!(collations_commutative(
            (Some("utf8mb4"), None),
            (Some("utf8mb4"), Some("utf8mb4_0900_ai_ci"))
        ));
        assert!(!collations_commutative(
            (Some("utf8mb4"), None),
            (Some("utf8mb4"), Some("utf8mb4_bin"))
        ));
        assert!(collations_commutative(
            (Some("utf8"), Some("utf8_general_ci")),
            (Some("utf8mb3"), None)
        ));
        assert!(!collations_commutative((Some("latin1"), None), (Some("utf8mb4"), None)));
    }

    #[test]
    fn test_current_timestamp_spellings() {
        for spelling in [
            "now()",
            "(now())",
            "CURRENT_TIMESTAMP",
            "(CURRENT_TIMESTAMP)",
            "CURRENT_TIMESTAMP()",
        ] {
            assert!(is_current_timestamp(spelling), "{spelling}");
            assert!(defaults_commutative(
                Some(spelling),
                Some("now()"),
                "timestamp",
                Mode::Default
            ));
        }
        assert!(!is_current_timestamp("'2024-01-01'"));
    }

    #[test]
    fn test_current_timestamp_precision_counts_outside_push() {
        let millis = Some("CURRENT_TIMESTAMP(3)");
        assert!(!defaults_commutative(millis, Some("now()"), "timestamp(3)", Mode::Default));
        assert!(!defaults_commutative(
            millis,
            Some("(CURRENT_TIMESTAMP(6))"),
            "timestamp(3)",
            Mode::Default
        ));
        assert!(defaults_commutative(millis, Some("now(3)"), "timestamp(3)", Mode::Default));
        assert!(defaults_commutative(millis, Some("now()"), "timestamp(3)", Mode::Push));
    }

    #[test]
    fn test_defaults_commutative_push() {
        assert!(!defaults_commutative(Some("'abc'"), Some("abc"), "varchar(10)", Mode::Default));
        assert!(defaults_commutative(Some("'abc'"), Some("abc"), "varchar(10)", Mode::Push));
        assert!(defaults_commutative(Some("true"), Some("1"), "boolean", Mode::Push));
        assert!(defaults_commutative(Some("(1)"), Some("1"), "int", Mode::Push));
        assert!(!defaults_commutative(Some("1"), None, "int", Mode::Push));
    }

    #[test]
    fn test_type_for() {
        assert_eq!(type_for("tinyint(1)").name(), "boolean");
        assert_eq!(type_for("tinyint").name(), "int");
        assert_eq!(type_for("int unsigned").name(), "int");
        assert_eq!(type_for("varchar(20)").name(), "string");
        assert_eq!(type_for("datetime(3)").name(), "datetime");
        assert_eq!(type_for("geometry").name(), "custom");
    }

    #[test]
    fn test_default_from_source() {
        assert_eq!(type_for("varchar(10)").default_from_source(&json!("it's")), "'it''s'");
        assert_eq!(type_for("int").default_from_source(&json!(7)), "7");
        assert_eq!(type_for("json").default_from_source(&json!([1])), "'[1]'");
        assert_eq!(
            type_for("json").default_from_introspect(r"_utf8mb4\'[1]\'"),
            "'[1]'"
        );
    }

    #[test]
    fn test_default_names() {
        let cols = |c: &[&str]| c.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(
            default_name_for_fk("posts", &cols(&["author_id"]), "users", &cols(&["id"])),
            "posts_author_id_users_id_fk"
        );
        assert_eq!(default_name_for_unique("users", &cols(&["email"])), "users_email_unique");
        assert_eq!(default_name_for_check("users", 2), "users_chk_2");
        let long = "t".repeat(60);
        assert!(default_name_for_fk(&long, &cols(&["a"]), &long, &cols(&["b"])).len() <= MAX_IDENTIFIER_LEN);
    }
}
