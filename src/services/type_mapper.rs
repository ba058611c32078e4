//! Maps declared column types onto the normalized value kinds.

use crate::models::{FieldDescription, NormalizedKind};
use crate::services::database::Dialect;

const BOOLEAN_PREFIXES: &[&str] = &["tinyint(1)", "bool"];

const NUMBER_PREFIXES: &[&str] = &[
    "integer", "int", "smallint", "mediumint", "bigint", "tinyint", "real", "float", "double",
    "decimal", "numeric",
];

const BINARY_PREFIXES: &[&str] = &[
    "blob", "tinyblob", "mediumblob", "longblob", "binary", "varbinary", "bytea",
];

/// Normalize a raw SQL column type.
///
/// Case-insensitive prefix match. Never fails: anything unrecognized is text.
pub fn normalize(raw_type: &str) -> NormalizedKind {
    let sql_type = raw_type.trim().to_lowercase();
    let starts_with_any = |prefixes: &[&str]| prefixes.iter().any(|p| sql_type.starts_with(p));

    // tinyint(1) is the MySQL boolean and must win over the numeric tinyint
    if starts_with_any(BOOLEAN_PREFIXES) {
        NormalizedKind::Boolean
    } else if starts_with_any(NUMBER_PREFIXES) {
        NormalizedKind::Number
    } else if starts_with_any(BINARY_PREFIXES) {
        NormalizedKind::Binary
    } else {
        NormalizedKind::Text
    }
}

/// Special declared kinds that are not SQL types
fn special_kind(declared: &str) -> Option<NormalizedKind> {
    match declared.trim().to_lowercase().as_str() {
        "markdown" => Some(NormalizedKind::Markdown),
        "json" => Some(NormalizedKind::Json),
        "datetime" => Some(NormalizedKind::Datetime),
        _ => None,
    }
}

/// Resolve a declared field type into its physical column type and kind.
///
/// `markdown`, `json` and `datetime` bypass raw-type matching and get a
/// fixed backing type; any other declaration is used verbatim as the column
/// type and normalized with [`normalize`].
pub fn describe(declared: &str, dialect: Dialect) -> FieldDescription {
    match special_kind(declared) {
        Some(kind @ (NormalizedKind::Markdown | NormalizedKind::Json)) => {
            FieldDescription::new(dialect.long_text_type(), kind)
        }
        Some(kind) => FieldDescription::new(dialect.datetime_type(), kind),
        None => FieldDescription::new(declared.trim(), normalize(declared)),
    }
}
