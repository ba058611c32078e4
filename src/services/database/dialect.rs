//! SQL dialect strategy.
//!
//! Everything that differs between the supported engines at the SQL text
//! level lives here: identifier quoting, parameter placeholders, boolean
//! literals and the handful of column types the compiler synthesizes.

use std::fmt;
use std::str::FromStr;

use crate::api::middleware::AppError;

/// Conservative identifier length limit across the supported engines
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Supported SQL dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Sqlite,
    MySql,
    Postgres,
}

/// How bound parameters are written into the SQL text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?` for every parameter
    Positional,
    /// `$1`, `$2`, ... numbered from 1
    Numbered,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::MySql => "mysql",
            Dialect::Postgres => "postgres",
        }
    }

    pub fn placeholder_style(&self) -> PlaceholderStyle {
        match self {
            Dialect::Sqlite | Dialect::MySql => PlaceholderStyle::Positional,
            Dialect::Postgres => PlaceholderStyle::Numbered,
        }
    }

    /// A fresh placeholder sequence for one statement
    pub fn placeholders(&self) -> Placeholders {
        Placeholders::new(self.placeholder_style())
    }

    /// Quote an identifier, escaping embedded quote characters
    pub fn quote_ident(&self, name: &str) -> Result<String, AppError> {
        validate_identifier(name)?;
        Ok(match self {
            Dialect::MySql => format!("`{}`", name.replace('`', "``")),
            Dialect::Sqlite | Dialect::Postgres => format!("\"{}\"", name.replace('"', "\"\"")),
        })
    }

    /// Always-false predicate, used for an empty `IN` set
    pub fn false_literal(&self) -> &'static str {
        match self {
            Dialect::Sqlite | Dialect::MySql => "0",
            Dialect::Postgres => "FALSE",
        }
    }

    /// Always-true predicate, used for an empty `NOT IN` set
    pub fn true_literal(&self) -> &'static str {
        match self {
            Dialect::Sqlite | Dialect::MySql => "1",
            Dialect::Postgres => "TRUE",
        }
    }

    /// Column definition of the implicit auto-assigned `id` primary key
    pub fn primary_key_definition(&self) -> String {
        match self {
            Dialect::Sqlite => "\"id\" INTEGER PRIMARY KEY AUTOINCREMENT".to_string(),
            Dialect::MySql => "`id` INT AUTO_INCREMENT PRIMARY KEY".to_string(),
            Dialect::Postgres => "\"id\" SERIAL PRIMARY KEY".to_string(),
        }
    }

    /// Backing type for markdown and JSON fields
    pub fn long_text_type(&self) -> &'static str {
        match self {
            Dialect::Sqlite | Dialect::MySql => "LONGTEXT",
            Dialect::Postgres => "TEXT",
        }
    }

    /// Backing type for datetime fields (ISO-8601 strings)
    pub fn datetime_type(&self) -> &'static str {
        "VARCHAR(30)"
    }

    /// MySQL silently ignores column-level `REFERENCES`, so foreign keys
    /// must be declared as table constraints there.
    pub fn inline_foreign_keys(&self) -> bool {
        !matches!(self, Dialect::MySql)
    }

    /// LIMIT clause to pair with an OFFSET when the caller gave no limit
    pub fn unbounded_limit(&self) -> Option<&'static str> {
        match self {
            Dialect::Sqlite => Some("LIMIT -1"),
            Dialect::MySql => Some("LIMIT 18446744073709551615"),
            Dialect::Postgres => None,
        }
    }
}

impl FromStr for Dialect {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            _ => Err(AppError::Config(format!(
                "Invalid database driver name: {}. Possible values: sqlite, mysql, postgres",
                s
            ))),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate an identifier before quoting it.
///
/// Identifiers cannot be bound as parameters, so anything that reaches the
/// SQL text as a name goes through here.
pub fn validate_identifier(name: &str) -> Result<(), AppError> {
    if name.is_empty() {
        return Err(AppError::Validation("Identifier cannot be empty".to_string()));
    }

    if name.contains('\0') {
        return Err(AppError::Validation(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(AppError::Validation(format!(
            "Identifier exceeds maximum length of {} bytes: {:?}",
            MAX_IDENTIFIER_LENGTH, name
        )));
    }

    Ok(())
}

/// Placeholder sequence for a single statement.
///
/// Numbered placeholders increase by one per emitted parameter, no matter
/// which clause of the statement asks for it.
#[derive(Debug, Clone)]
pub struct Placeholders {
    style: PlaceholderStyle,
    emitted: usize,
}

impl Placeholders {
    pub fn new(style: PlaceholderStyle) -> Self {
        Self { style, emitted: 0 }
    }

    pub fn allocate(&mut self) -> String {
        self.emitted += 1;
        match self.style {
            PlaceholderStyle::Positional => "?".to_string(),
            PlaceholderStyle::Numbered => format!("${}", self.emitted),
        }
    }
}
