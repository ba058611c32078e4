//! Builds the SQL text and parameter list of every CRUD statement.
//!
//! Drivers only execute what comes out of here, so all identifier quoting
//! and placeholder numbering is testable without a live database.

use serde_json::Value;

use super::dialect::Dialect;
use crate::api::middleware::AppError;
use crate::models::{DeleteOptions, ReadOptions, Row, UpdateOptions};
use crate::services::filter_compiler::{build_query_tail, compile, compile_with};

/// SQL text with its bound parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

pub fn insert(dialect: Dialect, table: &str, data: &Row) -> Result<Statement, AppError> {
    if data.is_empty() {
        return Err(AppError::EmptyPayload("No data provided for insert".to_string()));
    }

    let mut placeholders = dialect.placeholders();
    let mut columns = Vec::with_capacity(data.len());
    let mut marks = Vec::with_capacity(data.len());
    let mut params = Vec::with_capacity(data.len());

    for (column, value) in data {
        columns.push(dialect.quote_ident(column)?);
        marks.push(placeholders.allocate());
        params.push(value.clone());
    }

    Ok(Statement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({})",
            dialect.quote_ident(table)?,
            columns.join(", "),
            marks.join(", ")
        ),
        params,
    })
}

pub fn select(dialect: Dialect, table: &str, options: &ReadOptions) -> Result<Statement, AppError> {
    let fields = match options.fields.as_deref() {
        Some(fields) if !fields.is_empty() => fields
            .iter()
            .map(|f| dialect.quote_ident(f))
            .collect::<Result<Vec<_>, _>>()?
            .join(", "),
        _ => "*".to_string(),
    };

    let filter = match &options.filter {
        Some(filter) => compile(filter, dialect)?,
        None => Default::default(),
    };

    let tail = build_query_tail(
        dialect,
        options.order_by.as_deref(),
        options.limit,
        options.offset,
    )?;

    Ok(Statement {
        sql: format!(
            "SELECT {} FROM {}{}{}",
            fields,
            dialect.quote_ident(table)?,
            filter.where_sql(),
            tail
        ),
        params: filter.params,
    })
}

pub fn update(
    dialect: Dialect,
    table: &str,
    data: &Row,
    options: &UpdateOptions,
) -> Result<Statement, AppError> {
    if data.is_empty() {
        return Err(AppError::EmptyPayload("No data provided for update".to_string()));
    }

    let mut placeholders = dialect.placeholders();
    let mut assignments = Vec::with_capacity(data.len());
    let mut params: Vec<Value> = Vec::with_capacity(data.len());

    for (column, value) in data {
        assignments.push(format!("{} = {}", dialect.quote_ident(column)?, placeholders.allocate()));
        params.push(value.clone());
    }

    // SET parameters come first, so the WHERE clause continues their numbering
    let filter = match &options.filter {
        Some(filter) => compile_with(filter, dialect, &mut placeholders)?,
        None => Default::default(),
    };
    params.extend(filter.params.iter().cloned());

    Ok(Statement {
        sql: format!(
            "UPDATE {} SET {}{}",
            dialect.quote_ident(table)?,
            assignments.join(", "),
            filter.where_sql()
        ),
        params,
    })
}

pub fn delete(dialect: Dialect, table: &str, options: &DeleteOptions) -> Result<Statement, AppError> {
    let filter = match &options.filter {
        Some(filter) => compile(filter, dialect)?,
        None => Default::default(),
    };

    Ok(Statement {
        sql: format!("DELETE FROM {}{}", dialect.quote_ident(table)?, filter.where_sql()),
        params: filter.params,
    })
}

/// `CREATE TABLE IF NOT EXISTS` with the implicit `id` primary key first,
/// followed by the given column definitions and table constraints.
pub fn create_table(dialect: Dialect, name: &str, definitions: &[String]) -> Result<String, AppError> {
    let mut parts = vec![dialect.primary_key_definition()];
    parts.extend(definitions.iter().cloned());

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        dialect.quote_ident(name)?,
        parts.join(", ")
    ))
}

/// Catalog lookup returning one row when table `name` exists
pub fn table_exists(dialect: Dialect, name: &str) -> Statement {
    let mark = dialect.placeholders().allocate();
    let sql = match dialect {
        Dialect::Sqlite => format!("SELECT name FROM sqlite_master WHERE type = 'table' AND name = {}", mark),
        Dialect::MySql => format!(
            "SELECT TABLE_NAME FROM information_schema.TABLES WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = {}",
            mark
        ),
        Dialect::Postgres => format!(
            "SELECT table_name FROM information_schema.tables WHERE table_schema = current_schema() AND table_name::text = {}",
            mark
        ),
    };

    Statement {
        sql,
        params: vec![Value::String(name.to_string())],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Operator, WhereFilter};
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_insert_per_dialect() {
        let data = row(json!({"title": "Hello", "views": 3}));

        let sqlite = insert(Dialect::Sqlite, "posts", &data).unwrap();
        assert_eq!(sqlite.sql, "INSERT INTO \"posts\" (\"title\", \"views\") VALUES (?, ?)");
        assert_eq!(sqlite.params, vec![json!("Hello"), json!(3)]);

        let mysql = insert(Dialect::MySql, "posts", &data).unwrap();
        assert_eq!(mysql.sql, "INSERT INTO `posts` (`title`, `views`) VALUES (?, ?)");

        let postgres = insert(Dialect::Postgres, "posts", &data).unwrap();
        assert_eq!(postgres.sql, "INSERT INTO \"posts\" (\"title\", \"views\") VALUES ($1, $2)");
    }

    #[test]
    fn test_insert_rejects_empty_payload() {
        let result = insert(Dialect::Sqlite, "posts", &Row::new());
        assert!(matches!(result, Err(AppError::EmptyPayload(_))));
    }

    #[test]
    fn test_select_with_all_options() {
        let options = ReadOptions::new()
            .fields(vec!["id", "title"])
            .filter(WhereFilter::new().op("views", Operator::Gt, 10))
            .order_by("title DESC")
            .limit(5)
            .offset(10);

        let statement = select(Dialect::Postgres, "posts", &options).unwrap();
        assert_eq!(
            statement.sql,
            "SELECT \"id\", \"title\" FROM \"posts\" WHERE \"views\" > $1 ORDER BY \"title\" DESC LIMIT 5 OFFSET 10"
        );
        assert_eq!(statement.params, vec![json!(10)]);
    }

    #[test]
    fn test_select_everything() {
        let statement = select(Dialect::MySql, "posts", &ReadOptions::default()).unwrap();
        assert_eq!(statement.sql, "SELECT * FROM `posts`");
        assert!(statement.params.is_empty());
    }

    #[test]
    fn test_update_numbers_where_after_set() {
        let data = row(json!({"title": "New", "views": 0}));
        let options = UpdateOptions::filter(WhereFilter::new().eq("id", 7));

        let statement = update(Dialect::Postgres, "posts", &data, &options).unwrap();
        assert_eq!(
            statement.sql,
            "UPDATE \"posts\" SET \"title\" = $1, \"views\" = $2 WHERE \"id\" = $3"
        );
        assert_eq!(statement.params, vec![json!("New"), json!(0), json!(7)]);
    }

    #[test]
    fn test_update_rejects_empty_payload() {
        let result = update(Dialect::MySql, "posts", &Row::new(), &UpdateOptions::default());
        assert!(matches!(result, Err(AppError::EmptyPayload(_))));
    }

    #[test]
    fn test_delete() {
        let options = DeleteOptions::filter(WhereFilter::new().op("id", Operator::In, json!([1, 2])));
        let statement = delete(Dialect::Sqlite, "posts", &options).unwrap();
        assert_eq!(statement.sql, "DELETE FROM \"posts\" WHERE \"id\" IN (?, ?)");
        assert_eq!(statement.params, vec![json!(1), json!(2)]);

        let everything = delete(Dialect::Sqlite, "posts", &DeleteOptions::default()).unwrap();
        assert_eq!(everything.sql, "DELETE FROM \"posts\"");
    }

    #[test]
    fn test_create_table_seeds_primary_key() {
        let sql = create_table(
            Dialect::Sqlite,
            "tags",
            &["\"label\" TEXT NOT NULL UNIQUE".to_string()],
        )
        .unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"tags\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \"label\" TEXT NOT NULL UNIQUE)"
        );

        let mysql = create_table(Dialect::MySql, "tags", &[]).unwrap();
        assert_eq!(mysql, "CREATE TABLE IF NOT EXISTS `tags` (`id` INT AUTO_INCREMENT PRIMARY KEY)");
    }

    #[test]
    fn test_table_exists_binds_the_name() {
        let sqlite = table_exists(Dialect::Sqlite, "users");
        assert!(sqlite.sql.starts_with("SELECT name FROM sqlite_master"));
        assert!(sqlite.sql.ends_with("name = ?"));
        assert_eq!(sqlite.params, vec![json!("users")]);

        assert!(table_exists(Dialect::MySql, "users").sql.contains("TABLE_SCHEMA = DATABASE()"));
        assert!(table_exists(Dialect::Postgres, "users").sql.ends_with("table_name::text = $1"));
    }
}
