// SQLite driver over a single rusqlite connection
use rusqlite::types::{Value as SqliteValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::dialect::Dialect;
use super::driver::DbDriver;
use super::statement::{self, Statement};
use crate::api::middleware::AppError;
use crate::config::DatabaseConfig;
use crate::models::{DeleteOptions, ReadOptions, Row, UpdateOptions};

/// SQLite driver.
/// Uses tokio::Mutex for async-friendly locking; `None` once disconnected.
pub struct SqliteDriver {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteDriver {
    pub async fn connect(options: &DatabaseConfig) -> Result<Self, AppError> {
        let path = options
            .path
            .as_deref()
            .ok_or_else(|| AppError::Connection("SQLite driver requires database.path".to_string()))?;
        Self::open(path)
    }

    /// Open a database file (or `:memory:`), creating parent directories
    pub fn open(path: &str) -> Result<Self, AppError> {
        // Handle SQLite URL format (sqlite:./path or sqlite://path)
        let clean_path = if path.starts_with("sqlite:") {
            path.trim_start_matches("sqlite:").trim_start_matches("//")
        } else {
            path
        };

        if clean_path != ":memory:" {
            if let Some(parent) = Path::new(clean_path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        AppError::Connection(format!(
                            "Failed to create directory {}: {}",
                            parent.display(),
                            e
                        ))
                    })?;
                }
            }
        }

        let conn = Connection::open(clean_path)
            .map_err(|e| AppError::Connection(format!("Failed to open SQLite database {}: {}", clean_path, e)))?;

        // Enable foreign key constraints
        conn.execute("PRAGMA foreign_keys = ON", [])
            .map_err(|e| AppError::Connection(format!("Failed to enable foreign keys: {}", e)))?;

        tracing::info!("Opened SQLite database at {}", clean_path);

        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    pub fn memory() -> Result<Self, AppError> {
        Self::open(":memory:")
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, AppError> {
        tracing::debug!(sql = %statement.sql, params = statement.params.len(), "sqlite execute");
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_connected)?;

        let mut stmt = conn.prepare(&statement.sql)?;
        let changed = stmt.execute(params_from_iter(statement.params.iter().map(to_sqlite_value)))?;
        Ok(changed as u64)
    }

    async fn fetch(&self, statement: &Statement) -> Result<Vec<Row>, AppError> {
        tracing::debug!(sql = %statement.sql, params = statement.params.len(), "sqlite fetch");
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_connected)?;

        let mut stmt = conn.prepare(&statement.sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let mut rows = stmt.query(params_from_iter(statement.params.iter().map(to_sqlite_value)))?;

        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let mut json_row = Row::new();
            for (idx, column) in columns.iter().enumerate() {
                json_row.insert(column.clone(), sqlite_value_to_json(row.get_ref(idx)?));
            }
            result.push(json_row);
        }

        Ok(result)
    }
}

#[async_trait::async_trait]
impl DbDriver for SqliteDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn disconnect(&self) -> Result<(), AppError> {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, e)| AppError::Database(e.to_string()))?;
            tracing::info!("SQLite connection closed");
        }
        Ok(())
    }

    async fn create_table(&self, name: &str, definitions: &[String]) -> Result<(), AppError> {
        let sql = statement::create_table(Dialect::Sqlite, name, definitions)?;
        self.execute(&Statement { sql, params: vec![] }).await?;
        Ok(())
    }

    async fn create(&self, table: &str, data: &Row) -> Result<(), AppError> {
        let statement = statement::insert(Dialect::Sqlite, table, data)?;
        self.execute(&statement).await?;
        Ok(())
    }

    async fn read(&self, table: &str, options: &ReadOptions) -> Result<Vec<Row>, AppError> {
        let statement = statement::select(Dialect::Sqlite, table, options)?;
        self.fetch(&statement).await
    }

    async fn update(&self, table: &str, data: &Row, options: &UpdateOptions) -> Result<u64, AppError> {
        let statement = statement::update(Dialect::Sqlite, table, data, options)?;
        self.execute(&statement).await
    }

    async fn delete(&self, table: &str, options: &DeleteOptions) -> Result<u64, AppError> {
        let statement = statement::delete(Dialect::Sqlite, table, options)?;
        self.execute(&statement).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<(), AppError> {
        // Drain through `fetch` so statements that happen to return rows
        // (PRAGMA, SELECT) are accepted as well.
        self.fetch(&Statement {
            sql: sql.to_string(),
            params: params.to_vec(),
        })
        .await?;
        Ok(())
    }

    async fn query_with_result(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, AppError> {
        self.fetch(&Statement {
            sql: sql.to_string(),
            params: params.to_vec(),
        })
        .await
    }
}

fn not_connected() -> AppError {
    AppError::Connection("SQLite connection is closed".to_string())
}

/// Convert a JSON parameter to a SQLite value
fn to_sqlite_value(value: &Value) -> SqliteValue {
    match value {
        Value::Null => SqliteValue::Null,
        Value::Bool(b) => SqliteValue::Integer(*b as i64),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqliteValue::Integer(i),
            None => SqliteValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqliteValue::Text(s.clone()),
        // Structured values are stored as their JSON text
        other => SqliteValue::Text(other.to_string()),
    }
}

/// Convert a SQLite column value to JSON. Blobs become byte arrays.
fn sqlite_value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => json!(i),
        ValueRef::Real(f) => json!(f),
        ValueRef::Text(bytes) => json!(String::from_utf8_lossy(bytes)),
        ValueRef::Blob(bytes) => json!(bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Operator, WhereFilter};

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    async fn posts_driver() -> SqliteDriver {
        let driver = SqliteDriver::memory().unwrap();
        driver
            .create_table(
                "posts",
                &[
                    "\"title\" TEXT NOT NULL".to_string(),
                    "\"views\" INTEGER".to_string(),
                    "\"published\" BOOLEAN".to_string(),
                ],
            )
            .await
            .unwrap();

        for (title, views, published) in [("alpha", 10, true), ("beta", 25, false), ("gamma", 40, true)] {
            driver
                .create("posts", &row(json!({"title": title, "views": views, "published": published})))
                .await
                .unwrap();
        }
        driver
    }

    #[tokio::test]
    async fn test_sqlite_memory() {
        let driver = SqliteDriver::memory();
        assert!(driver.is_ok());
    }

    #[tokio::test]
    async fn test_create_and_read_rows() {
        let driver = posts_driver().await;

        let rows = driver
            .read("posts", &ReadOptions::new().order_by("id"))
            .await
            .unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["id"], json!(1));
        assert_eq!(rows[0]["title"], json!("alpha"));
        assert_eq!(rows[0]["published"], json!(1));
        assert_eq!(rows[2]["views"], json!(40));
    }

    #[tokio::test]
    async fn test_read_with_filter_fields_and_paging() {
        let driver = posts_driver().await;

        let options = ReadOptions::new()
            .fields(vec!["title"])
            .filter(WhereFilter::new().op("views", Operator::Gte, 20))
            .order_by("views DESC")
            .limit(1)
            .offset(1);

        let rows = driver.read("posts", &options).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["title"], json!("beta"));
        assert!(!rows[0].contains_key("views"));
    }

    #[tokio::test]
    async fn test_empty_in_matches_nothing_and_empty_nin_matches_everything() {
        let driver = posts_driver().await;

        let none = driver
            .read("posts", &ReadOptions::new().filter(WhereFilter::new().op("id", Operator::In, json!([]))))
            .await
            .unwrap();
        assert!(none.is_empty());

        let all = driver
            .read("posts", &ReadOptions::new().filter(WhereFilter::new().op("id", Operator::Nin, json!([]))))
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_update_and_delete_report_affected_rows() {
        let driver = posts_driver().await;

        let updated = driver
            .update(
                "posts",
                &row(json!({"views": 0})),
                &UpdateOptions::filter(WhereFilter::new().eq("published", true)),
            )
            .await
            .unwrap();
        assert_eq!(updated, 2);

        let deleted = driver
            .delete("posts", &DeleteOptions::filter(WhereFilter::new().op("title", Operator::Like, "%a")))
            .await
            .unwrap();
        assert_eq!(deleted, 3);

        let rows = driver.read("posts", &ReadOptions::default()).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_empty_payloads_are_rejected() {
        let driver = posts_driver().await;

        let create = driver.create("posts", &Row::new()).await;
        assert!(matches!(create, Err(AppError::EmptyPayload(_))));

        let update = driver.update("posts", &Row::new(), &UpdateOptions::default()).await;
        assert!(matches!(update, Err(AppError::EmptyPayload(_))));
    }

    #[tokio::test]
    async fn test_unsupported_operator_does_not_touch_database() {
        let driver = posts_driver().await;
        let filter: WhereFilter = serde_json::from_str(r#"{"title": {"$regex": "a"}}"#).unwrap();

        let result = driver.read("posts", &ReadOptions::new().filter(filter)).await;
        assert!(matches!(result, Err(AppError::UnsupportedOperator(_))));
    }

    #[tokio::test]
    async fn test_raw_queries() {
        let driver = posts_driver().await;

        driver
            .query("UPDATE posts SET views = ? WHERE title = ?", &[json!(99), json!("alpha")])
            .await
            .unwrap();

        let rows = driver
            .query_with_result("SELECT views FROM posts WHERE title = ?", &[json!("alpha")])
            .await
            .unwrap();
        assert_eq!(rows[0]["views"], json!(99));

        // Row-returning statements are fine through `query`
        driver.query("PRAGMA foreign_keys", &[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_blob_and_null_values() {
        let driver = SqliteDriver::memory().unwrap();
        driver
            .create_table("files", &["\"data\" BLOB".to_string(), "\"note\" TEXT".to_string()])
            .await
            .unwrap();
        driver
            .query("INSERT INTO files (data, note) VALUES (X'48656c6c6f', NULL)", &[])
            .await
            .unwrap();

        let rows = driver.read("files", &ReadOptions::default()).await.unwrap();
        assert_eq!(rows[0]["data"], json!([72, 101, 108, 108, 111]));
        assert_eq!(rows[0]["note"], Value::Null);
    }

    #[tokio::test]
    async fn test_disconnect_closes_connection() {
        let driver = SqliteDriver::memory().unwrap();
        driver.disconnect().await.unwrap();

        let result = driver.read("anything", &ReadOptions::default()).await;
        assert!(matches!(result, Err(AppError::Connection(_))));
    }

    #[tokio::test]
    async fn test_file_database_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/data/app.sqlite");

        let driver = SqliteDriver::open(path.to_str().unwrap()).unwrap();
        driver.create_table("notes", &[]).await.unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_value_conversion() {
        assert_eq!(to_sqlite_value(&json!(true)), SqliteValue::Integer(1));
        assert_eq!(to_sqlite_value(&json!(1.5)), SqliteValue::Real(1.5));
        assert_eq!(to_sqlite_value(&json!({"a": 1})), SqliteValue::Text("{\"a\":1}".to_string()));
    }
}
