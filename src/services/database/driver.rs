// Uniform driver contract, one implementation per dialect
use serde_json::Value;

use super::dialect::Dialect;
use super::statement;
use crate::api::middleware::AppError;
use crate::models::{DeleteOptions, ReadOptions, Row, UpdateOptions};

/// Database driver trait - the CRUD contract every dialect implements.
///
/// Implementations hold a single connection handle (pooling, if any, is
/// internal to the transport). Statement text comes from
/// [`super::statement`]; drivers only bind and execute.
#[async_trait::async_trait]
pub trait DbDriver: Send + Sync {
    /// Dialect the driver speaks
    fn dialect(&self) -> Dialect;

    /// Release the connection. Later calls fail with a connection error.
    async fn disconnect(&self) -> Result<(), AppError>;

    /// `CREATE TABLE IF NOT EXISTS name (id ..., definitions...)`
    async fn create_table(&self, name: &str, definitions: &[String]) -> Result<(), AppError>;

    /// Insert one row. Fails with `EmptyPayload` when `data` has no fields.
    async fn create(&self, table: &str, data: &Row) -> Result<(), AppError>;

    async fn read(&self, table: &str, options: &ReadOptions) -> Result<Vec<Row>, AppError>;

    /// Returns the number of affected rows.
    /// Fails with `EmptyPayload` when `data` has no fields.
    async fn update(&self, table: &str, data: &Row, options: &UpdateOptions) -> Result<u64, AppError>;

    /// Returns the number of affected rows.
    async fn delete(&self, table: &str, options: &DeleteOptions) -> Result<u64, AppError>;

    /// Run raw SQL, discarding any result rows
    async fn query(&self, sql: &str, params: &[Value]) -> Result<(), AppError>;

    /// Run raw SQL and return its rows
    async fn query_with_result(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, AppError>;

    /// Whether `name` exists in the connected database
    async fn table_exists(&self, name: &str) -> Result<bool, AppError> {
        let stmt = statement::table_exists(self.dialect(), name);
        let rows = self.query_with_result(&stmt.sql, &stmt.params).await?;
        Ok(!rows.is_empty())
    }
}
