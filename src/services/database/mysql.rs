// MySQL driver using connection pooling for optimal resource management
use mysql_async::{prelude::*, Conn, Opts, OptsBuilder, Params, Pool, Row as MySqlRow, Value as MySqlValue};
use serde_json::{json, Value};

use super::dialect::Dialect;
use super::driver::DbDriver;
use super::mask_credentials;
use super::statement::{self, Statement};
use crate::api::middleware::AppError;
use crate::config::DatabaseConfig;
use crate::models::{DeleteOptions, ReadOptions, Row, UpdateOptions};

const DEFAULT_PORT: u16 = 3306;

pub struct MySqlDriver {
    pool: Pool,
}

impl MySqlDriver {
    /// Build the pool and check connectivity once
    pub async fn connect(options: &DatabaseConfig) -> Result<Self, AppError> {
        let opts = Self::build_opts(options)?;
        let driver = Self { pool: Pool::new(opts) };

        // Fail at startup rather than on the first request
        driver.get_conn().await?;
        tracing::info!(
            "Connected to MySQL at {}",
            options
                .url
                .as_deref()
                .map(mask_credentials)
                .unwrap_or_else(|| options.host.clone().unwrap_or_default())
        );

        Ok(driver)
    }

    fn build_opts(options: &DatabaseConfig) -> Result<Opts, AppError> {
        if let Some(url) = options.url.as_deref() {
            let parsed = url::Url::parse(url)
                .map_err(|e| AppError::Config(format!("Invalid MySQL URL: {}", e)))?;

            if parsed.scheme() != "mysql" && parsed.scheme() != "mariadb" {
                return Err(AppError::Config("URL must use mysql:// or mariadb:// scheme".to_string()));
            }

            // mysql_async only understands the mysql:// scheme
            let normalized = url.replacen("mariadb://", "mysql://", 1);
            return Opts::from_url(&normalized)
                .map_err(|e| AppError::Config(format!("Invalid MySQL URL: {}", e)));
        }

        let host = options
            .host
            .clone()
            .ok_or_else(|| AppError::Config("MySQL driver requires database.url or database.host".to_string()))?;

        let builder = OptsBuilder::default()
            .ip_or_hostname(host)
            .tcp_port(options.port.unwrap_or(DEFAULT_PORT))
            .user(options.user.clone())
            .pass(options.password.clone())
            .db_name(options.database.clone());

        Ok(builder.into())
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<Conn, AppError> {
        self.pool
            .get_conn()
            .await
            .map_err(|e| AppError::Connection(format!("Failed to get MySQL connection from pool: {}", e)))
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, AppError> {
        tracing::debug!(sql = %statement.sql, params = statement.params.len(), "mysql execute");
        let mut conn = self.get_conn().await?;

        conn.exec_drop(statement.sql.as_str(), to_params(&statement.params))
            .await
            .map_err(|e| AppError::Database(format!("Query execution failed: {}", e)))?;

        Ok(conn.affected_rows())
    }

    async fn fetch(&self, statement: &Statement) -> Result<Vec<Row>, AppError> {
        tracing::debug!(sql = %statement.sql, params = statement.params.len(), "mysql fetch");
        let mut conn = self.get_conn().await?;

        let rows: Vec<MySqlRow> = conn
            .exec(statement.sql.as_str(), to_params(&statement.params))
            .await
            .map_err(|e| AppError::Database(format!("Query execution failed: {}", e)))?;

        Ok(rows.into_iter().map(row_to_json).collect())
    }
}

#[async_trait::async_trait]
impl DbDriver for MySqlDriver {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    async fn disconnect(&self) -> Result<(), AppError> {
        self.pool
            .clone()
            .disconnect()
            .await
            .map_err(|e| AppError::Connection(format!("Failed to close MySQL pool: {}", e)))?;
        tracing::info!("MySQL pool closed");
        Ok(())
    }

    async fn create_table(&self, name: &str, definitions: &[String]) -> Result<(), AppError> {
        let sql = statement::create_table(Dialect::MySql, name, definitions)?;
        tracing::debug!(sql = %sql, "mysql create table");

        let mut conn = self.get_conn().await?;
        conn.query_drop(sql)
            .await
            .map_err(|e| AppError::Database(format!("Failed to create table {}: {}", name, e)))
    }

    async fn create(&self, table: &str, data: &Row) -> Result<(), AppError> {
        let statement = statement::insert(Dialect::MySql, table, data)?;
        self.execute(&statement).await?;
        Ok(())
    }

    async fn read(&self, table: &str, options: &ReadOptions) -> Result<Vec<Row>, AppError> {
        let statement = statement::select(Dialect::MySql, table, options)?;
        self.fetch(&statement).await
    }

    async fn update(&self, table: &str, data: &Row, options: &UpdateOptions) -> Result<u64, AppError> {
        let statement = statement::update(Dialect::MySql, table, data, options)?;
        self.execute(&statement).await
    }

    async fn delete(&self, table: &str, options: &DeleteOptions) -> Result<u64, AppError> {
        let statement = statement::delete(Dialect::MySql, table, options)?;
        self.execute(&statement).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<(), AppError> {
        self.execute(&Statement {
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

fn to_params(params: &[Value]) -> Params {
    if params.is_empty() {
        Params::Empty
    } else {
        Params::Positional(params.iter().map(json_to_mysql_value).collect())
    }
}

/// Convert a JSON parameter to a MySQL value
fn json_to_mysql_value(value: &Value) -> MySqlValue {
    match value {
        Value::Null => MySqlValue::NULL,
        Value::Bool(b) => MySqlValue::Int(*b as i64),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                MySqlValue::Int(i)
            } else if let Some(u) = n.as_u64() {
                MySqlValue::UInt(u)
            } else {
                MySqlValue::Double(n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => MySqlValue::Bytes(s.clone().into_bytes()),
        // Structured values are stored as their JSON text
        other => MySqlValue::Bytes(other.to_string().into_bytes()),
    }
}

fn row_to_json(row: MySqlRow) -> Row {
    let mut row_obj = Row::new();
    let columns = row.columns_ref();

    for (idx, column) in columns.iter().enumerate() {
        let value = match row.as_ref(idx) {
            Some(mysql_val) => mysql_value_to_json(mysql_val.clone()),
            None => Value::Null,
        };
        row_obj.insert(column.name_str().to_string(), value);
    }

    row_obj
}

/// Convert a MySQL column value to JSON. Non-UTF-8 bytes become byte arrays.
fn mysql_value_to_json(mysql_val: MySqlValue) -> Value {
    match mysql_val {
        MySqlValue::NULL => Value::Null,
        MySqlValue::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(s) => json!(s),
            Err(e) => json!(e.into_bytes()),
        },
        MySqlValue::Int(i) => json!(i),
        MySqlValue::UInt(u) => json!(u),
        MySqlValue::Float(f) => json!(f),
        MySqlValue::Double(d) => json!(d),
        MySqlValue::Date(y, m, d, h, min, s, _) => {
            json!(format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}", y, m, d, h, min, s))
        }
        MySqlValue::Time(is_neg, d, h, m, s, _) => {
            let sign = if is_neg { "-" } else { "" };
            let total_hours = d * 24 + h as u32;
            json!(format!("{}{}:{:02}:{:02}", sign, total_hours, m, s))
        }
    }
}
