// PostgreSQL driver using connection pooling for optimal resource management
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use deadpool_postgres::{Config as PoolConfig, ManagerConfig, Pool, RecyclingMethod, Runtime};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::error::Error;
use std::str::FromStr;
use tokio_postgres::types::{to_sql_checked, FromSql, IsNull, ToSql, Type};
use uuid::Uuid;
use tokio_postgres::NoTls;

use super::dialect::Dialect;
use super::driver::DbDriver;
use super::mask_credentials;
use super::statement::{self, Statement};
use crate::api::middleware::AppError;
use crate::config::DatabaseConfig;
use crate::models::{DeleteOptions, ReadOptions, Row, UpdateOptions};

pub struct PostgresDriver {
    pool: Pool,
}

impl PostgresDriver {
    /// Build the pool and check connectivity once
    pub async fn connect(options: &DatabaseConfig) -> Result<Self, AppError> {
        let cfg = Self::build_config(options)?;

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| {
                tracing::error!("Failed to create connection pool: {}", e);
                AppError::Connection(format!("Failed to create connection pool: {}", e))
            })?;

        let driver = Self { pool };
        driver.client().await?;

        tracing::info!(
            "Connected to PostgreSQL at {}",
            options
                .url
                .as_deref()
                .map(mask_credentials)
                .unwrap_or_else(|| options.host.clone().unwrap_or_default())
        );

        Ok(driver)
    }

    fn build_config(options: &DatabaseConfig) -> Result<PoolConfig, AppError> {
        let mut cfg = PoolConfig::new();

        if let Some(connection_url) = options.url.as_deref() {
            let url = url::Url::parse(connection_url)
                .map_err(|e| AppError::Config(format!("Invalid PostgreSQL URL: {}", e)))?;

            if url.scheme() != "postgresql" && url.scheme() != "postgres" {
                return Err(AppError::Config(
                    "URL must use postgresql:// or postgres:// scheme".to_string(),
                ));
            }
            cfg.url = Some(connection_url.to_string());
        } else {
            cfg.host = Some(options.host.clone().ok_or_else(|| {
                AppError::Config("PostgreSQL driver requires database.url or database.host".to_string())
            })?);
            cfg.port = options.port;
            cfg.user = options.user.clone();
            cfg.password = options.password.clone();
            cfg.dbname = options.database.clone();
        }

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        Ok(cfg)
    }

    async fn client(&self) -> Result<deadpool_postgres::Object, AppError> {
        self.pool
            .get()
            .await
            .map_err(|e| AppError::Connection(format!("Failed to get connection from pool: {}", e)))
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, AppError> {
        tracing::debug!(sql = %statement.sql, params = statement.params.len(), "postgres execute");
        let client = self.client().await?;

        let params: Vec<PgParam<'_>> = statement.params.iter().map(PgParam).collect();
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        Ok(client.execute(statement.sql.as_str(), &refs).await?)
    }

    async fn fetch(&self, statement: &Statement) -> Result<Vec<Row>, AppError> {
        tracing::debug!(sql = %statement.sql, params = statement.params.len(), "postgres fetch");
        let client = self.client().await?;

        let params: Vec<PgParam<'_>> = statement.params.iter().map(PgParam).collect();
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        let rows = client.query(statement.sql.as_str(), &refs).await?;

        let mut json_rows = Vec::with_capacity(rows.len());
        for row in rows {
            let mut row_obj = Row::new();
            for (idx, column) in row.columns().iter().enumerate() {
                row_obj.insert(column.name().to_string(), column_to_json(&row, idx, column.type_()));
            }
            json_rows.push(row_obj);
        }

        Ok(json_rows)
    }
}

#[async_trait::async_trait]
impl DbDriver for PostgresDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn disconnect(&self) -> Result<(), AppError> {
        self.pool.close();
        tracing::info!("PostgreSQL pool closed");
        Ok(())
    }

    async fn create_table(&self, name: &str, definitions: &[String]) -> Result<(), AppError> {
        let sql = statement::create_table(Dialect::Postgres, name, definitions)?;
        tracing::debug!(sql = %sql, "postgres create table");

        let client = self.client().await?;
        client.batch_execute(&sql).await?;
        Ok(())
    }

    async fn create(&self, table: &str, data: &Row) -> Result<(), AppError> {
        let statement = statement::insert(Dialect::Postgres, table, data)?;
        self.execute(&statement).await?;
        Ok(())
    }

    async fn read(&self, table: &str, options: &ReadOptions) -> Result<Vec<Row>, AppError> {
        let statement = statement::select(Dialect::Postgres, table, options)?;
        self.fetch(&statement).await
    }

    async fn update(&self, table: &str, data: &Row, options: &UpdateOptions) -> Result<u64, AppError> {
        let statement = statement::update(Dialect::Postgres, table, data, options)?;
        self.execute(&statement).await
    }

    async fn delete(&self, table: &str, options: &DeleteOptions) -> Result<u64, AppError> {
        let statement = statement::delete(Dialect::Postgres, table, options)?;
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

/// A JSON parameter encoded for whatever type the server inferred for its
/// placeholder. Anything without a dedicated encoding is sent as text.
#[derive(Debug)]
struct PgParam<'a>(&'a Value);

impl ToSql for PgParam<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        if self.0.is_null() {
            return Ok(IsNull::Yes);
        }

        match *ty {
            Type::JSON | Type::JSONB => self.0.to_sql(ty, out),
            Type::BOOL => match self.0 {
                Value::Bool(b) => b.to_sql(ty, out),
                Value::Number(n) => (n.as_i64().unwrap_or_default() != 0).to_sql(ty, out),
                Value::String(s) => s.parse::<bool>()?.to_sql(ty, out),
                other => Err(format!("cannot encode {} as boolean", other).into()),
            },
            Type::INT2 => i16::try_from(as_i64(self.0)?)?.to_sql(ty, out),
            Type::INT4 => i32::try_from(as_i64(self.0)?)?.to_sql(ty, out),
            Type::INT8 => as_i64(self.0)?.to_sql(ty, out),
            Type::FLOAT4 => (as_f64(self.0)? as f32).to_sql(ty, out),
            Type::FLOAT8 => as_f64(self.0)?.to_sql(ty, out),
            Type::BYTEA => match self.0 {
                Value::String(s) => s.as_bytes().to_sql(ty, out),
                Value::Array(items) => items
                    .iter()
                    .map(|item| {
                        item.as_u64()
                            .and_then(|b| u8::try_from(b).ok())
                            .ok_or_else(|| format!("invalid byte value {}", item))
                    })
                    .collect::<Result<Vec<u8>, _>>()?
                    .to_sql(ty, out),
                other => Err(format!("cannot encode {} as bytea", other).into()),
            },
            Type::NUMERIC => as_decimal(self.0)?.to_sql(ty, out),
            Type::TIMESTAMP => as_timestamp(self.0)?.to_sql(ty, out),
            Type::TIMESTAMPTZ => as_timestamptz(self.0)?.to_sql(ty, out),
            Type::DATE => NaiveDate::parse_from_str(as_text(self.0, ty)?, "%Y-%m-%d")?.to_sql(ty, out),
            Type::TIME => NaiveTime::parse_from_str(as_text(self.0, ty)?, "%H:%M:%S%.f")?.to_sql(ty, out),
            Type::UUID => Uuid::parse_str(as_text(self.0, ty)?)?.to_sql(ty, out),
            // Only text-like slots take the JSON text form
            _ if <String as ToSql>::accepts(ty) => {
                let text = match self.0 {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                text.to_sql(ty, out)
            }
            _ => Err(format!("cannot encode {} as {}", self.0, ty).into()),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Accepted TIMESTAMP layouts besides RFC 3339
const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

fn as_text<'a>(value: &'a Value, ty: &Type) -> Result<&'a str, Box<dyn Error + Sync + Send>> {
    value
        .as_str()
        .map(str::trim)
        .ok_or_else(|| format!("cannot encode {} as {}", value, ty).into())
}

fn as_i64(value: &Value) -> Result<i64, Box<dyn Error + Sync + Send>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| format!("{} is not an integer", n).into()),
        Value::Bool(b) => Ok(*b as i64),
        Value::String(s) => Ok(s.trim().parse::<i64>()?),
        other => Err(format!("cannot encode {} as integer", other).into()),
    }
}

fn as_f64(value: &Value) -> Result<f64, Box<dyn Error + Sync + Send>> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("{} is not a number", n).into()),
        Value::String(s) => Ok(s.trim().parse::<f64>()?),
        other => Err(format!("cannot encode {} as float", other).into()),
    }
}

fn as_decimal(value: &Value) -> Result<Decimal, Box<dyn Error + Sync + Send>> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        other => return Err(format!("cannot encode {} as numeric", other).into()),
    };
    // serde_json prints large floats in exponent form
    Ok(Decimal::from_str(&text).or_else(|_| Decimal::from_scientific(&text))?)
}

fn as_timestamp(value: &Value) -> Result<NaiveDateTime, Box<dyn Error + Sync + Send>> {
    let text = as_text(value, &Type::TIMESTAMP)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.naive_utc());
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .ok_or_else(|| format!("invalid timestamp {}", text).into())
}

/// Offset-less input is taken as UTC
fn as_timestamptz(value: &Value) -> Result<DateTime<Utc>, Box<dyn Error + Sync + Send>> {
    let text = as_text(value, &Type::TIMESTAMPTZ)?;
    match DateTime::parse_from_rfc3339(text) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(_) => Ok(as_timestamp(value)?.and_utc()),
    }
}

/// NUMERIC comes back as a JSON number when that is exact, else as a string
fn decimal_to_json(value: Decimal) -> Value {
    let text = value.normalize().to_string();
    match text.parse::<serde_json::Number>() {
        Ok(n) if n.to_string() == text => Value::Number(n),
        _ => Value::String(text),
    }
}

fn column_to_json(row: &tokio_postgres::Row, idx: usize, ty: &Type) -> Value {
    fn get<'a, T: FromSql<'a>>(row: &'a tokio_postgres::Row, idx: usize) -> Option<T> {
        row.try_get::<_, Option<T>>(idx).ok().flatten()
    }

    let value = match *ty {
        Type::INT2 => get::<i16>(row, idx).map(Value::from),
        Type::INT4 => get::<i32>(row, idx).map(Value::from),
        Type::INT8 => get::<i64>(row, idx).map(Value::from),
        Type::FLOAT4 => get::<f32>(row, idx).map(|v| json!(v)),
        Type::FLOAT8 => get::<f64>(row, idx).map(|v| json!(v)),
        Type::BOOL => get::<bool>(row, idx).map(Value::Bool),
        Type::BYTEA => get::<Vec<u8>>(row, idx).map(|v| json!(v)),
        Type::JSON | Type::JSONB => get::<Value>(row, idx),
        Type::NUMERIC => get::<Decimal>(row, idx).map(decimal_to_json),
        Type::TIMESTAMP => get::<NaiveDateTime>(row, idx).map(|v| Value::String(v.to_string())),
        Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, idx).map(|v| Value::String(v.to_rfc3339())),
        Type::DATE => get::<NaiveDate>(row, idx).map(|v| Value::String(v.to_string())),
        Type::TIME => get::<NaiveTime>(row, idx).map(|v| Value::String(v.to_string())),
        Type::UUID => get::<Uuid>(row, idx).map(|v| Value::String(v.to_string())),
        _ => match row.try_get::<_, Option<String>>(idx) {
            Ok(v) => v.map(Value::String),
            Err(e) => {
                tracing::warn!("Cannot decode column {} of type {}: {}", idx, ty, e);
                None
            }
        },
    };

    value.unwrap_or(Value::Null)
}
