// Database abstraction layer: one driver per supported dialect
pub mod dialect;
pub mod driver;
pub mod mysql;
pub mod postgresql;
pub mod sqlite;
pub mod statement;

pub use dialect::{Dialect, PlaceholderStyle, Placeholders};
pub use driver::DbDriver;
pub use mysql::MySqlDriver;
pub use postgresql::PostgresDriver;
pub use sqlite::SqliteDriver;
pub use statement::Statement;

use crate::api::middleware::AppError;
use crate::config::DatabaseConfig;
use std::sync::Arc;

/// Factory function to create the driver for the configured dialect
pub async fn connect(options: &DatabaseConfig) -> Result<Arc<dyn DbDriver>, AppError> {
    let dialect: Dialect = options.db_type.parse()?;
    tracing::info!("Connecting to {} database", dialect);

    let driver: Arc<dyn DbDriver> = match dialect {
        Dialect::Sqlite => Arc::new(SqliteDriver::connect(options).await?),
        Dialect::MySql => Arc::new(MySqlDriver::connect(options).await?),
        Dialect::Postgres => Arc::new(PostgresDriver::connect(options).await?),
    };

    Ok(driver)
}

/// Mask credentials in connection URL for safe logging
pub(crate) fn mask_credentials(url: &str) -> String {
    if let Ok(parsed_url) = url::Url::parse(url) {
        let mut masked = parsed_url.clone();
        if parsed_url.password().is_some() {
            let _ = masked.set_password(Some("***"));
        }
        masked.to_string()
    } else {
        "[invalid-url]".to_string()
    }
}
