use serde::Deserialize;
use std::collections::HashSet;
use std::env;

/// Table created by the file storage subsystem when enabled
pub const MEDIA_TABLE: &str = "media";
/// Table created by the auth subsystem when enabled
pub const USERS_TABLE: &str = "users";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub schema: SchemaConfig,
    pub localization: LocalizationConfig,
    pub storage: SubsystemConfig,
    pub auth: SubsystemConfig,
    pub logging: LoggingConfig,
}

/// Connection options handed to the dialect driver
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfig {
    #[serde(rename = "type")]
    pub db_type: String,
    /// SQLite database file
    pub path: Option<String>,
    /// Full connection URL for MySQL/PostgreSQL, takes precedence over the discrete fields
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchemaConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalizationConfig {
    pub enable: bool,
    #[serde(default)]
    pub locales: Vec<String>,
    pub fallback_locale: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubsystemConfig {
    pub enable: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env before reading overrides so its values take part
        let _ = dotenv::dotenv();

        let config_file = env::var("CONFIG_PATH").unwrap_or_else(|_| "config".to_string());

        let mut builder = config::Config::builder()
            .set_default("database.type", "sqlite")?
            .set_default("database.path", "./data/database.sqlite")?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("schema.path", "./schema.yaml")?
            .set_default("localization.enable", false)?
            .set_default("localization.fallback_locale", "en")?
            .set_default("storage.enable", false)?
            .set_default("auth.enable", false)?
            .set_default("logging.level", "info")?
            .add_source(config::File::with_name(&config_file).required(false));

        // Load from environment variables
        if let Ok(db_type) = env::var("DATABASE_TYPE") {
            builder = builder.set_override("database.type", db_type)?;
        }

        if let Ok(database_url) = env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", database_url)?;
        }

        if let Ok(database_path) = env::var("DATABASE_PATH") {
            builder = builder.set_override("database.path", database_path)?;
        }

        if let Ok(host) = env::var("HOST") {
            builder = builder.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            builder = builder.set_override("server.port", port.parse::<u16>().unwrap_or(3000))?;
        }

        if let Ok(schema_path) = env::var("SCHEMA_PATH") {
            builder = builder.set_override("schema.path", schema_path)?;
        }

        if let Ok(log_level) = env::var("RUST_LOG") {
            builder = builder.set_override("logging.level", log_level)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Tables owned by enabled optional subsystems.
    ///
    /// They exist before schema compilation, so relations pointing at them
    /// never constrain creation order.
    pub fn exempt_tables(&self) -> HashSet<String> {
        let mut tables = HashSet::new();
        if self.storage.enable {
            tables.insert(MEDIA_TABLE.to_string());
        }
        if self.auth.enable {
            tables.insert(USERS_TABLE.to_string());
        }
        tables
    }
}
