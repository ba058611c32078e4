use std::collections::HashSet;
use std::sync::Arc;

use crate::api::middleware::AppError;
use crate::config::Config;
use crate::models::SchemaDocument;
use crate::services::database::{self, DbDriver};
use crate::services::localization::Localization;
use crate::services::schema_compiler::{CompileOptions, SchemaCompiler};
use crate::services::schema_registry::SchemaRegistry;

/// Connected driver plus the registry produced by schema compilation.
///
/// Built once at startup; request handling starts only after
/// [`DbService::initialize`] has returned.
#[derive(Clone)]
pub struct DbService {
    pub driver: Arc<dyn DbDriver>,
    pub registry: Arc<SchemaRegistry>,
}

impl DbService {
    /// Read the schema document, connect, then create all tables
    pub async fn initialize(config: &Config) -> Result<Self, AppError> {
        let localization = Localization::from_config(&config.localization)?;
        if let Some(localization) = &localization {
            tracing::info!(
                "Localization enabled for locales: {} (fallback {})",
                localization.locales().join(", "),
                localization.fallback_locale()
            );
        }

        tracing::info!("Loading schema document from {}", config.schema.path);
        let document = SchemaDocument::from_file(&config.schema.path)?;

        let driver = database::connect(&config.database).await?;

        Self::with_driver(driver, &document, config.exempt_tables(), localization).await
    }

    /// Compile `document` through an already connected driver.
    ///
    /// Every exempt table must already exist; a missing one is a `Schema`
    /// error raised before any table is created.
    pub async fn with_driver(
        driver: Arc<dyn DbDriver>,
        document: &SchemaDocument,
        exempt_tables: HashSet<String>,
        localization: Option<Localization>,
    ) -> Result<Self, AppError> {
        let mut required: Vec<&String> = exempt_tables.iter().collect();
        required.sort();
        for table in required {
            if !driver.table_exists(table).await? {
                return Err(AppError::Schema(format!(
                    "Table {} belongs to an enabled subsystem but does not exist",
                    table
                )));
            }
        }

        let registry = Arc::new(SchemaRegistry::new());
        let compiler = SchemaCompiler::new(
            driver.dialect(),
            CompileOptions {
                exempt_tables,
                localization,
            },
        );

        let order = compiler.compile(document, driver.as_ref(), &registry).await?;
        tracing::info!("Schema compiled: {} tables ({})", order.len(), order.join(", "));

        Ok(Self { driver, registry })
    }

    pub async fn shutdown(&self) -> Result<(), AppError> {
        self.driver.disconnect().await
    }
}
