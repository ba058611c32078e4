pub mod schema;
pub mod table;

use std::sync::Arc;

use crate::services::database::DbDriver;
use crate::services::schema_registry::SchemaRegistry;
use crate::services::DbService;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub driver: Arc<dyn DbDriver>,
    pub registry: Arc<SchemaRegistry>,
}

impl From<DbService> for AppState {
    fn from(service: DbService) -> Self {
        Self {
            driver: service.driver,
            registry: service.registry,
        }
    }
}
