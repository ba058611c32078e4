use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use crate::models::{NormalizedKind, TableDescription};

/// Table name to normalized field descriptions.
///
/// Filled once by the schema compiler at startup, then read by every
/// request. Shared behind an `Arc`; never a global.
#[derive(Default)]
pub struct SchemaRegistry {
    tables: RwLock<HashMap<String, TableDescription>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store several tables under a single write lock
    pub async fn extend<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (String, TableDescription)>,
    {
        let mut tables = self.tables.write().await;
        for (name, description) in entries {
            tracing::debug!("Registering table {} ({} fields)", name, description.len());
            tables.insert(name, description);
        }
    }

    pub async fn get(&self, name: &str) -> Option<TableDescription> {
        self.tables.read().await.get(name).cloned()
    }

    /// The whole registry, keyed in table-name order, as served to the UI
    pub async fn snapshot(&self) -> BTreeMap<String, TableDescription> {
        self.tables
            .read()
            .await
            .iter()
            .map(|(name, description)| (name.clone(), description.clone()))
            .collect()
    }

    /// Columns suitable for listing rows: every column except binary ones.
    ///
    /// `None` for an unknown table.
    pub async fn display_fields(&self, name: &str) -> Option<Vec<String>> {
        let tables = self.tables.read().await;
        tables.get(name).map(|description| {
            description
                .iter()
                .filter(|(_, field)| field.kind != NormalizedKind::Binary)
                .map(|(field, _)| field.to_string())
                .collect()
        })
    }
}
