use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use super::filter::WhereFilter;

/// A result row: column name to value
pub type Row = Map<String, Value>;

/// Options for `read`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadOptions {
    /// Columns to select; all columns when absent.
    ///
    /// Callers listing rows for display are expected to leave binary
    /// columns out of this list (see `SchemaRegistry::display_fields`).
    pub fields: Option<Vec<String>>,
    #[serde(rename = "where")]
    pub filter: Option<WhereFilter>,
    /// Each entry is `field`, `field ASC` or `field DESC`
    #[serde(default, deserialize_with = "one_or_many")]
    pub order_by: Option<Vec<String>>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields(mut self, fields: Vec<impl Into<String>>) -> Self {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn filter(mut self, filter: WhereFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order_by(mut self, order: impl Into<String>) -> Self {
        self.order_by.get_or_insert_with(Vec::new).push(order.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Options for `update`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateOptions {
    #[serde(rename = "where")]
    pub filter: Option<WhereFilter>,
}

impl UpdateOptions {
    pub fn filter(filter: WhereFilter) -> Self {
        Self {
            filter: Some(filter),
        }
    }
}

/// Options for `delete`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteOptions {
    #[serde(rename = "where")]
    pub filter: Option<WhereFilter>,
}

impl DeleteOptions {
    pub fn filter(filter: WhereFilter) -> Self {
        Self {
            filter: Some(filter),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<OneOrMany>::deserialize(deserializer)?.map(|value| match value {
        OneOrMany::One(order) => vec![order],
        OneOrMany::Many(orders) => orders,
    }))
}
