use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;

/// Normalized value kinds, independent of the dialect's raw column types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizedKind {
    Number,
    Text,
    Boolean,
    Binary,
    Datetime,
    Markdown,
    Json,
}

/// Registry entry for one physical column
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, Deserialize)]
pub struct FieldDescription {
    /// Physical column type as written in the DDL
    #[serde(rename = "defaultType")]
    pub default_type: String,
    #[serde(rename = "type")]
    pub kind: NormalizedKind,
}

impl FieldDescription {
    pub fn new(default_type: impl Into<String>, kind: NormalizedKind) -> Self {
        Self {
            default_type: default_type.into(),
            kind,
        }
    }
}

/// Normalized description of one table, columns kept in declaration order.
/// Serializes as a JSON object keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableDescription {
    fields: Vec<(String, FieldDescription)>,
}

impl TableDescription {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a column description
    pub fn insert(&mut self, name: impl Into<String>, description: FieldDescription) {
        let name = name.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = description,
            None => self.fields.push((name, description)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescription> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, description)| description)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldDescription)> {
        self.fields.iter().map(|(name, desc)| (name.as_str(), desc))
    }

    pub fn names(&self) -> Vec<String> {
        self.fields.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for TableDescription {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, description) in &self.fields {
            map.serialize_entry(name, description)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_description_wire_names() {
        let value = serde_json::to_value(FieldDescription::new("INTEGER", NormalizedKind::Number)).unwrap();
        assert_eq!(value, serde_json::json!({"defaultType": "INTEGER", "type": "number"}));
    }

    #[test]
    fn test_table_description_keeps_declaration_order() {
        let mut table = TableDescription::new();
        table.insert("id", FieldDescription::new("INTEGER", NormalizedKind::Number));
        table.insert("title", FieldDescription::new("TEXT", NormalizedKind::Text));
        table.insert("body", FieldDescription::new("LONGTEXT", NormalizedKind::Markdown));

        assert_eq!(table.names(), vec!["id", "title", "body"]);

        let json = serde_json::to_string(&table).unwrap();
        let id_pos = json.find("\"id\"").unwrap();
        let title_pos = json.find("\"title\"").unwrap();
        let body_pos = json.find("\"body\"").unwrap();
        assert!(id_pos < title_pos && title_pos < body_pos);
    }

    #[test]
    fn test_insert_replaces_existing_column() {
        let mut table = TableDescription::new();
        table.insert("flag", FieldDescription::new("TEXT", NormalizedKind::Text));
        table.insert("flag", FieldDescription::new("BOOLEAN", NormalizedKind::Boolean));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("flag").unwrap().kind, NormalizedKind::Boolean);
    }
}
