use serde::Deserialize;
use std::path::Path;

use crate::api::middleware::AppError;

/// Declarative schema document, usually read from `schema.yaml`
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaDocument {
    pub tables: Vec<TableSchema>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableSchema {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

/// A field is either a plain column or a relation owning a foreign-key column.
///
/// The document tells them apart by the presence of a `relation` key.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FieldSchema {
    Relation(RelationField),
    Column(ColumnField),
}

impl FieldSchema {
    pub fn name(&self) -> &str {
        match self {
            FieldSchema::Relation(field) => &field.name,
            FieldSchema::Column(field) => &field.name,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub localized: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelationField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
    pub relation: Relation,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub table: String,
    #[serde(default = "default_relation_column")]
    pub column: String,
    pub kind: RelationKind,
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
}

fn default_relation_column() -> String {
    "id".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    OneToOne,
    ManyToOne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReferentialAction {
    Cascade,
    SetNull,
    Restrict,
    NoAction,
    SetDefault,
}

impl ReferentialAction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::SetDefault => "SET DEFAULT",
        }
    }
}

impl SchemaDocument {
    /// Parse a YAML (or JSON) schema document
    pub fn from_yaml_str(raw: &str) -> Result<Self, AppError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Schema(format!("Failed to read schema document {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOG_SCHEMA: &str = r#"
tables:
  - name: authors
    fields:
      - name: name
        type: VARCHAR(255)
        required: true
        unique: true
      - name: bio
        type: markdown
        localized: true
  - name: posts
    fields:
      - name: title
        type: TEXT
      - name: author
        type: INTEGER
        required: true
        relation:
          table: authors
          column: id
          kind: many-to-one
          onDelete: cascade
      - name: cover
        type: INTEGER
        relation:
          table: media
          kind: one-to-one
          onDelete: setNull
          onUpdate: noAction
"#;

    #[test]
    fn test_parse_column_and_relation_fields() {
        let doc = SchemaDocument::from_yaml_str(BLOG_SCHEMA).unwrap();
        assert_eq!(doc.tables.len(), 2);

        match &doc.tables[0].fields[0] {
            FieldSchema::Column(field) => {
                assert_eq!(field.name, "name");
                assert_eq!(field.field_type, "VARCHAR(255)");
                assert!(field.required);
                assert!(field.unique);
                assert!(!field.localized);
            }
            other => panic!("expected column field, got {:?}", other),
        }

        match &doc.tables[1].fields[1] {
            FieldSchema::Relation(field) => {
                assert_eq!(field.relation.table, "authors");
                assert_eq!(field.relation.kind, RelationKind::ManyToOne);
                assert_eq!(field.relation.on_delete, Some(ReferentialAction::Cascade));
                assert!(field.required);
            }
            other => panic!("expected relation field, got {:?}", other),
        }
    }

    #[test]
    fn test_relation_column_defaults_to_id() {
        let doc = SchemaDocument::from_yaml_str(BLOG_SCHEMA).unwrap();
        match &doc.tables[1].fields[2] {
            FieldSchema::Relation(field) => {
                assert_eq!(field.relation.column, "id");
                assert_eq!(field.relation.kind, RelationKind::OneToOne);
                assert_eq!(field.relation.on_update, Some(ReferentialAction::NoAction));
            }
            other => panic!("expected relation field, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_relation_kind_is_rejected() {
        let raw = r#"
tables:
  - name: tags
    fields:
      - name: posts
        type: INTEGER
        relation:
          table: posts
          kind: many-to-many
"#;
        assert!(matches!(
            SchemaDocument::from_yaml_str(raw),
            Err(AppError::Schema(_))
        ));
    }

    #[test]
    fn test_json_documents_are_accepted() {
        let raw = r#"{"tables": [{"name": "notes", "fields": [{"name": "body", "type": "TEXT"}]}]}"#;
        let doc = SchemaDocument::from_yaml_str(raw).unwrap();
        assert_eq!(doc.tables[0].fields[0].name(), "body");
    }

    #[test]
    fn test_referential_action_sql() {
        assert_eq!(ReferentialAction::SetNull.as_sql(), "SET NULL");
        assert_eq!(ReferentialAction::NoAction.as_sql(), "NO ACTION");
        assert_eq!(ReferentialAction::SetDefault.as_sql(), "SET DEFAULT");
    }
}
