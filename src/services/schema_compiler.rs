//! Turns a schema document into DDL, emitted in foreign-key dependency order.
//!
//! Compilation runs in two phases. [`SchemaCompiler::compile_tables`] is
//! pure: it validates the document, resolves every field into column
//! definitions and registry descriptions, and collects dependency edges.
//! [`SchemaCompiler::compile`] then registers the descriptions and creates
//! tables through the driver, always picking a table whose dependencies
//! already exist. Ties are broken by document order, but callers should
//! rely only on the partial order.

use std::collections::{BTreeSet, HashSet};

use crate::api::middleware::AppError;
use crate::models::{
    ColumnField, FieldDescription, FieldSchema, NormalizedKind, RelationField, RelationKind,
    SchemaDocument, TableDescription, TableSchema,
};
use crate::services::database::{DbDriver, Dialect};
use crate::services::localization::Localization;
use crate::services::schema_registry::SchemaRegistry;
use crate::services::type_mapper;

/// Inputs that change how a document compiles
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Tables owned by enabled subsystems. The compiler never creates them:
    /// the caller guarantees they exist before compiling (see
    /// `DbService::with_driver`), so relations pointing at them add no
    /// ordering constraint.
    pub exempt_tables: HashSet<String>,
    pub localization: Option<Localization>,
}

/// One table, fully resolved but not yet created
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTable {
    pub name: String,
    /// Column definitions and table constraints, excluding the implicit `id`
    pub definitions: Vec<String>,
    /// Tables that must be created first
    pub dependencies: BTreeSet<String>,
    pub description: TableDescription,
}

pub struct SchemaCompiler {
    dialect: Dialect,
    options: CompileOptions,
}

impl SchemaCompiler {
    pub fn new(dialect: Dialect, options: CompileOptions) -> Self {
        Self { dialect, options }
    }

    /// Create every table of `document` and fill `registry`.
    ///
    /// Returns table names in creation order. On a dependency cycle, tables
    /// created before the cycle was detected are left in place.
    pub async fn compile(
        &self,
        document: &SchemaDocument,
        driver: &dyn DbDriver,
        registry: &SchemaRegistry,
    ) -> Result<Vec<String>, AppError> {
        let mut pending = self.compile_tables(document)?;

        registry
            .extend(
                pending
                    .iter()
                    .map(|table| (table.name.clone(), table.description.clone())),
            )
            .await;

        let mut created = Vec::with_capacity(pending.len());
        while !pending.is_empty() {
            let Some(index) = pending.iter().position(|t| t.dependencies.is_empty()) else {
                let mut blocked: Vec<String> = pending.into_iter().map(|t| t.name).collect();
                blocked.sort();
                tracing::error!("Circular dependency between tables: {}", blocked.join(", "));
                return Err(AppError::CircularDependency(blocked));
            };

            let table = pending.remove(index);
            driver.create_table(&table.name, &table.definitions).await?;
            tracing::info!("Created table {}", table.name);

            for other in pending.iter_mut() {
                other.dependencies.remove(&table.name);
            }
            created.push(table.name);
        }

        Ok(created)
    }

    /// Validate and resolve every table without touching the database
    pub fn compile_tables(&self, document: &SchemaDocument) -> Result<Vec<CompiledTable>, AppError> {
        let declared: HashSet<&str> = document.tables.iter().map(|t| t.name.as_str()).collect();
        if declared.len() != document.tables.len() {
            return Err(AppError::Schema(duplicate_message(
                "table",
                document.tables.iter().map(|t| t.name.as_str()),
            )));
        }

        document
            .tables
            .iter()
            .map(|table| self.compile_table(table, &declared))
            .collect()
    }

    fn compile_table(&self, table: &TableSchema, declared: &HashSet<&str>) -> Result<CompiledTable, AppError> {
        let mut compiled = CompiledTable {
            name: table.name.clone(),
            definitions: Vec::new(),
            dependencies: BTreeSet::new(),
            description: TableDescription::new(),
        };
        compiled
            .description
            .insert("id", FieldDescription::new("INTEGER", NormalizedKind::Number));

        let mut constraints = Vec::new();
        for field in &table.fields {
            if field.name() == "id" {
                return Err(AppError::Schema(format!(
                    "Table {} declares an id field; id is implicit",
                    table.name
                )));
            }

            match field {
                FieldSchema::Column(column) => self.add_column(&mut compiled, column)?,
                FieldSchema::Relation(relation) => {
                    if let Some(constraint) = self.add_relation(&mut compiled, relation, declared)? {
                        constraints.push(constraint);
                    }
                }
            }
        }
        compiled.definitions.extend(constraints);

        Ok(compiled)
    }

    fn add_column(&self, table: &mut CompiledTable, field: &ColumnField) -> Result<(), AppError> {
        let names = if field.localized {
            let localization = self.options.localization.as_ref().ok_or_else(|| {
                AppError::Schema(format!(
                    "Field {}.{} is localized but no locales are configured",
                    table.name, field.name
                ))
            })?;
            localization.column_names(&field.name)
        } else {
            vec![field.name.clone()]
        };

        for name in names {
            let description = type_mapper::describe(&field.field_type, self.dialect);

            let mut definition = format!("{} {}", self.dialect.quote_ident(&name)?, description.default_type);
            if field.required {
                definition.push_str(" NOT NULL");
            }
            if field.unique {
                definition.push_str(" UNIQUE");
            }

            register(table, name, description)?;
            table.definitions.push(definition);
        }

        Ok(())
    }

    /// Adds the relation's column; returns a table-level constraint when the
    /// dialect cannot declare the foreign key inline.
    fn add_relation(
        &self,
        table: &mut CompiledTable,
        field: &RelationField,
        declared: &HashSet<&str>,
    ) -> Result<Option<String>, AppError> {
        let relation = &field.relation;
        let exempt = self.options.exempt_tables.contains(&relation.table);

        if !exempt && !declared.contains(relation.table.as_str()) {
            return Err(AppError::Schema(format!(
                "Field {}.{} references unknown table {}",
                table.name, field.name, relation.table
            )));
        }

        let description = type_mapper::describe(&field.field_type, self.dialect);
        let column = self.dialect.quote_ident(&field.name)?;

        let mut reference = format!(
            "REFERENCES {}({})",
            self.dialect.quote_ident(&relation.table)?,
            self.dialect.quote_ident(&relation.column)?
        );
        if let Some(action) = relation.on_delete {
            reference.push_str(&format!(" ON DELETE {}", action.as_sql()));
        }
        if let Some(action) = relation.on_update {
            reference.push_str(&format!(" ON UPDATE {}", action.as_sql()));
        }

        let mut definition = format!("{} {}", column, description.default_type);
        if field.required {
            definition.push_str(" NOT NULL");
        }
        if relation.kind == RelationKind::OneToOne {
            definition.push_str(" UNIQUE");
        }

        let constraint = if self.dialect.inline_foreign_keys() {
            definition.push(' ');
            definition.push_str(&reference);
            None
        } else {
            Some(format!("FOREIGN KEY ({}) {}", column, reference))
        };

        register(table, field.name.clone(), description)?;
        table.definitions.push(definition);

        if exempt {
            tracing::debug!(
                "Relation {}.{} targets exempt table {}",
                table.name,
                field.name,
                relation.table
            );
        } else {
            table.dependencies.insert(relation.table.clone());
        }

        Ok(constraint)
    }
}

fn register(table: &mut CompiledTable, name: String, description: FieldDescription) -> Result<(), AppError> {
    if table.description.contains(&name) {
        return Err(AppError::Schema(format!(
            "Duplicate field {} in table {}",
            name, table.name
        )));
    }
    table.description.insert(name, description);
    Ok(())
}

fn duplicate_message<'a>(what: &str, names: impl Iterator<Item = &'a str>) -> String {
    let mut seen = HashSet::new();
    let duplicates: BTreeSet<&str> = names.filter(|name| !seen.insert(*name)).collect();
    format!(
        "Duplicate {} name: {}",
        what,
        duplicates.into_iter().collect::<Vec<_>>().join(", ")
    )
}
