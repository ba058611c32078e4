pub mod database; // Dialect drivers and statement building
pub mod db_service;
pub mod filter_compiler;
pub mod localization;
pub mod schema_compiler;
pub mod schema_registry;
pub mod type_mapper;

pub use db_service::*;
pub use localization::Localization;
pub use schema_compiler::{CompileOptions, CompiledTable, SchemaCompiler};
pub use schema_registry::SchemaRegistry;
