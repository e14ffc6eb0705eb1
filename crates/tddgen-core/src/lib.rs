//! tddgen-core: Core library for filling `.tdd` templates
//!
//! This crate provides:
//! - The static field schema (original offsets measured on the blank template)
//! - The offset-cascading injector that splices field values into the template
//! - Page-based field extraction from incoming documents
//! - `key=value` configuration loading shared by the injector and the watcher
//! - Output persistence without leftover partial files

pub mod config;
pub mod error;
pub mod extract;
pub mod inject;
pub mod output;
pub mod schema;
pub mod values;

pub use config::{default_config_path, load_config, Config};
pub use error::{exit_code, ConfigError, ExtractError, InjectError};
pub use extract::{collapse_lines, extract_fields, strip_alias, PagedDocument, PdfDocument};
pub use inject::{inject, Injection, Placement};
pub use output::{fill_template, output_name, output_path, write_output};
pub use schema::{validate_schema, FieldSpec, IDENTIFYING_FIELD, TDD_EXTENSION, TDD_SCHEMA};
pub use values::FieldValues;
