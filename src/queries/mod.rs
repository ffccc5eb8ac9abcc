//! SQL statement generation for the export and import plans
//!
//! All generators are pure functions over the graph: they emit statement
//! strings in plan order and never touch the database. Iteration anywhere
//! near an unordered mapping sorts first, so the emitted SQL is
//! byte-identical across runs.

pub mod export;
pub mod filter;
pub mod import;

pub use export::{generate_export_queries, staging_table, ExportTableQueries};
pub use filter::filter_expression;
pub use import::{
    ensure_upsert_available, generate_import_queries, import_staging_table, ImportTableQueries,
};
