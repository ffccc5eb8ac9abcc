//! Create and restore consistent partial Postgres backups.
//!
//! Given a root table and an optional filter, the export path extracts a
//! subset of rows and transitively collects exactly the rows from every
//! reachable table required to keep foreign keys intact. The backup is a
//! directory of per-table CSV files plus a captured schema descriptor; the
//! import path replays those CSVs in dependency order, optionally
//! truncating first or upserting on a conflict target.

pub mod config;
pub mod dependency;
pub mod error;
pub mod exec;
pub mod queries;
pub mod render;
pub mod schema;

pub use error::{SubsetError, SubsetResult};
pub use exec::{Export, Import};
