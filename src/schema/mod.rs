//! Catalog snapshot: tables, columns and foreign-key edges
//!
//! The schema is read once per run from the live catalog
//! (`information_schema`) and, during restore, loaded back from the
//! `schema.json` artifact produced by export.
//!
//! ## Key Components
//!
//! - [`Schema`]: tables plus the flat foreign-key edge list
//! - [`catalog::read_schema`]: catalog reader for a live connection
//! - [`save_json_file`] / [`load_json_file`]: JSON artifact persistence

pub mod catalog;
pub mod types;

pub use types::{ColumnSchema, ForeignKey, Schema, TableSchema};

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{SubsetError, SubsetResult};

/// Write a JSON artifact, creating parent directories as needed.
pub fn save_json_file<T: Serialize>(value: &T, file: &Path) -> SubsetResult<()> {
    if let Some(dir) = file.parent() {
        std::fs::create_dir_all(dir).map_err(|e| SubsetError::io(dir.display(), e))?;
    }

    let f = std::fs::File::create(file).map_err(|e| SubsetError::io(file.display(), e))?;
    serde_json::to_writer(std::io::BufWriter::new(f), value)?;
    Ok(())
}

/// Read a JSON artifact back.
pub fn load_json_file<T: DeserializeOwned>(file: &Path) -> SubsetResult<T> {
    let contents =
        std::fs::read(file).map_err(|e| SubsetError::io(file.display(), e))?;
    Ok(serde_json::from_slice(&contents)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("nested").join("schema.json");

        let mut schema = Schema::default();
        schema.tables.insert(
            "tag".to_string(),
            TableSchema {
                name: "tag".to_string(),
                ..Default::default()
            },
        );

        save_json_file(&schema, &file).unwrap();
        let back: Schema = load_json_file(&file).unwrap();

        assert!(back.tables.contains_key("tag"));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = load_json_file::<Schema>(Path::new("/nonexistent/schema.json")).unwrap_err();
        assert!(matches!(err, SubsetError::Io { .. }));
    }
}
