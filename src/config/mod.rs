/// Prefix for the session-temporary staging tables created during export
pub const EXPORT_STAGING_PREFIX: &str = "tmp_mini_";

/// Prefix for the session-temporary staging tables created during upsert import
pub const IMPORT_STAGING_PREFIX: &str = "tmp_import_";

/// Buffer size for streaming COPY data to and from CSV files
pub const COPY_BUFFER_SIZE: usize = 1024 * 1024;

/// Captured schema descriptor, written by export and read back by import
pub const SCHEMA_FILE: &str = "schema.json";

/// Debug artifact: the materialised graph of the export run
pub const EXPORT_GRAPH_FILE: &str = "export_graph.json";

/// Debug artifact: the materialised graph of the import run
pub const IMPORT_GRAPH_FILE: &str = "import_graph.json";

/// Debug artifact: the export statement plan
pub const EXPORT_QUERIES_FILE: &str = "export_queries.json";
