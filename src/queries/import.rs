use serde::{Deserialize, Serialize};

use crate::config::IMPORT_STAGING_PREFIX;
use crate::dependency::Graph;
use crate::error::{SubsetError, SubsetResult};
use crate::schema::Schema;

/// The statements replaying one table's CSV, in both plain-copy and upsert
/// flavours. Which subset runs is decided at execution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportTableQueries {
    pub table: String,
    /// TRUNCATE TABLE … CASCADE (truncate mode only)
    pub truncate: String,
    /// COPY <table> (…) FROM STDIN … (plain mode)
    pub copy: String,
    /// CREATE TEMP TABLE <staging> (LIKE …) (upsert mode)
    pub create_temp: String,
    /// COPY <staging> (…) FROM STDIN … (upsert mode)
    pub copy_temp: String,
    /// INSERT … ON CONFLICT …; empty when the table has no conflict target
    pub upsert: String,
    /// DROP TABLE IF EXISTS <staging> (upsert mode)
    pub drop_temp: String,
}

/// Staging-table name for a base table during upsert import.
pub fn import_staging_table(table: &str) -> String {
    format!("{}{}", IMPORT_STAGING_PREFIX, table)
}

/// Generate the import plan, one record per table in import order.
pub fn generate_import_queries(graph: &Graph, schema: &Schema) -> Vec<ImportTableQueries> {
    let mut result = Vec::with_capacity(graph.import_order.len());

    for table in &graph.import_order {
        let cols = graph.tables[table].include_cols.join(", ");
        let staging = import_staging_table(table);

        result.push(ImportTableQueries {
            table: table.clone(),
            truncate: format!("TRUNCATE TABLE {} CASCADE;", table),
            copy: format!(
                "COPY {} ({}) FROM STDIN WITH CSV HEADER DELIMITER ',';",
                table, cols
            ),
            create_temp: format!("CREATE TEMP TABLE {} (LIKE {} INCLUDING ALL);", staging, table),
            copy_temp: format!(
                "COPY {} ({}) FROM STDIN WITH CSV HEADER DELIMITER ',';",
                staging, cols
            ),
            upsert: upsert_query(graph, schema, table),
            drop_temp: format!("DROP TABLE IF EXISTS {};", staging),
        });
    }

    result
}

/// Upsert mode needs a conflict target on every table; verify that before
/// anything executes.
pub fn ensure_upsert_available(queries: &[ImportTableQueries]) -> SubsetResult<()> {
    let missing: Vec<String> = queries
        .iter()
        .filter(|q| q.upsert.is_empty())
        .map(|q| q.table.clone())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(SubsetError::UpsertNotAvailable { tables: missing })
    }
}

/// INSERT … SELECT from the import staging table with an ON CONFLICT
/// clause. The conflict target is the primary key if the table has one,
/// otherwise its first unique constraint; without either the upsert is not
/// expressible and the empty string is returned.
fn upsert_query(graph: &Graph, schema: &Schema, table: &str) -> String {
    let Some(table_schema) = schema.table(table) else {
        return String::new();
    };

    let conflict_cols: &[String] = if !table_schema.primary_key.is_empty() {
        &table_schema.primary_key
    } else if let Some(unique) = table_schema.unique_constraints.first() {
        unique
    } else {
        return String::new();
    };

    let include_cols = &graph.tables[table].include_cols;
    let update_cols: Vec<&String> = include_cols
        .iter()
        .filter(|c| !conflict_cols.contains(c))
        .collect();

    let do_clause = if update_cols.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!(
            "DO UPDATE SET {}",
            update_cols
                .iter()
                .map(|c| format!("{} = EXCLUDED.{}", c, c))
                .collect::<Vec<_>>()
                .join(", ")
        )
    };

    let cols = include_cols.join(", ");
    format!(
        "INSERT INTO {} ({}) SELECT {} FROM {} ON CONFLICT ({}) {};",
        table,
        cols,
        cols,
        import_staging_table(table),
        conflict_cols.join(", "),
        do_clause
    )
}
