use serde::{Deserialize, Serialize};

use crate::config::EXPORT_STAGING_PREFIX;
use crate::dependency::Graph;
use crate::queries::filter::filter_expression;

/// The statement triple materialising one table's subset into a staging
/// table and streaming it out as CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportTableQueries {
    pub table: String,
    /// CREATE TEMP TABLE … AS (…)
    pub create_tmp: String,
    /// CREATE INDEX … (empty if no join key needs one)
    pub create_index: String,
    /// COPY <staging> TO STDOUT …
    pub copy_to_csv: String,
}

/// Staging-table name for a base table during export.
pub fn staging_table(table: &str) -> String {
    format!("{}{}", EXPORT_STAGING_PREFIX, table)
}

pub fn copy_to_csv_query(table: &str) -> String {
    format!(
        "COPY {} TO STDOUT WITH CSV HEADER DELIMITER ',';",
        staging_table(table)
    )
}

/// Generate the export plan, one record per table in export order.
///
/// The root table's rows are controlled directly by the user: `filter` is
/// appended verbatim to the base select (so it may carry WHERE, ORDER BY and
/// LIMIT), while `raw` replaces the whole select. Every other table is
/// restricted to the rows required by already-staged neighbours.
pub fn generate_export_queries(
    graph: &Graph,
    filter: Option<&str>,
    raw: Option<&str>,
) -> Vec<ExportTableQueries> {
    let mut result = Vec::with_capacity(graph.export_order.len());

    for table in &graph.export_order {
        let select_cols = graph.tables[table].include_cols.join(", ");

        let select_query = if table == &graph.root_table {
            match raw {
                Some(raw) => raw.to_string(),
                None => {
                    let mut q = format!("SELECT {} FROM {}", select_cols, table);
                    if let Some(filter) = filter {
                        q.push(' ');
                        q.push_str(filter);
                    }
                    q
                }
            }
        } else {
            format!(
                "SELECT {} FROM {} WHERE {}",
                select_cols,
                table,
                filter_expression(graph, table)
            )
        };

        result.push(ExportTableQueries {
            table: table.clone(),
            create_tmp: format!(
                "CREATE TEMP TABLE {} AS ({});",
                staging_table(table),
                select_query
            ),
            create_index: index_query(graph, table),
            copy_to_csv: copy_to_csv_query(table),
        });
    }

    result
}

/// Index the staging table on the columns later tables will probe with
/// `IN (SELECT …)`. Those are the join keys of every FK edge whose other
/// endpoint comes after this table in the export order.
fn index_query(graph: &Graph, table: &str) -> String {
    let position = |name: &str| graph.export_order.iter().position(|t| t == name);

    let mut index_cols: Vec<String> = Vec::new();
    for rel in &graph.relations {
        let (Some(from_pos), Some(to_pos)) = (position(&rel.from_table), position(&rel.to_table))
        else {
            continue;
        };

        if rel.to_table == table && from_pos > to_pos && !index_cols.contains(&rel.to_column) {
            index_cols.push(rel.to_column.clone());
        }
        if rel.from_table == table && from_pos < to_pos && !index_cols.contains(&rel.from_column) {
            index_cols.push(rel.from_column.clone());
        }
    }

    if index_cols.is_empty() {
        return String::new();
    }
    format!(
        "CREATE INDEX ON {} ({});",
        staging_table(table),
        index_cols.join(",")
    )
}
