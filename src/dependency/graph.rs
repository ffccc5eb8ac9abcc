use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dependency::order::{calculate_export_order, calculate_import_order};
use crate::error::SubsetResult;
use crate::schema::{ForeignKey, Schema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    #[default]
    Initial,
    CopyStarted,
    CopyDone,
    CsvStarted,
    CsvDone,
}

/// One node per table reachable via any foreign-key edge, plus isolated
/// tables. Adjacency sets are sorted so every downstream plan is
/// deterministic regardless of catalog row order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableNode {
    pub name: String,
    /// Tables this table depends on (outgoing FK targets)
    pub references_tbl: BTreeSet<String>,
    /// Tables that depend on this table
    pub referenced_by_tbl: BTreeSet<String>,
    /// Non-generated columns in ordinal order
    pub include_cols: Vec<String>,

    // Runtime fields, mutated only by the execution drivers.
    #[serde(default)]
    pub status: TableStatus,
    #[serde(default)]
    pub rows: u64,
    #[serde(default)]
    pub copy_duration: Duration,
    #[serde(default)]
    pub csv_duration: Duration,
    #[serde(default)]
    pub csv_size: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    pub root_table: String,
    pub tables: BTreeMap<String, TableNode>,
    /// Flat edge list carried verbatim from the schema; the planners and
    /// the filter builder re-scan it
    pub relations: Vec<ForeignKey>,
    pub export_order: Vec<String>,
    pub import_order: Vec<String>,
}

impl Graph {
    /// Build the dependency graph and both table orders, rooted at the
    /// user-chosen table.
    ///
    /// Fails with [`crate::SubsetError::UnknownRootTable`] if the root does
    /// not exist, and with the planner errors on cyclic foreign keys.
    pub fn build(schema: &Schema, root_table: &str) -> SubsetResult<Self> {
        let mut graph = Self::assemble(schema);
        graph.root_table = root_table.to_string();

        graph.export_order = calculate_export_order(&graph.tables, root_table)?;
        graph.import_order = calculate_import_order(&graph.tables)?;

        Ok(graph)
    }

    /// Build the graph with only the import order. Used by restore runs
    /// that did not name a root table: the import order does not depend on
    /// one.
    pub fn build_unrooted(schema: &Schema) -> SubsetResult<Self> {
        let mut graph = Self::assemble(schema);
        graph.import_order = calculate_import_order(&graph.tables)?;
        Ok(graph)
    }

    fn assemble(schema: &Schema) -> Self {
        let mut tables: BTreeMap<String, TableNode> = BTreeMap::new();

        let node = |tables: &mut BTreeMap<String, TableNode>, name: &str| {
            if !tables.contains_key(name) {
                tables.insert(
                    name.to_string(),
                    TableNode {
                        name: name.to_string(),
                        include_cols: schema
                            .table(name)
                            .map(|t| t.include_cols())
                            .unwrap_or_default(),
                        ..Default::default()
                    },
                );
            }
        };

        for rel in &schema.relations {
            node(&mut tables, &rel.from_table);
            node(&mut tables, &rel.to_table);
        }

        // Tables that appear in no edge still get an isolated node.
        for name in schema.tables.keys() {
            node(&mut tables, name);
        }

        for rel in &schema.relations {
            if let Some(from) = tables.get_mut(&rel.from_table) {
                from.references_tbl.insert(rel.to_table.clone());
            }
            if let Some(to) = tables.get_mut(&rel.to_table) {
                to.referenced_by_tbl.insert(rel.from_table.clone());
            }
        }

        Graph {
            root_table: String::new(),
            tables,
            relations: schema.relations.clone(),
            export_order: Vec::new(),
            import_order: Vec::new(),
        }
    }
}
