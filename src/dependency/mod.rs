//! Foreign-key dependency graph and table-order planning
//!
//! [`Graph::build`] turns a catalog snapshot into a directed graph with
//! per-table adjacency sets, then derives the two linear plans everything
//! else consumes: the export order (root-outward, so every non-root table
//! can be filtered by already-staged neighbours) and the import order (a
//! plain dependency-respecting topological sort).

pub mod graph;
pub mod order;

pub use graph::{Graph, TableNode, TableStatus};
pub use order::{calculate_export_order, calculate_import_order};
