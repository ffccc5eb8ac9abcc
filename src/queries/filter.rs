use std::collections::BTreeMap;

use crate::dependency::Graph;
use crate::queries::export::staging_table;

/// Build the boolean expression restricting a non-root table to exactly the
/// rows required by staging tables created earlier in the export order.
///
/// For every FK edge touching the table, the endpoint positioned earlier in
/// the export order contributes an `IN (SELECT … FROM <staging>)` test;
/// edges whose other endpoint comes later are ignored, as their staging
/// tables do not exist yet. Sub-selects against the same column are merged
/// with UNION DISTINCT so sibling referrers of one parent do not repeat
/// each key in the IN list.
///
/// Returns `TRUE` when no edge contributes, e.g. for isolated tables.
pub fn filter_expression(graph: &Graph, table: &str) -> String {
    let position = |name: &str| graph.export_order.iter().position(|t| t == name);

    let mut col_filters: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for rel in &graph.relations {
        let (Some(from_pos), Some(to_pos)) = (position(&rel.from_table), position(&rel.to_table))
        else {
            continue;
        };

        if rel.from_table == table && from_pos > to_pos {
            let column = format!("{}.{}", rel.from_table, rel.from_column);
            let ids_query = format!(
                "SELECT {} FROM {}",
                rel.to_column,
                staging_table(&rel.to_table)
            );
            col_filters.entry(column).or_default().push(ids_query);
        }

        if rel.to_table == table && from_pos < to_pos {
            let column = format!("{}.{}", rel.to_table, rel.to_column);
            let ids_query = format!(
                "SELECT {} FROM {}",
                rel.from_column,
                staging_table(&rel.from_table)
            );
            col_filters.entry(column).or_default().push(ids_query);
        }
    }

    let mut clauses: Vec<String> = col_filters
        .into_iter()
        .map(|(column, selects)| format!("{} IN ({})", column, selects.join(" UNION DISTINCT ")))
        .collect();
    clauses.sort();

    if clauses.is_empty() {
        return "TRUE".to_string();
    }

    clauses
        .iter()
        .map(|clause| format!("({})", clause))
        .collect::<Vec<_>>()
        .join(" OR ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::graph::tests::company_schema;

    #[test]
    fn test_filter_for_tag_reached_last() {
        let graph = Graph::build(&company_schema(), "company").unwrap();

        // Both referrers are staged before tag; their sub-selects target the
        // same column and collapse into a single deduplicated IN test.
        assert_eq!(
            filter_expression(&graph, "tag"),
            "(tag.id IN (SELECT tag_id FROM tmp_mini_company_tag \
             UNION DISTINCT SELECT tag_id FROM tmp_mini_website_tag))"
        );
    }

    #[test]
    fn test_filter_for_downstream_table() {
        let graph = Graph::build(&company_schema(), "company").unwrap();

        assert_eq!(
            filter_expression(&graph, "website"),
            "(website.company_id IN (SELECT id FROM tmp_mini_company))"
        );
    }

    #[test]
    fn test_filter_combines_distinct_columns_with_or() {
        // Rooted at tag, website lands last of its neighbourhood: it is
        // constrained both by its FK onto company and by website_tag's FK
        // onto it. The clauses target different columns, so they stay
        // separate and sort lexicographically.
        let graph = Graph::build(&company_schema(), "tag").unwrap();

        assert_eq!(
            filter_expression(&graph, "website"),
            "(website.company_id IN (SELECT id FROM tmp_mini_company)) \
             OR (website.id IN (SELECT website_id FROM tmp_mini_website_tag))"
        );
    }

    #[test]
    fn test_filter_ignores_edges_staged_later() {
        let graph = Graph::build(&company_schema(), "company").unwrap();

        // tag comes last, so company_tag's edge onto tag contributes nothing.
        let filter = filter_expression(&graph, "company_tag");
        assert!(!filter.contains("tmp_mini_tag"));
        assert_eq!(
            filter,
            "(company_tag.company_id IN (SELECT id FROM tmp_mini_company))"
        );
    }

    #[test]
    fn test_filter_isolated_table_is_true() {
        let mut schema = company_schema();
        schema.tables.insert(
            "migrations".into(),
            crate::schema::TableSchema {
                name: "migrations".into(),
                ..Default::default()
            },
        );

        let graph = Graph::build(&schema, "company").unwrap();
        assert_eq!(filter_expression(&graph, "migrations"), "TRUE");
    }

    #[test]
    fn test_filter_never_references_later_staging_tables() {
        let graph = Graph::build(&company_schema(), "website").unwrap();

        for (pos, table) in graph.export_order.iter().enumerate().skip(1) {
            let filter = filter_expression(&graph, table);
            for later in &graph.export_order[pos..] {
                assert!(
                    !filter.contains(&staging_table(later)),
                    "filter for {} references staging of {}",
                    table,
                    later
                );
            }
        }
    }
}
