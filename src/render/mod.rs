//! Terminal rendering of the dependency tree and human-readable units

use std::collections::BTreeSet;
use std::io::Write;
use std::time::Duration;

use crate::dependency::{Graph, TableStatus};

/// Compact row counts: 999, 12k, 3M, 2B
pub fn pretty_count(count: u64) -> String {
    let mut value = count as f64;
    for unit in ["", "k", "M", "B"] {
        if value < 1e3 {
            return format!("{:.0}{}", value, unit);
        }
        value /= 1e3;
    }
    format!("{:.0}T", value)
}

/// Compact file sizes: 120B, 45kB, 3MB
pub fn pretty_file_size(size: u64) -> String {
    let mut value = size as f64;
    for unit in ["B", "kB", "MB", "GB"] {
        if value < 1e3 {
            return format!("{:.0}{}", value, unit);
        }
        value /= 1e3;
    }
    format!("{:.0}TB", value)
}

/// Durations rounded coarser the longer they run
pub fn pretty_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 1.0 {
        format!("{}ms", d.as_millis())
    } else if secs < 15.0 {
        format!("{:.2}s", secs)
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{}m{}s", d.as_secs() / 60, d.as_secs() % 60)
    }
}

/// Render the FK graph as a tree, one root per table without outgoing
/// foreign keys, annotated with the per-table run status.
pub fn render_tree(graph: &Graph) -> String {
    let mut buf = String::new();

    let roots: Vec<&String> = graph
        .tables
        .values()
        .filter(|t| t.references_tbl.is_empty())
        .map(|t| &t.name)
        .collect();

    for (i, root) in roots.iter().enumerate() {
        if i > 0 {
            buf.push('\n');
        }
        let mut seen = BTreeSet::new();
        render_table(graph, &mut buf, root, &mut seen, 0, i == roots.len() - 1, "");
    }

    buf
}

fn render_table(
    graph: &Graph,
    buf: &mut String,
    table_name: &str,
    seen: &mut BTreeSet<String>,
    level: usize,
    is_last: bool,
    prefix: &str,
) {
    if seen.contains(table_name) {
        buf.push_str(&format!("{}{} (circular ref)\n", prefix, table_name));
        return;
    }

    let Some(table) = graph.tables.get(table_name) else {
        return;
    };

    let status = match table.status {
        TableStatus::Initial => String::new(),
        TableStatus::CopyStarted => " copying...".to_string(),
        TableStatus::CopyDone => format!(
            " ({} rows, {})",
            pretty_count(table.rows),
            pretty_duration(table.copy_duration)
        ),
        TableStatus::CsvStarted => format!(
            " ({} rows, {}) writing csv...",
            pretty_count(table.rows),
            pretty_duration(table.copy_duration)
        ),
        TableStatus::CsvDone => format!(
            " ({} rows, {}, copy {}, csv {})",
            pretty_count(table.rows),
            pretty_file_size(table.csv_size),
            pretty_duration(table.copy_duration),
            pretty_duration(table.csv_duration)
        ),
    };

    if level == 0 {
        buf.push_str(&format!("{}{}{}\n", prefix, table_name, status));
    } else {
        let branch = if is_last { "└── " } else { "├── " };
        buf.push_str(&format!("{}{}{}{}\n", prefix, branch, table_name, status));
    }

    seen.insert(table_name.to_string());

    if !table.referenced_by_tbl.is_empty() {
        let mut child_prefix = prefix.to_string();
        if level > 0 {
            child_prefix.push_str(if is_last { "    " } else { "│   " });
        }

        let refs: Vec<&String> = table.referenced_by_tbl.iter().collect();
        for (i, referrer) in refs.iter().enumerate() {
            render_table(
                graph,
                buf,
                referrer,
                seen,
                level + 1,
                i == refs.len() - 1,
                &child_prefix,
            );
        }
    }

    seen.remove(table_name);
}

/// Repaints the dependency tree in place between driver steps. Disabled in
/// verbose / no-animation mode, where per-table log lines replace it.
pub struct GraphPrinter {
    enabled: bool,
    last_lines: usize,
}

impl GraphPrinter {
    pub fn new(enabled: bool) -> Self {
        GraphPrinter {
            enabled,
            last_lines: 0,
        }
    }

    pub fn render(&mut self, graph: &Graph) {
        if !self.enabled {
            return;
        }

        let out = render_tree(graph);
        let mut stdout = std::io::stdout().lock();
        if self.last_lines > 0 {
            let _ = write!(stdout, "\x1b[{}A", self.last_lines);
        }
        for line in out.lines() {
            let _ = writeln!(stdout, "\x1b[2K{}", line);
        }
        let _ = stdout.flush();
        self.last_lines = out.lines().count();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::graph::tests::company_schema;
    use crate::schema::ForeignKey;

    #[test]
    fn test_pretty_count() {
        assert_eq!(pretty_count(0), "0");
        assert_eq!(pretty_count(999), "999");
        assert_eq!(pretty_count(12_000), "12k");
        assert_eq!(pretty_count(3_400_000), "3M");
    }

    #[test]
    fn test_pretty_file_size() {
        assert_eq!(pretty_file_size(120), "120B");
        assert_eq!(pretty_file_size(45_000), "45kB");
        assert_eq!(pretty_file_size(45_000_000), "45MB");
    }

    #[test]
    fn test_pretty_duration() {
        assert_eq!(pretty_duration(Duration::from_millis(342)), "342ms");
        assert_eq!(pretty_duration(Duration::from_millis(1_230)), "1.23s");
        assert_eq!(pretty_duration(Duration::from_secs(21)), "21.0s");
        assert_eq!(pretty_duration(Duration::from_secs(75)), "1m15s");
    }

    #[test]
    fn test_render_tree_company() {
        let graph = Graph::build(&company_schema(), "company").unwrap();

        assert_eq!(
            render_tree(&graph),
            "company\n\
             ├── company_tag\n\
             └── website\n\
             \u{20}   └── website_tag\n\
             \n\
             tag\n\
             ├── company_tag\n\
             └── website_tag\n"
        );
    }

    #[test]
    fn test_render_tree_marks_circular_reference() {
        let mut schema = company_schema();
        schema.relations.push(ForeignKey {
            from_table: "website".to_string(),
            from_column: "parent_id".to_string(),
            to_table: "website".to_string(),
            to_column: "id".to_string(),
        });

        let graph = Graph::build(&schema, "company").unwrap();
        let out = render_tree(&graph);
        assert!(out.contains("website (circular ref)"));
    }
}
