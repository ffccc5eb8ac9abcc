use std::path::PathBuf;
use std::time::Instant;

use tokio_postgres::{Client, Transaction};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{EXPORT_GRAPH_FILE, EXPORT_QUERIES_FILE, SCHEMA_FILE};
use crate::dependency::{Graph, TableStatus};
use crate::error::{SubsetError, SubsetResult};
use crate::exec::csv::copy_to_csv;
use crate::exec::with_cancel;
use crate::queries::generate_export_queries;
use crate::render::{pretty_count, pretty_duration, pretty_file_size, render_tree, GraphPrinter};
use crate::schema::{catalog, save_json_file};

pub struct Export {
    pub root_table: String,
    pub filter: Option<String>,
    pub raw_query: Option<String>,
    pub out_dir: Option<PathBuf>,

    pub dry_run: bool,
    pub verbose: bool,
    pub no_animations: bool,
}

impl Export {
    /// Run the export:
    /// - read the catalog and build the dependency graph rooted at the
    ///   chosen table
    /// - generate the staging plan and run it inside a single transaction,
    ///   so every staging table sees the same snapshot
    /// - after commit, stream each staging table to `<out>/<table>.csv`
    pub async fn run(&self, client: &mut Client, token: &CancellationToken) -> SubsetResult<()> {
        let t0 = Instant::now();

        let schema = with_cancel(token, catalog::read_schema(client)).await?;
        if let Some(dir) = &self.out_dir {
            save_json_file(&schema, &dir.join(SCHEMA_FILE))?;
            debug!("extracted schema from database, saved to: {}", SCHEMA_FILE);
        }

        let mut graph = Graph::build(&schema, &self.root_table)?;
        if let Some(dir) = &self.out_dir {
            save_json_file(&graph, &dir.join(EXPORT_GRAPH_FILE))?;
            debug!("export graph calculated, saved to: {}", EXPORT_GRAPH_FILE);
        }

        let queries =
            generate_export_queries(&graph, self.filter.as_deref(), self.raw_query.as_deref());
        if let Some(dir) = &self.out_dir {
            save_json_file(&queries, &dir.join(EXPORT_QUERIES_FILE))?;
        }

        let mut printer = GraphPrinter::new(!self.verbose && !self.no_animations);
        if self.verbose || self.no_animations {
            print!("{}", render_tree(&graph));
        } else {
            printer.render(&graph);
        }

        if self.dry_run {
            info!("dry run, not executing queries");

            println!();
            for q in &queries {
                println!("{}", q.create_tmp);
                if !q.create_index.is_empty() {
                    println!("{}", q.create_index);
                }
            }
            println!();
            for q in &queries {
                println!("{}", q.copy_to_csv);
            }
            println!();

            info!("dry run complete");
            return Ok(());
        }

        let Some(out_dir) = &self.out_dir else {
            return Err(SubsetError::Config {
                reason: "an output directory is required to execute an export".to_string(),
            });
        };

        // Stage all tables inside one transaction: snapshot isolation makes
        // every staging table see the same logical instant.
        if self.verbose || self.no_animations {
            info!("begin transaction, copying data into temporary tables...");
        }
        let tx = client
            .transaction()
            .await
            .map_err(|e| SubsetError::execution("BEGIN", e))?;

        for q in &queries {
            set_status(&mut graph, &q.table, TableStatus::CopyStarted);
            printer.render(&graph);

            let started = Instant::now();
            let mut rows = 0u64;
            for stmt in [&q.create_tmp, &q.create_index] {
                if stmt.is_empty() {
                    continue;
                }
                rows += exec_tx(&tx, token, stmt).await?;
            }

            let copy_duration = started.elapsed();
            if let Some(node) = graph.tables.get_mut(&q.table) {
                node.status = TableStatus::CopyDone;
                node.rows = rows;
                node.copy_duration = copy_duration;
            }
            if self.verbose || self.no_animations {
                info!(
                    rows = %pretty_count(rows),
                    duration = %pretty_duration(copy_duration),
                    "copied temp table: {}", q.table,
                );
            }
            printer.render(&graph);
        }

        with_cancel(token, async {
            tx.commit()
                .await
                .map_err(|e| SubsetError::execution("COMMIT", e))
        })
        .await?;
        if self.verbose || self.no_animations {
            info!("commit transaction, copying complete");
        }

        // The staging tables live in the session's temporary namespace, so
        // CSV emission reuses the same connection.
        for q in &queries {
            set_status(&mut graph, &q.table, TableStatus::CsvStarted);
            printer.render(&graph);

            debug!("{}", q.copy_to_csv);
            let res = with_cancel(token, copy_to_csv(client, &q.table, &q.copy_to_csv, out_dir))
                .await?;

            if let Some(node) = graph.tables.get_mut(&q.table) {
                node.status = TableStatus::CsvDone;
                node.csv_size = res.file_size;
                node.csv_duration = res.duration;
            }
            printer.render(&graph);

            if self.verbose || self.no_animations {
                info!(
                    file = %res.file_name.display(),
                    duration = %pretty_duration(res.duration),
                    size = %pretty_file_size(res.file_size),
                    "exported table: {}", q.table,
                );
            }
        }

        info!(
            dir = %out_dir.display(),
            duration = %pretty_duration(t0.elapsed()),
            "export complete",
        );

        Ok(())
    }
}

fn set_status(graph: &mut Graph, table: &str, status: TableStatus) {
    if let Some(node) = graph.tables.get_mut(table) {
        node.status = status;
    }
}

async fn exec_tx(
    tx: &Transaction<'_>,
    token: &CancellationToken,
    stmt: &str,
) -> SubsetResult<u64> {
    debug!("{}", stmt);
    with_cancel(token, async {
        tx.execute(stmt, &[])
            .await
            .map_err(|e| SubsetError::execution(stmt, e))
    })
    .await
}
