use std::path::PathBuf;
use std::time::Instant;

use tokio_postgres::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{IMPORT_GRAPH_FILE, SCHEMA_FILE};
use crate::dependency::Graph;
use crate::error::{SubsetError, SubsetResult};
use crate::exec::csv::copy_from_csv;
use crate::exec::with_cancel;
use crate::queries::{ensure_upsert_available, generate_import_queries, ImportTableQueries};
use crate::render::{pretty_count, pretty_duration, pretty_file_size, render_tree};
use crate::schema::{load_json_file, save_json_file, Schema};

pub struct Import {
    pub root_table: Option<String>,
    pub truncate: bool,
    pub upsert: bool,
    pub out_dir: PathBuf,

    pub dry_run: bool,
    pub verbose: bool,
    pub no_animations: bool,
}

impl Import {
    /// Run the import:
    /// - load the captured schema from the export directory and rebuild the
    ///   graph (the import order does not need a root table)
    /// - replay each table's CSV in dependency order, either via plain COPY
    ///   or via the staging + upsert triple
    ///
    /// No transaction spans the tables: the order itself keeps every prefix
    /// of the run referentially consistent.
    pub async fn run(&self, client: &Client, token: &CancellationToken) -> SubsetResult<()> {
        let t0 = Instant::now();

        let schema: Schema = load_json_file(&self.out_dir.join(SCHEMA_FILE))?;
        debug!("loaded schema from: {}", SCHEMA_FILE);

        let graph = match &self.root_table {
            Some(root) => Graph::build(&schema, root)?,
            None => Graph::build_unrooted(&schema)?,
        };
        save_json_file(&graph, &self.out_dir.join(IMPORT_GRAPH_FILE))?;
        debug!("import graph calculated, saved to: {}", IMPORT_GRAPH_FILE);

        let queries = generate_import_queries(&graph, &schema);
        if self.upsert {
            ensure_upsert_available(&queries)?;
        }

        if self.verbose || self.no_animations {
            print!("{}", render_tree(&graph));
        }

        if self.dry_run {
            info!("dry run, not executing queries");

            println!();
            for q in &queries {
                if self.truncate {
                    println!("{}", q.truncate);
                }
                if self.upsert {
                    println!("{}", q.create_temp);
                    println!("{}", q.copy_temp);
                    println!("{}", q.upsert);
                    println!("{}", q.drop_temp);
                } else {
                    println!("{}", q.copy);
                }
            }
            println!();

            info!("dry run complete");
            return Ok(());
        }

        info!("importing...");

        for q in &queries {
            if self.truncate {
                exec(client, token, &q.truncate).await?;
                if self.verbose || self.no_animations {
                    info!("truncated table: {}", q.table);
                }
            }

            let res = if self.upsert {
                self.import_with_upsert(client, token, q).await?
            } else {
                debug!("{}", q.copy);
                let csv_file = self.out_dir.join(format!("{}.csv", q.table));
                with_cancel(token, copy_from_csv(client, &q.copy, &csv_file)).await?
            };

            if self.verbose || self.no_animations {
                info!(
                    rows = %pretty_count(res.rows),
                    duration = %pretty_duration(res.duration),
                    size = %pretty_file_size(res.file_size),
                    "imported CSV: {}", q.table,
                );
            }
        }

        info!(duration = %pretty_duration(t0.elapsed()), "import complete");

        Ok(())
    }

    /// The upsert triple for one table is an indivisible sub-sequence: any
    /// failing step aborts the whole run.
    async fn import_with_upsert(
        &self,
        client: &Client,
        token: &CancellationToken,
        q: &ImportTableQueries,
    ) -> SubsetResult<crate::exec::csv::CopyInResult> {
        exec(client, token, &q.create_temp).await?;

        debug!("{}", q.copy_temp);
        let csv_file = self.out_dir.join(format!("{}.csv", q.table));
        let res = with_cancel(token, copy_from_csv(client, &q.copy_temp, &csv_file)).await?;

        exec(client, token, &q.upsert).await?;
        exec(client, token, &q.drop_temp).await?;

        Ok(res)
    }
}

async fn exec(client: &Client, token: &CancellationToken, stmt: &str) -> SubsetResult<u64> {
    debug!("{}", stmt);
    with_cancel(token, async {
        client
            .execute(stmt, &[])
            .await
            .map_err(|e| SubsetError::execution(stmt, e))
    })
    .await
}
