use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tokio_postgres::{Client, NoTls};
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing_subscriber::EnvFilter;

use pg_subset::{Export, Import, SubsetError, SubsetResult};

#[derive(Parser)]
#[command(
    name = "pg_subset",
    about = "Create and restore consistent partial Postgres backups",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract a referentially consistent subset of the database to CSV files
    Export(ExportArgs),
    /// Replay previously exported CSV files into a compatible database
    Import(ImportArgs),
}

#[derive(Args)]
struct ExportArgs {
    /// Database connection string
    #[arg(long)]
    conn: String,

    /// The top-level table this export is based on
    #[arg(long)]
    table: String,

    /// Raw SQL fragment appended to the root select,
    /// e.g. "WHERE country_code = 'DE' ORDER BY random() LIMIT 10000"
    #[arg(long, conflicts_with = "raw")]
    filter: Option<String>,

    /// Replace the whole root select with a raw query, for more advanced
    /// subsets than --filter allows
    #[arg(long)]
    raw: Option<String>,

    /// Directory to write the exported files to
    #[arg(long)]
    out: Option<PathBuf>,

    /// Print the statement plan without executing it
    #[arg(long)]
    dry: bool,

    #[arg(long)]
    verbose: bool,

    /// Disable the animated dependency tree
    #[arg(long)]
    no_animations: bool,
}

#[derive(Args)]
struct ImportArgs {
    /// Database connection string
    #[arg(long)]
    conn: String,

    /// The root table used for the export
    #[arg(long)]
    table: Option<String>,

    /// Truncate each target table before importing
    #[arg(long, conflicts_with = "upsert")]
    truncate: bool,

    /// Insert with ON CONFLICT instead of plain COPY
    #[arg(long)]
    upsert: bool,

    /// Directory containing the exported files
    #[arg(long)]
    out: PathBuf,

    /// Print the statement plan without executing it
    #[arg(long)]
    dry: bool,

    #[arg(long)]
    verbose: bool,

    /// Disable the animated dependency tree
    #[arg(long)]
    no_animations: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let verbose = match &cli.command {
        Command::Export(args) => args.verbose,
        Command::Import(args) => args.verbose,
    };
    init_logger(verbose);

    let token = CancellationToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!();
                tracing::warn!("aborting...");
                token.cancel();
            }
        });
    }

    let result = match cli.command {
        Command::Export(args) => run_export(args, &token).await,
        Command::Import(args) => run_import(args, &token).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_export(args: ExportArgs, token: &CancellationToken) -> SubsetResult<()> {
    if args.out.is_none() && !args.dry {
        return Err(SubsetError::Config {
            reason: "must provide an output directory".to_string(),
        });
    }

    let mut client = connect(&args.conn).await?;

    let export = Export {
        root_table: args.table,
        filter: args.filter,
        raw_query: args.raw,
        out_dir: args.out,
        dry_run: args.dry,
        verbose: args.verbose,
        no_animations: args.no_animations,
    };
    export.run(&mut client, token).await
}

async fn run_import(args: ImportArgs, token: &CancellationToken) -> SubsetResult<()> {
    let client = connect(&args.conn).await?;

    let import = Import {
        root_table: args.table,
        truncate: args.truncate,
        upsert: args.upsert,
        out_dir: args.out,
        dry_run: args.dry,
        verbose: args.verbose,
        no_animations: args.no_animations,
    };
    import.run(&client, token).await
}

async fn connect(conn: &str) -> SubsetResult<Client> {
    let (client, connection) = tokio_postgres::connect(conn, NoTls)
        .await
        .map_err(|e| SubsetError::Connection {
            error: e.to_string(),
        })?;

    // The connection object drives the wire protocol; it resolves once the
    // client is dropped.
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::debug!("connection closed: {}", e);
        }
    });

    Ok(client)
}

fn init_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();
}
