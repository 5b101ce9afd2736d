//! afw-table-sql CLI - write, read, and plan catalog tables.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use afw_table_sql::drivers::mysql::REPOSITORY_CFG_TABLE;
use afw_table_sql::ingest::rename_table_sql;
use afw_table_sql::{
    aliases_for, CatalogDocument, CatalogSqlFormatter, Config, IngestConfig, Location,
    MySqlStorage, ObjectKind, PreparedWrite, RepositoryCfg, StorageInterface, StoreError,
    StoredObject, WriteOutcome,
};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

/// Statement budget assumed by `plan` when none is given or configured.
const DEFAULT_PLAN_QUERY_LEN: usize = 4 * 1024 * 1024;

#[derive(Parser)]
#[command(name = "afw-table-sql")]
#[command(about = "Persist columnar catalogs into MySQL tables")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a catalog to a table
    Write {
        /// Catalog JSON document
        #[arg(short, long)]
        input: PathBuf,

        /// Destination table
        #[arg(short, long)]
        table: String,

        /// Alias view to create over the table
        #[arg(long)]
        view: Option<String>,
    },

    /// Read a table back as a catalog JSON document
    Read {
        /// Source table
        #[arg(short, long)]
        table: String,
    },

    /// Check whether a table exists
    Exists {
        /// Table name
        #[arg(short, long)]
        table: String,
    },

    /// Create the repository database
    CreateRepo {
        /// Mapper to record in the repository configuration
        #[arg(long)]
        mapper: Option<String>,
    },

    /// Show the statements a replacing write would issue, without connecting
    Plan {
        /// Catalog JSON document
        #[arg(short, long)]
        input: PathBuf,

        /// Destination table
        #[arg(short, long)]
        table: String,

        /// Alias view to create over the table
        #[arg(long)]
        view: Option<String>,

        /// Statement length budget in bytes
        #[arg(long)]
        max_query_len: Option<usize>,
    },

    /// List the aliases that resolve to a field
    Aliases {
        /// Catalog JSON document
        #[arg(short, long)]
        input: PathBuf,

        /// Field name
        #[arg(short, long)]
        field: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), StoreError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(StoreError::Config)?;

    match &cli.command {
        Commands::Plan {
            input,
            table,
            view,
            max_query_len,
        } => {
            let ingest = load_ingest(&cli.config)?;
            plan(&cli, &ingest, input, table, view.as_deref(), *max_query_len)
        }
        Commands::Aliases { input, field } => {
            let catalog = CatalogDocument::load(input)?.into_catalog()?;
            let aliases = aliases_for(field, &catalog.schema().alias_pairs());
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&aliases)?);
            } else {
                for alias in aliases {
                    println!("{}", alias);
                }
            }
            Ok(())
        }
        Commands::Write { input, table, view } => {
            let config = Config::load(&cli.config)?;
            info!("Loaded configuration from {:?}", cli.config);
            let catalog = CatalogDocument::load(input)?.into_catalog()?;
            let formatter = CatalogSqlFormatter::new(config.ingest.clone());
            let outcome = formatter
                .write_catalog(&config.connection, &catalog, table, view.as_deref())
                .await?;
            print_outcome(&cli, &outcome)
        }
        Commands::Read { table } => {
            let config = Config::load(&cli.config)?;
            let formatter = CatalogSqlFormatter::new(config.ingest.clone());
            let catalog = formatter.read_catalog(&config.connection, table).await?;
            println!("{}", serde_json::to_string_pretty(&catalog.to_document())?);
            Ok(())
        }
        Commands::Exists { table } => {
            let config = Config::load(&cli.config)?;
            let storage = MySqlStorage::with_connection(config.connection, config.ingest)?;
            let exists = storage.exists(&Location::catalog(table.as_str())).await?;
            if cli.output_json {
                println!("{}", json!({ "table": table, "exists": exists }));
            } else {
                println!("{}", exists);
            }
            Ok(())
        }
        Commands::CreateRepo { mapper } => {
            let config = Config::load(&cli.config)?;
            let uri = config.connection.uri();
            let storage = MySqlStorage::open_with(config.connection, true, config.ingest).await?;
            if let Some(mapper) = mapper {
                let cfg = RepositoryCfg::new(uri.as_str(), mapper.as_str());
                storage
                    .write(
                        &Location::new(ObjectKind::RepositoryCfg, REPOSITORY_CFG_TABLE),
                        &StoredObject::RepositoryCfg(cfg),
                    )
                    .await?;
            }
            println!("Repository ready at {}", uri);
            Ok(())
        }
    }
}

/// Ingest settings from the config file if present, defaults otherwise.
fn load_ingest(path: &Path) -> Result<IngestConfig, StoreError> {
    if path.exists() {
        Ok(Config::load(path)?.ingest)
    } else {
        Ok(IngestConfig::default())
    }
}

fn plan(
    cli: &Cli,
    ingest: &IngestConfig,
    input: &Path,
    table: &str,
    view: Option<&str>,
    max_query_len: Option<usize>,
) -> Result<(), StoreError> {
    let catalog = CatalogDocument::load(input)?.into_catalog()?;
    let prepared = PreparedWrite::new(&catalog, table, view, ingest)?;
    let budget = max_query_len
        .or(ingest.max_query_len)
        .unwrap_or(DEFAULT_PLAN_QUERY_LEN);
    let batches = prepared.staging_plan(&catalog, budget)?;
    let rename_sql = rename_table_sql(prepared.staging(), table)?;

    if cli.output_json {
        let result = json!({
            "table": table,
            "staging_table": prepared.staging(),
            "create_table": prepared.create_sql(),
            "rename": rename_sql,
            "view": prepared.view_sql(),
            "columns": prepared
                .layout()
                .columns()
                .iter()
                .map(|c| c.column.as_str())
                .collect::<Vec<_>>(),
            "rows": batches.rows(),
            "insert_statements": batches.len(),
            "max_query_len": budget,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", prepared.create_sql());
        println!(
            "\nINSERT statements: {} ({} rows, max {} bytes each)",
            batches.len(),
            batches.rows(),
            budget
        );
        println!("\n{}", rename_sql);
        if let Some(sql) = prepared.view_sql() {
            println!("\n{}", sql);
        }
    }
    Ok(())
}

fn print_outcome(cli: &Cli, outcome: &WriteOutcome) -> Result<(), StoreError> {
    let result = match outcome {
        WriteOutcome::Published {
            table,
            rows,
            statements,
            attempts,
            view,
        } => json!({
            "status": "published",
            "table": table,
            "rows": rows,
            "statements": statements,
            "rename_attempts": attempts,
            "view": view,
        }),
        WriteOutcome::Appended {
            table,
            rows,
            statements,
            view,
        } => json!({
            "status": "appended",
            "table": table,
            "rows": rows,
            "statements": statements,
            "view": view,
        }),
        WriteOutcome::Stranded {
            table,
            staging,
            rows,
        } => json!({
            "status": "stranded",
            "table": table,
            "staging_table": staging,
            "rows": rows,
        }),
    };

    if cli.output_json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    match outcome {
        WriteOutcome::Published { table, rows, .. } => {
            println!("Published {} rows to {}", rows, table)
        }
        WriteOutcome::Appended { table, rows, .. } => {
            println!("Appended {} rows to {}", rows, table)
        }
        WriteOutcome::Stranded {
            table,
            staging,
            rows,
        } => println!(
            "Wrote {} rows to {} but could not rename it to {}",
            rows, staging, table
        ),
    }
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so stdout stays parseable.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}
