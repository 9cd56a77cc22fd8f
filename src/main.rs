use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use gazetteer_lib::shared::utils::logger::init_logger;
use gazetteer_lib::{CsvSource, Database, Loader, LoaderConfig, PgGazetteerStore, RunResult};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// CLI arguments for gazetteer-load
#[derive(Debug, Parser)]
#[command(
    name = "gazetteer-load",
    version,
    about = "Bulk-load denormalized gazetteer CSV files into PostgreSQL"
)]
struct CliArgs {
    /// CSV files to ingest (header: Country,Province,Location,MGRS)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Rows per chunk; each chunk is one resolve + one atomic commit
    #[arg(long, default_value_t = 10_000)]
    chunk_size: usize,

    /// Drop secondary indexes for the run and restore them afterwards
    #[arg(long)]
    relax_indexes: bool,

    /// Maximum skipped-row reports to keep in the run summary
    #[arg(long, default_value_t = 25)]
    max_errors: usize,
}

fn print_summary(result: &RunResult) {
    println!(
        "Loaded {} rows ({} skipped) from {} file(s)",
        result.rows_succeeded, result.rows_skipped, result.files_completed
    );
    println!(
        "Created {} countries, {} provinces, {} locations",
        result.countries_created, result.provinces_created, result.locations_created
    );
    if !result.errors.is_empty() {
        println!("First {} skipped rows:", result.errors.len());
        for skipped in &result.errors {
            println!("  {}:{} {}", skipped.source, skipped.line, skipped.reason);
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables
    dotenvy::dotenv().ok();
    init_logger();

    let args = CliArgs::parse();

    let database = match Database::new() {
        Ok(db) => Arc::new(db),
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Bring the schema up to date before loading into it. A loader
    // pointed at missing tables has nothing useful to do.
    match database.get_connection() {
        Ok(mut conn) => {
            if let Err(e) = conn.run_pending_migrations(MIGRATIONS) {
                eprintln!("Failed to run database migrations: {}", e);
                return ExitCode::FAILURE;
            }
        }
        Err(e) => {
            eprintln!("Failed to get database connection for migrations: {}", e);
            return ExitCode::FAILURE;
        }
    }

    let store = Arc::new(PgGazetteerStore::new(database));
    let loader = Loader::new(
        store,
        LoaderConfig {
            chunk_size: args.chunk_size,
            relax_indexes: args.relax_indexes,
            max_reported_errors: args.max_errors,
        },
    );

    // Operator abort: first Ctrl-C stops the run at the next chunk
    // boundary; committed chunks stay intact.
    let cancel = loader.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Ctrl-C received, stopping at next chunk boundary");
            cancel.cancel();
        }
    });

    let sources: Vec<CsvSource> = args.inputs.iter().map(CsvSource::new).collect();

    match loader.load(&sources).await {
        Ok(result) => {
            print_summary(&result);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Load failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
