pub mod modules;
mod schema;
pub mod shared;

// Re-exports for library consumers and the CLI binary
pub use modules::catalog::{GazetteerStore, PgGazetteerStore, TableCounts};
pub use modules::ingest::{
    CsvSource, Loader, LoaderConfig, ProgressHandle, RunPhase, RunResult, SkippedRow,
};
pub use shared::{AppError, AppResult, Database};
