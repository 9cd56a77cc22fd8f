// Shared kernel: database pool, error types, logging utilities.

pub mod database;
pub mod errors;
pub mod utils;

// Re-exports for convenience
pub use database::{Database, DbConnection, DbPool, PoolStatus};
pub use errors::{AppError, AppResult};
