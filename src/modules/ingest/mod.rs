//! Bulk ingest pipeline module
//!
//! Three stages driven by the `Loader` orchestrator:
//! - Source: ordered, chunked CSV record streams, one per input file
//! - Resolver: dimension deduplication with store-consultation-on-miss
//! - Writer: batched, FK-ordered chunk commits with id propagation

pub mod loader;
pub mod progress;
pub mod resolver;
pub mod source;
pub mod types;
pub mod writer;

// Re-exports for easy external access
pub use loader::Loader;
pub use progress::{ProgressHandle, ProgressTracker};
pub use resolver::DimensionResolver;
pub use source::{Chunk, CsvSource, RawRecord};
pub use types::{LoaderConfig, RunPhase, RunResult, SkippedRow};
pub use writer::{ChunkStats, ChunkWriter};
