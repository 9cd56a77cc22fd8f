//! Gazetteer dimension catalog module
//!
//! Holds the three hierarchical dimension entities (Country, Province,
//! Location) and the backing-store interface the loader writes through.
//!
//! Architecture:
//! - Domain: Entities and the GazetteerStore trait
//! - Infrastructure: Diesel-based PostgreSQL store implementation

pub mod domain;
pub mod infrastructure;

// Re-exports for easy access
pub use domain::{
    entities::{Country, Location, Province},
    store::{
        ChunkBatch, ChunkReceipt, DimRef, GazetteerStore, PendingCountry, PendingLocation,
        PendingProvince, PhaseObserver, TableCounts, WritePhase,
    },
};
pub use infrastructure::PgGazetteerStore;
