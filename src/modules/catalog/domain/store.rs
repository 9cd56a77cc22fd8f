//! Backing-store interface for the bulk loader
//!
//! Defines the collaborator surface the loader writes through: point
//! lookups by natural key, the atomic three-batch chunk commit, and the
//! optional secondary-index maintenance toggle. Implementation uses
//! Diesel ORM with PostgreSQL; tests substitute an in-memory store.

use crate::shared::errors::AppResult;
use async_trait::async_trait;
use std::sync::Arc;

/// Reference to a dimension row from within one chunk's batches.
///
/// `Existing` carries a surrogate id already committed to the store.
/// `Pending` indexes into the same chunk's new-country (for provinces)
/// or new-province (for locations) batch; the store materializes it
/// once the referenced batch has been written and ids are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DimRef {
    Existing(i32),
    Pending(usize),
}

/// Country-creation request. First occurrence in the run, encounter order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCountry {
    pub name: String,
}

/// Province-creation request, FK-wired to a resolved or pending country.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingProvince {
    pub name: String,
    pub country: DimRef,
}

/// Location-creation request, FK-wired to a resolved or pending province.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLocation {
    pub name: String,
    pub mgrs: String,
    pub province: DimRef,
}

/// One chunk's entity batches, in FK dependency order.
#[derive(Debug, Clone, Default)]
pub struct ChunkBatch {
    pub countries: Vec<PendingCountry>,
    pub provinces: Vec<PendingProvince>,
    pub locations: Vec<PendingLocation>,
}

impl ChunkBatch {
    pub fn is_empty(&self) -> bool {
        self.countries.is_empty() && self.provinces.is_empty() && self.locations.is_empty()
    }
}

/// Surrogate ids assigned by a committed chunk, in submit order.
///
/// `provinces` entries carry the materialized country id alongside the
/// new province id so the resolver can key its cache without re-deriving
/// pending references.
#[derive(Debug, Clone, Default)]
pub struct ChunkReceipt {
    pub countries: Vec<(String, i32)>,
    pub provinces: Vec<(String, i32, i32)>,
    pub locations_inserted: usize,
}

/// Row counts per dimension table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub countries: i64,
    pub provinces: i64,
    pub locations: i64,
}

/// The three write stages inside one chunk commit, reported in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePhase {
    Countries,
    Provinces,
    Locations,
}

/// Callback invoked as the chunk commit enters each write stage.
pub type PhaseObserver = Arc<dyn Fn(WritePhase) + Send + Sync>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GazetteerStore: Send + Sync {
    /// Point lookup: country surrogate id by unique name
    async fn find_country_id(&self, name: &str) -> AppResult<Option<i32>>;

    /// Point lookup: province surrogate id by (name, country_id)
    async fn find_province_id(&self, name: &str, country_id: i32) -> AppResult<Option<i32>>;

    /// Point lookup: location surrogate id by (name, province_id)
    async fn find_location_id(&self, name: &str, province_id: i32) -> AppResult<Option<i32>>;

    /// Commit one chunk's three batches as a single transaction, in FK
    /// dependency order (countries, then provinces, then locations).
    /// Either all three batches commit or none do. Returned ids are in
    /// submit order. Location rows that already exist are skipped, not
    /// duplicated; a unique violation on countries or provinces rolls
    /// the chunk back and surfaces the offending natural keys.
    async fn commit_chunk(
        &self,
        batch: ChunkBatch,
        phase: PhaseObserver,
    ) -> AppResult<ChunkReceipt>;

    /// Toggle maintenance of the non-unique secondary indexes. Never
    /// touches the primary-key or uniqueness structures. Optional
    /// throughput lever around a bootstrap run.
    async fn set_secondary_indexes(&self, enabled: bool) -> AppResult<()>;

    /// Row counts per table (for run summaries and monitoring)
    async fn counts(&self) -> AppResult<TableCounts>;
}
