use std::sync::Arc;

use crate::modules::catalog::domain::store::{ChunkBatch, GazetteerStore, PhaseObserver};
use crate::modules::ingest::resolver::DimensionResolver;
use crate::shared::errors::AppResult;

/// What one committed chunk created.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkStats {
    pub countries_created: u64,
    pub provinces_created: u64,
    pub locations_created: u64,
}

/// Bulk writer stage: hands one chunk's batches to the store for an
/// atomic, FK-ordered commit and propagates the returned surrogate ids
/// back into the resolver's caches. Ids reach the caches only after
/// the commit succeeded, so a rolled-back chunk leaves no trace.
pub struct ChunkWriter {
    store: Arc<dyn GazetteerStore>,
}

impl ChunkWriter {
    pub fn new(store: Arc<dyn GazetteerStore>) -> Self {
        Self { store }
    }

    pub async fn commit(
        &self,
        batch: ChunkBatch,
        resolver: &mut DimensionResolver,
        phase: PhaseObserver,
    ) -> AppResult<ChunkStats> {
        if batch.is_empty() {
            return Ok(ChunkStats::default());
        }

        let receipt = self.store.commit_chunk(batch, phase).await?;
        resolver.absorb(&receipt);

        Ok(ChunkStats {
            countries_created: receipt.countries.len() as u64,
            provinces_created: receipt.provinces.len() as u64,
            locations_created: receipt.locations_inserted as u64,
        })
    }
}
