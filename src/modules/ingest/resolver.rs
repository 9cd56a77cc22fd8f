use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::modules::catalog::domain::store::{
    ChunkBatch, ChunkReceipt, DimRef, GazetteerStore, PendingCountry, PendingLocation,
    PendingProvince,
};
use crate::modules::ingest::source::RawRecord;
use crate::shared::errors::AppResult;

/// Outcome of resolving one chunk of raw records.
#[derive(Debug, Default)]
pub struct ResolveOutcome {
    pub batch: ChunkBatch,
    /// Rows carried through to creation requests (duplicates included;
    /// a repeated tuple is a valid row that becomes a no-op).
    pub rows_resolved: usize,
    /// Exact (location, province) repeats dropped within this chunk.
    pub duplicates_dropped: usize,
}

/// Dimension resolver and deduplicator.
///
/// Assigns each distinct country name and (province, country) pair
/// exactly one surrogate id per run, in encounter order. The in-memory
/// caches are consulted first; on a miss the backing store is consulted
/// before a value is declared new — files are processed independently,
/// and a value seen in file A may recur in file B or in a previous run.
/// A store-consultation failure aborts the run (treating the value as
/// new would risk writing duplicates or orphans).
pub struct DimensionResolver {
    store: Arc<dyn GazetteerStore>,
    country_ids: HashMap<String, i32>,
    province_ids: HashMap<(String, i32), i32>,
}

impl DimensionResolver {
    pub fn new(store: Arc<dyn GazetteerStore>) -> Self {
        Self {
            store,
            country_ids: HashMap::new(),
            province_ids: HashMap::new(),
        }
    }

    /// Number of dimension values currently cached (countries, provinces).
    pub fn cache_sizes(&self) -> (usize, usize) {
        (self.country_ids.len(), self.province_ids.len())
    }

    /// Convert a chunk of raw records into three ordered batches of
    /// entity-creation requests with FK references wired up.
    pub async fn resolve_chunk(&mut self, rows: &[RawRecord]) -> AppResult<ResolveOutcome> {
        let mut batch = ChunkBatch::default();
        // Chunk-local indexes of values queued for creation this chunk
        let mut pending_countries: HashMap<String, usize> = HashMap::new();
        let mut pending_provinces: HashMap<(String, DimRef), usize> = HashMap::new();
        let mut seen_locations: HashSet<(String, DimRef)> = HashSet::new();
        let mut duplicates_dropped = 0usize;

        for row in rows {
            let country = self.resolve_country(&row.country, &mut pending_countries, &mut batch).await?;
            let province = self
                .resolve_province(&row.province, country, &mut pending_provinces, &mut batch)
                .await?;

            // Locations are pre-deduplicated upstream, but independent
            // per-country files can still repeat a tuple; drop exact
            // repeats silently rather than queueing a doomed insert.
            let key = (row.location.clone(), province);
            if !seen_locations.insert(key) {
                duplicates_dropped += 1;
                continue;
            }

            batch.locations.push(PendingLocation {
                name: row.location.clone(),
                mgrs: row.mgrs.clone(),
                province,
            });
        }

        Ok(ResolveOutcome {
            batch,
            rows_resolved: rows.len(),
            duplicates_dropped,
        })
    }

    /// Merge the ids assigned by a committed chunk into the caches.
    /// Must only be called after the commit succeeded; a rolled-back
    /// chunk's ids would poison every later chunk.
    pub fn absorb(&mut self, receipt: &ChunkReceipt) {
        for (name, id) in &receipt.countries {
            self.country_ids.insert(name.clone(), *id);
        }
        for (name, country_id, id) in &receipt.provinces {
            self.province_ids.insert((name.clone(), *country_id), *id);
        }
    }

    async fn resolve_country(
        &mut self,
        name: &str,
        pending: &mut HashMap<String, usize>,
        batch: &mut ChunkBatch,
    ) -> AppResult<DimRef> {
        if let Some(&id) = self.country_ids.get(name) {
            return Ok(DimRef::Existing(id));
        }
        if let Some(&index) = pending.get(name) {
            return Ok(DimRef::Pending(index));
        }

        // Cache miss: the store decides whether this value is new.
        if let Some(id) = self.store.find_country_id(name).await? {
            self.country_ids.insert(name.to_string(), id);
            return Ok(DimRef::Existing(id));
        }

        let index = batch.countries.len();
        batch.countries.push(PendingCountry {
            name: name.to_string(),
        });
        pending.insert(name.to_string(), index);
        Ok(DimRef::Pending(index))
    }

    async fn resolve_province(
        &mut self,
        name: &str,
        country: DimRef,
        pending: &mut HashMap<(String, DimRef), usize>,
        batch: &mut ChunkBatch,
    ) -> AppResult<DimRef> {
        if let DimRef::Existing(country_id) = country {
            if let Some(&id) = self.province_ids.get(&(name.to_string(), country_id)) {
                return Ok(DimRef::Existing(id));
            }
        }
        let key = (name.to_string(), country);
        if let Some(&index) = pending.get(&key) {
            return Ok(DimRef::Pending(index));
        }

        // A province under a country created this same chunk cannot
        // exist in the store yet (FK); only consult it for committed
        // countries.
        if let DimRef::Existing(country_id) = country {
            if let Some(id) = self.store.find_province_id(name, country_id).await? {
                self.province_ids.insert((name.to_string(), country_id), id);
                return Ok(DimRef::Existing(id));
            }
        }

        let index = batch.provinces.len();
        batch.provinces.push(PendingProvince {
            name: name.to_string(),
            country,
        });
        pending.insert(key, index);
        Ok(DimRef::Pending(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::catalog::domain::store::MockGazetteerStore;

    fn record(country: &str, province: &str, location: &str, line: u64) -> RawRecord {
        RawRecord {
            country: country.to_string(),
            province: province.to_string(),
            location: location.to_string(),
            mgrs: format!("4QFJ{:08}", line),
            line,
        }
    }

    #[tokio::test]
    async fn distinct_values_are_queued_once_in_encounter_order() {
        let mut store = MockGazetteerStore::new();
        store.expect_find_country_id().returning(|_| Ok(None));
        store.expect_find_province_id().returning(|_, _| Ok(None));

        let mut resolver = DimensionResolver::new(Arc::new(store));
        let rows = vec![
            record("Freedonia", "North", "Alpha", 2),
            record("Freedonia", "North", "Beta", 3),
            record("Freedonia", "South", "Gamma", 4),
            record("Sylvania", "North", "Delta", 5),
        ];

        let outcome = resolver.resolve_chunk(&rows).await.expect("resolve");
        let batch = outcome.batch;

        assert_eq!(
            batch.countries.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            vec!["Freedonia", "Sylvania"]
        );
        // "North" appears under both countries: two distinct provinces
        assert_eq!(batch.provinces.len(), 3);
        assert_eq!(batch.provinces[0].country, DimRef::Pending(0));
        assert_eq!(batch.provinces[2].country, DimRef::Pending(1));
        assert_eq!(batch.locations.len(), 4);
        assert_eq!(batch.locations[0].province, DimRef::Pending(0));
        assert_eq!(outcome.rows_resolved, 4);
        assert_eq!(outcome.duplicates_dropped, 0);
    }

    #[tokio::test]
    async fn store_hit_on_cache_miss_reuses_existing_ids() {
        let mut store = MockGazetteerStore::new();
        store
            .expect_find_country_id()
            .times(1)
            .returning(|_| Ok(Some(7)));
        store
            .expect_find_province_id()
            .times(1)
            .returning(|_, _| Ok(Some(42)));

        let mut resolver = DimensionResolver::new(Arc::new(store));
        // Same country and province twice: the store must be consulted
        // only once each, the second row hits the in-memory cache.
        let rows = vec![
            record("Freedonia", "North", "Alpha", 2),
            record("Freedonia", "North", "Beta", 3),
        ];

        let outcome = resolver.resolve_chunk(&rows).await.expect("resolve");
        assert!(outcome.batch.countries.is_empty());
        assert!(outcome.batch.provinces.is_empty());
        assert_eq!(outcome.batch.locations[0].province, DimRef::Existing(42));
        assert_eq!(outcome.batch.locations[1].province, DimRef::Existing(42));
    }

    #[tokio::test]
    async fn exact_duplicate_location_is_dropped_silently() {
        let mut store = MockGazetteerStore::new();
        store.expect_find_country_id().returning(|_| Ok(None));
        store.expect_find_province_id().returning(|_, _| Ok(None));

        let mut resolver = DimensionResolver::new(Arc::new(store));
        let rows = vec![
            record("Freedonia", "North", "Alpha", 2),
            record("Freedonia", "North", "Alpha", 3),
        ];

        let outcome = resolver.resolve_chunk(&rows).await.expect("resolve");
        assert_eq!(outcome.batch.locations.len(), 1);
        assert_eq!(outcome.duplicates_dropped, 1);
        assert_eq!(outcome.rows_resolved, 2);
    }

    #[tokio::test]
    async fn store_failure_aborts_resolution() {
        let mut store = MockGazetteerStore::new();
        store.expect_find_country_id().returning(|_| {
            Err(crate::shared::errors::AppError::StoreUnavailable(
                "connection refused".to_string(),
            ))
        });

        let mut resolver = DimensionResolver::new(Arc::new(store));
        let rows = vec![record("Freedonia", "North", "Alpha", 2)];

        assert!(resolver.resolve_chunk(&rows).await.is_err());
    }

    #[tokio::test]
    async fn absorb_updates_caches_for_later_chunks() {
        let mut store = MockGazetteerStore::new();
        // After absorb, no store consultation should happen at all.
        store.expect_find_country_id().times(0);
        store.expect_find_province_id().times(0);

        let mut resolver = DimensionResolver::new(Arc::new(store));
        resolver.absorb(&ChunkReceipt {
            countries: vec![("Freedonia".to_string(), 1)],
            provinces: vec![("North".to_string(), 1, 10)],
            locations_inserted: 5,
        });

        let rows = vec![record("Freedonia", "North", "Epsilon", 9)];
        let outcome = resolver.resolve_chunk(&rows).await.expect("resolve");
        assert!(outcome.batch.countries.is_empty());
        assert!(outcome.batch.provinces.is_empty());
        assert_eq!(outcome.batch.locations[0].province, DimRef::Existing(10));
    }
}
