//! In-memory GazetteerStore for hermetic pipeline tests.
//!
//! Honors the same contracts as the PostgreSQL store: natural-key
//! uniqueness, FK existence checks, ids returned in submit order,
//! all-or-nothing chunk commits, and idempotent location inserts.
//! Failures can be injected at a chosen write phase to exercise the
//! rollback paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use gazetteer_lib::modules::catalog::domain::store::{
    ChunkBatch, ChunkReceipt, DimRef, GazetteerStore, PhaseObserver, TableCounts, WritePhase,
};
use gazetteer_lib::{AppError, AppResult};

#[derive(Debug, Clone, Default)]
struct Tables {
    // id -> name
    countries: HashMap<i32, String>,
    // id -> (name, country_id)
    provinces: HashMap<i32, (String, i32)>,
    // id -> (name, mgrs, province_id)
    locations: HashMap<i32, (String, String, i32)>,
    next_country_id: i32,
    next_province_id: i32,
    next_location_id: i32,
}

impl Tables {
    fn country_id_by_name(&self, name: &str) -> Option<i32> {
        self.countries
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(id, _)| *id)
    }

    fn province_id_by_key(&self, name: &str, country_id: i32) -> Option<i32> {
        self.provinces
            .iter()
            .find(|(_, (n, c))| n.as_str() == name && *c == country_id)
            .map(|(id, _)| *id)
    }

    fn location_id_by_key(&self, name: &str, province_id: i32) -> Option<i32> {
        self.locations
            .iter()
            .find(|(_, (n, _, p))| n.as_str() == name && *p == province_id)
            .map(|(id, _)| *id)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_on: Mutex<Option<WritePhase>>,
    commits: AtomicUsize,
    secondary_indexes_enabled: AtomicBool,
    index_toggles: Mutex<Vec<bool>>,
    phase_log: Mutex<Vec<WritePhase>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let store = Self::default();
        store.secondary_indexes_enabled.store(true, Ordering::SeqCst);
        store
    }

    /// Make the next commits fail when they reach the given write phase.
    pub fn fail_at_phase(&self, phase: WritePhase) {
        *self.fail_on.lock().unwrap() = Some(phase);
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn secondary_indexes_enabled(&self) -> bool {
        self.secondary_indexes_enabled.load(Ordering::SeqCst)
    }

    /// Every `set_secondary_indexes` call, in order.
    pub fn index_toggles(&self) -> Vec<bool> {
        self.index_toggles.lock().unwrap().clone()
    }

    /// Write phases entered across all commits, in order.
    pub fn phase_log(&self) -> Vec<WritePhase> {
        self.phase_log.lock().unwrap().clone()
    }

    pub fn table_counts(&self) -> TableCounts {
        let tables = self.tables.lock().unwrap();
        TableCounts {
            countries: tables.countries.len() as i64,
            provinces: tables.provinces.len() as i64,
            locations: tables.locations.len() as i64,
        }
    }

    pub fn country_names(&self) -> Vec<String> {
        let tables = self.tables.lock().unwrap();
        let mut names: Vec<String> = tables.countries.values().cloned().collect();
        names.sort();
        names
    }

    /// Seed a dimension row directly, as if a previous run created it.
    pub fn seed_country(&self, name: &str) -> i32 {
        let mut tables = self.tables.lock().unwrap();
        tables.next_country_id += 1;
        let id = tables.next_country_id;
        tables.countries.insert(id, name.to_string());
        id
    }

    pub fn seed_province(&self, name: &str, country_id: i32) -> i32 {
        let mut tables = self.tables.lock().unwrap();
        tables.next_province_id += 1;
        let id = tables.next_province_id;
        tables.provinces.insert(id, (name.to_string(), country_id));
        id
    }

    fn apply_chunk(
        tables: &mut Tables,
        batch: &ChunkBatch,
        fail_on: Option<WritePhase>,
        phase: &PhaseObserver,
        phase_log: &Mutex<Vec<WritePhase>>,
    ) -> AppResult<ChunkReceipt> {
        let mut receipt = ChunkReceipt::default();

        phase(WritePhase::Countries);
        phase_log.lock().unwrap().push(WritePhase::Countries);
        if fail_on == Some(WritePhase::Countries) {
            return Err(AppError::StoreUnavailable("injected failure".to_string()));
        }
        let mut new_country_ids = Vec::with_capacity(batch.countries.len());
        for pending in &batch.countries {
            if tables.country_id_by_name(&pending.name).is_some() {
                return Err(AppError::DuplicateKey {
                    entity: "countries".to_string(),
                    natural_key: pending.name.clone(),
                });
            }
            tables.next_country_id += 1;
            let id = tables.next_country_id;
            tables.countries.insert(id, pending.name.clone());
            new_country_ids.push(id);
            receipt.countries.push((pending.name.clone(), id));
        }

        phase(WritePhase::Provinces);
        phase_log.lock().unwrap().push(WritePhase::Provinces);
        if fail_on == Some(WritePhase::Provinces) {
            return Err(AppError::StoreUnavailable("injected failure".to_string()));
        }
        let mut new_province_ids = Vec::with_capacity(batch.provinces.len());
        for pending in &batch.provinces {
            let country_id = match pending.country {
                DimRef::Existing(id) => id,
                DimRef::Pending(index) => *new_country_ids.get(index).ok_or_else(|| {
                    AppError::ReferentialIntegrity(format!(
                        "pending country reference {} out of range",
                        index
                    ))
                })?,
            };
            if !tables.countries.contains_key(&country_id) {
                return Err(AppError::ReferentialIntegrity(format!(
                    "province '{}' references missing country {}",
                    pending.name, country_id
                )));
            }
            if tables.province_id_by_key(&pending.name, country_id).is_some() {
                return Err(AppError::DuplicateKey {
                    entity: "provinces".to_string(),
                    natural_key: format!("{} (country id {})", pending.name, country_id),
                });
            }
            tables.next_province_id += 1;
            let id = tables.next_province_id;
            tables
                .provinces
                .insert(id, (pending.name.clone(), country_id));
            new_province_ids.push(id);
            receipt.provinces.push((pending.name.clone(), country_id, id));
        }

        phase(WritePhase::Locations);
        phase_log.lock().unwrap().push(WritePhase::Locations);
        if fail_on == Some(WritePhase::Locations) {
            return Err(AppError::StoreUnavailable("injected failure".to_string()));
        }
        for pending in &batch.locations {
            let province_id = match pending.province {
                DimRef::Existing(id) => id,
                DimRef::Pending(index) => *new_province_ids.get(index).ok_or_else(|| {
                    AppError::ReferentialIntegrity(format!(
                        "pending province reference {} out of range",
                        index
                    ))
                })?,
            };
            if !tables.provinces.contains_key(&province_id) {
                return Err(AppError::ReferentialIntegrity(format!(
                    "location '{}' references missing province {}",
                    pending.name, province_id
                )));
            }
            // ON CONFLICT DO NOTHING semantics
            if tables.location_id_by_key(&pending.name, province_id).is_some() {
                continue;
            }
            tables.next_location_id += 1;
            let id = tables.next_location_id;
            tables
                .locations
                .insert(id, (pending.name.clone(), pending.mgrs.clone(), province_id));
            receipt.locations_inserted += 1;
        }

        Ok(receipt)
    }
}

#[async_trait]
impl GazetteerStore for MemoryStore {
    async fn find_country_id(&self, name: &str) -> AppResult<Option<i32>> {
        Ok(self.tables.lock().unwrap().country_id_by_name(name))
    }

    async fn find_province_id(&self, name: &str, country_id: i32) -> AppResult<Option<i32>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .province_id_by_key(name, country_id))
    }

    async fn find_location_id(&self, name: &str, province_id: i32) -> AppResult<Option<i32>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .location_id_by_key(name, province_id))
    }

    async fn commit_chunk(
        &self,
        batch: ChunkBatch,
        phase: PhaseObserver,
    ) -> AppResult<ChunkReceipt> {
        let fail_on = *self.fail_on.lock().unwrap();
        let mut tables = self.tables.lock().unwrap();

        // All-or-nothing: mutate a copy, swap in only on success
        let mut staged = tables.clone();
        let receipt = Self::apply_chunk(&mut staged, &batch, fail_on, &phase, &self.phase_log)?;
        *tables = staged;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(receipt)
    }

    async fn set_secondary_indexes(&self, enabled: bool) -> AppResult<()> {
        self.secondary_indexes_enabled
            .store(enabled, Ordering::SeqCst);
        self.index_toggles.lock().unwrap().push(enabled);
        Ok(())
    }

    async fn counts(&self) -> AppResult<TableCounts> {
        Ok(self.table_counts())
    }
}
