use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use tokio::task;

use crate::modules::catalog::domain::store::{
    ChunkBatch, ChunkReceipt, DimRef, GazetteerStore, PhaseObserver, TableCounts, WritePhase,
};
use crate::modules::catalog::infrastructure::models::{
    CountryModel, NewCountryRow, NewLocationRow, NewProvinceRow, ProvinceModel,
};
use crate::schema::{countries, locations, provinces};
use crate::shared::database::{Database, DbConnection};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::logger::LogContext;

/// Diesel/PostgreSQL implementation of the loader's backing store.
///
/// All Diesel calls run under `spawn_blocking`; the chunk commit wraps
/// its three bulk writes in a single transaction so a chunk is applied
/// all-or-nothing. Bulk inserts use `RETURNING` and rely on Postgres
/// yielding rows in submit order for plain value lists.
pub struct PgGazetteerStore {
    db: Arc<Database>,
}

impl PgGazetteerStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn materialize(reference: DimRef, new_ids: &[i32], entity: &str) -> AppResult<i32> {
        match reference {
            DimRef::Existing(id) => Ok(id),
            DimRef::Pending(index) => new_ids.get(index).copied().ok_or_else(|| {
                AppError::InternalError(format!(
                    "Pending {} reference {} out of range ({} new rows)",
                    entity,
                    index,
                    new_ids.len()
                ))
            }),
        }
    }

    /// After a rolled-back chunk, find which natural keys in the failed
    /// batch already exist in the store. A hit here means the resolver
    /// decided "new" for a value the store already had (or another
    /// writer raced us) — a consistency defect either way.
    fn isolate_offenders(conn: &mut DbConnection, batch: &ChunkBatch) -> Vec<String> {
        let mut offenders = Vec::new();

        for pending in &batch.countries {
            let existing: Result<Option<i32>, _> = countries::table
                .filter(countries::country.eq(&pending.name))
                .select(countries::id)
                .first::<i32>(conn)
                .optional();
            if let Ok(Some(_)) = existing {
                offenders.push(format!("country '{}'", pending.name));
            }
        }

        for pending in &batch.provinces {
            // Provinces under a pending country cannot pre-exist after
            // rollback; only Existing-country refs can be checked.
            if let DimRef::Existing(country_id) = pending.country {
                let existing: Result<Option<i32>, _> = provinces::table
                    .filter(provinces::province.eq(&pending.name))
                    .filter(provinces::country_id.eq(country_id))
                    .select(provinces::id)
                    .first::<i32>(conn)
                    .optional();
                if let Ok(Some(_)) = existing {
                    offenders.push(format!(
                        "province '{}' (country id {})",
                        pending.name, country_id
                    ));
                }
            }
        }

        offenders
    }

    fn commit_chunk_blocking(
        conn: &mut DbConnection,
        batch: &ChunkBatch,
        phase: &PhaseObserver,
    ) -> AppResult<ChunkReceipt> {
        conn.transaction::<ChunkReceipt, AppError, _>(|conn| {
            phase(WritePhase::Countries);
            let country_rows: Vec<CountryModel> = if batch.countries.is_empty() {
                Vec::new()
            } else {
                let values: Vec<NewCountryRow> = batch
                    .countries
                    .iter()
                    .map(|c| NewCountryRow {
                        country: c.name.clone(),
                    })
                    .collect();
                diesel::insert_into(countries::table)
                    .values(&values)
                    .get_results(conn)?
            };
            let country_ids: Vec<i32> = country_rows.iter().map(|r| r.id).collect();

            phase(WritePhase::Provinces);
            let mut province_country_ids = Vec::with_capacity(batch.provinces.len());
            let province_rows: Vec<ProvinceModel> = if batch.provinces.is_empty() {
                Vec::new()
            } else {
                let mut values = Vec::with_capacity(batch.provinces.len());
                for pending in &batch.provinces {
                    let country_id =
                        Self::materialize(pending.country, &country_ids, "country")?;
                    province_country_ids.push(country_id);
                    values.push(NewProvinceRow {
                        province: pending.name.clone(),
                        country_id,
                    });
                }
                diesel::insert_into(provinces::table)
                    .values(&values)
                    .get_results(conn)?
            };
            let province_ids: Vec<i32> = province_rows.iter().map(|r| r.id).collect();

            phase(WritePhase::Locations);
            let locations_inserted = if batch.locations.is_empty() {
                0
            } else {
                let mut values = Vec::with_capacity(batch.locations.len());
                for pending in &batch.locations {
                    let province_id =
                        Self::materialize(pending.province, &province_ids, "province")?;
                    values.push(NewLocationRow {
                        location: pending.name.clone(),
                        mgrs: pending.mgrs.clone(),
                        province_id,
                    });
                }
                // Exact-duplicate rows (seen in an earlier chunk or a
                // previous run) are idempotent skips, not errors.
                diesel::insert_into(locations::table)
                    .values(&values)
                    .on_conflict((locations::location, locations::province_id))
                    .do_nothing()
                    .execute(conn)?
            };

            Ok(ChunkReceipt {
                countries: batch
                    .countries
                    .iter()
                    .zip(country_ids.iter())
                    .map(|(c, id)| (c.name.clone(), *id))
                    .collect(),
                provinces: batch
                    .provinces
                    .iter()
                    .zip(province_country_ids.iter().zip(province_ids.iter()))
                    .map(|(p, (country_id, id))| (p.name.clone(), *country_id, *id))
                    .collect(),
                locations_inserted,
            })
        })
    }
}

#[async_trait]
impl GazetteerStore for PgGazetteerStore {
    async fn find_country_id(&self, name: &str) -> AppResult<Option<i32>> {
        let db = Arc::clone(&self.db);
        let name = name.to_string();

        task::spawn_blocking(move || -> AppResult<Option<i32>> {
            let mut conn = db.get_connection()?;
            let id = countries::table
                .filter(countries::country.eq(&name))
                .select(countries::id)
                .first::<i32>(&mut conn)
                .optional()?;
            Ok(id)
        })
        .await?
    }

    async fn find_province_id(&self, name: &str, country_id: i32) -> AppResult<Option<i32>> {
        let db = Arc::clone(&self.db);
        let name = name.to_string();

        task::spawn_blocking(move || -> AppResult<Option<i32>> {
            let mut conn = db.get_connection()?;
            let id = provinces::table
                .filter(provinces::province.eq(&name))
                .filter(provinces::country_id.eq(country_id))
                .select(provinces::id)
                .first::<i32>(&mut conn)
                .optional()?;
            Ok(id)
        })
        .await?
    }

    async fn find_location_id(&self, name: &str, province_id: i32) -> AppResult<Option<i32>> {
        let db = Arc::clone(&self.db);
        let name = name.to_string();

        task::spawn_blocking(move || -> AppResult<Option<i32>> {
            let mut conn = db.get_connection()?;
            let id = locations::table
                .filter(locations::location.eq(&name))
                .filter(locations::province_id.eq(province_id))
                .select(locations::id)
                .first::<i32>(&mut conn)
                .optional()?;
            Ok(id)
        })
        .await?
    }

    async fn commit_chunk(
        &self,
        batch: ChunkBatch,
        phase: PhaseObserver,
    ) -> AppResult<ChunkReceipt> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> AppResult<ChunkReceipt> {
            let start = std::time::Instant::now();
            let mut conn = db.get_connection()?;

            let result = Self::commit_chunk_blocking(&mut conn, &batch, &phase);

            match result {
                Ok(receipt) => {
                    LogContext::db_operation(
                        "commit_chunk",
                        "countries/provinces/locations",
                        Some(start.elapsed().as_millis() as u64),
                    );
                    Ok(receipt)
                }
                Err(AppError::DuplicateKey { entity, natural_key }) => {
                    // The transaction has rolled back; the connection is
                    // usable again. Point lookups isolate the offending
                    // natural keys for the error report.
                    let offenders = Self::isolate_offenders(&mut conn, &batch);
                    let detail = if offenders.is_empty() {
                        natural_key
                    } else {
                        offenders.join(", ")
                    };
                    Err(AppError::DuplicateKey {
                        entity,
                        natural_key: detail,
                    })
                }
                Err(e) => Err(e),
            }
        })
        .await?
    }

    async fn set_secondary_indexes(&self, enabled: bool) -> AppResult<()> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> AppResult<()> {
            let start = std::time::Instant::now();
            let mut conn = db.get_connection()?;

            let statements: &[&str] = if enabled {
                &[
                    "CREATE INDEX IF NOT EXISTS idx_provinces_country_id ON provinces (country_id)",
                    "CREATE INDEX IF NOT EXISTS idx_locations_province_id ON locations (province_id)",
                ]
            } else {
                &[
                    "DROP INDEX IF EXISTS idx_provinces_country_id",
                    "DROP INDEX IF EXISTS idx_locations_province_id",
                ]
            };

            for statement in statements {
                diesel::sql_query(*statement).execute(&mut conn)?;
            }

            LogContext::db_operation(
                if enabled {
                    "restore_secondary_indexes"
                } else {
                    "relax_secondary_indexes"
                },
                "provinces/locations",
                Some(start.elapsed().as_millis() as u64),
            );
            Ok(())
        })
        .await?
    }

    async fn counts(&self) -> AppResult<TableCounts> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> AppResult<TableCounts> {
            let mut conn = db.get_connection()?;
            Ok(TableCounts {
                countries: countries::table.count().get_result(&mut conn)?,
                provinces: provinces::table.count().get_result(&mut conn)?,
                locations: locations::table.count().get_result(&mut conn)?,
            })
        })
        .await?
    }
}
