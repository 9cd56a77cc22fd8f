use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task;
use tokio_util::sync::CancellationToken;

use crate::modules::catalog::domain::store::{GazetteerStore, PhaseObserver, WritePhase};
use crate::modules::ingest::progress::{ProgressHandle, ProgressTracker};
use crate::modules::ingest::resolver::DimensionResolver;
use crate::modules::ingest::source::{Chunk, CsvSource};
use crate::modules::ingest::types::{LoaderConfig, RunPhase, RunResult};
use crate::modules::ingest::writer::ChunkWriter;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::logger::LogContext;
use crate::{log_error, log_info};

/// Orchestrates one bootstrap run: reads each source to completion in
/// turn, resolves dimensions against the shared caches and the store,
/// and commits chunks atomically in FK order.
///
/// File reading and row parsing run on a blocking task feeding a small
/// channel, so parsing overlaps the resolve-and-write path while that
/// path itself stays single-threaded (one writer at a time).
/// Cancellation is honored at chunk boundaries only; a chunk's
/// three-batch commit is never interrupted mid-way.
pub struct Loader {
    store: Arc<dyn GazetteerStore>,
    config: LoaderConfig,
    tracker: ProgressTracker,
    cancel: CancellationToken,
}

impl Loader {
    pub fn new(store: Arc<dyn GazetteerStore>, config: LoaderConfig) -> Self {
        Self {
            store,
            config,
            tracker: ProgressTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Observation handle for external progress indicators.
    pub fn progress(&self) -> ProgressHandle {
        self.tracker.handle()
    }

    /// Token for operator-requested abort. Honored between chunks.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the full load. Already-committed chunks stay intact on
    /// failure; re-running over the same inputs is safe because
    /// dimension resolution is idempotent against the store.
    pub async fn load(&self, sources: &[CsvSource]) -> AppResult<RunResult> {
        log_info!(
            "Starting bootstrap load: {} source(s), chunk_size={}, relax_indexes={}",
            sources.len(),
            self.config.chunk_size,
            self.config.relax_indexes
        );

        if self.config.relax_indexes {
            self.store.set_secondary_indexes(false).await?;
        }

        let outcome = self.run(sources).await;

        // Secondary indexes are restored on every exit path; a restore
        // failure on an otherwise clean run is itself a run failure.
        if self.config.relax_indexes {
            if let Err(e) = self.store.set_secondary_indexes(true).await {
                LogContext::error_with_context(&e, "Failed to restore secondary indexes");
                if outcome.is_ok() {
                    self.tracker.set_phase(RunPhase::Failed);
                    return Err(e);
                }
            }
        }

        match outcome {
            Ok(result) => {
                self.tracker.set_phase(RunPhase::Done);
                log_info!(
                    "Load complete: {} rows succeeded, {} skipped, {} files, {} countries / {} provinces / {} locations created",
                    result.rows_succeeded,
                    result.rows_skipped,
                    result.files_completed,
                    result.countries_created,
                    result.provinces_created,
                    result.locations_created
                );
                Ok(result)
            }
            Err(e) => {
                self.tracker.set_phase(RunPhase::Failed);
                let handle = self.tracker.handle();
                log_error!(
                    "Load failed after {} rows / {} files: {}",
                    handle.rows_processed(),
                    handle.files_completed(),
                    e
                );
                Err(e)
            }
        }
    }

    fn phase_observer(&self) -> PhaseObserver {
        let handle = self.tracker.handle();
        Arc::new(move |phase: WritePhase| {
            handle.set_phase(match phase {
                WritePhase::Countries => RunPhase::WritingCountries,
                WritePhase::Provinces => RunPhase::WritingProvinces,
                WritePhase::Locations => RunPhase::WritingLocations,
            });
        })
    }

    async fn run(&self, sources: &[CsvSource]) -> AppResult<RunResult> {
        let mut resolver = DimensionResolver::new(Arc::clone(&self.store));
        let writer = ChunkWriter::new(Arc::clone(&self.store));
        let phase_observer = self.phase_observer();
        let mut result = RunResult::default();

        for source in sources {
            self.tracker.set_phase(RunPhase::ReadingChunk);

            // Reader task parses ahead of the resolve/write path; the
            // small channel bounds read-ahead to keep memory flat.
            let (tx, mut rx) = mpsc::channel::<AppResult<Chunk>>(2);
            let reader_source = source.clone();
            let chunk_size = self.config.chunk_size;
            let reader = task::spawn_blocking(move || match reader_source.read_chunks(chunk_size) {
                Ok(chunks) => {
                    for item in chunks {
                        if tx.blocking_send(item).is_err() {
                            // Receiver gone: run aborted or cancelled
                            break;
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.blocking_send(Err(e));
                }
            });

            while let Some(item) = rx.recv().await {
                if self.cancel.is_cancelled() {
                    log_info!("Cancellation requested; stopping at chunk boundary");
                    return Err(AppError::Cancelled);
                }

                let chunk = item?;
                self.ingest_chunk(source, chunk, &mut resolver, &writer, &phase_observer, &mut result)
                    .await?;
                self.tracker.set_phase(RunPhase::ReadingChunk);
            }

            reader.await.map_err(AppError::from)?;
            self.tracker.file_completed(source.name());
            result.files_completed += 1;
        }

        Ok(result)
    }

    async fn ingest_chunk(
        &self,
        source: &CsvSource,
        chunk: Chunk,
        resolver: &mut DimensionResolver,
        writer: &ChunkWriter,
        phase_observer: &PhaseObserver,
        result: &mut RunResult,
    ) -> AppResult<()> {
        let rows_in_chunk = (chunk.rows.len() + chunk.skipped.len()) as u64;

        result.rows_skipped += chunk.skipped.len() as u64;
        for skipped in chunk.skipped {
            LogContext::skipped_row(&skipped.source, skipped.line, &skipped.reason);
            if result.errors.len() < self.config.max_reported_errors {
                result.errors.push(skipped);
            }
        }

        self.tracker.set_phase(RunPhase::Resolving);
        let outcome = resolver.resolve_chunk(&chunk.rows).await?;

        let stats = writer
            .commit(outcome.batch, resolver, Arc::clone(phase_observer))
            .await?;

        result.rows_succeeded += outcome.rows_resolved as u64;
        result.countries_created += stats.countries_created;
        result.provinces_created += stats.provinces_created;
        result.locations_created += stats.locations_created;

        self.tracker
            .chunk_completed(source.name(), chunk.index, rows_in_chunk);
        Ok(())
    }
}
