use serde::{Deserialize, Serialize};

/// Tuning knobs for a bootstrap run.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Rows per chunk; each chunk is one resolve + one atomic commit.
    pub chunk_size: usize,
    /// Drop the non-unique secondary indexes for the duration of the
    /// run and recreate them afterwards. Throughput lever only; never
    /// touches the uniqueness structures.
    pub relax_indexes: bool,
    /// How many skipped-row reports to retain in the run result. The
    /// skip counter itself is never capped.
    pub max_reported_errors: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: 10_000,
            relax_indexes: false,
            max_reported_errors: 25,
        }
    }
}

/// Loader state machine. Any unrecoverable error transitions to
/// `Failed` and halts forward progress; committed chunks stay intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    Idle,
    ReadingChunk,
    Resolving,
    WritingCountries,
    WritingProvinces,
    WritingLocations,
    Done,
    Failed,
}

impl RunPhase {
    pub(crate) fn from_u8(value: u8) -> RunPhase {
        match value {
            1 => RunPhase::ReadingChunk,
            2 => RunPhase::Resolving,
            3 => RunPhase::WritingCountries,
            4 => RunPhase::WritingProvinces,
            5 => RunPhase::WritingLocations,
            6 => RunPhase::Done,
            7 => RunPhase::Failed,
            _ => RunPhase::Idle,
        }
    }

    pub(crate) fn as_u8(self) -> u8 {
        match self {
            RunPhase::Idle => 0,
            RunPhase::ReadingChunk => 1,
            RunPhase::Resolving => 2,
            RunPhase::WritingCountries => 3,
            RunPhase::WritingProvinces => 4,
            RunPhase::WritingLocations => 5,
            RunPhase::Done => 6,
            RunPhase::Failed => 7,
        }
    }
}

/// A row dropped during parsing, with enough context to find it again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    pub source: String,
    pub line: u64,
    pub reason: String,
}

/// Run summary returned by `Loader::load`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunResult {
    pub rows_succeeded: u64,
    pub rows_skipped: u64,
    pub files_completed: u64,
    pub countries_created: u64,
    pub provinces_created: u64,
    pub locations_created: u64,
    /// First N skipped-row reports (N = `LoaderConfig::max_reported_errors`)
    pub errors: Vec<SkippedRow>,
}
