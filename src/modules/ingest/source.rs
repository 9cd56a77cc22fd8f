use std::fs::File;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::modules::ingest::types::SkippedRow;
use crate::shared::errors::{AppError, AppResult};

/// Expected header columns, in order (matched case-insensitively).
const EXPECTED_HEADER: [&str; 4] = ["country", "province", "location", "mgrs"];

/// One parsed input row, with its 1-based line number in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub country: String,
    pub province: String,
    pub location: String,
    pub mgrs: String,
    pub line: u64,
}

/// A bounded slice of one source's rows, processed as one
/// resolve + write unit. Input row order is preserved.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub index: usize,
    pub rows: Vec<RawRecord>,
    pub skipped: Vec<SkippedRow>,
}

/// One delimited input file: ordered rows of
/// (country, province, location, MGRS).
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    name: String,
}

impl CsvSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the file, validate its header, and return a lazy chunk
    /// iterator. A wrong header is fatal for this source; malformed
    /// rows later on are reported per chunk and skipped.
    pub fn read_chunks(&self, chunk_size: usize) -> AppResult<ChunkIter> {
        if chunk_size == 0 {
            return Err(AppError::InvalidInput(
                "chunk_size must be greater than zero".to_string(),
            ));
        }

        let file = File::open(&self.path).map_err(|e| {
            AppError::IoError(format!("Failed to open '{}': {}", self.path.display(), e))
        })?;

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(file);

        let headers = reader.headers()?.clone();
        Self::validate_header(&self.name, &headers)?;

        Ok(ChunkIter {
            source_name: self.name.clone(),
            reader,
            chunk_size,
            next_index: 0,
            done: false,
        })
    }

    fn validate_header(source: &str, headers: &StringRecord) -> AppResult<()> {
        let actual: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        if actual != EXPECTED_HEADER {
            return Err(AppError::InvalidInput(format!(
                "'{}': expected header Country,Province,Location,MGRS, found '{}'",
                source,
                headers.iter().collect::<Vec<_>>().join(",")
            )));
        }
        Ok(())
    }
}

/// Lazy iterator over one source's chunks.
pub struct ChunkIter {
    source_name: String,
    reader: csv::Reader<File>,
    chunk_size: usize,
    next_index: usize,
    done: bool,
}

impl ChunkIter {
    fn parse_record(source: &str, record: &StringRecord) -> Result<RawRecord, SkippedRow> {
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let field = |index: usize, column: &str| -> Result<String, SkippedRow> {
            match record.get(index) {
                Some(value) if !value.is_empty() => Ok(value.to_string()),
                Some(_) => Err(SkippedRow {
                    source: source.to_string(),
                    line,
                    reason: format!("empty {} field", column),
                }),
                None => Err(SkippedRow {
                    source: source.to_string(),
                    line,
                    reason: format!("missing {} field", column),
                }),
            }
        };

        Ok(RawRecord {
            country: field(0, "country")?,
            province: field(1, "province")?,
            location: field(2, "location")?,
            mgrs: field(3, "mgrs")?,
            line,
        })
    }
}

impl Iterator for ChunkIter {
    type Item = AppResult<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut chunk = Chunk {
            index: self.next_index,
            ..Chunk::default()
        };

        while chunk.rows.len() < self.chunk_size {
            let mut record = StringRecord::new();
            match self.reader.read_record(&mut record) {
                Ok(false) => {
                    self.done = true;
                    break;
                }
                Ok(true) => match Self::parse_record(&self.source_name, &record) {
                    Ok(row) => chunk.rows.push(row),
                    Err(skipped) => chunk.skipped.push(skipped),
                },
                Err(e) => {
                    if e.is_io_error() {
                        self.done = true;
                        return Some(Err(e.into()));
                    }
                    // Record-level parse error (bad UTF-8, ragged row):
                    // skip the row, keep the file going.
                    let line = e.position().map(|p| p.line()).unwrap_or(0);
                    chunk.skipped.push(SkippedRow {
                        source: self.source_name.clone(),
                        line,
                        reason: format!("unparseable row: {}", e),
                    });
                }
            }
        }

        if chunk.rows.is_empty() && chunk.skipped.is_empty() {
            return None;
        }

        self.next_index += 1;
        Some(Ok(chunk))
    }
}
