//! CSV fixture helpers for pipeline tests.

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use gazetteer_lib::CsvSource;

pub const HEADER: &str = "Country,Province,Location,MGRS";

/// Write a CSV file with the standard header plus the given rows and
/// return a source for it.
pub fn csv_source(dir: &TempDir, name: &str, rows: &[&str]) -> CsvSource {
    let path: PathBuf = dir.path().join(name);
    let mut contents = String::from(HEADER);
    contents.push('\n');
    for row in rows {
        contents.push_str(row);
        contents.push('\n');
    }
    fs::write(&path, contents).expect("write CSV fixture");
    CsvSource::new(&path)
}
