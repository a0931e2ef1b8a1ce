use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Header of an extract, written even when it has no rows.
pub trait CsvColumns {
    const COLUMNS: &'static [&'static str];
}

/// Writes `rows` with a header line and returns how many were written.
///
/// Rows go to a sibling `.tmp` file first, which then replaces `path`. The
/// staging file is removed again if writing fails.
pub fn write_csv<T: Serialize + CsvColumns>(path: &Path, rows: &[T]) -> Result<usize> {
    let staging = staging_path(path);
    if let Err(err) = write_staging(&staging, rows) {
        let _ = fs::remove_file(&staging);
        return Err(err);
    }
    fs::rename(&staging, path)
        .with_context(|| format!("failed to move {} into place", path.display()))?;
    Ok(rows.len())
}

fn write_staging<T: Serialize + CsvColumns>(staging: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(staging)
        .with_context(|| format!("failed to create {}", staging.display()))?;
    if rows.is_empty() {
        writer
            .write_record(T::COLUMNS)
            .with_context(|| format!("failed to write header to {}", staging.display()))?;
    }
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("failed to write row to {}", staging.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush {}", staging.display()))?;
    Ok(())
}

pub fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    reader
        .deserialize::<T>()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("failed to parse {}", path.display()))
}
