use scrip_core::{Analysis, Record, NOT_FOUND, TABLE_HEADER};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

use crate::assets::AssetStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No record for file '{0}'")]
    NotFound(String),
    #[error("Table IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Table CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Malformed table row {row}: {reason}")]
    Malformed { row: usize, reason: String },
}

/// Result of deleting a record. The row is removed even if the image could not be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub file: String,
    pub rows_removed: usize,
    pub asset_removed: bool,
    pub asset_error: Option<String>,
}

/// Persistence for records keyed by `file`.
pub trait RecordRepository: Send + Sync {
    /// Insert a record, replacing any existing row for the same file in place.
    fn append(&self, record: Record) -> Result<(), StoreError>;
    /// Records whose image still exists.
    fn list(&self) -> Result<Vec<Record>, StoreError>;
    /// Every stored row, whether or not its image exists.
    fn read_all(&self) -> Result<Vec<Record>, StoreError>;
    fn update(&self, file: &str, analysis: Analysis) -> Result<Record, StoreError>;
    /// Remove the row(s) for `file`, then its image. Unknown keys are not an error.
    fn delete(&self, file: &str) -> Result<DeleteOutcome, StoreError>;
    /// Overwrite the whole table.
    fn replace_all(&self, records: &[Record]) -> Result<(), StoreError>;
}

/// Comma-separated table file with a `type,date,amount,category,file` header.
///
/// Each operation holds `lock` across its whole read-modify-write cycle and
/// replaces the file by renaming a freshly written sibling.
pub struct CsvRecordStore {
    path: PathBuf,
    assets: AssetStore,
    lock: Mutex<()>,
}

impl CsvRecordStore {
    pub fn new(path: impl Into<PathBuf>, assets: AssetStore) -> Self {
        Self {
            path: path.into(),
            assets,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, ()> {
        // The mutex protects no data, so a poisoned lock is still usable.
        self.lock.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RecordRepository for CsvRecordStore {
    fn append(&self, record: Record) -> Result<(), StoreError> {
        let _guard = self.guard();
        let mut rows = read_table(&self.path)?;
        match rows.iter().position(|r| r.file == record.file) {
            Some(pos) => {
                let key = record.file.clone();
                rows[pos] = record;
                let mut idx = 0;
                rows.retain(|r| {
                    let keep = idx == pos || r.file != key;
                    idx += 1;
                    keep
                });
                tracing::info!("Replaced record for {}", key);
            }
            None => {
                tracing::info!("Appended record for {}", record.file);
                rows.push(record);
            }
        }
        write_table(&self.path, &rows)
    }

    fn list(&self) -> Result<Vec<Record>, StoreError> {
        let rows = {
            let _guard = self.guard();
            read_table(&self.path)?
        };
        Ok(rows
            .into_iter()
            .filter(|r| {
                let present = self.assets.exists(&r.file);
                if !present {
                    tracing::warn!("Skipping record with missing image: {}", r.file);
                }
                present
            })
            .collect())
    }

    fn read_all(&self) -> Result<Vec<Record>, StoreError> {
        let _guard = self.guard();
        read_table(&self.path)
    }

    fn update(&self, file: &str, analysis: Analysis) -> Result<Record, StoreError> {
        let _guard = self.guard();
        let mut rows = read_table(&self.path)?;
        let mut updated = None;
        for row in rows.iter_mut().filter(|r| r.file == file) {
            row.apply(analysis.clone());
            updated.get_or_insert_with(|| row.clone());
        }
        let updated = updated.ok_or_else(|| StoreError::NotFound(file.to_string()))?;
        write_table(&self.path, &rows)?;
        tracing::info!("Updated record for {}", file);
        Ok(updated)
    }

    fn delete(&self, file: &str) -> Result<DeleteOutcome, StoreError> {
        let _guard = self.guard();

        // Table first: if this fails the image must stay referenced.
        let mut rows = read_table(&self.path)?;
        let before = rows.len();
        rows.retain(|r| r.file != file);
        let rows_removed = before - rows.len();
        if rows_removed > 0 {
            write_table(&self.path, &rows)?;
        }

        let (asset_removed, asset_error) = match self.assets.remove(file) {
            Ok(removed) => (removed, None),
            Err(e) => {
                tracing::warn!("Record for {} removed but image deletion failed: {}", file, e);
                (false, Some(e.to_string()))
            }
        };

        tracing::info!(
            file,
            rows_removed,
            asset_removed,
            "Deleted record"
        );
        Ok(DeleteOutcome {
            file: file.to_string(),
            rows_removed,
            asset_removed,
            asset_error,
        })
    }

    fn replace_all(&self, records: &[Record]) -> Result<(), StoreError> {
        let _guard = self.guard();
        write_table(&self.path, records)?;
        tracing::info!("Rewrote table with {} records", records.len());
        Ok(())
    }
}

/// Read every row of a table file. A missing file is an empty table.
///
/// Columns are mapped by position, so a legacy `filename` header still reads.
pub fn read_table(path: &Path) -> Result<Vec<Record>, StoreError> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => return Err(e.into()),
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes.as_slice());

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let raw = result?;
        let mut record: Record = raw.deserialize(None).map_err(|e| StoreError::Malformed {
            // +1 for the header, +1 for 1-based numbering.
            row: idx + 2,
            reason: e.to_string(),
        })?;
        if record.date.trim().is_empty() {
            record.date = NOT_FOUND.to_string();
        }
        if record.amount.trim().is_empty() {
            record.amount = NOT_FOUND.to_string();
        }
        rows.push(record);
    }
    Ok(rows)
}

fn write_table(path: &Path, records: &[Record]) -> Result<(), StoreError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(TABLE_HEADER)?;
    for record in records {
        writer.serialize(record)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| StoreError::Io(e.into_error()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    if let Err(e) = std::fs::write(&tmp, &bytes).and_then(|_| std::fs::rename(&tmp, path)) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
