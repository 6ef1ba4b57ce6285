use chrono::{DateTime, Utc};
use scrip_core::{amount_to_cents, Record};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::hash;

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Ledger IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize ledger entry: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorReceipt {
    Disabled,
    Recorded { blob_sha256: String, blob: PathBuf },
}

/// Best-effort copy of finished records into an append-only log.
/// Callers must not let a failure here affect the record table.
pub trait LedgerMirror: Send + Sync {
    fn record(&self, record: &Record, asset_path: &Path) -> Result<MirrorReceipt, MirrorError>;
}

pub struct DisabledMirror;

impl LedgerMirror for DisabledMirror {
    fn record(&self, _record: &Record, _asset_path: &Path) -> Result<MirrorReceipt, MirrorError> {
        Ok(MirrorReceipt::Disabled)
    }
}

/// One line of `ledger.jsonl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub record: Record,
    pub amount_cents: Option<i64>,
    pub blob_sha256: String,
}

/// Local mirror: images go into a content-addressed blob tree under
/// `<dir>/blobs`, entries are appended to `<dir>/ledger.jsonl`. Nothing is
/// ever rewritten or removed.
pub struct LocalLedger {
    dir: PathBuf,
}

impl LocalLedger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join("ledger.jsonl")
    }

    pub fn entries(&self) -> Result<Vec<LedgerEntry>, MirrorError> {
        let content = match std::fs::read_to_string(self.log_path()) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(MirrorError::from))
            .collect()
    }
}

impl LedgerMirror for LocalLedger {
    fn record(&self, record: &Record, asset_path: &Path) -> Result<MirrorReceipt, MirrorError> {
        let digest = hash::to_hex(&hash::sha256_file(asset_path)?);
        let ext = asset_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin")
            .to_lowercase();
        let blob = hash::blob_path(&self.dir.join("blobs"), &digest, &ext);
        if !blob.exists() {
            if let Some(parent) = blob.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(asset_path, &blob)?;
        }

        let entry = LedgerEntry {
            recorded_at: Utc::now(),
            record: record.clone(),
            amount_cents: amount_to_cents(&record.amount),
            blob_sha256: digest.clone(),
        };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        std::fs::create_dir_all(&self.dir)?;
        let mut log = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path())?;
        log.write_all(line.as_bytes())?;

        tracing::info!("Mirrored {} as {}", record.file, digest);
        Ok(MirrorReceipt::Recorded {
            blob_sha256: digest,
            blob,
        })
    }
}
