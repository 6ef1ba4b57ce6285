pub mod assets;
pub mod export;
pub mod hash;
pub mod mirror;
pub mod table;

pub use assets::{captured_name, sanitize_filename, AssetError, AssetStore, CAPTURE_UPLOAD_NAME};
pub use export::{export_csv, export_xlsx, xlsx_bytes, ExportError};
pub use hash::{blob_path, sha256_bytes, sha256_file, to_hex};
pub use mirror::{DisabledMirror, LedgerEntry, LedgerMirror, LocalLedger, MirrorError, MirrorReceipt};
pub use table::{read_table, CsvRecordStore, DeleteOutcome, RecordRepository, StoreError};
