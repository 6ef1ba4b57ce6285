pub mod config;
pub mod record;
pub mod summary;

pub use config::{Config, ConfigError, MirrorConfig, OcrConfig, OcrEngine};
pub use record::{Analysis, Category, DocumentType, Record, NOT_FOUND, TABLE_HEADER};
pub use summary::{amount_to_cents, parse_amount, Summary};
