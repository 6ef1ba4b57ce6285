pub mod service;

pub use service::{recognizer_from_config, ReceiptService, ReprocessReport, ServiceError};
