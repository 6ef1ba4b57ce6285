pub mod classify;
pub mod extract;
pub mod pipeline;
pub mod preprocess;
pub mod recognizer;

pub use classify::classify;
pub use extract::{extract_amount, extract_category, extract_date, extract_fields, Fields};
pub use pipeline::{analyze_text, AnalyzeError, ReceiptAnalyzer};
pub use preprocess::{binarize, encode_png, prepare_for_ocr_from_bytes, PreprocessError};
pub use recognizer::{CliRecognizer, MockRecognizer, OcrBackend, OcrError};
#[cfg(feature = "tesseract")]
pub use recognizer::tesseract_backend::TesseractRecognizer;
