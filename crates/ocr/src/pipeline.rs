use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use scrip_core::Analysis;
use thiserror::Error;

use crate::classify::classify;
use crate::extract::extract_fields;
use crate::preprocess::{self, PreprocessError};
use crate::recognizer::{OcrBackend, OcrError};

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("OCR recognition failed: {0}")]
    Ocr(#[from] OcrError),
    #[error("OCR worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Orchestrates: read → binarize → OCR → classify → extract.
///
/// All-or-nothing: any stage failing fails the whole analysis.
pub struct ReceiptAnalyzer<R: OcrBackend> {
    recognizer: Arc<R>,
    timeout: Duration,
}

impl<R: OcrBackend + 'static> ReceiptAnalyzer<R> {
    pub fn new(recognizer: R, timeout: Duration) -> Self {
        Self {
            recognizer: Arc::new(recognizer),
            timeout,
        }
    }

    /// Analyze an image on disk. Returns the analysis and the file name it
    /// should be stored under.
    pub async fn analyze(&self, path: &Path) -> Result<(Analysis, String), AnalyzeError> {
        tracing::info!("Processing image: {}", path.display());
        let bytes = tokio::fs::read(path).await?;
        let analysis = self.analyze_bytes(&bytes).await?;
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracing::info!(
            file = %file,
            doc_type = %analysis.doc_type,
            date = %analysis.date,
            amount = %analysis.amount,
            category = %analysis.category,
            "Analysis complete"
        );
        Ok((analysis, file))
    }

    pub async fn analyze_bytes(&self, data: &[u8]) -> Result<Analysis, AnalyzeError> {
        let image_bytes = preprocess::prepare_for_ocr_from_bytes(data)?;
        let text = self.recognize(image_bytes).await?;
        tracing::debug!("Extracted text: {}", text.chars().take(100).collect::<String>());
        Ok(analyze_text(&text))
    }

    /// Runs the backend on a blocking thread, bounded by the configured timeout.
    /// The blocking call itself is not interrupted; backends that own a
    /// process (`CliRecognizer::with_timeout`) kill it on their own deadline.
    async fn recognize(&self, image_bytes: Vec<u8>) -> Result<String, AnalyzeError> {
        let recognizer = Arc::clone(&self.recognizer);
        let task = tokio::task::spawn_blocking(move || recognizer.recognize(&image_bytes));
        match tokio::time::timeout(self.timeout, task).await {
            Ok(joined) => Ok(joined??),
            Err(_) => Err(OcrError::Timeout(self.timeout).into()),
        }
    }
}

/// Classify and extract fields from already-recognized text.
pub fn analyze_text(text: &str) -> Analysis {
    let fields = extract_fields(text);
    Analysis {
        doc_type: classify(text),
        date: fields.date,
        amount: fields.amount,
        category: fields.category,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
