use std::path::{Path, PathBuf};
use std::time::Duration;

use scrip_core::{Analysis, Config, OcrConfig, OcrEngine, Record, Summary};
use scrip_ocr::{AnalyzeError, CliRecognizer, MockRecognizer, OcrBackend, OcrError, ReceiptAnalyzer};
use scrip_storage::{
    export_csv, export_xlsx, sanitize_filename, AssetError, AssetStore, CsvRecordStore,
    DeleteOutcome, DisabledMirror, ExportError, LedgerMirror, LocalLedger, RecordRepository,
    StoreError,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Analyze(#[from] AnalyzeError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct ReprocessReport {
    pub processed: Vec<Record>,
    /// (file, error) for every image that could not be analyzed.
    pub failed: Vec<(String, String)>,
    pub table_rewritten: bool,
}

/// Pick the OCR backend named by the config.
pub fn recognizer_from_config(cfg: &OcrConfig) -> Result<Box<dyn OcrBackend>, OcrError> {
    match cfg.engine {
        OcrEngine::Cli => Ok(Box::new(
            CliRecognizer::new(cfg.command.clone(), cfg.data_path.clone(), &cfg.lang)
                .with_timeout(Duration::from_secs(cfg.timeout_secs)),
        )),
        OcrEngine::Mock => Ok(Box::new(MockRecognizer::new(""))),
        #[cfg(feature = "tesseract")]
        OcrEngine::Tesseract => Ok(Box::new(scrip_ocr::TesseractRecognizer::new(
            cfg.data_path.as_ref().map(|p| p.display().to_string()),
            &cfg.lang,
        ))),
        #[cfg(not(feature = "tesseract"))]
        OcrEngine::Tesseract => Err(OcrError::NotAvailable),
    }
}

/// Ties the analyzer, the record table, the image directory and the optional
/// ledger mirror together.
pub struct ReceiptService<R: OcrBackend> {
    analyzer: ReceiptAnalyzer<R>,
    assets: AssetStore,
    store: Box<dyn RecordRepository>,
    table_path: PathBuf,
    mirror: Box<dyn LedgerMirror>,
}

impl<R: OcrBackend + 'static> ReceiptService<R> {
    pub fn new(config: &Config, recognizer: R) -> Self {
        let assets = AssetStore::new(&config.assets_dir, config.max_upload_bytes);
        let store = CsvRecordStore::new(&config.table_path, assets.clone());
        let mirror: Box<dyn LedgerMirror> = if config.mirror.enabled {
            Box::new(LocalLedger::new(&config.mirror.dir))
        } else {
            Box::new(DisabledMirror)
        };
        Self {
            analyzer: ReceiptAnalyzer::new(
                recognizer,
                Duration::from_secs(config.ocr.timeout_secs),
            ),
            assets,
            store: Box::new(store),
            table_path: config.table_path.clone(),
            mirror,
        }
    }

    pub fn with_mirror(mut self, mirror: Box<dyn LedgerMirror>) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    /// Store an uploaded image, analyze it and persist the record.
    ///
    /// If analysis fails the image stays stored and no row is written.
    pub async fn ingest(&self, original_name: &str, data: &[u8]) -> Result<Record, ServiceError> {
        let now = chrono::Local::now().naive_local();
        let file = self.assets.save_upload(original_name, data, now)?;
        let path = self.assets.path_of(&file)?;

        let (analysis, _) = self.analyzer.analyze(&path).await?;
        let record = analysis.into_record(file);
        self.store.append(record.clone())?;

        self.offer_to_mirror(&record, &path);
        Ok(record)
    }

    /// Ingest an image that already sits somewhere on disk.
    pub async fn ingest_path(&self, path: &Path) -> Result<Record, ServiceError> {
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.ingest(&name, &data).await
    }

    /// Analyze without storing anything.
    pub async fn extract(&self, path: &Path) -> Result<Analysis, ServiceError> {
        let (analysis, _) = self.analyzer.analyze(path).await?;
        Ok(analysis)
    }

    pub fn list(&self) -> Result<Vec<Record>, ServiceError> {
        Ok(self.store.list()?)
    }

    pub fn update(&self, file: &str, analysis: Analysis) -> Result<Record, ServiceError> {
        Ok(self.store.update(file, analysis)?)
    }

    /// Plain file names are used as stored; anything path-like is reduced
    /// to its sanitized form first.
    pub fn delete(&self, file: &str) -> Result<DeleteOutcome, ServiceError> {
        let key = match self.assets.path_of(file) {
            Ok(_) => file.to_string(),
            Err(_) => sanitize_filename(file).unwrap_or_else(|| file.to_string()),
        };
        Ok(self.store.delete(&key)?)
    }

    /// Re-analyze every stored image and rebuild the table from the ones that
    /// succeed. Failures are logged and skipped; if nothing succeeds the
    /// table is left alone.
    pub async fn reprocess_all(&self) -> Result<ReprocessReport, ServiceError> {
        let images = self.assets.list_images()?;
        let mut processed = Vec::new();
        let mut failed = Vec::new();

        for file in images {
            let path = self.assets.dir().join(&file);
            match self.analyzer.analyze(&path).await {
                Ok((analysis, _)) => processed.push(analysis.into_record(file)),
                Err(e) => {
                    tracing::warn!("Error processing {}: {}", file, e);
                    failed.push((file, e.to_string()));
                }
            }
        }

        let table_rewritten = !processed.is_empty();
        if table_rewritten {
            self.store.replace_all(&processed)?;
        }
        tracing::info!(
            processed = processed.len(),
            failed = failed.len(),
            "Reprocessed stored images"
        );
        Ok(ReprocessReport {
            processed,
            failed,
            table_rewritten,
        })
    }

    pub fn export_csv(&self, dest: &Path) -> Result<u64, ServiceError> {
        Ok(export_csv(&self.table_path, dest)?)
    }

    pub fn export_xlsx(&self, dest: &Path) -> Result<usize, ServiceError> {
        Ok(export_xlsx(&self.table_path, dest)?)
    }

    pub fn summary(&self) -> Result<Summary, ServiceError> {
        Ok(Summary::from_records(&self.store.read_all()?))
    }

    fn offer_to_mirror(&self, record: &Record, path: &Path) {
        if let Err(e) = self.mirror.record(record, path) {
            tracing::warn!("Ledger mirror failed for {}: {}", record.file, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
    use scrip_core::{Category, DocumentType, NOT_FOUND};
    use scrip_storage::{MirrorError, MirrorReceipt};
    use std::io::Cursor;

    fn tiny_png() -> Vec<u8> {
        let img: GrayImage = ImageBuffer::from_fn(4, 4, |_, _| Luma([200u8]));
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn service(dir: &Path, text: &str) -> ReceiptService<MockRecognizer> {
        ReceiptService::new(&Config::for_data_dir(dir), MockRecognizer::new(text))
    }

    struct FailingMirror;

    impl LedgerMirror for FailingMirror {
        fn record(&self, _: &Record, _: &Path) -> Result<MirrorReceipt, MirrorError> {
            Err(MirrorError::Io(std::io::Error::other("ledger unreachable")))
        }
    }

    struct EmptyEngine;

    impl OcrBackend for EmptyEngine {
        fn recognize(&self, _: &[u8]) -> Result<String, OcrError> {
            Err(OcrError::Engine("no engine".into()))
        }
    }

    #[tokio::test]
    async fn ingest_persists_analyzed_record() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(
            dir.path(),
            "RECEIPT\nTotal: $45.67\nDate: 03/15/2024\nUber ride downtown",
        );

        let record = svc.ingest("ride.png", &tiny_png()).await.unwrap();
        assert_eq!(record.file, "ride.png");
        assert_eq!(record.doc_type, DocumentType::Receipt);
        assert_eq!(record.amount, "45.67");
        assert_eq!(record.date, "03/15/2024");
        assert_eq!(record.category, Category::Travel);

        assert_eq!(svc.list().unwrap(), vec![record]);
    }

    #[tokio::test]
    async fn reingesting_same_name_keeps_one_row() {
        let dir = tempfile::tempdir().unwrap();
        service(dir.path(), "RECEIPT\nTotal: $1.00")
            .ingest("r1.jpg", &tiny_png())
            .await
            .unwrap();
        service(dir.path(), "Invoice\nAmount: 12.50")
            .ingest("r1.jpg", &tiny_png())
            .await
            .unwrap();

        let rows = service(dir.path(), "").list().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].doc_type, DocumentType::Invoice);
        assert_eq!(rows[0].amount, "12.50");
    }

    #[tokio::test]
    async fn failed_analysis_keeps_image_but_writes_no_row() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), "RECEIPT");
        let err = svc.ingest("broken.jpg", b"not an image").await.unwrap_err();
        assert!(matches!(err, ServiceError::Analyze(_)));
        assert!(svc.assets().exists("broken.jpg"));
        assert!(svc.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn mirror_failure_does_not_block_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), "receipt").with_mirror(Box::new(FailingMirror));
        let record = svc.ingest("a.png", &tiny_png()).await.unwrap();
        assert_eq!(svc.list().unwrap(), vec![record]);
    }

    #[tokio::test]
    async fn enabled_mirror_logs_ingested_records() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config::for_data_dir(dir.path());
        cfg.mirror.enabled = true;
        let svc = ReceiptService::new(&cfg, MockRecognizer::new("Total: $45.67"));
        svc.ingest("a.png", &tiny_png()).await.unwrap();

        let entries = LocalLedger::new(&cfg.mirror.dir).entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount_cents, Some(4567));
    }

    #[tokio::test]
    async fn delete_then_delete_again() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), "receipt");
        svc.ingest("a.png", &tiny_png()).await.unwrap();

        let first = svc.delete("a.png").unwrap();
        assert_eq!(first.rows_removed, 1);
        assert!(first.asset_removed);
        let second = svc.delete("a.png").unwrap();
        assert_eq!(second.rows_removed, 0);
        assert!(svc.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_corrects_fields() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), "receipt");
        svc.ingest("a.png", &tiny_png()).await.unwrap();

        let fixed = svc
            .update(
                "a.png",
                Analysis {
                    doc_type: DocumentType::Bill,
                    date: "01/02/2024".into(),
                    amount: "3.50".into(),
                    category: Category::Food,
                },
            )
            .unwrap();
        assert_eq!(svc.list().unwrap(), vec![fixed]);
        assert!(matches!(
            svc.update("b.png", Analysis {
                doc_type: DocumentType::Bill,
                date: NOT_FOUND.into(),
                amount: NOT_FOUND.into(),
                category: Category::Other,
            }),
            Err(ServiceError::Store(StoreError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn reprocess_rebuilds_table_and_skips_bad_images() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::for_data_dir(dir.path());
        std::fs::create_dir_all(&cfg.assets_dir).unwrap();
        std::fs::write(cfg.assets_dir.join("a.png"), tiny_png()).unwrap();
        std::fs::write(cfg.assets_dir.join("b.jpg"), b"corrupt").unwrap();
        std::fs::write(cfg.assets_dir.join("notes.txt"), b"ignored").unwrap();
        std::fs::create_dir_all(cfg.table_path.parent().unwrap()).unwrap();
        std::fs::write(&cfg.table_path, "garbage that is,not a table\n").unwrap();

        let svc = ReceiptService::new(&cfg, MockRecognizer::new("Invoice\nAmount: 12.50"));
        let report = svc.reprocess_all().await.unwrap();

        assert!(report.table_rewritten);
        assert_eq!(report.processed.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "b.jpg");

        let rows = svc.list().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].file, "a.png");
        assert_eq!(rows[0].doc_type, DocumentType::Invoice);
    }

    #[tokio::test]
    async fn reprocessed_unsanitized_names_stay_listable_and_deletable() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::for_data_dir(dir.path());
        std::fs::create_dir_all(&cfg.assets_dir).unwrap();
        std::fs::write(cfg.assets_dir.join("My Receipt.png"), tiny_png()).unwrap();

        let svc = ReceiptService::new(&cfg, MockRecognizer::new("RECEIPT\nTotal: $9.99"));
        let report = svc.reprocess_all().await.unwrap();
        assert_eq!(report.processed[0].file, "My Receipt.png");

        let rows = svc.list().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].file, "My Receipt.png");
        assert_eq!(svc.summary().unwrap().total_receipts, 1);

        let outcome = svc.delete("My Receipt.png").unwrap();
        assert_eq!(outcome.file, "My Receipt.png");
        assert_eq!(outcome.rows_removed, 1);
        assert!(outcome.asset_removed);
        assert!(svc.list().unwrap().is_empty());
        assert_eq!(svc.summary().unwrap().total_receipts, 0);
    }

    #[tokio::test]
    async fn delete_sanitizes_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), "receipt");
        svc.ingest("a.png", &tiny_png()).await.unwrap();

        let outcome = svc.delete("../a.png").unwrap();
        assert_eq!(outcome.file, "a.png");
        assert_eq!(outcome.rows_removed, 1);
    }

    #[tokio::test]
    async fn reprocess_with_no_successes_leaves_table() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::for_data_dir(dir.path());
        let good = service(dir.path(), "receipt");
        good.ingest("a.png", &tiny_png()).await.unwrap();
        let before = std::fs::read_to_string(&cfg.table_path).unwrap();

        let broken = ReceiptService::new(&cfg, EmptyEngine);
        let report = broken.reprocess_all().await.unwrap();
        assert!(!report.table_rewritten);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(std::fs::read_to_string(&cfg.table_path).unwrap(), before);
    }

    #[tokio::test]
    async fn exports_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), "Total: $45.67");
        assert!(matches!(
            svc.export_csv(&dir.path().join("x.csv")),
            Err(ServiceError::Export(ExportError::NoData))
        ));

        svc.ingest("a.png", &tiny_png()).await.unwrap();
        svc.ingest("b.png", &tiny_png()).await.unwrap();

        let csv_dest = dir.path().join("receipts.csv");
        svc.export_csv(&csv_dest).unwrap();
        assert!(std::fs::read_to_string(&csv_dest)
            .unwrap()
            .starts_with("type,date,amount,category,file\n"));

        let xlsx_dest = dir.path().join("receipts.xlsx");
        assert_eq!(svc.export_xlsx(&xlsx_dest).unwrap(), 2);

        let s = svc.summary().unwrap();
        assert_eq!(s.total_receipts, 2);
        assert_eq!(s.total_expenses.to_string(), "91.34");
    }

    #[test]
    fn recognizer_selection() {
        let mut cfg = OcrConfig::default();
        assert!(recognizer_from_config(&cfg).is_ok());
        cfg.engine = OcrEngine::Mock;
        assert_eq!(recognizer_from_config(&cfg).unwrap().recognize(b"").unwrap(), "");
        #[cfg(not(feature = "tesseract"))]
        {
            cfg.engine = OcrEngine::Tesseract;
            assert!(matches!(recognizer_from_config(&cfg), Err(OcrError::NotAvailable)));
        }
    }
}
