use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("Failed to launch OCR engine {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("OCR timed out after {0:?}")]
    Timeout(Duration),
    #[error("Tesseract not available: build with `tesseract` feature")]
    NotAvailable,
}

/// Abstraction over an OCR backend.
/// Implementations accept encoded PNG/JPEG image bytes and return the recognized text.
/// Empty text is a valid result.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError>;
}

impl<T: OcrBackend + ?Sized> OcrBackend for Box<T> {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
        (**self).recognize(image_bytes)
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns a pre-set string — useful for unit testing the extraction pipeline
/// without requiring Tesseract to be installed.
pub struct MockRecognizer {
    pub text: String,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(&self, _image_bytes: &[u8]) -> Result<String, OcrError> {
        Ok(self.text.clone())
    }
}

// ── Command-line backend ──────────────────────────────────────────────────────

const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Pipes the image through the `tesseract` executable (`tesseract stdin stdout`).
///
/// With a timeout set, an engine that outlives it is killed and reaped.
pub struct CliRecognizer {
    command: PathBuf,
    data_path: Option<PathBuf>,
    lang: String,
    timeout: Option<Duration>,
}

impl CliRecognizer {
    pub fn new(command: impl Into<PathBuf>, data_path: Option<PathBuf>, lang: &str) -> Self {
        Self {
            command: command.into(),
            data_path,
            lang: lang.to_string(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn command_line(&self) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.arg("stdin").arg("stdout").arg("-l").arg(&self.lang);
        if let Some(dir) = &self.data_path {
            cmd.arg("--tessdata-dir").arg(dir);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    fn wait(&self, child: &mut Child) -> Result<ExitStatus, OcrError> {
        let engine_err = |e: std::io::Error| OcrError::Engine(e.to_string());
        let Some(limit) = self.timeout else {
            return child.wait().map_err(engine_err);
        };
        let deadline = Instant::now() + limit;
        loop {
            if let Some(status) = child.try_wait().map_err(engine_err)? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                if let Err(e) = child.kill() {
                    tracing::warn!("Failed to kill OCR engine {}: {}", child.id(), e);
                }
                child.wait().map_err(engine_err)?;
                return Err(OcrError::Timeout(limit));
            }
            std::thread::sleep(CHILD_POLL_INTERVAL);
        }
    }
}

fn read_pipe(mut pipe: impl Read) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    pipe.read_to_end(&mut buf)?;
    Ok(buf)
}

fn joined<T>(handle: std::thread::ScopedJoinHandle<'_, std::io::Result<T>>) -> std::io::Result<T> {
    handle
        .join()
        .unwrap_or_else(|_| Err(std::io::Error::other("pipe thread panicked")))
}

impl OcrBackend for CliRecognizer {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
        let spawn_err = |source: std::io::Error| OcrError::Spawn {
            command: self.command.display().to_string(),
            source,
        };
        let mut child = self.command_line().spawn().map_err(spawn_err)?;
        let missing = |name: &str| OcrError::Engine(format!("{name} unavailable"));
        let mut stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

        // Every pipe gets its own thread so a chatty engine can't deadlock on a full pipe.
        let (status, written, stdout, stderr) = std::thread::scope(|s| {
            let writer = s.spawn(move || stdin.write_all(image_bytes));
            let out = s.spawn(move || read_pipe(stdout));
            let err = s.spawn(move || read_pipe(stderr));
            let status = self.wait(&mut child);
            (status, joined(writer), joined(out), joined(err))
        });

        let status = status?;
        let io_err = |e: std::io::Error| OcrError::Engine(e.to_string());
        let stdout = stdout.map_err(io_err)?;
        let stderr = stderr.map_err(io_err)?;
        if !status.success() {
            return Err(OcrError::Engine(format!(
                "{} exited with {}: {}",
                self.command.display(),
                status,
                String::from_utf8_lossy(&stderr).trim()
            )));
        }
        written.map_err(io_err)?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrBackend, OcrError};
    use leptess::LepTess;

    pub struct TesseractRecognizer {
        data_path: Option<String>,
        lang: String,
    }

    impl TesseractRecognizer {
        pub fn new(data_path: Option<String>, lang: &str) -> Self {
            Self { data_path, lang: lang.to_string() }
        }
    }

    impl OcrBackend for TesseractRecognizer {
        fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
            let mut lt = LepTess::new(self.data_path.as_deref(), &self.lang)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.set_image_from_mem(image_bytes)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))
        }
    }
}
