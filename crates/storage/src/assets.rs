use chrono::NaiveDateTime;
use regex::Regex;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// Upload name the camera capture flow always sends.
pub const CAPTURE_UPLOAD_NAME: &str = "captured_receipt.jpg";

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Invalid file name: '{0}'")]
    InvalidName(String),
    #[error("Upload is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn re_unsafe() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"[^A-Za-z0-9_.-]").expect("invalid regex"))
}

/// Reduce an uploaded file name to a flat, portable name.
///
/// The name is NFKD-decomposed and reduced to ASCII, so accented letters keep
/// their base letter. Path separators count as whitespace, whitespace runs
/// become `_`, anything outside `[A-Za-z0-9_.-]` is dropped and
/// leading/trailing `.`/`_` are stripped. Returns `None` when nothing usable
/// is left.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let ascii: String = name.nfkd().filter(char::is_ascii).collect();
    let spaced = ascii.replace(['/', '\\'], " ");
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned = re_unsafe().replace_all(&joined, "");
    let trimmed = cleaned.trim_matches(|c: char| c == '.' || c == '_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// `captured_receipt_<YYYYMMDD_HHMMSS>.jpg`. Unique to the second only.
pub fn captured_name(now: NaiveDateTime) -> String {
    format!("captured_receipt_{}.jpg", now.format("%Y%m%d_%H%M%S"))
}

/// The directory of stored receipt images. Records refer to its files by name.
#[derive(Debug, Clone)]
pub struct AssetStore {
    dir: PathBuf,
    max_upload_bytes: u64,
}

impl AssetStore {
    pub fn new(dir: impl Into<PathBuf>, max_upload_bytes: u64) -> Self {
        Self {
            dir: dir.into(),
            max_upload_bytes,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ensure_dir(&self) -> Result<(), AssetError> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// Resolve a stored name to its path. Any single plain file name is
    /// accepted, sanitized or not; names that would escape the directory
    /// are rejected.
    pub fn path_of(&self, file: &str) -> Result<PathBuf, AssetError> {
        let flat = !file.contains(['/', '\\', '\0'])
            && Path::new(file).file_name() == Some(OsStr::new(file));
        if flat {
            Ok(self.dir.join(file))
        } else {
            Err(AssetError::InvalidName(file.to_string()))
        }
    }

    pub fn exists(&self, file: &str) -> bool {
        self.path_of(file).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Store uploaded bytes and return the name they were stored under.
    /// An existing asset with the same name is overwritten.
    pub fn save_upload(
        &self,
        original_name: &str,
        data: &[u8],
        now: NaiveDateTime,
    ) -> Result<String, AssetError> {
        let size = data.len() as u64;
        if size > self.max_upload_bytes {
            return Err(AssetError::TooLarge {
                size,
                limit: self.max_upload_bytes,
            });
        }

        let name = if original_name == CAPTURE_UPLOAD_NAME {
            captured_name(now)
        } else {
            sanitize_filename(original_name)
                .ok_or_else(|| AssetError::InvalidName(original_name.to_string()))?
        };

        self.ensure_dir()?;
        std::fs::write(self.dir.join(&name), data)?;
        tracing::info!("Saved asset {}", name);
        Ok(name)
    }

    /// Delete a stored image. `Ok(false)` when it was already gone.
    pub fn remove(&self, file: &str) -> Result<bool, AssetError> {
        let path = self.path_of(file)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Names of all `.png`/`.jpg`/`.jpeg` files, sorted. A missing directory
    /// holds no images.
    pub fn list_images(&self) -> Result<Vec<String>, AssetError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_image = Path::new(&name)
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()));
            if is_image {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}
