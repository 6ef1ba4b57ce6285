use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Upload ceiling applied to incoming images.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OcrEngine {
    /// Shell out to the `tesseract` executable.
    #[default]
    Cli,
    /// Link libtesseract directly (needs the `tesseract` cargo feature).
    Tesseract,
    /// Returns empty text; only useful for dry runs.
    Mock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrConfig {
    pub engine: OcrEngine,
    pub command: PathBuf,
    pub data_path: Option<PathBuf>,
    pub lang: String,
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            engine: OcrEngine::Cli,
            command: PathBuf::from("tesseract"),
            data_path: None,
            lang: "eng".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorConfig {
    pub enabled: bool,
    pub dir: PathBuf,
}

/// Runtime configuration, injected into every component at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub assets_dir: PathBuf,
    pub table_path: PathBuf,
    pub max_upload_bytes: u64,
    pub ocr: OcrConfig,
    pub mirror: MirrorConfig,
}

// Every key in a config file is optional and falls back to `Config::for_data_dir`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    assets_dir: Option<PathBuf>,
    table_path: Option<PathBuf>,
    max_upload_bytes: Option<u64>,
    #[serde(default)]
    ocr: RawOcr,
    #[serde(default)]
    mirror: RawMirror,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOcr {
    engine: Option<OcrEngine>,
    command: Option<PathBuf>,
    data_path: Option<PathBuf>,
    lang: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMirror {
    enabled: Option<bool>,
    dir: Option<PathBuf>,
}

impl Config {
    /// Defaults rooted at `data_dir`.
    pub fn for_data_dir(data_dir: &Path) -> Self {
        Self {
            assets_dir: data_dir.join("input_images"),
            table_path: data_dir.join("extracted_data").join("output.csv"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            ocr: OcrConfig::default(),
            mirror: MirrorConfig {
                enabled: false,
                dir: data_dir.join("ledger"),
            },
        }
    }

    pub fn load(path: &Path, data_dir: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content, data_dir)
    }

    pub fn from_toml(content: &str, data_dir: &Path) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(content)?;
        let mut cfg = Self::for_data_dir(data_dir);

        if let Some(v) = raw.assets_dir {
            cfg.assets_dir = v;
        }
        if let Some(v) = raw.table_path {
            cfg.table_path = v;
        }
        if let Some(v) = raw.max_upload_bytes {
            cfg.max_upload_bytes = v;
        }

        let ocr = raw.ocr;
        if let Some(v) = ocr.engine {
            cfg.ocr.engine = v;
        }
        if let Some(v) = ocr.command {
            cfg.ocr.command = v;
        }
        if ocr.data_path.is_some() {
            cfg.ocr.data_path = ocr.data_path;
        }
        if let Some(v) = ocr.lang {
            cfg.ocr.lang = v;
        }
        if let Some(v) = ocr.timeout_secs {
            cfg.ocr.timeout_secs = v;
        }

        if let Some(v) = raw.mirror.enabled {
            cfg.mirror.enabled = v;
        }
        if let Some(v) = raw.mirror.dir {
            cfg.mirror.dir = v;
        }

        Ok(cfg)
    }
}
