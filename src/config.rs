use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub preview: PreviewConfig,

    #[serde(default)]
    pub upload: UploadConfig,

    #[serde(default)]
    pub download: DownloadConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Append-only log of processed images.
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,

    /// Directory holding the processed PNGs referenced by the log.
    #[serde(default = "default_blob_dir")]
    pub blob_dir: PathBuf,

    /// How many of the most recent results the history panel shows.
    #[serde(default = "default_gallery_size")]
    pub gallery_size: usize,
}

fn default_log_path() -> PathBuf {
    data_dir().join("history_log.txt")
}

fn default_blob_dir() -> PathBuf {
    data_dir().join("history")
}

fn default_gallery_size() -> usize {
    5
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            log_path: default_log_path(),
            blob_dir: default_blob_dir(),
            gallery_size: default_gallery_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Explicit model file. When unset the model is downloaded into `models_dir`.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_model_url")]
    pub url: String,

    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,
}

fn default_model_url() -> String {
    "https://github.com/danielgatis/rembg/releases/download/v0.0.0/u2net.onnx".to_string()
}

fn default_models_dir() -> PathBuf {
    data_dir().join("models")
}

fn default_intra_threads() -> usize {
    4
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: None,
            url: default_model_url(),
            models_dir: default_models_dir(),
            intra_threads: default_intra_threads(),
        }
    }
}

impl ModelConfig {
    /// Where the model file lives, whether or not it has been downloaded yet.
    pub fn model_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| self.models_dir.join("u2net.onnx"))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImageProtocol {
    #[default]
    Auto,
    Sixel,
    Kitty,
    ITerm2,
    Halfblocks,
    None,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreviewConfig {
    #[serde(default)]
    pub protocol: ImageProtocol,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_image_extensions")]
    pub extensions: Vec<String>,
}

fn default_image_extensions() -> Vec<String> {
    vec!["jpg".to_string(), "png".to_string(), "jpeg".to_string()]
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            extensions: default_image_extensions(),
        }
    }
}

impl UploadConfig {
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.to_lowercase() == ext))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    #[serde(default = "default_download_dir")]
    pub dir: PathBuf,
}

fn default_download_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            dir: default_download_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default `EnvFilter` directive. `CUTOUT_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Where the rolling log file goes when journald is unavailable.
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    data_dir().join("logs")
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: default_log_dir(),
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from(".local/share"))
        .join("cutout")
}

impl Config {
    pub fn load() -> Result<Self> {
        match std::env::var_os("CUTOUT_CONFIG") {
            Some(path) => Self::load_from(Path::new(&path)),
            None => Self::load_from(&Self::config_path()),
        }
    }

    /// Load from an explicit path, writing defaults there if the file is missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Invalid config {}", path.display()))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cutout")
    }

    fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}
