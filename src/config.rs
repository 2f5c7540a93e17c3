use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct BookvecConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Full URL of the `/api/embeddings` endpoint.
    pub url: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Expected vector length. When unset, the first vector of a run fixes it.
    pub dimensions: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    pub context_window: usize,
    /// Worker thread count; `0` means half the available CPUs.
    pub workers: usize,
    pub queue_capacity: usize,
    pub progress_interval_secs: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_bookvec_dir()
            .join("ebooks.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434/api/embeddings".into(),
            model: "mxbai-embed-large".into(),
            timeout_secs: 60,
            dimensions: None,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            context_window: 2,
            workers: 0,
            queue_capacity: 100,
            progress_interval_secs: 2,
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl PipelineConfig {
    /// Resolve the worker count, defaulting to half the CPUs (at least one).
    pub fn resolved_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        (cpus / 2).max(1)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs.max(1))
    }
}

/// Returns `~/.bookvec/`
pub fn default_bookvec_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".bookvec")
}

/// Returns the default config file path: `~/.bookvec/config.toml`
pub fn default_config_path() -> PathBuf {
    default_bookvec_dir().join("config.toml")
}

impl BookvecConfig {
    /// Load config from the default TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            BookvecConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply BOOKVEC_DB, BOOKVEC_EMBEDDING_URL, BOOKVEC_EMBEDDING_MODEL and BOOKVEC_LOG_LEVEL.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("BOOKVEC_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("BOOKVEC_EMBEDDING_URL") {
            self.embedding.url = val;
        }
        if let Ok(val) = std::env::var("BOOKVEC_EMBEDDING_MODEL") {
            self.embedding.model = val;
        }
        if let Ok(val) = std::env::var("BOOKVEC_LOG_LEVEL") {
            self.logging.log_level = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
