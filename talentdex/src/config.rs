//! Runtime configuration
//!
//! Defaults, then an optional TOML file (explicit path or `$TALENTDEX_CONFIG`),
//! then environment overrides. Every section is optional in the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ranking::{FuzzyPolicy, QueryWeights};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub index: IndexConfig,
    pub weights: QueryWeights,
    pub fuzzy: FuzzyPolicy,
    pub search: SearchConfig,
    pub worker: WorkerConfig,
    pub reindex: ReindexConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the SQLite database and the index directories
    pub data_dir: PathBuf,
    pub database_file: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            database_file: "candidates.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Index name; the index lives in `<data_dir>/<name>`
    pub name: String,
    pub ngram_min: usize,
    pub ngram_max: usize,
    pub writer_memory_bytes: usize,
    /// Reindex at startup when the primary store and index disagree on count
    pub reindex_when_drifted: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: "candidates".to_string(),
            ngram_min: 2,
            ngram_max: 3,
            writer_memory_bytes: 50_000_000,
            reindex_when_drifted: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_page_size: usize,
    pub max_page_size: usize,
    /// Deepest hit reachable by paging: `(page - 1) * size + size` must not exceed it
    pub max_result_window: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
            max_result_window: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Pending index jobs before new ones are dropped
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReindexConfig {
    pub page_size: usize,
}

impl Default for ReindexConfig {
    fn default() -> Self {
        Self { page_size: 300 }
    }
}

impl Config {
    /// Load configuration: defaults, file, environment overrides, validation
    pub fn load(explicit_path: Option<&Path>) -> ConfigResult<Self> {
        let path = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("TALENTDEX_CONFIG").ok().map(PathBuf::from));

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Configuration rooted at `data_dir`, everything else default
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.store.data_dir = data_dir.into();
        config
    }

    pub fn database_path(&self) -> PathBuf {
        self.store.data_dir.join(&self.store.database_file)
    }

    pub fn index_path(&self) -> PathBuf {
        self.store.data_dir.join(&self.index.name)
    }

    fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        if let Ok(dir) = std::env::var("TALENTDEX_DATA_DIR") {
            self.store.data_dir = PathBuf::from(dir);
        }
        if let Ok(name) = std::env::var("TALENTDEX_INDEX") {
            self.index.name = name;
        }
        if let Some(capacity) = env_usize("TALENTDEX_QUEUE_CAPACITY")? {
            self.worker.queue_capacity = capacity;
        }
        if let Some(page_size) = env_usize("TALENTDEX_REINDEX_PAGE_SIZE")? {
            self.reindex.page_size = page_size;
        }
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.index.name.trim().is_empty() {
            return Err(ConfigError::Invalid("index.name must not be empty".into()));
        }
        if self.index.ngram_min == 0 || self.index.ngram_min > self.index.ngram_max {
            return Err(ConfigError::Invalid(format!(
                "index n-gram sizes must satisfy 0 < min <= max (got {}..={})",
                self.index.ngram_min, self.index.ngram_max
            )));
        }
        if self.search.max_page_size == 0
            || self.search.default_page_size == 0
            || self.search.default_page_size > self.search.max_page_size
        {
            return Err(ConfigError::Invalid(
                "search page sizes must satisfy 0 < default <= max".into(),
            ));
        }
        if self.search.max_result_window < self.search.max_page_size {
            return Err(ConfigError::Invalid(
                "search.max_result_window must be at least search.max_page_size".into(),
            ));
        }
        if self.worker.queue_capacity == 0 || self.reindex.page_size == 0 {
            return Err(ConfigError::Invalid(
                "worker.queue_capacity and reindex.page_size must be positive".into(),
            ));
        }
        if self.fuzzy.name_distance > 2 || self.fuzzy.company_distance > 2 {
            return Err(ConfigError::Invalid("fuzzy distances above 2 are not supported".into()));
        }
        if self.fuzzy.name_max_expansions == 0 || self.fuzzy.company_max_expansions == 0 {
            return Err(ConfigError::Invalid("fuzzy expansion caps must be positive".into()));
        }
        if let Some(group) = self.weights.ordering_violation() {
            return Err(ConfigError::Invalid(format!(
                "weights for {group} must be positive and strictly decreasing from exact to fuzzy"
            )));
        }
        Ok(())
    }
}

fn env_usize(key: &'static str) -> ConfigResult<Option<usize>> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { key, value }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [index]
            name = "talent"
            ngram_max = 4

            [weights]
            name_exact = 40.0
            "#,
        )
        .unwrap();
        assert_eq!(config.index.name, "talent");
        assert_eq!(config.index.ngram_min, 2);
        assert_eq!(config.index.ngram_max, 4);
        assert_eq!(config.weights.name_exact, 40.0);
        assert_eq!(config.weights.name_phrase, 15.0);
        assert_eq!(config.reindex.page_size, 300);
        config.validate().unwrap();
    }

    #[test]
    fn test_invalid_ngram_range_rejected() {
        let mut config = Config::default();
        config.index.ngram_min = 4;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_result_window_below_page_size_rejected() {
        let mut config = Config::default();
        assert_eq!(config.search.max_result_window, 10_000);
        config.search.max_result_window = 50;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_company_expansion_cap_from_toml() {
        let config = Config::from_toml("[fuzzy]\ncompany_max_expansions = 10\n").unwrap();
        assert_eq!(config.fuzzy.company_max_expansions, 10);
        assert_eq!(config.fuzzy.name_max_expansions, 8);

        let mut config = Config::default();
        config.fuzzy.company_max_expansions = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_paths_derive_from_data_dir() {
        let config = Config::with_data_dir("/tmp/talent");
        assert_eq!(config.database_path(), PathBuf::from("/tmp/talent/candidates.db"));
        assert_eq!(config.index_path(), PathBuf::from("/tmp/talent/candidates"));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = Config::from_file(Path::new("/nonexistent/talentdex.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
