// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    #[serde(default)]
    pub retry: RetryTomlConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Model used for SQL and insight generation ("provider/model").
    pub generator: String,
    pub embedder: String,
    pub temperature: f32,
    pub base_url: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            generator: "openai/gpt-4o-mini".into(),
            embedder: "openai/text-embedding-3-small".into(),
            temperature: 0.0,
            base_url: None,
            api_key_env: "OPENAI_API_KEY".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    /// Schema script to ingest. When unset the live database catalog is used.
    pub schema_file: Option<PathBuf>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("backend/db/retail.db"),
            schema_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub collection: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            collection: "schema_embeddings".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LongTermWriteMode {
    /// Spawn the long-term leg and return once the short-term append is done.
    Background,
    /// Await both legs before returning.
    Inline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// Ask the generator model which facts are worth keeping.
    Model,
    /// Store the rendered interaction as-is.
    Verbatim,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Memory database; defaults to `<data_dir>/sqlbuddy.db`.
    pub path: Option<PathBuf>,
    pub short_term_max_entries: usize,
    pub short_term_ttl_seconds: u64,
    pub k_short: usize,
    pub k_long: usize,
    pub insights_preview_chars: usize,
    pub long_term_insights_chars: usize,
    pub insight_row_limit: usize,
    pub long_term_writes: LongTermWriteMode,
    pub extraction: ExtractionMode,
    pub dedup_threshold: f32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            path: None,
            short_term_max_entries: 10,
            short_term_ttl_seconds: 3600,
            k_short: 3,
            k_long: 2,
            insights_preview_chars: 100,
            long_term_insights_chars: 300,
            insight_row_limit: 50,
            long_term_writes: LongTermWriteMode::Background,
            extraction: ExtractionMode::Model,
            dedup_threshold: 0.9,
        }
    }
}

impl MemoryConfig {
    pub fn short_term_ttl(&self) -> Duration {
        Duration::from_secs(self.short_term_ttl_seconds)
    }

    pub fn db_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(paths::memory_db_path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    pub memory_ms: u64,
    pub retrieval_ms: u64,
    pub generation_seconds: u64,
    pub execution_seconds: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            memory_ms: 5_000,
            retrieval_ms: 10_000,
            generation_seconds: 60,
            execution_seconds: 30,
        }
    }
}

impl TimeoutsConfig {
    pub fn memory(&self) -> Duration {
        Duration::from_millis(self.memory_ms)
    }

    /// Schema search, including the embedding call for the question.
    pub fn retrieval(&self) -> Duration {
        Duration::from_millis(self.retrieval_ms)
    }

    /// A long-term write runs model extraction before touching the store,
    /// so it gets the generation budget on top of the store budget.
    pub fn long_term_write(&self) -> Duration {
        self.generation() + self.memory()
    }

    pub fn generation(&self) -> Duration {
        Duration::from_secs(self.generation_seconds)
    }

    pub fn execution(&self) -> Duration {
        Duration::from_secs(self.execution_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryTomlConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryTomlConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 15_000,
        }
    }
}

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_reasonable() {
        let c = Config::default();
        assert_eq!(c.memory.short_term_max_entries, 10);
        assert_eq!(c.memory.short_term_ttl(), Duration::from_secs(3600));
        assert_eq!(c.memory.k_short, 3);
        assert_eq!(c.memory.k_long, 2);
        assert_eq!(c.memory.insights_preview_chars, 100);
        assert_eq!(c.retrieval.top_k, 3);
        assert_eq!(c.memory.long_term_writes, LongTermWriteMode::Background);
        assert_eq!(c.memory.extraction, ExtractionMode::Model);
    }

    #[test]
    fn test_models_defaults() {
        let m = ModelsConfig::default();
        assert_eq!(m.generator, "openai/gpt-4o-mini");
        assert_eq!(m.embedder, "openai/text-embedding-3-small");
        assert_eq!(m.api_key_env, "OPENAI_API_KEY");
        assert!(m.base_url.is_none());
    }

    #[test]
    fn test_timeouts_defaults() {
        let t = TimeoutsConfig::default();
        assert_eq!(t.memory(), Duration::from_millis(5000));
        assert_eq!(t.retrieval(), Duration::from_millis(10_000));
        assert_eq!(t.generation(), Duration::from_secs(60));
        assert_eq!(t.execution(), Duration::from_secs(30));
    }

    #[test]
    fn test_long_term_write_outlasts_extraction() {
        let t = TimeoutsConfig::default();
        assert!(t.long_term_write() > t.generation());
        assert!(t.long_term_write() > t.memory());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.memory.short_term_max_entries, 10);
        assert_eq!(config.database.path, PathBuf::from("backend/db/retail.db"));
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[models]
generator = "openai/gpt-4.1-mini"
embedder = "openai/text-embedding-3-large"
temperature = 0.2
base_url = "http://localhost:8080/v1"
api_key_env = "LOCAL_KEY"

[database]
path = "/data/retail.db"
schema_file = "/data/schema.sql"

[retrieval]
top_k = 5
collection = "tables"

[memory]
path = "/tmp/mem.db"
short_term_max_entries = 20
short_term_ttl_seconds = 600
k_short = 5
k_long = 4
insights_preview_chars = 80
long_term_insights_chars = 200
insight_row_limit = 10
long_term_writes = "inline"
extraction = "verbatim"
dedup_threshold = 0.8

[timeouts]
memory_ms = 250
retrieval_ms = 750
generation_seconds = 10
execution_seconds = 5

[retry]
max_retries = 1
initial_delay_ms = 10
max_delay_ms = 100
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.models.generator, "openai/gpt-4.1-mini");
        assert_eq!(
            config.models.base_url.as_deref(),
            Some("http://localhost:8080/v1")
        );
        assert_eq!(
            config.database.schema_file,
            Some(PathBuf::from("/data/schema.sql"))
        );
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.memory.db_path(), PathBuf::from("/tmp/mem.db"));
        assert_eq!(config.memory.short_term_max_entries, 20);
        assert_eq!(config.memory.long_term_writes, LongTermWriteMode::Inline);
        assert_eq!(config.memory.extraction, ExtractionMode::Verbatim);
        assert_eq!(config.timeouts.memory(), Duration::from_millis(250));
        assert_eq!(config.timeouts.retrieval(), Duration::from_millis(750));
        assert_eq!(config.retry.max_retries, 1);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = Config::default();
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(
            deserialized.memory.short_term_ttl_seconds,
            config.memory.short_term_ttl_seconds
        );
        assert_eq!(deserialized.models.generator, config.models.generator);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }
}
