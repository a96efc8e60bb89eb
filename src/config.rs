use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub websearch: WebSearchConfig,
    #[serde(default)]
    pub recommend: RecommendConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    /// Pool size. The chat workload is read-heavy with one effective
    /// writer, so a handful of connections is plenty.
    #[serde(default = "default_db_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Where the vector index snapshot lives on disk.
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
        }
    }
}

fn default_index_path() -> PathBuf {
    PathBuf::from("./data/index.json")
}

fn default_db_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            max_retries: default_max_retries(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebSearchConfig {
    #[serde(default = "default_search_engine")]
    pub engine: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            engine: default_search_engine(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Knobs for the recommendation pipeline. The distance threshold and the
/// result budget are empirically tuned values carried over as-is; change
/// them in config, not in code.
#[derive(Debug, Deserialize, Clone)]
pub struct RecommendConfig {
    #[serde(default = "default_trigger_marker")]
    pub trigger_marker: String,
    #[serde(default = "default_result_budget")]
    pub result_budget: usize,
    /// Maximum squared-Euclidean distance at which a retrieved chunk still
    /// counts as relevant (~0.4 cosine similarity for normalized vectors).
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: f32,
    #[serde(default = "default_retrieve_k")]
    pub retrieve_k: usize,
    /// How many recent messages feed the intent extractor.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            trigger_marker: default_trigger_marker(),
            result_budget: default_result_budget(),
            distance_threshold: default_distance_threshold(),
            retrieve_k: default_retrieve_k(),
            history_window: default_history_window(),
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-large".to_string()
}
fn default_llm_model() -> String {
    "gpt-4o".to_string()
}
fn default_search_engine() -> String {
    "google".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_llm_timeout_secs() -> u64 {
    60
}
fn default_trigger_marker() -> String {
    "@recme".to_string()
}
fn default_result_budget() -> usize {
    5
}
fn default_distance_threshold() -> f32 {
    1.2
}
fn default_retrieve_k() -> usize {
    8
}
fn default_history_window() -> usize {
    20
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.recommend.result_budget == 0 {
        anyhow::bail!("recommend.result_budget must be >= 1");
    }

    if config.recommend.distance_threshold <= 0.0 {
        anyhow::bail!("recommend.distance_threshold must be > 0");
    }

    if config.recommend.retrieve_k == 0 {
        anyhow::bail!("recommend.retrieve_k must be >= 1");
    }

    if config.recommend.trigger_marker.trim().is_empty() {
        anyhow::bail!("recommend.trigger_marker must not be empty");
    }

    if config.recommend.history_window == 0 {
        anyhow::bail!("recommend.history_window must be >= 1");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_minimal_config_defaults() {
        let f = write_config(
            r#"
[db]
path = "./data/recme.sqlite"

[server]
bind = "127.0.0.1:8000"
"#,
        );
        let config = load_config(f.path()).unwrap();
        assert_eq!(config.db.max_connections, 5);
        assert_eq!(config.recommend.trigger_marker, "@recme");
        assert_eq!(config.recommend.result_budget, 5);
        assert!((config.recommend.distance_threshold - 1.2).abs() < 1e-6);
        assert_eq!(config.llm.model, "gpt-4o");
    }

    #[test]
    fn test_zero_budget_rejected() {
        let f = write_config(
            r#"
[db]
path = "./data/recme.sqlite"

[server]
bind = "127.0.0.1:8000"

[recommend]
result_budget = 0
"#,
        );
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn test_blank_marker_rejected() {
        let f = write_config(
            r#"
[db]
path = "./data/recme.sqlite"

[server]
bind = "127.0.0.1:8000"

[recommend]
trigger_marker = "  "
"#,
        );
        assert!(load_config(f.path()).is_err());
    }
}
