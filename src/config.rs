use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub data: DataConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    /// Root directory for all durable state.
    pub dir: PathBuf,
    /// Metadata database path. Defaults to `<dir>/metadata.db`.
    #[serde(default)]
    pub db: Option<PathBuf>,
    /// Vector index path. Defaults to `<dir>/kb.index` (the metadata
    /// companion lives next to it as `<path>.meta.json`).
    #[serde(default)]
    pub index: Option<PathBuf>,
    /// Reference corpus folder. Defaults to `<dir>/kb`.
    #[serde(default)]
    pub kb: Option<PathBuf>,
}

impl DataConfig {
    pub fn db_path(&self) -> PathBuf {
        self.db.clone().unwrap_or_else(|| self.dir.join("metadata.db"))
    }

    pub fn index_path(&self) -> PathBuf {
        self.index.clone().unwrap_or_else(|| self.dir.join("kb.index"))
    }

    pub fn kb_dir(&self) -> PathBuf {
        self.kb.clone().unwrap_or_else(|| self.dir.join("kb"))
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.dir.join("uploads")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    1200
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierConfig {
    /// Distinct legal keywords required before a document counts as
    /// legal/government material.
    #[serde(default = "default_min_keyword_hits")]
    pub min_keyword_hits: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_keyword_hits: default_min_keyword_hits(),
        }
    }
}

fn default_min_keyword_hits() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Distance ceiling for knowledge-base hits: entries whose squared L2
    /// distance to the query is at or above this value are dropped.
    #[serde(default = "default_max_distance")]
    pub max_distance: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_distance: default_max_distance(),
        }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_max_distance() -> f32 {
    1.0
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    /// Effective vector dimensionality. All-MiniLM-L6-v2, the default
    /// local model, produces 384-wide vectors.
    pub fn dims(&self) -> usize {
        self.dims.unwrap_or(384)
    }
}

fn default_embedding_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    /// Total generation attempts; only rate-limit failures are retried.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    /// API base URL override (mainly for tests).
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: default_generation_model(),
            max_attempts: default_max_attempts(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_generation_timeout_secs(),
            url: None,
        }
    }
}

fn default_generation_provider() -> String {
    "gemini".to_string()
}
fn default_generation_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_max_attempts() -> u32 {
    3
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_output_tokens() -> u32 {
    1200
}
fn default_generation_timeout_secs() -> u64 {
    60
}

impl Config {
    /// A config rooted at `dir` with every section at its defaults.
    /// Used by tests and by commands that can run without a config file.
    pub fn with_data_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            data: DataConfig {
                dir: dir.into(),
                db: None,
                index: None,
                kb: None,
            },
            chunking: ChunkingConfig::default(),
            classifier: ClassifierConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if config.retrieval.max_distance <= 0.0 {
        anyhow::bail!("retrieval.max_distance must be > 0");
    }

    if config.classifier.min_keyword_hits == 0 {
        anyhow::bail!("classifier.min_keyword_hits must be >= 1");
    }

    if config.embedding.dims() == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or local.",
            other
        ),
    }

    match config.generation.provider.as_str() {
        "disabled" | "gemini" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be disabled or gemini.",
            other
        ),
    }

    Ok(config)
}
