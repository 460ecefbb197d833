//! Configuration loading.
//!
//! Settings come from two places: an optional TOML file (corpus layout,
//! provider selection, retrieval and sampling parameters) and the process
//! environment (model identifier and API credentials). Both are resolved
//! exactly once in `main` and handed to the components by reference.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable holding the completion API credential.
pub const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";
/// Environment variable holding the completion model identifier.
pub const MODEL_VAR: &str = "ANTHROPIC_SEARCH_MODEL";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    #[serde(default = "default_corpus_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_ingest_batch_size")]
    pub batch_size: usize,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            name: default_corpus_name(),
            data_dir: default_data_dir(),
            batch_size: default_ingest_batch_size(),
        }
    }
}

impl CorpusConfig {
    /// Directory walked by the document loader.
    pub fn root(&self) -> PathBuf {
        self.data_dir.join(&self.name)
    }

    /// Line-delimited serialized corpus written before embedding.
    pub fn corpus_file(&self) -> PathBuf {
        self.data_dir.join(format!("{}.jsonl", self.name))
    }

    /// Persistent vector store file.
    pub fn store_file(&self) -> PathBuf {
        self.data_dir.join(format!("{}-embeddings.jsonl", self.name))
    }
}

fn default_corpus_name() -> String {
    "mud-blazor".to_string()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_ingest_batch_size() -> usize {
    128
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_url")]
    pub url: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            url: default_completion_url(),
            max_retries: default_max_retries(),
            timeout_secs: default_completion_timeout_secs(),
        }
    }
}

fn default_completion_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_completion_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_results_to_use")]
    pub n_search_results_to_use: usize,
    #[serde(default = "default_max_searches")]
    pub max_searches_to_try: usize,
    #[serde(default = "default_refine_tokens")]
    pub max_tokens_to_sample: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            n_search_results_to_use: default_results_to_use(),
            max_searches_to_try: default_max_searches(),
            max_tokens_to_sample: default_refine_tokens(),
        }
    }
}

fn default_results_to_use() -> usize {
    3
}
fn default_max_searches() -> usize {
    5
}
fn default_refine_tokens() -> usize {
    2000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_chat_tokens")]
    pub max_tokens_to_sample: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_exit_sentinel")]
    pub exit_sentinel: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_tokens_to_sample: default_chat_tokens(),
            temperature: default_temperature(),
            exit_sentinel: default_exit_sentinel(),
        }
    }
}

fn default_chat_tokens() -> usize {
    4000
}
fn default_temperature() -> f32 {
    0.8
}
fn default_exit_sentinel() -> String {
    "exit".to_string()
}

/// Credentials and model identity taken from the environment.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub model: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

impl Credentials {
    /// Read the completion credential and model id from the environment.
    ///
    /// Either variable being unset or empty is a startup error.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_key: require_env(API_KEY_VAR)?,
            model: require_env(MODEL_VAR)?,
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => bail!("{} environment variable not set", name),
    }
}

/// Load and validate the configuration file.
///
/// A missing file is not an error: every section has defaults that match the
/// stock corpus layout under `./data`.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.corpus.name.trim().is_empty() {
        bail!("corpus.name must not be empty");
    }
    if config.corpus.batch_size == 0 {
        bail!("corpus.batch_size must be > 0");
    }
    if config.retrieval.n_search_results_to_use == 0 {
        bail!("retrieval.n_search_results_to_use must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.chat.temperature) {
        bail!("chat.temperature must be in [0.0, 1.0]");
    }
    if config.chat.exit_sentinel.is_empty() {
        bail!("chat.exit_sentinel must not be empty");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }

    Ok(())
}
