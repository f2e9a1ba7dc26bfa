use crate::storage::{self, StorageManager};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::Path;

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Maximum number of nearest neighbours returned by vector search
const DEFAULT_VECTOR_LIMIT: usize = 20;
/// Vector results must score strictly above this cosine similarity
const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.1;
/// Maximum number of rows returned by keyword search
const DEFAULT_KEYWORD_LIMIT: usize = 50;

const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_API_KEY_ENV: &str = "SHELF_API_KEY";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 768;
const DEFAULT_LOCAL_MODEL: &str = "bge-base-en-v1.5";
const DEFAULT_INTENT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 10;

/// Tunables for the hybrid search pipeline.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SearchConfig {
    #[serde(default = "default_vector_limit")]
    pub vector_limit: usize,

    /// Similarity threshold [0.0, 1.0]
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    #[serde(default = "default_keyword_limit")]
    pub keyword_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            vector_limit: DEFAULT_VECTOR_LIMIT,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            keyword_limit: DEFAULT_KEYWORD_LIMIT,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// OpenAI-compatible `/embeddings` endpoint
    #[default]
    Remote,
    /// fastembed model running in-process
    Local,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,

    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Vector length requested from and expected of the remote model
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,

    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_model_timeout_secs")]
    pub timeout_secs: u64,

    /// Model name for the local provider (e.g., "bge-small-en-v1.5")
    #[serde(default = "default_local_model")]
    pub local_model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            base_url: default_api_base_url(),
            model: default_embedding_model(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            api_key_env: default_api_key_env(),
            timeout_secs: DEFAULT_MODEL_TIMEOUT_SECS,
            local_model: default_local_model(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct IntentConfig {
    /// When disabled every query gets the basic keyword analysis
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    #[serde(default = "default_intent_model")]
    pub model: String,

    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_model_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_api_base_url(),
            model: default_intent_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: DEFAULT_MODEL_TIMEOUT_SECS,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub intent: IntentConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            search: SearchConfig::default(),
            embedding: EmbeddingConfig::default(),
            intent: IntentConfig::default(),
        }
    }
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

fn default_vector_limit() -> usize {
    DEFAULT_VECTOR_LIMIT
}

fn default_similarity_threshold() -> f32 {
    DEFAULT_SIMILARITY_THRESHOLD
}

fn default_keyword_limit() -> usize {
    DEFAULT_KEYWORD_LIMIT
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_embedding_dimensions() -> usize {
    DEFAULT_EMBEDDING_DIMENSIONS
}

fn default_local_model() -> String {
    DEFAULT_LOCAL_MODEL.to_string()
}

fn default_intent_model() -> String {
    DEFAULT_INTENT_MODEL.to_string()
}

fn default_model_timeout_secs() -> u64 {
    DEFAULT_MODEL_TIMEOUT_SECS
}

fn default_true() -> bool {
    true
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        let search = &self.search;
        if !(0.0..=1.0).contains(&search.similarity_threshold) {
            bail!(
                "search.similarity_threshold must be between 0.0 and 1.0, got {}",
                search.similarity_threshold
            );
        }
        if search.vector_limit == 0 {
            bail!("search.vector_limit must be greater than 0");
        }
        if search.keyword_limit == 0 {
            bail!("search.keyword_limit must be greater than 0");
        }

        if self.embedding.timeout_secs == 0 {
            bail!("embedding.timeout_secs must be greater than 0");
        }
        if self.embedding.provider == EmbeddingProvider::Remote && self.embedding.dimensions == 0 {
            bail!("embedding.dimensions must be greater than 0");
        }
        if self.intent.timeout_secs == 0 {
            bail!("intent.timeout_secs must be greater than 0");
        }

        self.listen_addr
            .parse::<std::net::SocketAddr>()
            .with_context(|| format!("listen_addr is not a socket address: {}", self.listen_addr))?;

        Ok(())
    }

    /// Load `config.yaml` from `base_path`, creating it with defaults when missing.
    pub fn load_with(base_path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let store = storage::BackendLocal::new(base_path)?;

        if !store.exists(CONFIG_FILE) {
            let path = store.path(CONFIG_FILE);
            log::info!("writing default config to {}", path.display());
            let yaml = serde_yml::to_string(&Self::default())?;
            store.write(CONFIG_FILE, yaml.as_bytes())?;
        }

        let config_str =
            String::from_utf8(store.read(CONFIG_FILE)?).context("config file is not valid utf8")?;
        let config: Self = serde_yml::from_str(&config_str).context("config is malformed")?;

        config.validate()?;

        // resave in case config version needs an upgrade
        let current = serde_yml::to_string(&config)?;
        if config_str != current {
            store.write(CONFIG_FILE, current.as_bytes())?;
        }

        Ok(config)
    }
}
