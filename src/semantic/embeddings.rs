//! Text embedding providers.
//!
//! - `RemoteEmbedder`: OpenAI-compatible `/embeddings` endpoint
//! - `LocalEmbedder`: fastembed model running on the blocking pool
//!
//! Both reject blank input before doing any work.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::EmbeddingConfig;

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Cannot embed empty text")]
    EmptyInput,

    #[error("Embedding request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Embedding endpoint returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Malformed embedding response: {0}")]
    Malformed(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    Dimensions { expected: usize, got: usize },

    #[error("Embedding timed out after {0} seconds")]
    Timeout(u64),

    #[error("Model initialization failed: {0}")]
    InitFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),
}

/// Converts text into a fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Identifies the model; persisted vectors from another model are dropped.
    fn model_name(&self) -> &str;
}

/// Run `embed` bounded by `timeout`.
pub async fn embed_with_timeout(
    embedder: &dyn Embedder,
    text: &str,
    timeout: Duration,
) -> Result<Vec<f32>, EmbeddingError> {
    match tokio::time::timeout(timeout, embedder.embed(text)).await {
        Ok(result) => result,
        Err(_) => Err(EmbeddingError::Timeout(timeout.as_secs())),
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
    encoding_format: &'static str,
    /// Output vector length, honoured by text-embedding-3 models
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorDetail {
    pub message: String,
}

/// Hosted embedding model speaking the OpenAI embeddings protocol.
pub struct RemoteEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    dimensions: usize,
}

impl RemoteEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        if api_key.is_none() {
            log::warn!(
                "{} is not set; embedding requests are sent without credentials",
                config.api_key_env
            );
        }

        log::info!(
            "remote embeddings: url={} model={} dimensions={}",
            config.base_url,
            config.model,
            config.dimensions
        );

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            dimensions: config.dimensions,
        })
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let mut req = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&EmbeddingRequest {
                model: &self.model,
                input: [text],
                encoding_format: "float",
                dimensions: self.dimensions,
            });
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp
                .json::<ApiErrorBody>()
                .await
                .map(|body| body.error.message)
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(EmbeddingError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let body: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| EmbeddingError::Malformed(e.to_string()))?;

        let embedding = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::Malformed("no embedding returned".to_string()))?;

        if embedding.len() != self.dimensions {
            return Err(EmbeddingError::Dimensions {
                expected: self.dimensions,
                got: embedding.len(),
            });
        }

        Ok(embedding)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbedder;

#[cfg(feature = "local-embeddings")]
mod local {
    use super::{Embedder, EmbeddingError};
    use async_trait::async_trait;
    use fastembed::{InitOptions, TextEmbedding};
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    /// fastembed's `embed()` needs `&mut self`, hence the mutex.
    pub struct LocalEmbedder {
        model: Arc<Mutex<TextEmbedding>>,
        model_name: String,
    }

    impl LocalEmbedder {
        /// Load (downloading on first use) a model into `<cache_dir>/models`.
        pub fn new(model_name: &str, cache_dir: PathBuf) -> Result<Self, EmbeddingError> {
            let model_enum = parse_model_name(model_name)?;

            let models_dir = cache_dir.join("models");
            std::fs::create_dir_all(&models_dir).map_err(|e| {
                EmbeddingError::InitFailed(format!("Failed to create models directory: {}", e))
            })?;

            let options = InitOptions::new(model_enum)
                .with_cache_dir(models_dir)
                .with_show_download_progress(true);

            let model = TextEmbedding::try_new(options)
                .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;

            log::info!("local embeddings: model={model_name}");

            Ok(Self {
                model: Arc::new(Mutex::new(model)),
                model_name: model_name.to_string(),
            })
        }
    }

    #[async_trait]
    impl Embedder for LocalEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            let text = text.trim().to_string();
            if text.is_empty() {
                return Err(EmbeddingError::EmptyInput);
            }

            let model = self.model.clone();
            tokio::task::spawn_blocking(move || {
                let mut model = model.lock().map_err(|e| {
                    EmbeddingError::EmbeddingFailed(format!("Failed to acquire model lock: {}", e))
                })?;

                model
                    .embed(vec![text], None)
                    .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))?
                    .into_iter()
                    .next()
                    .ok_or_else(|| {
                        EmbeddingError::EmbeddingFailed("No embedding returned".to_string())
                    })
            })
            .await
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))?
        }

        fn model_name(&self) -> &str {
            &self.model_name
        }
    }

    pub(super) fn parse_model_name(
        name: &str,
    ) -> Result<fastembed::EmbeddingModel, EmbeddingError> {
        match name.to_lowercase().as_str() {
            "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
            "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
            "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
            "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
            _ => Err(EmbeddingError::InitFailed(format!(
                "Unknown local model: {}. Supported models: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5",
                name
            ))),
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    struct Slow;

    #[async_trait]
    impl Embedder for Slow {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![1.0])
        }

        fn model_name(&self) -> &str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_timeout_maps_to_error() {
        let result = embed_with_timeout(&Slow, "text", Duration::from_millis(10)).await;
        assert!(matches!(result, Err(EmbeddingError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_remote_rejects_blank_text_without_request() {
        let config = EmbeddingConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        };
        let embedder = RemoteEmbedder::new(&config).unwrap();
        let result = embedder.embed("   \n").await;
        assert!(matches!(result, Err(EmbeddingError::EmptyInput)));
    }

    #[tokio::test]
    async fn test_remote_unreachable_is_an_error() {
        let config = EmbeddingConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..Default::default()
        };
        let embedder = RemoteEmbedder::new(&config).unwrap();
        assert!(embedder.embed("react").await.is_err());
    }
}
