use crate::{
    app::Library,
    config::{Config, EmbeddingProvider},
    semantic::{Embedder, LanguageModel, RemoteEmbedder, RemoteLanguageModel},
    store::BackendCsv,
};
use anyhow::{Context, Result};
use homedir::my_home;
use std::{path::PathBuf, sync::Arc};

pub struct AppPaths {
    pub base_path: PathBuf,
}

impl AppPaths {
    /// `SHELF_BASE_PATH`, or `~/.local/share/shelf`. The directory is created.
    pub fn from_env() -> Result<Self> {
        let base_path = match std::env::var("SHELF_BASE_PATH") {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => {
                let home = my_home()
                    .context("could not determine home directory")?
                    .context("home directory path is empty")?;
                home.join(".local/share/shelf")
            }
        };

        std::fs::create_dir_all(&base_path)
            .with_context(|| format!("failed to create {}", base_path.display()))?;

        Ok(AppPaths { base_path })
    }
}

/// Builds the long-lived components from configuration.
pub struct AppFactory;

impl AppFactory {
    pub fn create_config(paths: &AppPaths) -> Result<Config> {
        Config::load_with(&paths.base_path)
    }

    pub fn create_embedder(config: &Config, paths: &AppPaths) -> Result<Arc<dyn Embedder>> {
        match config.embedding.provider {
            EmbeddingProvider::Remote => Ok(Arc::new(
                RemoteEmbedder::new(&config.embedding)
                    .context("failed to build embedding client")?,
            )),
            #[cfg(feature = "local-embeddings")]
            EmbeddingProvider::Local => Ok(Arc::new(
                crate::semantic::LocalEmbedder::new(
                    &config.embedding.local_model,
                    paths.base_path.clone(),
                )
                .context("failed to load local embedding model")?,
            )),
            #[cfg(not(feature = "local-embeddings"))]
            EmbeddingProvider::Local => {
                let _ = paths;
                anyhow::bail!(
                    "embedding.provider is 'local' but shelf was built without local-embeddings"
                )
            }
        }
    }

    pub fn create_model(config: &Config) -> Result<Option<Arc<dyn LanguageModel>>> {
        if !config.intent.enabled {
            log::info!("query analysis disabled, using basic keyword analysis");
            return Ok(None);
        }

        let model = RemoteLanguageModel::new(&config.intent)
            .context("failed to build intent model client")?;
        Ok(Some(Arc::new(model)))
    }

    pub fn create_library(paths: &AppPaths, config: Config) -> Result<Library> {
        let embedder = Self::create_embedder(&config, paths)?;
        let model = Self::create_model(&config)?;

        let store = BackendCsv::load(&paths.base_path, embedder.model_name())
            .with_context(|| format!("failed to load data from {}", paths.base_path.display()))?;

        Ok(Library::new(config, Arc::new(store), embedder, model))
    }
}
