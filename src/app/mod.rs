pub mod errors;
pub mod factory;

pub use errors::AppError;
pub use factory::{AppFactory, AppPaths};

use std::{sync::Arc, time::Duration};

use crate::{
    config::Config,
    items::{Item, ItemCreate, ItemEmbedding, ItemStatus, ItemStore, TagCount},
    search::{HybridSearch, SearchOutcome},
    semantic::{content_hash, embed_with_timeout, embedding_text, Embedder, LanguageModel},
};

/// The item collection together with its search pipeline.
pub struct Library {
    store: Arc<dyn ItemStore>,
    embedder: Arc<dyn Embedder>,
    search: HybridSearch,
    embed_timeout: Duration,
}

impl Library {
    pub fn new(
        config: Config,
        store: Arc<dyn ItemStore>,
        embedder: Arc<dyn Embedder>,
        model: Option<Arc<dyn LanguageModel>>,
    ) -> Self {
        let search = HybridSearch::from_config(&config, store.clone(), embedder.clone(), model);

        Self {
            store,
            embedder,
            search,
            embed_timeout: Duration::from_secs(config.embedding.timeout_secs),
        }
    }

    pub async fn search(
        &self,
        query: &str,
        workspace_id: Option<&str>,
    ) -> Result<SearchOutcome, AppError> {
        Ok(self.search.search(query, workspace_id).await?)
    }

    /// Store a new item, embedding it when possible.
    ///
    /// Embedding failures are logged and the item is stored without one.
    pub async fn add_item(&self, mut create: ItemCreate) -> Result<Item, AppError> {
        create.title = create.title.trim().to_string();
        create.url = create
            .url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        if create.title.is_empty() {
            match &create.url {
                Some(url) => create.title = url.clone(),
                None => return Err(AppError::Invalid("an item needs a title or a url".into())),
            }
        }

        if let Some(url) = &create.url {
            let parsed = url::Url::parse(url)
                .map_err(|e| AppError::Invalid(format!("invalid url {url:?}: {e}")))?;
            if create.site.site_name.is_none() {
                create.site.site_name = parsed
                    .host_str()
                    .map(|host| host.trim_start_matches("www.").to_string());
            }
        }

        let embedding = match embedding_text(&[
            Some(create.title.as_str()),
            create.content.as_deref(),
            create.site.description.as_deref(),
        ]) {
            Some(text) => {
                match embed_with_timeout(self.embedder.as_ref(), &text, self.embed_timeout).await {
                    Ok(vector) => Some(ItemEmbedding {
                        content_hash: content_hash(&text),
                        vector,
                    }),
                    Err(err) => {
                        log::warn!("storing {:?} without embedding: {err}", create.title);
                        None
                    }
                }
            }
            None => None,
        };

        let item = self.store.create(create, embedding)?;
        log::info!(
            "added {} {} to workspace {}",
            item.kind,
            item.id,
            item.workspace_id
        );

        Ok(item)
    }

    pub fn trash_item(&self, id: u64) -> Result<Item, AppError> {
        let item = self.store.set_status(id, ItemStatus::Trashed)?;
        log::info!("trashed item {id}");
        Ok(item)
    }

    /// Tags of a workspace with their active-item counts.
    pub fn tags(&self, workspace_id: &str) -> Result<Vec<TagCount>, AppError> {
        Ok(self.store.tag_counts(workspace_id)?)
    }
}
