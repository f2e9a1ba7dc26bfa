use std::{sync::Arc, time::Duration};

use super::{tags, SearchResult};
use crate::{
    items::{ItemStore, StoreError},
    semantic::{embed_with_timeout, Embedder},
};

/// Nearest-neighbour search over item embeddings of one workspace.
pub struct VectorSearch {
    store: Arc<dyn ItemStore>,
    embedder: Arc<dyn Embedder>,
    limit: usize,
    threshold: f32,
    timeout: Duration,
}

impl VectorSearch {
    pub fn new(
        store: Arc<dyn ItemStore>,
        embedder: Arc<dyn Embedder>,
        limit: usize,
        threshold: f32,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            embedder,
            limit,
            threshold,
            timeout,
        }
    }

    /// Results come back in the store's similarity order and are not re-sorted.
    /// Without a workspace, or when the query cannot be embedded, nothing is found.
    pub async fn search(
        &self,
        workspace_id: Option<&str>,
        query: &str,
    ) -> Result<Vec<SearchResult>, StoreError> {
        let Some(workspace_id) = workspace_id else {
            return Ok(vec![]);
        };

        let embedding = match embed_with_timeout(self.embedder.as_ref(), query, self.timeout).await
        {
            Ok(embedding) => embedding,
            Err(err) => {
                log::warn!("vector search skipped for {query:?}: {err}");
                return Ok(vec![]);
            }
        };

        let hits = match self
            .store
            .nearest(workspace_id, &embedding, self.threshold, self.limit)
        {
            Ok(hits) => hits,
            // a query vector the index cannot compare against is a model problem, not a store one
            Err(StoreError::Index(err)) => {
                log::warn!("vector search skipped for {query:?}: {err}");
                return Ok(vec![]);
            }
            Err(err) => return Err(err),
        };

        let mut results: Vec<SearchResult> = hits
            .into_iter()
            .map(|(item, score)| SearchResult::vector(item, score))
            .collect();
        tags::resolve(self.store.as_ref(), workspace_id, &mut results)?;

        Ok(results)
    }
}
