//! Hybrid search over a workspace.
//!
//! A query is analyzed by the language model while the vector search runs;
//! the keyword search starts once the analysis is ready. Both result sets
//! are merged with vector results taking precedence and then summarized.

pub mod combine;
pub mod intent;
pub mod keyword;
pub mod summary;
pub mod tags;
pub mod vector;

use serde::Serialize;
use std::{sync::Arc, time::Duration};

use crate::{
    config::{Config, SearchConfig},
    items::{Item, ItemStore, StoreError, TagRef},
    semantic::{Embedder, LanguageModel},
};
pub use intent::{QueryAnalyzer, SearchAnalysis};
pub use keyword::KeywordSearch;
pub use vector::VectorSearch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    Vector,
    Keyword,
}

/// An item decorated with where it was found and its resolved labels.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(flatten)]
    pub item: Item,
    pub search_type: SearchType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
    pub tags: Vec<TagRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_slug: Option<String>,
}

impl SearchResult {
    pub fn vector(item: Item, similarity: f32) -> Self {
        Self {
            item,
            search_type: SearchType::Vector,
            similarity: Some(similarity),
            tags: vec![],
            category_name: None,
            category_slug: None,
        }
    }

    pub fn keyword(item: Item) -> Self {
        Self {
            item,
            search_type: SearchType::Keyword,
            similarity: None,
            tags: vec![],
            category_name: None,
            category_slug: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCounts {
    pub vector_count: usize,
    pub keyword_count: usize,
    pub combined_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    pub analysis: SearchAnalysis,
    pub message: String,
    pub counts: SearchCounts,
}

pub struct HybridSearch {
    analyzer: QueryAnalyzer,
    vector: VectorSearch,
    keyword: KeywordSearch,
}

impl HybridSearch {
    pub fn new(analyzer: QueryAnalyzer, vector: VectorSearch, keyword: KeywordSearch) -> Self {
        Self {
            analyzer,
            vector,
            keyword,
        }
    }

    /// Wire the pipeline from configuration. `model` is `None` when intent
    /// analysis is disabled.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn ItemStore>,
        embedder: Arc<dyn Embedder>,
        model: Option<Arc<dyn LanguageModel>>,
    ) -> Self {
        let SearchConfig {
            vector_limit,
            similarity_threshold,
            keyword_limit,
        } = config.search;

        Self::new(
            QueryAnalyzer::new(
                store.clone(),
                model,
                Duration::from_secs(config.intent.timeout_secs),
            ),
            VectorSearch::new(
                store.clone(),
                embedder,
                vector_limit,
                similarity_threshold,
                Duration::from_secs(config.embedding.timeout_secs),
            ),
            KeywordSearch::new(store, keyword_limit),
        )
    }

    /// Run a query. Errors are datastore failures only; model failures
    /// degrade to fewer results.
    pub async fn search(
        &self,
        query: &str,
        workspace_id: Option<&str>,
    ) -> Result<SearchOutcome, StoreError> {
        let analyzed_keyword = async {
            let analysis = self.analyzer.analyze(query, workspace_id).await?;
            let results = self.keyword.search(workspace_id, &analysis)?;
            Ok::<_, StoreError>((analysis, results))
        };

        let (keyword, vector) = tokio::join!(
            analyzed_keyword,
            self.vector.search(workspace_id, query)
        );
        let (analysis, keyword) = keyword?;
        let vector = vector?;

        let vector_count = vector.len();
        let keyword_count = keyword.len();
        let results = combine::combine(vector, keyword);
        let counts = SearchCounts {
            vector_count,
            keyword_count,
            combined_count: results.len(),
        };

        log::info!(
            "search {query:?} in {}: {} vector, {} keyword, {} combined",
            workspace_id.unwrap_or("-"),
            counts.vector_count,
            counts.keyword_count,
            counts.combined_count
        );

        let message = summary::summarize(query, &results, &analysis, &counts);

        Ok(SearchOutcome {
            results,
            analysis,
            message,
            counts,
        })
    }
}
