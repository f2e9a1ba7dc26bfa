use std::sync::Arc;

use super::{intent::SearchAnalysis, tags, SearchResult};
use crate::items::{ItemKind, ItemStore, StoreError, TextMatch};

/// Substring search over title, content and site title.
pub struct KeywordSearch {
    store: Arc<dyn ItemStore>,
    limit: usize,
}

impl KeywordSearch {
    pub fn new(store: Arc<dyn ItemStore>, limit: usize) -> Self {
        Self { store, limit }
    }

    pub fn search(
        &self,
        workspace_id: Option<&str>,
        analysis: &SearchAnalysis,
    ) -> Result<Vec<SearchResult>, StoreError> {
        let Some(workspace_id) = workspace_id else {
            return Ok(vec![]);
        };

        let pattern = if analysis.search_terms.is_empty() {
            None
        } else {
            Some(analysis.search_terms.join(" "))
        };
        let kinds = content_kinds(&analysis.filters.content_types);

        let items = self.store.match_text(
            workspace_id,
            TextMatch {
                pattern: pattern.as_deref(),
                kinds: &kinds,
                limit: self.limit,
            },
        )?;

        let mut results: Vec<SearchResult> = items.into_iter().map(SearchResult::keyword).collect();
        tags::resolve(self.store.as_ref(), workspace_id, &mut results)?;

        Ok(results)
    }
}

/// Kinds named by the model; unrecognised names are ignored.
fn content_kinds(names: &[String]) -> Vec<ItemKind> {
    let mut kinds = Vec::with_capacity(2);
    for kind in names.iter().filter_map(|n| n.parse::<ItemKind>().ok()) {
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    kinds
}
