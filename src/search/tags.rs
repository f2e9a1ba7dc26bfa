use std::collections::HashMap;

use super::SearchResult;
use crate::items::{ItemStore, StoreError, TagRef};

/// Attach tags and category name/slug to every result.
///
/// Tag links for all results are fetched in one lookup and grouped by item
/// id, so the cost is linear in results plus links.
pub fn resolve(
    store: &dyn ItemStore,
    workspace_id: &str,
    results: &mut [SearchResult],
) -> Result<(), StoreError> {
    if results.is_empty() {
        return Ok(());
    }

    let ids: Vec<u64> = results.iter().map(|r| r.item.id).collect();
    let mut by_item: HashMap<u64, Vec<TagRef>> = HashMap::with_capacity(ids.len());
    for link in store.tag_links(&ids)? {
        by_item.entry(link.item_id).or_default().push(link.tag);
    }

    let categories = store.categories(workspace_id)?;

    for result in results.iter_mut() {
        result.tags = by_item.remove(&result.item.id).unwrap_or_default();

        if let Some(category) = result
            .item
            .category_id
            .as_ref()
            .and_then(|id| categories.iter().find(|c| &c.id == id))
        {
            result.category_name = Some(category.name.clone());
            result.category_slug = Some(category.slug.clone());
        }
    }

    Ok(())
}
