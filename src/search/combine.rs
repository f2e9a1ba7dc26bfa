use std::collections::HashSet;

use super::SearchResult;

/// Merge vector and keyword results.
///
/// Vector results keep their order and come first; keyword results are
/// appended only when their item is not already present. An item found by
/// both keeps its vector entry.
pub fn combine(vector: Vec<SearchResult>, keyword: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen: HashSet<u64> = HashSet::with_capacity(vector.len() + keyword.len());
    let mut combined = Vec::with_capacity(vector.len() + keyword.len());

    for result in vector.into_iter().chain(keyword) {
        if seen.insert(result.item.id) {
            combined.push(result);
        }
    }

    combined
}
