use super::{intent::SearchAnalysis, SearchCounts, SearchResult, SearchType};
use crate::items::ItemKind;

/// Mean similarity above which the summary mentions highly relevant items.
const HIGH_RELEVANCE: f32 = 0.7;
/// Analyses at or below this confidence do not mention the detected intent.
const CONFIDENT: f32 = 0.7;

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// Human-readable description of a search outcome.
pub fn summarize(
    query: &str,
    results: &[SearchResult],
    analysis: &SearchAnalysis,
    counts: &SearchCounts,
) -> String {
    if counts.combined_count == 0 || results.is_empty() {
        return format!("No items found for \"{query}\". Try different keywords or tags.");
    }

    let bookmarks = results
        .iter()
        .filter(|r| r.item.kind == ItemKind::Bookmark)
        .count();
    let notes = results.len() - bookmarks;
    let breakdown = match (bookmarks, notes) {
        (b, 0) => plural(b, "bookmark"),
        (0, n) => plural(n, "note"),
        (b, n) => format!("{}, {}", plural(b, "bookmark"), plural(n, "note")),
    };

    let mut lines = vec![format!(
        "{} found for \"{query}\" ({breakdown}).",
        plural(counts.combined_count, "item")
    )];

    let similarities: Vec<f32> = results
        .iter()
        .filter(|r| r.search_type == SearchType::Vector)
        .filter_map(|r| r.similarity)
        .filter(|s| s.is_finite() && *s > 0.0)
        .collect();

    if !similarities.is_empty() {
        let best = similarities.iter().copied().fold(f32::MIN, f32::max);
        lines.push(format!("Best match is {:.0}% similar.", best * 100.0));

        let mean = similarities.iter().sum::<f32>() / similarities.len() as f32;
        if mean > HIGH_RELEVANCE {
            lines.push("Found highly relevant items.".to_string());
        }
    }

    if analysis.confidence() > CONFIDENT {
        lines.push(format!("Detected intent: {}.", analysis.intent));
    }

    if let Some(tip) = analysis.suggestions.first() {
        lines.push(format!("Tip: {tip}"));
    }

    lines.join("\n")
}
