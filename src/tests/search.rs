use std::{
    collections::HashSet,
    sync::{atomic::Ordering, Arc},
};

use super::support::*;
use crate::{
    eid::Eid,
    items::{ItemCreate, ItemKind, ItemStatus, ItemStore},
    search::{SearchAnalysis, SearchType},
};

#[tokio::test]
async fn test_react_scenario() {
    let fx = fixture();
    let (hooks, learning, groceries) = seed_react(fx.store.as_ref());
    let model = Arc::new(ScriptedModel::new(analysis_reply(&["React"], &[], 0.9)));
    let library = library(fx.store.clone(), Arc::new(StubEmbedder::new()), Some(model));

    let outcome = library.search("React", Some("ws1")).await.unwrap();

    assert_eq!(outcome.counts.vector_count, 2);
    assert_eq!(outcome.counts.keyword_count, 2);
    assert_eq!(outcome.counts.combined_count, 2);

    let ids: Vec<u64> = outcome.results.iter().map(|r| r.item.id).collect();
    assert_eq!(ids, vec![hooks.id, learning.id]);
    assert!(!ids.contains(&groceries.id));
    assert!(outcome
        .results
        .iter()
        .all(|r| r.search_type == SearchType::Vector && r.similarity.unwrap() > 0.1));

    assert!(outcome
        .message
        .starts_with("2 items found for \"React\" (2 bookmarks)."));
    assert!(outcome.message.contains("Detected intent: find React resources."));
    assert!(outcome.message.contains("Tip: Add a tag"));
}

#[tokio::test]
async fn test_prompt_carries_workspace_vocabulary() {
    let fx = fixture();
    seed_react(fx.store.as_ref());
    let model = Arc::new(ScriptedModel::new(analysis_reply(&["React"], &[], 0.9)));
    let library = library(
        fx.store.clone(),
        Arc::new(StubEmbedder::new()),
        Some(model.clone()),
    );

    library.search("React", Some("ws1")).await.unwrap();

    let prompt = model.last_prompt.lock().unwrap().clone().unwrap();
    assert!(prompt.contains("Existing tags: frontend, react"));
    assert!(prompt.contains("Existing categories: Development"));
    assert!(prompt.contains("React"));
}

#[tokio::test]
async fn test_failing_analyzer_degrades_to_basic_search() {
    let fx = fixture();
    seed_react(fx.store.as_ref());
    let library = library(
        fx.store.clone(),
        Arc::new(StubEmbedder::new()),
        Some(Arc::new(FailingModel)),
    );

    let outcome = library.search("React", Some("ws1")).await.unwrap();

    assert_eq!(outcome.analysis, SearchAnalysis::basic("React"));
    assert_eq!(outcome.counts.keyword_count, 2);
    assert_eq!(outcome.results.len(), 2);
    assert!(!outcome.message.contains("Detected intent"));
}

#[tokio::test]
async fn test_slow_analyzer_times_out_to_basic_search() {
    let fx = fixture();
    seed_react(fx.store.as_ref());
    let library = library(
        fx.store.clone(),
        Arc::new(StubEmbedder::new()),
        Some(Arc::new(SlowModel)),
    );

    let outcome = library.search("learning", Some("ws1")).await.unwrap();

    assert_eq!(outcome.analysis.intent, "basic search");
    assert_eq!(outcome.analysis.search_terms, vec!["learning"]);
    assert_eq!(outcome.counts.keyword_count, 1);
}

#[tokio::test]
async fn test_schema_violation_degrades_to_basic_search() {
    let fx = fixture();
    seed_react(fx.store.as_ref());
    let model = Arc::new(ScriptedModel::new(serde_json::json!({"intent": "x"})));
    let library = library(fx.store.clone(), Arc::new(StubEmbedder::new()), Some(model));

    let outcome = library.search("React", Some("ws1")).await.unwrap();
    assert_eq!(outcome.analysis, SearchAnalysis::basic("React"));
}

#[tokio::test]
async fn test_embedding_failure_leaves_keyword_results() {
    let fx = fixture();
    seed_react(fx.store.as_ref());
    let library = library(fx.store.clone(), Arc::new(FailingEmbedder), None);

    let outcome = library.search("React", Some("ws1")).await.unwrap();

    assert_eq!(outcome.counts.vector_count, 0);
    assert_eq!(outcome.counts.keyword_count, 2);
    assert!(outcome
        .results
        .iter()
        .all(|r| r.search_type == SearchType::Keyword && r.similarity.is_none()));
    assert!(!outcome.message.contains("Best match"));
}

#[tokio::test]
async fn test_trashed_items_never_returned() {
    let fx = fixture();
    let (hooks, learning, _) = seed_react(fx.store.as_ref());
    let library = library(fx.store.clone(), Arc::new(StubEmbedder::new()), None);

    library.trash_item(hooks.id).unwrap();

    let outcome = library.search("React", Some("ws1")).await.unwrap();
    let ids: Vec<u64> = outcome.results.iter().map(|r| r.item.id).collect();
    assert_eq!(ids, vec![learning.id]);
    assert_eq!(outcome.counts.vector_count, 1);
    assert_eq!(outcome.counts.keyword_count, 1);
}

#[tokio::test]
async fn test_empty_query_without_workspace() {
    let embedder = Arc::new(StubEmbedder::new());
    let fx = fixture();
    seed_react(fx.store.as_ref());
    let library = library(fx.store.clone(), embedder.clone(), None);

    let outcome = library.search("", None).await.unwrap();

    assert!(outcome.results.is_empty());
    assert_eq!(outcome.counts.combined_count, 0);
    assert_eq!(
        outcome.message,
        "No items found for \"\". Try different keywords or tags."
    );
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_other_workspaces_are_invisible() {
    let fx = fixture();
    seed_react(fx.store.as_ref());
    insert(
        fx.store.as_ref(),
        "ws2",
        ItemKind::Bookmark,
        "React at work",
        None,
        &[],
        Some(&REACT[..]),
    );
    let library = library(fx.store.clone(), Arc::new(StubEmbedder::new()), None);

    let outcome = library.search("React", Some("ws2")).await.unwrap();
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].item.title, "React at work");

    let outcome = library.search("React", Some("nope")).await.unwrap();
    assert!(outcome.results.is_empty());
}

#[tokio::test]
async fn test_vector_entry_wins_and_keyword_fills_gaps() {
    let fx = fixture();
    let (hooks, learning, _) = seed_react(fx.store.as_ref());
    // text matches "react" but its embedding points elsewhere
    let native = insert(
        fx.store.as_ref(),
        "ws1",
        ItemKind::Note,
        "React Native setup",
        Some("simulator steps"),
        &[],
        Some(&GROCERIES[..]),
    );
    let model = Arc::new(ScriptedModel::new(analysis_reply(&["react"], &[], 0.9)));
    let library = library(fx.store.clone(), Arc::new(StubEmbedder::new()), Some(model));

    let outcome = library.search("React", Some("ws1")).await.unwrap();

    assert_eq!(outcome.counts.vector_count, 2);
    assert_eq!(outcome.counts.keyword_count, 3);
    assert_eq!(outcome.counts.combined_count, 3);

    let ids: Vec<u64> = outcome.results.iter().map(|r| r.item.id).collect();
    assert_eq!(ids, vec![hooks.id, learning.id, native.id]);
    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), ids.len());

    assert_eq!(outcome.results[0].search_type, SearchType::Vector);
    assert!(outcome.results[0].similarity.is_some());
    assert_eq!(outcome.results[2].search_type, SearchType::Keyword);
    assert!(outcome.results[2].similarity.is_none());
    assert!(outcome.message.contains("(2 bookmarks, 1 note)"));
}

#[tokio::test]
async fn test_content_type_filter_restricts_keyword_results() {
    let fx = fixture();
    seed_react(fx.store.as_ref());
    insert(
        fx.store.as_ref(),
        "ws1",
        ItemKind::Note,
        "React notes",
        None,
        &[],
        None,
    );
    let model = Arc::new(ScriptedModel::new(analysis_reply(&["react"], &["notes"], 0.9)));
    let library = library(fx.store.clone(), Arc::new(FailingEmbedder), Some(model));

    let outcome = library.search("my react notes", Some("ws1")).await.unwrap();
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].item.kind, ItemKind::Note);
}

#[tokio::test]
async fn test_tags_round_trip_through_both_executors() {
    let fx = fixture();
    let library = library(fx.store.clone(), Arc::new(StubEmbedder::new()), None);

    let item = library
        .add_item(ItemCreate {
            workspace_id: Eid::from("ws1"),
            category_id: Some(Eid::from("cat-dev")),
            title: "React server components".to_string(),
            url: Some("https://www.react.dev/reference".to_string()),
            tags: ["react", "frontend", "rsc", "React", "frontend"]
                .iter()
                .map(|t| t.to_string())
                .collect(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(item.site.site_name.as_deref(), Some("react.dev"));

    let expected: HashSet<&str> = ["react", "frontend", "rsc"].into_iter().collect();

    let outcome = library.search("React", Some("ws1")).await.unwrap();
    assert_eq!(outcome.results.len(), 1);
    let result = &outcome.results[0];
    assert_eq!(result.search_type, SearchType::Vector);
    assert_eq!(result.tags.len(), 3);
    assert_eq!(
        result.tags.iter().map(|t| t.name.as_str()).collect::<HashSet<_>>(),
        expected
    );
    assert_eq!(result.category_name.as_deref(), Some("Development"));
    assert_eq!(result.category_slug.as_deref(), Some("development"));

    let keyword_only = super::support::library(fx.store.clone(), Arc::new(FailingEmbedder), None);
    let outcome = keyword_only.search("server components", Some("ws1")).await.unwrap();
    assert_eq!(outcome.results[0].search_type, SearchType::Keyword);
    assert_eq!(
        outcome.results[0]
            .tags
            .iter()
            .map(|t| t.name.as_str())
            .collect::<HashSet<_>>(),
        expected
    );
}

#[tokio::test]
async fn test_add_item_survives_embedding_failure() {
    let fx = fixture();
    let library = library(fx.store.clone(), Arc::new(FailingEmbedder), None);

    let item = library
        .add_item(ItemCreate {
            workspace_id: Eid::from("ws1"),
            title: "  ".to_string(),
            url: Some("https://example.com/react".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(item.title, "https://example.com/react");
    assert_eq!(item.kind, ItemKind::Bookmark);
    assert!(fx.store.nearest("ws1", &REACT, 0.0, 10).unwrap().is_empty());

    let outcome = library.search("example.com", Some("ws1")).await.unwrap();
    assert_eq!(outcome.results.len(), 1);
}

#[tokio::test]
async fn test_add_item_validation() {
    let fx = fixture();
    let library = library(fx.store.clone(), Arc::new(StubEmbedder::new()), None);

    let result = library
        .add_item(ItemCreate {
            workspace_id: Eid::from("ws1"),
            ..Default::default()
        })
        .await;
    assert!(matches!(result, Err(crate::app::AppError::Invalid(_))));

    let result = library
        .add_item(ItemCreate {
            workspace_id: Eid::from("missing"),
            title: "note".to_string(),
            ..Default::default()
        })
        .await;
    assert!(matches!(result, Err(crate::app::AppError::Store(_))));
}

#[tokio::test]
async fn test_tag_counts_follow_trash() {
    let fx = fixture();
    let (hooks, _, _) = seed_react(fx.store.as_ref());
    let library = library(fx.store.clone(), Arc::new(StubEmbedder::new()), None);

    let counts = library.tags("ws1").unwrap();
    assert_eq!(counts[0].name, "frontend");
    assert_eq!(counts[0].count, 2);

    library.trash_item(hooks.id).unwrap();
    let counts = library.tags("ws1").unwrap();
    assert_eq!(counts[0].count, 1);
    assert_eq!(
        counts.iter().find(|c| c.name == "react").map(|c| c.count),
        Some(0)
    );
    assert_eq!(
        fx.store.set_status(hooks.id, ItemStatus::Active).unwrap().status,
        ItemStatus::Active
    );
}
