use async_trait::async_trait;
use serde_json::{json, Value};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use crate::{
    app::Library,
    config::Config,
    eid::Eid,
    items::{
        Category, Item, ItemCreate, ItemEmbedding, ItemKind, ItemStatus, ItemStore, StoreError,
        TagCount, TagLink, TextMatch,
    },
    semantic::{Embedder, EmbeddingError, LanguageModel, ModelError},
    store::BackendCsv,
};

pub const WORKSPACES: &str = r#"
- id: ws1
  name: Personal
  categories:
    - id: cat-dev
      name: Development
      slug: development
      position: 0
- id: ws2
  name: Work
"#;

pub const REACT: [f32; 3] = [1.0, 0.0, 0.0];
pub const GROCERIES: [f32; 3] = [0.0, 0.0, 1.0];

/// Embeds anything mentioning react close to [`REACT`], everything else on [`GROCERIES`].
pub struct StubEmbedder {
    pub calls: AtomicUsize,
}

impl StubEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        if text.to_lowercase().contains("react") {
            Ok(REACT.to_vec())
        } else {
            Ok(GROCERIES.to_vec())
        }
    }

    fn model_name(&self) -> &str {
        "stub"
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Upstream {
            status: 429,
            message: "quota exceeded".to_string(),
        })
    }

    fn model_name(&self) -> &str {
        "stub"
    }
}

/// Answers every prompt with a fixed object and remembers the last prompt.
pub struct ScriptedModel {
    reply: Value,
    pub last_prompt: std::sync::Mutex<Option<String>>,
}

impl ScriptedModel {
    pub fn new(reply: Value) -> Self {
        Self {
            reply,
            last_prompt: Default::default(),
        }
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate_object(&self, prompt: &str, _schema: &Value) -> Result<Value, ModelError> {
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        Ok(self.reply.clone())
    }
}

pub struct FailingModel;

#[async_trait]
impl LanguageModel for FailingModel {
    async fn generate_object(&self, _prompt: &str, _schema: &Value) -> Result<Value, ModelError> {
        Err(ModelError::Upstream {
            status: 500,
            message: "model unavailable".to_string(),
        })
    }
}

pub struct SlowModel;

#[async_trait]
impl LanguageModel for SlowModel {
    async fn generate_object(&self, _prompt: &str, _schema: &Value) -> Result<Value, ModelError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(json!({}))
    }
}

/// Every operation fails as if the data directory vanished.
pub struct BrokenStore;

fn broken<T>() -> Result<T, StoreError> {
    Err(StoreError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "data directory is gone",
    )))
}

impl ItemStore for BrokenStore {
    fn nearest(
        &self,
        _: &str,
        _: &[f32],
        _: f32,
        _: usize,
    ) -> Result<Vec<(Item, f32)>, StoreError> {
        broken()
    }

    fn match_text(&self, _: &str, _: TextMatch<'_>) -> Result<Vec<Item>, StoreError> {
        broken()
    }

    fn tag_links(&self, _: &[u64]) -> Result<Vec<TagLink>, StoreError> {
        broken()
    }

    fn tag_names(&self, _: &str) -> Result<Vec<String>, StoreError> {
        broken()
    }

    fn category_names(&self, _: &str) -> Result<Vec<String>, StoreError> {
        broken()
    }

    fn categories(&self, _: &str) -> Result<Vec<Category>, StoreError> {
        broken()
    }

    fn tag_counts(&self, _: &str) -> Result<Vec<TagCount>, StoreError> {
        broken()
    }

    fn create(&self, _: ItemCreate, _: Option<ItemEmbedding>) -> Result<Item, StoreError> {
        broken()
    }

    fn set_status(&self, _: u64, _: ItemStatus) -> Result<Item, StoreError> {
        broken()
    }
}

pub fn analysis_reply(terms: &[&str], content_types: &[&str], confidence: f32) -> Value {
    json!({
        "intent": "find React resources",
        "searchTerms": terms,
        "filters": {"contentTypes": content_types},
        "suggestions": ["Add a tag like 'frontend' to narrow results"],
        "confidence": confidence,
        "explanation": "The query names a library"
    })
}

pub struct Fixture {
    pub store: Arc<BackendCsv>,
    pub _dir: tempfile::TempDir,
}

pub fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("workspaces.yaml"), WORKSPACES).unwrap();
    let store = Arc::new(BackendCsv::load(dir.path(), "stub").unwrap());
    Fixture { store, _dir: dir }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.embedding.timeout_secs = 1;
    config.intent.timeout_secs = 1;
    config
}

pub fn library(
    store: Arc<dyn ItemStore>,
    embedder: Arc<dyn Embedder>,
    model: Option<Arc<dyn LanguageModel>>,
) -> Library {
    Library::new(test_config(), store, embedder, model)
}

/// Insert an item with an explicit embedding, bypassing the embedder.
pub fn insert(
    store: &dyn ItemStore,
    workspace: &str,
    kind: ItemKind,
    title: &str,
    content: Option<&str>,
    tags: &[&str],
    vector: Option<&[f32]>,
) -> Item {
    let slug = title.to_lowercase().replace(' ', "-");
    store
        .create(
            ItemCreate {
                workspace_id: Eid::from(workspace),
                kind: Some(kind),
                title: title.to_string(),
                content: content.map(str::to_string),
                url: (kind == ItemKind::Bookmark).then(|| format!("https://example.com/{slug}")),
                tags: tags.iter().map(|t| t.to_string()).collect(),
                ..Default::default()
            },
            vector.map(|v| ItemEmbedding {
                content_hash: 0,
                vector: v.to_vec(),
            }),
        )
        .unwrap()
}

/// Two React bookmarks near the query vector and one unrelated note.
pub fn seed_react(store: &dyn ItemStore) -> (Item, Item, Item) {
    let hooks = insert(
        store,
        "ws1",
        ItemKind::Bookmark,
        "React Hooks Guide",
        None,
        &["frontend", "react"],
        Some(&[0.98, 0.2, 0.0][..]),
    );
    let learning = insert(
        store,
        "ws1",
        ItemKind::Bookmark,
        "Learning React",
        None,
        &["frontend"],
        Some(&[0.9, 0.3, 0.1][..]),
    );
    let groceries = insert(
        store,
        "ws1",
        ItemKind::Note,
        "Groceries",
        Some("eggs, milk, bread"),
        &[],
        Some(&GROCERIES[..]),
    );
    (hooks, learning, groceries)
}
