use crate::eid::Eid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, hash::Hash, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Bookmark,
    Note,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Bookmark => "bookmark",
            ItemKind::Note => "note",
        }
    }
}

impl Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = anyhow::Error;

    /// Accepts "bookmark", "Bookmarks", "NOTE", ...
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.strip_suffix('s').unwrap_or(s.as_str()) {
            "bookmark" => Ok(ItemKind::Bookmark),
            "note" => Ok(ItemKind::Note),
            _ => Err(anyhow::anyhow!("unknown item kind: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Active,
    Trashed,
}

/// Page metadata scraped for a bookmark.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
}

/// A saved bookmark or note.
///
/// The embedding is not part of the row; the store keeps it in its vector
/// index keyed by `id`.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: u64,
    pub workspace_id: Eid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Eid>,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub site: SiteMeta,
    pub sort_order: i64,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Hash for Item {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Item {
    pub fn is_active(&self) -> bool {
        self.status == ItemStatus::Active
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ItemCreate {
    pub workspace_id: Eid,
    pub kind: Option<ItemKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Eid>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub site: SiteMeta,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Eid,
    pub workspace_id: Eid,
    pub name: String,
}

/// The `{id, name}` pair attached to search results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagRef {
    pub id: Eid,
    pub name: String,
}

impl From<&Tag> for TagRef {
    fn from(tag: &Tag) -> Self {
        TagRef {
            id: tag.id.clone(),
            name: tag.name.clone(),
        }
    }
}

/// One row of the item/tag join resolved to the tag it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagLink {
    pub item_id: u64,
    pub tag: TagRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub id: Eid,
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Eid,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: Eid,
    pub name: String,
    #[serde(default)]
    pub categories: Vec<Category>,
}

/// A computed embedding ready to be stored with an item.
#[derive(Debug, Clone)]
pub struct ItemEmbedding {
    /// Hash of the text that was embedded
    pub content_hash: u64,
    pub vector: Vec<f32>,
}

/// Text filter for [`ItemStore::match_text`].
#[derive(Debug, Clone, Default)]
pub struct TextMatch<'a> {
    /// Case-insensitive substring required in title, content or site title.
    pub pattern: Option<&'a str>,
    /// Restrict to these kinds; empty means any kind.
    pub kinds: &'a [ItemKind],
    pub limit: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("item not found: {0}")]
    ItemNotFound(u64),

    #[error("workspace not found: {0}")]
    WorkspaceNotFound(String),

    #[error("category {category} does not belong to workspace {workspace}")]
    CategoryNotFound { workspace: String, category: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("corrupt data in {file}: {reason}")]
    Corrupt { file: String, reason: String },

    #[error("vector index error: {0}")]
    Index(#[from] crate::semantic::IndexError),

    #[error("vector storage error: {0}")]
    Vectors(#[from] crate::semantic::VectorStorageError),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Datastore primitives consumed by search and item intake.
///
/// All read operations only ever see items of the given workspace, and the
/// search primitives never return trashed items.
pub trait ItemStore: Send + Sync {
    /// Active items whose embedding similarity to `embedding` is strictly
    /// above `threshold`, best first, at most `limit`.
    fn nearest(
        &self,
        workspace_id: &str,
        embedding: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<(Item, f32)>, StoreError>;

    /// Active items matching a substring/kind filter, in `sort_order`.
    fn match_text(&self, workspace_id: &str, filter: TextMatch<'_>)
        -> Result<Vec<Item>, StoreError>;

    /// All tag links for the given items in one lookup.
    fn tag_links(&self, item_ids: &[u64]) -> Result<Vec<TagLink>, StoreError>;

    /// Distinct tag names used in the workspace.
    fn tag_names(&self, workspace_id: &str) -> Result<Vec<String>, StoreError>;

    /// Distinct category names of the workspace.
    fn category_names(&self, workspace_id: &str) -> Result<Vec<String>, StoreError>;

    fn categories(&self, workspace_id: &str) -> Result<Vec<Category>, StoreError>;

    fn tag_counts(&self, workspace_id: &str) -> Result<Vec<TagCount>, StoreError>;

    /// Store a new item. An embedding the index rejects is dropped with a
    /// warning; the item is still created.
    fn create(
        &self,
        create: ItemCreate,
        embedding: Option<ItemEmbedding>,
    ) -> Result<Item, StoreError>;

    fn set_status(&self, id: u64, status: ItemStatus) -> Result<Item, StoreError>;
}
