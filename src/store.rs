use crate::{
    eid::Eid,
    items::{
        Category, Item, ItemCreate, ItemEmbedding, ItemKind, ItemStatus, ItemStore, SiteMeta,
        StoreError, Tag, TagCount, TagLink, TagRef, TextMatch, Workspace,
    },
    semantic::{storage::model_id, VectorIndex, VectorStorage, VectorStorageError},
    storage::{BackendLocal, StorageManager},
};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    path::Path,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Instant,
};

const WORKSPACES_FILE: &str = "workspaces.yaml";
const ITEMS_FILE: &str = "items.csv";
const TAGS_FILE: &str = "tags.csv";
const ITEM_TAGS_FILE: &str = "item_tags.csv";
const VECTORS_FILE: &str = "vectors.bin";

/// Flat CSV form of an [`Item`].
#[derive(Debug, Serialize, Deserialize)]
struct ItemRow {
    id: u64,
    workspace_id: String,
    category_id: Option<String>,
    kind: ItemKind,
    title: String,
    content: Option<String>,
    url: Option<String>,
    site_title: Option<String>,
    description: Option<String>,
    image_url: Option<String>,
    site_name: Option<String>,
    sort_order: i64,
    status: ItemStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&Item> for ItemRow {
    fn from(item: &Item) -> Self {
        ItemRow {
            id: item.id,
            workspace_id: item.workspace_id.to_string(),
            category_id: item.category_id.as_ref().map(|c| c.to_string()),
            kind: item.kind,
            title: item.title.clone(),
            content: item.content.clone(),
            url: item.url.clone(),
            site_title: item.site.site_title.clone(),
            description: item.site.description.clone(),
            image_url: item.site.image_url.clone(),
            site_name: item.site.site_name.clone(),
            sort_order: item.sort_order,
            status: item.status,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
        Item {
            id: row.id,
            workspace_id: Eid::from(row.workspace_id),
            category_id: non_empty(row.category_id).map(Eid::from),
            kind: row.kind,
            title: row.title,
            content: non_empty(row.content),
            url: non_empty(row.url),
            site: SiteMeta {
                site_title: non_empty(row.site_title),
                description: non_empty(row.description),
                image_url: non_empty(row.image_url),
                site_name: non_empty(row.site_name),
            },
            sort_order: row.sort_order,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
struct LinkRow {
    item_id: u64,
    tag_id: Eid,
}

struct Tables {
    workspaces: Vec<Workspace>,
    items: BTreeMap<u64, Item>,
    tags: Vec<Tag>,
    links: Vec<LinkRow>,
    vectors: VectorIndex,
}

impl Tables {
    fn workspace(&self, id: &str) -> Option<&Workspace> {
        self.workspaces.iter().find(|w| w.id.as_str() == id)
    }

    fn active_in<'a>(&'a self, workspace_id: &'a str) -> impl Iterator<Item = &'a Item> + 'a {
        self.items
            .values()
            .filter(move |i| i.workspace_id.as_str() == workspace_id && i.is_active())
    }

    fn find_or_create_tag(&mut self, workspace_id: &Eid, name: &str) -> Eid {
        if let Some(tag) = self
            .tags
            .iter()
            .find(|t| &t.workspace_id == workspace_id && t.name.eq_ignore_ascii_case(name))
        {
            return tag.id.clone();
        }

        let tag = Tag {
            id: Eid::new(),
            workspace_id: workspace_id.clone(),
            name: name.to_string(),
        };
        let id = tag.id.clone();
        self.tags.push(tag);
        id
    }
}

/// Item store persisted as CSV/YAML files plus `vectors.bin`, served from memory.
pub struct BackendCsv {
    tables: RwLock<Tables>,
    files: BackendLocal,
    vectors: VectorStorage,
    model_id: [u8; 32],
}

impl BackendCsv {
    /// Load every table from `base_path`.
    ///
    /// Vectors persisted for a different `model_name` are discarded.
    pub fn load(base_path: impl AsRef<Path>, model_name: &str) -> Result<Self, StoreError> {
        let now = Instant::now();
        let files = BackendLocal::new(base_path)?;

        if !files.exists(WORKSPACES_FILE) {
            log::info!("creating empty {}", files.path(WORKSPACES_FILE).display());
            files.write(WORKSPACES_FILE, b"[]\n")?;
        }
        let workspaces: Vec<Workspace> = serde_yml::from_slice(&files.read(WORKSPACES_FILE)?)
            .map_err(|e| StoreError::Corrupt {
                file: WORKSPACES_FILE.to_string(),
                reason: e.to_string(),
            })?;

        let items = read_rows::<ItemRow>(&files, ITEMS_FILE)?
            .into_iter()
            .map(|row| (row.id, Item::from(row)))
            .collect::<BTreeMap<_, _>>();
        let tags = read_rows::<Tag>(&files, TAGS_FILE)?;
        let links = read_rows::<LinkRow>(&files, ITEM_TAGS_FILE)?;

        let model_id = model_id(model_name);
        let vectors = VectorStorage::new(files.path(VECTORS_FILE));
        let index = if vectors.exists() {
            match vectors.load(&model_id) {
                Ok(index) => index,
                Err(VectorStorageError::ModelMismatch) => {
                    log::warn!(
                        "embedding model changed to '{model_name}', dropping stored vectors"
                    );
                    VectorIndex::new(0)
                }
                Err(err) => return Err(err.into()),
            }
        } else {
            VectorIndex::new(0)
        };

        log::debug!(
            "loaded {} workspaces, {} items, {} tags, {} vectors in {}ms",
            workspaces.len(),
            items.len(),
            tags.len(),
            index.len(),
            now.elapsed().as_micros() as f64 / 1000.0
        );

        Ok(BackendCsv {
            tables: RwLock::new(Tables {
                workspaces,
                items,
                tags,
                links,
                vectors: index,
            }),
            files,
            vectors,
            model_id,
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables.write().map_err(|_| StoreError::Poisoned)
    }

    fn save_items(&self, tables: &Tables) -> Result<(), StoreError> {
        write_rows(&self.files, ITEMS_FILE, tables.items.values().map(ItemRow::from))
    }

    fn save_tags(&self, tables: &Tables) -> Result<(), StoreError> {
        write_rows(&self.files, TAGS_FILE, tables.tags.iter())?;
        write_rows(&self.files, ITEM_TAGS_FILE, tables.links.iter())
    }
}

fn read_rows<T: DeserializeOwned>(files: &BackendLocal, ident: &str) -> Result<Vec<T>, StoreError> {
    if !files.exists(ident) {
        return Ok(vec![]);
    }

    let data = files.read(ident)?;
    let mut reader = csv::Reader::from_reader(data.as_slice());
    let rows = reader.deserialize().collect::<Result<Vec<T>, _>>()?;
    Ok(rows)
}

fn write_rows<T, I>(files: &BackendLocal, ident: &str, rows: I) -> Result<(), StoreError>
where
    T: Serialize,
    I: Iterator<Item = T>,
{
    let mut writer = csv::Writer::from_writer(vec![]);
    for row in rows {
        writer.serialize(row)?;
    }
    let data = writer.into_inner().map_err(|e| e.into_error())?;
    files.write(ident, &data)?;
    Ok(())
}

impl ItemStore for BackendCsv {
    fn nearest(
        &self,
        workspace_id: &str,
        embedding: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<(Item, f32)>, StoreError> {
        let tables = self.read()?;

        let eligible: HashSet<u64> = tables.active_in(workspace_id).map(|i| i.id).collect();
        if eligible.is_empty() {
            return Ok(vec![]);
        }

        let hits = tables
            .vectors
            .search(embedding, |id| eligible.contains(&id), threshold, limit)?;

        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                tables
                    .items
                    .get(&hit.id)
                    .map(|item| (item.clone(), hit.score))
            })
            .collect())
    }

    fn match_text(
        &self,
        workspace_id: &str,
        filter: TextMatch<'_>,
    ) -> Result<Vec<Item>, StoreError> {
        let tables = self.read()?;
        let pattern = filter.pattern.map(|p| p.to_lowercase());

        let contains = |field: Option<&str>, pattern: &str| {
            field
                .map(|f| f.to_lowercase().contains(pattern))
                .unwrap_or(false)
        };

        let mut output: Vec<Item> = tables
            .active_in(workspace_id)
            .filter(|item| filter.kinds.is_empty() || filter.kinds.contains(&item.kind))
            .filter(|item| match &pattern {
                None => true,
                Some(pattern) => {
                    contains(Some(item.title.as_str()), pattern)
                        || contains(item.content.as_deref(), pattern)
                        || contains(item.site.site_title.as_deref(), pattern)
                }
            })
            .cloned()
            .collect();

        output.sort_by_key(|item| (item.sort_order, item.id));
        output.truncate(filter.limit);

        Ok(output)
    }

    fn tag_links(&self, item_ids: &[u64]) -> Result<Vec<TagLink>, StoreError> {
        if item_ids.is_empty() {
            return Ok(vec![]);
        }

        let tables = self.read()?;
        let wanted: HashSet<u64> = item_ids.iter().copied().collect();
        let tags: HashMap<&Eid, &Tag> = tables.tags.iter().map(|t| (&t.id, t)).collect();

        Ok(tables
            .links
            .iter()
            .filter(|link| wanted.contains(&link.item_id))
            .filter_map(|link| {
                tags.get(&link.tag_id).map(|tag| TagLink {
                    item_id: link.item_id,
                    tag: TagRef::from(*tag),
                })
            })
            .collect())
    }

    fn tag_names(&self, workspace_id: &str) -> Result<Vec<String>, StoreError> {
        let tables = self.read()?;

        let mut names: Vec<String> = tables
            .tags
            .iter()
            .filter(|t| t.workspace_id.as_str() == workspace_id)
            .map(|t| t.name.clone())
            .collect();
        names.sort();
        names.dedup();

        Ok(names)
    }

    fn category_names(&self, workspace_id: &str) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self
            .categories(workspace_id)?
            .into_iter()
            .map(|c| c.name)
            .collect();
        let mut seen = HashSet::new();
        names.retain(|name| seen.insert(name.clone()));
        Ok(names)
    }

    fn categories(&self, workspace_id: &str) -> Result<Vec<Category>, StoreError> {
        let tables = self.read()?;

        let mut categories = tables
            .workspace(workspace_id)
            .map(|w| w.categories.clone())
            .unwrap_or_default();
        categories.sort_by_key(|c| c.position);

        Ok(categories)
    }

    fn tag_counts(&self, workspace_id: &str) -> Result<Vec<TagCount>, StoreError> {
        let tables = self.read()?;

        let active: HashSet<u64> = tables.active_in(workspace_id).map(|i| i.id).collect();
        let mut counts: HashMap<&Eid, usize> = HashMap::new();
        for link in tables.links.iter().filter(|l| active.contains(&l.item_id)) {
            *counts.entry(&link.tag_id).or_default() += 1;
        }

        let mut output: Vec<TagCount> = tables
            .tags
            .iter()
            .filter(|t| t.workspace_id.as_str() == workspace_id)
            .map(|t| TagCount {
                id: t.id.clone(),
                name: t.name.clone(),
                count: counts.get(&t.id).copied().unwrap_or(0),
            })
            .collect();
        output.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));

        Ok(output)
    }

    fn create(
        &self,
        create: ItemCreate,
        embedding: Option<ItemEmbedding>,
    ) -> Result<Item, StoreError> {
        let mut tables = self.write()?;

        let workspace = tables
            .workspace(&create.workspace_id)
            .ok_or_else(|| StoreError::WorkspaceNotFound(create.workspace_id.to_string()))?;

        if let Some(category_id) = &create.category_id {
            if !workspace.categories.iter().any(|c| &c.id == category_id) {
                return Err(StoreError::CategoryNotFound {
                    workspace: create.workspace_id.to_string(),
                    category: category_id.to_string(),
                });
            }
        }

        let id = tables.items.keys().next_back().map(|id| id + 1).unwrap_or(1);
        let sort_order = tables
            .items
            .values()
            .filter(|i| i.workspace_id == create.workspace_id)
            .map(|i| i.sort_order + 1)
            .max()
            .unwrap_or(0);
        let kind = create.kind.unwrap_or(if create.url.is_some() {
            ItemKind::Bookmark
        } else {
            ItemKind::Note
        });
        let now = Utc::now();

        let item = Item {
            id,
            workspace_id: create.workspace_id.clone(),
            category_id: create.category_id,
            kind,
            title: create.title,
            content: create.content,
            url: create.url,
            site: create.site,
            sort_order,
            status: ItemStatus::Active,
            created_at: now,
            updated_at: now,
        };

        let mut seen = HashSet::new();
        let mut tags_changed = false;
        for name in create.tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            if !seen.insert(name.to_lowercase()) {
                continue;
            }
            let tag_id = tables.find_or_create_tag(&create.workspace_id, name);
            tables.links.push(LinkRow { item_id: id, tag_id });
            tags_changed = true;
        }

        let mut vectors_changed = false;
        if let Some(embedding) = embedding {
            match tables.vectors.insert(id, embedding.content_hash, embedding.vector) {
                Ok(()) => vectors_changed = true,
                Err(err) => log::warn!("item {id} stored without embedding: {err}"),
            }
        }

        tables.items.insert(id, item.clone());

        self.save_items(&tables)?;
        if tags_changed {
            self.save_tags(&tables)?;
        }
        if vectors_changed {
            self.vectors.save(&tables.vectors, &self.model_id)?;
        }

        Ok(item)
    }

    fn set_status(&self, id: u64, status: ItemStatus) -> Result<Item, StoreError> {
        let mut tables = self.write()?;

        let item = tables.items.get_mut(&id).ok_or(StoreError::ItemNotFound(id))?;
        item.status = status;
        item.updated_at = Utc::now();
        let item = item.clone();

        self.save_items(&tables)?;

        Ok(item)
    }
}
