//! Model-facing infrastructure for search.
//!
//! - `embeddings`: text embedding providers (hosted or fastembed)
//! - `model`: generative model client returning schema-checked JSON
//! - `index`: in-memory vector index with cosine similarity search
//! - `storage`: `vectors.bin` persistence for the index
//! - `preprocess`: text preparation for embedding input

pub mod embeddings;
pub mod index;
pub mod model;
mod preprocess;
pub mod storage;

pub use embeddings::{embed_with_timeout, Embedder, EmbeddingError, RemoteEmbedder};
#[cfg(feature = "local-embeddings")]
pub use embeddings::LocalEmbedder;
pub use index::{IndexError, VectorIndex};
pub use model::{LanguageModel, ModelError, RemoteLanguageModel};
pub use preprocess::{content_hash, embedding_text};
pub use storage::{VectorStorage, VectorStorageError};
