//! Retrieval backends and catalog collaborators for RagRelay.
//!
//! - [`QdrantStore`]: vector search against a Qdrant server over HTTP
//! - [`InMemoryVectorStore`]: brute-force cosine search, for tests and demos
//! - [`StaticCatalog`]: agents, toolsets, and file metadata from a [`Catalog`](ragrelay_config::Catalog)

pub mod catalog;
pub mod in_memory;
pub mod qdrant;
pub mod vector;

pub use catalog::StaticCatalog;
pub use in_memory::InMemoryVectorStore;
pub use qdrant::QdrantStore;
pub use vector::{cosine_similarity, top_k_by_similarity};
