//! Semantic retrieval for Blossom.
//!
//! A flat inner-product vector index over FAQ questions, kept in sync with
//! an authoritative question → answer mapping and persisted next to an
//! id-map that resolves vector ids back to text.

pub mod embedder;
pub mod id_map;
pub mod store;
pub mod vector;

pub use embedder::EmbeddingModel;
pub use id_map::IdMap;
pub use store::{ReconcileSummary, RetrievalStore, RetrievedAnswer, load_source};
pub use vector::{FlatIpIndex, inner_product};

#[cfg(test)]
pub(crate) mod test_helpers;
