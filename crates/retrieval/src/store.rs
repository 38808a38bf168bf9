//! Semantic Retrieval Store — the FAQ index and its reconciliation.
//!
//! Two co-located files make up the persisted state:
//!
//! - `vectorstore.index`: the [`FlatIpIndex`] of question embeddings
//! - `id_map.json`: the [`IdMap`] resolving vector ids to text
//!
//! Both are rewritten together after every reconciliation.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use blossom_core::Result;
use blossom_core::error::StorageError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::embedder::EmbeddingModel;
use crate::id_map::IdMap;
use crate::vector::FlatIpIndex;

pub const INDEX_FILE: &str = "vectorstore.index";
pub const ID_MAP_FILE: &str = "id_map.json";

/// A question/answer pair that matched a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedAnswer {
    pub question: String,
    pub answer: String,
    pub score: f32,
}

/// What a reconciliation pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Questions embedded and inserted.
    pub added: usize,
    /// Questions dropped from the index.
    pub removed: usize,
    /// Existing questions whose answer text changed.
    pub updated: usize,
}

impl ReconcileSummary {
    pub fn is_unchanged(&self) -> bool {
        self.added == 0 && self.removed == 0 && self.updated == 0
    }
}

/// Read a question → answer source mapping from a JSON file.
pub fn load_source(path: &Path) -> Result<BTreeMap<String, String>> {
    let content = std::fs::read_to_string(path).map_err(|e| StorageError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let source = serde_json::from_str(&content).map_err(|e| StorageError::Corrupted {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(source)
}

pub struct RetrievalStore {
    index_path: PathBuf,
    id_map_path: PathBuf,
    index: FlatIpIndex,
    id_map: IdMap,
    embedder: EmbeddingModel,
}

impl RetrievalStore {
    /// Open the store in `dir`, loading the persisted pair if present.
    ///
    /// A lone index or id-map without its partner is discarded; the next
    /// reconciliation rebuilds both.
    pub fn open(dir: &Path, embedder: EmbeddingModel) -> Result<Self> {
        let index_path = dir.join(INDEX_FILE);
        let id_map_path = dir.join(ID_MAP_FILE);

        let (index, id_map) = match (index_path.exists(), id_map_path.exists()) {
            (true, true) => {
                let index = FlatIpIndex::load(&index_path)?;
                if index.dimensions() != embedder.dimensions() {
                    return Err(StorageError::DimensionMismatch {
                        expected: embedder.dimensions(),
                        actual: index.dimensions(),
                    }
                    .into());
                }
                (index, IdMap::load(&id_map_path)?)
            }
            (false, false) => (FlatIpIndex::new(embedder.dimensions()), IdMap::new()),
            _ => {
                warn!(dir = %dir.display(), "Found only one of the index pair, starting empty");
                (FlatIpIndex::new(embedder.dimensions()), IdMap::new())
            }
        };

        debug!(dir = %dir.display(), entries = id_map.len(), "Retrieval store opened");

        Ok(Self {
            index_path,
            id_map_path,
            index,
            id_map,
            embedder,
        })
    }

    pub fn len(&self) -> usize {
        self.id_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_map.is_empty()
    }

    pub fn id_map(&self) -> &IdMap {
        &self.id_map
    }

    pub fn index(&self) -> &FlatIpIndex {
        &self.index
    }

    pub fn embedder(&self) -> &EmbeddingModel {
        &self.embedder
    }

    /// Bring the index in line with `source` and persist both files.
    ///
    /// Questions are matched by text only. A changed answer for a known
    /// question is updated in place under the same id, without
    /// re-embedding. All embeddings are computed before anything is
    /// mutated, so a failed call leaves the store untouched.
    pub async fn reconcile(&mut self, source: &BTreeMap<String, String>) -> Result<ReconcileSummary> {
        if source.is_empty() {
            let removed = self.id_map.len();
            self.index.reset();
            self.id_map.reset();
            self.persist()?;
            info!(removed, "Source is empty, retrieval index reset");
            return Ok(ReconcileSummary {
                removed,
                ..ReconcileSummary::default()
            });
        }

        self.repair_drift();

        let stored: BTreeSet<&str> = self.id_map.iter().map(|(_, q, _)| q).collect();

        let stale: Vec<u64> = self
            .id_map
            .iter()
            .filter(|(_, q, _)| !source.contains_key(*q))
            .map(|(id, _, _)| id)
            .collect();

        let mut fresh = Vec::new();
        for (question, answer) in source {
            if !stored.contains(question.as_str()) {
                let vector = self.embedder.embed(question).await?;
                fresh.push((question.clone(), answer.clone(), vector));
            }
        }

        let edited: Vec<(u64, String)> = self
            .id_map
            .iter()
            .filter_map(|(id, q, a)| match source.get(q) {
                Some(new_answer) if new_answer != a => Some((id, new_answer.clone())),
                _ => None,
            })
            .collect();

        // Every vector must fit before the first mutation.
        for (_, _, vector) in &fresh {
            if vector.len() != self.index.dimensions() {
                return Err(StorageError::DimensionMismatch {
                    expected: self.index.dimensions(),
                    actual: vector.len(),
                }
                .into());
            }
        }

        let summary = ReconcileSummary {
            added: fresh.len(),
            removed: stale.len(),
            updated: edited.len(),
        };

        self.index.remove(&stale);
        for id in &stale {
            self.id_map.remove(*id);
        }
        for (id, answer) in edited {
            self.id_map.set_answer(id, answer);
        }
        for (question, answer, vector) in fresh {
            let id = self.id_map.insert(question, answer);
            self.index.add(id, vector)?;
        }

        self.persist()?;

        info!(
            added = summary.added,
            removed = summary.removed,
            updated = summary.updated,
            total = self.id_map.len(),
            "Retrieval index reconciled"
        );
        Ok(summary)
    }

    /// The stored answers closest to `text`, best first. Hits scoring
    /// below `threshold` are dropped; nothing above it is an empty list.
    pub async fn query(&self, text: &str, k: usize, threshold: f32) -> Result<Vec<RetrievedAnswer>> {
        if self.index.is_empty() {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed(text).await?;
        if vector.len() != self.index.dimensions() {
            return Err(StorageError::DimensionMismatch {
                expected: self.index.dimensions(),
                actual: vector.len(),
            }
            .into());
        }
        let hits = self.index.search(&vector, k);

        let mut answers = Vec::with_capacity(hits.len());
        for (id, score) in hits {
            if score < threshold {
                continue;
            }
            match self.id_map.get(id) {
                Some((question, answer)) => answers.push(RetrievedAnswer {
                    question: question.to_string(),
                    answer: answer.to_string(),
                    score,
                }),
                None => warn!(id, "Index returned an id with no id-map entry, skipping"),
            }
        }

        debug!(k, threshold, matched = answers.len(), "Retrieval query");
        Ok(answers)
    }

    /// Make the id sets of index and id-map agree. Vectors without an
    /// id-map entry are dropped; id-map entries without a vector are
    /// forgotten so the diff re-adds them.
    fn repair_drift(&mut self) {
        let orphans: Vec<u64> = self
            .index
            .ids()
            .iter()
            .copied()
            .filter(|id| self.id_map.get(*id).is_none())
            .collect();
        if !orphans.is_empty() {
            warn!(count = orphans.len(), "Dropping vectors with no id-map entry");
            self.index.remove(&orphans);
        }

        let missing: Vec<u64> = self
            .id_map
            .ids()
            .filter(|id| !self.index.contains(*id))
            .collect();
        if !missing.is_empty() {
            warn!(count = missing.len(), "Re-embedding id-map entries with no vector");
            for id in missing {
                self.id_map.remove(id);
            }
        }
    }

    /// Write both files to temporaries, then move both into place.
    fn persist(&self) -> Result<()> {
        let index_bytes = self.index.to_bytes()?;
        let id_map_bytes = self.id_map.to_bytes()?;

        if let Some(parent) = self.index_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| write_error(parent, e))?;
        }

        let index_tmp = self.index_path.with_extension("index.tmp");
        let id_map_tmp = self.id_map_path.with_extension("json.tmp");

        std::fs::write(&index_tmp, &index_bytes).map_err(|e| write_error(&index_tmp, e))?;
        std::fs::write(&id_map_tmp, &id_map_bytes).map_err(|e| write_error(&id_map_tmp, e))?;

        std::fs::rename(&index_tmp, &self.index_path)
            .map_err(|e| write_error(&self.index_path, e))?;
        std::fs::rename(&id_map_tmp, &self.id_map_path)
            .map_err(|e| write_error(&self.id_map_path, e))?;

        Ok(())
    }
}

fn write_error(path: &Path, e: std::io::Error) -> StorageError {
    StorageError::Write {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::HashEmbedder;
    use std::sync::Arc;

    const DIMS: usize = 256;

    fn open(dir: &Path) -> (RetrievalStore, Arc<HashEmbedder>) {
        let provider = Arc::new(HashEmbedder::new(DIMS));
        let embedder = EmbeddingModel::new(provider.clone(), "text-embedding-3-small", 8191, DIMS);
        (RetrievalStore::open(dir, embedder).unwrap(), provider)
    }

    fn source(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(q, a)| (q.to_string(), a.to_string()))
            .collect()
    }

    fn read_pair(dir: &Path) -> (Vec<u8>, Vec<u8>) {
        (
            std::fs::read(dir.join(INDEX_FILE)).unwrap(),
            std::fs::read(dir.join(ID_MAP_FILE)).unwrap(),
        )
    }

    #[tokio::test]
    async fn reconcile_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, provider) = open(dir.path());
        let faq = source(&[
            ("What are your opening hours?", "Weekdays 9am to 6pm."),
            ("Where is the clinic?", "Orchard Road, Singapore."),
        ]);

        store.reconcile(&faq).await.unwrap();
        let first = read_pair(dir.path());
        let calls = provider.calls();

        let summary = store.reconcile(&faq).await.unwrap();
        assert!(summary.is_unchanged());
        assert_eq!(provider.calls(), calls);
        assert_eq!(read_pair(dir.path()), first);
    }

    #[tokio::test]
    async fn reconcile_round_trip_keeps_surviving_ids() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, _) = open(dir.path());

        store
            .reconcile(&source(&[("A question", "a"), ("B question", "b")]))
            .await
            .unwrap();
        let a_id = store.id_map().find_question("A question").unwrap();
        let b_id = store.id_map().find_question("B question").unwrap();

        let summary = store
            .reconcile(&source(&[("B question", "b"), ("C question", "c")]))
            .await
            .unwrap();
        assert_eq!(
            summary,
            ReconcileSummary {
                added: 1,
                removed: 1,
                updated: 0
            }
        );

        assert!(store.id_map().get(a_id).is_none());
        assert!(!store.index().contains(a_id));
        assert_eq!(store.id_map().find_question("B question"), Some(b_id));
        let c_id = store.id_map().find_question("C question").unwrap();
        assert!(c_id != a_id && c_id != b_id);
        assert!(store.index().contains(c_id));

        let index_ids: BTreeSet<u64> = store.index().ids().iter().copied().collect();
        let map_ids: BTreeSet<u64> = store.id_map().ids().collect();
        assert_eq!(index_ids, map_ids);
    }

    #[tokio::test]
    async fn answer_edit_is_applied_without_reembedding() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, provider) = open(dir.path());

        store
            .reconcile(&source(&[("Do you accept insurance?", "No.")]))
            .await
            .unwrap();
        let id = store.id_map().find_question("Do you accept insurance?").unwrap();
        let calls = provider.calls();

        let summary = store
            .reconcile(&source(&[("Do you accept insurance?", "Yes, most plans.")]))
            .await
            .unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(provider.calls(), calls);
        assert_eq!(
            store.id_map().get(id),
            Some(("Do you accept insurance?", "Yes, most plans."))
        );
    }

    #[tokio::test]
    async fn empty_source_resets_everything() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, _) = open(dir.path());
        store
            .reconcile(&source(&[("Q one", "1"), ("Q two", "2")]))
            .await
            .unwrap();

        let summary = store.reconcile(&BTreeMap::new()).await.unwrap();
        assert_eq!(summary.removed, 2);
        assert!(store.is_empty());
        assert!(store.index().is_empty());
        assert_eq!(store.id_map().counter(), 0);

        let on_disk = IdMap::load(&dir.path().join(ID_MAP_FILE)).unwrap();
        assert!(on_disk.is_empty());
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let (mut store, _) = open(dir.path());
            store
                .reconcile(&source(&[("What are your opening hours?", "9 to 6")]))
                .await
                .unwrap();
        }

        let (store, _) = open(dir.path());
        assert_eq!(store.len(), 1);
        let hits = store.query("what are your opening hours", 3, 0.4).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].answer, "9 to 6");
        assert!(!dir.path().join("vectorstore.index.tmp").exists());
    }

    #[tokio::test]
    async fn query_returns_best_match_first() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, _) = open(dir.path());
        store
            .reconcile(&source(&[
                ("What are your opening hours?", "Weekdays 9am to 6pm."),
                ("How much does a session cost?", "From $120."),
            ]))
            .await
            .unwrap();

        let hits = store
            .query("How much does a session cost?", 3, 0.0)
            .await
            .unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].question, "How much does a session cost?");
        assert!((hits[0].score - 1.0).abs() < 1e-4);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn query_below_threshold_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, _) = open(dir.path());
        store
            .reconcile(&source(&[("What are your opening hours?", "9 to 6")]))
            .await
            .unwrap();

        let hits = store.query("parking zebra xylophone", 3, 0.4).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn query_on_empty_store_skips_embedding() {
        let dir = tempfile::tempdir().unwrap();
        let (store, provider) = open(dir.path());
        assert!(store.query("anything", 3, 0.4).await.unwrap().is_empty());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn query_with_wrong_sized_embedding_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        {
            let (mut store, _) = open(dir.path());
            store
                .reconcile(&source(&[("What are your opening hours?", "9 to 6")]))
                .await
                .unwrap();
        }

        // Declared dimensions still match the file, but the model returns
        // shorter vectors.
        let provider = Arc::new(HashEmbedder::new(DIMS / 2));
        let embedder = EmbeddingModel::new(provider, "text-embedding-3-small", 8191, DIMS);
        let store = RetrievalStore::open(dir.path(), embedder).unwrap();

        let err = store
            .query("What are your opening hours?", 3, 0.0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            blossom_core::Error::Storage(StorageError::DimensionMismatch {
                expected: DIMS,
                actual: 128
            })
        ));
    }

    #[tokio::test]
    async fn lone_index_file_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        {
            let (mut store, _) = open(dir.path());
            store.reconcile(&source(&[("Q", "A")])).await.unwrap();
        }
        std::fs::remove_file(dir.path().join(ID_MAP_FILE)).unwrap();

        let (mut store, _) = open(dir.path());
        assert!(store.is_empty());
        let summary = store.reconcile(&source(&[("Q", "A")])).await.unwrap();
        assert_eq!(summary.added, 1);
    }

    #[tokio::test]
    async fn oversized_question_leaves_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(HashEmbedder::new(DIMS));
        let embedder = EmbeddingModel::new(provider, "text-embedding-3-small", 5, DIMS);
        let mut store = RetrievalStore::open(dir.path(), embedder).unwrap();
        let long = "long ".repeat(50);

        let err = store
            .reconcile(&source(&[("short", "ok"), (long.as_str(), "too big")]))
            .await
            .unwrap_err();
        assert!(matches!(err, blossom_core::Error::TokenLimit(_)));
        assert!(store.is_empty());
        assert!(!dir.path().join(ID_MAP_FILE).exists());
    }

    #[test]
    fn load_source_reads_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faq.json");
        std::fs::write(&path, r#"{"Where are you?": "Orchard Road"}"#).unwrap();
        let faq = load_source(&path).unwrap();
        assert_eq!(faq["Where are you?"], "Orchard Road");

        assert!(load_source(&dir.path().join("missing.json")).is_err());
    }
}
