//! Nearest-neighbour storage for chunk vectors.
//!
//! A [`VectorIndex`] holds one named collection. Entries are keyed by chunk
//! id; writing an id that already exists replaces its text, vector and
//! metadata but keeps its original insertion position, which is what ties
//! in distance are resolved by.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    chunking::chunk_id,
    embedding::EmbeddingSignature,
    error::{Error, Result},
};

pub type Metadata = BTreeMap<String, String>;

/// One stored chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub text: String,
    pub vector: Vec<f32>,
    pub metadata: Metadata,
}

/// A chunk returned by a nearest-neighbour query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk_id: String,
    pub text: String,
    /// Cosine distance to the query vector; lower is more relevant.
    pub distance: f32,
}

/// Read-only summary of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    pub collection_name: String,
    pub total_documents: usize,
}

/// Default provenance metadata for the entry at `index`.
pub fn default_metadata(index: usize) -> Metadata {
    Metadata::from([("source".to_string(), chunk_id(index))])
}

/// Cosine distance between two unit vectors: `1 - a·b`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    1.0 - dot
}

/// A single named collection of chunk vectors.
pub trait VectorIndex {
    fn backend_name(&self) -> &'static str;

    fn collection_name(&self) -> &str;

    /// Insert or replace a batch of entries in one write.
    fn upsert_batch(&mut self, entries: Vec<IndexEntry>) -> Result<()>;

    /// The `k` entries closest to `vector`, ordered by ascending distance.
    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievalResult>>;

    fn count(&self) -> Result<usize>;

    /// Remove every entry from the collection, along with its recorded
    /// embedding signature.
    fn reset(&mut self) -> Result<()>;

    /// Embedding configuration the stored vectors were built with, if one
    /// was recorded.
    fn embedding_signature(&self) -> Result<Option<EmbeddingSignature>>;

    fn set_embedding_signature(
        &mut self,
        signature: &EmbeddingSignature,
    ) -> Result<()>;

    fn stats(&self) -> Result<CollectionStats> {
        Ok(CollectionStats {
            collection_name: self.collection_name().to_string(),
            total_documents: self.count()?,
        })
    }

    /// Store aligned ids, texts and vectors, `batch_size` entries per write.
    ///
    /// Missing metadata defaults to `{source: "chunk_<i>"}` where `i` is the
    /// position within this call. Splitting into batches does not change
    /// what ends up stored.
    fn upsert(
        &mut self,
        ids: &[String],
        texts: &[String],
        vectors: &[Vec<f32>],
        metadata: Option<&[Metadata]>,
        batch_size: usize,
    ) -> Result<()> {
        if batch_size == 0 {
            return Err(Error::Config(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        if ids.len() != texts.len() || ids.len() != vectors.len() {
            return Err(Error::VectorIndex {
                backend: self.backend_name(),
                message: format!(
                    "misaligned upsert: {} ids, {} texts, {} vectors",
                    ids.len(),
                    texts.len(),
                    vectors.len()
                ),
            });
        }
        if let Some(metadata) = metadata
            && metadata.len() != ids.len()
        {
            return Err(Error::VectorIndex {
                backend: self.backend_name(),
                message: format!(
                    "misaligned upsert: {} ids, {} metadata entries",
                    ids.len(),
                    metadata.len()
                ),
            });
        }

        let total_batches = ids.len().div_ceil(batch_size);
        for (batch, start) in (0..ids.len()).step_by(batch_size).enumerate() {
            let end = (start + batch_size).min(ids.len());
            let entries = (start..end)
                .map(|i| IndexEntry {
                    id: ids[i].clone(),
                    text: texts[i].clone(),
                    vector: vectors[i].clone(),
                    metadata: metadata
                        .map(|m| m[i].clone())
                        .unwrap_or_else(|| default_metadata(i)),
                })
                .collect();
            self.upsert_batch(entries)?;
            debug!(
                collection = self.collection_name(),
                batch = batch + 1,
                total_batches,
                "stored batch"
            );
        }
        Ok(())
    }
}

/// Rank `(sequence, entry)` candidates against `query`.
///
/// Shared by the index backends so they order results identically.
pub(crate) fn rank<'a, I>(
    backend: &'static str,
    candidates: I,
    query: &[f32],
    k: usize,
) -> Result<Vec<RetrievalResult>>
where
    I: IntoIterator<Item = (u64, &'a str, &'a str, &'a [f32])>,
{
    let mut scored = Vec::new();
    for (sequence, id, text, vector) in candidates {
        if vector.len() != query.len() {
            return Err(Error::VectorIndex {
                backend,
                message: format!(
                    "query has dimension {} but entry '{id}' has {}",
                    query.len(),
                    vector.len()
                ),
            });
        }
        scored.push((cosine_distance(query, vector), sequence, id, text));
    }

    scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    Ok(scored
        .into_iter()
        .take(k)
        .map(|(distance, _, id, text)| RetrievalResult {
            chunk_id: id.to_string(),
            text: text.to_string(),
            distance,
        })
        .collect())
}

/// In-process collection that lives as long as the value.
#[derive(Debug, Clone, Default)]
pub struct MemoryIndex {
    name: String,
    entries: Vec<IndexEntry>,
    positions: HashMap<String, usize>,
    signature: Option<EmbeddingSignature>,
}

impl MemoryIndex {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Stored entry by chunk id.
    pub fn get(&self, id: &str) -> Option<&IndexEntry> {
        self.positions.get(id).map(|&i| &self.entries[i])
    }
}

impl VectorIndex for MemoryIndex {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn collection_name(&self) -> &str {
        &self.name
    }

    fn upsert_batch(&mut self, entries: Vec<IndexEntry>) -> Result<()> {
        for entry in entries {
            match self.positions.get(&entry.id) {
                Some(&position) => self.entries[position] = entry,
                None => {
                    self.positions.insert(entry.id.clone(), self.entries.len());
                    self.entries.push(entry);
                }
            }
        }
        Ok(())
    }

    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievalResult>> {
        rank(
            self.backend_name(),
            self.entries.iter().enumerate().map(|(i, e)| {
                (i as u64, e.id.as_str(), e.text.as_str(), e.vector.as_slice())
            }),
            vector,
            k,
        )
    }

    fn count(&self) -> Result<usize> {
        Ok(self.entries.len())
    }

    fn reset(&mut self) -> Result<()> {
        self.entries.clear();
        self.positions.clear();
        self.signature = None;
        Ok(())
    }

    fn embedding_signature(&self) -> Result<Option<EmbeddingSignature>> {
        Ok(self.signature.clone())
    }

    fn set_embedding_signature(
        &mut self,
        signature: &EmbeddingSignature,
    ) -> Result<()> {
        self.signature = Some(signature.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(chunk_id).collect()
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("text {i}")).collect()
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = MemoryIndex::new("plan");
        assert!(index.query(&[1.0, 0.0], 5).unwrap().is_empty());
        assert_eq!(index.count().unwrap(), 0);
    }

    #[test]
    fn query_orders_by_distance() {
        let mut index = MemoryIndex::new("plan");
        let vectors = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.6, 0.8]];
        index
            .upsert(&ids(3), &texts(3), &vectors, None, 10)
            .unwrap();

        let results = index.query(&[1.0, 0.0], 3).unwrap();
        let order: Vec<_> = results.iter().map(|r| r.chunk_id.as_str()).collect();
        assert_eq!(order, ["chunk_1", "chunk_2", "chunk_0"]);
        assert!(results[0].distance.abs() < 1e-6);
        assert!((results[2].distance - 1.0).abs() < 1e-6);
    }

    #[test]
    fn fewer_entries_than_k() {
        let mut index = MemoryIndex::new("plan");
        index
            .upsert(&ids(2), &texts(2), &[vec![1.0], vec![1.0]], None, 10)
            .unwrap();
        assert_eq!(index.query(&[1.0], 5).unwrap().len(), 2);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut index = MemoryIndex::new("plan");
        let vectors = vec![vec![1.0, 0.0]; 4];
        index.upsert(&ids(4), &texts(4), &vectors, None, 3).unwrap();

        let results = index.query(&[1.0, 0.0], 4).unwrap();
        let order: Vec<_> = results.iter().map(|r| r.chunk_id.clone()).collect();
        assert_eq!(order, ids(4));
    }

    #[test]
    fn upsert_overwrites_in_place() {
        let mut index = MemoryIndex::new("plan");
        index
            .upsert(&ids(2), &texts(2), &[vec![1.0], vec![1.0]], None, 10)
            .unwrap();
        index
            .upsert(
                &["chunk_0".to_string()],
                &["replaced".to_string()],
                &[vec![1.0]],
                None,
                10,
            )
            .unwrap();

        assert_eq!(index.count().unwrap(), 2);
        assert_eq!(index.get("chunk_0").unwrap().text, "replaced");
        let results = index.query(&[1.0], 2).unwrap();
        assert_eq!(results[0].chunk_id, "chunk_0");
    }

    #[test]
    fn default_metadata_points_at_sequence() {
        let mut index = MemoryIndex::new("plan");
        index
            .upsert(&ids(2), &texts(2), &[vec![1.0], vec![1.0]], None, 1)
            .unwrap();
        assert_eq!(index.get("chunk_1").unwrap().metadata["source"], "chunk_1");
    }

    #[test]
    fn explicit_metadata_is_kept() {
        let mut index = MemoryIndex::new("plan");
        let metadata = vec![Metadata::from([(
            "page".to_string(),
            "4".to_string(),
        )])];
        index
            .upsert(&ids(1), &texts(1), &[vec![1.0]], Some(&metadata), 10)
            .unwrap();
        assert_eq!(index.get("chunk_0").unwrap().metadata, metadata[0]);
    }

    #[test]
    fn misaligned_upsert_is_rejected() {
        let mut index = MemoryIndex::new("plan");
        let err = index
            .upsert(&ids(2), &texts(1), &[vec![1.0], vec![1.0]], None, 10)
            .unwrap_err();
        assert!(err.to_string().contains("misaligned"));
        assert_eq!(index.count().unwrap(), 0);

        assert!(matches!(
            index.upsert(&ids(1), &texts(1), &[vec![1.0]], None, 0),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn dimension_mismatch_on_query() {
        let mut index = MemoryIndex::new("plan");
        index
            .upsert(&ids(1), &texts(1), &[vec![1.0, 0.0]], None, 10)
            .unwrap();
        assert!(index.query(&[1.0], 1).is_err());
    }

    #[test]
    fn reset_empties_collection() {
        let mut index = MemoryIndex::new("plan");
        index
            .upsert(&ids(3), &texts(3), &[vec![1.0], vec![1.0], vec![1.0]], None, 2)
            .unwrap();
        index.reset().unwrap();
        assert_eq!(index.count().unwrap(), 0);
        assert!(index.get("chunk_0").is_none());

        let stats = index.stats().unwrap();
        assert_eq!(stats.collection_name, "plan");
        assert_eq!(stats.total_documents, 0);
    }

    #[test]
    fn reset_forgets_embedding_signature() {
        let mut index = MemoryIndex::new("plan");
        assert_eq!(index.embedding_signature().unwrap(), None);

        let signature = EmbeddingSignature {
            model_name: "hash-embedder-2".to_string(),
            dimension: 2,
            normalized: true,
        };
        index.set_embedding_signature(&signature).unwrap();
        assert_eq!(index.embedding_signature().unwrap(), Some(signature));

        index.reset().unwrap();
        assert_eq!(index.embedding_signature().unwrap(), None);
    }

    fn arb_unit(dim: usize) -> impl Strategy<Value = Vec<f32>> {
        proptest::collection::vec(-1.0f32..1.0, dim).prop_filter_map(
            "non-zero vector",
            |mut v| {
                crate::embedding::l2_normalize(&mut v).then_some(v)
            },
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_non_decreasing_and_bounded(
            vectors in proptest::collection::vec(arb_unit(8), 1..20),
            query in arb_unit(8),
            k in 1usize..25,
        ) {
            let n = vectors.len();
            let mut index = MemoryIndex::new("prop");
            index.upsert(&ids(n), &texts(n), &vectors, None, 10).unwrap();

            let results = index.query(&query, k).unwrap();
            prop_assert_eq!(results.len(), k.min(n));
            for pair in results.windows(2) {
                prop_assert!(pair[0].distance <= pair[1].distance);
            }
        }

        #[test]
        fn batching_does_not_change_contents(
            vectors in proptest::collection::vec(arb_unit(4), 1..30),
            batch_size in 1usize..12,
        ) {
            let n = vectors.len();
            let mut batched = MemoryIndex::new("batched");
            batched.upsert(&ids(n), &texts(n), &vectors, None, batch_size).unwrap();
            let mut single = MemoryIndex::new("single");
            single.upsert(&ids(n), &texts(n), &vectors, None, n).unwrap();

            prop_assert_eq!(batched.entries, single.entries);
        }
    }
}
