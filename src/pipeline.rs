//! Retrieval-augmented question answering over one document.
//!
//! A [`RetrievalPipeline`] moves through three states. It starts
//! [`Unindexed`](PipelineState::Unindexed), is
//! [`Indexing`](PipelineState::Indexing) only while
//! [`index_document`](RetrievalPipeline::index_document) runs, and answers
//! questions once [`Ready`](PipelineState::Ready).
//!
//! Indexing is not atomic. If embedding or storage fails after some batches
//! were written, the pipeline returns to `Unindexed` and the collection must
//! be [`reset`](RetrievalPipeline::reset) before indexing again.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::{
    chunking::{Chunk, TextSplitter},
    composer::{AnswerComposer, AnswerMode},
    config::{EmbeddingBackendKind, PipelineConfig},
    document::{DocumentReader, reader_for_path},
    embedding::{EmbeddingProvider, ModelInfo},
    error::{Error, Result},
    generation::GeminiBackend,
    hash_embedder::HashEmbedder,
    model_manager::ColbertBackend,
    vector_index::{MemoryIndex, RetrievalResult, VectorIndex},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Unindexed,
    Indexing,
    Ready,
}

/// Answer to one question, with the passages it was built from.
///
/// `sources`, `source_documents` and `distances` are index-aligned and in
/// ascending distance order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub question: String,
    pub answer: String,
    pub sources: Vec<String>,
    pub source_documents: Vec<String>,
    pub distances: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub document_path: PathBuf,
    pub collection_name: String,
    pub total_chunks: usize,
    pub vector_db_size: usize,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub gemini_enabled: bool,
}

/// Assembles a [`RetrievalPipeline`], filling unset parts from the config.
pub struct PipelineBuilder {
    config: PipelineConfig,
    reader: Option<Box<dyn DocumentReader>>,
    embedder: Option<EmbeddingProvider>,
    index: Option<Box<dyn VectorIndex>>,
    composer: Option<AnswerComposer>,
}

impl PipelineBuilder {
    pub fn reader(mut self, reader: Box<dyn DocumentReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn embedder(mut self, embedder: EmbeddingProvider) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn index(mut self, index: Box<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn composer(mut self, composer: AnswerComposer) -> Self {
        self.composer = Some(composer);
        self
    }

    /// Validate the configuration and build the pipeline.
    ///
    /// Defaults: a reader chosen by file extension, the configured embedding
    /// backend, an in-memory index, and a composer with Gemini attached when
    /// `GEMINI_API_KEY` is set.
    pub fn build(self) -> Result<RetrievalPipeline> {
        let config = self.config;
        config.validate()?;
        let splitter = TextSplitter::new(config.chunk_size, config.chunk_overlap)?;

        let reader = self
            .reader
            .unwrap_or_else(|| reader_for_path(&config.document_path));

        let embedder = match self.embedder {
            Some(embedder) => embedder,
            None => match config.embedding_backend {
                EmbeddingBackendKind::Colbert => EmbeddingProvider::new(Box::new(
                    ColbertBackend::new(&config.embedding_model_name),
                ))?,
                EmbeddingBackendKind::Hash => {
                    EmbeddingProvider::new(Box::new(HashEmbedder::default()))?
                }
            },
        };

        let index = self
            .index
            .unwrap_or_else(|| Box::new(MemoryIndex::new(&config.collection_name)));

        let composer = self.composer.unwrap_or_else(|| {
            match GeminiBackend::from_env(
                &config.generation_model,
                config.generation_timeout,
            ) {
                Some(backend) => AnswerComposer::with_backend(
                    &config.document_title,
                    Box::new(backend),
                ),
                None => AnswerComposer::local(&config.document_title),
            }
        });

        let mut pipeline = RetrievalPipeline {
            use_remote_generation: false,
            config,
            reader,
            splitter,
            embedder,
            index,
            composer,
            state: PipelineState::Unindexed,
            chunks: Vec::new(),
        };
        let requested = pipeline.config.use_remote_generation;
        pipeline.set_use_remote_generation(requested);

        info!(
            document = %pipeline.config.document_path.display(),
            collection = pipeline.index.collection_name(),
            model = pipeline.embedder.model_name(),
            remote = pipeline.use_remote_generation,
            "pipeline ready to index"
        );
        Ok(pipeline)
    }
}

pub struct RetrievalPipeline {
    config: PipelineConfig,
    reader: Box<dyn DocumentReader>,
    splitter: TextSplitter,
    embedder: EmbeddingProvider,
    index: Box<dyn VectorIndex>,
    composer: AnswerComposer,
    state: PipelineState,
    chunks: Vec<Chunk>,
    use_remote_generation: bool,
}

impl RetrievalPipeline {
    pub fn builder(config: PipelineConfig) -> PipelineBuilder {
        PipelineBuilder {
            config,
            reader: None,
            embedder: None,
            index: None,
            composer: None,
        }
    }

    /// Pipeline over `pdf_path` with default settings.
    ///
    /// Loads the embedding model, so this can take a while on first use.
    pub fn construct(
        pdf_path: impl AsRef<Path>,
        use_remote_generation: bool,
    ) -> Result<Self> {
        let mut config = PipelineConfig::for_document(pdf_path.as_ref());
        config.use_remote_generation = use_remote_generation;
        Self::builder(config).build()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Chunks produced by the last successful indexing run.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn model_info(&self) -> ModelInfo {
        self.embedder.model_info()
    }

    /// Extract, split, embed and store the document.
    ///
    /// Returns the number of chunks stored. The collection must be empty;
    /// call [`reset`](Self::reset) first to re-index.
    pub fn index_document(&mut self) -> Result<usize> {
        let existing = self.index.count()?;
        if existing > 0 {
            self.check_embedding_signature(existing)?;
            return Err(Error::IndexNotEmpty {
                collection: self.index.collection_name().to_string(),
                count: existing,
            });
        }

        self.state = PipelineState::Indexing;
        match self.run_indexing() {
            Ok(count) => {
                self.state = PipelineState::Ready;
                Ok(count)
            }
            Err(e) => {
                self.state = PipelineState::Unindexed;
                self.chunks.clear();
                error!(stage = e.stage(), error = %e, "indexing failed");
                Err(e)
            }
        }
    }

    fn run_indexing(&mut self) -> Result<usize> {
        let path = self.config.document_path.clone();

        info!(path = %path.display(), "extracting text");
        let text = self.reader.extract(&path)?;

        let chunks = self.splitter.split(&text);
        if chunks.is_empty() {
            return Err(Error::EmptyDocument { path });
        }
        info!(
            chunks = chunks.len(),
            chunk_size = self.splitter.chunk_size(),
            chunk_overlap = self.splitter.chunk_overlap(),
            "document split"
        );

        let ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();

        info!(model = self.embedder.model_name(), "embedding chunks");
        let vectors = self.embedder.embed_many(&texts)?;

        info!(
            collection = self.index.collection_name(),
            batch_size = self.config.batch_size,
            "storing vectors"
        );
        self.index
            .set_embedding_signature(&self.embedder.signature())?;
        self.index
            .upsert(&ids, &texts, &vectors, None, self.config.batch_size)?;

        self.chunks = chunks;
        info!(chunks = self.chunks.len(), "indexing complete");
        Ok(self.chunks.len())
    }

    /// Treat a collection that already holds entries as the index.
    ///
    /// Returns `true` when the pipeline moved to `Ready`. Only meaningful
    /// with a persistent index opened on an earlier run. Fails with
    /// [`Error::EmbeddingMismatch`] when the collection was built with a
    /// different embedding model or dimension.
    pub fn adopt_existing_index(&mut self) -> Result<bool> {
        let count = self.index.count()?;
        if count == 0 {
            return Ok(false);
        }
        self.check_embedding_signature(count)?;
        info!(
            collection = self.index.collection_name(),
            count, "using existing index"
        );
        self.state = PipelineState::Ready;
        Ok(true)
    }

    fn check_embedding_signature(&self, count: usize) -> Result<()> {
        let collection = self.index.collection_name();
        let current = self.embedder.signature();
        match self.index.embedding_signature()? {
            Some(stored) if stored == current => Ok(()),
            Some(stored) => {
                warn!(
                    collection,
                    stored = %stored,
                    current = %current,
                    "stored vectors come from another embedding model"
                );
                Err(Error::EmbeddingMismatch {
                    collection: collection.to_string(),
                    stored,
                    current,
                })
            }
            None => Err(Error::Config(format!(
                "collection '{collection}' holds {count} entries but no recorded embedding model; reset the collection and index again"
            ))),
        }
    }

    /// Empty the collection and return to `Unindexed`.
    pub fn reset(&mut self) -> Result<()> {
        self.index.reset()?;
        self.chunks.clear();
        self.state = PipelineState::Unindexed;
        info!(collection = self.index.collection_name(), "index reset");
        Ok(())
    }

    /// The `n_results` chunks closest to `question`.
    pub fn retrieve(
        &mut self,
        question: &str,
        n_results: usize,
    ) -> Result<Vec<RetrievalResult>> {
        if self.state != PipelineState::Ready {
            return Err(Error::PipelineNotIndexed);
        }
        if n_results == 0 {
            return Err(Error::Config(
                "n_results must be greater than zero".to_string(),
            ));
        }

        let vector = self.embedder.embed_one(question)?;
        let results = self.index.query(&vector, n_results)?;
        debug!(requested = n_results, found = results.len(), "retrieved chunks");
        Ok(results)
    }

    /// Answer `question` from the `n_results` closest chunks.
    pub fn query(
        &mut self,
        question: &str,
        n_results: usize,
    ) -> Result<QueryResponse> {
        let results = self.retrieve(question, n_results)?;

        let mut sources = Vec::with_capacity(results.len());
        let mut source_documents = Vec::with_capacity(results.len());
        let mut distances = Vec::with_capacity(results.len());
        for result in results {
            sources.push(result.chunk_id);
            source_documents.push(result.text);
            distances.push(result.distance);
        }

        let mode = if self.use_remote_generation {
            AnswerMode::Remote
        } else {
            AnswerMode::Local
        };
        let answer = self.composer.compose(question, &source_documents, mode);

        Ok(QueryResponse {
            question: question.to_string(),
            answer,
            sources,
            source_documents,
            distances,
        })
    }

    pub fn use_remote_generation(&self) -> bool {
        self.use_remote_generation
    }

    /// Request remote or local answers from the next query on.
    ///
    /// Returns the mode actually in effect: without a remote backend the
    /// pipeline stays local.
    pub fn set_use_remote_generation(&mut self, enabled: bool) -> bool {
        if enabled && !self.composer.remote_available() {
            warn!("remote generation requested but no credential is configured; answering locally");
        }
        self.use_remote_generation = enabled && self.composer.remote_available();
        self.use_remote_generation
    }

    pub fn get_stats(&self) -> Result<PipelineStats> {
        Ok(PipelineStats {
            document_path: self.config.document_path.clone(),
            collection_name: self.index.collection_name().to_string(),
            total_chunks: self.chunks.len(),
            vector_db_size: self.index.count()?,
            embedding_model: self.embedder.model_name().to_string(),
            embedding_dimension: self.embedder.dimension(),
            gemini_enabled: self.use_remote_generation,
        })
    }
}

impl std::fmt::Debug for RetrievalPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalPipeline")
            .field("document", &self.config.document_path)
            .field("collection", &self.index.collection_name())
            .field("state", &self.state)
            .field("chunks", &self.chunks.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::{
        embedding::{EmbeddingBackend, EmbeddingSignature},
        error::Result,
        generation::GenerationBackend,
        vector_index::IndexEntry,
    };

    struct FixedReader(&'static str);

    impl DocumentReader for FixedReader {
        fn extract(&self, _path: &Path) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct EchoBackend {
        calls: Rc<Cell<usize>>,
    }

    impl GenerationBackend for EchoBackend {
        fn name(&self) -> &str {
            "echo"
        }

        fn generate(&self, _prompt: &str) -> Result<String> {
            self.calls.set(self.calls.get() + 1);
            Ok("remote answer".to_string())
        }
    }

    /// Index that accepts the first `limit` entries and then fails.
    struct FailingIndex {
        inner: MemoryIndex,
        limit: usize,
    }

    impl VectorIndex for FailingIndex {
        fn backend_name(&self) -> &'static str {
            "failing"
        }

        fn collection_name(&self) -> &str {
            self.inner.collection_name()
        }

        fn upsert_batch(&mut self, entries: Vec<IndexEntry>) -> Result<()> {
            if self.inner.count()? + entries.len() > self.limit {
                return Err(Error::VectorIndex {
                    backend: "failing",
                    message: "disk full".to_string(),
                });
            }
            self.inner.upsert_batch(entries)
        }

        fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievalResult>> {
            self.inner.query(vector, k)
        }

        fn count(&self) -> Result<usize> {
            self.inner.count()
        }

        fn reset(&mut self) -> Result<()> {
            self.inner.reset()
        }

        fn embedding_signature(&self) -> Result<Option<EmbeddingSignature>> {
            self.inner.embedding_signature()
        }

        fn set_embedding_signature(
            &mut self,
            signature: &EmbeddingSignature,
        ) -> Result<()> {
            self.inner.set_embedding_signature(signature)
        }
    }

    /// Hash embedder reporting a different model name.
    struct RenamedHash(HashEmbedder);

    impl EmbeddingBackend for RenamedHash {
        fn model_name(&self) -> &str {
            "some-other-model"
        }

        fn encode(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.0.encode(texts)
        }
    }

    const TEXT: &str = "Metro lines reach the airport.\n\n\
                        Forests in the north are protected.\n\n\
                        Housing renewal targets old districts.";

    fn config() -> PipelineConfig {
        PipelineConfig {
            chunk_size: 50,
            chunk_overlap: 0,
            batch_size: 2,
            embedding_backend: EmbeddingBackendKind::Hash,
            ..PipelineConfig::for_document("plan.txt")
        }
    }

    fn pipeline_with(text: &'static str, composer: AnswerComposer) -> RetrievalPipeline {
        RetrievalPipeline::builder(config())
            .reader(Box::new(FixedReader(text)))
            .composer(composer)
            .build()
            .unwrap()
    }

    fn pipeline() -> RetrievalPipeline {
        pipeline_with(TEXT, AnswerComposer::local("Regional Plan"))
    }

    #[test]
    fn indexing_moves_to_ready() {
        let mut pipeline = pipeline();
        assert_eq!(pipeline.state(), PipelineState::Unindexed);

        assert_eq!(pipeline.index_document().unwrap(), 3);
        assert_eq!(pipeline.state(), PipelineState::Ready);

        let stats = pipeline.get_stats().unwrap();
        assert_eq!(stats.total_chunks, 3);
        assert_eq!(stats.vector_db_size, 3);
        assert_eq!(stats.embedding_dimension, 384);
        assert_eq!(stats.collection_name, "istanbul_bolge_plani");
    }

    #[test]
    fn query_returns_aligned_sources() {
        let mut pipeline = pipeline();
        pipeline.index_document().unwrap();

        let response = pipeline.query("metro airport", 2).unwrap();
        assert_eq!(response.sources.len(), 2);
        assert_eq!(response.source_documents.len(), 2);
        assert_eq!(response.sources[0], "chunk_0");
        assert_eq!(response.source_documents[0], "Metro lines reach the airport.");
        assert!(response.distances[0] <= response.distances[1]);
        assert!(response.answer.contains("Metro lines reach the airport."));
    }

    #[test]
    fn query_before_indexing_fails() {
        let mut pipeline = pipeline();
        assert!(matches!(
            pipeline.query("anything", 3),
            Err(Error::PipelineNotIndexed)
        ));
    }

    #[test]
    fn zero_results_is_config_error() {
        let mut pipeline = pipeline();
        pipeline.index_document().unwrap();
        assert!(matches!(pipeline.query("q", 0), Err(Error::Config(_))));
    }

    #[test]
    fn blank_document_is_empty_document() {
        let mut pipeline =
            pipeline_with("  \n\n  ", AnswerComposer::local("Regional Plan"));
        let err = pipeline.index_document().unwrap_err();
        assert!(matches!(err, Error::EmptyDocument { .. }));
        assert_eq!(err.stage(), "chunk");
        assert_eq!(pipeline.state(), PipelineState::Unindexed);
    }

    #[test]
    fn reindex_requires_reset() {
        let mut pipeline = pipeline();
        pipeline.index_document().unwrap();

        let err = pipeline.index_document().unwrap_err();
        assert!(matches!(err, Error::IndexNotEmpty { count: 3, .. }));
        // The existing index stays usable.
        assert_eq!(pipeline.state(), PipelineState::Ready);

        pipeline.reset().unwrap();
        assert_eq!(pipeline.state(), PipelineState::Unindexed);
        assert_eq!(pipeline.get_stats().unwrap().vector_db_size, 0);
        assert_eq!(pipeline.index_document().unwrap(), 3);
    }

    #[test]
    fn storage_failure_returns_to_unindexed() {
        let mut pipeline = RetrievalPipeline::builder(config())
            .reader(Box::new(FixedReader(TEXT)))
            .index(Box::new(FailingIndex {
                inner: MemoryIndex::new("plan"),
                limit: 2,
            }))
            .composer(AnswerComposer::local("Regional Plan"))
            .build()
            .unwrap();

        let err = pipeline.index_document().unwrap_err();
        assert!(err.to_string().contains("disk full"));
        assert_eq!(pipeline.state(), PipelineState::Unindexed);
        assert!(pipeline.chunks().is_empty());

        // The first batch was written; a retry needs a reset.
        let stats = pipeline.get_stats().unwrap();
        assert_eq!(stats.total_chunks, 0);
        assert_eq!(stats.vector_db_size, 2);
        assert!(matches!(
            pipeline.index_document(),
            Err(Error::IndexNotEmpty { .. })
        ));
    }

    fn hash_signature() -> EmbeddingSignature {
        EmbeddingSignature {
            model_name: "hash-embedder-384".to_string(),
            dimension: 384,
            normalized: true,
        }
    }

    #[test]
    fn adopt_existing_index_needs_entries() {
        let mut index = MemoryIndex::new("plan");
        index.set_embedding_signature(&hash_signature()).unwrap();
        index
            .upsert(
                &["chunk_0".to_string()],
                &["Metro lines reach the airport.".to_string()],
                &[HashEmbedder::default().embed("Metro lines reach the airport.")],
                None,
                10,
            )
            .unwrap();

        let mut adopted = RetrievalPipeline::builder(config())
            .reader(Box::new(FixedReader(TEXT)))
            .index(Box::new(index))
            .composer(AnswerComposer::local("Regional Plan"))
            .build()
            .unwrap();
        assert!(adopted.adopt_existing_index().unwrap());
        assert_eq!(adopted.state(), PipelineState::Ready);
        assert_eq!(adopted.query("metro", 3).unwrap().sources, ["chunk_0"]);

        let mut empty = pipeline();
        assert!(!empty.adopt_existing_index().unwrap());
        assert_eq!(empty.state(), PipelineState::Unindexed);
    }

    /// Pipeline over a copy of an indexed collection, embedding with
    /// `backend`.
    fn reopened_with(backend: Box<dyn EmbeddingBackend>) -> RetrievalPipeline {
        let mut indexed = pipeline();
        indexed.index_document().unwrap();
        let mut index = MemoryIndex::new("plan");
        index
            .set_embedding_signature(&indexed.embedder.signature())
            .unwrap();
        let ids: Vec<String> =
            indexed.chunks().iter().map(|c| c.id.clone()).collect();
        let texts: Vec<String> =
            indexed.chunks().iter().map(|c| c.text.clone()).collect();
        let vectors = indexed.embedder.embed_many(&texts).unwrap();
        index.upsert(&ids, &texts, &vectors, None, 10).unwrap();

        RetrievalPipeline::builder(config())
            .reader(Box::new(FixedReader(TEXT)))
            .embedder(EmbeddingProvider::new(backend).unwrap())
            .index(Box::new(index))
            .composer(AnswerComposer::local("Regional Plan"))
            .build()
            .unwrap()
    }

    #[test]
    fn indexing_records_embedding_signature() {
        let mut pipeline = pipeline();
        pipeline.index_document().unwrap();
        assert_eq!(
            pipeline.index.embedding_signature().unwrap(),
            Some(hash_signature())
        );

        pipeline.reset().unwrap();
        assert_eq!(pipeline.index.embedding_signature().unwrap(), None);
    }

    #[test]
    fn adopt_rejects_other_model_with_same_dimension() {
        let mut pipeline =
            reopened_with(Box::new(RenamedHash(HashEmbedder::default())));
        assert_eq!(pipeline.embedder.dimension(), 384);

        let err = pipeline.adopt_existing_index().unwrap_err();
        match &err {
            Error::EmbeddingMismatch {
                collection,
                stored,
                current,
            } => {
                assert_eq!(collection, "plan");
                assert_eq!(stored, &hash_signature());
                assert_eq!(current.model_name, "some-other-model");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(pipeline.state(), PipelineState::Unindexed);
        assert!(matches!(
            pipeline.query("forests", 1),
            Err(Error::PipelineNotIndexed)
        ));
    }

    #[test]
    fn adopt_rejects_other_dimension() {
        let mut pipeline = reopened_with(Box::new(HashEmbedder::new(64)));
        let err = pipeline.adopt_existing_index().unwrap_err();
        assert!(matches!(
            err,
            Error::EmbeddingMismatch { ref current, .. } if current.dimension == 64
        ));
    }

    #[test]
    fn reindex_reports_model_mismatch_before_non_empty() {
        let mut pipeline =
            reopened_with(Box::new(RenamedHash(HashEmbedder::default())));
        assert!(matches!(
            pipeline.index_document(),
            Err(Error::EmbeddingMismatch { .. })
        ));

        pipeline.reset().unwrap();
        assert_eq!(pipeline.index_document().unwrap(), 3);
        assert!(pipeline.adopt_existing_index().unwrap());
    }

    #[test]
    fn adopt_rejects_unrecorded_signature() {
        let mut index = MemoryIndex::new("plan");
        index
            .upsert(
                &["chunk_0".to_string()],
                &["Metro lines reach the airport.".to_string()],
                &[HashEmbedder::default().embed("Metro lines reach the airport.")],
                None,
                10,
            )
            .unwrap();
        let mut pipeline = RetrievalPipeline::builder(config())
            .reader(Box::new(FixedReader(TEXT)))
            .index(Box::new(index))
            .composer(AnswerComposer::local("Regional Plan"))
            .build()
            .unwrap();

        let err = pipeline.adopt_existing_index().unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("reset")));
    }

    #[test]
    fn remote_toggle_applies_to_next_query() {
        let calls = Rc::new(Cell::new(0));
        let composer = AnswerComposer::with_backend(
            "Regional Plan",
            Box::new(EchoBackend {
                calls: Rc::clone(&calls),
            }),
        );
        let mut pipeline = pipeline_with(TEXT, composer);
        pipeline.index_document().unwrap();
        assert!(!pipeline.use_remote_generation());

        assert!(pipeline.set_use_remote_generation(true));
        assert_eq!(pipeline.query("metro", 1).unwrap().answer, "remote answer");
        assert_eq!(calls.get(), 1);
        assert!(pipeline.get_stats().unwrap().gemini_enabled);

        pipeline.set_use_remote_generation(false);
        assert_ne!(pipeline.query("metro", 1).unwrap().answer, "remote answer");
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn remote_stays_off_without_backend() {
        let mut pipeline = pipeline();
        assert!(!pipeline.set_use_remote_generation(true));
        assert!(!pipeline.get_stats().unwrap().gemini_enabled);
    }
}
