//! planrag - question answering over a regional planning document.
//!
//! planrag splits a document into overlapping chunks, embeds them with a
//! [ColBERT](https://github.com/stanford-futuredata/ColBERT) model (or an
//! offline hashing embedder), stores the vectors in a named collection and
//! answers questions from the nearest chunks. Answers come from Google
//! Gemini when a `GEMINI_API_KEY` is available, and from a local excerpt of
//! the retrieved passages otherwise or whenever the remote call fails.
//!
//! # Quick start
//!
//! ```no_run
//! use planrag::{DataDir, PipelineConfig, RedbIndex, RetrievalPipeline};
//!
//! let data_dir = DataDir::resolve(None).unwrap();
//! let config = PipelineConfig::for_document("Data/plan.pdf");
//! let index =
//!     RedbIndex::open(&data_dir.vectors_db(), &config.collection_name).unwrap();
//!
//! let mut pipeline = RetrievalPipeline::builder(config)
//!     .index(Box::new(index))
//!     .build()
//!     .unwrap();
//! if !pipeline.adopt_existing_index().unwrap() {
//!     pipeline.index_document().unwrap();
//! }
//!
//! let response = pipeline.query("What are the transportation plans?", 3).unwrap();
//! println!("{}", response.answer);
//! for (source, distance) in response.sources.iter().zip(&response.distances) {
//!     println!("{source} ({distance:.3})");
//! }
//! ```

pub mod chunking;
pub mod composer;
pub mod config;
pub mod data_dir;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod hash_embedder;
pub mod model_manager;
pub mod pipeline;
pub mod transcript;
pub mod vector_db;
pub mod vector_index;

pub use composer::{AnswerComposer, AnswerMode};
pub use config::PipelineConfig;
pub use data_dir::DataDir;
pub use embedding::EmbeddingProvider;
pub use error::{Error, Result};
pub use hash_embedder::HashEmbedder;
pub use model_manager::ColbertBackend;
pub use pipeline::{PipelineState, RetrievalPipeline};
pub use vector_db::RedbIndex;
pub use vector_index::{MemoryIndex, VectorIndex};
