//! Pipeline configuration and environment resolution.
//!
//! A [`PipelineConfig`] is fixed when the pipeline is built. Only the
//! remote-generation toggle may change afterwards, and that lives on the
//! pipeline itself.

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Default number of entries written to the vector index per batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;

pub const DEFAULT_COLLECTION: &str = "istanbul_bolge_plani";
pub const DEFAULT_DOCUMENT_PATH: &str =
    "Data/2024-2028-İstanbul-bölge-planı-taslak.pdf";
pub const DEFAULT_DOCUMENT_TITLE: &str = "Istanbul Regional Plan 2024-2028";
pub const DEFAULT_GENERATION_MODEL: &str = "gemini-1.5-flash";

/// Remote calls that take longer than this fall back to local answers.
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(10);

pub const MODEL_ENV_VAR: &str = "PLANRAG_MODEL";
pub const API_KEY_ENV_VAR: &str = "GEMINI_API_KEY";

/// Which embedding runtime backs the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackendKind {
    /// ColBERT model loaded through pylate-rs, mean-pooled to one vector.
    Colbert,
    /// Offline feature-hashing embedder.
    Hash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub document_path: PathBuf,
    /// Human-readable name of the document, used in prompts.
    pub document_title: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub embedding_model_name: String,
    pub embedding_backend: EmbeddingBackendKind,
    pub collection_name: String,
    pub batch_size: usize,
    pub use_remote_generation: bool,
    pub generation_model: String,
    #[serde(with = "duration_secs")]
    pub generation_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            document_path: PathBuf::from(DEFAULT_DOCUMENT_PATH),
            document_title: DEFAULT_DOCUMENT_TITLE.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            embedding_model_name: crate::model_manager::DEFAULT_MODEL_ID
                .to_string(),
            embedding_backend: EmbeddingBackendKind::Colbert,
            collection_name: DEFAULT_COLLECTION.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            use_remote_generation: false,
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
        }
    }
}

impl PipelineConfig {
    /// Default configuration for `document_path`, with the embedding model
    /// taken from `PLANRAG_MODEL` when that variable is set.
    pub fn for_document(document_path: impl Into<PathBuf>) -> Self {
        let mut config = Self {
            document_path: document_path.into(),
            ..Self::default()
        };
        if let Ok(model) = std::env::var(MODEL_ENV_VAR)
            && !model.trim().is_empty()
        {
            config.embedding_model_name = model;
        }
        config
    }

    /// Check that the parameters can drive a pipeline.
    ///
    /// # Examples
    ///
    /// ```
    /// use planrag::config::PipelineConfig;
    ///
    /// let mut config = PipelineConfig::default();
    /// assert!(config.validate().is_ok());
    ///
    /// config.chunk_overlap = config.chunk_size;
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<()> {
        validate_chunking(self.chunk_size, self.chunk_overlap)?;
        if self.batch_size == 0 {
            return Err(Error::Config(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        if self.collection_name.trim().is_empty() {
            return Err(Error::Config(
                "collection_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn validate_chunking(
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<()> {
    if chunk_size == 0 {
        return Err(Error::Config(
            "chunk_size must be greater than zero".to_string(),
        ));
    }
    if chunk_overlap >= chunk_size {
        return Err(Error::Config(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Read the remote-generation credential once.
///
/// Returns `None` when the variable is unset or blank.
pub fn generation_api_key() -> Option<String> {
    std::env::var(API_KEY_ENV_VAR)
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
