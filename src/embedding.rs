//! Dense text embeddings with a fixed, discovered dimension.
//!
//! An [`EmbeddingBackend`] is the raw model runtime. [`EmbeddingProvider`]
//! wraps one and guarantees what the rest of the pipeline relies on: every
//! vector is unit length and every vector has the dimension discovered when
//! the provider was created.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{Error, Result};

/// Text used to discover the model's output dimension.
const SAMPLE_TEXT: &str = "test";

/// A model runtime that maps texts to vectors, one per input, in order.
pub trait EmbeddingBackend {
    /// Name of the model, as shown in statistics.
    fn model_name(&self) -> &str;

    /// Device the model runs on.
    fn device(&self) -> &str {
        "cpu"
    }

    fn encode(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Summary of the embedding configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub model_name: String,
    pub embedding_dimension: usize,
    pub device: String,
    pub normalization: bool,
}

/// The embedding configuration a stored collection was built with.
///
/// Vectors are only comparable with vectors from an identical signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingSignature {
    pub model_name: String,
    pub dimension: usize,
    pub normalized: bool,
}

impl std::fmt::Display for EmbeddingSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' (dimension {}", self.model_name, self.dimension)?;
        if !self.normalized {
            write!(f, ", unnormalized")?;
        }
        write!(f, ")")
    }
}

pub struct EmbeddingProvider {
    backend: Box<dyn EmbeddingBackend>,
    dimension: usize,
    poisoned: bool,
}

impl EmbeddingProvider {
    /// Wrap a backend, encoding a sample text once to learn the vector dimension.
    pub fn new(backend: Box<dyn EmbeddingBackend>) -> Result<Self> {
        let mut provider = Self {
            backend,
            dimension: 0,
            poisoned: false,
        };

        let sample = provider.encode_normalized(&[SAMPLE_TEXT.to_string()], "startup")?;
        let dimension = sample.first().map(Vec::len).unwrap_or(0);
        if dimension == 0 {
            return Err(Error::EmbeddingUnavailable {
                stage: "startup",
                reason: format!(
                    "model '{}' returned an empty vector for the sample text",
                    provider.backend.model_name()
                ),
            });
        }
        provider.dimension = dimension;

        info!(
            model = provider.backend.model_name(),
            dimension, "embedding model ready"
        );
        Ok(provider)
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn model_info(&self) -> ModelInfo {
        ModelInfo {
            model_name: self.backend.model_name().to_string(),
            embedding_dimension: self.dimension,
            device: self.backend.device().to_string(),
            normalization: true,
        }
    }

    pub fn signature(&self) -> EmbeddingSignature {
        EmbeddingSignature {
            model_name: self.backend.model_name().to_string(),
            dimension: self.dimension,
            normalized: true,
        }
    }

    /// Embed a single text, typically a question.
    pub fn embed_one(&mut self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_texts(&[text.to_string()], "query")?;
        vectors.pop().ok_or_else(|| Error::EmbeddingUnavailable {
            stage: "query",
            reason: "model returned no vector".to_string(),
        })
    }

    /// Embed texts in order, one vector per text.
    pub fn embed_many(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = texts.len(), "embedding batch");
        self.embed_texts(texts, "index")
    }

    fn embed_texts(
        &mut self,
        texts: &[String],
        stage: &'static str,
    ) -> Result<Vec<Vec<f32>>> {
        if self.poisoned {
            return Err(Error::Config(format!(
                "embedding provider for '{}' produced inconsistent dimensions and can no longer be used",
                self.backend.model_name()
            )));
        }

        let vectors = self.encode_normalized(texts, stage)?;
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            self.poisoned = true;
            error!(
                expected = self.dimension,
                actual = bad.len(),
                "embedding dimension changed"
            );
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }
        Ok(vectors)
    }

    fn encode_normalized(
        &mut self,
        texts: &[String],
        stage: &'static str,
    ) -> Result<Vec<Vec<f32>>> {
        let mut vectors = self.backend.encode(texts).map_err(|e| match e {
            Error::EmbeddingUnavailable { reason, .. } => {
                Error::EmbeddingUnavailable { stage, reason }
            }
            other => Error::EmbeddingUnavailable {
                stage,
                reason: other.to_string(),
            },
        })?;

        if vectors.len() != texts.len() {
            return Err(Error::EmbeddingUnavailable {
                stage,
                reason: format!(
                    "model returned {} vectors for {} inputs",
                    vectors.len(),
                    texts.len()
                ),
            });
        }

        for vector in &mut vectors {
            if !l2_normalize(vector) {
                return Err(Error::EmbeddingUnavailable {
                    stage,
                    reason: "model returned a zero or non-finite vector"
                        .to_string(),
                });
            }
        }
        Ok(vectors)
    }
}

impl std::fmt::Debug for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingProvider")
            .field("model", &self.backend.model_name())
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

/// Scale `vector` to unit length in place.
///
/// Returns `false` (leaving the vector untouched) when it has zero or
/// non-finite magnitude.
pub fn l2_normalize(vector: &mut [f32]) -> bool {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return false;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
    true
}

/// Cosine similarity between two vectors. Returns 0.0 if either vector has
/// zero magnitude.
///
/// # Examples
///
/// ```
/// use planrag::embedding::cosine_similarity;
///
/// assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
/// assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
