use candle_core::{Device, Tensor};
use pylate_rs::ColBERT;
use tracing::info;

use crate::{
    embedding::EmbeddingBackend,
    error::{Error, Result},
};

pub const DEFAULT_MODEL_ID: &str = "lightonai/GTE-ModernColBERT-v1";

/// Select the best available compute device.
///
/// Uses CUDA when compiled with the `cuda` feature, Metal when compiled with
/// the `metal` feature, and falls back to CPU otherwise.
fn default_device() -> Device {
    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            return device;
        }
    }

    #[cfg(feature = "metal")]
    {
        if let Ok(device) = Device::new_metal(0) {
            return device;
        }
    }

    Device::Cpu
}

fn device_name(device: &Device) -> &'static str {
    match device {
        Device::Cpu => "cpu",
        Device::Cuda(_) => "cuda",
        Device::Metal(_) => "metal",
    }
}

fn unavailable(reason: String) -> Error {
    Error::EmbeddingUnavailable {
        stage: "model",
        reason,
    }
}

/// ColBERT model producing one dense vector per text.
///
/// Each text is encoded on its own, so the token matrix holds no batch
/// padding and every row takes part in the mean pool. Queries and chunks are both encoded in document mode so that a question
/// and an identical chunk map to the same vector.
pub struct ColbertBackend {
    model: Option<ColBERT>,
    model_id: String,
    device: &'static str,
}

impl ColbertBackend {
    /// The model is not loaded until the first call to `encode`.
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model: None,
            model_id: model_id.into(),
            device: device_name(&Device::Cpu),
        }
    }

    /// Returns `true` if the model has already been loaded into memory.
    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Ensures the model is loaded, downloading from HuggingFace Hub if needed.
    fn ensure_loaded(&mut self) -> Result<&mut ColBERT> {
        if self.model.is_none() {
            let device = default_device();
            self.device = device_name(&device);
            info!(model = %self.model_id, device = self.device, "loading embedding model");

            let colbert = TryInto::<ColBERT>::try_into(
                ColBERT::from(&self.model_id).with_device(device),
            )
            .map_err(|e| {
                unavailable(format!(
                    "failed to load model '{}': {e}",
                    self.model_id
                ))
            })?;
            self.model = Some(colbert);
        }

        self.model
            .as_mut()
            .ok_or_else(|| unavailable("model failed to load".to_string()))
    }
}

impl EmbeddingBackend for ColbertBackend {
    fn model_name(&self) -> &str {
        &self.model_id
    }

    fn device(&self) -> &str {
        self.device
    }

    fn encode(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.ensure_loaded()?;
        texts
            .iter()
            .map(|text| {
                // embeddings shape: [1, num_tokens, dimension]
                let embeddings = model
                    .encode(std::slice::from_ref(text), false)
                    .map_err(|e| unavailable(format!("encoding failed: {e}")))?;
                let (batch_size, _num_tokens, _dimension) =
                    embeddings.dims3().map_err(map_candle_err)?;
                if batch_size != 1 {
                    return Err(unavailable(format!(
                        "expected one embedding per text, got {batch_size}"
                    )));
                }

                let tokens = embeddings.get(0).map_err(map_candle_err)?;
                mean_pool(&tokens)
            })
            .collect()
    }
}

/// Average every token row of a `[tokens, dimension]` tensor.
fn mean_pool(tokens: &Tensor) -> Result<Vec<f32>> {
    tokens
        .mean(0)
        .and_then(|pooled| pooled.to_vec1::<f32>())
        .map_err(map_candle_err)
}

fn map_candle_err(e: candle_core::Error) -> Error {
    unavailable(format!("tensor operation failed: {e}"))
}
