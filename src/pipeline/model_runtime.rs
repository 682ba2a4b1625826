use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;

use crate::config::{HybridModelConfig, ScreenerConfig};
use crate::error::ScreenError;
use crate::model::hybrid::HybridClassifier;
use crate::pipeline::traits::{ModelBackend, SessionInference};
use crate::types::FEATURE_DIM;

pub(crate) fn select_device(device: &str) -> Result<Device, ScreenError> {
    match device {
        "cuda" => Device::new_cuda(0).map_err(|e| ScreenError::runtime("CUDA init", e)),
        _ => Ok(Device::Cpu),
    }
}

/// Candle-backed session classifier loaded from a safetensors checkpoint.
pub(crate) struct CandleModelBackend {
    model: HybridClassifier,
    model_cfg: HybridModelConfig,
    device: Device,
}

impl CandleModelBackend {
    pub(crate) fn load(
        config: &ScreenerConfig,
        model_cfg: &HybridModelConfig,
    ) -> Result<Self, ScreenError> {
        let device = select_device(&config.device)?;
        let model_data = std::fs::read(&config.model_path)
            .map_err(|e| ScreenError::io("read model safetensors", e))?;
        let vb = VarBuilder::from_buffered_safetensors(model_data, DType::F32, &device)
            .map_err(|e| ScreenError::runtime("load model safetensors", e))?;
        let model = HybridClassifier::load(model_cfg, vb)
            .map_err(|e| ScreenError::runtime("build hybrid classifier", e))?;

        tracing::info!(
            embed_dim = model_cfg.embed_dim,
            lstm_hidden = model_cfg.lstm_hidden,
            lstm_layers = model_cfg.lstm_layers,
            ?device,
            "hybrid classifier loaded"
        );

        Ok(Self {
            model,
            model_cfg: model_cfg.clone(),
            device,
        })
    }
}

impl ModelBackend for CandleModelBackend {
    fn infer(
        &self,
        embeddings: &[Vec<f32>],
        features: &[[f32; FEATURE_DIM]],
    ) -> Result<SessionInference, ScreenError> {
        let lines = embeddings.len();
        if lines == 0 {
            return Err(ScreenError::invalid_input("cannot infer an empty session"));
        }
        if features.len() != lines {
            return Err(ScreenError::runtime(
                "session inference",
                format!("{lines} embeddings but {} feature vectors", features.len()),
            ));
        }
        let embed_dim = self.model_cfg.embed_dim;
        if embeddings.iter().any(|e| e.len() != embed_dim) {
            return Err(ScreenError::runtime(
                "session inference",
                format!("expected {embed_dim}-dim sentence embeddings"),
            ));
        }

        let flat_embeds: Vec<f32> = embeddings.iter().flatten().copied().collect();
        let text = Tensor::from_vec(flat_embeds, (1, lines, embed_dim), &self.device)
            .map_err(|e| ScreenError::runtime("embedding tensor creation", e))?;
        let flat_features: Vec<f32> = features.iter().flatten().copied().collect();
        let feats = Tensor::from_vec(flat_features, (1, lines, FEATURE_DIM), &self.device)
            .map_err(|e| ScreenError::runtime("feature tensor creation", e))?;

        let (logits, weights) = self
            .model
            .forward(&text, &feats, &[lines])
            .map_err(|e| ScreenError::runtime("forward pass", e))?;

        let logits: Vec<f32> = logits
            .squeeze(0)
            .and_then(|t| t.to_vec1())
            .map_err(|e| ScreenError::runtime("logits to host", e))?;
        let attention_scores: Vec<f32> = weights
            .squeeze(0)
            .and_then(|t| t.to_vec1())
            .map_err(|e| ScreenError::runtime("attention weights to host", e))?;

        Ok(SessionInference {
            logits,
            attention_scores,
        })
    }
}
