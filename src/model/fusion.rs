use candle_core::{Module, Tensor, D};
use candle_nn::{Linear, VarBuilder};

use crate::config::HybridModelConfig;
use crate::model::layers::{layer_norm, LayerNorm};

/// Learned per-dimension mixing of text embeddings with projected linguistic
/// feature vectors: `gate * text + (1 - gate) * features`, followed by layer
/// normalization.
pub(crate) struct GatedFusion {
    feat_proj: Linear,
    gate: Linear,
    norm: LayerNorm,
}

impl GatedFusion {
    pub(crate) fn load(cfg: &HybridModelConfig, vb: VarBuilder) -> candle_core::Result<Self> {
        Ok(Self {
            feat_proj: candle_nn::linear(cfg.feature_dim, cfg.embed_dim, vb.pp("feat_proj"))?,
            gate: candle_nn::linear(2 * cfg.embed_dim, cfg.embed_dim, vb.pp("gate").pp("0"))?,
            norm: layer_norm(cfg.embed_dim, cfg.layer_norm_eps, vb.pp("norm"))?,
        })
    }

    /// `text_embeds` is `[batch, time, embed_dim]`, `features` is
    /// `[batch, time, feature_dim]`; the result keeps the text shape.
    pub(crate) fn forward(
        &self,
        text_embeds: &Tensor,
        features: &Tensor,
    ) -> candle_core::Result<Tensor> {
        let feat_embeds = self.feat_proj.forward(features)?.relu()?;
        let combined = Tensor::cat(&[text_embeds, &feat_embeds], D::Minus1)?;
        let gate = candle_nn::ops::sigmoid(&self.gate.forward(&combined)?)?;
        let inverse = gate.affine(-1.0, 1.0)?;
        let fused = ((&gate * text_embeds)? + (&inverse * &feat_embeds)?)?;
        self.norm.forward(&fused)
    }
}
