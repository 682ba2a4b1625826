use candle_core::{Device, Module, Tensor};
use candle_nn::{Linear, VarBuilder};

use crate::config::HybridModelConfig;
use crate::model::attention::AttentionPool;
use crate::model::fusion::GatedFusion;
use crate::model::layers::{batch_norm_1d, BatchNorm1d};
use crate::model::lstm::BiLstm;

/// The full session classifier: gated feature fusion, a masked bidirectional
/// LSTM, attention pooling and a two-layer head.
///
/// Parameter names follow the training checkpoint layout (`fusion.*`,
/// `lstm.*`, `attention.*`, `classifier.*`). The train-time dropout modules
/// own no parameters and are identity at inference, so they have no
/// counterpart here.
pub(crate) struct HybridClassifier {
    fusion: GatedFusion,
    lstm: BiLstm,
    attention: AttentionPool,
    fc1: Linear,
    norm: BatchNorm1d,
    fc2: Linear,
}

impl HybridClassifier {
    pub(crate) fn load(cfg: &HybridModelConfig, vb: VarBuilder) -> candle_core::Result<Self> {
        let head = vb.pp("classifier");
        Ok(Self {
            fusion: GatedFusion::load(cfg, vb.pp("fusion"))?,
            lstm: BiLstm::load(cfg, vb.pp("lstm"))?,
            attention: AttentionPool::load(cfg, vb.pp("attention"))?,
            fc1: candle_nn::linear(cfg.encoder_out_dim(), cfg.classifier_hidden, head.pp("0"))?,
            norm: batch_norm_1d(cfg.classifier_hidden, cfg.batch_norm_eps, head.pp("1"))?,
            fc2: candle_nn::linear(cfg.classifier_hidden, cfg.num_classes, head.pp("4"))?,
        })
    }

    /// Runs a batch of padded sessions.
    ///
    /// `text_embeds` is `[batch, time, embed_dim]`, `features` is
    /// `[batch, time, feature_dim]` and `lengths` holds each session's true
    /// line count. Returns `[batch, num_classes]` logits and the
    /// `[batch, time]` attention weights.
    pub(crate) fn forward(
        &self,
        text_embeds: &Tensor,
        features: &Tensor,
        lengths: &[usize],
    ) -> candle_core::Result<(Tensor, Tensor)> {
        let (batch, time, _embed) = text_embeds.dims3()?;
        if lengths.len() != batch {
            return Err(candle_core::Error::Msg(format!(
                "got {} session lengths for a batch of {batch}",
                lengths.len()
            )));
        }
        let mask = validity_mask(lengths, time, text_embeds.device())?;

        let fused = self.fusion.forward(text_embeds, features)?;
        let encoded = self.lstm.forward(&fused, &mask)?;
        let (pooled, weights) = self.attention.forward(&encoded, &mask)?;

        let hidden = self.norm.forward(&self.fc1.forward(&pooled)?)?.relu()?;
        let logits = self.fc2.forward(&hidden)?;
        Ok((logits, weights))
    }
}

/// `[batch, time]` mask with 1.0 at positions before each session's length.
fn validity_mask(
    lengths: &[usize],
    time: usize,
    device: &Device,
) -> candle_core::Result<Tensor> {
    let mut data = Vec::with_capacity(lengths.len() * time);
    for &len in lengths {
        for t in 0..time {
            data.push(if t < len { 1.0f32 } else { 0.0 });
        }
    }
    Tensor::from_vec(data, (lengths.len(), time), device)
}
