use candle_core::{Module, Tensor, D};
use candle_nn::{Linear, VarBuilder};

use crate::config::HybridModelConfig;

/// Additive score forced onto padded positions before the softmax; large
/// enough that their weight underflows to exactly zero in f32.
const PAD_SCORE: f64 = -1e9;

/// Attention-weighted pooling over a masked sequence.
///
/// Scores come from a small feed-forward network (linear, tanh, linear to
/// scalar); padded positions are pushed to [`PAD_SCORE`] so the softmax over
/// the time axis distributes all mass across valid positions.
pub(crate) struct AttentionPool {
    score_in: Linear,
    score_out: Linear,
}

impl AttentionPool {
    pub(crate) fn load(cfg: &HybridModelConfig, vb: VarBuilder) -> candle_core::Result<Self> {
        Ok(Self {
            score_in: candle_nn::linear(
                cfg.encoder_out_dim(),
                cfg.attention_hidden,
                vb.pp("0"),
            )?,
            score_out: candle_nn::linear(cfg.attention_hidden, 1, vb.pp("2"))?,
        })
    }

    /// `xs` is `[batch, time, width]` with zeroed padding, `mask` is
    /// `[batch, time]`. Returns the `[batch, width]` pooled vectors and the
    /// `[batch, time]` attention weights.
    ///
    /// Weights over each session's valid positions sum to 1. The pooled sum
    /// sees no padding contribution: padded weights underflow to zero and the
    /// encoder output at padded positions is itself zero.
    pub(crate) fn forward(
        &self,
        xs: &Tensor,
        mask: &Tensor,
    ) -> candle_core::Result<(Tensor, Tensor)> {
        let scores = self
            .score_out
            .forward(&self.score_in.forward(xs)?.tanh()?)?
            .squeeze(D::Minus1)?;
        let pad_penalty = mask.affine(-1.0, 1.0)?.affine(PAD_SCORE, 0.0)?;
        let masked = ((&scores * mask)? + pad_penalty)?;
        let weights = candle_nn::ops::softmax(&masked, D::Minus1)?;
        let pooled = xs.broadcast_mul(&weights.unsqueeze(D::Minus1)?)?.sum(1)?;
        Ok((pooled, weights))
    }
}

#[cfg(test)]
mod tests {
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    use super::*;

    fn pool_with_zero_weights(device: &Device) -> AttentionPool {
        let cfg = HybridModelConfig {
            lstm_hidden: 2,
            attention_hidden: 3,
            ..HybridModelConfig::default()
        };
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        AttentionPool::load(&cfg, vb).expect("load")
    }

    #[test]
    fn weights_sum_to_one_over_valid_positions() {
        let device = Device::Cpu;
        let pool = pool_with_zero_weights(&device);
        let xs = Tensor::from_vec(
            (0..20).map(|v| v as f32).collect::<Vec<_>>(),
            (1, 5, 4),
            &device,
        )
        .unwrap();
        let mask = Tensor::from_vec(vec![1.0f32, 1.0, 1.0, 0.0, 0.0], (1, 5), &device).unwrap();

        let (_pooled, weights) = pool.forward(&xs, &mask).expect("forward");
        let weights: Vec<Vec<f32>> = weights.to_vec2().unwrap();
        let total: f32 = weights[0].iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert_eq!(weights[0][3], 0.0);
        assert_eq!(weights[0][4], 0.0);
        // equal scores over three valid positions -> uniform thirds
        for t in 0..3 {
            assert!((weights[0][t] - 1.0 / 3.0).abs() < 1e-5);
        }
    }

    #[test]
    fn pooled_vector_ignores_padded_positions() {
        let device = Device::Cpu;
        let pool = pool_with_zero_weights(&device);
        // valid rows are identical; padded row is extreme garbage that must
        // not leak into the pooled average
        let xs = Tensor::from_vec(
            vec![
                1.0f32, 2.0, 3.0, 4.0, //
                1.0, 2.0, 3.0, 4.0, //
                1e6, -1e6, 1e6, -1e6,
            ],
            (1, 3, 4),
            &device,
        )
        .unwrap();
        let mask = Tensor::from_vec(vec![1.0f32, 1.0, 0.0], (1, 3), &device).unwrap();

        let (pooled, _weights) = pool.forward(&xs, &mask).expect("forward");
        let pooled: Vec<Vec<f32>> = pooled.to_vec2().unwrap();
        let expected = [1.0f32, 2.0, 3.0, 4.0];
        for (value, want) in pooled[0].iter().zip(expected) {
            assert!((value - want).abs() < 1e-4);
        }
    }
}
