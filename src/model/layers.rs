use candle_core::{Tensor, D};
use candle_nn::VarBuilder;

pub(crate) struct LayerNorm {
    weight: Tensor,
    bias: Tensor,
    eps: f64,
}

impl LayerNorm {
    pub(crate) fn load(size: usize, eps: f64, vb: VarBuilder) -> candle_core::Result<Self> {
        let weight = vb.get(size, "weight")?;
        let bias = vb.get(size, "bias")?;
        Ok(Self { weight, bias, eps })
    }

    pub(crate) fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let hidden = self.weight.dim(0)? as f64;
        let mean = (x.sum_keepdim(D::Minus1)? / hidden)?;
        let centered = x.broadcast_sub(&mean)?;
        let var = (centered.sqr()?.sum_keepdim(D::Minus1)? / hidden)?;
        let normed = centered.broadcast_div(&(var + self.eps)?.sqrt()?)?;
        normed.broadcast_mul(&self.weight)?.broadcast_add(&self.bias)
    }
}

pub(crate) fn layer_norm(size: usize, eps: f64, vb: VarBuilder) -> candle_core::Result<LayerNorm> {
    LayerNorm::load(size, eps, vb)
}

/// Inference-mode batch normalization over `[batch, channels]` activations.
///
/// Mirrors PyTorch `BatchNorm1d.eval()`: statistics come from the stored
/// running estimates, never from the batch.
pub(crate) struct BatchNorm1d {
    weight: Tensor,
    bias: Tensor,
    running_mean: Tensor,
    running_var: Tensor,
    eps: f64,
}

impl BatchNorm1d {
    pub(crate) fn load(size: usize, eps: f64, vb: VarBuilder) -> candle_core::Result<Self> {
        let weight = vb.get(size, "weight")?;
        let bias = vb.get(size, "bias")?;
        let running_mean = vb.get(size, "running_mean")?;
        let running_var = vb.get(size, "running_var")?;
        Ok(Self {
            weight,
            bias,
            running_mean,
            running_var,
            eps,
        })
    }

    pub(crate) fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let denom = (&self.running_var + self.eps)?.sqrt()?;
        x.broadcast_sub(&self.running_mean)?
            .broadcast_div(&denom)?
            .broadcast_mul(&self.weight)?
            .broadcast_add(&self.bias)
    }
}

pub(crate) fn batch_norm_1d(
    size: usize,
    eps: f64,
    vb: VarBuilder,
) -> candle_core::Result<BatchNorm1d> {
    BatchNorm1d::load(size, eps, vb)
}

#[cfg(test)]
mod tests {
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    use super::*;

    #[test]
    fn batch_norm_with_identity_stats_passes_through() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        // weight/bias/running stats all start at zero under a fresh varmap,
        // so the output must collapse to the bias regardless of input.
        let bn = batch_norm_1d(4, 1e-5, vb).expect("load batch norm");
        let x = Tensor::from_vec(vec![1.0f32, -2.0, 3.0, 0.5], (1, 4), &device).unwrap();
        let y = bn.forward(&x).expect("forward");
        let values: Vec<Vec<f32>> = y.to_vec2().unwrap();
        assert!(values[0].iter().all(|v| v.abs() < 1e-6));
    }

    #[test]
    fn layer_norm_zero_weight_zeroes_output() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let ln = layer_norm(3, 1e-5, vb).expect("load layer norm");
        let x = Tensor::from_vec(vec![1.0f32, 2.0, 3.0], (1, 3), &device).unwrap();
        let y = ln.forward(&x).expect("forward");
        let values: Vec<Vec<f32>> = y.to_vec2().unwrap();
        assert!(values[0].iter().all(|v| v.abs() < 1e-6));
    }
}
