use candle_core::{Tensor, D};
use candle_nn::VarBuilder;

use crate::config::HybridModelConfig;

/// One direction of one LSTM layer, holding PyTorch-layout parameters:
/// `weight_ih`/`weight_hh` stack the input, forget, cell and output gates
/// along the first axis.
struct LstmDirection {
    w_ih: Tensor,
    w_hh: Tensor,
    b_ih: Tensor,
    b_hh: Tensor,
    hidden: usize,
}

impl LstmDirection {
    fn load(
        input: usize,
        hidden: usize,
        layer: usize,
        reverse: bool,
        vb: &VarBuilder,
    ) -> candle_core::Result<Self> {
        let suffix = if reverse { "_reverse" } else { "" };
        Ok(Self {
            w_ih: vb.get((4 * hidden, input), &format!("weight_ih_l{layer}{suffix}"))?,
            w_hh: vb.get((4 * hidden, hidden), &format!("weight_hh_l{layer}{suffix}"))?,
            b_ih: vb.get(4 * hidden, &format!("bias_ih_l{layer}{suffix}"))?,
            b_hh: vb.get(4 * hidden, &format!("bias_hh_l{layer}{suffix}"))?,
            hidden,
        })
    }

    fn step(
        &self,
        x_t: &Tensor,
        h_prev: &Tensor,
        c_prev: &Tensor,
    ) -> candle_core::Result<(Tensor, Tensor)> {
        let gates = (x_t.matmul(&self.w_ih.t()?)? + h_prev.matmul(&self.w_hh.t()?)?)?
            .broadcast_add(&self.b_ih)?
            .broadcast_add(&self.b_hh)?;

        let i = candle_nn::ops::sigmoid(&gates.narrow(D::Minus1, 0, self.hidden)?)?;
        let f = candle_nn::ops::sigmoid(&gates.narrow(D::Minus1, self.hidden, self.hidden)?)?;
        let g = gates.narrow(D::Minus1, 2 * self.hidden, self.hidden)?.tanh()?;
        let o = candle_nn::ops::sigmoid(&gates.narrow(D::Minus1, 3 * self.hidden, self.hidden)?)?;

        let c_next = ((&f * c_prev)? + (&i * &g)?)?;
        let h_next = (&o * &c_next.tanh()?)?;
        Ok((h_next, c_next))
    }

    /// Runs the direction over a padded `[batch, time, input]` sequence.
    ///
    /// `mask` is `[batch, time]` with 1.0 at valid positions. A padded step
    /// holds the previous state and emits zeros, so states never pick up
    /// padding and the backward direction effectively starts at each
    /// session's last valid line.
    fn run(&self, xs: &Tensor, mask: &Tensor, reverse: bool) -> candle_core::Result<Tensor> {
        let (batch, time, _input) = xs.dims3()?;
        let mut h = Tensor::zeros((batch, self.hidden), xs.dtype(), xs.device())?;
        let mut c = h.clone();
        let mut outputs = Vec::with_capacity(time);

        let steps: Vec<usize> = if reverse {
            (0..time).rev().collect()
        } else {
            (0..time).collect()
        };
        for t in steps {
            let x_t = xs.narrow(1, t, 1)?.squeeze(1)?;
            let m_t = mask.narrow(1, t, 1)?;
            let keep = m_t.affine(-1.0, 1.0)?;

            let (h_next, c_next) = self.step(&x_t, &h, &c)?;
            h = (h_next.broadcast_mul(&m_t)? + h.broadcast_mul(&keep)?)?;
            c = (c_next.broadcast_mul(&m_t)? + c.broadcast_mul(&keep)?)?;
            outputs.push(h.broadcast_mul(&m_t)?);
        }
        if reverse {
            outputs.reverse();
        }
        Tensor::stack(&outputs, 1)
    }
}

/// Stacked bidirectional LSTM with an explicit validity mask, mirroring
/// PyTorch `nn.LSTM(bidirectional=True)` run over packed sequences. Output
/// width per position is `2 * hidden`; padded positions are exactly zero.
pub(crate) struct BiLstm {
    layers: Vec<(LstmDirection, LstmDirection)>,
}

impl BiLstm {
    pub(crate) fn load(cfg: &HybridModelConfig, vb: VarBuilder) -> candle_core::Result<Self> {
        let mut layers = Vec::with_capacity(cfg.lstm_layers);
        for layer in 0..cfg.lstm_layers {
            let input = if layer == 0 {
                cfg.embed_dim
            } else {
                cfg.encoder_out_dim()
            };
            let forward = LstmDirection::load(input, cfg.lstm_hidden, layer, false, &vb)?;
            let backward = LstmDirection::load(input, cfg.lstm_hidden, layer, true, &vb)?;
            layers.push((forward, backward));
        }
        Ok(Self { layers })
    }

    pub(crate) fn forward(&self, xs: &Tensor, mask: &Tensor) -> candle_core::Result<Tensor> {
        let mut hidden = xs.clone();
        for (forward, backward) in &self.layers {
            let fwd = forward.run(&hidden, mask, false)?;
            let bwd = backward.run(&hidden, mask, true)?;
            hidden = Tensor::cat(&[&fwd, &bwd], D::Minus1)?;
        }
        Ok(hidden)
    }
}
