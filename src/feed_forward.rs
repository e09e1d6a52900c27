//! Position-wise feed-forward sublayer.

use candle_core::{Result, Tensor};
use candle_nn::{Dropout, LayerNorm, Linear, Module, VarBuilder};

/// Two-layer transform with a residual connection and owned layer norm:
/// `LayerNorm(fc2(dropout(relu(fc1(x)))) + x)`.
#[derive(Debug)]
pub struct FeedForward {
    fc1: Linear,
    fc2: Linear,
    norm: LayerNorm,
    dropout: Dropout,
}

impl FeedForward {
    pub fn new(d_model: usize, feedforward_dim: usize, dropout: f32, vb: VarBuilder) -> Result<Self> {
        let fc1 = candle_nn::linear(d_model, feedforward_dim, vb.pp("fc1"))?;
        let fc2 = candle_nn::linear(feedforward_dim, d_model, vb.pp("fc2"))?;
        let norm = candle_nn::layer_norm(d_model, 1e-5, vb.pp("norm"))?;

        Ok(Self {
            fc1,
            fc2,
            norm,
            dropout: Dropout::new(dropout),
        })
    }

    pub fn forward(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let hidden = self.fc1.forward(x)?.relu()?;
        let hidden = if train {
            self.dropout.forward(&hidden, train)?
        } else {
            hidden
        };
        let projected = self.fc2.forward(&hidden)?;

        let residual = projected.add(x)?;
        self.norm.forward(&residual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::{VarBuilder, VarMap};

    #[test]
    fn forward_preserves_shape() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let ff = FeedForward::new(16, 64, 0.0, vb).unwrap();

        let x = Tensor::randn(0f32, 1.0, (3, 5, 16), &device).unwrap();
        let out = ff.forward(&x, false).unwrap();
        assert_eq!(out.dims(), x.dims());
    }

    #[test]
    fn training_mode_keeps_shape() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let ff = FeedForward::new(8, 32, 0.5, vb).unwrap();

        let x = Tensor::randn(0f32, 1.0, (2, 4, 8), &device).unwrap();
        let out = ff.forward(&x, true).unwrap();
        assert_eq!(out.dims(), x.dims());
    }
}
