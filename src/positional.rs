//! Fixed sinusoidal positional encoding shared by the encoder and decoder.

use candle_core::{bail, Device, Result, Tensor};
use candle_nn::Dropout;

/// Injects position information into token embeddings.
///
/// The table is precomputed once at construction: row `p`, even column `2i`
/// holds `sin(p / 10000^(2i/d_model))` and odd column `2i+1` holds
/// `cos(p / 10000^(2i/d_model))`. The table is a fixed buffer, not a
/// trainable parameter, and is never registered with the `VarBuilder`.
#[derive(Debug)]
pub struct PositionalEncoding {
    table: Tensor,
    dropout: Dropout,
    max_len: usize,
}

impl PositionalEncoding {
    pub fn new(d_model: usize, dropout: f32, max_len: usize, device: &Device) -> Result<Self> {
        let mut data = Vec::with_capacity(max_len * d_model);
        for pos in 0..max_len {
            for col in 0..d_model {
                let exponent = (2 * (col / 2)) as f64 / d_model as f64;
                let angle = pos as f64 / 10000f64.powf(exponent);
                let value = if col % 2 == 0 { angle.sin() } else { angle.cos() };
                data.push(value as f32);
            }
        }
        let table = Tensor::from_vec(data, (max_len, d_model), device)?;

        Ok(Self {
            table,
            dropout: Dropout::new(dropout),
            max_len,
        })
    }

    /// Adds the first `seq_len` encoding rows to `x` and applies dropout.
    ///
    /// `x` is `[batch, seq_len, d_model]` and is never mutated; the sum is a
    /// fresh tensor. Sequences longer than the precomputed table are a caller
    /// contract violation and surface as an error.
    pub fn forward(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let (_batch, seq_len, _d_model) = x.dims3()?;
        if seq_len > self.max_len {
            bail!(
                "sequence length {} exceeds positional encoding capacity {}",
                seq_len,
                self.max_len
            );
        }

        let slice = self.table.narrow(0, 0, seq_len)?.unsqueeze(0)?;
        let encoded = x.broadcast_add(&slice)?;
        if train {
            self.dropout.forward(&encoded, train)
        } else {
            Ok(encoded)
        }
    }

    /// Read-only view of the precomputed table.
    pub fn table(&self) -> &Tensor {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    #[test]
    fn table_matches_closed_form() {
        let device = Device::Cpu;
        let pe = PositionalEncoding::new(4, 0.0, 8, &device).unwrap();
        let table = pe.table().to_vec2::<f32>().unwrap();

        // Position zero is sin(0) = 0 in even columns, cos(0) = 1 in odd ones.
        assert_eq!(table[0], vec![0.0, 1.0, 0.0, 1.0]);

        let expected_sin = (1.0f64 / 10000f64.powf(2.0 / 4.0)).sin() as f32;
        let expected_cos = (1.0f64 / 10000f64.powf(2.0 / 4.0)).cos() as f32;
        assert!((table[1][0] - 1.0f32.sin()).abs() < 1e-6);
        assert!((table[1][1] - 1.0f32.cos()).abs() < 1e-6);
        assert!((table[1][2] - expected_sin).abs() < 1e-6);
        assert!((table[1][3] - expected_cos).abs() < 1e-6);
    }

    #[test]
    fn table_is_deterministic() {
        let device = Device::Cpu;
        let first = PositionalEncoding::new(16, 0.1, 32, &device).unwrap();
        let second = PositionalEncoding::new(16, 0.1, 32, &device).unwrap();

        let lhs = first.table().to_vec2::<f32>().unwrap();
        let rhs = second.table().to_vec2::<f32>().unwrap();
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn forward_adds_encoding_without_mutating_input() {
        let device = Device::Cpu;
        let pe = PositionalEncoding::new(4, 0.0, 8, &device).unwrap();
        let x = Tensor::zeros((2, 3, 4), DType::F32, &device).unwrap();

        let out = pe.forward(&x, false).unwrap();

        assert_eq!(out.dims(), &[2, 3, 4]);
        let expected = pe.table().narrow(0, 0, 3).unwrap().to_vec2::<f32>().unwrap();
        let got = out.to_vec3::<f32>().unwrap();
        for batch in &got {
            for (row, want) in batch.iter().zip(expected.iter()) {
                assert_eq!(row, want);
            }
        }
        // The input buffer stays untouched.
        let still_zero = x.to_vec3::<f32>().unwrap();
        assert!(still_zero.iter().flatten().flatten().all(|&v| v == 0.0));
    }

    #[test]
    fn forward_rejects_sequences_beyond_capacity() {
        let device = Device::Cpu;
        let pe = PositionalEncoding::new(4, 0.0, 2, &device).unwrap();
        let x = Tensor::zeros((1, 3, 4), DType::F32, &device).unwrap();
        assert!(pe.forward(&x, false).is_err());
    }
}
