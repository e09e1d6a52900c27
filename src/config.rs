use candle_core::{Error, Result};
use serde::Deserialize;

/// Hyperparameters for assembling the encoder-decoder transformer.
///
/// The struct deserializes from an external configuration object (JSON or
/// TOML); every field except the vocabulary sizes carries a default so a
/// minimal config only names the two vocabularies.
#[derive(Debug, Clone, Deserialize)]
pub struct TransformerConfig {
    /// Row count of the source-side embedding table.
    pub vocab_enc_size: usize,
    /// Row count of the target-side embedding table.
    pub vocab_dec_size: usize,
    /// Embedding/model width.
    #[serde(default = "default_d_model")]
    pub d_model: usize,
    /// Attention head count. Must divide `d_model`.
    #[serde(default = "default_nums_head")]
    pub nums_head: usize,
    /// Stack depth, shared by encoder and decoder.
    #[serde(default = "default_n_layers")]
    pub n_layers: usize,
    /// Dropout probability applied in positional encoding, attention and
    /// feed-forward sublayers.
    #[serde(default = "default_dropout")]
    pub dropout: f32,
    /// Hidden width of the feed-forward sublayer.
    #[serde(default = "default_feedforward_dim")]
    pub feedforward_dim: usize,
    /// Length of the precomputed positional-encoding table.
    #[serde(default = "default_max_len")]
    pub max_len: usize,
    /// Token id treated as padding when building attention masks.
    #[serde(default)]
    pub pad_token_id: u32,
}

fn default_d_model() -> usize {
    512
}

fn default_nums_head() -> usize {
    8
}

fn default_n_layers() -> usize {
    6
}

fn default_dropout() -> f32 {
    0.1
}

fn default_feedforward_dim() -> usize {
    2048
}

fn default_max_len() -> usize {
    5000
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            vocab_enc_size: 32000,
            vocab_dec_size: 32000,
            d_model: default_d_model(),
            nums_head: default_nums_head(),
            n_layers: default_n_layers(),
            dropout: default_dropout(),
            feedforward_dim: default_feedforward_dim(),
            max_len: default_max_len(),
            pad_token_id: 0,
        }
    }
}

impl TransformerConfig {
    /// Width of a single attention head.
    pub fn head_dim(&self) -> usize {
        self.d_model / self.nums_head
    }

    /// Validate structural invariants before any tensor is allocated.
    pub fn validate(&self) -> Result<()> {
        if self.vocab_enc_size == 0 {
            return Err(Error::Msg("vocab_enc_size must be greater than zero".into()));
        }
        if self.vocab_dec_size == 0 {
            return Err(Error::Msg("vocab_dec_size must be greater than zero".into()));
        }
        if self.d_model == 0 {
            return Err(Error::Msg("d_model must be greater than zero".into()));
        }
        if self.nums_head == 0 {
            return Err(Error::Msg("nums_head must be greater than zero".into()));
        }
        if self.d_model % self.nums_head != 0 {
            return Err(Error::Msg(format!(
                "d_model ({}) must be divisible by nums_head ({})",
                self.d_model, self.nums_head
            )));
        }
        if self.n_layers == 0 {
            return Err(Error::Msg("n_layers must be greater than zero".into()));
        }
        if self.feedforward_dim == 0 {
            return Err(Error::Msg("feedforward_dim must be greater than zero".into()));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(Error::Msg("dropout must be in [0, 1)".into()));
        }
        if self.max_len == 0 {
            return Err(Error::Msg("max_len must be greater than zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = TransformerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.head_dim(), 64);
    }

    #[test]
    fn rejects_indivisible_head_count() {
        let config = TransformerConfig {
            d_model: 10,
            nums_head: 3,
            ..TransformerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_dropout() {
        let config = TransformerConfig {
            dropout: 1.0,
            ..TransformerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_layers() {
        let config = TransformerConfig {
            n_layers: 0,
            ..TransformerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
