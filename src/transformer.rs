//! Encoder-decoder composition and the vocabulary projection.

use candle_core::{Result, Tensor};
use candle_nn::{Linear, Module, VarBuilder};

use crate::config::TransformerConfig;
use crate::decoder::Decoder;
use crate::encoder::Encoder;

/// Full sequence-to-sequence model: encoder, decoder and the final linear
/// projection to target-vocabulary logits.
#[derive(Debug)]
pub struct Transformer {
    config: TransformerConfig,
    encoder: Encoder,
    decoder: Decoder,
    projection: Linear,
}

impl Transformer {
    pub fn new(config: TransformerConfig, vb: VarBuilder) -> Result<Self> {
        config.validate()?;
        log::info!(
            "transformer init d_model={} nums_head={} n_layers={} ff_dim={} vocab_enc={} vocab_dec={} dropout={}",
            config.d_model,
            config.nums_head,
            config.n_layers,
            config.feedforward_dim,
            config.vocab_enc_size,
            config.vocab_dec_size,
            config.dropout
        );

        let encoder = Encoder::new(&config, vb.pp("encoder"))?;
        let decoder = Decoder::new(&config, vb.pp("decoder"))?;
        let projection =
            candle_nn::linear(config.d_model, config.vocab_dec_size, vb.pp("projection"))?;

        Ok(Self {
            config,
            encoder,
            decoder,
            projection,
        })
    }

    pub fn config(&self) -> &TransformerConfig {
        &self.config
    }

    /// Teacher-forced forward pass.
    ///
    /// `enc_input_ids` and `dec_input_ids` are `[batch, len]` token-id
    /// tensors; the result is `[batch * dec_len, vocab_dec_size]` logits,
    /// flattened over batch and sequence for loss consumption.
    pub fn forward(
        &self,
        enc_input_ids: &Tensor,
        dec_input_ids: &Tensor,
        train: bool,
    ) -> Result<Tensor> {
        let enc_output = self.encoder.forward(enc_input_ids, train)?;
        let dec_output = self
            .decoder
            .forward(enc_input_ids, dec_input_ids, &enc_output, train)?;

        let logits = self.projection.forward(&dec_output)?;
        let (batch, seq_len, vocab) = logits.dims3()?;
        logits.reshape((batch * seq_len, vocab))
    }
}
