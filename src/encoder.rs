//! Source-side encoder stack.

use candle_core::{Result, Tensor};
use candle_nn::{Embedding, Module, VarBuilder};

use crate::attention::MultiHeadAttention;
use crate::config::TransformerConfig;
use crate::feed_forward::FeedForward;
use crate::masks;
use crate::positional::PositionalEncoding;

/// Self-attention followed by the feed-forward sublayer.
#[derive(Debug)]
pub struct EncoderLayer {
    self_attn: MultiHeadAttention,
    feedforward: FeedForward,
}

impl EncoderLayer {
    pub fn new(config: &TransformerConfig, vb: VarBuilder) -> Result<Self> {
        let self_attn = MultiHeadAttention::new(
            config.d_model,
            config.nums_head,
            config.dropout,
            vb.pp("self_attn"),
        )?;
        let feedforward = FeedForward::new(
            config.d_model,
            config.feedforward_dim,
            config.dropout,
            vb.pp("feedforward"),
        )?;

        Ok(Self {
            self_attn,
            feedforward,
        })
    }

    pub fn forward(&self, x: &Tensor, attn_mask: &Tensor, train: bool) -> Result<Tensor> {
        let attended = self.self_attn.forward(x, x, x, Some(attn_mask), train)?;
        self.feedforward.forward(&attended, train)
    }
}

/// Embedding, positional encoding and the stack of [`EncoderLayer`]s.
#[derive(Debug)]
pub struct Encoder {
    embedding: Embedding,
    pos_encoding: PositionalEncoding,
    layers: Vec<EncoderLayer>,
    pad_token_id: u32,
}

impl Encoder {
    pub fn new(config: &TransformerConfig, vb: VarBuilder) -> Result<Self> {
        let embedding =
            candle_nn::embedding(config.vocab_enc_size, config.d_model, vb.pp("embedding"))?;
        let pos_encoding =
            PositionalEncoding::new(config.d_model, config.dropout, config.max_len, vb.device())?;

        let mut layers = Vec::with_capacity(config.n_layers);
        for index in 0..config.n_layers {
            layers.push(EncoderLayer::new(config, vb.pp(format!("layers.{index}")))?);
        }

        Ok(Self {
            embedding,
            pos_encoding,
            layers,
            pad_token_id: config.pad_token_id,
        })
    }

    /// `input_ids` is `[batch, src_len]`; the result is
    /// `[batch, src_len, d_model]`. The padding mask is derived once and
    /// shared by every layer.
    pub fn forward(&self, input_ids: &Tensor, train: bool) -> Result<Tensor> {
        let embedded = self.embedding.forward(input_ids)?;
        let mut hidden = self.pos_encoding.forward(&embedded, train)?;

        let attn_mask = masks::padding_mask(input_ids, input_ids, self.pad_token_id)?;
        for layer in &self.layers {
            hidden = layer.forward(&hidden, &attn_mask, train)?;
        }

        Ok(hidden)
    }
}
