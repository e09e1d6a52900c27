//! Target-side decoder stack.

use candle_core::{Result, Tensor};
use candle_nn::{Embedding, Module, VarBuilder};

use crate::attention::MultiHeadAttention;
use crate::config::TransformerConfig;
use crate::feed_forward::FeedForward;
use crate::masks;
use crate::positional::PositionalEncoding;

/// Masked self-attention, cross-attention over the encoder output, then the
/// feed-forward sublayer.
#[derive(Debug)]
pub struct DecoderLayer {
    self_attn: MultiHeadAttention,
    cross_attn: MultiHeadAttention,
    feedforward: FeedForward,
}

impl DecoderLayer {
    pub fn new(config: &TransformerConfig, vb: VarBuilder) -> Result<Self> {
        let self_attn = MultiHeadAttention::new(
            config.d_model,
            config.nums_head,
            config.dropout,
            vb.pp("self_attn"),
        )?;
        let cross_attn = MultiHeadAttention::new(
            config.d_model,
            config.nums_head,
            config.dropout,
            vb.pp("cross_attn"),
        )?;
        let feedforward = FeedForward::new(
            config.d_model,
            config.feedforward_dim,
            config.dropout,
            vb.pp("feedforward"),
        )?;

        Ok(Self {
            self_attn,
            cross_attn,
            feedforward,
        })
    }

    /// The decoder state queries the encoder memory in cross-attention, so
    /// the output keeps the decoder's sequence length.
    pub fn forward(
        &self,
        x: &Tensor,
        enc_output: &Tensor,
        self_attn_mask: &Tensor,
        cross_attn_mask: &Tensor,
        train: bool,
    ) -> Result<Tensor> {
        let attended = self.self_attn.forward(x, x, x, Some(self_attn_mask), train)?;
        let attended = self.cross_attn.forward(
            &attended,
            enc_output,
            enc_output,
            Some(cross_attn_mask),
            train,
        )?;
        self.feedforward.forward(&attended, train)
    }
}

/// Embedding, positional encoding and the stack of [`DecoderLayer`]s with
/// combined padding/causal masking.
#[derive(Debug)]
pub struct Decoder {
    embedding: Embedding,
    pos_encoding: PositionalEncoding,
    layers: Vec<DecoderLayer>,
    pad_token_id: u32,
}

impl Decoder {
    pub fn new(config: &TransformerConfig, vb: VarBuilder) -> Result<Self> {
        let embedding =
            candle_nn::embedding(config.vocab_dec_size, config.d_model, vb.pp("embedding"))?;
        let pos_encoding =
            PositionalEncoding::new(config.d_model, config.dropout, config.max_len, vb.device())?;

        let mut layers = Vec::with_capacity(config.n_layers);
        for index in 0..config.n_layers {
            layers.push(DecoderLayer::new(config, vb.pp(format!("layers.{index}")))?);
        }

        Ok(Self {
            embedding,
            pos_encoding,
            layers,
            pad_token_id: config.pad_token_id,
        })
    }

    /// `enc_input_ids` and `dec_input_ids` are `[batch, len]` id tensors;
    /// `enc_output` is the encoder result the cross-attention of every layer
    /// reads. Self-attention combines the target-side padding mask with the
    /// subsequence mask; cross-attention masks target queries against padded
    /// source keys.
    pub fn forward(
        &self,
        enc_input_ids: &Tensor,
        dec_input_ids: &Tensor,
        enc_output: &Tensor,
        train: bool,
    ) -> Result<Tensor> {
        let embedded = self.embedding.forward(dec_input_ids)?;
        let mut hidden = self.pos_encoding.forward(&embedded, train)?;

        let pad_mask = masks::padding_mask(dec_input_ids, dec_input_ids, self.pad_token_id)?;
        let causal_mask = masks::subsequence_mask(dec_input_ids)?;
        let self_attn_mask = masks::union(&pad_mask, &causal_mask)?;
        let cross_attn_mask =
            masks::padding_mask(dec_input_ids, enc_input_ids, self.pad_token_id)?;

        for layer in &self.layers {
            hidden = layer.forward(&hidden, enc_output, &self_attn_mask, &cross_attn_mask, train)?;
        }

        Ok(hidden)
    }
}
