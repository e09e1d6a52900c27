//! Scaled dot-product and multi-head attention.

use candle_core::{Result, Tensor, D};
use candle_nn::ops::softmax_last_dim;
use candle_nn::{Dropout, Init, LayerNorm, Linear, Module, VarBuilder};

use crate::masks::MASK_FILL;

/// Overwrites `scores` with `value` wherever the boolean `mask` is set.
///
/// `mask` must be broadcastable to the score shape, which keeps the per-head
/// expansion a stride trick instead of a materialised copy.
fn masked_fill(scores: &Tensor, mask: &Tensor, value: f32) -> Result<Tensor> {
    let mask = mask.broadcast_as(scores.shape())?;
    let fill = Tensor::new(value, scores.device())?.broadcast_as(scores.shape().dims())?;
    mask.where_cond(&fill, scores)
}

/// Core attention kernel over per-head tensors.
///
/// `q`, `k` and `v` are `[batch, heads, seq, head_dim]`; `attn_mask` is a
/// boolean tensor broadcastable to `[batch, heads, seq_q, seq_k]` with `1`
/// marking suppressed key positions. Masked entries of the scaled score
/// matrix are overwritten with [`MASK_FILL`] before the softmax; dropout
/// applies to the attention weights in training mode. A fully masked row
/// softmaxes over the finite floor and stays well defined.
pub fn scaled_dot_product_attention(
    q: &Tensor,
    k: &Tensor,
    v: &Tensor,
    attn_mask: Option<&Tensor>,
    dropout: &Dropout,
    train: bool,
) -> Result<Tensor> {
    let (_batch, _heads, _q_len, head_dim) = q.dims4()?;
    let scale = 1.0 / (head_dim as f64).sqrt();

    let keys_t = k.transpose(D::Minus2, D::Minus1)?;
    let scores = q.matmul(&keys_t)?.affine(scale, 0.0)?;
    let scores = match attn_mask {
        Some(mask) => masked_fill(&scores, mask, MASK_FILL)?,
        None => scores,
    };

    let probs = softmax_last_dim(&scores)?;
    let probs = if train {
        dropout.forward(&probs, train)?
    } else {
        probs
    };

    probs.matmul(v)
}

/// `[batch, seq, d_model]` -> `[batch, heads, seq, head_dim]`.
fn split_heads(x: &Tensor, n_heads: usize, head_dim: usize) -> Result<Tensor> {
    let (batch, seq_len, _d_model) = x.dims3()?;
    x.reshape((batch, seq_len, n_heads, head_dim))?
        .transpose(1, 2)?
        .contiguous()
}

/// `[batch, heads, seq, head_dim]` -> `[batch, seq, d_model]`.
fn merge_heads(x: &Tensor, d_model: usize) -> Result<Tensor> {
    let (batch, _heads, seq_len, _head_dim) = x.dims4()?;
    x.transpose(1, 2)?.reshape((batch, seq_len, d_model))
}

/// No-bias projection initialised with the Xavier/Glorot uniform bound.
fn linear_xavier_no_bias(in_dim: usize, out_dim: usize, vb: VarBuilder) -> Result<Linear> {
    let bound = (6.0 / (in_dim + out_dim) as f64).sqrt();
    let init = Init::Uniform {
        lo: -bound,
        up: bound,
    };
    let weight = vb.get_with_hints((out_dim, in_dim), "weight", init)?;
    Ok(Linear::new(weight, None))
}

/// Multi-head attention with a residual connection and owned layer norm.
///
/// The normalization parameters are created once at construction alongside
/// the projection weights, so they persist across calls and train with the
/// rest of the model.
#[derive(Debug)]
pub struct MultiHeadAttention {
    w_q: Linear,
    w_k: Linear,
    w_v: Linear,
    w_o: Linear,
    norm: LayerNorm,
    dropout: Dropout,
    d_model: usize,
    n_heads: usize,
    head_dim: usize,
}

impl MultiHeadAttention {
    /// `d_model % n_heads == 0` is a construction-time precondition enforced
    /// by [`TransformerConfig::validate`](crate::TransformerConfig::validate).
    pub fn new(d_model: usize, n_heads: usize, dropout: f32, vb: VarBuilder) -> Result<Self> {
        let head_dim = d_model / n_heads;

        let w_q = linear_xavier_no_bias(d_model, d_model, vb.pp("w_q"))?;
        let w_k = linear_xavier_no_bias(d_model, d_model, vb.pp("w_k"))?;
        let w_v = linear_xavier_no_bias(d_model, d_model, vb.pp("w_v"))?;
        let w_o = candle_nn::linear_no_bias(d_model, d_model, vb.pp("w_o"))?;
        let norm = candle_nn::layer_norm(d_model, 1e-5, vb.pp("norm"))?;

        Ok(Self {
            w_q,
            w_k,
            w_v,
            w_o,
            norm,
            dropout: Dropout::new(dropout),
            d_model,
            n_heads,
            head_dim,
        })
    }

    /// Attends `query` over `key`/`value` and returns a tensor shaped like
    /// `query`.
    ///
    /// `attn_mask` is `[batch, seq_q, seq_k]`; it is lifted to a per-head
    /// broadcast inside. The residual is taken from the query operand, so the
    /// output sequence length always follows the query.
    pub fn forward(
        &self,
        query: &Tensor,
        key: &Tensor,
        value: &Tensor,
        attn_mask: Option<&Tensor>,
        train: bool,
    ) -> Result<Tensor> {
        let q = split_heads(&self.w_q.forward(query)?, self.n_heads, self.head_dim)?;
        let k = split_heads(&self.w_k.forward(key)?, self.n_heads, self.head_dim)?;
        let v = split_heads(&self.w_v.forward(value)?, self.n_heads, self.head_dim)?;

        let mask = attn_mask.map(|m| m.unsqueeze(1)).transpose()?;
        let context = scaled_dot_product_attention(&q, &k, &v, mask.as_ref(), &self.dropout, train)?;
        let merged = merge_heads(&context, self.d_model)?;

        let projected = self.w_o.forward(&merged)?;
        let residual = projected.add(query)?;
        self.norm.forward(&residual)
    }
}
