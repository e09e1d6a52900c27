//! Mask builders shared by the attention sublayers.
//!
//! All masks produced here are boolean tensors with dtype [`MASK_DTYPE`],
//! shaped `[batch, len_q, len_k]`. A value of `1` marks a key position the
//! query must not attend to; the attention kernel overwrites the matching
//! scores with [`MASK_FILL`] before softmax. Per-head expansion happens by
//! broadcasting at the score-masking step, never by materialising a repeated
//! tensor.

use candle_core::{DType, Error, Result, Tensor};

/// Dtype shared by all boolean masks.
pub const MASK_DTYPE: DType = DType::U8;

/// Value written over masked attention scores. Finite, so a fully masked
/// row softmaxes to a near-uniform distribution instead of NaN.
pub const MASK_FILL: f32 = -1e9;

/// Construct a padding mask from raw token-id tensors.
///
/// `seq_q` and `seq_k` are `[batch, len]` id tensors; the result is `1`
/// wherever the key position holds `pad_token_id`, replicated over the query
/// axis.
pub fn padding_mask(seq_q: &Tensor, seq_k: &Tensor, pad_token_id: u32) -> Result<Tensor> {
    let (batch, len_q) = seq_q.dims2()?;
    let (batch_k, len_k) = seq_k.dims2()?;
    if batch != batch_k {
        return Err(Error::Msg(format!(
            "padding mask expects matching batch sizes, got {batch} and {batch_k}"
        )));
    }

    let key_is_pad = seq_k.eq(pad_token_id)?;
    key_is_pad.unsqueeze(1)?.broadcast_as((batch, len_q, len_k))
}

/// Construct a subsequence (causal) mask for decoder self-attention.
///
/// The result is `1` wherever the key index exceeds the query index, the
/// strict upper triangle excluding the diagonal.
pub fn subsequence_mask(seq: &Tensor) -> Result<Tensor> {
    let (batch, len) = seq.dims2()?;
    let mut data = vec![0u8; batch * len * len];

    for b in 0..batch {
        for q in 0..len {
            let row_start = ((b * len) + q) * len;
            for k in (q + 1)..len {
                data[row_start + k] = 1;
            }
        }
    }

    Tensor::from_vec(data, (batch, len, len), seq.device())
}

/// Elementwise union of two boolean masks.
pub fn union(lhs: &Tensor, rhs: &Tensor) -> Result<Tensor> {
    lhs.maximum(rhs)
}
