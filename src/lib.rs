//! Encoder-decoder transformer core built on Candle.
//!
//! The crate covers the architectural pieces of a sequence-to-sequence
//! transformer: sinusoidal positional encoding, scaled dot-product and
//! multi-head attention, position-wise feed-forward sublayers, padding and
//! subsequence masking, and the encoder/decoder stacks composed into a
//! [`Transformer`]. Tensor algebra, autodiff and device dispatch are
//! delegated to `candle-core`/`candle-nn`; training loops, tokenization and
//! decoding strategies live outside this crate.
//!
//! All trainable tensors are created through a [`candle_nn::VarBuilder`], so
//! a model backed by a [`candle_nn::VarMap`] exposes every parameter to an
//! external optimizer.

pub mod attention;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod feed_forward;
pub mod masks;
pub mod positional;
pub mod transformer;

pub use attention::{scaled_dot_product_attention, MultiHeadAttention};
pub use config::TransformerConfig;
pub use decoder::{Decoder, DecoderLayer};
pub use encoder::{Encoder, EncoderLayer};
pub use feed_forward::FeedForward;
pub use positional::PositionalEncoding;
pub use transformer::Transformer;
