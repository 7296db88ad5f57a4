//! # vqema-core
//!
//! Vector quantization with an exponential-moving-average codebook, the
//! discretisation step of a VQ-VAE.
//!
//! Continuous encoder outputs `[B, T, D]` are snapped to the nearest of `K`
//! learned code vectors. The codebook is not trained by gradient descent: after
//! each optimizer step it is recomputed from decayed running counts and sums of
//! the vectors assigned to each code.
//!
//! ## Modules
//!
//! - [`quantizer`]  — nearest-entry lookup and [`VectorQuantizer`]
//! - [`ema`]        — EMA buffer and codebook refresh
//! - [`loss`]       — reconstruction / commitment loss, perplexity
//! - [`gradient`]   — straight-through and commitment gradients
//! - [`codebook`]   — owned codebook + EMA state
//! - [`checkpoint`] — JSON / bincode persistence
//!
//! ## One training step
//!
//! ```rust,ignore
//! let z = encoder.forward(&x);                       // [B, T, D]
//! let q = vq.forward(z.view())?;                     // shared borrow
//! let x_hat = decoder.forward(&straight_through(z.view(), &q)?);
//! let loss = vq.loss(x.view(), x_hat.view(), z.view(), &q)?;
//! // ... backprop + optimizer on encoder / decoder ...
//! vq.update(&q, z.view())?;                          // exclusive borrow
//! ```

pub mod checkpoint;
pub mod codebook;
pub mod config;
pub mod ema;
pub mod error;
pub mod gradient;
pub mod loss;
pub mod quantizer;

pub use checkpoint::Checkpoint;
pub use codebook::CodebookState;
pub use config::{EmaMode, QuantizerConfig, EMA_EPSILON, PERPLEXITY_EPSILON};
pub use ema::EmaReport;
pub use error::VqError;
pub use gradient::{encoder_grad, reconstruction_grad, straight_through};
pub use loss::{commitment_loss, perplexity, reconstruction_loss, VqLoss};
pub use quantizer::{quantize, Quantized, VectorQuantizer};

pub type Result<T> = std::result::Result<T, VqError>;
