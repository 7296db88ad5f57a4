//! Hand-derived gradients for the quantizer's part of the training step.
//!
//! The decoder consumes `z + sg(q − z)`. Its value is `q`, while its
//! derivative with respect to `z` is the identity, so the gradient arriving at
//! the decoder input is copied unchanged onto the encoder output. The
//! commitment term adds `β · 2(z − q) / N`. Nothing here touches the codebook:
//! it is refreshed by [`crate::ema::update`] only.

use ndarray::{Array, Array3, ArrayView, ArrayView3, Dimension};

use crate::quantizer::Quantized;
use crate::{Result, VqError};

/// Forward value of the straight-through estimator: the quantized vectors.
pub fn straight_through(continuous: ArrayView3<'_, f32>, quantized: &Quantized) -> Result<Array3<f32>> {
    if continuous.shape() != quantized.quantized.shape() {
        return Err(VqError::shape(
            "straight-through",
            quantized.quantized.shape(),
            continuous.shape(),
        ));
    }
    Ok(quantized.quantized.clone())
}

/// Backward pass of the straight-through estimator: identity.
pub fn straight_through_backward(grad_quantized: ArrayView3<'_, f32>) -> Array3<f32> {
    grad_quantized.to_owned()
}

/// Gradient of the unscaled commitment loss with respect to the continuous
/// vectors: `2(z − q) / N`.
pub fn commitment_grad(continuous: ArrayView3<'_, f32>, quantized: ArrayView3<'_, f32>) -> Result<Array3<f32>> {
    if continuous.shape() != quantized.shape() {
        return Err(VqError::shape("commitment grad", quantized.shape(), continuous.shape()));
    }
    let n = continuous.len().max(1) as f32;
    Ok((&continuous - &quantized) * (2.0 / n))
}

/// Gradient of `mean((output − target)²)` with respect to `output`.
pub fn reconstruction_grad<D: Dimension>(
    output: ArrayView<'_, f32, D>,
    target: ArrayView<'_, f32, D>,
) -> Result<Array<f32, D>> {
    if output.shape() != target.shape() {
        return Err(VqError::shape("reconstruction grad", target.shape(), output.shape()));
    }
    let scale = 2.0 / output.len().max(1) as f32;
    let mut grad = output.to_owned();
    grad.zip_mut_with(&target, |g, &t| *g = (*g - t) * scale);
    Ok(grad)
}

/// Total gradient reaching the encoder output: the straight-through copy of the
/// decoder-input gradient plus the beta-weighted commitment gradient.
pub fn encoder_grad(
    grad_quantized: ArrayView3<'_, f32>,
    continuous: ArrayView3<'_, f32>,
    quantized: &Quantized,
    beta: f32,
) -> Result<Array3<f32>> {
    if grad_quantized.shape() != continuous.shape() {
        return Err(VqError::shape("encoder grad", continuous.shape(), grad_quantized.shape()));
    }
    let mut grad = straight_through_backward(grad_quantized);
    let commit = commitment_grad(continuous, quantized.quantized.view())?;
    grad.scaled_add(beta, &commit);
    Ok(grad)
}
