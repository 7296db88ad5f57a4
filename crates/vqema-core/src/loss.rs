//! Loss terms and the perplexity diagnostic.
//!
//! ```text
//! reconstruction = mean((output − target)²)
//! commitment     = mean((sg(q) − z)²)
//! total          = reconstruction + β · commitment
//! perplexity     = exp(−Σ_k p_k · ln(p_k + ε)),   p = mean one-hot over all positions
//! ```

use ndarray::{ArrayView, ArrayView3, Axis, Dimension};

use crate::config::PERPLEXITY_EPSILON;
use crate::quantizer::Quantized;
use crate::{Result, VqError};

fn mean_squared<D: Dimension>(
    context: &'static str,
    a: &ArrayView<'_, f32, D>,
    b: &ArrayView<'_, f32, D>,
) -> Result<f32> {
    if a.shape() != b.shape() {
        return Err(VqError::shape(context, a.shape(), b.shape()));
    }
    if a.is_empty() {
        return Ok(0.0);
    }
    let sum: f32 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum();
    Ok(sum / a.len() as f32)
}

/// `mean((output − target)²)` over every element.
pub fn reconstruction_loss<D: Dimension>(
    output: ArrayView<'_, f32, D>,
    target: ArrayView<'_, f32, D>,
) -> Result<f32> {
    mean_squared("reconstruction", &target, &output)
}

/// `mean((q − z)²)`. Unscaled; callers multiply by beta.
pub fn commitment_loss(continuous: ArrayView3<'_, f32>, quantized: ArrayView3<'_, f32>) -> Result<f32> {
    mean_squared("commitment", &continuous, &quantized)
}

/// Codebook utilisation. Equals K for perfectly uniform use, 1 when a single
/// code takes every position. Returns 1 for an empty batch.
pub fn perplexity(one_hot: ArrayView3<'_, f32>) -> f32 {
    let (b, t, k) = one_hot.dim();
    let n = b * t;
    if n == 0 || k == 0 {
        return 1.0;
    }
    let avg_probs = one_hot.sum_axis(Axis(0)).sum_axis(Axis(0)) / n as f32;
    let entropy: f32 = avg_probs
        .iter()
        .map(|&p| p * (p + PERPLEXITY_EPSILON).ln())
        .sum();
    (-entropy).exp()
}

/// All loss values of one training step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VqLoss {
    pub reconstruction: f32,
    /// Unscaled commitment loss.
    pub commitment: f32,
    /// `reconstruction + beta * commitment`
    pub total: f32,
    pub perplexity: f32,
}

impl VqLoss {
    pub fn compute<D: Dimension>(
        beta: f32,
        target: ArrayView<'_, f32, D>,
        output: ArrayView<'_, f32, D>,
        continuous: ArrayView3<'_, f32>,
        quantized: &Quantized,
    ) -> Result<Self> {
        let reconstruction = reconstruction_loss(output, target)?;
        let commitment = commitment_loss(continuous, quantized.quantized.view())?;
        Ok(Self {
            reconstruction,
            commitment,
            total: reconstruction + beta * commitment,
            perplexity: perplexity(quantized.one_hot.view()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array3};

    #[test]
    fn reconstruction_mean_over_all_elements() {
        let out = array![[1.0f32, 2.0], [3.0, 4.0]];
        let tgt = array![[1.0f32, 0.0], [3.0, 0.0]];
        // (0 + 4 + 0 + 16) / 4
        let l = reconstruction_loss(out.view(), tgt.view()).unwrap();
        assert!((l - 5.0).abs() < 1e-6, "got {l}");
    }

    #[test]
    fn reconstruction_shape_mismatch() {
        let out = array![[1.0f32, 2.0]];
        let tgt = array![[1.0f32], [2.0]];
        assert!(matches!(
            reconstruction_loss(out.view(), tgt.view()),
            Err(VqError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn commitment_is_unscaled_mean() {
        let z = array![[[1.0f32, 1.0]], [[0.0, 0.0]]];
        let q = array![[[0.0f32, 1.0]], [[0.0, 2.0]]];
        // (1 + 0 + 0 + 4) / 4
        let l = commitment_loss(z.view(), q.view()).unwrap();
        assert!((l - 1.25).abs() < 1e-6, "got {l}");
    }

    #[test]
    fn perplexity_uniform_equals_k() {
        let k = 4;
        let one_hot = Array3::from_shape_fn((2, k, k), |(_, t, j)| if t == j { 1.0f32 } else { 0.0 });
        let p = perplexity(one_hot.view());
        assert!((p - k as f32).abs() < 1e-4, "got {p}");
    }

    #[test]
    fn perplexity_single_code_is_one() {
        let one_hot = Array3::from_shape_fn((6, 2, 5), |(_, _, j)| if j == 3 { 1.0f32 } else { 0.0 });
        let p = perplexity(one_hot.view());
        assert!((p - 1.0).abs() < 1e-6, "got {p}");
    }

    #[test]
    fn perplexity_empty_batch() {
        assert_eq!(perplexity(Array3::<f32>::zeros((0, 1, 3)).view()), 1.0);
    }
}
