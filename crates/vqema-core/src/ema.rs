//! Exponential-moving-average codebook update.
//!
//! ```text
//! n_k   = Σ one_hot[.., k]                         (batch count)
//! s_k   = Σ one_hot[.., k] · z                     (batch sum)
//! N_k  ← γ N_k + (1 − γ) n_k
//! S_k  ← γ S_k + (1 − γ) s_k
//! e_k   = S_k / (N_k + ε)                          (new code vector)
//! ```
//!
//! The ε only enters the division; the stored count is left untouched.
//! Runs outside any gradient computation, after the optimizer step.

use ndarray::{Array1, Array2, ArrayView3, ArrayViewMut1, ArrayViewMut2, Axis, Zip};
use tracing::debug;

use crate::codebook::CodebookState;
use crate::config::EMA_EPSILON;
use crate::{Result, VqError};

/// Summary of one EMA update.
#[derive(Debug, Clone, PartialEq)]
pub struct EmaReport {
    /// Update counter after this update (1 for the first).
    pub step: u64,
    /// Codes that received no assignment in this batch.
    pub unused_codes: usize,
    /// Per-code assignment count in this batch.
    pub batch_counts: Array1<f32>,
}

fn decay_into(
    count: ArrayViewMut1<'_, f32>,
    sum: ArrayViewMut2<'_, f32>,
    batch_counts: &Array1<f32>,
    batch_sums: &Array2<f32>,
    decay: f32,
) {
    Zip::from(count)
        .and(batch_counts)
        .for_each(|c, &n| *c = decay * *c + (1.0 - decay) * n);
    Zip::from(sum)
        .and(batch_sums)
        .for_each(|s, &v| *s = decay * *s + (1.0 - decay) * v);
}

/// Fold one batch of assignments into the EMA buffers and refresh the codebook.
///
/// `one_hot` is [B, T, K] and `inputs` is [B, T, D], both from the same
/// forward pass.
pub fn update(
    state: &mut CodebookState,
    one_hot: ArrayView3<'_, f32>,
    inputs: ArrayView3<'_, f32>,
    decay: f32,
) -> Result<EmaReport> {
    let (k, d) = (state.num_codes(), state.code_size());
    let (b, t, _) = one_hot.dim();
    if one_hot.dim() != (b, t, k) {
        return Err(VqError::shape("ema one_hot", &[b, t, k], one_hot.shape()));
    }
    if inputs.dim() != (b, t, d) {
        return Err(VqError::shape("ema inputs", &[b, t, d], inputs.shape()));
    }

    let n = b * t;
    let one_hot = one_hot.to_shape((n, k))?;
    let inputs = inputs.to_shape((n, d))?;

    let batch_counts = one_hot.sum_axis(Axis(0));
    let batch_sums = one_hot.t().dot(&inputs);

    state.steps += 1;
    match state.biased.as_mut() {
        None => decay_into(
            state.ema_count.view_mut(),
            state.ema_sum.view_mut(),
            &batch_counts,
            &batch_sums,
            decay,
        ),
        Some(biased) => {
            decay_into(
                biased.count.view_mut(),
                biased.sum.view_mut(),
                &batch_counts,
                &batch_sums,
                decay,
            );
            let exponent = i32::try_from(state.steps).unwrap_or(i32::MAX);
            let correction = 1.0 - decay.powi(exponent);
            state.ema_count.assign(&(&biased.count / correction));
            state.ema_sum.assign(&(&biased.sum / correction));
        }
    }

    Zip::from(state.codebook.rows_mut())
        .and(state.ema_sum.rows())
        .and(&state.ema_count)
        .for_each(|mut code, sum, &count| {
            let denom = count + EMA_EPSILON;
            code.zip_mut_with(&sum, |e, &s| *e = s / denom);
        });

    let unused_codes = batch_counts.iter().filter(|&&c| c == 0.0).count();
    debug!(step = state.steps, unused_codes, batch = n, "EMA codebook update");

    Ok(EmaReport {
        step: state.steps,
        unused_codes,
        batch_counts,
    })
}
