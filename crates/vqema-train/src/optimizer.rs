//! Adam for the autoencoder parameters.
//!
//! ```text
//! m_t   = β₁ m_{t-1} + (1-β₁) g_t
//! v_t   = β₂ v_{t-1} + (1-β₂) g_t²
//! m̂_t  = m_t / (1 - β₁^t)
//! v̂_t  = v_t / (1 - β₂^t)
//! θ_t   = θ_{t-1} − lr · m̂_t / (√v̂_t + ε)
//! ```
//!
//! The codebook never passes through here.

use ndarray::{Array, Dimension, Zip};

/// Per-parameter Adam moments.
#[derive(Debug, Clone)]
pub struct AdamState<D: Dimension> {
    /// First moment.
    pub m: Array<f32, D>,
    /// Second moment, element-wise.
    pub v: Array<f32, D>,
    /// Step counter.
    pub t: u32,
}

impl<D: Dimension> AdamState<D> {
    pub fn new(shape: D) -> Self {
        Self {
            m: Array::zeros(shape.clone()),
            v: Array::zeros(shape),
            t: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Adam {
    /// Learning rate.
    pub lr: f32,
    pub beta1: f32,
    pub beta2: f32,
    /// Numerical stability term.
    pub eps: f32,
}

impl Default for Adam {
    fn default() -> Self {
        Self { lr: 1e-3, beta1: 0.9, beta2: 0.999, eps: 1e-7 }
    }
}

impl Adam {
    pub fn new(lr: f32) -> Self {
        Self { lr, ..Default::default() }
    }

    /// Apply one update to `param` in place.
    pub fn step<D: Dimension>(&self, param: &mut Array<f32, D>, grad: &Array<f32, D>, state: &mut AdamState<D>) {
        state.t = state.t.saturating_add(1);
        let t = i32::try_from(state.t).unwrap_or(i32::MAX);
        let bias1 = 1.0 - self.beta1.powi(t);
        let bias2 = 1.0 - self.beta2.powi(t);
        let (b1, b2, lr, eps) = (self.beta1, self.beta2, self.lr, self.eps);

        Zip::from(param)
            .and(grad)
            .and(&mut state.m)
            .and(&mut state.v)
            .for_each(|p, &g, m, v| {
                *m = b1 * *m + (1.0 - b1) * g;
                *v = b2 * *v + (1.0 - b2) * g * g;
                let m_hat = *m / bias1;
                let v_hat = *v / bias2;
                *p -= lr * m_hat / (v_hat.sqrt() + eps);
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    #[test]
    fn first_step_moves_by_learning_rate() {
        // after bias correction the first step is lr · sign(g)
        let adam = Adam::new(0.1);
        let mut p = array![1.0f32, -1.0];
        let g = array![3.0f32, -0.5];
        let mut state = AdamState::new(p.raw_dim());
        adam.step(&mut p, &g, &mut state);
        assert!((p[0] - 0.9).abs() < 1e-5, "p[0] = {}", p[0]);
        assert!((p[1] + 0.9).abs() < 1e-5, "p[1] = {}", p[1]);
        assert_eq!(state.t, 1);
    }

    #[test]
    fn converges_toward_target() {
        // minimise ‖x − target‖², gradient 2(x − target)
        let adam = Adam::new(0.05);
        let target = array![0.2f32, -0.1];
        let mut x = array![1.5f32, 0.9];
        let mut state = AdamState::new(x.raw_dim());
        let init: f32 = (&x - &target).mapv(|v| v * v).sum();

        for _ in 0..200 {
            let g: Array1<f32> = (&x - &target) * 2.0;
            adam.step(&mut x, &g, &mut state);
        }

        let dist: f32 = (&x - &target).mapv(|v| v * v).sum();
        assert!(dist < init * 0.01, "dist={dist} init={init}");
    }
}
