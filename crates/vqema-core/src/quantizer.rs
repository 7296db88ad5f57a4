//! Nearest-entry lookup and the [`VectorQuantizer`] that owns a codebook.
//!
//! ```text
//! inputs  [B, T, D] ──► distances [B, T, K] ──► argmin ──► indices  [B, T]
//!                                                   │
//!                                                   ├──► one_hot   [B, T, K]
//!                                                   └──► quantized [B, T, D]
//! ```
//!
//! Ties in the argmin resolve to the lowest code index.

use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView3, ArrayViewMut1, Axis, Zip};
use rand::Rng;

use crate::ema::{self, EmaReport};
use crate::loss::VqLoss;
use crate::{CodebookState, QuantizerConfig, Result, VqError};

/// Result of one forward lookup. Recomputed every step.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantized {
    /// Euclidean distance from each input to every code. Shape: [B, T, K]
    pub distances: Array3<f32>,
    /// Selected code per position. Shape: [B, T]
    pub indices: Array2<usize>,
    /// One-hot encoding of `indices`. Shape: [B, T, K]
    pub one_hot: Array3<f32>,
    /// Selected code vectors. Shape: [B, T, D]
    pub quantized: Array3<f32>,
}

impl Quantized {
    /// Number of times each code was selected in this batch.
    pub fn code_counts(&self) -> Array1<f32> {
        self.one_hot.sum_axis(Axis(0)).sum_axis(Axis(0))
    }
}

/// Map every input vector to its nearest codebook entry.
///
/// Fails with [`VqError::ShapeMismatch`] when the last input dimension is not D.
pub fn quantize(state: &CodebookState, inputs: ArrayView3<'_, f32>) -> Result<Quantized> {
    let (b, t, d) = inputs.dim();
    let k = state.num_codes();
    if k == 0 {
        return Err(VqError::InvalidConfig("codebook has no entries".into()));
    }
    if d != state.code_size() {
        return Err(VqError::shape(
            "quantize inputs",
            &[b, t, state.code_size()],
            inputs.shape(),
        ));
    }

    let n = b * t;
    let flat = inputs.to_shape((n, d))?;
    let codebook = state.codebook();

    let mut distances = Array2::<f32>::zeros((n, k));
    let mut indices = Array1::<usize>::zeros(n);

    let assign = |z: ArrayView1<'_, f32>, mut dist: ArrayViewMut1<'_, f32>, idx: &mut usize| {
        let mut best = f32::INFINITY;
        let mut best_k = 0usize;
        for (j, code) in codebook.rows().into_iter().enumerate() {
            let sq: f32 = z
                .iter()
                .zip(code.iter())
                .map(|(a, c)| (a - c) * (a - c))
                .sum();
            dist[j] = sq.sqrt();
            // strict `<` keeps the lowest index on ties
            if sq < best {
                best = sq;
                best_k = j;
            }
        }
        *idx = best_k;
    };

    let zip = Zip::from(flat.rows())
        .and(distances.rows_mut())
        .and(&mut indices);
    #[cfg(feature = "parallel")]
    zip.par_for_each(assign);
    #[cfg(not(feature = "parallel"))]
    zip.for_each(assign);

    let mut one_hot = Array2::<f32>::zeros((n, k));
    for (row, &j) in indices.iter().enumerate() {
        one_hot[[row, j]] = 1.0;
    }
    let quantized = Array2::from_shape_fn((n, d), |(row, col)| codebook[[indices[row], col]]);

    Ok(Quantized {
        distances: distances.into_shape_with_order((b, t, k))?,
        indices: indices.into_shape_with_order((b, t))?,
        one_hot: one_hot.into_shape_with_order((b, t, k))?,
        quantized: quantized.into_shape_with_order((b, t, d))?,
    })
}

/// A codebook together with the configuration it was built for.
///
/// `forward` borrows the state shared and `update` borrows it exclusively, so
/// a codebook write can never interleave with a lookup.
#[derive(Debug, Clone)]
pub struct VectorQuantizer {
    config: QuantizerConfig,
    state: CodebookState,
}

impl VectorQuantizer {
    /// Build a quantizer with a Glorot-uniform codebook.
    pub fn new(config: QuantizerConfig, rng: &mut impl Rng) -> Result<Self> {
        let state = CodebookState::glorot_uniform(&config, rng)?;
        Ok(Self { config, state })
    }

    pub fn from_state(config: QuantizerConfig, state: CodebookState) -> Result<Self> {
        config.validate()?;
        state.check_shapes(&config)?;
        Ok(Self { config, state })
    }

    pub fn config(&self) -> &QuantizerConfig {
        &self.config
    }

    pub fn state(&self) -> &CodebookState {
        &self.state
    }

    pub fn into_parts(self) -> (QuantizerConfig, CodebookState) {
        (self.config, self.state)
    }

    pub fn forward(&self, inputs: ArrayView3<'_, f32>) -> Result<Quantized> {
        quantize(&self.state, inputs)
    }

    /// Reconstruction + beta-weighted commitment loss for a finished forward pass.
    pub fn loss(
        &self,
        target: ArrayView3<'_, f32>,
        output: ArrayView3<'_, f32>,
        inputs: ArrayView3<'_, f32>,
        quantized: &Quantized,
    ) -> Result<VqLoss> {
        VqLoss::compute(self.config.beta, target, output, inputs, quantized)
    }

    /// Refresh the codebook from this batch's assignments.
    pub fn update(&mut self, quantized: &Quantized, inputs: ArrayView3<'_, f32>) -> Result<EmaReport> {
        ema::update(
            &mut self.state,
            quantized.one_hot.view(),
            inputs,
            self.config.decay,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EmaMode;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn line_state() -> CodebookState {
        CodebookState::from_codebook(array![[0.0f32], [10.0]], EmaMode::Plain)
    }

    #[test]
    fn distances_are_euclidean() {
        let state = CodebookState::from_codebook(array![[0.0f32, 0.0], [3.0, 4.0]], EmaMode::Plain);
        let inputs = array![[[0.0f32, 0.0]]];
        let q = quantize(&state, inputs.view()).unwrap();
        assert_eq!(q.distances[[0, 0, 0]], 0.0);
        assert!((q.distances[[0, 0, 1]] - 5.0).abs() < 1e-6);
        assert_eq!(q.indices[[0, 0]], 0);
    }

    #[test]
    fn output_shapes() {
        let mut rng = StdRng::seed_from_u64(3);
        let vq = VectorQuantizer::new(QuantizerConfig::new(7, 4), &mut rng).unwrap();
        let inputs = Array3::from_shape_fn((5, 3, 4), |(b, t, d)| (b + t * d) as f32 * 0.1);
        let q = vq.forward(inputs.view()).unwrap();
        assert_eq!(q.distances.dim(), (5, 3, 7));
        assert_eq!(q.indices.dim(), (5, 3));
        assert_eq!(q.one_hot.dim(), (5, 3, 7));
        assert_eq!(q.quantized.dim(), (5, 3, 4));
        assert_eq!(q.code_counts().sum(), 15.0);
    }

    #[test]
    fn wrong_code_size_fails_fast() {
        let inputs = Array3::<f32>::zeros((2, 1, 3));
        match quantize(&line_state(), inputs.view()) {
            Err(VqError::ShapeMismatch { expected, got, .. }) => {
                assert_eq!(expected, vec![2, 1, 1]);
                assert_eq!(got, vec![2, 1, 3]);
            }
            other => panic!("expected ShapeMismatch, got: {other:?}"),
        }
    }

    #[test]
    fn empty_batch_is_allowed() {
        let inputs = Array3::<f32>::zeros((0, 4, 1));
        let q = quantize(&line_state(), inputs.view()).unwrap();
        assert_eq!(q.indices.len(), 0);
        assert_eq!(q.quantized.dim(), (0, 4, 1));
    }

    #[test]
    fn non_contiguous_inputs() {
        // transposed view exercises the copying path of `to_shape`
        let base = array![[[1.0f32], [9.0]], [[8.0], [2.0]]];
        let view = base.view().permuted_axes([1, 0, 2]);
        let q = quantize(&line_state(), view).unwrap();
        assert_eq!(q.indices, array![[0, 1], [1, 0]]);
    }

    #[test]
    fn from_state_validates_shapes() {
        let cfg = QuantizerConfig::new(3, 1);
        assert!(VectorQuantizer::from_state(cfg, line_state()).is_err());
        assert!(VectorQuantizer::from_state(QuantizerConfig::new(2, 1), line_state()).is_ok());
    }
}
