//! Codebook state: the K×D code vectors plus their EMA buffers.
//!
//! The state is a plain owned value. The forward pass borrows it shared
//! ([`crate::quantize`]); the EMA update borrows it exclusively
//! ([`crate::ema::update`]). Nothing else writes to it.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{EmaMode, QuantizerConfig, Result, VqError};

/// Zero-initialised accumulators used by [`EmaMode::ZeroDebiased`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct BiasedBuffers {
    pub(crate) count: Array1<f32>,
    pub(crate) sum: Array2<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodebookState {
    /// Shape: [K][D]
    pub(crate) codebook: Array2<f32>,
    /// Shape: [K]
    pub(crate) ema_count: Array1<f32>,
    /// Shape: [K][D]
    pub(crate) ema_sum: Array2<f32>,
    pub(crate) biased: Option<BiasedBuffers>,
    /// Number of EMA updates applied so far.
    pub(crate) steps: u64,
}

impl CodebookState {
    /// Initialise the codebook from a Glorot-uniform distribution,
    /// `U(-l, l)` with `l = sqrt(6 / (K + D))`.
    ///
    /// The EMA sum starts as a copy of the codebook and the EMA count at zero.
    pub fn glorot_uniform(config: &QuantizerConfig, rng: &mut impl Rng) -> Result<Self> {
        config.validate()?;
        let (k, d) = (config.num_codes, config.code_size);
        let limit = (6.0 / (k + d) as f32).sqrt();
        let codebook = Array2::from_shape_fn((k, d), |_| rng.gen_range(-limit..limit));
        Ok(Self::from_codebook(codebook, config.ema_mode))
    }

    /// Wrap an explicit codebook. The EMA sum starts as a copy of it and the
    /// EMA count at zero.
    pub fn from_codebook(codebook: Array2<f32>, mode: EmaMode) -> Self {
        let (k, d) = codebook.dim();
        let biased = match mode {
            EmaMode::Plain => None,
            EmaMode::ZeroDebiased => Some(BiasedBuffers {
                count: Array1::zeros(k),
                sum: Array2::zeros((k, d)),
            }),
        };
        Self {
            ema_sum: codebook.clone(),
            ema_count: Array1::zeros(k),
            codebook,
            biased,
            steps: 0,
        }
    }

    pub fn num_codes(&self) -> usize {
        self.codebook.nrows()
    }

    pub fn code_size(&self) -> usize {
        self.codebook.ncols()
    }

    pub fn codebook(&self) -> ArrayView2<'_, f32> {
        self.codebook.view()
    }

    /// Code vector for index `k`.
    pub fn code(&self, k: usize) -> ArrayView1<'_, f32> {
        self.codebook.row(k)
    }

    pub fn ema_count(&self) -> ArrayView1<'_, f32> {
        self.ema_count.view()
    }

    pub fn ema_sum(&self) -> ArrayView2<'_, f32> {
        self.ema_sum.view()
    }

    pub fn ema_mode(&self) -> EmaMode {
        if self.biased.is_some() {
            EmaMode::ZeroDebiased
        } else {
            EmaMode::Plain
        }
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Verify every buffer has the (K, D) shape the config describes.
    pub fn check_shapes(&self, config: &QuantizerConfig) -> Result<()> {
        let (k, d) = (config.num_codes, config.code_size);
        if self.codebook.dim() != (k, d) {
            return Err(VqError::shape("codebook", &[k, d], self.codebook.shape()));
        }
        if self.ema_count.len() != k {
            return Err(VqError::shape("ema_count", &[k], self.ema_count.shape()));
        }
        if self.ema_sum.dim() != (k, d) {
            return Err(VqError::shape("ema_sum", &[k, d], self.ema_sum.shape()));
        }
        if let Some(b) = &self.biased {
            if b.count.len() != k || b.sum.dim() != (k, d) {
                return Err(VqError::shape("biased ema buffers", &[k, d], b.sum.shape()));
            }
        }
        if self.ema_mode() != config.ema_mode {
            return Err(VqError::InvalidConfig(format!(
                "state uses {:?} but config requests {:?}",
                self.ema_mode(),
                config.ema_mode
            )));
        }
        Ok(())
    }
}
