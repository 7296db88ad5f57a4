use serde::{Deserialize, Serialize};

use crate::VqError;

/// Added to the EMA cluster count before dividing, so codes that were never
/// selected do not divide by zero.
pub const EMA_EPSILON: f32 = 1e-5;

/// Added inside the log of the perplexity diagnostic.
pub const PERPLEXITY_EPSILON: f32 = 1e-10;

/// How the EMA buffers accumulate batch statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EmaMode {
    /// `ema ← decay · ema + (1 − decay) · stat`, starting from the initial buffers.
    #[default]
    Plain,
    /// Accumulate into a zero-initialised biased buffer and expose
    /// `biased / (1 − decay^t)` after `t` updates.
    ZeroDebiased,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizerConfig {
    /// Number of codebook entries (K).
    pub num_codes: usize,
    /// Dimensionality of each code vector (D).
    pub code_size: usize,
    /// Weight of the commitment loss in the total loss.
    pub beta: f32,
    /// EMA decay rate, in `[0, 1)`.
    pub decay: f32,
    #[serde(default)]
    pub ema_mode: EmaMode,
}

impl Default for QuantizerConfig {
    fn default() -> Self {
        Self {
            num_codes: 123,
            code_size: 16,
            beta: 0.25,
            decay: 0.99,
            ema_mode: EmaMode::Plain,
        }
    }
}

impl QuantizerConfig {
    pub fn new(num_codes: usize, code_size: usize) -> Self {
        Self {
            num_codes,
            code_size,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), VqError> {
        if self.num_codes == 0 {
            return Err(VqError::InvalidConfig("num_codes must be > 0".into()));
        }
        if self.code_size == 0 {
            return Err(VqError::InvalidConfig("code_size must be > 0".into()));
        }
        if !(0.0..1.0).contains(&self.decay) {
            return Err(VqError::InvalidConfig(format!(
                "decay must be in [0, 1), got {}",
                self.decay
            )));
        }
        if !self.beta.is_finite() || self.beta < 0.0 {
            return Err(VqError::InvalidConfig(format!(
                "beta must be finite and >= 0, got {}",
                self.beta
            )));
        }
        Ok(())
    }
}
