//! Encoder / decoder seam around the quantizer.
//!
//! The trainer only needs forward passes, the two halves of the backward pass
//! and a way to apply the accumulated gradients. [`LinearAutoencoder`] is the
//! reference implementation: one dense layer on each side.

use ndarray::{Array1, Array2, Array3, ArrayView2, ArrayView3, Axis};
use rand::Rng;

use crate::optimizer::{Adam, AdamState};
use crate::{Result, TrainError};

pub trait Autoencoder {
    /// Accumulated parameter gradients for one step.
    type Grads;

    /// Flat input width P.
    fn input_dim(&self) -> usize;

    /// Latent shape (T, D) produced per example.
    fn latent_shape(&self) -> (usize, usize);

    /// `[B, P] → [B, T, D]`
    fn encode(&self, x: ArrayView2<'_, f32>) -> Result<Array3<f32>>;

    /// `[B, T, D] → [B, P]`
    fn decode(&self, codes: ArrayView3<'_, f32>) -> Result<Array2<f32>>;

    /// Decoder parameter gradients plus the gradient w.r.t. the decoder input.
    fn decoder_backward(
        &self,
        codes: ArrayView3<'_, f32>,
        grad_output: ArrayView2<'_, f32>,
    ) -> Result<(Self::Grads, Array3<f32>)>;

    /// Add the encoder parameter gradients for `grad_latent` into `grads`.
    fn encoder_backward(
        &self,
        x: ArrayView2<'_, f32>,
        grad_latent: ArrayView3<'_, f32>,
        grads: &mut Self::Grads,
    ) -> Result<()>;

    fn apply_gradients(&mut self, grads: &Self::Grads);
}

#[derive(Debug, Clone)]
pub struct LinearGrads {
    pub encoder_weight: Array2<f32>,
    pub encoder_bias: Array1<f32>,
    pub decoder_weight: Array2<f32>,
    pub decoder_bias: Array1<f32>,
}

/// `z = x·W_e + b_e`, `x̂ = q·W_d + b_d`, trained with Adam.
#[derive(Debug, Clone)]
pub struct LinearAutoencoder {
    latent: (usize, usize),
    /// Shape: [P][T·D]
    encoder_weight: Array2<f32>,
    encoder_bias: Array1<f32>,
    /// Shape: [T·D][P]
    decoder_weight: Array2<f32>,
    decoder_bias: Array1<f32>,
    optimizer: Adam,
    enc_w_state: AdamState<ndarray::Ix2>,
    enc_b_state: AdamState<ndarray::Ix1>,
    dec_w_state: AdamState<ndarray::Ix2>,
    dec_b_state: AdamState<ndarray::Ix1>,
}

fn glorot(rows: usize, cols: usize, rng: &mut impl Rng) -> Array2<f32> {
    let limit = (6.0 / (rows + cols) as f32).sqrt();
    Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-limit..limit))
}

impl LinearAutoencoder {
    /// Glorot-uniform weights, zero biases.
    pub fn new(input_dim: usize, latent_size: usize, code_size: usize, lr: f32, rng: &mut impl Rng) -> Self {
        let width = latent_size * code_size;
        Self {
            latent: (latent_size, code_size),
            encoder_weight: glorot(input_dim, width, rng),
            encoder_bias: Array1::zeros(width),
            decoder_weight: glorot(width, input_dim, rng),
            decoder_bias: Array1::zeros(input_dim),
            optimizer: Adam::new(lr),
            enc_w_state: AdamState::new(ndarray::Ix2(input_dim, width)),
            enc_b_state: AdamState::new(ndarray::Ix1(width)),
            dec_w_state: AdamState::new(ndarray::Ix2(width, input_dim)),
            dec_b_state: AdamState::new(ndarray::Ix1(input_dim)),
        }
    }

    fn width(&self) -> usize {
        self.latent.0 * self.latent.1
    }

    fn check_input(&self, x: &ArrayView2<'_, f32>) -> Result<()> {
        if x.ncols() != self.input_dim() {
            return Err(TrainError::Shape(format!(
                "expected input width {}, got {}",
                self.input_dim(),
                x.ncols()
            )));
        }
        Ok(())
    }

    fn flatten_latent(&self, codes: &ArrayView3<'_, f32>) -> Result<Array2<f32>> {
        let (b, t, d) = codes.dim();
        if (t, d) != self.latent {
            return Err(TrainError::Shape(format!(
                "expected latent shape {:?}, got {:?}",
                self.latent,
                (t, d)
            )));
        }
        Ok(codes.to_shape((b, t * d))?.into_owned())
    }
}

impl Autoencoder for LinearAutoencoder {
    type Grads = LinearGrads;

    fn input_dim(&self) -> usize {
        self.encoder_weight.nrows()
    }

    fn latent_shape(&self) -> (usize, usize) {
        self.latent
    }

    fn encode(&self, x: ArrayView2<'_, f32>) -> Result<Array3<f32>> {
        self.check_input(&x)?;
        let z = x.dot(&self.encoder_weight) + &self.encoder_bias;
        let (t, d) = self.latent;
        Ok(z.into_shape_with_order((x.nrows(), t, d))?)
    }

    fn decode(&self, codes: ArrayView3<'_, f32>) -> Result<Array2<f32>> {
        let flat = self.flatten_latent(&codes)?;
        Ok(flat.dot(&self.decoder_weight) + &self.decoder_bias)
    }

    fn decoder_backward(
        &self,
        codes: ArrayView3<'_, f32>,
        grad_output: ArrayView2<'_, f32>,
    ) -> Result<(LinearGrads, Array3<f32>)> {
        let flat = self.flatten_latent(&codes)?;
        if grad_output.dim() != (flat.nrows(), self.input_dim()) {
            return Err(TrainError::Shape(format!(
                "decoder grad {:?} does not match output {:?}",
                grad_output.dim(),
                (flat.nrows(), self.input_dim())
            )));
        }
        let grads = LinearGrads {
            encoder_weight: Array2::zeros(self.encoder_weight.raw_dim()),
            encoder_bias: Array1::zeros(self.width()),
            decoder_weight: flat.t().dot(&grad_output),
            decoder_bias: grad_output.sum_axis(Axis(0)),
        };
        let grad_codes = grad_output.dot(&self.decoder_weight.t());
        let (t, d) = self.latent;
        Ok((grads, grad_codes.into_shape_with_order((flat.nrows(), t, d))?))
    }

    fn encoder_backward(
        &self,
        x: ArrayView2<'_, f32>,
        grad_latent: ArrayView3<'_, f32>,
        grads: &mut LinearGrads,
    ) -> Result<()> {
        self.check_input(&x)?;
        let flat = self.flatten_latent(&grad_latent)?;
        if flat.nrows() != x.nrows() {
            return Err(TrainError::Shape(format!(
                "latent grad batch {} does not match input batch {}",
                flat.nrows(),
                x.nrows()
            )));
        }
        grads.encoder_weight += &x.t().dot(&flat);
        grads.encoder_bias += &flat.sum_axis(Axis(0));
        Ok(())
    }

    fn apply_gradients(&mut self, grads: &LinearGrads) {
        let opt = &self.optimizer;
        opt.step(&mut self.encoder_weight, &grads.encoder_weight, &mut self.enc_w_state);
        opt.step(&mut self.encoder_bias, &grads.encoder_bias, &mut self.enc_b_state);
        opt.step(&mut self.decoder_weight, &grads.decoder_weight, &mut self.dec_w_state);
        opt.step(&mut self.decoder_bias, &grads.decoder_bias, &mut self.dec_b_state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn model() -> LinearAutoencoder {
        let mut rng = StdRng::seed_from_u64(42);
        LinearAutoencoder::new(6, 2, 3, 1e-2, &mut rng)
    }

    #[test]
    fn forward_shapes() {
        let ae = model();
        let x = Array2::<f32>::ones((5, 6));
        let z = ae.encode(x.view()).unwrap();
        assert_eq!(z.dim(), (5, 2, 3));
        let x_hat = ae.decode(z.view()).unwrap();
        assert_eq!(x_hat.dim(), (5, 6));
    }

    #[test]
    fn wrong_input_width() {
        let ae = model();
        assert!(matches!(ae.encode(Array2::<f32>::zeros((2, 4)).view()), Err(TrainError::Shape(_))));
        assert!(ae.decode(Array3::<f32>::zeros((2, 3, 2)).view()).is_err());
    }

    #[test]
    fn decoder_grad_matches_finite_difference() {
        let ae = model();
        let codes = array![[[0.3f32, -0.2, 0.5], [0.1, 0.0, -0.4]]];
        let target = Array2::<f32>::zeros((1, 6));

        // loss = 0.5 · Σ x̂², so dL/dx̂ = x̂
        let loss = |ae: &LinearAutoencoder, c: &Array3<f32>| -> f32 {
            ae.decode(c.view()).unwrap().mapv(|v| 0.5 * v * v).sum()
        };
        let out = ae.decode(codes.view()).unwrap();
        let grad_out = &out - &target;
        let (_, grad_codes) = ae.decoder_backward(codes.view(), grad_out.view()).unwrap();

        let h = 1e-3f32;
        let mut bumped = codes.clone();
        bumped[[0, 1, 2]] += h;
        let numeric = (loss(&ae, &bumped) - loss(&ae, &codes)) / h;
        assert!(
            (numeric - grad_codes[[0, 1, 2]]).abs() < 1e-2,
            "numeric {numeric} vs analytic {}",
            grad_codes[[0, 1, 2]]
        );
    }

    #[test]
    fn apply_gradients_moves_parameters() {
        let mut ae = model();
        let x = Array2::<f32>::ones((3, 6));
        let z = ae.encode(x.view()).unwrap();
        let grad_out = Array2::<f32>::ones((3, 6));
        let (mut grads, grad_z) = ae.decoder_backward(z.view(), grad_out.view()).unwrap();
        ae.encoder_backward(x.view(), grad_z.view(), &mut grads).unwrap();

        let before = ae.decoder_bias.clone();
        ae.apply_gradients(&grads);
        // positive gradient on every bias entry → every entry decreases
        assert!(ae.decoder_bias.iter().zip(before.iter()).all(|(a, b)| a < b));
    }
}
