//! The VQ-VAE training step.
//!
//! ```text
//! Step 1  z  = encode(x)                         [B, T, D]
//! Step 2  q  = nearest codes of z                (codebook read)
//! Step 3  x̂ = decode(z + sg(q − z))
//! Step 4  loss = mse(x̂, x) + β · mse(sg(q), z)
//! Step 5  backprop into encoder / decoder, straight-through at the quantizer
//! Step 6  optimizer step
//! Step 7  EMA update of the codebook           (codebook write)
//! ```
//!
//! `step` takes `&mut self`, so one step finishes before the next can start.

use std::time::Instant;

use ndarray::ArrayView2;
use rand::Rng;
use tracing::info;

use vqema_core::{encoder_grad, reconstruction_grad, straight_through, VectorQuantizer, VqLoss};

use crate::autoencoder::Autoencoder;
use crate::data::ClusteredDataset;
use crate::{Result, TrainError};

/// Outcome of a single step.
#[derive(Debug, Clone, Copy)]
pub struct StepReport {
    pub loss: VqLoss,
    pub unused_codes: usize,
}

/// Batch-averaged values for one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochSummary {
    /// 1-based.
    pub epoch: usize,
    pub seconds: f64,
    pub loss: f32,
    pub reconstruction: f32,
    pub commitment: f32,
    pub perplexity: f32,
    /// Unused codes in the epoch's last batch.
    pub unused_codes: usize,
}

pub struct Trainer<A: Autoencoder> {
    model: A,
    vq: VectorQuantizer,
}

impl<A: Autoencoder> Trainer<A> {
    pub fn new(model: A, vq: VectorQuantizer) -> Result<Self> {
        let (_, code_size) = model.latent_shape();
        if code_size != vq.config().code_size {
            return Err(TrainError::Shape(format!(
                "model latent code size {} does not match quantizer code size {}",
                code_size,
                vq.config().code_size
            )));
        }
        Ok(Self { model, vq })
    }

    pub fn model(&self) -> &A {
        &self.model
    }

    pub fn quantizer(&self) -> &VectorQuantizer {
        &self.vq
    }

    pub fn into_parts(self) -> (A, VectorQuantizer) {
        (self.model, self.vq)
    }

    /// Run one full step on a batch `[B, P]`.
    pub fn step(&mut self, x: ArrayView2<'_, f32>) -> Result<StepReport> {
        let beta = self.vq.config().beta;

        let z = self.model.encode(x)?;
        let q = self.vq.forward(z.view())?;
        let decoder_input = straight_through(z.view(), &q)?;
        let x_hat = self.model.decode(decoder_input.view())?;
        let loss = VqLoss::compute(beta, x, x_hat.view(), z.view(), &q)?;

        let grad_out = reconstruction_grad(x_hat.view(), x)?;
        let (mut grads, grad_q) = self.model.decoder_backward(decoder_input.view(), grad_out.view())?;
        let grad_z = encoder_grad(grad_q.view(), z.view(), &q, beta)?;
        self.model.encoder_backward(x, grad_z.view(), &mut grads)?;
        self.model.apply_gradients(&grads);

        let ema = self.vq.update(&q, z.view())?;

        Ok(StepReport {
            loss,
            unused_codes: ema.unused_codes,
        })
    }

    /// One pass over shuffled batches of `data`.
    pub fn run_epoch(
        &mut self,
        epoch: usize,
        data: &ClusteredDataset,
        batch_size: usize,
        rng: &mut impl Rng,
    ) -> Result<EpochSummary> {
        let start = Instant::now();
        let batches = data.batches(batch_size, rng);
        if batches.is_empty() {
            return Err(TrainError::InvalidArgument("dataset is empty".into()));
        }

        let (mut loss, mut recon, mut commit, mut ppl) = (0.0f32, 0.0f32, 0.0f32, 0.0f32);
        let mut unused_codes = 0;
        for batch in &batches {
            let report = self.step(batch.view())?;
            loss += report.loss.total;
            recon += report.loss.reconstruction;
            commit += report.loss.commitment;
            ppl += report.loss.perplexity;
            unused_codes = report.unused_codes;
        }

        let n = batches.len() as f32;
        Ok(EpochSummary {
            epoch,
            seconds: start.elapsed().as_secs_f64(),
            loss: loss / n,
            reconstruction: recon / n,
            commitment: commit / n,
            perplexity: ppl / n,
            unused_codes,
        })
    }

    /// Train for `epochs` epochs, logging each one.
    pub fn fit(
        &mut self,
        data: &ClusteredDataset,
        epochs: usize,
        batch_size: usize,
        rng: &mut impl Rng,
    ) -> Result<Vec<EpochSummary>> {
        let mut history = Vec::with_capacity(epochs);
        for epoch in 1..=epochs {
            let summary = self.run_epoch(epoch, data, batch_size, rng)?;
            let eta = summary.seconds * (epochs - epoch) as f64;
            info!(
                epoch,
                time = format!("{:.2}", summary.seconds),
                eta = format!("{:.2}", eta),
                loss = format!("{:.4}", summary.loss),
                perplexity = format!("{:.2}", summary.perplexity),
                unused_codes = summary.unused_codes,
                "Epoch complete"
            );
            history.push(summary);
        }
        Ok(history)
    }
}
