//! # vqema-train
//!
//! End-to-end harness for the EMA vector quantizer: a dense autoencoder on
//! synthetic clustered data, trained with Adam, with the codebook refreshed by
//! [`vqema_core::VectorQuantizer::update`] after every optimizer step.
//!
//! Output: one CSV row per epoch (see [`telemetry`]) and, optionally, a
//! codebook checkpoint.

pub mod autoencoder;
pub mod config;
pub mod data;
pub mod error;
pub mod optimizer;
pub mod telemetry;
pub mod trainer;

pub use autoencoder::{Autoencoder, LinearAutoencoder, LinearGrads};
pub use config::{Command, TrainConfig};
pub use data::ClusteredDataset;
pub use error::TrainError;
pub use optimizer::{Adam, AdamState};
pub use trainer::{EpochSummary, StepReport, Trainer};

pub type Result<T> = std::result::Result<T, TrainError>;
