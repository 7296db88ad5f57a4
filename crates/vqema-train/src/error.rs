use thiserror::Error;
use vqema_core::VqError;

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("Quantizer error: {0}")]
    Vq(#[from] VqError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Array layout error: {0}")]
    Layout(#[from] ndarray::ShapeError),

    #[error("Shape error: {0}")]
    Shape(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
