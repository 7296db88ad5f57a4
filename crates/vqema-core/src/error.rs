use thiserror::Error;

#[derive(Debug, Error)]
pub enum VqError {
    #[error("shape mismatch in {context}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("array layout error: {0}")]
    Layout(#[from] ndarray::ShapeError),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("checkpoint error: {0}")]
    Checkpoint(String),
}

impl VqError {
    pub(crate) fn shape(context: &'static str, expected: &[usize], got: &[usize]) -> Self {
        VqError::ShapeMismatch {
            context,
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }
}

impl From<serde_json::Error> for VqError {
    fn from(e: serde_json::Error) -> Self {
        VqError::Serialization(e.to_string())
    }
}

impl From<bincode::Error> for VqError {
    fn from(e: bincode::Error) -> Self {
        VqError::Serialization(e.to_string())
    }
}
