//! Codebook checkpoints.
//!
//! A `.json` extension selects JSON, anything else bincode. Loading checks
//! that the stored buffers still agree with the stored config.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{CodebookState, QuantizerConfig, Result, VectorQuantizer, VqError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub config: QuantizerConfig,
    pub state: CodebookState,
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

impl Checkpoint {
    pub fn from_quantizer(vq: &VectorQuantizer) -> Self {
        Self {
            config: vq.config().clone(),
            state: vq.state().clone(),
        }
    }

    pub fn into_quantizer(self) -> Result<VectorQuantizer> {
        VectorQuantizer::from_state(self.config, self.state)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut w = BufWriter::new(File::create(path)?);
        if is_json(path) {
            serde_json::to_writer(&mut w, self)?;
        } else {
            bincode::serialize_into(&mut w, self)?;
        }
        w.flush()?;
        info!(
            path = %path.display(),
            steps = self.state.steps(),
            "Codebook checkpoint written"
        );
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let r = BufReader::new(File::open(path)?);
        let ckpt: Checkpoint = if is_json(path) {
            serde_json::from_reader(r)?
        } else {
            bincode::deserialize_from(r)?
        };
        ckpt.config
            .validate()
            .and_then(|_| ckpt.state.check_shapes(&ckpt.config))
            .map_err(|e| VqError::Checkpoint(format!("{}: {e}", path.display())))?;
        Ok(ckpt)
    }
}
