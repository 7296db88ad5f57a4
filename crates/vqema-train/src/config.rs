//! Training configuration loaded from environment variables, then overridden
//! by command-line flags.
//!
//! | Variable              | Default         | Description                          |
//! |-----------------------|-----------------|--------------------------------------|
//! | `VQEMA_NUM_CODES`     | `123`           | Codebook size K                      |
//! | `VQEMA_CODE_SIZE`     | `16`            | Code dimensionality D                |
//! | `VQEMA_LATENT_SIZE`   | `1`             | Latent positions T per example       |
//! | `VQEMA_BETA`          | `0.25`          | Commitment loss weight               |
//! | `VQEMA_DECAY`         | `0.99`          | EMA decay                            |
//! | `VQEMA_ZERO_DEBIAS`   | `false`         | Zero-debiased EMA buffers            |
//! | `VQEMA_LEARNING_RATE` | `0.001`         | Adam learning rate                   |
//! | `VQEMA_BATCH_SIZE`    | `256`           | Mini-batch size                      |
//! | `VQEMA_EPOCHS`        | `100`           | Training epochs                      |
//! | `VQEMA_SEED`          | `42`            | RNG seed                             |
//! | `VQEMA_SAMPLES`       | `4096`          | Synthetic dataset size               |
//! | `VQEMA_FEATURES`      | `64`            | Synthetic input width P              |
//! | `VQEMA_CLUSTERS`      | `10`            | Synthetic cluster count              |
//! | `VQEMA_SPREAD`        | `0.1`           | Half-width of the noise per cluster  |
//! | `VQEMA_OUTPUT`        | `telemetry.csv` | Per-epoch CSV path                   |
//! | `VQEMA_CHECKPOINT`    | unset           | Codebook checkpoint path             |
//! | `VQEMA_LOG_LEVEL`     | `info`          | tracing filter                       |

use std::path::PathBuf;

use vqema_core::{EmaMode, QuantizerConfig};

use crate::{Result, TrainError};

pub const USAGE: &str = "Usage: vqema-train [--epochs N] [--batch-size N] [--codes K] [--code-size D] \
[--seed N] [--output PATH] [--checkpoint PATH] [--zero-debias]";

#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub quantizer: QuantizerConfig,
    pub latent_size: usize,
    pub learning_rate: f32,
    pub batch_size: usize,
    pub epochs: usize,
    pub seed: u64,
    pub samples: usize,
    pub features: usize,
    pub clusters: usize,
    pub spread: f32,
    pub output_csv: PathBuf,
    pub checkpoint: Option<PathBuf>,
    /// Tracing filter string, e.g. `"vqema_core=debug,info"`.
    pub log_level: String,
}

/// What the command line asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Train,
    Help,
}

impl TrainConfig {
    pub fn from_env() -> Self {
        let ema_mode = if env_bool("VQEMA_ZERO_DEBIAS") {
            EmaMode::ZeroDebiased
        } else {
            EmaMode::Plain
        };
        Self {
            quantizer: QuantizerConfig {
                num_codes: env_parse("VQEMA_NUM_CODES", 123),
                code_size: env_parse("VQEMA_CODE_SIZE", 16),
                beta:      env_parse("VQEMA_BETA", 0.25),
                decay:     env_parse("VQEMA_DECAY", 0.99),
                ema_mode,
            },
            latent_size:   env_parse("VQEMA_LATENT_SIZE", 1),
            learning_rate: env_parse("VQEMA_LEARNING_RATE", 1e-3),
            batch_size:    env_parse("VQEMA_BATCH_SIZE", 256),
            epochs:        env_parse("VQEMA_EPOCHS", 100),
            seed:          env_parse("VQEMA_SEED", 42),
            samples:       env_parse("VQEMA_SAMPLES", 4096),
            features:      env_parse("VQEMA_FEATURES", 64),
            clusters:      env_parse("VQEMA_CLUSTERS", 10),
            spread:        env_parse("VQEMA_SPREAD", 0.1),
            output_csv:    PathBuf::from(env_str("VQEMA_OUTPUT", "telemetry.csv")),
            checkpoint:    std::env::var("VQEMA_CHECKPOINT").ok().map(PathBuf::from),
            log_level:     env_str("VQEMA_LOG_LEVEL", "info"),
        }
    }

    /// Apply command-line flags (without the program name) on top of the
    /// current values.
    pub fn apply_args<S: AsRef<str>>(&mut self, args: &[S]) -> Result<Command> {
        let mut i = 0;
        while i < args.len() {
            let flag = args[i].as_ref();
            match flag {
                "--epochs" => self.epochs = parse_flag(flag, next_value(args, &mut i)?)?,
                "--batch-size" => self.batch_size = parse_flag(flag, next_value(args, &mut i)?)?,
                "--codes" => self.quantizer.num_codes = parse_flag(flag, next_value(args, &mut i)?)?,
                "--code-size" => self.quantizer.code_size = parse_flag(flag, next_value(args, &mut i)?)?,
                "--seed" => self.seed = parse_flag(flag, next_value(args, &mut i)?)?,
                "--output" => self.output_csv = PathBuf::from(next_value(args, &mut i)?),
                "--checkpoint" => self.checkpoint = Some(PathBuf::from(next_value(args, &mut i)?)),
                "--zero-debias" => self.quantizer.ema_mode = EmaMode::ZeroDebiased,
                "--help" | "-h" => return Ok(Command::Help),
                other => {
                    return Err(TrainError::InvalidArgument(format!("unknown argument: {other}")));
                }
            }
            i += 1;
        }
        Ok(Command::Train)
    }

    pub fn validate(&self) -> Result<()> {
        self.quantizer.validate()?;
        if self.batch_size == 0 || self.latent_size == 0 || self.features == 0 || self.samples == 0 {
            return Err(TrainError::InvalidArgument(
                "batch size, latent size, features and samples must be > 0".into(),
            ));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(TrainError::InvalidArgument(format!(
                "learning rate must be > 0, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

/// Advance past a flag and return its value.
fn next_value<'a, S: AsRef<str>>(args: &'a [S], i: &mut usize) -> Result<&'a str> {
    let flag = args[*i].as_ref();
    *i += 1;
    args.get(*i)
        .map(|s| s.as_ref())
        .ok_or_else(|| TrainError::InvalidArgument(format!("{flag} needs a value")))
}

fn parse_flag<T: std::str::FromStr>(flag: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| TrainError::InvalidArgument(format!("{flag}: cannot parse '{raw}'")))
}

fn env_bool(key: &str) -> bool {
    std::env::var(key).map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = TrainConfig::from_env();
        assert!(cfg.batch_size > 0);
        assert!(cfg.epochs > 0);
        assert!(cfg.learning_rate > 0.0);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn env_override_applied() {
        std::env::set_var("VQEMA_SPREAD", "0.3");
        let cfg = TrainConfig::from_env();
        assert!((cfg.spread - 0.3).abs() < 1e-6);
        std::env::remove_var("VQEMA_SPREAD");
    }

    #[test]
    fn unparseable_env_falls_back() {
        std::env::set_var("VQEMA_FEATURES", "many");
        let cfg = TrainConfig::from_env();
        assert_eq!(cfg.features, 64);
        std::env::remove_var("VQEMA_FEATURES");
    }

    #[test]
    fn flags_override_values() {
        let mut cfg = TrainConfig::from_env();
        let cmd = cfg
            .apply_args(&["--epochs", "3", "--codes", "8", "--zero-debias", "--checkpoint", "cb.json"])
            .unwrap();
        assert_eq!(cmd, Command::Train);
        assert_eq!(cfg.epochs, 3);
        assert_eq!(cfg.quantizer.num_codes, 8);
        assert_eq!(cfg.quantizer.ema_mode, EmaMode::ZeroDebiased);
        assert_eq!(cfg.checkpoint, Some(PathBuf::from("cb.json")));
    }

    #[test]
    fn help_and_errors() {
        let mut cfg = TrainConfig::from_env();
        assert_eq!(cfg.apply_args(&["-h"]).unwrap(), Command::Help);
        assert!(cfg.apply_args(&["--epochs"]).is_err());
        assert!(cfg.apply_args(&["--epochs", "lots"]).is_err());
        assert!(cfg.apply_args(&["--frobnicate"]).is_err());
    }

    #[test]
    fn validate_rejects_zero_batch() {
        let mut cfg = TrainConfig::from_env();
        cfg.batch_size = 0;
        assert!(cfg.validate().is_err());
    }
}
