//! # vqema-train
//!
//! ## Usage
//!
//! ```text
//! vqema-train --epochs 20 --codes 64 --output telemetry.csv
//! VQEMA_ZERO_DEBIAS=1 vqema-train --checkpoint codebook.bin
//! ```
//!
//! Every flag has an environment counterpart, see [`vqema_train::config`].

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use vqema_core::{Checkpoint, VectorQuantizer};
use vqema_train::telemetry::write_csv;
use vqema_train::{ClusteredDataset, Command, LinearAutoencoder, TrainConfig, Trainer};

fn main() -> anyhow::Result<()> {
    let mut config = TrainConfig::from_env();
    let args: Vec<String> = std::env::args().skip(1).collect();
    if config.apply_args(&args[..])? == Command::Help {
        eprintln!("{}", vqema_train::config::USAGE);
        return Ok(());
    }
    config.validate()?;

    // ── Tracing ───────────────────────────────────────────────────────────────
    let filter = EnvFilter::try_new(&config.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .compact()
        .init();

    info!(
        version    = env!("CARGO_PKG_VERSION"),
        num_codes  = config.quantizer.num_codes,
        code_size  = config.quantizer.code_size,
        ema_mode   = ?config.quantizer.ema_mode,
        epochs     = config.epochs,
        batch_size = config.batch_size,
        seed       = config.seed,
        "vqema-train starting"
    );

    // ── Data + model ──────────────────────────────────────────────────────────
    let mut rng = StdRng::seed_from_u64(config.seed);
    let data = ClusteredDataset::generate(
        config.samples,
        config.features,
        config.clusters,
        (-1.0, 1.0),
        config.spread,
        &mut rng,
    );
    let model = LinearAutoencoder::new(
        config.features,
        config.latent_size,
        config.quantizer.code_size,
        config.learning_rate,
        &mut rng,
    );
    let vq = VectorQuantizer::new(config.quantizer.clone(), &mut rng)?;
    let mut trainer = Trainer::new(model, vq)?;

    // ── Train ─────────────────────────────────────────────────────────────────
    let history = trainer.fit(&data, config.epochs, config.batch_size, &mut rng)?;

    write_csv(&config.output_csv, &history)?;
    info!(path = %config.output_csv.display(), rows = history.len(), "Telemetry written");

    if let Some(path) = &config.checkpoint {
        Checkpoint::from_quantizer(trainer.quantizer()).save(path)?;
    }

    if let Some(last) = history.last() {
        info!(
            loss         = format!("{:.4}", last.loss),
            perplexity   = format!("{:.2}", last.perplexity),
            unused_codes = last.unused_codes,
            "Training finished"
        );
    }
    Ok(())
}
