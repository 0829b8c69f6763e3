// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a full training run in order:
//
//   Step 1: Load hyper parameters      (Layer 6 - infra)
//   Step 2: Set up checkpointing       (Layer 6 - infra)
//   Step 3: Set up metrics logging     (Layer 6 - infra)
//   Step 4: Run the training loop      (Layer 5 - ml)
//
// The training loop itself opens the shard streams (Layer 4),
// so this use case only wires configuration together.
//
// Reference: Burn Book §5 (Training)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::infra::{
    checkpoint::CheckpointManager,
    hyper_params::HyperParams,
    metrics::MetricsLogger,
};
use crate::ml::trainer::run_training;

// ─── Training Configuration ──────────────────────────────────────────────────
// Where to find the data and where to put the artefacts.
// The numeric knobs all live in the hyper parameter file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub hyper_params_path: Option<String>,
    pub records_dir:       String,
    pub checkpoint_dir:    String,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            hyper_params_path: None,
            records_dir:       "data/records".to_string(),
            checkpoint_dir:    "checkpoints".to_string(),
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
// Owns the config and runs the full training pipeline.
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    /// Create a new TrainUseCase with the given configuration
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;

        // ── Step 1: Load hyper parameters ────────────────────────────────────
        // An explicit file wins; otherwise the built-in defaults apply.
        let params = match &cfg.hyper_params_path {
            Some(path) => {
                tracing::info!("Loading hyper parameters from '{}'", path);
                HyperParams::load(Path::new(path))?
            }
            None => {
                tracing::info!("No hyper parameter file given, using defaults");
                HyperParams::default()
            }
        };

        // ── Step 2: Set up checkpointing ─────────────────────────────────────
        // The hyper parameters are stored next to the weights so the
        // checkpoint directory describes itself.
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir);
        ckpt_manager.save_hyper_params(&params)?;

        // ── Step 3: Set up metrics logging ───────────────────────────────────
        let metrics = MetricsLogger::new(&cfg.checkpoint_dir)?;

        // ── Step 4: Run training loop (Layer 5) ──────────────────────────────
        run_training(&params, Path::new(&cfg.records_dir), ckpt_manager, metrics)?;

        Ok(())
    }
}
