// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// What gets saved per checkpoint:
//   1. Model weights (.mpk file)  — all learned parameters
//   2. latest_epoch.json          — which epoch was last saved
//   3. hyper_params.json          — architecture + schedule
//
// Why save the hyper parameters separately?
//   When loading a checkpoint later, we need the exact network
//   shape (layer sizes, dropout) to rebuild the model before
//   the weights can be loaded into it.
//
// Burn's CompactRecorder:
//   - Serialises model parameters to MessagePack format
//   - Type-safe: loading fails if the architecture doesn't match
//
// File naming convention:
//   checkpoints/
//     model_epoch_1.mpk      ← weights after epoch 1
//     model_epoch_2.mpk      ← weights after epoch 2
//     ...
//     latest_epoch.json      ← contains the number of latest epoch
//     hyper_params.json      ← network shape + training schedule
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};
use serde_json;

use crate::infra::hyper_params::HyperParams;
use crate::ml::model::FaceNet;

/// Manages saving and loading of model checkpoints.
/// All files are stored in the configured directory.
pub struct CheckpointManager {
    /// Path to the directory where checkpoints are stored
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a new CheckpointManager.
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<String>) -> Self {
        let dir = PathBuf::from(dir.into());
        // create_dir_all creates parent directories too, like `mkdir -p`
        // .ok() ignores the error if the directory already exists
        fs::create_dir_all(&dir).ok();
        Self { dir }
    }

    /// Save model weights for a given epoch.
    ///
    /// Uses Burn's CompactRecorder which:
    ///   1. Calls model.into_record() to extract all parameters
    ///   2. Serialises to MessagePack binary format
    ///   3. Writes to {dir}/model_epoch_{epoch}.mpk
    pub fn save_model<B: AutodiffBackend>(&self, model: &FaceNet<B>, epoch: usize) -> Result<()> {
        // Build the file path (without extension — recorder adds it)
        let path = self.dir.join(format!("model_epoch_{epoch}"));

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| {
                format!("Failed to save checkpoint to '{}'", path.display())
            })?;

        // Update the latest epoch pointer
        let latest_path = self.dir.join("latest_epoch.json");
        fs::write(&latest_path, serde_json::to_string(&epoch)?)
            .with_context(|| "Failed to write latest_epoch.json")?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Load model weights from the latest saved checkpoint.
    ///
    /// Steps:
    ///   1. Read latest_epoch.json to find the epoch number
    ///   2. Load the corresponding .mpk file
    ///   3. Call model.load_record() to restore weights
    ///
    /// The model parameter must have the correct architecture
    /// (matching the saved checkpoint) or loading will fail.
    pub fn load_model<B: Backend>(
        &self,
        model:  FaceNet<B>,
        device: &B::Device,
    ) -> Result<FaceNet<B>> {
        // Find out which epoch was saved last
        let epoch = self.latest_epoch()?;
        let path  = self.dir.join(format!("model_epoch_{epoch}"));

        tracing::info!("Loading checkpoint from epoch {}", epoch);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?",
                    path.display())
            })?;

        // load_record() returns a new model with the loaded weights
        Ok(model.load_record(record))
    }

    /// Save the hyper parameters to JSON.
    ///
    /// Called before training starts so a checkpoint directory is
    /// always self-describing.
    pub fn save_hyper_params(&self, params: &HyperParams) -> Result<()> {
        let path = self.dir.join("hyper_params.json");

        let json = serde_json::to_string_pretty(params)?;
        fs::write(&path, json)
            .with_context(|| {
                format!("Cannot write hyper parameters to '{}'", path.display())
            })?;

        tracing::debug!("Saved hyper parameters to '{}'", path.display());
        Ok(())
    }

    /// Load the hyper parameters stored next to the checkpoints.
    pub fn load_hyper_params(&self) -> Result<HyperParams> {
        let path = self.dir.join("hyper_params.json");

        let json = fs::read_to_string(&path)
            .with_context(|| {
                format!(
                    "Cannot read hyper parameters from '{}'. \
                     Make sure you have run 'train' in this directory before.",
                    path.display()
                )
            })?;

        Ok(serde_json::from_str(&json)?)
    }

    /// Read latest_epoch.json and return the epoch number.
    /// Returns an error if training hasn't been run yet.
    fn latest_epoch(&self) -> Result<usize> {
        let path = self.dir.join("latest_epoch.json");

        let s = fs::read_to_string(&path)
            .with_context(|| {
                "Cannot find 'latest_epoch.json'. \
                 Have you run 'train' first?"
            })?;

        Ok(serde_json::from_str::<usize>(&s)?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::FaceNetConfig;
    use burn::backend::ndarray::NdArrayDevice;

    type TestBackend = burn::backend::Autodiff<burn::backend::NdArray>;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("lfw_pipeline_ckpt_{}_{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_save_then_load_restores_the_weights() {
        let dir     = temp_dir("roundtrip");
        let device  = NdArrayDevice::Cpu;
        let manager = CheckpointManager::new(dir.to_string_lossy().to_string());

        // Dropout 0.0 keeps the forward pass deterministic
        let model: FaceNet<TestBackend> = FaceNetConfig::new(4, 6, 3, 0.0).init(&device);
        manager.save_model(&model, 1).unwrap();

        let weight_file_exists = fs::read_dir(&dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .any(|entry| entry.file_name().to_string_lossy().starts_with("model_epoch_1"));
        assert!(weight_file_exists);

        let input = Tensor::<TestBackend, 2>::from_floats([[0.1, 0.2, 0.3, 0.4]], &device);
        let expected: Vec<f32> = model.forward(input.clone()).into_data().to_vec().unwrap();

        // A freshly initialised net has different weights until loaded
        let fresh: FaceNet<TestBackend> = FaceNetConfig::new(4, 6, 3, 0.0).init(&device);
        let restored = manager.load_model(fresh, &device).unwrap();
        let actual: Vec<f32> = restored.forward(input).into_data().to_vec().unwrap();

        assert_eq!(expected.len(), actual.len());
        for (e, a) in expected.iter().zip(actual.iter()) {
            assert!((e - a).abs() < 1e-6);
        }

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_hyper_params_round_trip() {
        let dir     = temp_dir("params");
        let manager = CheckpointManager::new(dir.to_string_lossy().to_string());

        let mut params = HyperParams::default();
        params.arch.hidden_dimension = 99;
        manager.save_hyper_params(&params).unwrap();

        let loaded = manager.load_hyper_params().unwrap();
        assert_eq!(loaded.arch.hidden_dimension, 99);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_loading_before_any_save_is_an_error() {
        let dir     = temp_dir("empty");
        let device  = NdArrayDevice::Cpu;
        let manager = CheckpointManager::new(dir.to_string_lossy().to_string());

        let fresh: FaceNet<TestBackend> = FaceNetConfig::new(4, 6, 3, 0.0).init(&device);
        assert!(manager.load_model(fresh, &device).is_err());
        assert!(manager.load_hyper_params().is_err());

        let _ = fs::remove_dir_all(&dir);
    }
}
