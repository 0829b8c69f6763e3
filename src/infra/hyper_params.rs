// ============================================================
// Layer 6 — Hyper Parameter Store
// ============================================================
// Every knob of the pipeline lives in one JSON file so a whole
// training run can be reproduced from a single artefact.
//
// The file has two sections:
//   - arch:  the network shape (layer sizes, dropout)
//   - train: the optimisation schedule (learning rate, RMSProp
//            coefficients, batch and step counts, reader threads)
//
// A missing file is not an error at this layer — the caller
// decides whether to fall back to Default::default().
//
// Reference: Rust Book §9 (Error Handling)
//            serde_json crate documentation

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::domain::record::ElementType;

/// The network shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchParams {
    /// Flattened pixels per example, e.g. 784 for 28 × 28 images
    pub input_dimension: usize,

    /// Width of both hidden layers
    pub hidden_dimension: usize,

    /// Number of identities = number of output logits
    pub output_dimension: usize,

    /// Dropout probability between layers, 0.0 disables it
    pub dropout: f64,
}

/// The optimisation schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainParams {
    /// RMSProp learning rate
    pub learning_rate: f64,

    /// RMSProp discounting factor for the squared-gradient average
    pub decay: f64,

    /// RMSProp momentum, 0.0 for the plain update
    pub momentum: f64,

    /// Examples per batch
    pub batch_size: usize,

    /// Number of epochs to train
    pub epochs: usize,

    /// Optimiser steps per epoch
    pub steps_per_epoch: usize,

    /// Validation batches evaluated after each epoch
    pub validation_steps: usize,

    /// Concurrent shard reader threads per stream
    pub num_reader_threads: usize,

    /// Element type the feature blobs were written with
    pub feature_type: ElementType,

    /// Element type the label blobs were written with
    pub label_type: ElementType,
}

/// Everything a training run needs, ready for JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HyperParams {
    pub arch:  ArchParams,
    pub train: TrainParams,
}

impl Default for ArchParams {
    fn default() -> Self {
        Self {
            input_dimension:  784,
            hidden_dimension: 128,
            output_dimension: 10,
            dropout:          0.1,
        }
    }
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            learning_rate:      1e-3,
            decay:              0.9,
            momentum:           0.0,
            batch_size:         32,
            epochs:             10,
            steps_per_epoch:    100,
            validation_steps:   20,
            num_reader_threads: 4,
            feature_type:       ElementType::F32,
            label_type:         ElementType::F32,
        }
    }
}

impl HyperParams {
    /// Read hyper parameters from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read hyper parameters from '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("'{}' is not a valid hyper parameter file", path.display()))
    }

    /// Write hyper parameters to a JSON file (pretty-printed).
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Cannot write hyper parameters to '{}'", path.display()))?;
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_file(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("lfw_pipeline_params_{}_{}.json", tag, std::process::id()))
    }

    #[test]
    fn test_defaults_are_consistent() {
        let params = HyperParams::default();
        assert_eq!(params.arch.input_dimension, 784);
        assert_eq!(params.train.batch_size, 32);
        assert!(params.train.decay > 0.0 && params.train.decay < 1.0);
        assert!(params.train.num_reader_threads >= 1);
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let path = temp_file("roundtrip");
        let mut params = HyperParams::default();
        params.arch.output_dimension = 42;
        params.train.learning_rate   = 0.5;

        params.save(&path).unwrap();
        let loaded = HyperParams::load(&path).unwrap();
        assert_eq!(loaded.arch.output_dimension, 42);
        assert_eq!(loaded.train.learning_rate, 0.5);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let path = temp_file("malformed");
        fs::write(&path, "{ not json").unwrap();

        let err = HyperParams::load(&path).unwrap_err();
        assert!(err.to_string().contains("not a valid hyper parameter file"));

        let _ = fs::remove_file(&path);
    }
}
