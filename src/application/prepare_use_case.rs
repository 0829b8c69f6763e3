// ============================================================
// Layer 2 — PrepareUseCase
// ============================================================
// Turns a raw IDX image archive into shard files ready for
// training, in order:
//
//   Step 1: Load IDX images + labels   (Layer 4 - data)
//   Step 2: Sanity-check the archives  (here)
//   Step 3: Pair into records          (Layer 3 - domain)
//   Step 4: Split train/validation     (Layer 4 - data)
//   Step 5: Write the shard files      (Layer 4 - data)
//
// The records carry raw image bytes and a single class byte;
// the conversion hooks passed to the writer turn those into
// the f32 pixels and one-hot rows the trainer consumes.
//
// Reference: Rust Book §13 (Iterators and Closures)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::data::{
    dataset::InMemorySource,
    idx::{read_idx_images, read_idx_labels},
    splitter::split_train_val,
    writer::write_tf_records,
};
use crate::domain::record::{normalize_pixels, one_hot_bytes, Record};

// ─── Preparation Configuration ───────────────────────────────────────────────
// Everything the prepare workflow needs to know.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareConfig {
    pub images_path:         String,
    pub labels_path:         String,
    pub output_dir:          String,
    pub train_shards:        usize,
    pub validation_shards:   usize,
    pub validation_fraction: f64,
    pub num_classes:         usize,
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            images_path:         "data/train-images.idx3-ubyte".to_string(),
            labels_path:         "data/train-labels.idx1-ubyte".to_string(),
            output_dir:          "data/records".to_string(),
            train_shards:        4,
            validation_shards:   1,
            validation_fraction: 0.2,
            num_classes:         10,
        }
    }
}

// ─── PrepareUseCase ───────────────────────────────────────────────────────────
// Owns the config and runs the full preparation pipeline.
pub struct PrepareUseCase {
    config: PrepareConfig,
}

impl PrepareUseCase {
    /// Create a new PrepareUseCase with the given configuration
    pub fn new(config: PrepareConfig) -> Self {
        Self { config }
    }

    /// Execute the full preparation pipeline end to end
    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;

        // ── Step 1: Load the IDX archives ────────────────────────────────────
        tracing::info!("Loading images from '{}'", cfg.images_path);
        let images = read_idx_images(Path::new(&cfg.images_path))?;
        let labels = read_idx_labels(Path::new(&cfg.labels_path))?;
        tracing::info!(
            "Loaded {} image(s) of {} × {} and {} label(s)",
            images.count, images.rows, images.cols, labels.len(),
        );

        // ── Step 2: Sanity-check the archives ────────────────────────────────
        if images.count == 0 {
            return Err(anyhow::anyhow!("Image archive '{}' is empty", cfg.images_path));
        }
        if images.count != labels.len() {
            return Err(anyhow::anyhow!(
                "'{}' holds {} image(s) but '{}' holds {} label(s)",
                cfg.images_path, images.count,
                cfg.labels_path, labels.len(),
            ));
        }
        if let Some(&highest) = labels.iter().max() {
            if highest as usize >= cfg.num_classes {
                return Err(anyhow::anyhow!(
                    "Label {} does not fit num_classes = {}",
                    highest, cfg.num_classes,
                ));
            }
        }

        // ── Step 3: Pair images and labels into records ──────────────────────
        // Feature = raw pixel bytes, label = one class id byte.
        // The writer hooks below convert both on their way to disk.
        let examples: Vec<Record> = (0..images.count)
            .map(|i| Record::new(images.image(i).to_vec(), vec![labels[i]]))
            .collect();

        // ── Step 4: Train / validation split ─────────────────────────────────
        // Shuffle and split so the model is evaluated on unseen identities
        let (train_examples, val_examples) =
            split_train_val(examples, cfg.validation_fraction);
        tracing::info!(
            "Split: {} train, {} validation",
            train_examples.len(),
            val_examples.len(),
        );

        // ── Step 5: Write the shard files ────────────────────────────────────
        let train_source = InMemorySource::new(train_examples);
        let val_source   = InMemorySource::new(val_examples);

        let num_classes  = cfg.num_classes;
        let feature_hook = |bytes: Vec<u8>| normalize_pixels(&bytes);
        let label_hook   = move |bytes: Vec<u8>| {
            one_hot_bytes(bytes.first().copied().unwrap_or(0) as usize, num_classes)
        };

        write_tf_records(
            Path::new(&cfg.output_dir),
            cfg.train_shards,
            cfg.validation_shards,
            &train_source,
            &val_source,
            Some(&feature_hook),
            Some(&label_hook),
        )?;

        tracing::info!("Shard files ready in '{}'", cfg.output_dir);
        Ok(())
    }
}
