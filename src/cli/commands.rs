// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `prepare` and `train`
// and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use crate::application::prepare_use_case::PrepareConfig;
use crate::application::train_use_case::TrainConfig;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert an IDX image archive into training shard files
    Prepare(PrepareArgs),

    /// Train the face classifier on prepared shard files
    Train(TrainArgs),
}

/// All arguments for the `prepare` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct PrepareArgs {
    /// IDX image archive to convert
    #[arg(long, default_value = "data/train-images.idx3-ubyte")]
    pub images_path: String,

    /// IDX label archive matching the images
    #[arg(long, default_value = "data/train-labels.idx1-ubyte")]
    pub labels_path: String,

    /// Directory the shard files are written into
    #[arg(long, default_value = "data/records")]
    pub output_dir: String,

    /// Number of training shard files
    /// Examples are striped round-robin across the shards
    #[arg(long, default_value_t = 4)]
    pub train_shards: usize,

    /// Number of validation shard files
    #[arg(long, default_value_t = 1)]
    pub validation_shards: usize,

    /// Fraction of examples held out for validation
    #[arg(long, default_value_t = 0.2)]
    pub validation_fraction: f64,

    /// Number of identities — labels are one-hot over this many classes
    #[arg(long, default_value_t = 10)]
    pub num_classes: usize,
}

/// Convert CLI PrepareArgs into the application-layer PrepareConfig.
/// This is the boundary between Layer 1 and Layer 2 —
/// the application layer never sees clap types.
impl From<PrepareArgs> for PrepareConfig {
    fn from(a: PrepareArgs) -> Self {
        PrepareConfig {
            images_path:         a.images_path,
            labels_path:         a.labels_path,
            output_dir:          a.output_dir,
            train_shards:        a.train_shards,
            validation_shards:   a.validation_shards,
            validation_fraction: a.validation_fraction,
            num_classes:         a.num_classes,
        }
    }
}

/// All arguments for the `train` command
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// JSON file with the network shape and training schedule
    /// Falls back to built-in defaults when omitted
    #[arg(long)]
    pub hyper_params: Option<String>,

    /// Directory holding the prepared shard files
    #[arg(long, default_value = "data/records")]
    pub records_dir: String,

    /// Directory to save model checkpoints and metrics
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            hyper_params_path: a.hyper_params,
            records_dir:       a.records_dir,
            checkpoint_dir:    a.checkpoint_dir,
        }
    }
}
