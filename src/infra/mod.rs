// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Handles all cross-cutting concerns that don't belong in
// any specific business layer:
//
//   checkpoint.rs   — Saving and loading model weights
//                     Uses Burn's CompactRecorder to
//                     serialise model parameters to disk.
//                     Also saves/loads the hyper parameters
//                     as JSON so a checkpoint directory is
//                     self-describing.
//
//   hyper_params.rs — Hyper parameter storage
//                     One JSON file holding the network shape
//                     and the full training schedule, so a run
//                     can be reproduced from a single artefact.
//
//   metrics.rs      — Training metrics logging
//                     Writes epoch-level metrics (loss,
//                     accuracy) to a CSV file for later
//                     analysis and plotting.
//
// Why is this a separate layer?
//   These concerns are used by multiple other layers but
//   don't belong to any one of them. Keeping them here:
//   - Prevents duplication across layers
//   - Makes it easy to swap implementations
//     (e.g. swap file checkpoints for S3 cloud storage)
//   - Keeps other layers focused on their core logic
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Hyper parameter loading and saving
pub mod hyper_params;

/// Training metrics CSV logger
pub mod metrics;
