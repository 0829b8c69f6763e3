// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains ALL Burn framework specific code.
// No other layer imports from burn directly — only this one
// and the tensor end of the data pipeline.
//
// What's in this layer:
//
//   model.rs     — The face classification network
//                  A fully connected net over flattened
//                  pixels with:
//                  • Two hidden layers (ReLU activation)
//                  • Dropout between layers
//                  • A linear head, one logit per identity
//                  plus the softmax cross entropy loss used
//                  for both training and validation
//
//   trainer.rs   — The training loop
//                  Streams shuffled batches from the shard
//                  files, runs forward/backward, applies the
//                  RMSProp update, validates, and saves a
//                  checkpoint per epoch
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// Fully connected face classification architecture
pub mod model;

/// Full training loop with validation and checkpointing
pub mod trainer;
