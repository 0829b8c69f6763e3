// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer handles everything from raw image files all the
// way to shuffled tensor batches.
//
// Write path:
//
//   IDX image/label files
//       │
//       ▼
//   idx               → parses the image and label archives
//       │
//       ▼
//   splitter          → shuffles into train/validation sets
//       │
//       ▼
//   dataset           → InMemorySource hands out strided shards
//       │
//       ▼
//   writer            → frames records into <phase>_<n>.tfrecords
//
// Read path:
//
//   shard files
//       │
//       ▼
//   cursor            → shared shuffled file order, many passes
//       │
//       ▼
//   reader            → decodes frames, verifies checksums
//       │
//       ▼
//   shuffle           → bounded buffer, random batch draws
//       │
//       ▼
//   batcher           → stacks examples into tensor batches
//       │
//       ▼
//   pipeline          → ties it all together behind BatchStream
//
// Each module is responsible for exactly one step.
// This makes each step independently testable and replaceable.
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Rust Book §16 (Fearless Concurrency)

/// Parses IDX-format image and label files
pub mod idx;

/// Shuffles and splits records into train/validation sets
pub mod splitter;

/// In-memory record source with strided shard assignment
pub mod dataset;

/// Frames records into shard files and orchestrates all shards
pub mod writer;

/// Decodes one shard file frame by frame
pub mod reader;

/// Shared cursor over the shard file list, reshuffled each pass
pub mod cursor;

/// Bounded shuffle buffer between reader threads and the consumer
pub mod shuffle;

/// Stacks decoded examples into tensor batches
pub mod batcher;

/// The shuffled batch stream: threads, buffer, and batcher combined
pub mod pipeline;
