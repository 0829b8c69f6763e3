// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Randomly shuffles examples and splits them into two sets:
//   - Training set:   used to update model weights
//   - Validation set: used to measure performance on unseen data
//
// Why shuffle before splitting?
//   Image archives are usually ordered by class (all pictures
//   of one person before the next). Without shuffling, the
//   validation set would hold only the last few classes.
//   Shuffling gives both sets a representative mix.
//
// Split ratio: 80% training, 20% validation (configurable)
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom
// which is the standard unbiased shuffle algorithm.
//
// Reference: Rust Book §8 (Vectors)
//            rand crate documentation

use rand::seq::SliceRandom;

/// Randomly shuffle `examples` and split into (train, validation).
///
/// # Arguments
/// * `examples`            - All available examples (consumed by this function)
/// * `validation_fraction` - Proportion held out, e.g. 0.2 = 20%
///
/// # Returns
/// A tuple (train_examples, validation_examples)
pub fn split_train_val<T>(mut examples: Vec<T>, validation_fraction: f64) -> (Vec<T>, Vec<T>) {
    let mut rng = rand::thread_rng();

    // Fisher-Yates shuffle, every permutation equally likely
    examples.shuffle(&mut rng);

    // e.g. 100 examples * 0.2 = 20 held out → first 80 are training
    let total    = examples.len();
    let held_out = ((total as f64) * validation_fraction).round() as usize;

    // Clamp to valid range to avoid panics on tiny datasets
    let split_at = total - held_out.min(total);

    // split_off(n) removes elements [n..] from the Vec and returns them
    // After this: examples = [0..split_at], val = [split_at..total]
    let val = examples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation ({}% / {}%)",
        examples.len(),
        val.len(),
        (examples.len() * 100) / total.max(1),
        (val.len()      * 100) / total.max(1),
    );

    (examples, val)
}
