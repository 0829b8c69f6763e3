// ============================================================
// Layer 4 — Record Batcher
// ============================================================
// Implements Burn's Batcher trait to convert a Vec of decoded
// examples into tensors.
//
// How batching works here:
//   Input:  Vec of N TrainingExamples, each with a feature vector
//           of length F and a label vector of length L
//   Output: TrainingBatch with tensors of shape [N, F] and [N, L]
//
//   We flatten all features into one long Vec, then reshape:
//   [e1_f1, ..., e1_fF, e2_f1, ..., eN_fF] → [N, F]
//
// Every example in a batch must have the same blob layout — the
// pipeline validates decoded lengths against the declared shapes
// before anything reaches this point.
//
// Reference: Burn Book §4 (Batcher)

use burn::{data::dataloader::batcher::Batcher, prelude::*};

// ─── TrainingExample ──────────────────────────────────────────────────────────
/// One decoded record: flat f32 features and labels, ready to be
/// stacked into a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    pub features: Vec<f32>,
    pub labels:   Vec<f32>,
}

// ─── TrainingBatch ────────────────────────────────────────────────────────────
/// A batch of examples as rank-2 tensors, batch dimension first.
/// Callers wanting higher-rank views (e.g. [N, H, W]) reshape these.
#[derive(Debug, Clone)]
pub struct TrainingBatch<B: Backend> {
    /// Shape: [batch_size, feature_len]
    pub features: Tensor<B, 2>,

    /// Shape: [batch_size, label_len]
    pub labels: Tensor<B, 2>,
}

// ─── RecordBatcher ────────────────────────────────────────────────────────────
/// Holds the target device so tensors land on the right backend.
#[derive(Clone, Debug)]
pub struct RecordBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> RecordBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<TrainingExample, TrainingBatch<B>> for RecordBatcher<B> {
    /// Stack examples into one batch.
    ///
    /// Builds a rank-1 tensor from the flattened values, then reshapes
    /// to [batch_size, len]. Assumes a non-empty, uniform batch.
    fn batch(&self, items: Vec<TrainingExample>) -> TrainingBatch<B> {
        let batch_size  = items.len();
        let feature_len = items[0].features.len();
        let label_len   = items[0].labels.len();

        let feature_flat: Vec<f32> = items
            .iter()
            .flat_map(|e| e.features.iter().copied())
            .collect();

        let label_flat: Vec<f32> = items
            .iter()
            .flat_map(|e| e.labels.iter().copied())
            .collect();

        let features = Tensor::<B, 1>::from_floats(feature_flat.as_slice(), &self.device)
            .reshape([batch_size, feature_len]);

        let labels = Tensor::<B, 1>::from_floats(label_flat.as_slice(), &self.device)
            .reshape([batch_size, label_len]);

        TrainingBatch { features, labels }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArrayDevice;
    use burn::backend::NdArray;

    #[test]
    fn test_batch_shapes_and_order() {
        let batcher = RecordBatcher::<NdArray>::new(NdArrayDevice::Cpu);
        let items = vec![
            TrainingExample {
                features: vec![1.0, 2.0, 3.0],
                labels:   vec![1.0, 0.0],
            },
            TrainingExample {
                features: vec![4.0, 5.0, 6.0],
                labels:   vec![0.0, 1.0],
            },
        ];

        let batch = batcher.batch(items);
        assert_eq!(batch.features.dims(), [2, 3]);
        assert_eq!(batch.labels.dims(), [2, 2]);

        let features: Vec<f32> = batch.features.into_data().to_vec().unwrap();
        assert_eq!(features, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }
}
