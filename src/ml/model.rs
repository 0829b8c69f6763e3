use burn::{
    nn::{
        Dropout, DropoutConfig,
        Linear, LinearConfig,
        Relu,
    },
    prelude::*,
    tensor::activation::log_softmax,
    tensor::backend::AutodiffBackend,
};

use crate::data::batcher::TrainingBatch;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct FaceNetConfig {
    pub input_dimension:  usize,
    pub hidden_dimension: usize,
    pub output_dimension: usize,
    pub dropout:          f64,
}

impl FaceNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> FaceNet<B> {
        let linear1 = LinearConfig::new(self.input_dimension, self.hidden_dimension).init(device);
        let linear2 = LinearConfig::new(self.hidden_dimension, self.hidden_dimension).init(device);
        let output  = LinearConfig::new(self.hidden_dimension, self.output_dimension).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        FaceNet {
            linear1, linear2, output,
            activation: Relu::new(),
            dropout,
        }
    }
}

#[derive(Module, Debug)]
pub struct FaceNet<B: Backend> {
    pub linear1:    Linear<B>,
    pub linear2:    Linear<B>,
    pub output:     Linear<B>,
    pub activation: Relu,
    pub dropout:    Dropout,
}

impl<B: Backend> FaceNet<B> {
    /// features: [batch, input_dimension] → logits: [batch, output_dimension]
    pub fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.dropout.forward(self.activation.forward(self.linear1.forward(features)));
        let x = self.dropout.forward(self.activation.forward(self.linear2.forward(x)));
        self.output.forward(x) // [batch, output_dimension]
    }

    pub fn forward_loss(&self, batch: &TrainingBatch<B>) -> (Tensor<B, 1>, Tensor<B, 2>)
    where
        B: AutodiffBackend,
    {
        let logits = self.forward(batch.features.clone());
        let loss   = softmax_cross_entropy(logits.clone(), batch.labels.clone());
        (loss, logits)
    }
}

/// Mean softmax cross entropy between logits and target distributions.
///
/// The targets are full probability rows (usually one-hot), not class
/// indices, so the loss is computed directly from log-softmax:
///
///   loss = -mean over batch of Σ_c target[c] · log_softmax(logits)[c]
pub fn softmax_cross_entropy<B: Backend>(
    logits:  Tensor<B, 2>,
    targets: Tensor<B, 2>,
) -> Tensor<B, 1> {
    let log_probs = log_softmax(logits, 1);
    (targets * log_probs).sum_dim(1).mean().neg()
}
