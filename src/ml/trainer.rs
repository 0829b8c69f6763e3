// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Full train + validation loop over the shuffled shard streams.
//
// Key Burn insight:
//   - Training uses MyBackend (Autodiff<NdArray>) for gradients
//   - model.valid() returns model on MyInnerBackend (NdArray)
//   - Validation stream must also use MyInnerBackend
//   - argmax(1) returns [batch,1] so we flatten before .equal()
//
// Reference: Burn Book §5, Tieleman & Hinton (2012) RMSProp
//            (Coursera Lecture 6.5)

use anyhow::{Context, Result};
use std::path::Path;

use burn::{
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer, RmsPropConfig},
    prelude::*,
};

use crate::data::pipeline::read_tf_records;
use crate::domain::phase::Phase;
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::hyper_params::HyperParams;
use crate::infra::metrics::{EpochMetrics, MetricsLogger};
use crate::ml::model::{softmax_cross_entropy, FaceNet, FaceNetConfig};

type MyBackend      = burn::backend::Autodiff<burn::backend::NdArray>;
type MyInnerBackend = burn::backend::NdArray;

pub fn run_training(
    params:       &HyperParams,
    records_dir:  &Path,
    ckpt_manager: CheckpointManager,
    metrics:      MetricsLogger,
) -> Result<()> {
    if params.train.steps_per_epoch == 0 {
        return Err(anyhow::anyhow!("steps_per_epoch must be at least 1"));
    }

    let device = burn::backend::ndarray::NdArrayDevice::Cpu;
    tracing::info!("Using NdArray device: {:?}", device);
    train_loop(params, records_dir, ckpt_manager, metrics, device)
}

fn train_loop(
    params:       &HyperParams,
    records_dir:  &Path,
    ckpt_manager: CheckpointManager,
    metrics:      MetricsLogger,
    device:       burn::backend::ndarray::NdArrayDevice,
) -> Result<()> {

    // ── Build model ───────────────────────────────────────────────────────────
    let model_cfg = FaceNetConfig::new(
        params.arch.input_dimension,
        params.arch.hidden_dimension,
        params.arch.output_dimension,
        params.arch.dropout,
    );
    let mut model: FaceNet<MyBackend> = model_cfg.init(&device);
    tracing::info!(
        "Model ready: {} → {} → {} → {}",
        params.arch.input_dimension,
        params.arch.hidden_dimension,
        params.arch.hidden_dimension,
        params.arch.output_dimension,
    );

    // ── RMSProp optimiser ─────────────────────────────────────────────────────
    // v = α*v + (1-α)*g²       (squared-gradient average)
    // b = μ*b + g/(√v + ε)     (momentum buffer)
    // θ = θ - lr * b           (update)
    let optim_cfg = RmsPropConfig::new()
        .with_alpha(params.train.decay as f32)
        .with_momentum(params.train.momentum as f32)
        .with_epsilon(1e-8);
    let mut optim = optim_cfg.init();

    // ── Training stream (AutodiffBackend) ─────────────────────────────────────
    let mut train_stream = read_tf_records::<MyBackend>(
        records_dir,
        Phase::Train,
        params.train.batch_size,
        &[params.arch.input_dimension],
        params.train.feature_type,
        &[params.arch.output_dimension],
        params.train.label_type,
        params.train.num_reader_threads,
        &device,
    )?;

    // ── Validation stream (InnerBackend — no autodiff overhead) ───────────────
    let mut val_stream = read_tf_records::<MyInnerBackend>(
        records_dir,
        Phase::Validation,
        params.train.batch_size,
        &[params.arch.input_dimension],
        params.train.feature_type,
        &[params.arch.output_dimension],
        params.train.label_type,
        params.train.num_reader_threads,
        &device,
    )?;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=params.train.epochs {

        // ── Training phase ────────────────────────────────────────────────────
        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;

        for _step in 0..params.train.steps_per_epoch {
            let batch = train_stream
                .next_batch()?
                .context("Training stream ended before the requested step count")?;

            let (loss, _) = model.forward_loss(&batch);

            let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
            train_loss_sum += loss_val;
            train_batches  += 1;

            // Backward pass + RMSProp update
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(params.train.learning_rate, model, grads);
        }

        let avg_train_loss = if train_batches > 0 {
            train_loss_sum / train_batches as f64
        } else { f64::NAN };

        // ── Validation phase ──────────────────────────────────────────────────
        // model.valid() → FaceNet<MyInnerBackend>
        // dropout disabled for deterministic evaluation
        let model_valid = model.valid();

        let mut val_loss_sum  = 0.0f64;
        let mut val_batches   = 0usize;
        let mut correct       = 0usize;
        let mut total_samples = 0usize;

        for _step in 0..params.train.validation_steps {
            let batch = match val_stream.next_batch()? {
                Some(batch) => batch,
                None        => break,
            };

            let logits = model_valid.forward(batch.features.clone());

            let batch_loss: f64 = softmax_cross_entropy(logits.clone(), batch.labels.clone())
                .into_scalar().elem::<f64>();
            val_loss_sum += batch_loss;
            val_batches  += 1;

            // argmax(1) returns shape [batch, 1] — flatten to [batch]
            // before comparing predicted and expected identities
            let predicted = logits.argmax(1).flatten::<1>(0, 1);
            let expected  = batch.labels.argmax(1).flatten::<1>(0, 1);

            total_samples += batch.features.dims()[0];

            let batch_correct: i64 = predicted
                .equal(expected)
                .int().sum().into_scalar().elem::<i64>();
            correct += batch_correct as usize;
        }

        let avg_val_loss = if val_batches   > 0 { val_loss_sum / val_batches as f64 } else { f64::NAN };
        let val_accuracy = if total_samples > 0 { correct as f64 / total_samples as f64 } else { 0.0 };

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4} | val_acc={:.1}%",
            epoch, params.train.epochs, avg_train_loss, avg_val_loss,
            val_accuracy * 100.0,
        );

        metrics.log(&EpochMetrics::new(epoch, avg_train_loss, avg_val_loss, val_accuracy))?;

        ckpt_manager.save_model(&model, epoch)?;
        tracing::info!("Checkpoint saved for epoch {}", epoch);
    }

    tracing::info!("Training complete!");
    Ok(())
}
