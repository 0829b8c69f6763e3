// ============================================================
// Layer 4 — Shuffled Batch Pipeline
// ============================================================
// Turns a folder of shard files into an endless-ish stream of
// shuffled tensor batches:
//
//   1. Find every shard file of the requested split
//   2. Share one ShardCursor across `num_threads` reader threads;
//      each pass hands the files out in freshly shuffled order,
//      for `epochs` passes
//   3. Each reader thread decodes frames, checks the blob layout
//      against the declared shapes, and pushes examples into the
//      ShuffleBuffer
//   4. The consumer draws random full batches through BatchStream
//
// The stream ends (`None`) when every pass is used up and the
// buffer cannot fill another whole batch. With the default of
// 50 000 epochs that point is effectively never reached — a
// training loop just takes as many batches as it wants. Any
// reader-side failure (I/O, checksum, decode, shape mismatch)
// surfaces as an error from the next `next_batch` call.
//
// Dropping the stream closes the buffer and joins the threads.
//
// Reference: Rust Book §16 (Fearless Concurrency)
//            Rust Book §20 (Building a Multithreaded Server)

use anyhow::{Context, Result};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    thread::{self, JoinHandle},
};

use burn::data::dataloader::batcher::Batcher;
use burn::prelude::*;

use crate::data::batcher::{RecordBatcher, TrainingBatch, TrainingExample};
use crate::data::cursor::ShardCursor;
use crate::data::reader::{find_shard_files, ShardReader};
use crate::data::shuffle::ShuffleBuffer;
use crate::domain::phase::Phase;
use crate::domain::record::{ElementType, Record};

/// How many reader threads parse shards concurrently by default.
pub const DEFAULT_READER_THREADS: usize = 4;

/// How many shuffled passes over the shard files are made before the
/// stream runs dry. Large enough that training always stops for its
/// own reasons first.
pub const DEFAULT_EPOCHS: usize = 50_000;

// ─── RecordStreamBuilder ──────────────────────────────────────────────────────
/// Configures and launches a shuffled batch stream.
///
/// Only the shard folder, split, batch size, and both blob layouts are
/// required; everything else defaults to the standard pipeline shape
/// (4 reader threads, 50 000 passes, capacity 10×batch, minimum fill
/// 5×batch).
pub struct RecordStreamBuilder {
    folder:            PathBuf,
    phase:             Phase,
    batch_size:        usize,
    feature_layout:    Option<(Vec<usize>, ElementType)>,
    label_layout:      Option<(Vec<usize>, ElementType)>,
    num_threads:       usize,
    epochs:            usize,
    capacity:          Option<usize>,
    min_after_dequeue: Option<usize>,
    seed:              Option<u64>,
}

impl RecordStreamBuilder {
    pub fn new(folder: &Path, phase: Phase, batch_size: usize) -> Self {
        Self {
            folder:            folder.to_path_buf(),
            phase,
            batch_size,
            feature_layout:    None,
            label_layout:      None,
            num_threads:       DEFAULT_READER_THREADS,
            epochs:            DEFAULT_EPOCHS,
            capacity:          None,
            min_after_dequeue: None,
            seed:              None,
        }
    }

    /// Shape and element type the feature blobs decode as.
    pub fn feature_layout(mut self, shape: &[usize], element_type: ElementType) -> Self {
        self.feature_layout = Some((shape.to_vec(), element_type));
        self
    }

    /// Shape and element type the label blobs decode as.
    pub fn label_layout(mut self, shape: &[usize], element_type: ElementType) -> Self {
        self.label_layout = Some((shape.to_vec(), element_type));
        self
    }

    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Cap on the number of shuffled passes over the shard files.
    pub fn epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    /// Override the buffer capacity (default `10 × batch_size`).
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Override the minimum fill kept behind after a draw
    /// (default `5 × batch_size`).
    pub fn min_after_dequeue(mut self, min_after_dequeue: usize) -> Self {
        self.min_after_dequeue = Some(min_after_dequeue);
        self
    }

    /// Fix both the file order and the batch draws for reproducibility.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Spawn the reader threads and return the batch stream.
    pub fn build<B: Backend>(self, device: &B::Device) -> Result<BatchStream<B>> {
        if self.batch_size == 0 {
            return Err(anyhow::anyhow!("batch_size must be at least 1"));
        }
        if self.num_threads == 0 {
            return Err(anyhow::anyhow!("num_threads must be at least 1"));
        }

        let (feature_shape, feature_type) = self
            .feature_layout
            .ok_or_else(|| anyhow::anyhow!("feature layout was not configured"))?;
        let (label_shape, label_type) = self
            .label_layout
            .ok_or_else(|| anyhow::anyhow!("label layout was not configured"))?;

        let capacity = self.capacity.unwrap_or(10 * self.batch_size);
        let min_fill = self.min_after_dequeue.unwrap_or(5 * self.batch_size);
        if capacity < min_fill + self.batch_size {
            return Err(anyhow::anyhow!(
                "Buffer capacity {} cannot hold the minimum fill {} plus one batch of {}",
                capacity,
                min_fill,
                self.batch_size,
            ));
        }

        let files = find_shard_files(&self.folder, self.phase)?;
        tracing::info!(
            "Streaming {} {} shard file(s) from '{}' with {} reader thread(s)",
            files.len(),
            self.phase,
            self.folder.display(),
            self.num_threads,
        );

        let cursor = Arc::new(ShardCursor::new(files, self.epochs, self.seed));
        let buffer = Arc::new(ShuffleBuffer::new(
            capacity,
            min_fill,
            self.num_threads,
            self.seed,
        ));
        let layout = RecordLayout {
            feature_shape,
            feature_type,
            label_shape,
            label_type,
        };

        let mut workers = Vec::with_capacity(self.num_threads);
        for index in 0..self.num_threads {
            let cursor = Arc::clone(&cursor);
            let buffer = Arc::clone(&buffer);
            let layout = layout.clone();
            let handle = thread::Builder::new()
                .name(format!("record-reader-{index}"))
                .spawn(move || {
                    if let Err(error) = run_reader(&cursor, &buffer, &layout) {
                        buffer.fail(error);
                    }
                    buffer.producer_finished();
                })
                .context("Cannot spawn reader thread")?;
            workers.push(handle);
        }

        Ok(BatchStream {
            buffer,
            workers,
            batcher: RecordBatcher::new(device.clone()),
            batch_size: self.batch_size,
            finished: false,
        })
    }
}

/// Open a shuffled batch stream over the shard files of one split.
///
/// The fixed-signature convenience layer over `RecordStreamBuilder`:
/// capacity, minimum fill, and the epoch cap keep their defaults.
pub fn read_tf_records<B: Backend>(
    folder: &Path,
    phase: Phase,
    batch_size: usize,
    feature_shape: &[usize],
    feature_type: ElementType,
    label_shape: &[usize],
    label_type: ElementType,
    num_threads: usize,
    device: &B::Device,
) -> Result<BatchStream<B>> {
    RecordStreamBuilder::new(folder, phase, batch_size)
        .feature_layout(feature_shape, feature_type)
        .label_layout(label_shape, label_type)
        .num_threads(num_threads)
        .build(device)
}

// ─── Reader Threads ───────────────────────────────────────────────────────────

#[derive(Clone)]
struct RecordLayout {
    feature_shape: Vec<usize>,
    feature_type:  ElementType,
    label_shape:   Vec<usize>,
    label_type:    ElementType,
}

impl RecordLayout {
    fn feature_len(&self) -> usize {
        self.feature_shape.iter().product()
    }

    fn label_len(&self) -> usize {
        self.label_shape.iter().product()
    }
}

/// Decode both blobs and check the element counts against the declared
/// shapes. The blobs carry no metadata, so this is the only place a
/// wrong shape or element type can be caught.
fn decode_record(record: &Record, layout: &RecordLayout) -> Result<TrainingExample> {
    let features = layout.feature_type.decode_to_f32(&record.feature)?;
    if features.len() != layout.feature_len() {
        return Err(anyhow::anyhow!(
            "Feature blob decodes to {} element(s) but shape {:?} needs {}",
            features.len(),
            layout.feature_shape,
            layout.feature_len(),
        ));
    }

    let labels = layout.label_type.decode_to_f32(&record.label)?;
    if labels.len() != layout.label_len() {
        return Err(anyhow::anyhow!(
            "Label blob decodes to {} element(s) but shape {:?} needs {}",
            labels.len(),
            layout.label_shape,
            layout.label_len(),
        ));
    }

    Ok(TrainingExample { features, labels })
}

/// One reader thread's life: pull files from the shared cursor until
/// the passes run out, decoding every record into the buffer. Stops
/// early when the consumer closes the buffer.
fn run_reader(
    cursor: &ShardCursor,
    buffer: &ShuffleBuffer,
    layout: &RecordLayout,
) -> Result<()> {
    while let Some(path) = cursor.next_file() {
        let reader = ShardReader::open(&path)?;
        for record in reader {
            let record  = record?;
            let example = decode_record(&record, layout)
                .with_context(|| format!("Invalid record in '{}'", path.display()))?;
            if !buffer.push(example) {
                return Ok(());
            }
        }
    }
    Ok(())
}

// ─── BatchStream ──────────────────────────────────────────────────────────────
/// The consumer end of the pipeline. Owns the reader threads; dropping
/// the stream shuts them down.
pub struct BatchStream<B: Backend> {
    buffer:     Arc<ShuffleBuffer>,
    workers:    Vec<JoinHandle<()>>,
    batcher:    RecordBatcher<B>,
    batch_size: usize,
    finished:   bool,
}

impl<B: Backend> BatchStream<B> {
    /// The next shuffled batch, `Ok(None)` once the stream is over.
    ///
    /// Blocks until the buffer can release a batch. After an error the
    /// stream is finished; further calls return `Ok(None)`.
    pub fn next_batch(&mut self) -> Result<Option<TrainingBatch<B>>> {
        if self.finished {
            return Ok(None);
        }
        match self.buffer.pop_batch(self.batch_size) {
            Ok(Some(examples)) => Ok(Some(self.batcher.batch(examples))),
            Ok(None) => {
                self.finished = true;
                self.join_workers();
                Ok(None)
            }
            Err(error) => {
                self.finished = true;
                self.buffer.close();
                self.join_workers();
                Err(error)
            }
        }
    }

    fn join_workers(&mut self) {
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl<B: Backend> Iterator for BatchStream<B> {
    type Item = Result<TrainingBatch<B>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().transpose()
    }
}

impl<B: Backend> Drop for BatchStream<B> {
    fn drop(&mut self) {
        self.buffer.close();
        self.join_workers();
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::InMemorySource;
    use crate::data::writer::write_tf_records;
    use burn::backend::ndarray::NdArrayDevice;
    use burn::backend::NdArray;
    use std::fs;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("lfw_pipeline_{}_{}", tag, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// n records, each with a 3-element f32 feature and 2-element label.
    fn write_dataset(dir: &Path, n: usize, shards: usize) {
        let records: Vec<Record> = (0..n)
            .map(|i| {
                Record::from_f32(
                    &[i as f32, i as f32 + 0.25, i as f32 + 0.5],
                    &[1.0, 0.0],
                )
            })
            .collect();
        let source = InMemorySource::new(records);
        write_tf_records(dir, shards, shards, &source, &source, None, None).unwrap();
    }

    fn open_stream(
        dir: &Path,
        batch_size: usize,
        threads: usize,
    ) -> BatchStream<NdArray> {
        RecordStreamBuilder::new(dir, Phase::Train, batch_size)
            .feature_layout(&[3], ElementType::F32)
            .label_layout(&[2], ElementType::F32)
            .num_threads(threads)
            .epochs(1)
            .seed(42)
            .build(&NdArrayDevice::Cpu)
            .unwrap()
    }

    #[test]
    fn test_single_pass_yields_every_record_once() {
        let dir = temp_dir("multiset");
        write_dataset(&dir, 6, 2);

        let mut stream = open_stream(&dir, 2, 2);
        let mut first_elements: Vec<f32> = Vec::new();
        while let Some(batch) = stream.next_batch().unwrap() {
            assert_eq!(batch.features.dims(), [2, 3]);
            let values: Vec<f32> = batch.features.into_data().to_vec().unwrap();
            first_elements.push(values[0]);
            first_elements.push(values[3]);
        }
        first_elements.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let expected: Vec<f32> = (0..6).map(|i| i as f32).collect();
        assert_eq!(first_elements, expected);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_never_yields_a_partial_batch() {
        let dir = temp_dir("partial");
        write_dataset(&dir, 3, 1);

        // 3 records, batch of 4, single pass: the stream must end
        // without ever producing a short batch.
        let mut stream = open_stream(&dir, 4, 1);
        assert!(stream.next_batch().unwrap().is_none());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_epoch_cap_repeats_the_data() {
        let dir = temp_dir("epochs");
        write_dataset(&dir, 2, 1);

        let mut stream: BatchStream<NdArray> =
            RecordStreamBuilder::new(&dir, Phase::Train, 2)
                .feature_layout(&[3], ElementType::F32)
                .label_layout(&[2], ElementType::F32)
                .num_threads(1)
                .epochs(3)
                .seed(7)
                .build(&NdArrayDevice::Cpu)
                .unwrap();

        let mut batches = 0usize;
        while stream.next_batch().unwrap().is_some() {
            batches += 1;
        }
        // 2 records × 3 passes = 6 examples = 3 full batches of 2
        assert_eq!(batches, 3);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_shape_mismatch_surfaces_as_an_error() {
        let dir = temp_dir("shape");
        write_dataset(&dir, 4, 1);

        let mut stream: BatchStream<NdArray> =
            RecordStreamBuilder::new(&dir, Phase::Train, 2)
                .feature_layout(&[5], ElementType::F32)
                .label_layout(&[2], ElementType::F32)
                .num_threads(2)
                .epochs(1)
                .build(&NdArrayDevice::Cpu)
                .unwrap();

        let err = stream.next_batch().unwrap_err();
        assert!(err.to_string().contains("Invalid record"));

        // The stream is finished after the failure
        assert!(stream.next_batch().unwrap().is_none());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_split_fails_at_build() {
        let dir = temp_dir("nosplit");
        write_dataset(&dir, 2, 1);
        fs::remove_file(dir.join("validation_0.tfrecords")).unwrap();

        let result = RecordStreamBuilder::new(&dir, Phase::Validation, 1)
            .feature_layout(&[3], ElementType::F32)
            .label_layout(&[2], ElementType::F32)
            .build::<NdArray>(&NdArrayDevice::Cpu);
        assert!(result.is_err());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_capacity_must_cover_min_fill_plus_one_batch() {
        let dir = temp_dir("capacity");
        write_dataset(&dir, 2, 1);

        let result = RecordStreamBuilder::new(&dir, Phase::Train, 4)
            .feature_layout(&[3], ElementType::F32)
            .label_layout(&[2], ElementType::F32)
            .capacity(8)
            .min_after_dequeue(6)
            .build::<NdArray>(&NdArrayDevice::Cpu);
        assert!(result.is_err());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_dropping_the_stream_stops_the_readers() {
        let dir = temp_dir("shutdown");
        write_dataset(&dir, 8, 2);

        // Endless stream (default epoch cap): take one batch, then drop.
        let mut stream: BatchStream<NdArray> =
            RecordStreamBuilder::new(&dir, Phase::Train, 2)
                .feature_layout(&[3], ElementType::F32)
                .label_layout(&[2], ElementType::F32)
                .num_threads(2)
                .seed(11)
                .build(&NdArrayDevice::Cpu)
                .unwrap();

        let batch = stream.next_batch().unwrap();
        assert!(batch.is_some());
        drop(stream);

        let _ = fs::remove_dir_all(&dir);
    }
}
