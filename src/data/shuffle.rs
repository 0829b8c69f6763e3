// ============================================================
// Layer 4 — Shuffle Buffer
// ============================================================
// A bounded pool of decoded examples sitting between the reader
// threads (producers) and the training loop (consumer).
//
// Two rules govern it:
//
//   capacity  — producers block once the pool holds this many
//               examples
//   min_fill  — a batch is only released while the pool would
//               still hold at least this many examples AFTER the
//               batch leaves. Drawing from a well-filled pool is
//               what makes the random draws an actual shuffle
//               rather than a near-FIFO.
//
// The min_fill rule is dropped once every producer has finished:
// from then on any remaining full batches are released, and when
// fewer than one batch remains the stream is over — a partial
// batch is never released.
//
// Batch members are drawn uniformly at random via swap_remove,
// so batch composition and order are unspecified across runs.
//
// Reference: Rust Book §16 (Shared-State Concurrency)
//            rand crate documentation

use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::{Condvar, Mutex};

use anyhow::Result;

use crate::data::batcher::TrainingExample;

pub struct ShuffleBuffer {
    state:    Mutex<BufferState>,
    space:    Condvar,
    fill:     Condvar,
    capacity: usize,
    min_fill: usize,
}

struct BufferState {
    items:     Vec<TrainingExample>,
    producers: usize,
    rng:       StdRng,
    error:     Option<anyhow::Error>,
    closed:    bool,
}

impl ShuffleBuffer {
    /// `producers` is the number of threads that will call `push`;
    /// the buffer counts them down as each one finishes.
    pub fn new(capacity: usize, min_fill: usize, producers: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None       => StdRng::from_entropy(),
        };
        Self {
            state: Mutex::new(BufferState {
                items: Vec::with_capacity(capacity),
                producers,
                rng,
                error: None,
                closed: false,
            }),
            space: Condvar::new(),
            fill: Condvar::new(),
            capacity,
            min_fill,
        }
    }

    /// Add one example, blocking while the buffer is full.
    /// Returns `false` once the consumer has closed the buffer —
    /// the producer should stop reading.
    pub fn push(&self, example: TrainingExample) -> bool {
        let mut state = self.state.lock().unwrap();
        while state.items.len() >= self.capacity && !state.closed {
            state = self.space.wait(state).unwrap();
        }
        if state.closed {
            return false;
        }
        state.items.push(example);
        self.fill.notify_one();
        true
    }

    /// Remove one random batch, blocking until the release rule is met.
    ///
    /// Returns `Ok(None)` when every producer has finished and fewer
    /// than `batch_size` examples remain. A producer-side failure is
    /// returned here as the error it was parked with.
    pub fn pop_batch(&self, batch_size: usize) -> Result<Option<Vec<TrainingExample>>> {
        let mut guard = self.state.lock().unwrap();
        loop {
            if let Some(error) = guard.error.take() {
                return Err(error);
            }

            if batch_ready(&guard, self.min_fill, batch_size) {
                let state = &mut *guard;
                let mut batch = Vec::with_capacity(batch_size);
                for _ in 0..batch_size {
                    let index = state.rng.gen_range(0..state.items.len());
                    batch.push(state.items.swap_remove(index));
                }
                self.space.notify_all();
                return Ok(Some(batch));
            }

            if guard.producers == 0 {
                return Ok(None);
            }

            guard = self.fill.wait(guard).unwrap();
        }
    }

    /// Non-blocking variant of `pop_batch`: `None` whenever the release
    /// rule is not currently met.
    pub fn try_pop_batch(&self, batch_size: usize) -> Option<Vec<TrainingExample>> {
        let mut guard = self.state.lock().unwrap();
        if !batch_ready(&guard, self.min_fill, batch_size) {
            return None;
        }
        let state = &mut *guard;
        let mut batch = Vec::with_capacity(batch_size);
        for _ in 0..batch_size {
            let index = state.rng.gen_range(0..state.items.len());
            batch.push(state.items.swap_remove(index));
        }
        self.space.notify_all();
        Some(batch)
    }

    /// Called by a producer thread when it has no more records.
    pub fn producer_finished(&self) {
        let mut state = self.state.lock().unwrap();
        state.producers = state.producers.saturating_sub(1);
        if state.producers == 0 {
            self.fill.notify_all();
        }
    }

    /// Park a producer-side failure for the consumer. Only the first
    /// error is kept; the pipeline stops at the first failure anyway.
    pub fn fail(&self, error: anyhow::Error) {
        let mut state = self.state.lock().unwrap();
        if state.error.is_none() {
            state.error = Some(error);
        }
        self.fill.notify_all();
    }

    /// Consumer-side shutdown: unblocks every producer so the reader
    /// threads can exit promptly.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        self.space.notify_all();
    }

    /// Number of buffered examples right now.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The batch release rule: keep `min_fill` examples behind while any
/// producer is still running, drop that requirement afterwards.
fn batch_ready(state: &BufferState, min_fill: usize, batch_size: usize) -> bool {
    if batch_size == 0 {
        return false;
    }
    if state.producers > 0 {
        state.items.len() >= min_fill + batch_size
    } else {
        state.items.len() >= batch_size
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn example(id: f32) -> TrainingExample {
        TrainingExample {
            features: vec![id],
            labels:   vec![id],
        }
    }

    #[test]
    fn test_no_batch_below_min_fill_while_producers_live() {
        let buffer = ShuffleBuffer::new(20, 10, 1, Some(3));
        for i in 0..11 {
            buffer.push(example(i as f32));
        }

        // 11 buffered, need min_fill + batch = 12
        assert!(buffer.try_pop_batch(2).is_none());

        buffer.push(example(11.0));
        let batch = buffer.try_pop_batch(2).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(buffer.len(), 10);
    }

    #[test]
    fn test_min_fill_rule_dropped_after_producers_finish() {
        let buffer = ShuffleBuffer::new(20, 10, 1, Some(3));
        for i in 0..5 {
            buffer.push(example(i as f32));
        }
        buffer.producer_finished();

        let batch = buffer.pop_batch(4).unwrap().unwrap();
        assert_eq!(batch.len(), 4);

        // One example left — not enough for another batch of 4
        assert_eq!(buffer.pop_batch(4).unwrap(), None);
    }

    #[test]
    fn test_drained_buffer_ends_the_stream() {
        let buffer = ShuffleBuffer::new(10, 2, 1, Some(1));
        buffer.producer_finished();
        assert_eq!(buffer.pop_batch(1).unwrap(), None);
    }

    #[test]
    fn test_parked_error_reaches_the_consumer() {
        let buffer = ShuffleBuffer::new(10, 2, 1, Some(1));
        buffer.fail(anyhow::anyhow!("shard went missing"));
        buffer.producer_finished();

        let err = buffer.pop_batch(1).unwrap_err();
        assert!(err.to_string().contains("shard went missing"));
    }

    #[test]
    fn test_push_returns_false_after_close() {
        let buffer = ShuffleBuffer::new(10, 2, 1, Some(1));
        assert!(buffer.push(example(0.0)));
        buffer.close();
        assert!(!buffer.push(example(1.0)));
    }

    #[test]
    fn test_batch_members_are_removed_from_the_pool() {
        let buffer = ShuffleBuffer::new(32, 4, 1, Some(9));
        for i in 0..12 {
            buffer.push(example(i as f32));
        }
        buffer.producer_finished();

        let mut seen: Vec<f32> = Vec::new();
        while let Some(batch) = buffer.pop_batch(3).unwrap() {
            seen.extend(batch.iter().map(|e| e.features[0]));
        }
        seen.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let expected: Vec<f32> = (0..12).map(|i| i as f32).collect();
        assert_eq!(seen, expected);
    }
}
