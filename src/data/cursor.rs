// ============================================================
// Layer 4 — Shard Cursor
// ============================================================
// One shared cursor over the shard file list. Every reader
// thread pulls its next file from here, so a file is processed
// by exactly one thread per pass. The list is reshuffled at the
// start of each pass, and the cursor runs dry after a fixed
// number of passes — the cap on the otherwise endless stream.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::{path::PathBuf, sync::Mutex};

/// Hands out shard files in shuffled order, one pass at a time.
pub struct ShardCursor {
    state: Mutex<CursorState>,
}

struct CursorState {
    files:            Vec<PathBuf>,
    position:         usize,
    remaining_passes: usize,
    rng:              StdRng,
}

impl ShardCursor {
    /// `passes` bounds how many times the full file list is handed out.
    /// A fixed `seed` makes the file order reproducible.
    pub fn new(files: Vec<PathBuf>, passes: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None       => StdRng::from_entropy(),
        };
        let position = files.len();
        Self {
            state: Mutex::new(CursorState {
                files,
                position,
                remaining_passes: passes,
                rng,
            }),
        }
    }

    /// The next file to read, or `None` once every pass is spent.
    pub fn next_file(&self) -> Option<PathBuf> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;

        if state.files.is_empty() {
            return None;
        }
        if state.position >= state.files.len() {
            if state.remaining_passes == 0 {
                return None;
            }
            state.remaining_passes -= 1;
            state.position = 0;
            state.files.shuffle(&mut state.rng);
        }

        let file = state.files[state.position].clone();
        state.position += 1;
        Some(file)
    }
}
