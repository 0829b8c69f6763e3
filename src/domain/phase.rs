// ============================================================
// Layer 3 — Phase Domain Type
// ============================================================
// The dataset split a record belongs to. The phase name appears
// in every shard filename, and the reader later selects files by
// matching that name as a substring.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The dataset split: training or validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Train,
    Validation,
}

impl Phase {
    /// The lowercase split name used in shard filenames.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Train      => "train",
            Phase::Validation => "validation",
        }
    }

    /// Filename of shard `index` for this split, e.g. `train_0.tfrecords`.
    pub fn shard_filename(self, index: usize) -> String {
        format!("{}_{}.tfrecords", self.as_str(), index)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_filenames() {
        assert_eq!(Phase::Train.shard_filename(0), "train_0.tfrecords");
        assert_eq!(Phase::Validation.shard_filename(3), "validation_3.tfrecords");
    }

    #[test]
    fn test_display_matches_filename_token() {
        assert_eq!(Phase::Train.to_string(), "train");
        assert_eq!(Phase::Validation.to_string(), "validation");
    }
}
