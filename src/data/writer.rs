// ============================================================
// Layer 4 — Record Writer
// ============================================================
// Serialises records into shard files.
//
// Each record is framed on disk as:
//
//   ┌─────────────────┬──────────────────┬─────────┬───────────────────┐
//   │ length: u64 LE  │ masked CRC32 of  │ payload │ masked CRC32 of   │
//   │ (payload bytes) │ the length bytes │         │ the payload bytes │
//   └─────────────────┴──────────────────┴─────────┴───────────────────┘
//
// The payload is the bincode encoding of a Record. The CRC mask
// rotates the checksum and adds a constant so that a checksum of
// data which happens to embed checksums still detects corruption:
//
//   masked = ((crc >> 15) | (crc << 17)) + 0xa282ead8
//
// The length field gets its own checksum so a reader can trust the
// length before allocating the payload buffer.
//
// A shard file is just a sequence of these frames. Zero frames is a
// valid (empty) shard.
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

use crate::domain::phase::Phase;
use crate::domain::record::Record;
use crate::domain::traits::{RecordTransform, ShardSource};

const CRC_MASK_DELTA: u32 = 0xa282_ead8;

/// Mask a CRC32 checksum for storage inside a frame.
pub(crate) fn masked_crc32(bytes: &[u8]) -> u32 {
    let crc = crc32fast::hash(bytes);
    ((crc >> 15) | (crc << 17)).wrapping_add(CRC_MASK_DELTA)
}

// ─── RecordWriter ─────────────────────────────────────────────────────────────
/// Writes framed records to a single shard file.
///
/// Creates (or overwrites) the file on construction. Failures propagate
/// immediately; a partially written shard is left behind for the caller
/// to discard — there is no cleanup or retry here.
pub struct RecordWriter {
    writer: BufWriter<File>,
}

impl RecordWriter {
    /// Create the shard file, truncating any previous contents.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Cannot create shard file '{}'", path.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Append one framed record.
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        let payload = bincode::serialize(record).context("Cannot encode record payload")?;

        let length = (payload.len() as u64).to_le_bytes();
        self.writer.write_all(&length)?;
        self.writer.write_all(&masked_crc32(&length).to_le_bytes())?;
        self.writer.write_all(&payload)?;
        self.writer.write_all(&masked_crc32(&payload).to_le_bytes())?;
        Ok(())
    }

    /// Flush buffered frames and close the file.
    pub fn finish(mut self) -> Result<()> {
        self.writer.flush().context("Cannot flush shard file")?;
        Ok(())
    }
}

// ─── Shard Orchestration ──────────────────────────────────────────────────────

/// Write one shard: pull the shard's records from the source, apply the
/// preprocessing hooks at most once each, and frame every record in
/// iterator order. Returns the number of records written.
fn write_shard<I>(
    path: &Path,
    records: I,
    preprocess_feature: Option<&RecordTransform>,
    preprocess_label: Option<&RecordTransform>,
) -> Result<usize>
where
    I: Iterator<Item = Record>,
{
    let mut writer = RecordWriter::create(path)?;
    let mut count  = 0usize;

    for mut record in records {
        if let Some(transform) = preprocess_feature {
            record.feature = transform(record.feature);
        }
        if let Some(transform) = preprocess_label {
            record.label = transform(record.label);
        }
        writer
            .write_record(&record)
            .with_context(|| format!("Cannot write record to '{}'", path.display()))?;
        count += 1;
    }

    writer.finish()?;
    Ok(count)
}

/// Write the full sharded dataset into `output_folder`.
///
/// Produces `train_0..N-1.tfrecords` and `validation_0..M-1.tfrecords`,
/// asking each source for one shard's records at a time. Shards are
/// written sequentially; they are independent files, so the order does
/// not matter. The preprocessing hooks run once per record on the blob
/// they are named after.
pub fn write_tf_records<S1, S2>(
    output_folder: &Path,
    train_shards: usize,
    validation_shards: usize,
    train_data: &S1,
    validation_data: &S2,
    preprocess_feature: Option<&RecordTransform>,
    preprocess_label: Option<&RecordTransform>,
) -> Result<()>
where
    S1: ShardSource,
    S2: ShardSource,
{
    fs::create_dir_all(output_folder).with_context(|| {
        format!("Cannot create output folder '{}'", output_folder.display())
    })?;

    for index in 0..train_shards {
        let path  = output_folder.join(Phase::Train.shard_filename(index));
        let count = write_shard(
            &path,
            train_data.shard(train_shards, index),
            preprocess_feature,
            preprocess_label,
        )?;
        tracing::info!("Wrote {} record(s) to '{}'", count, path.display());
    }

    for index in 0..validation_shards {
        let path  = output_folder.join(Phase::Validation.shard_filename(index));
        let count = write_shard(
            &path,
            validation_data.shard(validation_shards, index),
            preprocess_feature,
            preprocess_label,
        )?;
        tracing::info!("Wrote {} record(s) to '{}'", count, path.display());
    }

    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::InMemorySource;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lfw_writer_{}_{}", tag, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_records(n: u8) -> Vec<Record> {
        (0..n)
            .map(|i| Record::new(vec![i, i, i], vec![i]))
            .collect()
    }

    #[test]
    fn test_writes_expected_shard_files() {
        let dir   = temp_dir("files");
        let train = InMemorySource::new(sample_records(6));
        let val   = InMemorySource::new(sample_records(3));

        write_tf_records(&dir, 2, 1, &train, &val, None, None).unwrap();

        assert!(dir.join("train_0.tfrecords").is_file());
        assert!(dir.join("train_1.tfrecords").is_file());
        assert!(dir.join("validation_0.tfrecords").is_file());
        assert!(!dir.join("train_2.tfrecords").exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_empty_shard_is_a_valid_empty_file() {
        let dir    = temp_dir("empty");
        let source = InMemorySource::new(Vec::new());

        write_tf_records(&dir, 1, 1, &source, &source, None, None).unwrap();

        let meta = fs::metadata(dir.join("train_0.tfrecords")).unwrap();
        assert_eq!(meta.len(), 0);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_preprocess_hooks_run_once_per_record() {
        let dir    = temp_dir("hooks");
        let train  = InMemorySource::new(sample_records(5));
        let val    = InMemorySource::new(Vec::new());

        let feature_calls = AtomicUsize::new(0);
        let label_calls   = AtomicUsize::new(0);

        let preprocess_feature = |bytes: Vec<u8>| {
            feature_calls.fetch_add(1, Ordering::SeqCst);
            bytes
        };
        let preprocess_label = |bytes: Vec<u8>| {
            label_calls.fetch_add(1, Ordering::SeqCst);
            bytes
        };

        write_tf_records(
            &dir,
            2,
            1,
            &train,
            &val,
            Some(&preprocess_feature),
            Some(&preprocess_label),
        )
        .unwrap();

        assert_eq!(feature_calls.load(Ordering::SeqCst), 5);
        assert_eq!(label_calls.load(Ordering::SeqCst), 5);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_frame_layout_on_disk() {
        let dir    = temp_dir("frame");
        let path   = dir.join("train_0.tfrecords");
        let record = Record::new(vec![1, 2, 3], vec![9]);

        let mut writer = RecordWriter::create(&path).unwrap();
        writer.write_record(&record).unwrap();
        writer.finish().unwrap();

        let bytes   = fs::read(&path).unwrap();
        let payload = bincode::serialize(&record).unwrap();

        // u64 length + u32 crc + payload + u32 crc
        assert_eq!(bytes.len(), 8 + 4 + payload.len() + 4);

        let length = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
        assert_eq!(length as usize, payload.len());

        let length_crc = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
        assert_eq!(length_crc, masked_crc32(&bytes[0..8]));

        assert_eq!(&bytes[12..12 + payload.len()], payload.as_slice());

        let payload_crc =
            u32::from_le_bytes(bytes[12 + payload.len()..].try_into().unwrap());
        assert_eq!(payload_crc, masked_crc32(&payload));

        let _ = fs::remove_dir_all(&dir);
    }
}
