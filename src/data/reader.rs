// ============================================================
// Layer 4 — Record Reader
// ============================================================
// Decodes one shard file frame by frame, verifying both
// checksums. The reverse of writer.rs:
//
//   1. Read the u64 length and its masked CRC32
//   2. Verify the length checksum BEFORE allocating the payload
//      buffer, so a corrupt length cannot trigger a huge read
//   3. Read the payload and verify its checksum
//   4. Decode the bincode payload into a Record
//
// End-of-file is only clean on a frame boundary. A file that ends
// mid-frame was truncated and is reported as an error — there is
// no skip-corrupt-record recovery anywhere in this pipeline.
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §13 (Iterators)

use anyhow::{Context, Result};
use std::{
    fs::{self, File},
    io::{self, BufReader, Read},
    path::{Path, PathBuf},
};

use crate::data::writer::masked_crc32;
use crate::domain::phase::Phase;
use crate::domain::record::Record;

// ─── ShardReader ──────────────────────────────────────────────────────────────
/// Iterates over the records of a single shard file.
pub struct ShardReader {
    reader: BufReader<File>,
    path:   PathBuf,
}

impl ShardReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Cannot open shard file '{}'", path.display()))?;
        Ok(Self {
            reader: BufReader::new(file),
            path:   path.to_path_buf(),
        })
    }

    /// Read the next frame, or `None` at a clean end of file.
    fn read_frame(&mut self) -> Result<Option<Record>> {
        let mut length_bytes = [0u8; 8];
        if !fill_or_eof(&mut self.reader, &mut length_bytes)
            .with_context(|| format!("Cannot read frame length in '{}'", self.path.display()))?
        {
            return Ok(None);
        }

        let mut crc_bytes = [0u8; 4];
        self.reader
            .read_exact(&mut crc_bytes)
            .with_context(|| format!("Truncated frame header in '{}'", self.path.display()))?;
        if u32::from_le_bytes(crc_bytes) != masked_crc32(&length_bytes) {
            return Err(anyhow::anyhow!(
                "Length checksum mismatch in '{}'",
                self.path.display()
            ));
        }

        let length = u64::from_le_bytes(length_bytes) as usize;
        let mut payload = vec![0u8; length];
        self.reader
            .read_exact(&mut payload)
            .with_context(|| format!("Truncated payload in '{}'", self.path.display()))?;

        self.reader
            .read_exact(&mut crc_bytes)
            .with_context(|| format!("Truncated frame footer in '{}'", self.path.display()))?;
        if u32::from_le_bytes(crc_bytes) != masked_crc32(&payload) {
            return Err(anyhow::anyhow!(
                "Payload checksum mismatch in '{}'",
                self.path.display()
            ));
        }

        let record: Record = bincode::deserialize(&payload)
            .with_context(|| format!("Cannot decode record payload in '{}'", self.path.display()))?;
        Ok(Some(record))
    }
}

impl Iterator for ShardReader {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_frame().transpose()
    }
}

/// Fill `buf` completely, or return `false` when the reader was already
/// at end of file. Running dry partway through is an error.
fn fill_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0usize;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "file ends in the middle of a frame",
            ));
        }
        filled += n;
    }
    Ok(true)
}

// ─── Shard Discovery ──────────────────────────────────────────────────────────
/// List the shard files of one split: every file in `folder` whose name
/// contains the split name. Sorted so the cursor starts deterministic.
pub fn find_shard_files(folder: &Path, phase: Phase) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(folder)
        .with_context(|| format!("Cannot read records folder '{}'", folder.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path  = entry.path();
        let name  = entry.file_name();
        if path.is_file() && name.to_string_lossy().contains(phase.as_str()) {
            files.push(path);
        }
    }

    if files.is_empty() {
        return Err(anyhow::anyhow!(
            "No {} shard files found in '{}'",
            phase,
            folder.display()
        ));
    }

    files.sort();
    Ok(files)
}
