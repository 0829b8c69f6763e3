// ============================================================
// Layer 4 — IDX Archive Reader
// ============================================================
// Loads image and label archives in the IDX binary format used
// by the classic computer-vision benchmark sets.
//
// The format is a flat header followed by raw data:
//
//   images (magic 2051)              labels (magic 2049)
//     u32 BE  magic                    u32 BE  magic
//     u32 BE  image count              u32 BE  label count
//     u32 BE  rows                     u8 × count  class ids
//     u32 BE  cols
//     u8 × count·rows·cols  pixels
//
// All header integers are big-endian. Pixels are row-major,
// one byte per pixel, one image after another.
//
// Reference: Rust Book §9 (Error Handling)
//            IDX format description at yann.lecun.com/exdb/mnist

use anyhow::{Context, Result};
use std::{fs, path::Path};

/// Magic number opening an IDX image archive.
const IMAGE_MAGIC: u32 = 2051;

/// Magic number opening an IDX label archive.
const LABEL_MAGIC: u32 = 2049;

/// A fully loaded image archive: the header fields plus the raw
/// pixel plane, one byte per pixel.
#[derive(Debug)]
pub struct IdxImages {
    pub count: usize,
    pub rows:  usize,
    pub cols:  usize,
    pixels:    Vec<u8>,
}

impl IdxImages {
    /// Bytes per image (`rows × cols`).
    pub fn image_len(&self) -> usize {
        self.rows * self.cols
    }

    /// The raw pixels of one image.
    pub fn image(&self, index: usize) -> &[u8] {
        let len   = self.image_len();
        let start = index * len;
        &self.pixels[start..start + len]
    }
}

/// Read the next big-endian u32 out of `data`, advancing `offset`.
fn read_be_u32(data: &[u8], offset: &mut usize) -> Result<u32> {
    let end = *offset + 4;
    let bytes: [u8; 4] = data
        .get(*offset..end)
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| anyhow::anyhow!("Header ends after {} byte(s)", data.len()))?;
    *offset = end;
    Ok(u32::from_be_bytes(bytes))
}

/// Load an IDX image archive into memory.
pub fn read_idx_images(path: &Path) -> Result<IdxImages> {
    let data = fs::read(path)
        .with_context(|| format!("Cannot read image archive '{}'", path.display()))?;

    let mut offset = 0usize;
    let magic = read_be_u32(&data, &mut offset)?;
    if magic != IMAGE_MAGIC {
        return Err(anyhow::anyhow!(
            "'{}' is not an IDX image archive (magic {} instead of {})",
            path.display(),
            magic,
            IMAGE_MAGIC,
        ));
    }

    let count = read_be_u32(&data, &mut offset)? as usize;
    let rows  = read_be_u32(&data, &mut offset)? as usize;
    let cols  = read_be_u32(&data, &mut offset)? as usize;

    let pixel_count = count
        .checked_mul(rows)
        .and_then(|n| n.checked_mul(cols))
        .ok_or_else(|| {
            anyhow::anyhow!("Image header of '{}' declares an impossible size", path.display())
        })?;

    let pixels = data[offset..].to_vec();
    if pixels.len() != pixel_count {
        return Err(anyhow::anyhow!(
            "'{}' holds {} pixel byte(s) but the header declares {} ({} × {} × {})",
            path.display(),
            pixels.len(),
            pixel_count,
            count,
            rows,
            cols,
        ));
    }

    tracing::debug!("Loaded {} image(s) of {} × {} from '{}'", count, rows, cols, path.display());

    Ok(IdxImages { count, rows, cols, pixels })
}

/// Load an IDX label archive: one class id byte per example.
pub fn read_idx_labels(path: &Path) -> Result<Vec<u8>> {
    let data = fs::read(path)
        .with_context(|| format!("Cannot read label archive '{}'", path.display()))?;

    let mut offset = 0usize;
    let magic = read_be_u32(&data, &mut offset)?;
    if magic != LABEL_MAGIC {
        return Err(anyhow::anyhow!(
            "'{}' is not an IDX label archive (magic {} instead of {})",
            path.display(),
            magic,
            LABEL_MAGIC,
        ));
    }

    let count  = read_be_u32(&data, &mut offset)? as usize;
    let labels = data[offset..].to_vec();
    if labels.len() != count {
        return Err(anyhow::anyhow!(
            "'{}' holds {} label(s) but the header declares {}",
            path.display(),
            labels.len(),
            count,
        ));
    }

    tracing::debug!("Loaded {} label(s) from '{}'", count, path.display());

    Ok(labels)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_file(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("lfw_pipeline_idx_{}_{}", tag, std::process::id()))
    }

    fn image_archive(count: u32, rows: u32, cols: u32, pixels: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&IMAGE_MAGIC.to_be_bytes());
        bytes.extend_from_slice(&count.to_be_bytes());
        bytes.extend_from_slice(&rows.to_be_bytes());
        bytes.extend_from_slice(&cols.to_be_bytes());
        bytes.extend_from_slice(pixels);
        bytes
    }

    fn label_archive(labels: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&LABEL_MAGIC.to_be_bytes());
        bytes.extend_from_slice(&(labels.len() as u32).to_be_bytes());
        bytes.extend_from_slice(labels);
        bytes
    }

    #[test]
    fn test_reads_images_and_indexes_them() {
        let path   = temp_file("images_ok");
        let pixels = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
        fs::write(&path, image_archive(2, 2, 3, &pixels)).unwrap();

        let images = read_idx_images(&path).unwrap();
        assert_eq!(images.count, 2);
        assert_eq!(images.image_len(), 6);
        assert_eq!(images.image(0), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(images.image(1), &[7, 8, 9, 10, 11, 12]);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_rejects_wrong_image_magic() {
        let path  = temp_file("images_magic");
        let mut bytes = image_archive(1, 1, 1, &[0]);
        bytes[3] = 99;
        fs::write(&path, bytes).unwrap();

        let err = read_idx_images(&path).unwrap_err();
        assert!(err.to_string().contains("not an IDX image archive"));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_rejects_truncated_pixels() {
        let path  = temp_file("images_short");
        let mut bytes = image_archive(2, 2, 3, &[0; 12]);
        bytes.truncate(bytes.len() - 5);
        fs::write(&path, bytes).unwrap();

        assert!(read_idx_images(&path).is_err());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_rejects_truncated_header() {
        let path = temp_file("images_header");
        fs::write(&path, [0u8, 0, 8, 3, 0, 0]).unwrap();

        assert!(read_idx_images(&path).is_err());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_reads_labels() {
        let path = temp_file("labels_ok");
        fs::write(&path, label_archive(&[3, 1, 4, 1, 5])).unwrap();

        let labels = read_idx_labels(&path).unwrap();
        assert_eq!(labels, vec![3, 1, 4, 1, 5]);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_rejects_label_count_mismatch() {
        let path = temp_file("labels_short");
        let mut bytes = label_archive(&[1, 2, 3, 4]);
        bytes.pop();
        fs::write(&path, bytes).unwrap();

        assert!(read_idx_labels(&path).is_err());

        let _ = fs::remove_file(&path);
    }
}
