//! Image decoding into normalised CHW `f32` batches.
//!
//! Decoding runs on a dedicated rayon pool so a batch of JPEGs is read in
//! parallel while the training thread waits on the result. The pool is
//! purely an I/O helper; ordering of the returned batch always matches the
//! input order.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::imageops::FilterType;
use rayon::prelude::*;

use crate::error::DatasetError;

/// Channels per image (RGB).
pub const CHANNELS: usize = 3;

/// Per-channel normalisation: `(x / 255 - MEAN) / STD`.
const MEAN: f32 = 0.5;
const STD: f32 = 0.5;

/// A batch of square RGB images stored as `(batch, 3, size, size)` row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBatch {
    pub data: Vec<f32>,
    pub len: usize,
    pub size: usize,
}

impl ImageBatch {
    /// Build a batch from per-image CHW buffers.
    ///
    /// # Panics
    /// Panics if any buffer is not `3 * size * size` long.
    pub fn from_images(images: Vec<Vec<f32>>, size: usize) -> Self {
        let per_image = CHANNELS * size * size;
        let len = images.len();
        let mut data = Vec::with_capacity(len * per_image);
        for (i, img) in images.into_iter().enumerate() {
            assert_eq!(
                img.len(),
                per_image,
                "image {i} has {} values, expected {per_image}",
                img.len()
            );
            data.extend(img);
        }
        Self { data, len, size }
    }

    pub fn shape(&self) -> [usize; 4] {
        [self.len, CHANNELS, self.size, self.size]
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Decodes and resizes face images to a fixed square resolution.
#[derive(Clone)]
pub struct ImageLoader {
    size: usize,
    pool: Arc<rayon::ThreadPool>,
}

impl ImageLoader {
    /// Create a loader producing `size × size` images with `num_workers`
    /// decode threads.
    pub fn new(size: usize, num_workers: usize) -> anyhow::Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_workers.max(1))
            .thread_name(|i| format!("fiw-decode-{i}"))
            .build()?;
        Ok(Self {
            size,
            pool: Arc::new(pool),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Decode one image into a normalised CHW buffer.
    pub fn decode(&self, path: &Path) -> Result<Vec<f32>, DatasetError> {
        let img = image::open(path).map_err(|source| DatasetError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        let side = self.size as u32;
        let rgb = img.resize_exact(side, side, FilterType::Triangle).to_rgb8();

        let plane = self.size * self.size;
        let mut out = vec![0.0_f32; CHANNELS * plane];
        for (i, pixel) in rgb.pixels().enumerate() {
            for c in 0..CHANNELS {
                out[c * plane + i] = (pixel[c] as f32 / 255.0 - MEAN) / STD;
            }
        }
        Ok(out)
    }

    /// Decode many images in parallel, preserving order.
    pub fn decode_batch(&self, paths: &[PathBuf]) -> Result<ImageBatch, DatasetError> {
        let images = self.pool.install(|| {
            paths
                .par_iter()
                .map(|p| self.decode(p))
                .collect::<Result<Vec<_>, _>>()
        })?;
        Ok(ImageBatch::from_images(images, self.size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_png(path: &Path, w: u32, h: u32, rgb: [u8; 3]) {
        let img = image::RgbImage::from_pixel(w, h, image::Rgb(rgb));
        img.save(path).unwrap();
    }

    #[test]
    fn test_decode_resizes_and_normalises() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("white.png");
        write_png(&path, 10, 6, [255, 255, 255]);

        let loader = ImageLoader::new(4, 1).unwrap();
        let buf = loader.decode(&path).unwrap();
        assert_eq!(buf.len(), 3 * 4 * 4);
        assert!(buf.iter().all(|v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_decode_channel_planes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("red.png");
        write_png(&path, 2, 2, [255, 0, 0]);

        let loader = ImageLoader::new(2, 1).unwrap();
        let buf = loader.decode(&path).unwrap();
        // R plane first, then G, then B.
        assert!(buf[..4].iter().all(|v| (v - 1.0).abs() < 1e-6));
        assert!(buf[4..].iter().all(|v| (v + 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_decode_batch_keeps_order() {
        let tmp = TempDir::new().unwrap();
        let black = tmp.path().join("black.png");
        let white = tmp.path().join("white.png");
        write_png(&black, 3, 3, [0, 0, 0]);
        write_png(&white, 3, 3, [255, 255, 255]);

        let loader = ImageLoader::new(2, 2).unwrap();
        let batch = loader
            .decode_batch(&[white.clone(), black.clone(), white])
            .unwrap();
        assert_eq!(batch.shape(), [3, 3, 2, 2]);
        let per = 3 * 2 * 2;
        assert!((batch.data[0] - 1.0).abs() < 1e-6);
        assert!((batch.data[per] + 1.0).abs() < 1e-6);
        assert!((batch.data[2 * per] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_file_is_decode_error() {
        let loader = ImageLoader::new(2, 1).unwrap();
        let err = loader.decode(Path::new("/nonexistent/face.jpg")).unwrap_err();
        assert!(matches!(err, DatasetError::Decode { .. }));
    }
}
