//! Validation / test pair set.

use std::path::Path;

use crate::error::DatasetError;
use crate::loader::ImageLoader;
use crate::pairs::read_pairs;
use crate::source::{chunk_ranges, Batches, PairBatch, PairSource};
use crate::types::KinPair;

/// Fixed, ordered list of kin pairs served in batches.
pub struct PairSet {
    pairs: Vec<KinPair>,
    loader: ImageLoader,
}

impl PairSet {
    /// Load a pair list; relative image paths resolve against `image_root`.
    pub fn from_file(
        path: &Path,
        image_root: &Path,
        loader: ImageLoader,
    ) -> Result<Self, DatasetError> {
        let pairs = read_pairs(path, image_root)?;
        tracing::info!(pairs = pairs.len(), path = %path.display(), "Loaded pair set");
        Ok(Self::new(pairs, loader))
    }

    pub fn new(pairs: Vec<KinPair>, loader: ImageLoader) -> Self {
        Self { pairs, loader }
    }

    pub fn pairs(&self) -> &[KinPair] {
        &self.pairs
    }
}

impl PairSource for PairSet {
    fn batches(&self, batch_size: usize) -> Batches<'_, PairBatch> {
        Box::new(
            chunk_ranges(self.pairs.len(), batch_size).map(move |(start, end)| {
                let chunk = &self.pairs[start..end];
                let lefts: Vec<_> = chunk.iter().map(|p| p.left.clone()).collect();
                let rights: Vec<_> = chunk.iter().map(|p| p.right.clone()).collect();
                Ok(PairBatch {
                    left: self.loader.decode_batch(&lefts)?,
                    right: self.loader.decode_batch(&rights)?,
                    relations: chunk.iter().map(|p| p.relation).collect(),
                    labels: chunk.iter().map(|p| p.label).collect(),
                })
            }),
        )
    }

    fn len(&self) -> usize {
        self.pairs.len()
    }
}
