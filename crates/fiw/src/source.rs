//! Batch-source contracts consumed by the trainer.
//!
//! Both sources are restartable: every call to `batches` starts a fresh pass
//! from the beginning of the current window. The trainer caps a pass with
//! `Iterator::take`, so sources never need to know the step budget.

use crate::loader::ImageBatch;
use crate::types::KinRelation;

/// Training batch: images and their family labels.
#[derive(Debug, Clone)]
pub struct LabeledBatch {
    pub images: ImageBatch,
    pub labels: Vec<usize>,
}

/// Validation batch: both sides of each pair plus relation and kin label.
#[derive(Debug, Clone)]
pub struct PairBatch {
    pub left: ImageBatch,
    pub right: ImageBatch,
    pub relations: Vec<KinRelation>,
    pub labels: Vec<bool>,
}

impl PairBatch {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Boxed batch iterator returned by sources.
pub type Batches<'a, T> = Box<dyn Iterator<Item = anyhow::Result<T>> + 'a>;

/// Classification samples read through a movable window.
pub trait TrainSource {
    /// Iterate batches of `batch_size` starting at the current bias.
    /// The final batch may be short.
    fn batches(&self, batch_size: usize) -> Batches<'_, LabeledBatch>;

    /// Move the window so the next pass starts at pool position `offset`.
    fn set_bias(&mut self, offset: usize);

    /// Current window start.
    fn bias(&self) -> usize;

    /// Samples remaining from the current bias.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Held-out verification pairs. Stateless between passes.
pub trait PairSource {
    fn batches(&self, batch_size: usize) -> Batches<'_, PairBatch>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Index ranges `[start, end)` covering `0..len` in steps of `batch_size`.
pub(crate) fn chunk_ranges(len: usize, batch_size: usize) -> impl Iterator<Item = (usize, usize)> {
    let step = batch_size.max(1);
    (0..len)
        .step_by(step)
        .map(move |start| (start, (start + step).min(len)))
}
