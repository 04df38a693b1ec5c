//! Classification pool for ArcFace training.
//!
//! The pool is sampled once up front with `epochs × train_steps × batch_size`
//! entries so each epoch can consume a fresh window. The trainer advances the
//! window with [`TrainSource::set_bias`] after every epoch; a pass then reads
//! `pool[bias..]`.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::families::FamilyIndex;
use crate::loader::ImageLoader;
use crate::source::{chunk_ranges, Batches, LabeledBatch, TrainSource};
use crate::types::FaceSample;

/// Training pool of `(image, family)` samples with a bias cursor.
pub struct ClassifierTrain {
    pool: Vec<FaceSample>,
    bias: usize,
    loader: ImageLoader,
}

impl ClassifierTrain {
    /// Sample `num_samples` faces: a uniformly random family, then a
    /// uniformly random image of that family.
    pub fn sample(
        index: &FamilyIndex,
        num_samples: usize,
        loader: ImageLoader,
        rng: &mut impl Rng,
    ) -> Self {
        let populated: Vec<usize> = (0..index.num_families())
            .filter(|&f| !index.images(f).is_empty())
            .collect();
        if populated.is_empty() && num_samples > 0 {
            tracing::warn!(requested = num_samples, "No family has images; training pool is empty");
        }

        let mut pool = Vec::new();
        if !populated.is_empty() {
            pool.reserve(num_samples);
            for _ in 0..num_samples {
                let family = populated[rng.gen_range(0..populated.len())];
                if let Some(path) = index.images(family).choose(rng) {
                    pool.push(FaceSample {
                        path: path.clone(),
                        family,
                    });
                }
            }
        }
        tracing::info!(samples = pool.len(), families = populated.len(), "Training pool sampled");
        Self::from_samples(pool, loader)
    }

    /// Wrap an explicit sample list.
    pub fn from_samples(pool: Vec<FaceSample>, loader: ImageLoader) -> Self {
        Self {
            pool,
            bias: 0,
            loader,
        }
    }

    /// Total pool size, independent of the bias.
    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    /// Samples visible in the current window.
    pub fn window(&self) -> &[FaceSample] {
        self.pool.get(self.bias..).unwrap_or(&[])
    }
}

impl TrainSource for ClassifierTrain {
    fn batches(&self, batch_size: usize) -> Batches<'_, LabeledBatch> {
        let window = self.window();
        Box::new(chunk_ranges(window.len(), batch_size).map(move |(start, end)| {
            let chunk = &window[start..end];
            let paths: Vec<_> = chunk.iter().map(|s| s.path.clone()).collect();
            let images = self.loader.decode_batch(&paths)?;
            Ok(LabeledBatch {
                images,
                labels: chunk.iter().map(|s| s.family).collect(),
            })
        }))
    }

    fn set_bias(&mut self, offset: usize) {
        if offset > self.pool.len() {
            tracing::warn!(
                offset,
                pool = self.pool.len(),
                "Bias past end of training pool; window is empty"
            );
        }
        self.bias = offset;
    }

    fn bias(&self) -> usize {
        self.bias
    }

    fn len(&self) -> usize {
        self.pool.len().saturating_sub(self.bias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::path::PathBuf;

    fn index() -> FamilyIndex {
        FamilyIndex::from_families(vec![
            ("F0001".into(), vec![PathBuf::from("a1.jpg"), PathBuf::from("a2.jpg")]),
            ("F0002".into(), vec![PathBuf::from("b1.jpg")]),
            ("F0003".into(), vec![PathBuf::from("c1.jpg")]),
        ])
    }

    #[test]
    fn test_sample_size_and_labels() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(100);
        let loader = ImageLoader::new(4, 1).unwrap();
        let train = ClassifierTrain::sample(&index(), 50, loader, &mut rng);
        assert_eq!(train.pool_len(), 50);
        assert!(train.window().iter().all(|s| s.family < 3));
        let f2 = train.window().iter().find(|s| s.family == 1).unwrap();
        assert_eq!(f2.path, PathBuf::from("b1.jpg"));
    }

    #[test]
    fn test_sample_is_seeded() {
        let loader = ImageLoader::new(4, 1).unwrap();
        let a = ClassifierTrain::sample(
            &index(),
            20,
            loader.clone(),
            &mut rand::rngs::StdRng::seed_from_u64(7),
        );
        let b = ClassifierTrain::sample(
            &index(),
            20,
            loader,
            &mut rand::rngs::StdRng::seed_from_u64(7),
        );
        assert_eq!(a.window(), b.window());
    }

    #[test]
    fn test_sample_without_images_is_empty() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let loader = ImageLoader::new(4, 1).unwrap();
        let empty = FamilyIndex::from_families(vec![("F0001".into(), vec![])]);
        let train = ClassifierTrain::sample(&empty, 3, loader, &mut rng);
        assert_eq!(train.pool_len(), 0);
        assert!(train.is_empty());
    }

    #[test]
    fn test_sample_skips_families_without_images() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let loader = ImageLoader::new(4, 1).unwrap();
        let index = FamilyIndex::from_families(vec![
            ("F0001".into(), vec![]),
            ("F0002".into(), vec![PathBuf::from("b1.jpg")]),
        ]);
        assert_eq!(index.num_families(), 1);
        assert_eq!(index.name(0), Some("F0002"));

        let train = ClassifierTrain::sample(&index, 5, loader, &mut rng);
        assert_eq!(train.pool_len(), 5);
        assert!(train.window().iter().all(|s| s.family == 0 && s.path == PathBuf::from("b1.jpg")));
    }

    #[test]
    fn test_bias_shifts_window() {
        let loader = ImageLoader::new(4, 1).unwrap();
        let samples: Vec<FaceSample> = (0..10)
            .map(|i| FaceSample {
                path: PathBuf::from(format!("{i}.jpg")),
                family: i,
            })
            .collect();
        let mut train = ClassifierTrain::from_samples(samples, loader);
        assert_eq!(train.len(), 10);

        train.set_bias(4);
        assert_eq!(train.bias(), 4);
        assert_eq!(train.len(), 6);
        assert_eq!(train.window()[0].family, 4);

        train.set_bias(12);
        assert_eq!(train.len(), 0);
        assert!(train.window().is_empty());
        assert_eq!(train.batches(3).count(), 0);
    }
}
