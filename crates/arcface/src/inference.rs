//! Embedding extraction from a saved encoder.

use std::path::Path;

use burn::prelude::*;
use fiw::{ImageBatch, PairSource};

use crate::checkpoint::load_encoder;
use crate::error::ArcFaceError;
use crate::model::backbone::{Backbone, BackboneConfig};
use crate::model::bridge::{images_to_tensor, tensor_to_rows};
use crate::validation::{cosine_similarity, validate, ValidationReport};

/// Encoder wrapper for inference on a fixed device.
///
/// Wrap an inference-mode model (plain backend, or `valid()` of an
/// autodiff one) so batch norm uses its running statistics.
pub struct EmbeddingExtractor<B: Backend> {
    encoder: Backbone<B>,
    device: B::Device,
}

impl<B: Backend> EmbeddingExtractor<B> {
    pub fn new(encoder: Backbone<B>, device: B::Device) -> Self {
        Self { encoder, device }
    }

    /// Rebuild the encoder from `config` and load checkpoint weights.
    pub fn load(path: &Path, config: &BackboneConfig, device: B::Device) -> Result<Self, ArcFaceError> {
        let encoder = load_encoder::<B>(path, config, &device)?;
        tracing::info!(path = %path.display(), backbone = %config.kind, "Loaded encoder checkpoint");
        Ok(Self { encoder, device })
    }

    pub fn embedding_dim(&self) -> usize {
        self.encoder.embedding_dim()
    }

    /// One embedding per image. Empty batches give no embeddings.
    pub fn embed(&self, batch: &ImageBatch) -> Vec<Vec<f32>> {
        if batch.is_empty() {
            return Vec::new();
        }
        let images = images_to_tensor::<B>(batch, &self.device);
        tensor_to_rows::<B>(self.encoder.forward(images))
    }

    /// Cosine similarity of two embeddings.
    pub fn similarity(a: &[f32], b: &[f32]) -> f64 {
        cosine_similarity(a, b)
    }

    /// Full validation pass over `pairs`.
    pub fn evaluate(
        &self,
        pairs: &dyn PairSource,
        batch_size: usize,
        ece_bins: usize,
    ) -> Result<ValidationReport, ArcFaceError> {
        validate(&self.encoder, pairs, batch_size, ece_bins, &self.device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::backbone::BackboneKind;
    use burn::backend::ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn batch(len: usize, size: usize) -> ImageBatch {
        let data = (0..len * 3 * size * size)
            .map(|i| ((i % 17) as f32 / 8.0) - 1.0)
            .collect();
        ImageBatch { data, len, size }
    }

    #[test]
    fn test_embed_shape() {
        let device = Default::default();
        let config = BackboneConfig::new(BackboneKind::ResNet50)
            .with_base_width(2)
            .with_embedding_dim(6);
        let extractor = EmbeddingExtractor::new(config.init::<TestBackend>(&device), device);
        let rows = extractor.embed(&batch(3, 32));
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.len() == 6));
        assert!(extractor.embed(&batch(0, 32)).is_empty());
    }

    #[test]
    fn test_same_image_is_self_similar() {
        let device = Default::default();
        let config = BackboneConfig::new(BackboneKind::ResNet50)
            .with_base_width(2)
            .with_embedding_dim(6);
        let extractor = EmbeddingExtractor::new(config.init::<TestBackend>(&device), device);
        let one = extractor.embed(&batch(1, 32));
        let sim = EmbeddingExtractor::<TestBackend>::similarity(&one[0], &one[0]);
        assert!((sim - 1.0).abs() < 1e-6);
    }
}
