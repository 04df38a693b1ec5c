//! Tensor bridge: conversions between host-side batches from the `fiw` crate
//! and burn tensors.
//!
//! Data sources produce `Vec<f32>` pixels and `usize` labels; the model needs
//! `Tensor<B, 4>` images and `Tensor<B, 1, Int>` targets on the selected
//! device.

use burn::prelude::*;
use burn::tensor::TensorData;
use fiw::ImageBatch;

/// Convert an image batch to a `(batch, 3, size, size)` tensor.
///
/// # Panics
/// Panics if the batch is empty.
pub fn images_to_tensor<B: Backend>(batch: &ImageBatch, device: &B::Device) -> Tensor<B, 4> {
    assert!(!batch.is_empty(), "image batch must not be empty");
    Tensor::from_data(TensorData::new(batch.data.clone(), batch.shape()), device)
}

/// Convert class labels to an integer tensor of shape `(batch,)`.
pub fn labels_to_tensor<B: Backend>(labels: &[usize], device: &B::Device) -> Tensor<B, 1, Int> {
    let values: Vec<i64> = labels.iter().map(|&l| l as i64).collect();
    Tensor::from_data(TensorData::new(values, [labels.len()]), device)
}

/// Extract f64 values from a burn 1D tensor.
pub fn tensor_to_vec<B: Backend>(tensor: Tensor<B, 1>) -> Vec<f64> {
    let data = tensor.into_data().convert::<f32>();
    data.to_vec::<f32>()
        .unwrap_or_default()
        .into_iter()
        .map(|v| v as f64)
        .collect()
}

/// Split a `(batch, dim)` tensor into one `Vec<f32>` per row.
pub fn tensor_to_rows<B: Backend>(tensor: Tensor<B, 2>) -> Vec<Vec<f32>> {
    let [_, dim] = tensor.dims();
    let flat: Vec<f32> = tensor
        .into_data()
        .convert::<f32>()
        .to_vec()
        .unwrap_or_default();
    if dim == 0 {
        return Vec::new();
    }
    flat.chunks(dim).map(<[f32]>::to_vec).collect()
}
