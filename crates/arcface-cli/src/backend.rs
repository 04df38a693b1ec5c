//! Backend and device selection.
//!
//! CPU (`NdArray`) by default; the `wgpu` feature switches to a discrete GPU.
//! The `--gpu` id is only interpreted here, once, at start-up.

use anyhow::Context;
use burn::backend::Autodiff;
use burn::prelude::Backend;

#[cfg(not(feature = "wgpu"))]
pub type InferenceBackend = burn::backend::NdArray<f32>;
#[cfg(feature = "wgpu")]
pub type InferenceBackend = burn::backend::Wgpu;

pub type TrainBackend = Autodiff<InferenceBackend>;

pub type Device = <InferenceBackend as Backend>::Device;

/// Start-up state handed to every component: RNG seed and device.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub seed: u64,
    pub device: Device,
}

impl RunContext {
    /// Resolve the device for `gpu` and seed the backend RNG.
    pub fn init(seed: u64, gpu: &str) -> anyhow::Result<Self> {
        let device = select_device(gpu)?;
        TrainBackend::seed(seed);
        tracing::info!(seed, ?device, "Run context ready");
        Ok(Self { seed, device })
    }
}

/// Parse a GPU id. A comma-separated list selects its first entry.
pub fn parse_gpu_id(gpu: &str) -> anyhow::Result<usize> {
    let first = gpu.split(',').next().unwrap_or_default().trim();
    first
        .parse::<usize>()
        .with_context(|| format!("invalid --gpu value {gpu:?}: expected a device index"))
}

#[cfg(not(feature = "wgpu"))]
pub fn select_device(gpu: &str) -> anyhow::Result<Device> {
    let id = parse_gpu_id(gpu)?;
    if id != 0 {
        tracing::warn!(gpu = id, "Built without the wgpu feature; running on CPU");
    }
    Ok(burn::backend::ndarray::NdArrayDevice::Cpu)
}

#[cfg(feature = "wgpu")]
pub fn select_device(gpu: &str) -> anyhow::Result<Device> {
    let id = parse_gpu_id(gpu)?;
    Ok(burn::backend::wgpu::WgpuDevice::DiscreteGpu(id))
}
