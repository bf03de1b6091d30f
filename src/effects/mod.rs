//! Per-box visual effects: a color-matrix pass followed by a separable
//! Gaussian blur.
//!
//! Both backends implement [`EffectsStage`]; the GPU path is the production
//! one, the CPU path is the reference used in tests and on machines without
//! an adapter.

pub mod cpu;
pub mod gpu;
pub mod kernel;
pub mod shader;

use crate::core::effects::EffectSettings;
use crate::decode::frame::VideoFrame;

pub use cpu::CpuEffects;
pub use gpu::WgpuEffects;
pub use kernel::{gaussian_kernel, ColorMatrix, GaussianKernel};

#[derive(Debug, thiserror::Error)]
pub enum EffectsError {
    #[error("no gpu adapter: {0}")]
    NoAdapter(String),
    #[error("gpu error: {0}")]
    Gpu(String),
    #[error("readback failed: {0}")]
    Readback(String),
}

/// One configurable processing stage between decode and render.
pub trait EffectsStage: Send {
    /// Apply `settings` to `frame`. Geometry and timing cross unchanged;
    /// neutral settings return pixel-identical output.
    fn process(&mut self, frame: &VideoFrame, settings: &EffectSettings) -> Result<VideoFrame, EffectsError>;
}
