//! CPU effects backend.
//!
//! Same math as the GPU path, evaluated per pixel. Used where no adapter is
//! available and as the reference implementation in tests.

use crate::core::effects::EffectSettings;
use crate::decode::frame::VideoFrame;
use crate::effects::kernel::{gaussian_kernel, ColorMatrix, GaussianKernel};
use crate::effects::{EffectsError, EffectsStage};

#[derive(Debug, Default)]
pub struct CpuEffects;

impl CpuEffects {
    pub fn new() -> Self {
        Self
    }
}

impl EffectsStage for CpuEffects {
    fn process(&mut self, frame: &VideoFrame, settings: &EffectSettings) -> Result<VideoFrame, EffectsError> {
        if settings.is_neutral() {
            return Ok(frame.clone());
        }

        let width = frame.width as usize;
        let height = frame.height as usize;
        let mut pixels: Vec<f32> = frame.data.iter().map(|&b| b as f32 / 255.0).collect();

        if has_color_change(settings) {
            let matrix = ColorMatrix::from_settings(settings);
            for px in pixels.chunks_exact_mut(4) {
                let out = matrix.apply([px[0], px[1], px[2], px[3]]);
                px.copy_from_slice(&out);
            }
        }

        let kernel = gaussian_kernel(settings.blur);
        if !kernel.is_identity() {
            let mut tmp = vec![0.0f32; pixels.len()];
            blur_pass(&pixels, &mut tmp, width, height, &kernel, Axis::Horizontal);
            blur_pass(&tmp, &mut pixels, width, height, &kernel, Axis::Vertical);
        }

        let data = pixels
            .iter()
            .map(|&v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect();
        Ok(VideoFrame {
            data,
            width: frame.width,
            height: frame.height,
            timestamp: frame.timestamp,
            duration: frame.duration,
        })
    }
}

fn has_color_change(s: &EffectSettings) -> bool {
    s.opacity != 100.0 || s.hue != 0.0 || s.saturation != 0.0 || s.brightness != 0.0
}

enum Axis {
    Horizontal,
    Vertical,
}

/// One separable pass; taps are clamped at the image edge.
fn blur_pass(src: &[f32], dst: &mut [f32], width: usize, height: usize, kernel: &GaussianKernel, axis: Axis) {
    let half = kernel.half_width() as i64;
    for y in 0..height {
        for x in 0..width {
            let mut acc = [0.0f32; 4];
            for (k, w) in kernel.weights.iter().enumerate() {
                let offset = ((k as i64 - half) as f32 * kernel.step).round() as i64;
                let (sx, sy) = match axis {
                    Axis::Horizontal => ((x as i64 + offset).clamp(0, width as i64 - 1), y as i64),
                    Axis::Vertical => (x as i64, (y as i64 + offset).clamp(0, height as i64 - 1)),
                };
                let base = (sy as usize * width + sx as usize) * 4;
                for c in 0..4 {
                    acc[c] += src[base + c] * w;
                }
            }
            let base = (y * width + x) * 4;
            dst[base..base + 4].copy_from_slice(&acc);
        }
    }
}
