//! Pure effect math shared by the GPU and CPU backends.
//!
//! The color pass folds opacity, hue rotation, saturation and brightness
//! into one 4x4 matrix applied to straight-alpha RGBA. The blur pass uses a
//! separable Gaussian whose tap positions stretch once the radius outgrows
//! the tap budget, so cost stays bounded for large radii.

use crate::core::effects::EffectSettings;

// Rec. 601 luma weights, the same constants hue/saturation matrices are
// built from in SVG/CSS filter definitions.
const LUMA_R: f32 = 0.213;
const LUMA_G: f32 = 0.715;
const LUMA_B: f32 = 0.072;

/// Row-major 4x4 color matrix; `out = m * rgba`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorMatrix {
    pub m: [[f32; 4]; 4],
}

impl ColorMatrix {
    pub fn identity() -> Self {
        let mut m = [[0.0; 4]; 4];
        for (i, row) in m.iter_mut().enumerate() {
            row[i] = 1.0;
        }
        Self { m }
    }

    /// Fold every color control of `settings` into one matrix.
    pub fn from_settings(settings: &EffectSettings) -> Self {
        let brightness = 1.0 + settings.brightness / 100.0;
        let saturation = 1.0 + settings.saturation / 100.0;
        let opacity = (settings.opacity / 100.0).clamp(0.0, 1.0);

        let rgb = mul3(hue_matrix(settings.hue), saturation_matrix(saturation));

        let mut m = [[0.0f32; 4]; 4];
        for row in 0..3 {
            for col in 0..3 {
                m[row][col] = rgb[row][col] * brightness;
            }
        }
        m[3][3] = opacity;
        Self { m }
    }

    /// Multiply one straight-alpha pixel, clamping to [0, 1].
    pub fn apply(&self, rgba: [f32; 4]) -> [f32; 4] {
        let mut out = [0.0f32; 4];
        for (row, coeffs) in self.m.iter().enumerate() {
            let mut acc = 0.0;
            for (col, c) in coeffs.iter().enumerate() {
                acc += c * rgba[col];
            }
            out[row] = acc.clamp(0.0, 1.0);
        }
        out
    }

    /// Column-major flat layout for GPU upload.
    pub fn to_columns(&self) -> [f32; 16] {
        let mut out = [0.0f32; 16];
        for row in 0..4 {
            for col in 0..4 {
                out[col * 4 + row] = self.m[row][col];
            }
        }
        out
    }
}

fn saturation_matrix(s: f32) -> [[f32; 3]; 3] {
    [
        [LUMA_R + (1.0 - LUMA_R) * s, LUMA_G * (1.0 - s), LUMA_B * (1.0 - s)],
        [LUMA_R * (1.0 - s), LUMA_G + (1.0 - LUMA_G) * s, LUMA_B * (1.0 - s)],
        [LUMA_R * (1.0 - s), LUMA_G * (1.0 - s), LUMA_B + (1.0 - LUMA_B) * s],
    ]
}

fn hue_matrix(degrees: f32) -> [[f32; 3]; 3] {
    let rad = degrees.to_radians();
    let cos = rad.cos();
    let sin = rad.sin();
    [
        [
            LUMA_R + cos * (1.0 - LUMA_R) - sin * LUMA_R,
            LUMA_G - cos * LUMA_G - sin * LUMA_G,
            LUMA_B - cos * LUMA_B + sin * (1.0 - LUMA_B),
        ],
        [
            LUMA_R - cos * LUMA_R + sin * 0.143,
            LUMA_G + cos * (1.0 - LUMA_G) + sin * 0.140,
            LUMA_B - cos * LUMA_B - sin * 0.283,
        ],
        [
            LUMA_R - cos * LUMA_R - sin * (1.0 - LUMA_R),
            LUMA_G - cos * LUMA_G + sin * LUMA_G,
            LUMA_B + cos * (1.0 - LUMA_B) + sin * LUMA_B,
        ],
    ]
}

fn mul3(a: [[f32; 3]; 3], b: [[f32; 3]; 3]) -> [[f32; 3]; 3] {
    let mut out = [[0.0f32; 3]; 3];
    for row in 0..3 {
        for col in 0..3 {
            for k in 0..3 {
                out[row][col] += a[row][k] * b[k][col];
            }
        }
    }
    out
}

/// Widest kernel either backend will evaluate per pixel.
pub const MAX_KERNEL_TAPS: usize = 33;

/// One-dimensional Gaussian: normalized weights and the distance between
/// taps in pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianKernel {
    pub weights: Vec<f32>,
    pub step: f32,
}

impl GaussianKernel {
    /// Taps on each side of the center.
    pub fn half_width(&self) -> usize {
        self.weights.len() / 2
    }

    pub fn is_identity(&self) -> bool {
        self.weights.len() == 1
    }
}

/// Kernel covering `radius` pixels each side. Radii beyond the tap budget
/// keep [`MAX_KERNEL_TAPS`] taps and stretch the step instead.
pub fn gaussian_kernel(radius: f32) -> GaussianKernel {
    if radius <= 0.0 {
        return GaussianKernel {
            weights: vec![1.0],
            step: 0.0,
        };
    }
    let ideal_taps = 2 * radius.ceil() as usize + 1;
    let (taps, step) = if ideal_taps > MAX_KERNEL_TAPS {
        (MAX_KERNEL_TAPS, 2.0 * radius / (MAX_KERNEL_TAPS - 1) as f32)
    } else {
        (ideal_taps, 1.0)
    };
    let sigma = (radius * 0.5).max(0.5);
    let half = (taps / 2) as i32;
    let mut weights = Vec::with_capacity(taps);
    let mut sum = 0.0;
    for i in -half..=half {
        let x = i as f32 * step;
        let w = (-(x * x) / (2.0 * sigma * sigma)).exp();
        weights.push(w);
        sum += w;
    }
    for w in &mut weights {
        *w /= sum;
    }
    GaussianKernel { weights, step }
}
