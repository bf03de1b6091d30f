//! Output canvas sizing and frame presentation.
//!
//! The renderer owns an RGBA backing store at the configured output
//! resolution and a pixel box placing that store aspect-correct inside the
//! hosting container. Geometry is recomputed when the container resizes or
//! the configured ratio/resolution changes, never per frame.

use crate::decode::frame::VideoFrame;

/// Pixel box inside the hosting container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Largest `ratio`-shaped box centered inside `container_w` x `container_h`.
/// Degenerate containers or ratios produce an empty viewport.
pub fn fit_viewport(container_w: u32, container_h: u32, ratio: f64) -> Viewport {
    if container_w == 0 || container_h == 0 || !ratio.is_finite() || ratio <= 0.0 {
        return Viewport::default();
    }
    let container_ratio = container_w as f64 / container_h as f64;
    if container_ratio > ratio {
        // wider than the content: pillarbox
        let width = ((container_h as f64 * ratio).round() as u32).min(container_w);
        Viewport {
            x: (container_w - width) / 2,
            y: 0,
            width,
            height: container_h,
        }
    } else {
        // taller than the content: letterbox
        let height = ((container_w as f64 / ratio).round() as u32).min(container_h);
        Viewport {
            x: 0,
            y: (container_h - height) / 2,
            width: container_w,
            height,
        }
    }
}

/// Draws frames into a fixed-resolution RGBA surface and tracks where that
/// surface sits inside the container.
pub struct FrameRenderer {
    resolution: (u32, u32),
    ratio: f64,
    container: (u32, u32),
    viewport: Viewport,
    backing: Vec<u8>,
}

impl FrameRenderer {
    pub fn new(resolution: (u32, u32), ratio: f64) -> Self {
        Self {
            resolution,
            ratio,
            container: (0, 0),
            viewport: Viewport::default(),
            backing: Vec::new(),
        }
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// The container (window area) holding the canvas changed size.
    pub fn set_container(&mut self, width: u32, height: u32) {
        self.container = (width, height);
        self.refit();
    }

    /// Project output ratio changed.
    pub fn set_ratio(&mut self, ratio: f64) {
        self.ratio = ratio;
        self.refit();
    }

    /// Project output resolution changed. The backing store follows on the
    /// next draw.
    pub fn set_resolution(&mut self, width: u32, height: u32) {
        self.resolution = (width, height);
    }

    fn refit(&mut self) {
        self.viewport = fit_viewport(self.container.0, self.container.1, self.ratio);
    }

    /// Scale `frame` over the whole backing store, resizing it to the
    /// current resolution first. Nearest-neighbor sampling.
    pub fn draw(&mut self, frame: &VideoFrame) {
        let (out_w, out_h) = self.resolution;
        let len = out_w as usize * out_h as usize * 4;
        self.backing.resize(len, 0);
        self.backing.fill(0);
        if frame.width == 0 || frame.height == 0 || out_w == 0 || out_h == 0 {
            return;
        }

        for y in 0..out_h as usize {
            let sy = y * frame.height as usize / out_h as usize;
            let src_row = sy * frame.width as usize * 4;
            let dst_row = y * out_w as usize * 4;
            for x in 0..out_w as usize {
                let sx = x * frame.width as usize / out_w as usize;
                let src = src_row + sx * 4;
                let dst = dst_row + x * 4;
                self.backing[dst..dst + 4].copy_from_slice(&frame.data[src..src + 4]);
            }
        }
    }

    /// The most recently drawn surface at the current resolution. Empty
    /// before the first draw.
    pub fn surface(&self) -> &[u8] {
        &self.backing
    }
}
