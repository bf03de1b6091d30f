//! WGSL sources for the two effect passes.
//!
//! Both passes draw one fullscreen triangle and differ only in the fragment
//! stage. The blur fragment shader evaluates the same Gaussian as
//! `kernel::gaussian_kernel` so CPU and GPU output stay comparable.

use wgpu::{Device, ShaderModule};

/// Color pass: one 4x4 matrix folding opacity, hue, saturation and
/// brightness.
///
/// Bindings:
/// - 0: source texture
/// - 1: sampler
/// - 2: uniform { matrix: mat4x4<f32> }
pub const COLOR_SHADER: &str = r#"
    struct ColorUniform {
        matrix: mat4x4<f32>,
    };

    @group(0) @binding(0) var t_source: texture_2d<f32>;
    @group(0) @binding(1) var s_source: sampler;
    @group(0) @binding(2) var<uniform> color: ColorUniform;

    struct VertexOutput {
        @location(0) tex_coords: vec2<f32>,
        @builtin(position) clip_position: vec4<f32>,
    };

    @vertex
    fn vs_main(@builtin(vertex_index) in_vertex_index: u32) -> VertexOutput {
        var out: VertexOutput;
        // fullscreen triangle
        let x = f32(i32(in_vertex_index << 1u) & 2);
        let y = f32(i32(in_vertex_index) & 2);
        out.clip_position = vec4<f32>(x * 2.0 - 1.0, 1.0 - y * 2.0, 0.0, 1.0);
        out.tex_coords = vec2<f32>(x, y);
        return out;
    }

    @fragment
    fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
        let source = textureSample(t_source, s_source, in.tex_coords);
        return clamp(color.matrix * source, vec4<f32>(0.0), vec4<f32>(1.0));
    }
"#;

/// Blur pass: one-dimensional Gaussian along `direction`, run twice
/// (horizontal then vertical).
///
/// Bindings:
/// - 0: source texture
/// - 1: sampler
/// - 2: uniform { direction, texel, sigma, step, half_taps }
pub const BLUR_SHADER: &str = r#"
    struct BlurUniform {
        direction: vec2<f32>,
        texel: vec2<f32>,
        sigma: f32,
        step: f32,
        half_taps: i32,
        _padding: i32,
    };

    @group(0) @binding(0) var t_source: texture_2d<f32>;
    @group(0) @binding(1) var s_source: sampler;
    @group(0) @binding(2) var<uniform> blur: BlurUniform;

    struct VertexOutput {
        @location(0) tex_coords: vec2<f32>,
        @builtin(position) clip_position: vec4<f32>,
    };

    @vertex
    fn vs_main(@builtin(vertex_index) in_vertex_index: u32) -> VertexOutput {
        var out: VertexOutput;
        let x = f32(i32(in_vertex_index << 1u) & 2);
        let y = f32(i32(in_vertex_index) & 2);
        out.clip_position = vec4<f32>(x * 2.0 - 1.0, 1.0 - y * 2.0, 0.0, 1.0);
        out.tex_coords = vec2<f32>(x, y);
        return out;
    }

    @fragment
    fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
        var acc = vec4<f32>(0.0);
        var weight_sum = 0.0;
        let denom = 2.0 * blur.sigma * blur.sigma;
        for (var i = -blur.half_taps; i <= blur.half_taps; i = i + 1) {
            let offset = f32(i) * blur.step;
            let w = exp(-(offset * offset) / denom);
            let uv = in.tex_coords + blur.direction * blur.texel * offset;
            acc = acc + textureSample(t_source, s_source, clamp(uv, vec2<f32>(0.0), vec2<f32>(1.0))) * w;
            weight_sum = weight_sum + w;
        }
        return acc / weight_sum;
    }
"#;

/// Compile a shader module from WGSL source.
pub fn compile_shader(device: &Device, label: &str, source: &str) -> ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    })
}
