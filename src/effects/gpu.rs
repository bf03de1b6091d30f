//! wgpu effects backend.
//!
//! Pipelines are compiled once at construction. Each frame runs a color
//! pass (source → A) and, for a non-zero radius, two blur passes (A → B,
//! B → A), then reads A back synchronously. Offscreen targets are rebuilt
//! only when the frame geometry changes.

use crossbeam::channel;
use wgpu::*;

use crate::core::effects::EffectSettings;
use crate::decode::frame::VideoFrame;
use crate::effects::kernel::{gaussian_kernel, ColorMatrix};
use crate::effects::shader::{compile_shader, BLUR_SHADER, COLOR_SHADER};
use crate::effects::{EffectsError, EffectsStage};

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct ColorUniform {
    matrix: [f32; 16],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct BlurUniform {
    direction: [f32; 2],
    texel: [f32; 2],
    sigma: f32,
    step: f32,
    half_taps: i32,
    _padding: i32,
}

pub struct WgpuEffects {
    device: Device,
    queue: Queue,
    color_pipeline: RenderPipeline,
    blur_pipeline: RenderPipeline,
    bind_group_layout: BindGroupLayout,
    sampler: Sampler,
    color_uniform: Buffer,
    blur_uniform_h: Buffer,
    blur_uniform_v: Buffer,
    targets: Option<Targets>,
}

/// Offscreen textures and their cached bind groups for one geometry.
struct Targets {
    width: u32,
    height: u32,
    source: Texture,
    a: Texture,
    a_view: TextureView,
    b_view: TextureView,
    /// color pass: reads source
    bg_color: BindGroup,
    /// blur horizontal: reads A
    bg_blur_h: BindGroup,
    /// blur vertical: reads B
    bg_blur_v: BindGroup,
}

impl WgpuEffects {
    /// Headless device setup; fails where no adapter exists.
    pub fn new() -> Result<Self, EffectsError> {
        let instance = Instance::new(InstanceDescriptor {
            backends: Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&RequestAdapterOptions {
            power_preference: PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| EffectsError::NoAdapter("no compatible adapter".to_string()))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &DeviceDescriptor {
                label: None,
                required_features: Features::empty(),
                required_limits: Limits::default(),
            },
            None,
        ))
        .map_err(|e| EffectsError::Gpu(e.to_string()))?;

        let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Effects Bind Group Layout"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        multisampled: false,
                        view_dimension: TextureViewDimension::D2,
                        sample_type: TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 2,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Effects Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let color_pipeline = build_pipeline(
            &device,
            &pipeline_layout,
            &compile_shader(&device, "color shader", COLOR_SHADER),
            "Color Pipeline",
        );
        let blur_pipeline = build_pipeline(
            &device,
            &pipeline_layout,
            &compile_shader(&device, "blur shader", BLUR_SHADER),
            "Blur Pipeline",
        );

        let sampler = device.create_sampler(&SamplerDescriptor {
            label: Some("Effects Sampler"),
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            ..Default::default()
        });

        let color_uniform = device.create_buffer(&BufferDescriptor {
            label: Some("Color Uniform"),
            size: std::mem::size_of::<ColorUniform>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let blur_uniform_h = device.create_buffer(&BufferDescriptor {
            label: Some("Blur Uniform H"),
            size: std::mem::size_of::<BlurUniform>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let blur_uniform_v = device.create_buffer(&BufferDescriptor {
            label: Some("Blur Uniform V"),
            size: std::mem::size_of::<BlurUniform>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            device,
            queue,
            color_pipeline,
            blur_pipeline,
            bind_group_layout,
            sampler,
            color_uniform,
            blur_uniform_h,
            blur_uniform_v,
            targets: None,
        })
    }

    fn ensure_targets(&mut self, width: u32, height: u32) {
        if let Some(t) = &self.targets {
            if t.width == width && t.height == height {
                return;
            }
        }

        let extent = Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let make = |label: &str, usage: TextureUsages| {
            self.device.create_texture(&TextureDescriptor {
                label: Some(label),
                size: extent,
                mip_level_count: 1,
                sample_count: 1,
                dimension: TextureDimension::D2,
                format: TextureFormat::Rgba8Unorm,
                usage,
                view_formats: &[],
            })
        };

        let source = make("Effects Source", TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST);
        let a = make(
            "Effects Target A",
            TextureUsages::RENDER_ATTACHMENT | TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_SRC,
        );
        let b = make(
            "Effects Target B",
            TextureUsages::RENDER_ATTACHMENT | TextureUsages::TEXTURE_BINDING,
        );

        let source_view = source.create_view(&TextureViewDescriptor::default());
        let a_view = a.create_view(&TextureViewDescriptor::default());
        let b_view = b.create_view(&TextureViewDescriptor::default());

        let bind = |label: &str, view: &TextureView, uniform: &Buffer| {
            self.device.create_bind_group(&BindGroupDescriptor {
                label: Some(label),
                layout: &self.bind_group_layout,
                entries: &[
                    BindGroupEntry {
                        binding: 0,
                        resource: BindingResource::TextureView(view),
                    },
                    BindGroupEntry {
                        binding: 1,
                        resource: BindingResource::Sampler(&self.sampler),
                    },
                    BindGroupEntry {
                        binding: 2,
                        resource: uniform.as_entire_binding(),
                    },
                ],
            })
        };

        let bg_color = bind("Color Bind Group", &source_view, &self.color_uniform);
        let bg_blur_h = bind("Blur H Bind Group", &a_view, &self.blur_uniform_h);
        let bg_blur_v = bind("Blur V Bind Group", &b_view, &self.blur_uniform_v);

        self.targets = Some(Targets {
            width,
            height,
            source,
            a,
            a_view,
            b_view,
            bg_color,
            bg_blur_h,
            bg_blur_v,
        });
    }

    fn read_back(&self, width: u32, height: u32) -> Result<Vec<u8>, EffectsError> {
        let targets = self.targets.as_ref().expect("targets exist before readback");
        let padded_row = align_to(width * 4, COPY_BYTES_PER_ROW_ALIGNMENT);
        let buffer = self.device.create_buffer(&BufferDescriptor {
            label: Some("Effects Readback"),
            size: padded_row as u64 * height as u64,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            ImageCopyTexture {
                texture: &targets.a,
                mip_level: 0,
                origin: Origin3d::ZERO,
                aspect: TextureAspect::All,
            },
            ImageCopyBuffer {
                buffer: &buffer,
                layout: ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(height),
                },
            },
            Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = channel::bounded(1);
        slice.map_async(MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(Maintain::Wait);
        rx.recv()
            .map_err(|_| EffectsError::Readback("map callback dropped".to_string()))?
            .map_err(|e| EffectsError::Readback(e.to_string()))?;

        let mapped = slice.get_mapped_range();
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for row in 0..height {
            let start = (row * padded_row) as usize;
            data.extend_from_slice(&mapped[start..start + (width * 4) as usize]);
        }
        drop(mapped);
        buffer.unmap();
        Ok(data)
    }
}

impl EffectsStage for WgpuEffects {
    fn process(&mut self, frame: &VideoFrame, settings: &EffectSettings) -> Result<VideoFrame, EffectsError> {
        if settings.is_neutral() {
            return Ok(frame.clone());
        }

        let width = frame.width;
        let height = frame.height;
        self.ensure_targets(width, height);
        let kernel = gaussian_kernel(settings.blur);

        // uniforms for this frame
        let matrix = ColorMatrix::from_settings(settings);
        self.queue.write_buffer(
            &self.color_uniform,
            0,
            bytemuck::bytes_of(&ColorUniform {
                matrix: matrix.to_columns(),
            }),
        );
        if !kernel.is_identity() {
            let texel = [1.0 / width as f32, 1.0 / height as f32];
            let sigma = (settings.blur * 0.5).max(0.5);
            let base = BlurUniform {
                direction: [1.0, 0.0],
                texel,
                sigma,
                step: kernel.step,
                half_taps: kernel.half_width() as i32,
                _padding: 0,
            };
            self.queue
                .write_buffer(&self.blur_uniform_h, 0, bytemuck::bytes_of(&base));
            self.queue.write_buffer(
                &self.blur_uniform_v,
                0,
                bytemuck::bytes_of(&BlurUniform {
                    direction: [0.0, 1.0],
                    ..base
                }),
            );
        }

        let targets = self.targets.as_ref().expect("targets built above");
        self.queue.write_texture(
            ImageCopyTexture {
                texture: &targets.source,
                mip_level: 0,
                origin: Origin3d::ZERO,
                aspect: TextureAspect::All,
            },
            &frame.data,
            ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("Effects Encoder"),
            });
        run_pass(&mut encoder, &self.color_pipeline, &targets.bg_color, &targets.a_view);
        if !kernel.is_identity() {
            run_pass(&mut encoder, &self.blur_pipeline, &targets.bg_blur_h, &targets.b_view);
            run_pass(&mut encoder, &self.blur_pipeline, &targets.bg_blur_v, &targets.a_view);
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        let data = self.read_back(width, height)?;
        Ok(VideoFrame {
            data,
            width,
            height,
            timestamp: frame.timestamp,
            duration: frame.duration,
        })
    }
}

fn build_pipeline(
    device: &Device,
    layout: &PipelineLayout,
    shader: &ShaderModule,
    label: &str,
) -> RenderPipeline {
    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: VertexState {
            module: shader,
            entry_point: "vs_main",
            buffers: &[],
            compilation_options: PipelineCompilationOptions::default(),
        },
        fragment: Some(FragmentState {
            module: shader,
            entry_point: "fs_main",
            targets: &[Some(ColorTargetState {
                format: TextureFormat::Rgba8Unorm,
                blend: None,
                write_mask: ColorWrites::ALL,
            })],
            compilation_options: PipelineCompilationOptions::default(),
        }),
        primitive: PrimitiveState {
            topology: PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}

fn run_pass(encoder: &mut CommandEncoder, pipeline: &RenderPipeline, bind_group: &BindGroup, target: &TextureView) {
    let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
        label: Some("Effects Pass"),
        color_attachments: &[Some(RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            ops: Operations {
                load: LoadOp::Clear(Color::TRANSPARENT),
                store: StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        occlusion_query_set: None,
        timestamp_writes: None,
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.draw(0..3, 0..1);
}

fn align_to(value: u32, alignment: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}
