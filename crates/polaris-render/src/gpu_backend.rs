//! wgpu backend: one pipeline per shader program, an offscreen RGBA8 target
//! and persistent per-image textures.

use std::collections::HashMap;
use std::sync::Arc;

use polaris_core::{Color, FrameBuffer, PolarisError, PolarisResult, Viewport};
use wgpu::util::DeviceExt;

use crate::backend::{RenderBackend, TextureId};
use crate::compositor::{DrawCommand, ShaderProgram, Vertex};
use crate::gpu::{GpuContext, IMAGE_FORMAT};

struct GpuTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

pub struct GpuBackend {
    gpu: Arc<GpuContext>,
    clear: Color,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    pipelines: Vec<wgpu::RenderPipeline>,
    target: wgpu::Texture,
    textures: HashMap<TextureId, GpuTexture>,
    uploads: u64,
}

impl GpuBackend {
    pub fn new(gpu: Arc<GpuContext>, viewport: Viewport, clear: Color) -> Self {
        let device = &gpu.device;
        let compositor_shader =
            device.create_shader_module(wgpu::include_wgsl!("shaders/compositor.wgsl"));
        let transition_shader =
            device.create_shader_module(wgpu::include_wgsl!("shaders/transition.wgsl"));

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("polaris_texture_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let single_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("polaris_single_texture_pipeline_layout"),
            bind_group_layouts: &[&texture_layout],
            push_constant_ranges: &[],
        });
        let dual_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("polaris_dual_texture_pipeline_layout"),
            bind_group_layouts: &[&texture_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let pipelines = ShaderProgram::ALL
            .iter()
            .map(|&program| {
                let (module, layout, entry) = match program {
                    ShaderProgram::Normal => (&compositor_shader, &single_layout, "fs_normal"),
                    ShaderProgram::Dim => (&compositor_shader, &single_layout, "fs_dim"),
                    ShaderProgram::Rule => (&transition_shader, &dual_layout, "fs_rule"),
                    ShaderProgram::Melt => (&transition_shader, &dual_layout, "fs_melt"),
                };
                create_pipeline(device, module, layout, entry)
            })
            .collect();

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("polaris_frame_target"),
            size: wgpu::Extent3d {
                width: viewport.width,
                height: viewport.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: IMAGE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        Self {
            gpu,
            clear,
            texture_layout,
            sampler,
            pipelines,
            target,
            textures: HashMap::new(),
            uploads: 0,
        }
    }

    fn write_pixels(&self, texture: &wgpu::Texture, pixels: &FrameBuffer) {
        self.gpu.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &pixels.data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(pixels.width * 4),
                rows_per_image: Some(pixels.height),
            },
            wgpu::Extent3d {
                width: pixels.width,
                height: pixels.height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn bind_group_for(&self, texture: TextureId) -> PolarisResult<&wgpu::BindGroup> {
        self.textures
            .get(&texture)
            .map(|t| &t.bind_group)
            .ok_or_else(|| PolarisError::Render(format!("texture {:?} not resident", texture)))
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    module: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    fragment_entry: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(fragment_entry),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: "vs_main",
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2, 2 => Float32],
            }],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: fragment_entry,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: IMAGE_FORMAT,
                blend: Some(wgpu::BlendState {
                    color: wgpu::BlendComponent {
                        src_factor: wgpu::BlendFactor::SrcAlpha,
                        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                        operation: wgpu::BlendOperation::Add,
                    },
                    alpha: wgpu::BlendComponent::OVER,
                }),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}

impl RenderBackend for GpuBackend {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn upload(&mut self, texture: TextureId, pixels: &FrameBuffer) -> PolarisResult<()> {
        let same_size = self.textures.get(&texture).is_some_and(|t| {
            t.texture.width() == pixels.width && t.texture.height() == pixels.height
        });

        if !same_size {
            if let Some(old) = self.textures.remove(&texture) {
                self.gpu.texture_pool.release(old.texture);
            }
            let tex = self
                .gpu
                .texture_pool
                .acquire(&self.gpu.device, pixels.width, pixels.height);
            let view = tex.create_view(&wgpu::TextureViewDescriptor::default());
            let bind_group = self.gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("polaris_image_bind_group"),
                layout: &self.texture_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            });
            self.textures.insert(
                texture,
                GpuTexture {
                    texture: tex,
                    bind_group,
                },
            );
        }

        if let Some(entry) = self.textures.get(&texture) {
            self.write_pixels(&entry.texture, pixels);
        }
        self.uploads += 1;
        Ok(())
    }

    fn release(&mut self, texture: TextureId) {
        if let Some(entry) = self.textures.remove(&texture) {
            self.gpu.texture_pool.release(entry.texture);
        }
    }

    fn submit(&mut self, commands: &[DrawCommand]) -> PolarisResult<()> {
        let vertices: Vec<Vertex> = commands
            .iter()
            .flat_map(|cmd| cmd.triangle_vertices())
            .collect();
        let vertex_buffer = (!vertices.is_empty()).then(|| {
            self.gpu
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("polaris_frame_vertices"),
                    contents: bytemuck::cast_slice(&vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                })
        });

        // Resolve every bind group before the pass so a missing texture
        // aborts the frame instead of leaving it half drawn.
        let mut binds = Vec::with_capacity(commands.len());
        for cmd in commands {
            let src = self.bind_group_for(cmd.texture)?;
            let rule = match cmd.rule {
                Some((_, rule)) if cmd.program().uses_rule() => Some(self.bind_group_for(rule)?),
                _ => None,
            };
            binds.push((src, rule));
        }

        let view = self.target.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("polaris_frame_encoder"),
            });
        {
            let clear = self.clear.to_unit();
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("polaris_frame_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: clear[0] as f64,
                            g: clear[1] as f64,
                            b: clear[2] as f64,
                            a: clear[3] as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(vb) = vertex_buffer.as_ref() {
                rpass.set_vertex_buffer(0, vb.slice(..));
                for (i, (cmd, (src, rule))) in commands.iter().zip(&binds).enumerate() {
                    rpass.set_pipeline(&self.pipelines[cmd.program().index()]);
                    rpass.set_bind_group(0, src, &[]);
                    if let Some(rule) = rule {
                        rpass.set_bind_group(1, rule, &[]);
                    }
                    let first = (i * 6) as u32;
                    rpass.draw(first..first + 6, 0..1);
                }
            }
        }

        self.gpu.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn read_frame(&mut self) -> PolarisResult<FrameBuffer> {
        let width = self.target.width();
        let height = self.target.height();
        let unpadded = width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let out_buf = self.gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("polaris_readback"),
            size: (padded * height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &out_buf,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.gpu.queue.submit(Some(encoder.finish()));

        let slice = out_buf.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |v| {
            let _ = tx.send(v);
        });
        self.gpu.device.poll(wgpu::Maintain::Wait);

        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(PolarisError::Gpu(format!("readback map failed: {e}"))),
            Err(_) => return Err(PolarisError::Gpu("readback callback dropped".into())),
        }

        let mut data = Vec::with_capacity((unpadded * height) as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks_exact(padded as usize) {
                data.extend_from_slice(&row[..unpadded as usize]);
            }
        }
        out_buf.unmap();

        FrameBuffer::from_rgba(width, height, data)
            .ok_or_else(|| PolarisError::Gpu("readback size mismatch".into()))
    }

    fn upload_count(&self) -> u64 {
        self.uploads
    }
}
