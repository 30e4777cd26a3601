//! [`Backend`] implementation on wgpu.
//!
//! Every flushed batch becomes one render pass that loads the target, draws the batch's
//! indexed triangles and is submitted immediately, which keeps GPU work in the same order
//! the batcher issued it.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use wgpu::{
    BindGroup, BindGroupLayout, Buffer, BufferUsages, Device, Extent3d, Queue, RenderPipeline,
    ShaderModule, TextureDimension, TextureFormat, TextureUsages, TextureView,
};

use crate::types::Color;

use super::{
    Backend, BatchSource, BatchUniforms, BufferHandle, BufferKind, CoreKind, DrawCall,
    FramebufferHandle, ProgramHandle, QuadVertex, TextureConfig, TextureHandle,
};

struct Program {
    texture_pipeline: RenderPipeline,
    color_pipeline: RenderPipeline,
}

struct GpuBuffer {
    buffer: Buffer,
    kind: BufferKind,
}

struct GpuTexture {
    texture: wgpu::Texture,
    view: TextureView,
    bind_group: BindGroup,
    width: u32,
    height: u32,
}

struct DefaultTarget {
    view: TextureView,
    width: u32,
    height: u32,
}

pub struct WgpuBackend {
    device: Arc<Device>,
    queue: Arc<Queue>,
    format: TextureFormat,
    uniform_layout: BindGroupLayout,
    texture_layout: BindGroupLayout,
    uniform_buffer: Buffer,
    uniform_bind_group: BindGroup,
    programs: HashMap<ProgramHandle, Program>,
    buffers: HashMap<BufferHandle, GpuBuffer>,
    textures: HashMap<TextureHandle, GpuTexture>,
    framebuffers: HashMap<FramebufferHandle, TextureHandle>,
    default_target: Option<DefaultTarget>,
    next_handle: u32,
}

impl WgpuBackend {
    /// A backend drawing into targets of `format` (the surface format).
    pub fn new(device: Arc<Device>, queue: Arc<Queue>, format: TextureFormat) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Batch Uniform Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Batch Texture Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
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

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Batch Uniform Buffer"),
            size: std::mem::size_of::<BatchUniforms>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Batch Uniform Bind Group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        Self {
            device,
            queue,
            format,
            uniform_layout,
            texture_layout,
            uniform_buffer,
            uniform_bind_group,
            programs: HashMap::new(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            default_target: None,
            next_handle: 1,
        }
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// Point the default framebuffer at this frame's swapchain view.
    pub fn set_default_target(&mut self, view: TextureView, width: u32, height: u32) {
        self.default_target = Some(DefaultTarget {
            view,
            width,
            height,
        });
    }

    /// Drop the swapchain view so the frame can be presented.
    pub fn clear_default_target(&mut self) {
        self.default_target = None;
    }

    fn next(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn create_pipeline(
        &self,
        shader: &ShaderModule,
        source: &BatchSource,
        core: CoreKind,
    ) -> RenderPipeline {
        let (label, layouts, entry): (_, &[&BindGroupLayout], _) = match core {
            CoreKind::Texture => (
                "Batch Texture Pipeline",
                &[&self.uniform_layout, &self.texture_layout],
                source.texture_entry.as_ref(),
            ),
            CoreKind::Color => (
                "Batch Color Pipeline",
                &[&self.uniform_layout],
                source.color_entry.as_ref(),
            ),
        };

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: layouts,
                immediate_size: 0,
            });

        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: shader,
                    entry_point: Some(source.vertex_entry.as_ref()),
                    buffers: &[QuadVertex::desc()],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: shader,
                    entry_point: Some(entry),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.format,
                        blend: Some(wgpu::BlendState {
                            color: wgpu::BlendComponent {
                                src_factor: wgpu::BlendFactor::SrcAlpha,
                                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                                operation: wgpu::BlendOperation::Add,
                            },
                            alpha: wgpu::BlendComponent {
                                src_factor: wgpu::BlendFactor::One,
                                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                                operation: wgpu::BlendOperation::Add,
                            },
                        }),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            })
    }

    fn gpu_buffer(&self, kind: BufferKind, size: u64) -> Buffer {
        let (label, usage) = match kind {
            BufferKind::Vertex => ("Batch Vertex Buffer", BufferUsages::VERTEX),
            BufferKind::Index => ("Batch Index Buffer", BufferUsages::INDEX),
        };
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: size.max(wgpu::COPY_BUFFER_ALIGNMENT),
            usage: usage | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// The view, and its size, that `framebuffer` renders into.
    fn target_view(&self, framebuffer: FramebufferHandle) -> Option<(&TextureView, u32, u32)> {
        if framebuffer == FramebufferHandle::DEFAULT {
            return self
                .default_target
                .as_ref()
                .map(|t| (&t.view, t.width, t.height));
        }
        let texture = self.framebuffers.get(&framebuffer)?;
        self.textures
            .get(texture)
            .map(|t| (&t.view, t.width, t.height))
    }
}

fn to_wgpu_color(color: Color) -> wgpu::Color {
    wgpu::Color {
        r: color.r as f64,
        g: color.g as f64,
        b: color.b as f64,
        a: color.a as f64,
    }
}

impl Backend for WgpuBackend {
    fn create_program(&mut self, source: &BatchSource) -> ProgramHandle {
        let shader = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Batch Shader"),
                source: wgpu::ShaderSource::Wgsl(source.wgsl.clone()),
            });
        let program = Program {
            texture_pipeline: self.create_pipeline(&shader, source, CoreKind::Texture),
            color_pipeline: self.create_pipeline(&shader, source, CoreKind::Color),
        };
        let handle = ProgramHandle(self.next());
        self.programs.insert(handle, program);
        handle
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
    }

    fn create_buffer(&mut self, kind: BufferKind, size_bytes: u64) -> BufferHandle {
        let buffer = self.gpu_buffer(kind, size_bytes);
        let handle = BufferHandle(self.next());
        self.buffers.insert(handle, GpuBuffer { buffer, kind });
        handle
    }

    fn resize_buffer(&mut self, buffer: BufferHandle, size_bytes: u64) {
        let Some(kind) = self.buffers.get(&buffer).map(|b| b.kind) else {
            log::warn!("resize of unknown buffer {buffer:?}");
            return;
        };
        let replacement = self.gpu_buffer(kind, size_bytes);
        if let Some(old) = self.buffers.insert(
            buffer,
            GpuBuffer {
                buffer: replacement,
                kind,
            },
        ) {
            old.buffer.destroy();
        }
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        if let Some(old) = self.buffers.remove(&buffer) {
            old.buffer.destroy();
        }
    }

    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        config: &TextureConfig,
        renderable: bool,
    ) -> TextureHandle {
        let (format, usage) = if renderable {
            (
                self.format,
                TextureUsages::TEXTURE_BINDING
                    | TextureUsages::COPY_DST
                    | TextureUsages::RENDER_ATTACHMENT,
            )
        } else {
            (
                TextureFormat::Rgba8Unorm,
                TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            )
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Batch Texture"),
            size: Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let address = |repeat: bool| {
            if repeat {
                wgpu::AddressMode::Repeat
            } else {
                wgpu::AddressMode::ClampToEdge
            }
        };
        let filter = if config.linear {
            wgpu::FilterMode::Linear
        } else {
            wgpu::FilterMode::Nearest
        };
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Batch Sampler"),
            address_mode_u: address(config.repeat_x),
            address_mode_v: address(config.repeat_y),
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Batch Texture Bind Group"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let handle = TextureHandle(self.next());
        self.textures.insert(
            handle,
            GpuTexture {
                texture,
                view,
                bind_group,
                width,
                height,
            },
        );
        handle
    }

    fn update_texture(&mut self, texture: TextureHandle, width: u32, height: u32, rgba: &[u8]) {
        let Some(gpu) = self.textures.get(&texture) else {
            log::warn!("upload to unknown texture {texture:?}");
            return;
        };
        let swizzled;
        let data = if matches!(
            gpu.texture.format(),
            TextureFormat::Bgra8Unorm | TextureFormat::Bgra8UnormSrgb
        ) {
            swizzled = rgba
                .chunks_exact(4)
                .flat_map(|px| [px[2], px[1], px[0], px[3]])
                .collect::<Vec<u8>>();
            &swizzled[..]
        } else {
            rgba
        };
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &gpu.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        match self.textures.remove(&texture) {
            Some(gpu) => gpu.texture.destroy(),
            None => log::warn!("delete of unknown texture {texture:?}"),
        }
    }

    fn create_framebuffer(&mut self, texture: TextureHandle) -> FramebufferHandle {
        let handle = FramebufferHandle(self.next());
        self.framebuffers.insert(handle, texture);
        handle
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        self.framebuffers.remove(&framebuffer);
    }

    fn clear(&mut self, framebuffer: FramebufferHandle, color: Color) {
        let Some((view, _, _)) = self.target_view(framebuffer) else {
            log::warn!("clear of {framebuffer:?} with no target view");
            return;
        };
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Batch Clear Encoder"),
            });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Batch Clear Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(to_wgpu_color(color)),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn draw(&mut self, call: &DrawCall<'_>) {
        let Some((view, width, height)) = self.target_view(call.framebuffer) else {
            log::warn!("draw to {:?} with no target view", call.framebuffer);
            return;
        };
        let Some(program) = self.programs.get(&call.program) else {
            log::warn!("draw with unknown program {:?}", call.program);
            return;
        };
        let (Some(vb), Some(ib)) = (
            self.buffers.get(&call.vertex_buffer),
            self.buffers.get(&call.index_buffer),
        ) else {
            log::warn!("draw with unknown buffers");
            return;
        };
        let texture = match (call.core, call.texture) {
            (CoreKind::Texture, Some(handle)) => match self.textures.get(&handle) {
                Some(texture) => Some(texture),
                None => {
                    log::warn!("draw with unknown texture {handle:?}");
                    return;
                }
            },
            _ => None,
        };

        // clamp to the attachment; wgpu rejects scissors outside it
        let scissor = call.scissor.map(|r| {
            let x0 = r.x.clamp(0, width as i32) as u32;
            let y0 = r.y.clamp(0, height as i32) as u32;
            let x1 = (r.x + r.width).clamp(0, width as i32) as u32;
            let y1 = (r.y + r.height).clamp(0, height as i32) as u32;
            (x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
        });
        if let Some((_, _, 0, _) | (_, _, _, 0)) = scissor {
            return;
        }

        let vertex_bytes: &[u8] = bytemuck::cast_slice(call.vertices);
        self.queue.write_buffer(&vb.buffer, 0, vertex_bytes);
        let mut indices = call.indices.to_vec();
        if indices.len() % 2 == 1 {
            indices.push(0);
        }
        self.queue
            .write_buffer(&ib.buffer, 0, bytemuck::cast_slice(&indices));
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[call.uniforms]));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Batch Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Batch Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            match texture {
                Some(texture) => {
                    render_pass.set_pipeline(&program.texture_pipeline);
                    render_pass.set_bind_group(1, &texture.bind_group, &[]);
                }
                None => render_pass.set_pipeline(&program.color_pipeline),
            }
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            if let Some((x, y, w, h)) = scissor {
                render_pass.set_scissor_rect(x, y, w, h);
            }
            render_pass.set_vertex_buffer(0, vb.buffer.slice(..vertex_bytes.len() as u64));
            render_pass.set_index_buffer(
                ib.buffer.slice(..(indices.len() * 2) as u64),
                wgpu::IndexFormat::Uint16,
            );
            render_pass.draw_indexed(0..call.indices.len() as u32, 0, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
