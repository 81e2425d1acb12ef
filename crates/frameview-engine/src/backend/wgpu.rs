use std::borrow::Cow;

use anyhow::{Context, Result};
use wgpu::util::DeviceExt;

use crate::coords::{Rect, Size};
use crate::geometry::{VertexFormat, VertexLayout};
use crate::render::RenderTarget;

use super::shader::{self, FRAGMENT_ENTRY, VERTEX_ENTRY};
use super::{
    Backend, Blend, BufferDesc, BufferKind, BufferUsage, DrawCall, FilterMode, ProgramDesc,
    ProgramInputs, Topology,
};

/// Format of the frame texture; matches the converter's byte order.
pub const FRAME_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const COLOR_UNIFORM_SIZE: u64 = std::mem::size_of::<[f32; 4]>() as u64;

/// [`Backend`] implementation on top of wgpu.
///
/// Programs compile to a pair of render pipelines targeting `target_format`:
/// one without blending and one with straight-alpha source-over. Draws record
/// one render pass each into the caller's [`RenderTarget`] encoder.
///
/// Buffer and texture writes go through `Queue::write_*`, which lands before
/// the next submitted command buffer runs, so draws sharing a buffer must use
/// distinct ranges of it. The color uniform is copied inside the caller's
/// encoder right before each pass, so every draw sees its own color.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target_format: wgpu::TextureFormat,
    next_serial: u64,
    texture_binding: Option<TextureBinding>,
}

/// Compiled program: pipelines plus the layout their bind group follows.
pub struct WgpuProgram {
    serial: u64,
    label: String,
    stride: u64,
    opaque: wgpu::RenderPipeline,
    blended: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    color: Option<ColorUniform>,
}

struct ColorUniform {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

pub struct WgpuBuffer {
    buffer: wgpu::Buffer,
    kind: BufferKind,
}

pub struct WgpuTexture {
    serial: u64,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: Size,
}

pub struct WgpuSampler {
    serial: u64,
    sampler: wgpu::Sampler,
}

/// Bind group for the last (program, texture, sampler) triple drawn.
struct TextureBinding {
    key: (u64, u64, u64),
    bind_group: wgpu::BindGroup,
}

impl WgpuBackend {
    /// Creates a backend drawing into targets of `target_format`.
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        target_format: wgpu::TextureFormat,
    ) -> Self {
        Self {
            device,
            queue,
            target_format,
            next_serial: 0,
            texture_binding: None,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn target_format(&self) -> wgpu::TextureFormat {
        self.target_format
    }

    fn serial(&mut self) -> u64 {
        self.next_serial += 1;
        self.next_serial
    }

    fn bind_group_layout(&self, label: &str, inputs: ProgramInputs) -> wgpu::BindGroupLayout {
        let entries: &[wgpu::BindGroupLayoutEntry] = match inputs {
            ProgramInputs::Texture => &[
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
            ProgramInputs::Color => &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(COLOR_UNIFORM_SIZE),
                },
                count: None,
            }],
        };

        self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries,
        })
    }

    fn pipeline(
        &self,
        desc: &ProgramDesc<'_>,
        module: &wgpu::ShaderModule,
        layout: &wgpu::PipelineLayout,
        vertex_layout: &wgpu::VertexBufferLayout<'_>,
        blend: Option<wgpu::BlendState>,
    ) -> wgpu::RenderPipeline {
        self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(desc.label),
            layout: Some(layout),

            vertex: wgpu::VertexState {
                module,
                entry_point: Some(VERTEX_ENTRY),
                compilation_options: Default::default(),
                buffers: &[vertex_layout.clone()],
            },

            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some(FRAGMENT_ENTRY),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.target_format,
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            // No culling, depth or stencil: presentation is flat 2D.
            primitive: wgpu::PrimitiveState {
                topology: map_topology(desc.topology),
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

    fn color_uniform(&self, label: &str, layout: &wgpu::BindGroupLayout) -> ColorUniform {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: COLOR_UNIFORM_SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });

        ColorUniform { buffer, bind_group }
    }

    /// Returns the cached texture bind group, rebuilding it when any of the
    /// three resources changed.
    fn texture_bind_group(
        &mut self,
        program: &WgpuProgram,
        texture: &WgpuTexture,
        sampler: &WgpuSampler,
    ) -> &wgpu::BindGroup {
        let key = (program.serial, texture.serial, sampler.serial);

        let binding = match self.texture_binding.take() {
            Some(cached) if cached.key == key => cached,
            _ => {
                log::debug!("WgpuBackend: building texture bind group for `{}`", program.label);
                let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(&program.label),
                    layout: &program.bind_group_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(&texture.view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(&sampler.sampler),
                        },
                    ],
                });
                TextureBinding { key, bind_group }
            }
        };

        &self.texture_binding.insert(binding).bind_group
    }

    fn forget_binding_for(&mut self, serial: u64) {
        let stale = self
            .texture_binding
            .as_ref()
            .is_some_and(|b| b.key.0 == serial || b.key.1 == serial || b.key.2 == serial);
        if stale {
            self.texture_binding = None;
        }
    }
}

impl Backend for WgpuBackend {
    type Program = WgpuProgram;
    type Buffer = WgpuBuffer;
    type Texture = WgpuTexture;
    type Sampler = WgpuSampler;
    type Target<'a> = RenderTarget<'a>;

    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<WgpuProgram> {
        let source = shader::trim_source(desc.source);
        shader::validate_wgsl(desc.label, source)
            .with_context(|| format!("failed to compile program `{}`", desc.label))?;

        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(desc.label),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
        });

        let bind_group_layout = self.bind_group_layout(desc.label, desc.inputs);

        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(desc.label),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let attributes = vertex_attributes(&desc.layout);
        let vertex_layout = wgpu::VertexBufferLayout {
            array_stride: desc.layout.stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &attributes,
        };

        let opaque = self.pipeline(desc, &module, &pipeline_layout, &vertex_layout, None);
        let blended = self.pipeline(
            desc,
            &module,
            &pipeline_layout,
            &vertex_layout,
            Some(wgpu::BlendState::ALPHA_BLENDING),
        );

        let color = match desc.inputs {
            ProgramInputs::Color => Some(self.color_uniform(desc.label, &bind_group_layout)),
            ProgramInputs::Texture => None,
        };

        log::debug!("WgpuBackend: program `{}` ready ({:?})", desc.label, desc.topology);

        Ok(WgpuProgram {
            serial: self.serial(),
            label: desc.label.to_string(),
            stride: desc.layout.stride,
            opaque,
            blended,
            bind_group_layout,
            color,
        })
    }

    fn destroy_program(&mut self, program: WgpuProgram) {
        self.forget_binding_for(program.serial);
        if let Some(uniform) = program.color {
            uniform.buffer.destroy();
        }
    }

    fn create_buffer(&mut self, desc: &BufferDesc<'_>) -> Result<WgpuBuffer> {
        let max = self.device.limits().max_buffer_size;
        anyhow::ensure!(
            desc.capacity > 0 && desc.capacity <= max,
            "{}: buffer capacity {} outside 1..={max}",
            desc.label,
            desc.capacity
        );
        anyhow::ensure!(
            desc.contents.is_none_or(|c| c.len() as u64 <= desc.capacity),
            "{}: initial contents exceed capacity {}",
            desc.label,
            desc.capacity
        );

        let usage = match desc.kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
        } | wgpu::BufferUsages::COPY_DST;

        let size = desc.capacity.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);

        // Static data is baked in at creation; dynamic buffers are written
        // through the queue like every later update.
        match (desc.usage, desc.contents) {
            (BufferUsage::Static, Some(contents)) => {
                let mut initial = vec![0u8; size as usize];
                initial[..contents.len()].copy_from_slice(contents);
                let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(desc.label),
                    contents: &initial,
                    usage,
                });
                Ok(WgpuBuffer { buffer, kind: desc.kind })
            }
            (_, contents) => {
                let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(desc.label),
                    size,
                    usage,
                    mapped_at_creation: false,
                });
                let buffer = WgpuBuffer { buffer, kind: desc.kind };
                if let Some(contents) = contents {
                    self.write_buffer(&buffer, 0, contents);
                }
                Ok(buffer)
            }
        }
    }

    fn write_buffer(&mut self, buffer: &WgpuBuffer, offset: u64, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        if offset % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            log::warn!("WgpuBackend: unaligned buffer write at offset {offset}; dropped");
            return;
        }

        // Queue writes must be a multiple of 4 bytes; the allocation is padded
        // to match, so zero-extend the tail.
        let len = data.len() as u64;
        if len % wgpu::COPY_BUFFER_ALIGNMENT == 0 {
            self.queue.write_buffer(&buffer.buffer, offset, data);
        } else {
            let mut padded = data.to_vec();
            padded.resize(len.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT) as usize, 0);
            self.queue.write_buffer(&buffer.buffer, offset, &padded);
        }
    }

    fn destroy_buffer(&mut self, buffer: WgpuBuffer) {
        buffer.buffer.destroy();
    }

    fn create_texture(&mut self, label: &str, size: Size) -> Result<WgpuTexture> {
        let max = self.device.limits().max_texture_dimension_2d;
        anyhow::ensure!(
            !size.is_empty() && size.width <= max && size.height <= max,
            "{label}: texture {}x{} outside 1..={max}",
            size.width,
            size.height
        );

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FRAME_TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(WgpuTexture {
            serial: self.serial(),
            texture,
            view,
            size,
        })
    }

    fn write_texture(&mut self, texture: &WgpuTexture, size: Size, rgba: &[u8]) {
        let expected = size.area().map(|n| n * 4);
        if size != texture.size || expected != Some(rgba.len()) {
            log::warn!(
                "WgpuBackend: upload of {}x{} ({} bytes) does not match texture {}x{}; dropped",
                size.width,
                size.height,
                rgba.len(),
                texture.size.width,
                texture.size.height
            );
            return;
        }

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(size.width * 4),
                rows_per_image: Some(size.height),
            },
            wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn destroy_texture(&mut self, texture: WgpuTexture) {
        self.forget_binding_for(texture.serial);
        texture.texture.destroy();
    }

    fn create_sampler(&mut self, label: &str, filter: FilterMode) -> WgpuSampler {
        let filter = match filter {
            FilterMode::Nearest => wgpu::FilterMode::Nearest,
            FilterMode::Linear => wgpu::FilterMode::Linear,
        };

        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        WgpuSampler {
            serial: self.serial(),
            sampler,
        }
    }

    fn destroy_sampler(&mut self, sampler: WgpuSampler) {
        self.forget_binding_for(sampler.serial);
    }

    fn draw(&mut self, target: &mut RenderTarget<'_>, call: DrawCall<'_, Self>) {
        let program = call.program;

        let max = self.device.limits().max_texture_dimension_2d;
        if !viewport_within_limits(call.viewport, max) {
            log::warn!(
                "WgpuBackend: viewport {:?} outside device limits; `{}` skipped",
                call.viewport,
                program.label
            );
            return;
        }
        let Some((sx, sy, sw, sh)) = scissor_rect(call.viewport, target.size) else {
            log::trace!("WgpuBackend: viewport {:?} misses the target", call.viewport);
            return;
        };

        if call.vertices.kind != BufferKind::Vertex {
            log::warn!("WgpuBackend: `{}` drawn from a non-vertex buffer; skipped", program.label);
            return;
        }
        let start = call.vertex_offset;
        let end = start + u64::from(call.vertex_count) * program.stride;
        if start % wgpu::VERTEX_ALIGNMENT != 0 || end > call.vertices.buffer.size() {
            log::warn!(
                "WgpuBackend: vertex range {start}..{end} invalid for `{}`; skipped",
                program.label
            );
            return;
        }

        let bind_group = match (&program.color, call.texture) {
            (Some(uniform), _) => {
                let Some(color) = call.color else {
                    log::warn!("WgpuBackend: `{}` drawn without a color; skipped", program.label);
                    return;
                };
                // Copied in encoder order, so the pass below reads this color
                // and not whichever one was written last before submit.
                let staging = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&program.label),
                    contents: bytemuck::cast_slice(&color),
                    usage: wgpu::BufferUsages::COPY_SRC,
                });
                target.encoder.copy_buffer_to_buffer(
                    &staging,
                    0,
                    &uniform.buffer,
                    0,
                    COLOR_UNIFORM_SIZE,
                );
                &uniform.bind_group
            }
            (None, Some((texture, sampler))) => self.texture_bind_group(program, texture, sampler),
            (None, None) => {
                log::warn!("WgpuBackend: `{}` drawn without a texture; skipped", program.label);
                return;
            }
        };

        let pipeline = match call.blend {
            Blend::Replace => &program.opaque,
            Blend::SourceOver => &program.blended,
        };

        let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(&program.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color_view,
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

        let vp = call.viewport;
        rpass.set_viewport(vp.origin.x, vp.origin.y, vp.size.x, vp.size.y, 0.0, 1.0);
        rpass.set_scissor_rect(sx, sy, sw, sh);
        rpass.set_pipeline(pipeline);
        rpass.set_bind_group(0, bind_group, &[]);
        rpass.set_vertex_buffer(0, call.vertices.buffer.slice(start..end));
        rpass.draw(0..call.vertex_count, 0..1);
    }
}

/// Whether wgpu accepts `viewport` on a device whose largest 2D texture side
/// is `max_dim`: each side at most `max_dim`, both corners within
/// `[-2 * max_dim, 2 * max_dim - 1]`.
fn viewport_within_limits(viewport: Rect, max_dim: u32) -> bool {
    if viewport.is_empty() || !viewport.is_finite() {
        return false;
    }
    let max_side = max_dim as f32;
    let range = max_side * 2.0;
    let far = viewport.max();

    viewport.size.x <= max_side
        && viewport.size.y <= max_side
        && viewport.origin.x >= -range
        && viewport.origin.y >= -range
        && far.x <= range - 1.0
        && far.y <= range - 1.0
}

/// Whole-pixel part of `viewport` that lies on a target of `target` pixels,
/// as `(x, y, width, height)`. `None` when nothing of it is on the target.
fn scissor_rect(viewport: Rect, target: Size) -> Option<(u32, u32, u32, u32)> {
    let visible = viewport.intersect(Rect::from_size(target))?;
    let far = visible.max();

    let x0 = visible.origin.x.floor() as u32;
    let y0 = visible.origin.y.floor() as u32;
    let x1 = (far.x.ceil() as u32).min(target.width);
    let y1 = (far.y.ceil() as u32).min(target.height);

    (x1 > x0 && y1 > y0).then(|| (x0, y0, x1 - x0, y1 - y0))
}

fn map_topology(topology: Topology) -> wgpu::PrimitiveTopology {
    match topology {
        Topology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        Topology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
    }
}

fn vertex_attributes(layout: &VertexLayout) -> Vec<wgpu::VertexAttribute> {
    layout
        .attributes
        .iter()
        .map(|a| wgpu::VertexAttribute {
            format: match a.format {
                VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
            },
            offset: a.offset,
            shader_location: a.location,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{ColorRgb, Vec2};
    use crate::present::Presenter;

    async fn request_device() -> Option<(wgpu::Device, wgpu::Queue)> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await
            .ok()?;
        adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("frameview test device"),
                ..Default::default()
            })
            .await
            .ok()
    }

    #[test]
    fn vertex_attributes_follow_layout() {
        let attrs = vertex_attributes(&crate::geometry::QuadVertex::LAYOUT);
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[1].shader_location, 1);
        assert_eq!(attrs[1].offset, 8);
        assert_eq!(attrs[1].format, wgpu::VertexFormat::Float32x2);
    }

    // ── viewport / scissor ──────────────────────────────────────────────

    #[test]
    fn scissor_covers_on_target_part_of_viewport() {
        let target = Size::new(256, 256);
        let half_off = Rect::new(-128.0, 0.0, 256.0, 256.0);
        assert_eq!(scissor_rect(half_off, target), Some((0, 0, 128, 256)));

        let inside = Rect::new(10.0, 20.0, 30.0, 40.0);
        assert_eq!(scissor_rect(inside, target), Some((10, 20, 30, 40)));
    }

    #[test]
    fn scissor_rounds_outward_to_whole_pixels() {
        let target = Size::new(100, 100);
        let frac = Rect::new(10.5, 0.25, 20.0, 99.9);
        assert_eq!(scissor_rect(frac, target), Some((10, 0, 21, 100)));
    }

    #[test]
    fn scissor_is_none_off_target() {
        let target = Size::new(64, 64);
        assert_eq!(scissor_rect(Rect::new(64.0, 0.0, 10.0, 10.0), target), None);
        assert_eq!(scissor_rect(Rect::new(-20.0, -20.0, 10.0, 10.0), target), None);
    }

    #[test]
    fn viewport_limits_follow_device_maximum() {
        let max = 2048;
        assert!(viewport_within_limits(Rect::new(-128.0, 0.0, 256.0, 256.0), max));
        assert!(viewport_within_limits(Rect::new(-4096.0, 0.0, 2048.0, 10.0), max));
        assert!(!viewport_within_limits(Rect::new(0.0, 0.0, 2049.0, 10.0), max));
        assert!(!viewport_within_limits(Rect::new(-4097.0, 0.0, 10.0, 10.0), max));
        assert!(!viewport_within_limits(Rect::new(4000.0, 0.0, 100.0, 10.0), max));
        assert!(!viewport_within_limits(Rect::new(0.0, 0.0, 0.0, 10.0), max));
    }

    // ── offscreen rendering ─────────────────────────────────────────────

    const READBACK_SIZE: Size = Size::new(256, 256);

    fn offscreen_target(device: &wgpu::Device, size: Size) -> wgpu::Texture {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen target"),
            size: wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        })
    }

    fn clear_to_black(encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
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

    /// Tightly packed RGBA rows of `texture`. `size.width * 4` must be a
    /// multiple of 256.
    fn read_pixels(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        texture: &wgpu::Texture,
        size: Size,
    ) -> Vec<u8> {
        let bytes_per_row = size.width * 4;
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback"),
            size: u64::from(bytes_per_row) * u64::from(size.height),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("readback"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(size.height),
                },
            },
            wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(std::iter::once(encoder.finish()));

        readback.slice(..).map_async(wgpu::MapMode::Read, |r| r.expect("map readback"));
        device.poll(wgpu::PollType::wait_indefinitely()).expect("poll device");
        let pixels = readback.slice(..).get_mapped_range().to_vec();
        readback.unmap();
        pixels
    }

    fn pixel(pixels: &[u8], size: Size, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * size.width + x) * 4) as usize;
        [pixels[i], pixels[i + 1], pixels[i + 2], pixels[i + 3]]
    }

    /// Whether any pixel on the two rows around the horizontal center, within
    /// `columns`, satisfies `pred`.
    fn center_rows_any(
        pixels: &[u8],
        size: Size,
        columns: std::ops::Range<u32>,
        pred: impl Fn([u8; 4]) -> bool,
    ) -> bool {
        let mid = size.height / 2;
        (mid - 1..=mid).any(|y| columns.clone().any(|x| pred(pixel(pixels, size, x, y))))
    }

    /// Runs `draw` against a black 256x256 target and returns its pixels, or
    /// `None` when no adapter is available.
    fn render_offscreen(
        draw: impl FnOnce(&mut Presenter<WgpuBackend>, &mut RenderTarget<'_>),
    ) -> Option<Vec<u8>> {
        let (device, queue) = pollster::block_on(request_device())?;
        let texture = offscreen_target(&device, READBACK_SIZE);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut presenter =
            Presenter::new(WgpuBackend::new(device, queue, wgpu::TextureFormat::Rgba8Unorm));
        assert!(presenter.init());
        presenter.resize(READBACK_SIZE.width, READBACK_SIZE.height);

        let mut encoder = presenter
            .backend()
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("test") });
        clear_to_black(&mut encoder, &view);
        {
            let mut target = RenderTarget::new(&mut encoder, &view, READBACK_SIZE);
            draw(&mut presenter, &mut target);
        }
        let backend = presenter.backend();
        backend.queue().submit(std::iter::once(encoder.finish()));

        let pixels = read_pixels(backend.device(), backend.queue(), &texture, READBACK_SIZE);
        presenter.shutdown();
        Some(pixels)
    }

    #[test]
    fn overlays_in_one_encoder_keep_their_own_position_and_color() {
        let full = Rect::from_size(READBACK_SIZE);
        let Some(pixels) = render_offscreen(|presenter, target| {
            presenter.render_overlay(target, Vec2::new(0.25, 0.5), ColorRgb::red(), 1.0, full);
            presenter.render_overlay(
                target,
                Vec2::new(0.75, 0.5),
                ColorRgb::new(0.0, 1.0, 0.0),
                1.0,
                full,
            );
        }) else {
            eprintln!("no wgpu adapter available; skipping");
            return;
        };

        let red = |p: [u8; 4]| p[0] > 200 && p[1] < 50 && p[2] < 50;
        let green = |p: [u8; 4]| p[0] < 50 && p[1] > 200 && p[2] < 50;
        assert!(center_rows_any(&pixels, READBACK_SIZE, 40..90, red));
        assert!(!center_rows_any(&pixels, READBACK_SIZE, 40..90, green));
        assert!(center_rows_any(&pixels, READBACK_SIZE, 170..220, green));
        assert!(!center_rows_any(&pixels, READBACK_SIZE, 170..220, red));
    }

    #[test]
    fn viewport_hanging_off_target_is_not_rescaled() {
        let Some(pixels) = render_offscreen(|presenter, target| {
            presenter.render_overlay(
                target,
                Vec2::new(0.5, 0.5),
                ColorRgb::white(),
                1.0,
                Rect::new(-128.0, 0.0, 256.0, 256.0),
            );
        }) else {
            eprintln!("no wgpu adapter available; skipping");
            return;
        };

        let lit = |p: [u8; 4]| p[0] > 200 && p[1] > 200 && p[2] > 200;
        // The viewport's center sits on the target's left edge.
        assert!(center_rows_any(&pixels, READBACK_SIZE, 0..10, lit));
        assert!(!center_rows_any(&pixels, READBACK_SIZE, 40..90, lit));
    }

    #[test]
    fn presents_into_offscreen_target_when_adapter_available() {
        let Some((device, queue)) = pollster::block_on(request_device()) else {
            eprintln!("no wgpu adapter available; skipping");
            return;
        };

        let format = wgpu::TextureFormat::Rgba8Unorm;
        let target_size = Size::new(64, 48);
        let target_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen target"),
            size: wgpu::Extent3d {
                width: target_size.width,
                height: target_size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = target_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut presenter = Presenter::new(WgpuBackend::new(device, queue, format));
        assert!(presenter.init());
        assert!(presenter.overlay_enabled());

        presenter.resize(target_size.width, target_size.height);
        presenter.update_frame(&[0xFFFF_0000; 6], 3, 2);

        let mut encoder = presenter
            .backend()
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("test") });
        {
            let mut target = RenderTarget::new(&mut encoder, &view, target_size);
            presenter.render_main(&mut target, false);
            presenter.render_overlay(
                &mut target,
                Vec2::new(0.5, 0.5),
                ColorRgb::white(),
                target_size.width as f32 / target_size.height as f32,
                Rect::from_size(target_size),
            );
        }
        presenter.backend().queue().submit(std::iter::once(encoder.finish()));

        presenter.shutdown();
        assert!(!presenter.is_ready());
    }
}
