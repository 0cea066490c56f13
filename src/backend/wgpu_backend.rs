//! GPU backend on wgpu, rendering into an offscreen target.

use std::any::Any;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use wgpu::util::DeviceExt;

use super::{
    base_preamble, Capabilities, DeviceResource, DrawCall, FilterMode, GxBackend, IdAllocator,
    IndexFormat, PixelBuffer, ProgramId, SamplerState, StageSource, TextureId, UniformLocation,
    UniformValue,
};
use crate::errors::{GxError, ShaderError, ShaderStage};
use crate::geometry::GxVertex;
use crate::gx::Primitive;
use crate::shader::reflect::{reflect_program, reflect_stage, UniformBlockLayout};
use crate::utils::Color;

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 4] =
    wgpu::vertex_attr_array![0 => Float32x4, 1 => Float32x3, 2 => Float32x4, 3 => Float32x2];

#[derive(Debug, Clone)]
pub struct WgpuBackendConfig {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub power_preference: wgpu::PowerPreference,
    pub index_format: IndexFormat,
}

impl Default for WgpuBackendConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            power_preference: wgpu::PowerPreference::LowPower,
            index_format: IndexFormat::U32,
        }
    }
}

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

struct GpuProgram {
    name: String,
    vertex: Option<(wgpu::ShaderModule, String)>,
    fragment: Option<(wgpu::ShaderModule, String)>,
    compute: Option<wgpu::ComputePipeline>,
    uniforms: UniformBlockLayout,
    block: Vec<u8>,
    pipelines: HashMap<wgpu::PrimitiveTopology, wgpu::RenderPipeline>,
}

pub struct WgpuBackend {
    capabilities: Capabilities,
    config: WgpuBackendConfig,
    device: wgpu::Device,
    queue: wgpu::Queue,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    ids: IdAllocator,
    programs: HashMap<ProgramId, GpuProgram>,
    textures: HashMap<TextureId, GpuTexture>,
    samplers: HashMap<SamplerState, wgpu::Sampler>,
    white: GpuTexture,
    target: GpuTexture,
    encoder: Option<wgpu::CommandEncoder>,
    errors: Arc<Mutex<Vec<String>>>,
}

impl WgpuBackend {
    /// Creates a device without a surface.
    pub fn new_headless(config: WgpuBackendConfig) -> Result<Self, GxError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: config.power_preference,
            force_fallback_adapter: false,
            compatible_surface: None,
        }))
        .ok_or_else(|| GxError::Backend("no suitable adapter".to_string()))?;
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("gx-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                memory_hints: Default::default(),
            },
            None,
        ))
        .map_err(|e| GxError::Backend(e.to_string()))?;
        Ok(Self::from_device(device, queue, config))
    }

    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue, config: WgpuBackendConfig) -> Self {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();
        device.on_uncaptured_error(Box::new(move |error: wgpu::Error| {
            sink.lock().push(error.to_string());
        }));

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("gx-bind-group-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::all(),
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::all(),
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::all(),
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("gx-pipeline-layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let white = upload_texture(&device, &queue, "gx-white", 1, 1, &[255; 4], false);
        let target = create_target(&device, &config);

        Self {
            capabilities: Capabilities {
                name: "wgpu",
                native_line_loop: false,
                native_triangle_fan: false,
                index_format: config.index_format,
                compute: true,
                preamble: base_preamble("wgpu", true),
            },
            config,
            device,
            queue,
            bind_group_layout,
            pipeline_layout,
            ids: IdAllocator::default(),
            programs: HashMap::new(),
            textures: HashMap::new(),
            samplers: HashMap::new(),
            white,
            target,
            encoder: None,
            errors,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn target_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn create_module(
        &self,
        stage: ShaderStage,
        file: &str,
        text: &str,
    ) -> Result<wgpu::ShaderModule, ShaderError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(file),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(text)),
        });
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(error) => Err(ShaderError::Compile {
                stage,
                file: file.to_string(),
                message: error.to_string(),
            }),
            None => Ok(module),
        }
    }

    fn sampler(&mut self, state: SamplerState) -> &wgpu::Sampler {
        let device = &self.device;
        self.samplers.entry(state).or_insert_with(|| {
            let filter = match state.filter {
                FilterMode::Nearest => wgpu::FilterMode::Nearest,
                FilterMode::Linear => wgpu::FilterMode::Linear,
            };
            let address_mode = if state.clamp {
                wgpu::AddressMode::ClampToEdge
            } else {
                wgpu::AddressMode::Repeat
            };
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("gx-sampler"),
                address_mode_u: address_mode,
                address_mode_v: address_mode,
                address_mode_w: address_mode,
                mag_filter: filter,
                min_filter: filter,
                mipmap_filter: filter,
                ..Default::default()
            })
        })
    }

    fn ensure_pipeline(&mut self, program: ProgramId, topology: wgpu::PrimitiveTopology) -> bool {
        let Some(entry) = self.programs.get_mut(&program) else {
            return false;
        };
        if entry.pipelines.contains_key(&topology) {
            return true;
        }
        let (Some((vs, vs_entry)), Some((fs, fs_entry))) = (&entry.vertex, &entry.fragment) else {
            return false;
        };
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(entry.name.as_str()),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: vs,
                    entry_point: Some(vs_entry.as_str()),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: GxVertex::STRIDE as wgpu::BufferAddress,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &VERTEX_ATTRIBUTES,
                    }],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: fs,
                    entry_point: Some(fs_entry.as_str()),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.config.format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });
        entry.pipelines.insert(topology, pipeline);
        true
    }

    fn bind_group(&mut self, program: ProgramId, texture: Option<TextureId>, sampler: SamplerState) -> Option<wgpu::BindGroup> {
        self.sampler(sampler);
        let block = &self.programs.get(&program)?.block;
        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("gx-uniforms"),
                contents: block,
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let view = texture
            .and_then(|id| self.textures.get(&id))
            .map(|t| &t.view)
            .unwrap_or(&self.white.view);
        let sampler = self.samplers.get(&sampler)?;
        Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("gx-bind-group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        }))
    }

    /// Copies the render target back to the CPU. Must be called outside a frame.
    pub fn read_target(&self) -> Result<image::RgbaImage, GxError> {
        let (width, height) = self.target_size();
        let bytes_per_row = (width * 4).div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let output = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("gx-readback"),
            size: bytes_per_row as u64 * height as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("gx-readback-encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &output,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = output.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            tx.send(result).ok();
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| GxError::Backend(e.to_string()))?
            .map_err(|e| GxError::Backend(e.to_string()))?;

        let view = slice.get_mapped_range();
        let mut rgba = Vec::with_capacity((width * height * 4) as usize);
        for row in view.chunks(bytes_per_row as usize) {
            rgba.extend_from_slice(&row[..(width * 4) as usize]);
        }
        drop(view);
        output.unmap();

        let mut image = image::RgbaImage::from_raw(width, height, rgba)
            .ok_or_else(|| GxError::Backend("readback size mismatch".to_string()))?;
        if matches!(
            self.config.format,
            wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb
        ) {
            for pixel in image.pixels_mut() {
                pixel.0.swap(0, 2);
            }
        }
        Ok(image)
    }
}

fn topology(primitive: Primitive) -> Option<wgpu::PrimitiveTopology> {
    match primitive {
        Primitive::Points => Some(wgpu::PrimitiveTopology::PointList),
        Primitive::Lines => Some(wgpu::PrimitiveTopology::LineList),
        Primitive::LineStrip => Some(wgpu::PrimitiveTopology::LineStrip),
        Primitive::Triangles => Some(wgpu::PrimitiveTopology::TriangleList),
        Primitive::TriangleStrip => Some(wgpu::PrimitiveTopology::TriangleStrip),
        Primitive::LineLoop | Primitive::TriangleFan | Primitive::Quads => None,
    }
}

fn create_target(device: &wgpu::Device, config: &WgpuBackendConfig) -> GpuTexture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("gx-target"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: config.format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture { texture, view }
}

fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    width: u32,
    height: u32,
    rgba: &[u8],
    mipmapped: bool,
) -> GpuTexture {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let mip_level_count = if mipmapped {
        size.max_mips(wgpu::TextureDimension::D2)
    } else {
        1
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    let write_level = |level: u32, w: u32, h: u32, data: &[u8]| {
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: level,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * w),
                rows_per_image: Some(h),
            },
            wgpu::Extent3d {
                width: w,
                height: h,
                depth_or_array_layers: 1,
            },
        );
    };
    write_level(0, width, height, rgba);

    // Mip chain is built on the CPU from the base level.
    if mip_level_count > 1 {
        if let Some(base) = image::RgbaImage::from_raw(width, height, rgba.to_vec()) {
            for level in 1..mip_level_count {
                let w = (width >> level).max(1);
                let h = (height >> level).max(1);
                let mip = image::imageops::resize(&base, w, h, image::imageops::FilterType::Triangle);
                write_level(level, w, h, mip.as_raw());
            }
        }
    }

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture { texture, view }
}

impl GxBackend for WgpuBackend {
    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn begin_frame(&mut self, clear: Option<Color>) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("gx-frame"),
            });
        if let Some(color) = clear {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("gx-clear"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: color.r as f64,
                            g: color.g as f64,
                            b: color.b as f64,
                            a: color.a as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.encoder = Some(encoder);
    }

    fn end_frame(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(Some(encoder.finish()));
        }
    }

    fn create_program(
        &mut self,
        name: &str,
        vertex: StageSource<'_>,
        fragment: StageSource<'_>,
    ) -> Result<ProgramId, ShaderError> {
        let (vs_info, ps_info, uniforms) =
            reflect_program(name, (vertex.file, vertex.text), (fragment.file, fragment.text))?;
        let vs = self.create_module(ShaderStage::Vertex, vertex.file, vertex.text)?;
        let fs = self.create_module(ShaderStage::Fragment, fragment.file, fragment.text)?;

        let id = self.ids.next_program();
        let block = vec![0u8; uniforms.buffer_size()];
        self.programs.insert(
            id,
            GpuProgram {
                name: name.to_string(),
                vertex: Some((vs, vs_info.entry_point.unwrap_or_default())),
                fragment: Some((fs, ps_info.entry_point.unwrap_or_default())),
                compute: None,
                uniforms,
                block,
                pipelines: HashMap::new(),
            },
        );
        Ok(id)
    }

    fn create_compute_program(
        &mut self,
        name: &str,
        compute: StageSource<'_>,
    ) -> Result<ProgramId, ShaderError> {
        let info = reflect_stage(ShaderStage::Compute, compute.file, compute.text)?;
        let Some(entry_point) = info.entry_point else {
            return Err(ShaderError::Link {
                name: name.to_string(),
                message: format!("{} has no @compute entry point", compute.file),
            });
        };
        let module = self.create_module(ShaderStage::Compute, compute.file, compute.text)?;
        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(name),
                layout: Some(&self.pipeline_layout),
                module: &module,
                entry_point: Some(entry_point.as_str()),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });

        let id = self.ids.next_program();
        let block = vec![0u8; info.uniforms.buffer_size()];
        self.programs.insert(
            id,
            GpuProgram {
                name: name.to_string(),
                vertex: None,
                fragment: None,
                compute: Some(pipeline),
                uniforms: info.uniforms,
                block,
                pipelines: HashMap::new(),
            },
        );
        Ok(id)
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        self.programs.get(&program)?.uniforms.location(name)
    }

    fn set_uniform(&mut self, program: ProgramId, location: UniformLocation, value: UniformValue) {
        if let Some(entry) = self.programs.get_mut(&program) {
            if !value.write_to(&mut entry.block, location) {
                self.errors.lock().push(format!(
                    "uniform type mismatch at offset {} of {}",
                    location.offset, entry.name
                ));
            }
        }
    }

    fn create_texture(&mut self, pixels: &PixelBuffer<'_>) -> Result<TextureId, GxError> {
        let expected = pixels.width as usize * pixels.height as usize * 4;
        if pixels.width == 0 || pixels.height == 0 || pixels.rgba.len() != expected {
            return Err(GxError::TextureCreation(pixels.label.to_string()));
        }
        let texture = upload_texture(
            &self.device,
            &self.queue,
            pixels.label,
            pixels.width,
            pixels.height,
            pixels.rgba,
            pixels.mipmapped,
        );
        let id = self.ids.next_texture();
        self.textures.insert(id, texture);
        Ok(id)
    }

    fn release(&mut self, resource: DeviceResource) {
        match resource {
            DeviceResource::Texture(id) => {
                if let Some(texture) = self.textures.remove(&id) {
                    texture.texture.destroy();
                }
            }
            DeviceResource::Program(id) => {
                self.programs.remove(&id);
            }
        }
    }

    fn draw(&mut self, call: &DrawCall<'_>) {
        if call.vertices.is_empty() {
            return;
        }
        let Some(program) = call.program else {
            log::warn!("draw without a program skipped");
            return;
        };
        let Some(topology) = topology(call.primitive) else {
            log::error!("{:?} must be converted before reaching the wgpu backend", call.primitive);
            return;
        };
        if !self.ensure_pipeline(program, topology) {
            return;
        }
        let Some(bind_group) = self.bind_group(program, call.texture, call.sampler) else {
            return;
        };

        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("gx-vertices"),
                contents: bytemuck::cast_slice(call.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = if call.indices.is_empty() {
            None
        } else {
            let (contents, format) = match self.capabilities.index_format {
                IndexFormat::U16 => {
                    let narrow: Vec<u16> = call.indices.iter().map(|&i| i as u16).collect();
                    (bytemuck::cast_slice(&narrow).to_vec(), wgpu::IndexFormat::Uint16)
                }
                IndexFormat::U32 => (
                    bytemuck::cast_slice(call.indices).to_vec(),
                    wgpu::IndexFormat::Uint32,
                ),
            };
            let buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("gx-indices"),
                    contents: &contents,
                    usage: wgpu::BufferUsages::INDEX,
                });
            Some((buffer, format))
        };

        let Some(pipeline) = self
            .programs
            .get(&program)
            .and_then(|p| p.pipelines.get(&topology))
        else {
            return;
        };
        let Some(encoder) = self.encoder.as_mut() else {
            log::warn!("draw outside begin_frame/end_frame skipped");
            return;
        };
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("gx-draw"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.target.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.set_vertex_buffer(0, vertex_buffer.slice(..));
        match &index_buffer {
            Some((buffer, format)) => {
                pass.set_index_buffer(buffer.slice(..), *format);
                pass.draw_indexed(0..call.indices.len() as u32, 0, 0..1);
            }
            None => pass.draw(0..call.vertices.len() as u32, 0..1),
        }
    }

    fn dispatch(&mut self, program: ProgramId, groups: [u32; 3], texture: Option<TextureId>) {
        let Some(bind_group) = self.bind_group(program, texture, SamplerState::default()) else {
            return;
        };
        let Some(pipeline) = self.programs.get(&program).and_then(|p| p.compute.as_ref()) else {
            self.errors
                .lock()
                .push(format!("dispatch with non-compute program {}", program.raw()));
            return;
        };
        let Some(encoder) = self.encoder.as_mut() else {
            log::warn!("dispatch outside begin_frame/end_frame skipped");
            return;
        };
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("gx-dispatch"),
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(groups[0], groups[1], groups[2]);
    }

    fn check_error(&mut self) -> Option<String> {
        let mut errors = self.errors.lock();
        if errors.is_empty() {
            None
        } else {
            Some(errors.remove(0))
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
