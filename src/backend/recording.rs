//! Headless backend that records everything it is asked to do.
//!
//! Shaders go through the same WGSL front-end as the GPU backend, so compile and link failures
//! behave identically; draws, dispatches and uniform uploads are kept in memory for inspection.

use std::any::Any;
use std::collections::{HashMap, VecDeque};

use super::{
    base_preamble, Capabilities, DeviceResource, DrawCall, GxBackend, IdAllocator, IndexFormat,
    PixelBuffer, ProgramId, SamplerState, StageSource, TextureId, UniformLocation, UniformValue,
};
use crate::errors::{GxError, ShaderError, ShaderStage};
use crate::geometry::GxVertex;
use crate::gx::Primitive;
use crate::shader::reflect::{reflect_program, reflect_stage, UniformBlockLayout};
use crate::utils::Color;

#[derive(Debug, Clone)]
pub struct RecordedDraw {
    pub primitive: Primitive,
    pub program: Option<ProgramId>,
    pub texture: Option<TextureId>,
    pub sampler: SamplerState,
    pub vertices: Vec<GxVertex>,
    pub indices: Vec<u32>,
    /// Uniform block of `program` at the time of the draw.
    pub uniforms: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UniformUpload {
    pub program: ProgramId,
    pub name: String,
    pub value: UniformValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTexture {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub mipmapped: bool,
    pub rgba: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct RecordedProgram {
    pub name: String,
    pub compute: bool,
    pub uniforms: UniformBlockLayout,
    pub block: Vec<u8>,
    pub workgroup_size: [u32; 3],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedDispatch {
    pub program: ProgramId,
    pub groups: [u32; 3],
    pub texture: Option<TextureId>,
}

pub struct RecordingBackend {
    capabilities: Capabilities,
    ids: IdAllocator,
    programs: HashMap<ProgramId, RecordedProgram>,
    textures: HashMap<TextureId, RecordedTexture>,
    draws: Vec<RecordedDraw>,
    dispatches: Vec<RecordedDispatch>,
    uploads: Vec<UniformUpload>,
    released: Vec<DeviceResource>,
    errors: VecDeque<String>,
    frames: u64,
    in_frame: bool,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::with_capabilities(false, false, IndexFormat::U16)
    }

    pub fn with_capabilities(
        native_line_loop: bool,
        native_triangle_fan: bool,
        index_format: IndexFormat,
    ) -> Self {
        Self {
            capabilities: Capabilities {
                name: "recording",
                native_line_loop,
                native_triangle_fan,
                index_format,
                compute: true,
                preamble: base_preamble("recording", true),
            },
            ids: IdAllocator::default(),
            programs: HashMap::new(),
            textures: HashMap::new(),
            draws: Vec::new(),
            dispatches: Vec::new(),
            uploads: Vec::new(),
            released: Vec::new(),
            errors: VecDeque::new(),
            frames: 0,
            in_frame: false,
        }
    }

    pub fn draws(&self) -> &[RecordedDraw] {
        &self.draws
    }

    pub fn dispatches(&self) -> &[RecordedDispatch] {
        &self.dispatches
    }

    pub fn uploads(&self) -> &[UniformUpload] {
        &self.uploads
    }

    pub fn released(&self) -> &[DeviceResource] {
        &self.released
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn program(&self, id: ProgramId) -> Option<&RecordedProgram> {
        self.programs.get(&id)
    }

    pub fn texture(&self, id: TextureId) -> Option<&RecordedTexture> {
        self.textures.get(&id)
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    /// Forgets recorded draws, dispatches and uploads. Live resources are kept.
    pub fn clear_log(&mut self) {
        self.draws.clear();
        self.dispatches.clear();
        self.uploads.clear();
        self.released.clear();
    }

    /// Queues an error for the next `check_error`, standing in for a driver error.
    pub fn inject_error(&mut self, message: impl Into<String>) {
        self.errors.push_back(message.into());
    }

    /// Reads a float uniform (matrix, vector or scalar) back from a recorded block.
    pub fn read_uniform(&self, program: ProgramId, block: &[u8], name: &str) -> Option<Vec<f32>> {
        let layout = &self.programs.get(&program)?.uniforms;
        let location = layout.location(name)?;
        let count = match location.kind {
            super::UniformKind::Mat4 => 16,
            super::UniformKind::Vec4 => 4,
            super::UniformKind::F32 => 1,
            _ => return None,
        };
        let start = location.offset as usize;
        let bytes = block.get(start..start + count * 4)?;
        Some(
            bytes
                .chunks_exact(4)
                .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect(),
        )
    }
}

impl GxBackend for RecordingBackend {
    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn begin_frame(&mut self, _clear: Option<Color>) {
        if self.in_frame {
            self.errors.push_back("begin_frame called twice".to_string());
        }
        self.in_frame = true;
    }

    fn end_frame(&mut self) {
        self.in_frame = false;
        self.frames += 1;
    }

    fn create_program(
        &mut self,
        name: &str,
        vertex: StageSource<'_>,
        fragment: StageSource<'_>,
    ) -> Result<ProgramId, ShaderError> {
        let (_, _, uniforms) =
            reflect_program(name, (vertex.file, vertex.text), (fragment.file, fragment.text))?;
        let id = self.ids.next_program();
        let block = vec![0u8; uniforms.buffer_size()];
        self.programs.insert(
            id,
            RecordedProgram {
                name: name.to_string(),
                compute: false,
                uniforms,
                block,
                workgroup_size: [0; 3],
            },
        );
        Ok(id)
    }

    fn create_compute_program(
        &mut self,
        name: &str,
        compute: StageSource<'_>,
    ) -> Result<ProgramId, ShaderError> {
        let reflection = reflect_stage(ShaderStage::Compute, compute.file, compute.text)?;
        if reflection.entry_point.is_none() {
            return Err(ShaderError::Link {
                name: name.to_string(),
                message: format!("{} has no @compute entry point", compute.file),
            });
        }
        let id = self.ids.next_program();
        let block = vec![0u8; reflection.uniforms.buffer_size()];
        self.programs.insert(
            id,
            RecordedProgram {
                name: name.to_string(),
                compute: true,
                uniforms: reflection.uniforms,
                block,
                workgroup_size: reflection.workgroup_size,
            },
        );
        Ok(id)
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        self.programs.get(&program)?.uniforms.location(name)
    }

    fn set_uniform(&mut self, program: ProgramId, location: UniformLocation, value: UniformValue) {
        let Some(entry) = self.programs.get_mut(&program) else {
            self.errors
                .push_back(format!("set_uniform on unknown program {}", program.raw()));
            return;
        };
        if !value.write_to(&mut entry.block, location) {
            self.errors.push_back(format!(
                "uniform type mismatch at offset {} of {}",
                location.offset, entry.name
            ));
            return;
        }
        let name = entry
            .uniforms
            .name_at(location)
            .unwrap_or_default()
            .to_string();
        self.uploads.push(UniformUpload {
            program,
            name,
            value,
        });
    }

    fn create_texture(&mut self, pixels: &PixelBuffer<'_>) -> Result<TextureId, GxError> {
        let expected = pixels.width as usize * pixels.height as usize * 4;
        if pixels.width == 0 || pixels.height == 0 || pixels.rgba.len() != expected {
            return Err(GxError::TextureCreation(pixels.label.to_string()));
        }
        let id = self.ids.next_texture();
        self.textures.insert(
            id,
            RecordedTexture {
                label: pixels.label.to_string(),
                width: pixels.width,
                height: pixels.height,
                mipmapped: pixels.mipmapped,
                rgba: pixels.rgba.to_vec(),
            },
        );
        Ok(id)
    }

    fn release(&mut self, resource: DeviceResource) {
        let known = match resource {
            DeviceResource::Texture(id) => self.textures.remove(&id).is_some(),
            DeviceResource::Program(id) => self.programs.remove(&id).is_some(),
        };
        if !known {
            self.errors
                .push_back(format!("release of unknown resource {:?}", resource));
        }
        self.released.push(resource);
    }

    fn draw(&mut self, call: &DrawCall<'_>) {
        if let Some(&max) = call.indices.iter().max() {
            if max as usize >= call.vertices.len() {
                self.errors.push_back(format!(
                    "index {} out of range for {} vertices",
                    max,
                    call.vertices.len()
                ));
            }
        }
        let uniforms = call
            .program
            .and_then(|id| self.programs.get(&id))
            .map(|program| program.block.clone())
            .unwrap_or_default();
        self.draws.push(RecordedDraw {
            primitive: call.primitive,
            program: call.program,
            texture: call.texture,
            sampler: call.sampler,
            vertices: call.vertices.to_vec(),
            indices: call.indices.to_vec(),
            uniforms,
        });
    }

    fn dispatch(&mut self, program: ProgramId, groups: [u32; 3], texture: Option<TextureId>) {
        match self.programs.get(&program) {
            Some(entry) if entry.compute => self.dispatches.push(RecordedDispatch {
                program,
                groups,
                texture,
            }),
            _ => self
                .errors
                .push_back(format!("dispatch with non-compute program {}", program.raw())),
        }
    }

    fn check_error(&mut self) -> Option<String> {
        self.errors.pop_front()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
