//! Graphics backend abstraction.
//!
//! The batch engine, matrix stacks and caches only talk to a [`GxBackend`]. Backends are picked at
//! runtime and advertise what they can do through [`Capabilities`]; the batch engine converts
//! primitives a backend cannot draw natively before they reach it.

use std::any::Any;
use std::num::NonZeroU32;

use glam::Mat4;

use crate::errors::{GxError, ShaderError};
use crate::geometry::GxVertex;
use crate::gx::Primitive;
use crate::utils::Color;

pub mod recording;
#[cfg(feature = "backend-wgpu")]
pub mod wgpu_backend;

pub use recording::RecordingBackend;
#[cfg(feature = "backend-wgpu")]
pub use wgpu_backend::{WgpuBackend, WgpuBackendConfig};

macro_rules! device_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(NonZeroU32);

        impl $name {
            pub fn new(raw: u32) -> Option<Self> {
                NonZeroU32::new(raw).map(Self)
            }

            pub fn raw(self) -> u32 {
                self.0.get()
            }
        }
    };
}

device_id!(ProgramId);
device_id!(TextureId);

/// Hands out non-zero ids in increasing order.
#[derive(Debug, Default)]
pub struct IdAllocator {
    last: u32,
}

impl IdAllocator {
    pub fn next_raw(&mut self) -> NonZeroU32 {
        self.last = self.last.wrapping_add(1).max(1);
        // `max(1)` above keeps the value non-zero.
        NonZeroU32::new(self.last).unwrap_or(NonZeroU32::MIN)
    }

    pub fn next_program(&mut self) -> ProgramId {
        ProgramId(self.next_raw())
    }

    pub fn next_texture(&mut self) -> TextureId {
        TextureId(self.next_raw())
    }
}

/// Backend-owned object, replacing an untyped native handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceResource {
    Texture(TextureId),
    Program(ProgramId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    U16,
    U32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Capabilities {
    pub name: &'static str,
    pub native_line_loop: bool,
    pub native_triangle_fan: bool,
    pub index_format: IndexFormat,
    pub compute: bool,
    /// Text injected before every shader stage.
    pub preamble: String,
}

impl Capabilities {
    pub fn preamble_for_compute(&self, local_size: [u32; 3]) -> String {
        format!(
            "{}const LOCAL_SIZE_X: u32 = {}u;\nconst LOCAL_SIZE_Y: u32 = {}u;\nconst LOCAL_SIZE_Z: u32 = {}u;\n",
            self.preamble, local_size[0], local_size[1], local_size[2]
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Mat4,
    Vec4,
    F32,
    I32,
    U32,
    Other,
}

/// Byte offset and type of a member of a program's uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation {
    pub offset: u32,
    pub kind: UniformKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Mat4(Mat4),
    Vec4([f32; 4]),
    F32(f32),
    I32(i32),
    U32(u32),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Mat4(_) => UniformKind::Mat4,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::F32(_) => UniformKind::F32,
            UniformValue::I32(_) => UniformKind::I32,
            UniformValue::U32(_) => UniformKind::U32,
        }
    }

    /// Writes the value into a uniform block at `location`. Returns false on a type mismatch or
    /// when the block is too small.
    pub fn write_to(&self, block: &mut [u8], location: UniformLocation) -> bool {
        if location.kind != self.kind() {
            return false;
        }
        let offset = location.offset as usize;
        let mat;
        let bytes: &[u8] = match self {
            UniformValue::Mat4(m) => {
                mat = m.to_cols_array();
                bytemuck::cast_slice(&mat)
            }
            UniformValue::Vec4(v) => bytemuck::cast_slice(v),
            UniformValue::F32(v) => bytemuck::bytes_of(v),
            UniformValue::I32(v) => bytemuck::bytes_of(v),
            UniformValue::U32(v) => bytemuck::bytes_of(v),
        };
        match block.get_mut(offset..offset + bytes.len()) {
            Some(target) => {
                target.copy_from_slice(bytes);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplerState {
    pub filter: FilterMode,
    pub clamp: bool,
}

/// Decoded RGBA8 pixels handed to [`GxBackend::create_texture`].
#[derive(Debug, Clone, Copy)]
pub struct PixelBuffer<'a> {
    pub label: &'a str,
    pub width: u32,
    pub height: u32,
    pub rgba: &'a [u8],
    pub mipmapped: bool,
}

/// One draw call: data in, nothing out. Indices are absolute into `vertices`; empty means a
/// non-indexed draw.
#[derive(Debug, Clone, Copy)]
pub struct DrawCall<'a> {
    pub primitive: Primitive,
    pub program: Option<ProgramId>,
    pub texture: Option<TextureId>,
    pub sampler: SamplerState,
    pub vertices: &'a [GxVertex],
    pub indices: &'a [u32],
}

/// Preprocessed source of one shader stage.
#[derive(Debug, Clone, Copy)]
pub struct StageSource<'a> {
    pub file: &'a str,
    pub text: &'a str,
}

pub trait GxBackend {
    fn capabilities(&self) -> &Capabilities;

    /// Starts recording a frame, optionally clearing the target.
    fn begin_frame(&mut self, clear: Option<Color>);

    fn end_frame(&mut self);

    fn create_program(
        &mut self,
        name: &str,
        vertex: StageSource<'_>,
        fragment: StageSource<'_>,
    ) -> Result<ProgramId, ShaderError>;

    fn create_compute_program(
        &mut self,
        name: &str,
        compute: StageSource<'_>,
    ) -> Result<ProgramId, ShaderError>;

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;

    fn set_uniform(&mut self, program: ProgramId, location: UniformLocation, value: UniformValue);

    fn create_texture(&mut self, pixels: &PixelBuffer<'_>) -> Result<TextureId, GxError>;

    fn release(&mut self, resource: DeviceResource);

    fn draw(&mut self, call: &DrawCall<'_>);

    fn dispatch(&mut self, program: ProgramId, groups: [u32; 3], texture: Option<TextureId>);

    /// Returns the oldest pending backend error, if any.
    fn check_error(&mut self) -> Option<String>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Preamble shared by every backend; backends append their own feature constants.
pub(crate) fn base_preamble(backend: &str, compute: bool) -> String {
    format!(
        "// gx preamble ({})\nconst GX_VERSION: u32 = 1u;\nconst GX_COMPUTE: bool = {};\n",
        backend, compute
    )
}
