//! Batched immediate-mode 2D renderer.
//!
//! A [`RenderContext`] owns a graphics backend, the `gx` batch engine, the model-view and
//! projection matrix stacks, the texture/shader/animation caches and an optional real-time edit
//! watcher that reloads resources when their files change on disk.

pub mod anim;
pub mod backend;
pub mod cache;
pub mod config;
pub mod context;
pub mod draw;
pub mod errors;
pub mod geometry;
pub mod gx;
pub mod matrix;
pub mod shader;
pub mod sprite;
pub mod texture;
pub mod utils;
pub mod watcher;

pub use anim::{AnimClip, AnimSheet, AnimTrigger, TriggerArgs, TriggerKind};
pub use backend::{
    Capabilities, FilterMode, GxBackend, IndexFormat, RecordingBackend, SamplerState, UniformValue,
};
#[cfg(feature = "backend-wgpu")]
pub use backend::{WgpuBackend, WgpuBackendConfig};
pub use cache::{Handle, HashedResourceCache, Loader, Resource, ResourceVersion};
pub use config::GxConfig;
pub use context::{ColorMode, ColorPost, DrawState, RenderContext};
pub use errors::{GxError, Result, ShaderError};
pub use geometry::{GeometryBuffer, GxVertex};
pub use gx::{BatchSink, FlushedBatch, Gx, Primitive};
pub use matrix::{MatrixMode, MatrixStack, MatrixStacks};
pub use shader::{ComputeProgram, ShaderProgram, ShaderSourceRegistry};
pub use sprite::{AnimTriggerEvent, AnimationCursor, PlayState, Sprite};
pub use texture::{Texture, TextureKey};
pub use utils::{Color, Position, Rectangle, Size};
pub use watcher::RealTimeEditWatcher;
