//! Shader sources, preprocessing and program caches.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::config::GxConfig;

pub mod cache;
pub mod preprocess;
pub mod reflect;

pub use cache::{ComputeArgs, ComputeProgram, ShaderArgs, ShaderLoader, ShaderProgram, WellKnownUniforms};
pub use preprocess::{preprocess, Preprocessed};

/// Name of the built-in program used when no valid shader is active.
pub const GENERIC_SHADER: &str = "engine/Generic";

/// Well-known uniform names, resolved once per program.
pub const MODEL_VIEW_MATRIX: &str = "ModelViewMatrix";
pub const MODEL_VIEW_PROJECTION_MATRIX: &str = "ModelViewProjectionMatrix";
pub const PROJECTION_MATRIX: &str = "ProjectionMatrix";
pub const PARAMS: &str = "params";

const BUILTIN_SOURCES: &[(&str, &str)] = &[
    (
        "engine/Generic.vs",
        include_str!("../../shaders/engine/Generic.vs"),
    ),
    (
        "engine/Generic.ps",
        include_str!("../../shaders/engine/Generic.ps"),
    ),
    ("gx.inc", include_str!("../../shaders/gx.inc")),
];

/// Answers "what is the text of shader source `name`?".
pub trait ShaderSourceProvider {
    fn source(&self, name: &str) -> Option<Cow<'_, str>>;
}

/// Named shader sources held in memory: the built-in engine shaders plus anything registered at
/// runtime.
#[derive(Debug, Clone)]
pub struct ShaderSourceRegistry {
    sources: HashMap<String, Cow<'static, str>>,
}

impl Default for ShaderSourceRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ShaderSourceRegistry {
    pub fn empty() -> Self {
        Self {
            sources: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        for (name, text) in BUILTIN_SOURCES {
            registry
                .sources
                .insert(name.to_string(), Cow::Borrowed(*text));
        }
        registry
    }

    pub fn register(&mut self, name: &str, text: impl Into<String>) {
        self.sources
            .insert(name.to_string(), Cow::Owned(text.into()));
    }

    /// Removes a registered source. Returns false when `name` was never registered.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.sources.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }
}

impl ShaderSourceProvider for ShaderSourceRegistry {
    fn source(&self, name: &str) -> Option<Cow<'_, str>> {
        self.sources.get(name).map(|text| Cow::Borrowed(text.as_ref()))
    }
}

/// Reads shader sources from the configured resource roots.
#[derive(Debug, Clone)]
pub struct FileShaderSource {
    roots: Vec<PathBuf>,
}

impl FileShaderSource {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    pub fn from_config(config: &GxConfig) -> Self {
        Self::new(config.resource_paths.clone())
    }
}

impl ShaderSourceProvider for FileShaderSource {
    fn source(&self, name: &str) -> Option<Cow<'_, str>> {
        self.roots
            .iter()
            .map(|root| root.join(name))
            .find(|path| path.is_file())
            .and_then(|path| std::fs::read_to_string(path).ok())
            .map(Cow::Owned)
    }
}

/// Files on disk take precedence; the registry answers for everything else.
pub struct LayeredShaderSource<'a> {
    pub files: &'a FileShaderSource,
    pub registry: &'a ShaderSourceRegistry,
}

impl ShaderSourceProvider for LayeredShaderSource<'_> {
    fn source(&self, name: &str) -> Option<Cow<'_, str>> {
        self.files
            .source(name)
            .or_else(|| self.registry.source(name))
    }
}
