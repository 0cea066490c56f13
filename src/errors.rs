//! Error types.
//!
//! Cache accessors never surface these to callers: a failed load is logged and the cache entry is
//! left in its "present but invalid" state. The types exist so loaders can use `?` internally and so
//! shader diagnostics can be kept on the cache entry for inspection.

use thiserror::Error;

/// Result alias used by loaders and configuration helpers.
pub type Result<T> = std::result::Result<T, GxError>;

#[derive(Error, Debug)]
pub enum GxError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode image {path}: {source}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("image size ({width}, {height}) must be a multiple of the grid size ({grid_x}, {grid_y})")]
    GridMismatch {
        width: u32,
        height: u32,
        grid_x: u32,
        grid_y: u32,
    },

    #[error("backend failed to create a texture for {0}")]
    TextureCreation(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("sheet {path}, line {line}: {message}")]
    Sheet {
        path: String,
        line: usize,
        message: String,
    },

    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Shader(#[from] ShaderError),
}

/// Shader stage, used for diagnostics and preamble selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Compute => "compute",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShaderError {
    #[error("shader source not found: {0}")]
    SourceNotFound(String),

    #[error("{from}: include not found: {name}")]
    IncludeNotFound { name: String, from: String },

    #[error("include cycle: {}", chain.join(" -> "))]
    IncludeCycle { chain: Vec<String> },

    #[error("{stage} shader {file} failed to compile:\n{message}")]
    Compile {
        stage: ShaderStage,
        file: String,
        message: String,
    },

    #[error("program {name} failed to link: {message}")]
    Link { name: String, message: String },

    #[error("{stage} shaders are not supported by the {backend} backend")]
    Unsupported {
        stage: ShaderStage,
        backend: &'static str,
    },
}
