use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{GxError, Result};
use crate::utils::normalize_resource_name;

/// Render context configuration. Every field has a default, so a config file only needs to name
/// what it overrides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GxConfig {
    /// Maximum number of vertices recorded before the batch engine flushes internally.
    pub vertex_capacity: usize,
    /// Maximum depth of each matrix stack, including the base frame.
    pub matrix_stack_depth: usize,
    /// Search roots for relative resource names, tried in order.
    pub resource_paths: Vec<PathBuf>,
    pub real_time_editing: bool,
    pub watch_root: PathBuf,
    /// Lowercase extensions (no dot) tracked by the real-time edit watcher.
    pub watch_extensions: Vec<String>,
    /// Minimum time between two directory scans.
    pub watch_poll_interval_ms: u64,
    /// Only rescan after the OS reported a change under `watch_root`.
    pub use_fs_notifications: bool,
    /// Poll the backend for errors after state-changing calls.
    pub debug_checks: bool,
}

impl Default for GxConfig {
    fn default() -> Self {
        Self {
            vertex_capacity: 1024 * 16,
            matrix_stack_depth: 32,
            resource_paths: vec![PathBuf::from(".")],
            real_time_editing: false,
            watch_root: PathBuf::from("."),
            watch_extensions: default_watch_extensions(),
            watch_poll_interval_ms: 250,
            use_fs_notifications: false,
            debug_checks: cfg!(debug_assertions),
        }
    }
}

pub fn default_watch_extensions() -> Vec<String> {
    ["vs", "ps", "cs", "inc", "png", "jpg", "jpeg", "bmp", "gif", "tga", "txt"]
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

impl GxConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| GxError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Resolves a resource name against the configured search roots. The first root containing the
    /// file wins; when none does, the name is returned relative to the first root so the caller's
    /// load fails with a meaningful path.
    pub fn resolve_resource_path(&self, name: &str) -> PathBuf {
        let candidate = Path::new(name);
        if candidate.is_absolute() {
            return candidate.to_path_buf();
        }
        for root in &self.resource_paths {
            let path = root.join(candidate);
            if path.is_file() {
                return path;
            }
        }
        match self.resource_paths.first() {
            Some(root) => root.join(candidate),
            None => candidate.to_path_buf(),
        }
    }

    /// Maps a file reported relative to `watch_root` to the name it is cached under: the path
    /// relative to the first resource root containing it. Files outside every root keep the
    /// watcher's name.
    pub fn resource_name_for_watched(&self, watched: &str) -> String {
        let path = without_cur_dir(&self.watch_root.join(watched));
        for root in &self.resource_paths {
            let root = without_cur_dir(root);
            if root.is_absolute() != path.is_absolute() {
                continue;
            }
            if let Ok(rest) = path.strip_prefix(&root) {
                return normalize_resource_name(&rest.to_string_lossy());
            }
        }
        normalize_resource_name(watched)
    }
}

fn without_cur_dir(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}
