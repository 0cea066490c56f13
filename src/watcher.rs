//! Real-time edit watcher.
//!
//! Keeps a snapshot of modification times for every watched file under a root directory and
//! reports the files that became newer since the previous scan. OS change notifications, when
//! enabled, only gate the scan: the exact set of changed files is always re-derived from the
//! timestamps.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use walkdir::WalkDir;

use crate::config::GxConfig;
use crate::utils::{extension_of, normalize_resource_name};

/// What a change to a file with a given extension invalidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchAction {
    /// `.vs` / `.ps`: reload programs using the file.
    ShaderSource,
    /// `.cs`: reload the compute program.
    ComputeSource,
    /// `.inc`: may be shared by any program, so every program is dropped.
    ShaderInclude,
    Texture,
    AnimSheet,
    Other,
}

pub fn classify(name: &str) -> WatchAction {
    match extension_of(name).as_deref() {
        Some("vs") | Some("ps") => WatchAction::ShaderSource,
        Some("cs") => WatchAction::ComputeSource,
        Some("inc") => WatchAction::ShaderInclude,
        Some("png") | Some("jpg") | Some("jpeg") | Some("bmp") | Some("gif") | Some("tga") => {
            WatchAction::Texture
        }
        Some("txt") => WatchAction::AnimSheet,
        _ => WatchAction::Other,
    }
}

pub struct RealTimeEditWatcher {
    root: PathBuf,
    extensions: Vec<String>,
    poll_interval: Duration,
    last_scan: Option<Instant>,
    files: HashMap<String, SystemTime>,
    pending: Arc<AtomicBool>,
    // Dropping the watcher stops the notifications.
    notifier: Option<RecommendedWatcher>,
}

impl RealTimeEditWatcher {
    /// Creates a watcher and records the baseline snapshot, so files that already exist are not
    /// reported on the first poll.
    pub fn new(
        root: impl Into<PathBuf>,
        extensions: Vec<String>,
        poll_interval: Duration,
        use_notifications: bool,
    ) -> Self {
        let root = root.into();
        let pending = Arc::new(AtomicBool::new(false));
        let notifier = if use_notifications {
            match Self::start_notifier(&root, pending.clone()) {
                Ok(watcher) => Some(watcher),
                Err(error) => {
                    log::warn!(
                        "change notifications unavailable for {}, polling instead: {}",
                        root.display(),
                        error
                    );
                    None
                }
            }
        } else {
            None
        };

        let mut watcher = Self {
            root,
            extensions: extensions
                .into_iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            poll_interval,
            last_scan: None,
            files: HashMap::new(),
            pending,
            notifier,
        };
        watcher.scan();
        log::info!(
            "watching {} files under {}",
            watcher.files.len(),
            watcher.root.display()
        );
        watcher
    }

    pub fn from_config(config: &GxConfig) -> Self {
        Self::new(
            config.watch_root.clone(),
            config.watch_extensions.clone(),
            Duration::from_millis(config.watch_poll_interval_ms),
            config.use_fs_notifications,
        )
    }

    fn start_notifier(root: &Path, pending: Arc<AtomicBool>) -> notify::Result<RecommendedWatcher> {
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| {
                if let Ok(event) = res {
                    if matches!(
                        event.kind,
                        notify::EventKind::Modify(_) | notify::EventKind::Create(_)
                    ) {
                        pending.store(true, Ordering::Release);
                    }
                }
            },
            Config::default(),
        )?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        Ok(watcher)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tracked_files(&self) -> usize {
        self.files.len()
    }

    pub fn uses_notifications(&self) -> bool {
        self.notifier.is_some()
    }

    pub fn is_watched(&self, name: &str) -> bool {
        extension_of(name).is_some_and(|ext| self.extensions.iter().any(|e| *e == ext))
    }

    /// Periodic tick: rescans when the poll interval elapsed (and, with notifications, when the OS
    /// reported something). Returns the names of changed files relative to the root.
    pub fn poll(&mut self) -> Vec<String> {
        let now = Instant::now();
        if let Some(last) = self.last_scan {
            if now.duration_since(last) < self.poll_interval {
                return Vec::new();
            }
        }
        if self.notifier.is_some() && !self.pending.swap(false, Ordering::AcqRel) {
            self.last_scan = Some(now);
            return Vec::new();
        }
        self.scan()
    }

    /// Rescans immediately, ignoring the poll interval and notifications.
    pub fn force_poll(&mut self) -> Vec<String> {
        self.scan()
    }

    fn scan(&mut self) -> Vec<String> {
        let baseline = self.last_scan.is_none();
        self.last_scan = Some(Instant::now());

        let mut changed = Vec::new();
        for entry in WalkDir::new(&self.root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
            let name = normalize_resource_name(&relative.to_string_lossy());
            if !self.is_watched(&name) {
                continue;
            }
            let Some(modified) = entry.metadata().ok().and_then(|m| m.modified().ok()) else {
                continue;
            };

            match self.files.insert(name.clone(), modified) {
                Some(previous) if modified > previous => changed.push(name),
                Some(_) => {}
                None if !baseline => changed.push(name),
                None => {}
            }
        }
        changed.sort();
        for name in &changed {
            log::debug!("file changed: {}", name);
        }
        changed
    }
}
