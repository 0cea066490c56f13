use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use spritegfx::watcher::{classify, RealTimeEditWatcher, WatchAction};

fn extensions() -> Vec<String> {
    ["ps", "vs", "png", "txt"].iter().map(|e| e.to_string()).collect()
}

/// Writes `text` and pushes the modification time into the future so the change is visible even
/// on file systems with coarse timestamps.
fn write_later(path: &Path, text: &str, seconds: u64) {
    fs::write(path, text).unwrap();
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(seconds))
        .unwrap();
}

#[test]
fn existing_files_form_the_baseline() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.ps"), "a").unwrap();
    fs::write(dir.path().join("b.png"), "b").unwrap();

    let mut watcher =
        RealTimeEditWatcher::new(dir.path(), extensions(), Duration::ZERO, false);

    assert_eq!(watcher.tracked_files(), 2);
    assert!(watcher.poll().is_empty());
}

#[test]
fn modified_and_new_files_are_reported_sorted() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("z.ps"), "z").unwrap();
    fs::write(dir.path().join("sub/sheet.txt"), "s").unwrap();
    let mut watcher =
        RealTimeEditWatcher::new(dir.path(), extensions(), Duration::ZERO, false);

    write_later(&dir.path().join("z.ps"), "z2", 10);
    write_later(&dir.path().join("sub/sheet.txt"), "s2", 10);
    fs::write(dir.path().join("new.vs"), "n").unwrap();
    fs::write(dir.path().join("ignored.rs"), "r").unwrap();

    assert_eq!(watcher.poll(), vec!["new.vs", "sub/sheet.txt", "z.ps"]);
    assert!(watcher.poll().is_empty());
}

#[test]
fn poll_interval_throttles_scans() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.ps"), "a").unwrap();
    let mut watcher =
        RealTimeEditWatcher::new(dir.path(), extensions(), Duration::from_secs(3600), false);

    write_later(&dir.path().join("a.ps"), "changed", 10);
    assert!(watcher.poll().is_empty());
    assert_eq!(watcher.force_poll(), vec!["a.ps"]);
}

#[test]
fn extensions_are_matched_case_insensitively() {
    let dir = tempfile::tempdir().unwrap();
    let watcher = RealTimeEditWatcher::new(
        dir.path(),
        vec![".PNG".to_string()],
        Duration::ZERO,
        false,
    );
    assert!(watcher.is_watched("art/Hero.png"));
    assert!(watcher.is_watched("art/hero.PNG"));
    assert!(!watcher.is_watched("art/hero"));
    assert!(!watcher.uses_notifications());
    assert_eq!(watcher.root(), dir.path());
}

#[test]
fn file_kinds_map_to_reload_actions() {
    assert_eq!(classify("fx/blur.vs"), WatchAction::ShaderSource);
    assert_eq!(classify("fx/blur.PS"), WatchAction::ShaderSource);
    assert_eq!(classify("fx/fill.cs"), WatchAction::ComputeSource);
    assert_eq!(classify("gx.inc"), WatchAction::ShaderInclude);
    assert_eq!(classify("hero.png"), WatchAction::Texture);
    assert_eq!(classify("hero.jpg"), WatchAction::Texture);
    assert_eq!(classify("hero.txt"), WatchAction::AnimSheet);
    assert_eq!(classify("music.ogg"), WatchAction::Other);
    assert_eq!(classify("Makefile"), WatchAction::Other);
}
