//! Change detection by modification time.
//!
//! A fingerprint is a file's mtime in epoch milliseconds. Comparing mtimes
//! costs one `stat` per file instead of hashing every byte of every photo,
//! at the price of precision: a touch without a content change counts as a
//! change, and an edit that preserves the mtime goes unnoticed.
//!
//! ## Rules
//!
//! - A missing or unreadable file has fingerprint `0`, the oldest possible
//!   value. Its absence never reports a change; its appearance does.
//! - A directory's fingerprint is the maximum over the directory itself and
//!   every entry below it, recursively.
//! - Nothing here returns an error. Filesystem failures degrade to `0`, which
//!   can only over-trigger a rebuild, never crash one.
//!
//! ## Deletion blind spot
//!
//! Removing a file lowers nothing and raises nothing among the files that
//! remain. The deletion is only seen through the containing directory's own
//! mtime, which the OS bumps on unlink. When that directory mtime is not
//! bumped (or is restored, as sync and archive tools do), a deletion-only
//! edit is invisible to [`dir_mod_time`].

use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::cache::BuildCache;
use crate::clock::{Millis, to_millis};
use crate::paths::Paths;

/// Modification time of a single path, or `0` if it can't be read.
pub fn file_mod_time(path: &Path) -> Millis {
    match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(t) => to_millis(t),
        Err(e) => {
            debug!("no mtime for {}: {e}", path.display());
            0
        }
    }
}

/// Newest modification time anywhere in a directory tree, including the
/// directory nodes themselves. Returns `0` for a missing directory.
pub fn dir_mod_time(path: &Path) -> Millis {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(err) => {
                debug!("skipping unreadable entry under {}: {err}", path.display());
                None
            }
        })
        .filter_map(|e| e.metadata().ok())
        .filter_map(|m| m.modified().ok())
        .map(to_millis)
        .max()
        .unwrap_or(0)
}

/// Current fingerprints of one trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripFingerprint {
    /// mtime of `trip.json`.
    pub config: Millis,
    /// Newest mtime in the trip's directory tree.
    pub content: Millis,
}

pub fn trip_fingerprint(paths: &Paths, trip_id: &str) -> TripFingerprint {
    TripFingerprint {
        config: file_mod_time(&paths.trip_config(trip_id)),
        content: dir_mod_time(&paths.trip_dir(trip_id)),
    }
}

/// Files whose change forces a full rebuild: the generator executable (when
/// registered), the site config, any configured watch files, and every
/// `*.html` template.
pub fn core_files(paths: &Paths) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Some(generator) = paths.generator() {
        files.push(generator.to_path_buf());
    }
    files.push(paths.site_config());
    files.extend(paths.watch().iter().cloned());

    let mut templates: Vec<PathBuf> = fs::read_dir(paths.templates_dir())
        .into_iter()
        .flatten()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "html"))
        .collect();
    templates.sort();
    files.extend(templates);
    files
}

/// The first core file newer than its recorded fingerprint, as its cache key.
pub fn first_changed_core_file(cache: &BuildCache, paths: &Paths) -> Option<String> {
    core_files(paths).into_iter().find_map(|file| {
        let key = paths.cache_key(&file);
        let current = file_mod_time(&file);
        let recorded = cache.files.get(&key).copied().unwrap_or(0);
        (current > recorded).then_some(key)
    })
}

/// Whether any core file changed since the snapshot.
pub fn core_files_changed(cache: &BuildCache, paths: &Paths) -> bool {
    first_changed_core_file(cache, paths).is_some()
}

/// Trips whose config or content is newer than the snapshot, in the order of
/// `trip_ids`. A trip with no snapshot entry is always changed.
pub fn changed_trips(cache: &BuildCache, paths: &Paths, trip_ids: &[String]) -> Vec<String> {
    trip_ids
        .iter()
        .filter(|id| {
            let current = trip_fingerprint(paths, id);
            let (config, content) = cache
                .trips
                .get(id.as_str())
                .map(|e| (e.config_mod_time, e.content_mod_time))
                .unwrap_or((0, 0));
            current.config > config || current.content > content
        })
        .cloned()
        .collect()
}
