//! Build cache for incremental builds.
//!
//! The cache records what the last successful build saw: the fingerprint of
//! every core file, and for every trip the fingerprints of its config and its
//! content tree. The next invocation compares current fingerprints against
//! these to decide between a full build, an incremental build of the changed
//! trips, or nothing at all (see [`crate::plan`]).
//!
//! # Design
//!
//! The cache is a plain value: loaded once at the start of an invocation,
//! updated in memory after the build succeeds, and saved once at the end. A
//! failed build never reaches the save, so the next run retries from the same
//! starting point.
//!
//! The update functions stamp entries with exactly the functions the detector
//! compares against ([`file_mod_time`], [`trip_fingerprint`]). Using anything
//! else would make a freshly saved cache disagree with the next detection
//! pass and rebuild forever.
//!
//! ## Storage
//!
//! Pretty-printed JSON at `paths.cache_file` (default `.build-cache.json`):
//!
//! ```json
//! {
//!   "version": 1,
//!   "lastFullBuild": 1718000000000,
//!   "files": { "site.toml": 1717990000000 },
//!   "trips": {
//!     "greece": { "configModTime": 1, "contentModTime": 2, "lastBuilt": 3 }
//!   },
//!   "lastUpdate": 1718000000000
//! }
//! ```
//!
//! Files without a `version` key are read as version 1. A missing, corrupt,
//! or newer-versioned file loads as an empty cache, which forces a full
//! build. A corrupt file is copied aside to `<cache>.corrupt` before the next
//! save overwrites it.
//!
//! There is no lock: two concurrent invocations race on this file and the
//! last writer wins.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::clock::{Clock, Millis};
use crate::discover::discover_trips;
use crate::fingerprint::{core_files, file_mod_time, trip_fingerprint};
use crate::paths::Paths;

/// Version of the cache format. Bump to invalidate existing caches when the
/// format or fingerprint computation changes.
const CACHE_VERSION: u32 = 1;

fn default_version() -> u32 {
    CACHE_VERSION
}

/// Last-seen fingerprints of one trip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripEntry {
    pub config_mod_time: Millis,
    pub content_mod_time: Millis,
    pub last_built: Millis,
}

/// The persisted build snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildCache {
    #[serde(default = "default_version")]
    pub version: u32,
    /// When the last full build completed. `None` until one has.
    #[serde(default)]
    pub last_full_build: Option<Millis>,
    /// Core file cache key → mtime.
    #[serde(default)]
    pub files: BTreeMap<String, Millis>,
    /// Trip id → fingerprints.
    #[serde(default)]
    pub trips: BTreeMap<String, TripEntry>,
    /// Stamped on every save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<Millis>,
}

impl BuildCache {
    /// An empty cache: nothing built, everything stale.
    pub fn empty() -> Self {
        Self {
            version: CACHE_VERSION,
            last_full_build: None,
            files: BTreeMap::new(),
            trips: BTreeMap::new(),
            last_update: None,
        }
    }

    /// Load the cache file. Never fails: a missing, unparseable, or
    /// incompatible file yields an empty cache.
    pub fn load(path: &Path) -> Self {
        let content = match fs::read(path) {
            Ok(c) => c,
            Err(e) => {
                debug!("no build cache at {}: {e}", path.display());
                return Self::empty();
            }
        };
        let cache: Self = match serde_json::from_slice(&content) {
            Ok(c) => c,
            Err(e) => {
                warn!("build cache {} is corrupt ({e}); rebuilding everything", path.display());
                backup_corrupt(path);
                return Self::empty();
            }
        };
        if cache.version != CACHE_VERSION {
            warn!(
                "build cache {} has version {} (expected {CACHE_VERSION}); rebuilding everything",
                path.display(),
                cache.version
            );
            return Self::empty();
        }
        cache
    }

    /// Stamp `lastUpdate` and write the cache as pretty JSON, replacing any
    /// existing file.
    pub fn save(&mut self, path: &Path, clock: &impl Clock) -> io::Result<()> {
        self.last_update = Some(clock.now_millis());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }

    /// Refresh the entries of the given trips with their current fingerprints
    /// and mark them built now.
    pub fn update_trip_entries(&mut self, paths: &Paths, trip_ids: &[String], clock: &impl Clock) {
        let now = clock.now_millis();
        for id in trip_ids {
            let fp = trip_fingerprint(paths, id);
            self.trips.insert(
                id.clone(),
                TripEntry {
                    config_mod_time: fp.config,
                    content_mod_time: fp.content,
                    last_built: now,
                },
            );
        }
    }

    /// Refresh every core file and every discovered trip, and record a full
    /// build. Only called after a successful full build.
    pub fn update_full_snapshot(&mut self, paths: &Paths, clock: &impl Clock) {
        for file in core_files(paths) {
            self.files.insert(paths.cache_key(&file), file_mod_time(&file));
        }
        let trips = discover_trips(paths);
        self.update_trip_entries(paths, &trips, clock);
        self.last_full_build = Some(clock.now_millis());
    }
}

/// Path a corrupt cache is copied to before being replaced.
pub fn corrupt_backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".corrupt");
    path.with_file_name(name)
}

fn backup_corrupt(path: &Path) {
    let backup = corrupt_backup_path(path);
    if let Err(e) = fs::copy(path, &backup) {
        debug!("could not back up corrupt cache to {}: {e}", backup.display());
    }
}
