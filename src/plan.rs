//! Build mode selection.
//!
//! Maps (request, snapshot, filesystem) to exactly one of three modes. The
//! decision runs once per invocation, in this order:
//!
//! | Condition                          | Mode                         |
//! |------------------------------------|------------------------------|
//! | `--force`                          | Full                         |
//! | explicit trip ids                  | Incremental(ids), no detection |
//! | snapshot never completed a build   | Full                         |
//! | any core file newer than snapshot  | Full                         |
//! | no trip changed                    | NoOp                         |
//! | otherwise                          | Incremental(changed trips)   |
//!
//! Selection only reads; it never writes the cache or the output tree.

use std::fmt;

use crate::cache::BuildCache;
use crate::fingerprint::{changed_trips, first_changed_core_file};
use crate::paths::Paths;

/// What the user asked for on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildRequest {
    pub force: bool,
    pub trips: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildMode {
    Full,
    Incremental(Vec<String>),
    NoOp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildReason {
    Forced,
    Requested,
    FirstBuild,
    /// Cache key of the first core file found newer than the snapshot.
    CoreFileChanged(String),
    TripsChanged,
    UpToDate,
}

impl fmt::Display for BuildReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildReason::Forced => write!(f, "--force"),
            BuildReason::Requested => write!(f, "trips requested explicitly"),
            BuildReason::FirstBuild => write!(f, "no previous build"),
            BuildReason::CoreFileChanged(key) => write!(f, "{key} changed"),
            BuildReason::TripsChanged => write!(f, "trip content changed"),
            BuildReason::UpToDate => write!(f, "nothing changed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    pub mode: BuildMode,
    pub reason: BuildReason,
}

impl BuildPlan {
    fn new(mode: BuildMode, reason: BuildReason) -> Self {
        Self { mode, reason }
    }
}

/// Decide the build mode. `trip_ids` is the discovered trip set; it is only
/// consulted when change detection runs.
pub fn select_mode(
    request: &BuildRequest,
    cache: &BuildCache,
    paths: &Paths,
    trip_ids: &[String],
) -> BuildPlan {
    if request.force {
        return BuildPlan::new(BuildMode::Full, BuildReason::Forced);
    }
    if !request.trips.is_empty() {
        return BuildPlan::new(
            BuildMode::Incremental(request.trips.clone()),
            BuildReason::Requested,
        );
    }
    if cache.last_full_build.is_none() {
        return BuildPlan::new(BuildMode::Full, BuildReason::FirstBuild);
    }
    if let Some(key) = first_changed_core_file(cache, paths) {
        return BuildPlan::new(BuildMode::Full, BuildReason::CoreFileChanged(key));
    }
    let changed = changed_trips(cache, paths, trip_ids);
    if changed.is_empty() {
        BuildPlan::new(BuildMode::NoOp, BuildReason::UpToDate)
    } else {
        BuildPlan::new(BuildMode::Incremental(changed), BuildReason::TripsChanged)
    }
}
