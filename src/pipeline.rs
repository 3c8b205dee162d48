//! Build orchestration.
//!
//! One invocation is one pass through:
//!
//! ```text
//! load cache ─► discover trips ─► select mode ─┬─ NoOp ──────────────► done
//!                                              └─ Full / Incremental
//!                                                   process targets
//!                                                   update site index
//!                                                   write trip pages
//!                                                   write shared pages
//!                                                   update + save cache
//! ```
//!
//! The cache is read once at the start and written once at the end. Any
//! fatal error returns before the save, leaving the previous snapshot in
//! place so the next run retries the same work.
//!
//! Trips are processed before anything is written, so a trip that fails to
//! process aborts the build without touching the output tree. A requested
//! trip that doesn't exist is skipped with a warning and stays stale.
//!
//! Shared pages (home, map, about, sitemap) aggregate every trip and are
//! regenerated on every build, full or incremental. Incremental builds get
//! the other trips' data from the site index the previous build wrote.

use log::{debug, warn};
use std::io;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use thiserror::Error;

use crate::cache::BuildCache;
use crate::clock::Clock;
use crate::config::SiteConfig;
use crate::discover::discover_trips;
use crate::generate::{self, GenerateError, Partials, SiteIndex};
use crate::paths::Paths;
use crate::plan::{BuildMode, BuildReason, BuildRequest, select_mode};
use crate::trip::{self, Geocoder, Trip, TripError};

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Trip(#[from] TripError),
    #[error("generate error: {0}")]
    Generate(#[from] GenerateError),
    #[error("cannot save build cache {}: {}", .0.display(), .1)]
    Cache(PathBuf, io::Error),
}

/// The collaborators a build drives: turning a trip id into a processed trip,
/// and writing pages.
pub trait SiteBuilder {
    fn process_trip(&self, paths: &Paths, trip_id: &str) -> Result<Trip, TripError>;

    /// Write one trip's pages. Returns bytes written.
    fn write_trip(&self, paths: &Paths, trip: &Trip, index: &SiteIndex)
    -> Result<u64, GenerateError>;

    /// Write the site-wide pages. Returns bytes written.
    fn write_shared(&self, paths: &Paths, index: &SiteIndex) -> Result<u64, GenerateError>;
}

/// The default builder: markdown trips rendered to static HTML.
#[derive(Debug, Default)]
pub struct StaticSite {
    geocoder: Geocoder,
    partials: Partials,
}

impl StaticSite {
    pub fn load(paths: &Paths) -> Result<Self, GenerateError> {
        Ok(Self {
            geocoder: Geocoder::load(paths.geocode_cache()),
            partials: Partials::load(paths)?,
        })
    }
}

impl SiteBuilder for StaticSite {
    fn process_trip(&self, paths: &Paths, trip_id: &str) -> Result<Trip, TripError> {
        trip::process_trip(paths, trip_id, &self.geocoder)
    }

    fn write_trip(
        &self,
        paths: &Paths,
        trip: &Trip,
        index: &SiteIndex,
    ) -> Result<u64, GenerateError> {
        generate::write_trip_pages(paths, &self.partials, trip, index)
    }

    fn write_shared(&self, paths: &Paths, index: &SiteIndex) -> Result<u64, GenerateError> {
        generate::write_shared_pages(paths, &self.partials, index)
    }
}

/// Progress reported while a build runs.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    ModeSelected {
        mode: BuildMode,
        reason: BuildReason,
        /// Number of discovered trips.
        discovered: usize,
    },
    TripRendered {
        /// 1-based position among the trips being rendered.
        index: usize,
        total: usize,
        id: String,
        title: String,
        pages: usize,
        bytes: u64,
    },
    TripSkipped {
        id: String,
        reason: String,
    },
    TripWarning {
        id: String,
        item: String,
        message: String,
    },
    SharedPagesWritten {
        trips: usize,
        bytes: u64,
    },
    Finished {
        rendered: usize,
        skipped: usize,
        bytes: u64,
    },
    NothingToRebuild,
}

/// What a build did.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    pub mode: BuildMode,
    pub reason: BuildReason,
    pub rendered: Vec<String>,
    pub skipped: Vec<String>,
    pub bytes: u64,
}

/// Run a build with the default [`StaticSite`] builder.
pub fn run(
    request: &BuildRequest,
    paths: &Paths,
    site: &SiteConfig,
    clock: &impl Clock,
    events: Option<Sender<BuildEvent>>,
) -> Result<BuildReport, BuildError> {
    let builder = StaticSite::load(paths)?;
    run_with(&builder, request, paths, site, clock, events)
}

/// Run a build with any [`SiteBuilder`].
pub fn run_with(
    builder: &impl SiteBuilder,
    request: &BuildRequest,
    paths: &Paths,
    site: &SiteConfig,
    clock: &impl Clock,
    events: Option<Sender<BuildEvent>>,
) -> Result<BuildReport, BuildError> {
    let emit = |event: BuildEvent| {
        if let Some(tx) = &events {
            tx.send(event).ok();
        }
    };

    let cache = BuildCache::load(paths.cache_file());
    let discovered = discover_trips(paths);
    let plan = select_mode(request, &cache, paths, &discovered);
    debug!("build plan: {:?} ({})", plan.mode, plan.reason);
    emit(BuildEvent::ModeSelected {
        mode: plan.mode.clone(),
        reason: plan.reason.clone(),
        discovered: discovered.len(),
    });

    let mut report = BuildReport {
        mode: plan.mode.clone(),
        reason: plan.reason,
        rendered: Vec::new(),
        skipped: Vec::new(),
        bytes: 0,
    };

    // Full builds start from nothing so trips that disappeared drop out of
    // both the snapshot and the index.
    let (mut cache, mut index, targets) = match plan.mode {
        BuildMode::NoOp => {
            emit(BuildEvent::NothingToRebuild);
            return Ok(report);
        }
        BuildMode::Full => (BuildCache::empty(), SiteIndex::new(site), discovered.clone()),
        BuildMode::Incremental(ids) => (cache, SiteIndex::load(&paths.site_index(), site), ids),
    };

    // Process everything before writing anything.
    let mut trips = Vec::new();
    let mut fresh = Vec::new();
    for id in &targets {
        let trip = match builder.process_trip(paths, id) {
            Ok(trip) => trip,
            Err(e) if e.is_recoverable() => {
                warn!("skipping trip '{id}': {e}");
                index.remove(id);
                report.skipped.push(id.clone());
                emit(BuildEvent::TripSkipped {
                    id: id.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        for warning in &trip.warnings {
            emit(BuildEvent::TripWarning {
                id: id.clone(),
                item: warning.item.clone(),
                message: warning.message.clone(),
            });
        }
        fresh.push(id.clone());
        if !trip.published && !site.build.include_unpublished {
            index.remove(id);
            report.skipped.push(id.clone());
            emit(BuildEvent::TripSkipped {
                id: id.clone(),
                reason: "unpublished".into(),
            });
            continue;
        }
        index.upsert(trip.summary());
        trips.push(trip);
    }
    index.retain_discovered(&discovered);

    let total = trips.len();
    for (i, trip) in trips.iter().enumerate() {
        let bytes = builder.write_trip(paths, trip, &index)?;
        report.bytes += bytes;
        report.rendered.push(trip.slug.clone());
        emit(BuildEvent::TripRendered {
            index: i + 1,
            total,
            id: trip.slug.clone(),
            title: trip.title.clone(),
            // intro, map, one per item
            pages: trip.content.len() + 2,
            bytes,
        });
    }

    let shared = builder.write_shared(paths, &index)?;
    report.bytes += shared;
    emit(BuildEvent::SharedPagesWritten {
        trips: index.trips.len(),
        bytes: shared,
    });

    match &report.mode {
        BuildMode::Full => cache.update_full_snapshot(paths, clock),
        _ => cache.update_trip_entries(paths, &fresh, clock),
    }
    cache
        .save(paths.cache_file(), clock)
        .map_err(|e| BuildError::Cache(paths.cache_file().to_path_buf(), e))?;

    emit(BuildEvent::Finished {
        rendered: report.rendered.len(),
        skipped: report.skipped.len(),
        bytes: report.bytes,
    });
    Ok(report)
}
