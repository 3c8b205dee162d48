//! Trip discovery.
//!
//! Every immediate subdirectory of the trips directory that holds a parseable
//! `trip.json` is a trip; its directory name is the trip id. Discovery only
//! reads each config's `beginDate`, so a trip whose content fails to render
//! is still discovered and tracked.
//!
//! Trips are ordered newest first by `beginDate`. A missing or unparseable
//! date sorts as the Unix epoch, i.e. last. Ties are broken by id so the
//! order is stable across runs and filesystems.

use chrono::{DateTime, NaiveDate};
use log::{debug, warn};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::paths::{Paths, TRIP_CONFIG_FILE};

/// The only fields discovery needs from `trip.json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TripHeader {
    #[serde(default)]
    begin_date: Option<String>,
}

/// Discover trip ids under the registry's trips directory.
pub fn discover_trips(paths: &Paths) -> Vec<String> {
    discover_trips_in(paths.trips_dir())
}

/// Discover trip ids under `trips_dir`, newest first.
///
/// A missing trips directory yields no trips. Subdirectories without a
/// `trip.json` are ignored silently; ones whose `trip.json` is not valid JSON
/// are skipped with a warning.
pub fn discover_trips_in(trips_dir: &Path) -> Vec<String> {
    let entries = match fs::read_dir(trips_dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("no trips directory at {}: {e}", trips_dir.display());
            return Vec::new();
        }
    };

    let mut trips: Vec<(NaiveDate, String)> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|e| {
            let id = e.file_name().to_string_lossy().into_owned();
            let config_path = e.path().join(TRIP_CONFIG_FILE);
            let content = fs::read_to_string(&config_path).ok()?;
            match serde_json::from_str::<TripHeader>(&content) {
                Ok(header) => Some((begin_date(header.begin_date.as_deref()), id)),
                Err(err) => {
                    warn!(
                        "skipping trip '{id}': invalid {}: {err}",
                        config_path.display()
                    );
                    None
                }
            }
        })
        .collect();

    trips.sort_by(|(da, ia), (db, ib)| db.cmp(da).then_with(|| ia.cmp(ib)));
    trips.into_iter().map(|(_, id)| id).collect()
}

/// Parse a trip date. Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp;
/// anything else is the epoch.
pub fn begin_date(raw: Option<&str>) -> NaiveDate {
    raw.and_then(parse_date).unwrap_or(NaiveDate::default())
}

pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|d| d.date_naive()))
}
