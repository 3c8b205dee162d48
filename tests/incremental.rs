//! End-to-end change detection and build mode scenarios.
//!
//! Every test pins modification times explicitly, so "edited after the last
//! build" never depends on sleeping past filesystem timestamp granularity.

use std::fs;
use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};
use tempfile::TempDir;

use trailpress::cache::{BuildCache, corrupt_backup_path};
use trailpress::clock::{Clock, Millis};
use trailpress::config::load_config;
use trailpress::discover::discover_trips;
use trailpress::fingerprint::{changed_trips, core_files_changed, dir_mod_time};
use trailpress::paths::Paths;
use trailpress::pipeline::{self, BuildReport};
use trailpress::plan::{BuildMode, BuildReason, BuildRequest, select_mode};

const BUILD_TIME: Millis = 10_000_000;

struct AtMillis(Millis);

impl Clock for AtMillis {
    fn now_millis(&self) -> Millis {
        self.0
    }
}

fn set_mtime(path: &Path, secs: u64) {
    fs::File::open(path)
        .unwrap()
        .set_modified(UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn add_trip(root: &Path, id: &str, begin_date: &str) {
    write(
        root,
        &format!("content/trips/{id}/trip.json"),
        &format!(
            r#"{{"title": "{id}", "published": true, "beginDate": "{begin_date}",
                "content": [{{"type": "article", "title": "Day One", "file": "day-one.md"}}]}}"#
        ),
    );
    write(root, &format!("content/trips/{id}/main.md"), "Intro.");
    write(root, &format!("content/trips/{id}/day-one.md"), "It rained.");
}

/// Pin every file and directory under `root` to `secs`.
fn settle(root: &Path, secs: u64) {
    for entry in walkdir::WalkDir::new(root).contents_first(true) {
        set_mtime(entry.unwrap().path(), secs);
    }
}

/// Three trips and a template, every mtime pinned to t=1000s.
fn project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(root, "site.toml", "title = \"Scenario\"\n");
    write(root, "templates/head.html", "<meta name=\"x\">");
    add_trip(root, "a", "2019-03-01");
    add_trip(root, "b", "2021-07-15");
    add_trip(root, "c", "2020-11-30");
    settle(root, 1_000);
    tmp
}

fn paths_for(root: &Path) -> Paths {
    Paths::new(root, &load_config(root).unwrap())
}

fn build(root: &Path, request: &BuildRequest) -> BuildReport {
    let site = load_config(root).unwrap();
    let paths = Paths::new(root, &site);
    pipeline::run(request, &paths, &site, &AtMillis(BUILD_TIME), None).unwrap()
}

fn load_cache(root: &Path) -> BuildCache {
    BuildCache::load(&root.join(".build-cache.json"))
}

#[test]
fn fresh_repo_discovers_newest_first_and_builds_fully() {
    let tmp = project();
    let paths = paths_for(tmp.path());

    let trips = discover_trips(&paths);
    assert_eq!(trips, vec!["b", "c", "a"]);

    let plan = select_mode(&BuildRequest::default(), &BuildCache::empty(), &paths, &trips);
    assert_eq!(plan.mode, BuildMode::Full);
    assert_eq!(plan.reason, BuildReason::FirstBuild);

    let report = build(tmp.path(), &BuildRequest::default());
    assert_eq!(report.rendered, vec!["b", "c", "a"]);
    assert!(tmp.path().join("dist/sitemap.xml").exists());
}

#[test]
fn rebuilding_unchanged_project_is_noop() {
    let tmp = project();
    build(tmp.path(), &BuildRequest::default());

    let paths = paths_for(tmp.path());
    let cache = load_cache(tmp.path());
    assert!(!core_files_changed(&cache, &paths));
    assert!(changed_trips(&cache, &paths, &discover_trips(&paths)).is_empty());

    let report = build(tmp.path(), &BuildRequest::default());
    assert_eq!(report.mode, BuildMode::NoOp);
    assert!(report.rendered.is_empty());
}

#[test]
fn single_trip_edit_rebuilds_only_that_trip() {
    let tmp = project();
    build(tmp.path(), &BuildRequest::default());
    let before = load_cache(tmp.path());

    set_mtime(&tmp.path().join("content/trips/b/day-one.md"), 2_000);

    let paths = paths_for(tmp.path());
    assert_eq!(
        changed_trips(&before, &paths, &discover_trips(&paths)),
        vec!["b"]
    );

    let report = build(tmp.path(), &BuildRequest::default());
    assert_eq!(report.mode, BuildMode::Incremental(vec!["b".into()]));
    assert_eq!(report.rendered, vec!["b"]);

    let after = load_cache(tmp.path());
    assert_eq!(after.trips["b"].content_mod_time, 2_000_000);
    assert_eq!(after.trips["a"], before.trips["a"]);
    assert_eq!(after.trips["c"], before.trips["c"]);
    assert_eq!(after.last_full_build, before.last_full_build);

    // Shared pages still know every trip.
    let home = fs::read_to_string(tmp.path().join("dist/index.html")).unwrap();
    for id in ["a", "b", "c"] {
        assert!(home.contains(&format!("/trips/{id}/")));
    }
}

#[test]
fn trip_config_edit_is_detected() {
    let tmp = project();
    build(tmp.path(), &BuildRequest::default());
    set_mtime(&tmp.path().join("content/trips/c/trip.json"), 2_000);

    let report = build(tmp.path(), &BuildRequest::default());
    assert_eq!(report.mode, BuildMode::Incremental(vec!["c".into()]));
}

#[test]
fn touch_older_than_snapshot_is_not_a_change() {
    let tmp = project();
    build(tmp.path(), &BuildRequest::default());
    set_mtime(&tmp.path().join("content/trips/a/main.md"), 500);

    let report = build(tmp.path(), &BuildRequest::default());
    assert_eq!(report.mode, BuildMode::NoOp);
}

#[test]
fn template_edit_forces_full_build() {
    let tmp = project();
    build(tmp.path(), &BuildRequest::default());
    set_mtime(&tmp.path().join("templates/head.html"), 2_000);

    let paths = paths_for(tmp.path());
    assert!(core_files_changed(&load_cache(tmp.path()), &paths));

    let report = build(tmp.path(), &BuildRequest::default());
    assert_eq!(report.mode, BuildMode::Full);
    assert_eq!(
        report.reason,
        BuildReason::CoreFileChanged("templates/head.html".into())
    );
    assert_eq!(report.rendered.len(), 3);
}

#[test]
fn new_template_forces_full_build() {
    let tmp = project();
    build(tmp.path(), &BuildRequest::default());
    write(tmp.path(), "templates/footer.html", "<footer></footer>");

    let report = build(tmp.path(), &BuildRequest::default());
    assert_eq!(report.mode, BuildMode::Full);
}

#[test]
fn new_trip_is_built_incrementally() {
    let tmp = project();
    build(tmp.path(), &BuildRequest::default());
    add_trip(tmp.path(), "d", "2022-01-01");

    let report = build(tmp.path(), &BuildRequest::default());
    assert_eq!(report.mode, BuildMode::Incremental(vec!["d".into()]));
}

/// Removing a file doesn't move the newest remaining mtime. When the
/// directory's own mtime is also unchanged, the deletion goes unnoticed.
#[test]
fn deletion_alone_is_not_detected() {
    let tmp = project();
    let root = tmp.path();
    write(root, "content/trips/a/images/old.jpg", "jpeg");
    settle(root, 1_000);
    build(root, &BuildRequest::default());

    let trip_dir = root.join("content/trips/a");
    let before = dir_mod_time(&trip_dir);
    fs::remove_file(trip_dir.join("images/old.jpg")).unwrap();
    set_mtime(&trip_dir.join("images"), 1_000);
    assert_eq!(dir_mod_time(&trip_dir), before);

    let report = build(root, &BuildRequest::default());
    assert_eq!(report.mode, BuildMode::NoOp);

    // Naming the trip rebuilds it regardless.
    let report = build(
        root,
        &BuildRequest {
            force: false,
            trips: vec!["a".into()],
        },
    );
    assert_eq!(report.rendered, vec!["a"]);
}

/// A removed trip is no longer discovered, so nothing reports it changed.
/// Shared pages go stale until a forced build.
#[test]
fn removed_trip_lingers_until_forced() {
    let tmp = project();
    let root = tmp.path();
    build(root, &BuildRequest::default());
    fs::remove_dir_all(root.join("content/trips/c")).unwrap();

    let report = build(root, &BuildRequest::default());
    assert_eq!(report.mode, BuildMode::NoOp);
    let home = fs::read_to_string(root.join("dist/index.html")).unwrap();
    assert!(home.contains("/trips/c/"));

    build(
        root,
        &BuildRequest {
            force: true,
            trips: vec![],
        },
    );
    let home = fs::read_to_string(root.join("dist/index.html")).unwrap();
    assert!(!home.contains("/trips/c/"));
    let sitemap = fs::read_to_string(root.join("dist/sitemap.xml")).unwrap();
    assert!(!sitemap.contains("/trips/c/"));
    assert!(!load_cache(root).trips.contains_key("c"));
}

#[test]
fn corrupt_cache_falls_back_to_full_build() {
    let tmp = project();
    build(tmp.path(), &BuildRequest::default());
    let cache_path = tmp.path().join(".build-cache.json");
    fs::write(&cache_path, b"\x00\xffnot json{").unwrap();

    let cache = BuildCache::load(&cache_path);
    assert_eq!(cache, BuildCache::empty());
    assert!(corrupt_backup_path(&cache_path).exists());

    let report = build(tmp.path(), &BuildRequest::default());
    assert_eq!(report.mode, BuildMode::Full);
    assert_eq!(report.reason, BuildReason::FirstBuild);
    assert!(load_cache(tmp.path()).last_full_build.is_some());
}

#[test]
fn unversioned_cache_is_read() {
    let tmp = project();
    build(tmp.path(), &BuildRequest::default());
    let cache_path = tmp.path().join(".build-cache.json");
    let mut value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&cache_path).unwrap()).unwrap();
    value.as_object_mut().unwrap().remove("version");
    fs::write(&cache_path, serde_json::to_string(&value).unwrap()).unwrap();

    let report = build(tmp.path(), &BuildRequest::default());
    assert_eq!(report.mode, BuildMode::NoOp);
}

#[test]
fn force_rebuilds_up_to_date_project() {
    let tmp = project();
    build(tmp.path(), &BuildRequest::default());

    let report = build(
        tmp.path(),
        &BuildRequest {
            force: true,
            trips: vec![],
        },
    );
    assert_eq!(report.mode, BuildMode::Full);
    assert_eq!(report.reason, BuildReason::Forced);
    assert_eq!(report.rendered.len(), 3);
}
