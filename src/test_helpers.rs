//! Shared test utilities for the trailpress test suite.
//!
//! [`TestProject`] builds a throwaway site project in a temp directory.
//! Staleness tests pin modification times explicitly with [`set_mtime`]
//! instead of sleeping, so "touched after the snapshot" is a fact of the test
//! rather than a race against filesystem timestamp granularity.
//!
//! ```ignore
//! let project = TestProject::new();
//! project.add_trip("greece", "2021-06-01");
//! project.settle_trip("greece", 1_000);
//! let paths = project.paths();
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};
use tempfile::TempDir;

use crate::config::{SITE_CONFIG_FILE, SiteConfig};
use crate::paths::Paths;

/// Set a file's or directory's mtime to `secs` seconds after the epoch.
pub fn set_mtime(path: &Path, secs: u64) {
    let file = fs::File::open(path).unwrap_or_else(|e| panic!("open {}: {e}", path.display()));
    file.set_modified(UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap_or_else(|e| panic!("set mtime on {}: {e}", path.display()));
}

/// Minimal valid `trip.json` with one article item.
pub fn trip_json(title: &str, begin_date: &str) -> String {
    format!(
        r#"{{
  "title": "{title}",
  "published": true,
  "beginDate": "{begin_date}",
  "content": [
    {{ "type": "article", "title": "Getting There", "file": "getting-there.md" }}
  ]
}}"#
    )
}

pub struct TestProject {
    tmp: TempDir,
}

impl TestProject {
    /// An empty project with a default `site.toml`.
    pub fn new() -> Self {
        let project = Self {
            tmp: TempDir::new().unwrap(),
        };
        project.write(SITE_CONFIG_FILE, "title = \"Test Travels\"\n");
        project
    }

    pub fn root(&self) -> &Path {
        self.tmp.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    pub fn config(&self) -> SiteConfig {
        crate::config::load_config(self.root()).unwrap()
    }

    pub fn paths(&self) -> Paths {
        Paths::new(self.root(), &self.config())
    }

    /// Write a file, creating parent directories.
    pub fn write(&self, rel: &str, content: &str) {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    pub fn remove(&self, rel: &str) {
        fs::remove_file(self.path(rel)).unwrap();
    }

    pub fn set_mtime(&self, rel: &str, secs: u64) {
        set_mtime(&self.path(rel), secs);
    }

    /// Add a trip with a config, an intro, and one article.
    pub fn add_trip(&self, id: &str, begin_date: &str) {
        let base = format!("content/trips/{id}");
        self.write(&format!("{base}/trip.json"), &trip_json(id, begin_date));
        self.write(&format!("{base}/main.md"), &format!("# {id}\n\nIntro."));
        self.write(
            &format!("{base}/getting-there.md"),
            "We flew.\n\n*Add your photos here*\n\n![Runway](images/runway.jpg)\n",
        );
    }

    /// Pin every file and directory of a trip to the same mtime.
    pub fn settle_trip(&self, id: &str, secs: u64) {
        let dir = self.path(&format!("content/trips/{id}"));
        for entry in walkdir::WalkDir::new(&dir).contents_first(true) {
            set_mtime(entry.unwrap().path(), secs);
        }
    }

    /// Pin every file under the project root to the same mtime.
    pub fn settle_all(&self, secs: u64) {
        for entry in walkdir::WalkDir::new(self.root()).contents_first(true) {
            set_mtime(entry.unwrap().path(), secs);
        }
    }
}
