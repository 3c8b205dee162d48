//! Path registry: every location the build reads or writes.
//!
//! Built once per invocation from the project root and the `[paths]` section
//! of the site config. No other module joins path segments by hand, so a
//! layout change happens in one place.

use crate::config::{SITE_CONFIG_FILE, SiteConfig};
use std::path::{Path, PathBuf};

/// Trip config file inside each trip directory.
pub const TRIP_CONFIG_FILE: &str = "trip.json";
/// Trip introduction markdown inside each trip directory.
pub const TRIP_MAIN_FILE: &str = "main.md";

#[derive(Debug, Clone)]
pub struct Paths {
    root: PathBuf,
    trips_dir: PathBuf,
    templates_dir: PathBuf,
    output_dir: PathBuf,
    cache_file: PathBuf,
    geocode_cache: PathBuf,
    about_file: PathBuf,
    watch: Vec<PathBuf>,
    generator: Option<PathBuf>,
}

impl Paths {
    pub fn new(root: &Path, config: &SiteConfig) -> Self {
        let p = &config.paths;
        Self {
            root: root.to_path_buf(),
            trips_dir: root.join(&p.trips_dir),
            templates_dir: root.join(&p.templates_dir),
            output_dir: root.join(&p.output_dir),
            cache_file: root.join(&p.cache_file),
            geocode_cache: root.join(&p.geocode_cache),
            about_file: root.join(&p.about_file),
            watch: config.build.watch.iter().map(|w| root.join(w)).collect(),
            generator: None,
        }
    }

    /// Register the generator executable as a core file. A rebuilt binary
    /// changes how every page renders, so its mtime invalidates the cache.
    pub fn with_generator(mut self, exe: PathBuf) -> Self {
        self.generator = Some(exe);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn site_config(&self) -> PathBuf {
        self.root.join(SITE_CONFIG_FILE)
    }

    pub fn trips_dir(&self) -> &Path {
        &self.trips_dir
    }

    pub fn trip_dir(&self, trip_id: &str) -> PathBuf {
        self.trips_dir.join(trip_id)
    }

    pub fn trip_config(&self, trip_id: &str) -> PathBuf {
        self.trip_dir(trip_id).join(TRIP_CONFIG_FILE)
    }

    pub fn trip_main(&self, trip_id: &str) -> PathBuf {
        self.trip_dir(trip_id).join(TRIP_MAIN_FILE)
    }

    pub fn templates_dir(&self) -> &Path {
        &self.templates_dir
    }

    pub fn template(&self, name: &str) -> PathBuf {
        self.templates_dir.join(name)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Output directory for one trip's pages.
    pub fn trip_output_dir(&self, trip_id: &str) -> PathBuf {
        self.output_dir.join("trips").join(trip_id)
    }

    /// Full processed trip content written next to its pages.
    pub fn trip_output_json(&self, trip_id: &str) -> PathBuf {
        self.output_dir.join("trips").join(format!("{trip_id}.json"))
    }

    /// Site index (all trip summaries) shared between builds.
    pub fn site_index(&self) -> PathBuf {
        self.output_dir.join("site.json")
    }

    pub fn cache_file(&self) -> &Path {
        &self.cache_file
    }

    pub fn geocode_cache(&self) -> &Path {
        &self.geocode_cache
    }

    pub fn about_file(&self) -> &Path {
        &self.about_file
    }

    pub fn watch(&self) -> &[PathBuf] {
        &self.watch
    }

    pub fn generator(&self) -> Option<&Path> {
        self.generator.as_deref()
    }

    /// Stable key for a path in the cache's `files` map: root-relative with
    /// `/` separators when under the root, the full path otherwise.
    pub fn cache_key(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(rel) => rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => path.to_string_lossy().into_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> Paths {
        Paths::new(Path::new("/site"), &SiteConfig::default())
    }

    #[test]
    fn trip_paths_follow_layout() {
        let p = paths();
        assert_eq!(p.trip_dir("greece"), Path::new("/site/content/trips/greece"));
        assert_eq!(
            p.trip_config("greece"),
            Path::new("/site/content/trips/greece/trip.json")
        );
        assert_eq!(
            p.trip_main("greece"),
            Path::new("/site/content/trips/greece/main.md")
        );
    }

    #[test]
    fn output_paths_live_under_output_dir() {
        let p = paths();
        assert_eq!(p.trip_output_dir("peru"), Path::new("/site/dist/trips/peru"));
        assert_eq!(p.trip_output_json("peru"), Path::new("/site/dist/trips/peru.json"));
        assert_eq!(p.site_index(), Path::new("/site/dist/site.json"));
    }

    #[test]
    fn overrides_from_config() {
        let mut config = SiteConfig::default();
        config.paths.trips_dir = "journeys".into();
        config.paths.cache_file = "state/cache.json".into();
        config.build.watch = vec!["Makefile".into()];
        let p = Paths::new(Path::new("/site"), &config);
        assert_eq!(p.trip_dir("x"), Path::new("/site/journeys/x"));
        assert_eq!(p.cache_file(), Path::new("/site/state/cache.json"));
        assert_eq!(p.watch(), &[PathBuf::from("/site/Makefile")]);
    }

    #[test]
    fn cache_key_is_root_relative() {
        let p = paths();
        assert_eq!(p.cache_key(&p.site_config()), "site.toml");
        assert_eq!(p.cache_key(&p.template("head.html")), "templates/head.html");
    }

    #[test]
    fn cache_key_outside_root_is_absolute() {
        let p = paths();
        assert_eq!(p.cache_key(Path::new("/usr/bin/trailpress")), "/usr/bin/trailpress");
    }

    #[test]
    fn generator_is_optional() {
        assert!(paths().generator().is_none());
        let p = paths().with_generator(PathBuf::from("/bin/tp"));
        assert_eq!(p.generator(), Some(Path::new("/bin/tp")));
    }
}
