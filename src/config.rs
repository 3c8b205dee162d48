//! Site configuration module.
//!
//! Handles loading, validating, and merging `site.toml`. Stock defaults are
//! the base layer; the user's `site.toml` in the project root is merged on top
//! key by key, so a config file only needs the values it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! title = "Travels"
//! domain = "https://example.com"   # Used for sitemap and canonical links
//! description = ""
//! author = ""
//!
//! [paths]
//! trips_dir = "content/trips"      # One subdirectory per trip
//! templates_dir = "templates"      # HTML partials (head.html, footer.html)
//! output_dir = "dist"
//! cache_file = ".build-cache.json"
//! geocode_cache = "_cache/geocode.json"
//! about_file = "content/about.md"
//!
//! [build]
//! include_unpublished = true       # false renders only `published: true` trips
//! watch = []                       # Extra files that force a full rebuild
//! ```
//!
//! `site.toml` is itself a core file: editing it forces a full rebuild,
//! because every generated page embeds site-wide values.
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the site config file in the project root.
pub const SITE_CONFIG_FILE: &str = "site.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `site.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Site title, shown in the header of every page.
    pub title: String,
    /// Absolute site URL without trailing slash.
    pub domain: String,
    /// Short site description for the home page.
    pub description: String,
    /// Author name for the footer.
    pub author: String,
    /// Project layout overrides.
    pub paths: PathsConfig,
    /// Build behaviour.
    pub build: BuildConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Travels".to_string(),
            domain: "https://example.com".to_string(),
            description: String::new(),
            author: String::new(),
            paths: PathsConfig::default(),
            build: BuildConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.domain.starts_with("http://") || self.domain.starts_with("https://")) {
            return Err(ConfigError::Validation(
                "domain must start with http:// or https://".into(),
            ));
        }
        if self.domain.ends_with('/') {
            return Err(ConfigError::Validation(
                "domain must not end with '/'".into(),
            ));
        }
        for (key, value) in [
            ("paths.trips_dir", &self.paths.trips_dir),
            ("paths.output_dir", &self.paths.output_dir),
            ("paths.cache_file", &self.paths.cache_file),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
        }
        if self.paths.output_dir == self.paths.trips_dir {
            return Err(ConfigError::Validation(
                "paths.output_dir must differ from paths.trips_dir".into(),
            ));
        }
        Ok(())
    }
}

/// Project-relative locations of inputs and outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub trips_dir: String,
    pub templates_dir: String,
    pub output_dir: String,
    pub cache_file: String,
    pub geocode_cache: String,
    pub about_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            trips_dir: "content/trips".to_string(),
            templates_dir: "templates".to_string(),
            output_dir: "dist".to_string(),
            cache_file: ".build-cache.json".to_string(),
            geocode_cache: "_cache/geocode.json".to_string(),
            about_file: "content/about.md".to_string(),
        }
    }
}

/// Build behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Render trips whose `published` flag is false. Turn off for deploys.
    pub include_unpublished: bool,
    /// Additional project-relative files treated as core files.
    pub watch: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            include_unpublished: true,
            watch: Vec::new(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `site.toml` from the project root as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(SITE_CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the site config for a project root.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(root)?)
}

/// Returns a fully-commented stock `site.toml`.
///
/// Printed by `trailpress --gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# Trailpress Site Configuration
# =============================
# All settings are optional. Values shown are the defaults.
# Editing this file forces a full rebuild on the next run.
# Unknown keys will cause an error.

title = "Travels"

# Absolute site URL without trailing slash (sitemap, robots.txt).
domain = "https://example.com"

description = ""
author = ""

# ---------------------------------------------------------------------------
# Project layout (relative to the project root)
# ---------------------------------------------------------------------------
[paths]
# One subdirectory per trip, each with a trip.json.
trips_dir = "content/trips"

# HTML partials injected into every page: head.html, footer.html.
# Every *.html file here is tracked; editing one forces a full rebuild.
templates_dir = "templates"

output_dir = "dist"

# Build cache snapshot. Delete it to force a full rebuild.
cache_file = ".build-cache.json"

# Place name -> { "lat": .., "lng": .. } lookup used for maps.
geocode_cache = "_cache/geocode.json"

about_file = "content/about.md"

# ---------------------------------------------------------------------------
# Build
# ---------------------------------------------------------------------------
[build]
# Render trips whose trip.json has "published": false.
include_unpublished = true

# Extra files whose modification forces a full rebuild.
watch = []
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = SiteConfig::default();
        assert_eq!(config.title, "Travels");
        assert_eq!(config.paths.trips_dir, "content/trips");
        assert_eq!(config.paths.cache_file, ".build-cache.json");
        assert!(config.build.include_unpublished);
    }

    #[test]
    fn parse_partial_config() {
        let toml = r##"
title = "Kevin Abroad"

[paths]
output_dir = "public"
"##;
        let config: SiteConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.title, "Kevin Abroad");
        assert_eq!(config.paths.output_dir, "public");
        // Defaults preserved
        assert_eq!(config.paths.trips_dir, "content/trips");
        assert_eq!(config.domain, "https://example.com");
    }

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.title, "Travels");
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(SITE_CONFIG_FILE),
            r#"
domain = "https://travels.example.org"

[build]
include_unpublished = false
watch = ["scripts/deploy.sh"]
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.domain, "https://travels.example.org");
        assert!(!config.build.include_unpublished);
        assert_eq!(config.build.watch, vec!["scripts/deploy.sh"]);
        assert_eq!(config.paths.output_dir, "dist");
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(SITE_CONFIG_FILE), "title = [[[").unwrap();
        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_key_rejected() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(SITE_CONFIG_FILE), "titel = \"typo\"").unwrap();
        assert!(load_config(tmp.path()).is_err());
    }

    #[test]
    fn unknown_nested_key_rejected() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(SITE_CONFIG_FILE),
            "[paths]\ntrip_dir = \"x\"",
        )
        .unwrap();
        assert!(load_config(tmp.path()).is_err());
    }

    #[test]
    fn validate_rejects_domain_without_scheme() {
        let mut config = SiteConfig::default();
        config.domain = "example.com".into();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_trailing_slash() {
        let mut config = SiteConfig::default();
        config.domain = "https://example.com/".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_output_inside_trips() {
        let mut config = SiteConfig::default();
        config.paths.output_dir = config.paths.trips_dir.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_cache_file() {
        let mut config = SiteConfig::default();
        config.paths.cache_file = " ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_default_config_passes() {
        assert!(SiteConfig::default().validate().is_ok());
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str("[paths]\na = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str("[paths]\nb = 3").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["paths"]["a"].as_integer(), Some(1));
        assert_eq!(merged["paths"]["b"].as_integer(), Some(3));
    }

    #[test]
    fn merge_toml_array_replaced_not_appended() {
        let base: toml::Value = toml::from_str("watch = [\"a\", \"b\"]").unwrap();
        let overlay: toml::Value = toml::from_str("watch = [\"c\"]").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["watch"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let parsed: SiteConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = SiteConfig::default();
        assert_eq!(parsed.title, defaults.title);
        assert_eq!(parsed.domain, defaults.domain);
        assert_eq!(parsed.paths.trips_dir, defaults.paths.trips_dir);
        assert_eq!(parsed.paths.cache_file, defaults.paths.cache_file);
        assert_eq!(
            parsed.build.include_unpublished,
            defaults.build.include_unpublished
        );
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let value = stock_defaults_value();
        let table = value.as_table().unwrap();
        assert!(table.contains_key("paths"));
        assert!(table.contains_key("build"));
    }
}
