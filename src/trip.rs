//! Trip loading and content processing.
//!
//! Turns one trip directory into a [`Trip`]: the parsed `trip.json`, the
//! intro and every content item rendered from markdown to HTML, galleries
//! split off from the prose, and coordinates resolved for the maps.
//!
//! ## Trip directory
//!
//! ```text
//! content/trips/greece/
//! ├── trip.json          # Title, dates, ordered content items
//! ├── main.md            # Introduction (optional, warned when missing)
//! ├── athens.md          # Content item markdown
//! ├── ferry-days.md
//! └── images/
//! ```
//!
//! ## Galleries
//!
//! A markdown file may contain the marker line `*Add your photos here*`.
//! Everything after it is parsed for `![caption](src)` images, which become
//! the item's gallery; only the prose before the marker is rendered.
//!
//! ## Coordinates
//!
//! Locations resolve coordinates from, in order: inline `coordinates` in
//! `trip.json`, then the geocode cache (`_cache/geocode.json`, keyed by
//! `place`). Unresolved locations render without a map pin and produce a
//! warning. No network lookups happen at build time.

use chrono::NaiveDate;
use log::warn;
use pulldown_cmark::{Options, Parser, html as md_html};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::discover::parse_date;
use crate::paths::Paths;

/// Line separating prose from the photo gallery in a markdown file.
pub const GALLERY_MARKER: &str = "*Add your photos here*";

/// Directory of a trip's own map page, kept free of item pages.
pub const TRIP_MAP_DIR: &str = "map";

#[derive(Error, Debug)]
pub enum TripError {
    #[error("trip '{}' not found (no {})", .0, .1.display())]
    NotFound(String, PathBuf),
    #[error("invalid trip config {}: {}", .0.display(), .1)]
    InvalidConfig(PathBuf, serde_json::Error),
    #[error("IO error reading {}: {}", .0.display(), .1)]
    Io(PathBuf, std::io::Error),
}

impl TripError {
    /// Whether the build can continue without this trip. A trip that doesn't
    /// exist is skipped; a trip that exists but can't be read is fatal.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TripError::NotFound(..))
    }
}

// ============================================================================
// trip.json
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripConfig {
    pub title: String,
    #[serde(default)]
    pub published: bool,
    pub begin_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub cover_image: Option<String>,
    pub thumbnail: Option<String>,
    pub map_center: Option<String>,
    #[serde(default)]
    pub content: Vec<ContentItem>,
    #[serde(default)]
    pub related_trips: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Location,
    Article,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub title: String,
    pub file: Option<String>,
    pub place: Option<String>,
    pub duration: Option<String>,
    pub thumbnail: Option<String>,
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

// ============================================================================
// Processed trip
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryImage {
    pub caption: String,
    pub src: String,
}

/// One rendered content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPage {
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub title: String,
    pub slug: String,
    /// 1-based position within the trip.
    pub order: usize,
    pub content_html: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gallery: Vec<GalleryImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub name: String,
    pub slug: String,
    pub duration: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapCenter {
    pub name: String,
    pub coordinates: Option<Coordinates>,
}

/// A non-fatal problem found while processing a trip.
#[derive(Debug, Clone, PartialEq)]
pub struct TripWarning {
    pub item: String,
    pub message: String,
}

/// A fully processed trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub slug: String,
    pub title: String,
    pub published: bool,
    pub begin_date: Option<String>,
    pub end_date: Option<String>,
    pub duration: String,
    pub metadata: serde_json::Value,
    pub cover_image: Option<String>,
    pub thumbnail: Option<String>,
    pub map_center: Option<MapCenter>,
    pub intro_html: Option<String>,
    pub content: Vec<ContentPage>,
    pub locations: Vec<Location>,
    pub related_trips: Vec<String>,
    #[serde(skip)]
    pub warnings: Vec<TripWarning>,
}

/// Lightweight trip record kept in the site index: everything but the HTML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripSummary {
    pub slug: String,
    pub title: String,
    pub published: bool,
    pub begin_date: Option<String>,
    pub end_date: Option<String>,
    pub duration: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub cover_image: Option<String>,
    pub thumbnail: Option<String>,
    pub map_center: Option<MapCenter>,
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub related_trips: Vec<String>,
}

impl Trip {
    pub fn summary(&self) -> TripSummary {
        TripSummary {
            slug: self.slug.clone(),
            title: self.title.clone(),
            published: self.published,
            begin_date: self.begin_date.clone(),
            end_date: self.end_date.clone(),
            duration: self.duration.clone(),
            metadata: self.metadata.clone(),
            cover_image: self.cover_image.clone(),
            thumbnail: self.thumbnail.clone(),
            map_center: self.map_center.clone(),
            locations: self.locations.clone(),
            related_trips: self.related_trips.clone(),
        }
    }
}

// ============================================================================
// Geocode cache
// ============================================================================

/// Read-only place → coordinates lookup.
#[derive(Debug, Default, Clone)]
pub struct Geocoder {
    places: BTreeMap<String, Coordinates>,
}

impl Geocoder {
    /// Load the geocode cache. A missing or unreadable file is an empty
    /// lookup; every location then needs inline coordinates.
    pub fn load(path: &Path) -> Self {
        let places = fs::read_to_string(path)
            .ok()
            .and_then(|c| match serde_json::from_str(&c) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!("ignoring unreadable geocode cache {}: {e}", path.display());
                    None
                }
            })
            .unwrap_or_default();
        Self { places }
    }

    pub fn lookup(&self, place: &str) -> Option<Coordinates> {
        self.places.get(place).copied()
    }
}

// ============================================================================
// Processing
// ============================================================================

/// Read and parse a trip's `trip.json`.
pub fn load_trip_config(paths: &Paths, trip_id: &str) -> Result<TripConfig, TripError> {
    let path = paths.trip_config(trip_id);
    let content = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(TripError::NotFound(trip_id.to_string(), path));
        }
        Err(e) => return Err(TripError::Io(path, e)),
    };
    serde_json::from_str(&content).map_err(|e| TripError::InvalidConfig(path, e))
}

/// Process one trip into renderable form.
pub fn process_trip(paths: &Paths, trip_id: &str, geocoder: &Geocoder) -> Result<Trip, TripError> {
    let config = load_trip_config(paths, trip_id)?;
    let trip_dir = paths.trip_dir(trip_id);
    let mut warnings = Vec::new();

    let main_path = paths.trip_main(trip_id);
    let intro_html = if main_path.exists() {
        let markdown = fs::read_to_string(&main_path).map_err(|e| TripError::Io(main_path, e))?;
        Some(markdown_to_html(&markdown))
    } else {
        warnings.push(TripWarning {
            item: "main.md".into(),
            message: "missing trip introduction".into(),
        });
        None
    };

    let mut content = Vec::with_capacity(config.content.len());
    for (i, item) in config.content.iter().enumerate() {
        content.push(process_item(item, i + 1, &trip_dir, geocoder, &mut warnings));
    }
    assign_unique_slugs(&mut content);

    let locations: Vec<Location> = content
        .iter()
        .filter(|c| c.kind == ContentKind::Location)
        .map(|c| Location {
            name: c.title.clone(),
            slug: c.slug.clone(),
            duration: c.duration.clone(),
            coordinates: c.coordinates,
            thumbnail: config
                .content
                .get(c.order - 1)
                .and_then(|item| item.thumbnail.clone()),
        })
        .collect();

    let map_center = resolve_map_center(&config, &content, &locations, geocoder);

    Ok(Trip {
        slug: trip_id.to_string(),
        title: config.title,
        published: config.published,
        duration: trip_duration(config.begin_date.as_deref(), config.end_date.as_deref()),
        begin_date: config.begin_date,
        end_date: config.end_date,
        metadata: config.metadata,
        cover_image: config.cover_image,
        thumbnail: config.thumbnail,
        map_center,
        intro_html,
        content,
        locations,
        related_trips: config.related_trips,
        warnings,
    })
}

fn process_item(
    item: &ContentItem,
    order: usize,
    trip_dir: &Path,
    geocoder: &Geocoder,
    warnings: &mut Vec<TripWarning>,
) -> ContentPage {
    let (content_html, gallery) = match &item.file {
        Some(file) => match fs::read_to_string(trip_dir.join(file)) {
            Ok(markdown) => {
                let (prose, gallery) = split_gallery(&markdown);
                (markdown_to_html(prose), gallery)
            }
            Err(e) => {
                warnings.push(TripWarning {
                    item: item.title.clone(),
                    message: format!("cannot read {file}: {e}"),
                });
                ("<p>Content not found</p>".to_string(), Vec::new())
            }
        },
        None => (String::new(), Vec::new()),
    };

    let coordinates = match item.kind {
        ContentKind::Article => None,
        ContentKind::Location => {
            let resolved = item
                .coordinates
                .or_else(|| item.place.as_deref().and_then(|p| geocoder.lookup(p)));
            if resolved.is_none() {
                warnings.push(TripWarning {
                    item: item.title.clone(),
                    message: format!(
                        "no coordinates for place '{}'",
                        item.place.as_deref().unwrap_or(&item.title)
                    ),
                });
            }
            resolved
        }
    };

    ContentPage {
        kind: item.kind,
        title: item.title.clone(),
        slug: item_slug(item),
        order,
        content_html,
        gallery,
        place: item.place.clone(),
        duration: item.duration.clone(),
        coordinates,
    }
}

fn resolve_map_center(
    config: &TripConfig,
    content: &[ContentPage],
    locations: &[Location],
    geocoder: &Geocoder,
) -> Option<MapCenter> {
    let first_location = || {
        locations.first().map(|l| MapCenter {
            name: l.name.clone(),
            coordinates: l.coordinates,
        })
    };
    let Some(name) = &config.map_center else {
        return first_location();
    };

    let matching = content.iter().find(|c| {
        c.kind == ContentKind::Location
            && (c.title == *name || c.place.as_deref().is_some_and(|p| p.contains(name.as_str())))
    });
    if let Some(item) = matching {
        return Some(MapCenter {
            name: name.clone(),
            coordinates: item.coordinates,
        });
    }
    match geocoder.lookup(name) {
        Some(coordinates) => Some(MapCenter {
            name: name.clone(),
            coordinates: Some(coordinates),
        }),
        None => first_location(),
    }
}

/// Render markdown with tables, footnotes, and strikethrough enabled.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(markdown, options);
    let mut html = String::new();
    md_html::push_html(&mut html, parser);
    html
}

/// Split markdown at the gallery marker. Returns the trimmed prose before the
/// marker and every image after it. Without a marker the whole text is prose
/// and the gallery is empty.
pub fn split_gallery(markdown: &str) -> (&str, Vec<GalleryImage>) {
    let Some(pos) = markdown.find(GALLERY_MARKER) else {
        return (markdown, Vec::new());
    };
    let prose = markdown[..pos].trim();
    let rest = &markdown[pos + GALLERY_MARKER.len()..];
    (prose, parse_images(rest))
}

/// Extract `![caption](src)` images in order.
fn parse_images(text: &str) -> Vec<GalleryImage> {
    let mut images = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("![") {
        let after = &rest[start + 2..];
        let Some(close) = after.find("](") else { break };
        let caption = &after[..close];
        let tail = &after[close + 2..];
        let Some(end) = tail.find(')') else { break };
        if !caption.contains(']') && !tail[..end].is_empty() {
            images.push(GalleryImage {
                caption: caption.to_string(),
                src: tail[..end].to_string(),
            });
        }
        rest = &tail[end + 1..];
    }
    images
}

/// URL-safe slug: lowercase ASCII alphanumerics separated by single dashes.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// Slug for a content item: the markdown file stem when present (stable
/// across title edits), the slugified title otherwise.
pub fn item_slug(item: &ContentItem) -> String {
    match &item.file {
        Some(file) => Path::new(file)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| slugify(&item.title)),
        None => slugify(&item.title),
    }
}

/// Item slugs become output directory names. An empty slug (a title with no
/// ASCII letters or digits) falls back to `item-<order>`; a slug already taken
/// in this trip, or naming the trip map, gets a `-2`, `-3`, ... suffix.
fn assign_unique_slugs(content: &mut [ContentPage]) {
    let mut taken: HashSet<String> = HashSet::from([TRIP_MAP_DIR.to_string()]);
    for item in content.iter_mut() {
        let base = if item.slug.is_empty() {
            format!("item-{}", item.order)
        } else {
            std::mem::take(&mut item.slug)
        };
        let mut slug = base.clone();
        let mut n = 2;
        while !taken.insert(slug.clone()) {
            slug = format!("{base}-{n}");
            n += 1;
        }
        item.slug = slug;
    }
}

/// "N days" between begin and end, or "Ongoing" when either is missing.
pub fn trip_duration(begin: Option<&str>, end: Option<&str>) -> String {
    let parse = |d: Option<&str>| d.and_then(parse_date);
    match (parse(begin), parse(end)) {
        (Some(b), Some(e)) => format!("{} days", days_between(b, e)),
        _ => "Ongoing".to_string(),
    }
}

fn days_between(begin: NaiveDate, end: NaiveDate) -> i64 {
    (end - begin).num_days()
}
