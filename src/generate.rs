//! HTML site generation.
//!
//! Renders processed trips and the site-wide pages into the output directory.
//! Trip pages are written per trip so an incremental build can regenerate
//! exactly the trips that changed; shared pages aggregate every trip through
//! the [`SiteIndex`] and are rewritten on every build.
//!
//! ## Output Structure
//!
//! ```text
//! dist/
//! ├── index.html                 # Trip grid, newest first
//! ├── map/index.html             # Every trip location as embedded JSON
//! ├── about/index.html           # From content/about.md, when present
//! ├── sitemap.xml
//! ├── robots.txt
//! ├── site.json                  # Site index carried between builds
//! └── trips/
//!     ├── greece.json            # Full processed trip
//!     └── greece/
//!         ├── index.html         # Intro + item list
//!         ├── map/index.html     # The trip's locations in order
//!         └── athens/index.html  # One page per content item
//! ```
//!
//! ## Partials
//!
//! `templates/head.html` is injected at the end of every `<head>` and
//! `templates/footer.html` at the end of every `<body>`, verbatim. Both are
//! optional. They are core files: editing either forces a full build.
//!
//! HTML is built with [maud](https://maud.lambda.xyz/), so every interpolated
//! value is escaped unless wrapped in `PreEscaped`.

use log::warn;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;
use walkdir::WalkDir;

use crate::config::SiteConfig;
use crate::discover::{begin_date, parse_date};
use crate::paths::Paths;
use crate::trip::{
    ContentPage, Location, MapCenter, TRIP_MAP_DIR, Trip, TripSummary, markdown_to_html,
};

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub const HEAD_PARTIAL: &str = "head.html";
pub const FOOTER_PARTIAL: &str = "footer.html";

/// HTML fragments injected into every page.
#[derive(Debug, Default, Clone)]
pub struct Partials {
    pub head: String,
    pub footer: String,
}

impl Partials {
    pub fn load(paths: &Paths) -> Result<Self, GenerateError> {
        Ok(Self {
            head: read_optional(&paths.template(HEAD_PARTIAL))?,
            footer: read_optional(&paths.template(FOOTER_PARTIAL))?,
        })
    }
}

fn read_optional(path: &Path) -> io::Result<String> {
    match fs::read_to_string(path) {
        Ok(s) => Ok(s),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e),
    }
}

// ============================================================================
// Site index
// ============================================================================

/// Site-wide fields published in `site.json` and used by the shared pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteInfo {
    pub title: String,
    pub domain: String,
    pub description: String,
    pub author: String,
}

impl From<&SiteConfig> for SiteInfo {
    fn from(config: &SiteConfig) -> Self {
        Self {
            title: config.title.clone(),
            domain: config.domain.clone(),
            description: config.description.clone(),
            author: config.author.clone(),
        }
    }
}

/// Summaries of every rendered trip. Persisted as `dist/site.json` so an
/// incremental build can regenerate the shared pages without reprocessing
/// unchanged trips.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteIndex {
    pub site: SiteInfo,
    #[serde(default)]
    pub trips: Vec<TripSummary>,
}

impl SiteIndex {
    pub fn new(config: &SiteConfig) -> Self {
        Self {
            site: SiteInfo::from(config),
            trips: Vec::new(),
        }
    }

    /// Load the index written by the previous build. Missing or unreadable
    /// yields an empty index. Site info always comes from the current config.
    pub fn load(path: &Path, config: &SiteConfig) -> Self {
        let mut index = match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str::<SiteIndex>(&content).unwrap_or_else(|e| {
                warn!("ignoring unreadable site index {}: {e}", path.display());
                Self::new(config)
            }),
            Err(_) => Self::new(config),
        };
        index.site = SiteInfo::from(config);
        index
    }

    pub fn get(&self, slug: &str) -> Option<&TripSummary> {
        self.trips.iter().find(|t| t.slug == slug)
    }

    /// Insert or replace a trip's summary.
    pub fn upsert(&mut self, summary: TripSummary) {
        match self.trips.iter_mut().find(|t| t.slug == summary.slug) {
            Some(existing) => *existing = summary,
            None => self.trips.push(summary),
        }
    }

    pub fn remove(&mut self, slug: &str) {
        self.trips.retain(|t| t.slug != slug);
    }

    /// Drop trips that no longer exist and order the rest like discovery:
    /// newest begin date first, ties by slug.
    pub fn retain_discovered(&mut self, discovered: &[String]) {
        self.trips.retain(|t| discovered.contains(&t.slug));
        self.trips.sort_by(|a, b| {
            begin_date(b.begin_date.as_deref())
                .cmp(&begin_date(a.begin_date.as_deref()))
                .then_with(|| a.slug.cmp(&b.slug))
        });
    }

    pub fn locations(&self) -> Vec<MapPin<'_>> {
        self.trips
            .iter()
            .flat_map(|trip| trip.locations.iter().map(move |location| (trip, location)))
            .filter(|(_, l)| l.coordinates.is_some())
            .map(|(trip, location)| MapPin {
                trip: &trip.slug,
                trip_title: &trip.title,
                location,
            })
            .collect()
    }
}

/// A location on the global map, tagged with its trip.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapPin<'a> {
    pub trip: &'a str,
    pub trip_title: &'a str,
    #[serde(flatten)]
    pub location: &'a Location,
}

// ============================================================================
// Writers
// ============================================================================

fn write_page(path: &Path, contents: &str) -> Result<u64, GenerateError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(contents.len() as u64)
}

/// Copy a trip's media (everything but its markdown and JSON) into the
/// trip's output directory, preserving relative paths.
fn copy_trip_assets(src: &Path, dst: &Path) -> Result<u64, GenerateError> {
    let mut bytes = 0;
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_source = entry
            .path()
            .extension()
            .is_some_and(|e| e == "md" || e == "json");
        if is_source {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        let dst_path = dst.join(rel);
        if let Some(parent) = dst_path.parent() {
            fs::create_dir_all(parent)?;
        }
        bytes += fs::copy(entry.path(), &dst_path)?;
    }
    Ok(bytes)
}

/// Write every page of one trip and copy its media. `index` resolves related
/// trip links. Returns bytes written.
pub fn write_trip_pages(
    paths: &Paths,
    partials: &Partials,
    trip: &Trip,
    index: &SiteIndex,
) -> Result<u64, GenerateError> {
    let site = &index.site;
    let trip_dir = paths.trip_output_dir(&trip.slug);
    let mut bytes = copy_trip_assets(&paths.trip_dir(&trip.slug), &trip_dir)?;

    let related: Vec<&TripSummary> = trip
        .related_trips
        .iter()
        .filter_map(|slug| index.get(slug))
        .collect();
    let intro = render_trip_page(site, partials, trip, &related);
    bytes += write_page(&trip_dir.join("index.html"), &intro.into_string())?;
    let map = render_trip_map(site, partials, trip)?;
    bytes += write_page(
        &trip_dir.join(TRIP_MAP_DIR).join("index.html"),
        &map.into_string(),
    )?;

    for (idx, item) in trip.content.iter().enumerate() {
        let prev = idx.checked_sub(1).and_then(|i| trip.content.get(i));
        let next = trip.content.get(idx + 1);
        let page = render_item_page(site, partials, trip, item, prev, next);
        bytes += write_page(
            &trip_dir.join(&item.slug).join("index.html"),
            &page.into_string(),
        )?;
    }

    let json = serde_json::to_string_pretty(trip)?;
    bytes += write_page(&paths.trip_output_json(&trip.slug), &json)?;
    Ok(bytes)
}

/// Write the home page, map, about page, sitemap, robots.txt, and the site
/// index. Returns bytes written.
pub fn write_shared_pages(
    paths: &Paths,
    partials: &Partials,
    index: &SiteIndex,
) -> Result<u64, GenerateError> {
    let out = paths.output_dir();
    let site = &index.site;
    let mut bytes = 0;

    bytes += write_page(&out.join("index.html"), &render_home(index, partials).into_string())?;
    bytes += write_page(
        &out.join("map").join("index.html"),
        &render_map(index, partials)?.into_string(),
    )?;

    let about = read_optional(paths.about_file())?;
    let has_about = !about.trim().is_empty();
    if has_about {
        let page = render_about(site, partials, &markdown_to_html(&about));
        bytes += write_page(&out.join("about").join("index.html"), &page.into_string())?;
    }

    bytes += write_page(&out.join("sitemap.xml"), &sitemap_xml(index, has_about))?;
    bytes += write_page(&out.join("robots.txt"), &robots_txt(&site.domain))?;
    bytes += write_page(&paths.site_index(), &serde_json::to_string_pretty(index)?)?;
    Ok(bytes)
}

// ============================================================================
// HTML Components
// ============================================================================

fn base_document(site: &SiteInfo, partials: &Partials, title: &str, content: Markup) -> Markup {
    let full_title = if title == site.title {
        title.to_string()
    } else {
        format!("{title} | {}", site.title)
    };
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                @if !site.description.is_empty() {
                    meta name="description" content=(site.description);
                }
                title { (full_title) }
                (PreEscaped(&partials.head))
            }
            body {
                header.site-header {
                    a.site-title href="/" { (site.title) }
                    nav {
                        a href="/map/" { "Map" }
                        " "
                        a href="/about/" { "About" }
                    }
                }
                (content)
                (PreEscaped(&partials.footer))
            }
        }
    }
}

/// Resolve a trip-relative media path against `base`. Absolute paths and
/// URLs pass through.
fn asset_url(base: &str, src: &str) -> String {
    if src.starts_with('/') || src.contains("://") {
        src.to_string()
    } else {
        format!("{base}{src}")
    }
}

fn trip_card(trip: &TripSummary) -> Markup {
    html! {
        a.trip-card href={ "/trips/" (trip.slug) "/" } {
            @if let Some(thumb) = &trip.thumbnail {
                img src=(asset_url(&format!("/trips/{}/", trip.slug), thumb)) alt=(trip.title) loading="lazy";
            }
            h2 { (trip.title) }
            p.trip-meta {
                @if let Some(date) = &trip.begin_date {
                    time datetime=(date) { (date) }
                    " · "
                }
                (trip.duration)
            }
        }
    }
}

fn render_home(index: &SiteIndex, partials: &Partials) -> Markup {
    let content = html! {
        main.home {
            @if !index.site.description.is_empty() {
                p.site-description { (index.site.description) }
            }
            section.trip-grid {
                @for trip in &index.trips {
                    (trip_card(trip))
                }
            }
        }
    };
    base_document(&index.site, partials, &index.site.title, content)
}

/// Embed JSON in a `<script>` element. `</` is escaped so the payload can't
/// close the element early.
fn script_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

fn render_map(index: &SiteIndex, partials: &Partials) -> Result<Markup, GenerateError> {
    let data = script_json(&index.locations())?;
    let content = html! {
        main.map-page {
            h1 { "Map" }
            div #map {}
            script #map-data type="application/json" { (PreEscaped(data)) }
        }
    };
    Ok(base_document(&index.site, partials, "Map", content))
}

fn render_about(site: &SiteInfo, partials: &Partials, body_html: &str) -> Markup {
    let content = html! {
        main.about-page {
            article { (PreEscaped(body_html)) }
        }
    };
    base_document(site, partials, "About", content)
}

fn render_trip_page(
    site: &SiteInfo,
    partials: &Partials,
    trip: &Trip,
    related: &[&TripSummary],
) -> Markup {
    let content = html! {
        main.trip-page {
            header.trip-header {
                h1 { (trip.title) }
                p.trip-meta {
                    @if let Some(begin) = &trip.begin_date {
                        time datetime=(begin) { (begin) }
                        @if let Some(end) = &trip.end_date {
                            " – " time datetime=(end) { (end) }
                        }
                        " · "
                    }
                    (trip.duration)
                }
                nav.trip-nav {
                    a.trip-map-link href={ (TRIP_MAP_DIR) "/" } { "Trip map" }
                }
            }
            @if let Some(intro) = &trip.intro_html {
                section.trip-intro { (PreEscaped(intro)) }
            }
            ol.trip-contents {
                @for item in &trip.content {
                    li {
                        a href={ (item.slug) "/" } { (item.title) }
                        @if let Some(duration) = &item.duration {
                            " " span.duration { (duration) }
                        }
                    }
                }
            }
            @if !related.is_empty() {
                section.related-trips {
                    h2 { "Related trips" }
                    @for other in related {
                        (trip_card(other))
                    }
                }
            }
        }
    };
    base_document(site, partials, &trip.title, content)
}

/// Data embedded in a trip map page for client-side rendering.
#[derive(Serialize)]
struct TripMapData<'a> {
    center: Option<&'a MapCenter>,
    locations: &'a [Location],
}

/// Sum of the leading day counts in location durations ("3 days" → 3).
fn total_days(locations: &[Location]) -> u32 {
    locations
        .iter()
        .filter_map(|l| {
            let duration = l.duration.as_deref()?;
            let digits: String = duration
                .chars()
                .skip_while(|c| !c.is_ascii_digit())
                .take_while(char::is_ascii_digit)
                .collect();
            digits.parse::<u32>().ok()
        })
        .sum()
}

fn render_trip_map(
    site: &SiteInfo,
    partials: &Partials,
    trip: &Trip,
) -> Result<Markup, GenerateError> {
    let data = script_json(&TripMapData {
        center: trip.map_center.as_ref(),
        locations: &trip.locations,
    })?;
    let stops = trip.locations.len();
    let days = total_days(&trip.locations);
    let content = html! {
        main.trip-map-page {
            nav.breadcrumb {
                a href="../" { (trip.title) }
                " › Map"
            }
            h1 { (trip.title) " itinerary" }
            @if trip.locations.is_empty() {
                p { "No locations available for this trip." }
            } @else {
                p.location-count {
                    (stops) @if stops == 1 { " stop" } @else { " stops" }
                    @if days > 0 { " • " (days) " days" }
                }
                ol.trip-map-locations {
                    @for location in &trip.locations {
                        li {
                            a href={ "../" (location.slug) "/" } { (location.name) }
                            @if let Some(duration) = &location.duration {
                                " " span.duration { (duration) }
                            }
                        }
                    }
                }
                div #map {}
                script #map-data type="application/json" { (PreEscaped(data)) }
            }
        }
    };
    Ok(base_document(
        site,
        partials,
        &format!("Map – {}", trip.title),
        content,
    ))
}

fn render_item_page(
    site: &SiteInfo,
    partials: &Partials,
    trip: &Trip,
    item: &ContentPage,
    prev: Option<&ContentPage>,
    next: Option<&ContentPage>,
) -> Markup {
    let content = html! {
        main.item-page {
            nav.breadcrumb {
                a href="../" { (trip.title) }
                " › "
                (item.title)
            }
            article {
                h1 { (item.title) }
                (PreEscaped(&item.content_html))
            }
            @if !item.gallery.is_empty() {
                section.gallery {
                    @for image in &item.gallery {
                        figure {
                            img src=(asset_url("../", &image.src)) alt=(image.caption) loading="lazy";
                            @if !image.caption.is_empty() {
                                figcaption { (image.caption) }
                            }
                        }
                    }
                }
            }
            nav.item-nav {
                @if let Some(prev) = prev {
                    a.prev href={ "../" (prev.slug) "/" } { "← " (prev.title) }
                }
                @if let Some(next) = next {
                    a.next href={ "../" (next.slug) "/" } { (next.title) " →" }
                }
            }
        }
    };
    base_document(site, partials, &format!("{} – {}", item.title, trip.title), content)
}

// ============================================================================
// Sitemap and robots
// ============================================================================

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// `sitemap.xml` for the home page, map, about page (when present), and every
/// indexed trip. A trip's `lastmod` is its end date, else its begin date;
/// trips with neither date in a recognised format carry none.
pub fn sitemap_xml(index: &SiteIndex, has_about: bool) -> String {
    let domain = &index.site.domain;
    let mut urls: Vec<(String, Option<String>, &str, &str)> = vec![
        (format!("{domain}/"), None, "monthly", "1.0"),
        (format!("{domain}/map/"), None, "monthly", "0.6"),
    ];
    if has_about {
        urls.push((format!("{domain}/about/"), None, "monthly", "0.5"));
    }
    for trip in &index.trips {
        let lastmod = trip
            .end_date
            .as_deref()
            .and_then(parse_date)
            .or_else(|| trip.begin_date.as_deref().and_then(parse_date))
            .map(|d| d.format("%Y-%m-%d").to_string());
        urls.push((format!("{domain}/trips/{}/", trip.slug), lastmod, "yearly", "0.8"));
    }

    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n");
    for (loc, lastmod, changefreq, priority) in urls {
        xml.push_str("  <url>\n");
        xml.push_str(&format!("    <loc>{}</loc>\n", xml_escape(&loc)));
        if let Some(lastmod) = lastmod {
            xml.push_str(&format!("    <lastmod>{lastmod}</lastmod>\n"));
        }
        xml.push_str(&format!("    <changefreq>{changefreq}</changefreq>\n"));
        xml.push_str(&format!("    <priority>{priority}</priority>\n"));
        xml.push_str("  </url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}

pub fn robots_txt(domain: &str) -> String {
    format!("# Robots.txt for {domain}\nUser-agent: *\nDisallow: /\n\n# Sitemap\nSitemap: {domain}/sitemap.xml\n")
}

// ============================================================================
// Tests
// ============================================================================
