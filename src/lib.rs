//! # Trailpress
//!
//! An incremental static site builder for a travel blog. Each trip is a
//! directory of markdown plus a `trip.json`; the site is a page per trip, a
//! page per trip item, and a handful of shared pages (home, map, about,
//! sitemap) that aggregate every trip.
//!
//! # Incremental Builds
//!
//! Rebuilding every trip on every edit is wasted work: a typical edit touches
//! one markdown file in one trip. Trailpress keeps a snapshot of what the
//! last build saw and decides, per invocation, between three modes:
//!
//! ```text
//! Full         every trip + shared pages   (first build, --force, core file edited)
//! Incremental  changed trips + shared pages
//! NoOp         nothing                     (exit 0)
//! ```
//!
//! Change detection is by modification time, not content hash. A trip's
//! fingerprint is its `trip.json` mtime plus the newest mtime anywhere in its
//! directory tree. Core files (the generator binary, `site.toml`, every
//! `templates/*.html`) affect every page, so any core file edit forces a full
//! build.
//!
//! Deleting a file from a trip without touching anything else isn't
//! guaranteed to be noticed: the newest remaining mtime may not move. Run
//! with `--force` or name the trip explicitly after deletions.
//!
//! Removing a whole trip directory isn't noticed either. Only discovered
//! trips are checked for changes, so the next build is a no-op and the home
//! page, map, and sitemap keep listing the removed trip. A `--force` build
//! drops it from the snapshot and the shared pages. Its old output directory
//! stays in `dist/` until removed by hand.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`paths`] | Path registry: every input and output location, and cache keys |
//! | [`config`] | `site.toml` loading, stock defaults, merging, validation |
//! | [`discover`] | Finds trips and orders them newest first |
//! | [`fingerprint`] | mtime fingerprints for files, trees, core files, and trips |
//! | [`cache`] | The persisted build snapshot: load, save, update |
//! | [`plan`] | Pure build mode selection |
//! | [`pipeline`] | Runs a build: process, write, stamp, save |
//! | [`trip`] | `trip.json` + markdown → processed trip |
//! | [`generate`] | Processed trips → HTML, sitemap, site index |
//! | [`output`] | CLI progress formatting |
//! | [`clock`] | Injectable wall clock |
//!
//! # Concurrency
//!
//! None. One invocation reads the snapshot once and writes it once. There is
//! no lock file; two concurrent builds race on the snapshot and the last
//! writer wins.

pub mod cache;
pub mod clock;
pub mod config;
pub mod discover;
pub mod fingerprint;
pub mod generate;
pub mod output;
pub mod paths;
pub mod pipeline;
pub mod plan;
pub mod trip;

#[cfg(test)]
pub(crate) mod test_helpers;
