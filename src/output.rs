//! CLI output formatting for builds.
//!
//! # Information-First Display
//!
//! Output leads with what was built, not where it went: each trip line is its
//! position, id, and title, with page counts and sizes as indented context.
//! Warnings sit under the trip they belong to.
//!
//! # Output Format
//!
//! ```text
//! ==> Incremental build of 1 trip (trip content changed)
//! 001/001 greece: Greece 2021
//!     4 pages, 12.3 KB
//!     warning: Athens: no coordinates for place 'Athens'
//! skipped atlantis: trip 'atlantis' not found (no content/trips/atlantis/trip.json)
//! Shared pages: 3 trips, 8.1 KB
//! ==> Built 1 trip (1 skipped), 20.4 KB
//! ```
//!
//! # Architecture
//!
//! [`format_build_event`] is pure and returns `Vec<String>` for testability;
//! [`print_build_event`] writes the lines to stdout. `main` runs the printer
//! on its own thread, fed by the build's event channel.

use crate::pipeline::BuildEvent;
use crate::plan::BuildMode;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Human-readable byte count.
fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}

fn mode_line(mode: &BuildMode) -> String {
    match mode {
        BuildMode::Full => "Full build".to_string(),
        BuildMode::Incremental(ids) => format!("Incremental build of {}", plural(ids.len(), "trip")),
        BuildMode::NoOp => "Nothing to rebuild".to_string(),
    }
}

// ============================================================================
// Build events
// ============================================================================

/// Format a single build progress event as display lines.
pub fn format_build_event(event: &BuildEvent) -> Vec<String> {
    match event {
        BuildEvent::ModeSelected {
            mode, reason, ..
        } => vec![format!("==> {} ({reason})", mode_line(mode))],
        BuildEvent::TripRendered {
            index,
            total,
            id,
            title,
            pages,
            bytes,
        } => vec![
            format!("{}/{} {id}: {title}", format_index(*index), format_index(*total)),
            format!("{}{}, {}", indent(1), plural(*pages, "page"), format_bytes(*bytes)),
        ],
        BuildEvent::TripSkipped { id, reason } => vec![format!("skipped {id}: {reason}")],
        BuildEvent::TripWarning { item, message, .. } => {
            vec![format!("{}warning: {item}: {message}", indent(1))]
        }
        BuildEvent::SharedPagesWritten { trips, bytes } => vec![format!(
            "Shared pages: {}, {}",
            plural(*trips, "trip"),
            format_bytes(*bytes)
        )],
        BuildEvent::Finished {
            rendered,
            skipped,
            bytes,
        } => {
            let skipped = if *skipped > 0 {
                format!(" ({skipped} skipped)")
            } else {
                String::new()
            };
            vec![format!(
                "==> Built {}{skipped}, {}",
                plural(*rendered, "trip"),
                format_bytes(*bytes)
            )]
        }
        BuildEvent::NothingToRebuild => vec!["Everything is up to date.".to_string()],
    }
}

/// Print a build event to stdout.
pub fn print_build_event(event: &BuildEvent) {
    for line in format_build_event(event) {
        println!("{}", line);
    }
}
