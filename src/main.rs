use clap::Parser;
use std::path::PathBuf;
use trailpress::clock::SystemClock;
use trailpress::paths::Paths;
use trailpress::plan::BuildRequest;
use trailpress::{config, output, pipeline};

fn version_string() -> &'static str {
    let on_tag = env!("TRAILPRESS_ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("TRAILPRESS_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "trailpress")]
#[command(about = "Incremental static site builder for travel blogs")]
#[command(long_about = "\
Incremental static site builder for travel blogs

Each trip is a directory of markdown with a trip.json. Only trips that
changed since the last build are rebuilt; editing site.toml or a template
rebuilds everything.

Project structure:

  site.toml                      # Site config (run --gen-config for defaults)
  templates/
  ├── head.html                  # Injected into every <head>
  └── footer.html                # Injected at the end of every <body>
  content/
  ├── about.md                   # Optional about page
  └── trips/
      └── greece/
          ├── trip.json          # Title, dates, ordered content items
          ├── main.md            # Trip introduction
          ├── athens.md          # One file per content item
          └── images/
  _cache/geocode.json            # Place name -> {lat, lng}
  .build-cache.json              # Build snapshot (safe to delete)

Modes:
  trailpress                     Build what changed (full build the first time)
  trailpress --force             Rebuild everything
  trailpress greece peru         Rebuild the named trips, skipping change detection

Deleting a file from a trip may go unnoticed; use --force or name the trip.
Removing a whole trip is not detected either: the home page, map and sitemap
keep listing it until the next --force build.

Set RUST_LOG=debug for per-file change decisions.")]
#[command(version = version_string())]
struct Cli {
    /// Project root
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Ignore the build cache and rebuild everything
    #[arg(long)]
    force: bool,

    /// Print a stock site.toml with all options documented, then exit
    #[arg(long)]
    gen_config: bool,

    /// Trips to rebuild (skips change detection)
    #[arg(value_name = "TRIP_ID")]
    trips: Vec<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    if cli.gen_config {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let site = config::load_config(&cli.root)?;
    let mut paths = Paths::new(&cli.root, &site);
    match std::env::current_exe() {
        Ok(exe) => paths = paths.with_generator(exe),
        Err(e) => log::debug!("generator executable unknown, not tracked: {e}"),
    }

    let request = BuildRequest {
        force: cli.force,
        trips: cli.trips,
    };

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            output::print_build_event(&event);
        }
    });
    let result = pipeline::run(&request, &paths, &site, &SystemClock, Some(tx));
    printer.join().ok();
    result?;

    Ok(())
}
