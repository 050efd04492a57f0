mod aggregate;
mod colors;
mod config;
mod error;
mod help;
mod logging;
mod playback;
mod report;
mod scheduler;
mod settings;
mod terminal;
mod traffic;
mod view;

use clap::{Args, Parser, Subcommand};
use config::{GeoProvider, MapConfig, PlaybackConfig, SourceConfig, SourceKind};
use error::{Error, Result};
use logging::LogTarget;
use settings::Settings;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

#[derive(Parser)]
#[command(name = "trafficmap")]
#[command(author = "Terminal Art Generator")]
#[command(version = "0.1.0")]
#[command(about = "Terminal world map that plays back network traffic by origin", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Animate traffic on a world map
    Live {
        #[command(flatten)]
        source: SourceArgs,

        /// Seconds a marker stays fully visible (also the refresh period)
        #[arg(short, long)]
        duration: Option<u64>,

        /// Seconds a marker takes to fade out
        #[arg(short, long, value_parser = parse_seconds)]
        fade: Option<f32>,

        /// Seconds per frame
        #[arg(short, long, value_parser = parse_seconds)]
        time: Option<f32>,

        /// Write debug logs to the cache directory
        #[arg(long)]
        debug: bool,
    },

    /// Fetch one batch and print location and hourly summaries
    Summary {
        #[command(flatten)]
        source: SourceArgs,

        /// Number of locations to list
        #[arg(short = 'n', long, default_value = "10")]
        top: usize,
    },
}

#[derive(Args, Clone, Debug, Default)]
struct SourceArgs {
    /// Backend batch endpoint
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Generate synthetic traffic instead of calling a backend
    #[arg(short, long, conflicts_with_all = ["endpoint", "file"])]
    mock: bool,

    /// Replay a JSON file in the backend's batch format
    #[arg(long, conflicts_with = "endpoint")]
    file: Option<PathBuf>,

    /// Random seed for mock traffic
    #[arg(short, long)]
    seed: Option<u64>,

    /// Events per mock batch
    #[arg(long, default_value = "500")]
    count: usize,

    /// Geolocation backend: ip-api, maxmind or none
    #[arg(short, long)]
    geo: Option<String>,
}

impl SourceArgs {
    /// Command line first, then the settings file, then defaults
    fn into_config(self, settings: &Settings) -> Result<SourceConfig> {
        let defaults = SourceConfig::default();
        let from_file = &settings.source;

        let kind = if self.mock {
            SourceKind::Mock {
                seed: self.seed,
                count: self.count,
            }
        } else if let Some(path) = self.file {
            SourceKind::File { path }
        } else if let Some(endpoint) = self.endpoint.or_else(|| from_file.endpoint.clone()) {
            SourceKind::Http { endpoint }
        } else {
            defaults.kind
        };

        let geo_provider = match self.geo.as_deref().or(from_file.geo.as_deref()) {
            Some(name) => GeoProvider::parse(name)
                .ok_or_else(|| Error::Config(format!("unknown geolocation provider '{name}'")))?,
            None => defaults.geo_provider,
        };

        Ok(SourceConfig {
            kind,
            timeout: from_file.timeout_secs.map(Duration::from_secs).unwrap_or(defaults.timeout),
            geo_provider,
            geo_base_url: from_file.geo_base_url.clone().unwrap_or(defaults.geo_base_url),
            geoip_db: settings.map.geoip_db.clone(),
            geo_concurrency: from_file.geo_concurrency.unwrap_or(defaults.geo_concurrency).max(1),
            geo_cache_size: from_file.geo_cache_size.unwrap_or(defaults.geo_cache_size),
        })
    }
}

/// Non-negative, finite seconds
fn parse_seconds(value: &str) -> std::result::Result<f32, String> {
    let secs: f32 = value.parse().map_err(|_| format!("`{value}` is not a number"))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(format!("`{value}` is not a valid number of seconds"));
    }
    Ok(secs)
}

fn map_config(settings: &Settings, duration: Option<u64>, fade: Option<f32>, time: Option<f32>) -> MapConfig {
    let defaults = PlaybackConfig::default();
    let from_file = &settings.playback;

    let display_secs = duration.or(from_file.display_secs).unwrap_or(defaults.display_duration.as_secs());
    // The settings file can hold `nan` or `inf`
    let fade_secs = fade
        .or(from_file.fade_secs)
        .filter(|secs| secs.is_finite())
        .unwrap_or(defaults.fade_duration.as_secs_f32());

    let playback = PlaybackConfig {
        display_duration: Duration::from_secs(display_secs.clamp(1, 60)),
        fade_duration: Duration::from_secs_f32(fade_secs.clamp(0.0, 60.0)),
        batch_frames: from_file.batch_frames.unwrap_or(defaults.batch_frames).max(1),
        location_refresh_every: from_file
            .location_refresh_every
            .unwrap_or(defaults.location_refresh_every)
            .max(1),
    };

    MapConfig {
        playback,
        time_step: time
            .or(settings.map.time_step)
            .filter(|secs| secs.is_finite())
            .unwrap_or(0.03)
            .clamp(0.005, 1.0),
        color_scheme: settings.map.color_scheme.unwrap_or(0),
    }
}

fn run(cli: Cli) -> Result {
    match cli.command {
        Commands::Live {
            source,
            duration,
            fade,
            time,
            debug,
        } => {
            logging::init(LogTarget::for_live(debug), debug)?;
            let settings = Settings::load();
            let source_config = source.into_config(&settings)?;
            let config = map_config(&settings, duration, fade, time);

            let source: Arc<dyn traffic::source::TrafficSource> =
                Arc::from(traffic::source::build_source(&source_config));
            let mut term = terminal::Terminal::new(true)?;
            view::run(&mut term, source, &config)?;
        }
        Commands::Summary { source, top } => {
            logging::init(LogTarget::Stderr, false)?;
            let settings = Settings::load();
            let source_config = source.into_config(&settings)?;

            let source = traffic::source::build_source(&source_config);
            let events = source.fetch_batch()?;
            let summary = aggregate::summarize(&events);
            print!("{}", report::format_summary(&summary, top, &source.describe()));
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "trafficmap failed");
            eprintln!("trafficmap: {err}");
            ExitCode::FAILURE
        }
    }
}
