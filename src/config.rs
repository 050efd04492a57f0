use std::path::PathBuf;
use std::time::Duration;

/// Default backend batch endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:5000/api/visualization-data";

/// Default geolocation service (ip-api.com free tier is HTTP only)
pub const DEFAULT_GEO_BASE_URL: &str = "http://ip-api.com/json";

/// Timing for the playback engine
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaybackConfig {
    pub display_duration: Duration,
    pub fade_duration: Duration,
    /// Frames over which a full batch is drawn down
    pub batch_frames: usize,
    /// Consumed events between location list refreshes
    pub location_refresh_every: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            display_duration: Duration::from_secs(10),
            fade_duration: Duration::from_secs(2),
            batch_frames: 100,
            location_refresh_every: 50,
        }
    }
}

impl PlaybackConfig {
    /// Total lifetime of a marker
    pub fn lifetime(&self) -> Duration {
        self.display_duration + self.fade_duration
    }
}

/// Which geolocation backend enriches records
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeoProvider {
    IpApi,
    MaxMind,
    None,
}

impl GeoProvider {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "ip-api" | "ipapi" | "http" => Some(GeoProvider::IpApi),
            "maxmind" | "geoip" | "mmdb" => Some(GeoProvider::MaxMind),
            "none" | "off" => Some(GeoProvider::None),
            _ => None,
        }
    }
}

/// Where traffic batches come from
#[derive(Clone, Debug, PartialEq)]
pub enum SourceKind {
    Http { endpoint: String },
    File { path: PathBuf },
    Mock { seed: Option<u64>, count: usize },
}

/// Configuration for the data source adapter
#[derive(Clone, Debug)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub timeout: Duration,
    pub geo_provider: GeoProvider,
    pub geo_base_url: String,
    pub geoip_db: Option<PathBuf>,
    pub geo_concurrency: usize,
    pub geo_cache_size: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Http {
                endpoint: DEFAULT_ENDPOINT.to_string(),
            },
            timeout: Duration::from_secs(5),
            geo_provider: GeoProvider::IpApi,
            geo_base_url: DEFAULT_GEO_BASE_URL.to_string(),
            geoip_db: None,
            geo_concurrency: 8,
            geo_cache_size: 1024,
        }
    }
}

/// Configuration for the live map view
#[derive(Clone, Debug)]
pub struct MapConfig {
    pub playback: PlaybackConfig,
    pub time_step: f32,
    pub color_scheme: u8,
}
