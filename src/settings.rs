use crate::error::Result;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub source: SourceSettings,
    #[serde(default)]
    pub playback: PlaybackSettings,
    #[serde(default)]
    pub map: MapSettings,
}

#[derive(Debug, Default, Deserialize)]
pub struct SourceSettings {
    pub endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
    pub geo: Option<String>,          // ip-api, maxmind or none
    pub geo_base_url: Option<String>,
    pub geo_concurrency: Option<usize>,
    pub geo_cache_size: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlaybackSettings {
    pub display_secs: Option<u64>,
    pub fade_secs: Option<f32>,
    pub batch_frames: Option<usize>,
    pub location_refresh_every: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MapSettings {
    pub time_step: Option<f32>,
    pub color_scheme: Option<u8>,
    pub geoip_db: Option<PathBuf>,   // Path to GeoLite2-City.mmdb database
}

impl Settings {
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|err| {
                warn!(path = %path.display(), %err, "ignoring invalid settings file");
                Self::default()
            }),
            Err(err) => {
                warn!(path = %path.display(), %err, "could not read settings file");
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("trafficmap")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let settings = Settings::parse("").unwrap();
        assert!(settings.source.endpoint.is_none());
        assert!(settings.playback.display_secs.is_none());
        assert!(settings.map.geoip_db.is_none());
    }

    #[test]
    fn sections_are_read() {
        let settings = Settings::parse(
            r#"
            [source]
            endpoint = "http://collector:5000/api/visualization-data"
            geo = "maxmind"

            [playback]
            display_secs = 4
            fade_secs = 0.5

            [map]
            color_scheme = 2
            geoip_db = "/usr/share/GeoIP/GeoLite2-City.mmdb"
            "#,
        )
        .unwrap();

        assert_eq!(
            settings.source.endpoint.as_deref(),
            Some("http://collector:5000/api/visualization-data")
        );
        assert_eq!(settings.source.geo.as_deref(), Some("maxmind"));
        assert_eq!(settings.playback.display_secs, Some(4));
        assert_eq!(settings.playback.fade_secs, Some(0.5));
        assert_eq!(settings.map.color_scheme, Some(2));
        assert!(settings.map.geoip_db.is_some());
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(Settings::parse("[playback]\ndisplay_secs = \"ten\"").is_err());
    }
}
