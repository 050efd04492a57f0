//! Traffic records: the backend wire format and the enriched events the
//! playback engine consumes.

pub mod geo;
pub mod source;

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use tracing::warn;

pub const UNKNOWN: &str = "Unknown";

/// Resolved city and country of an address
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Location {
    pub city: String,
    pub country: String,
}

impl Location {
    pub fn new(city: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            country: country.into(),
        }
    }

    pub fn unknown() -> Self {
        Self::new(UNKNOWN, UNKNOWN)
    }

    /// Key used by the location counts, `"city, country"`
    pub fn key(&self) -> String {
        format!("{}, {}", self.city, self.country)
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::unknown()
    }
}

/// One observed network event, enriched with its location
#[derive(Clone, Debug, PartialEq)]
pub struct TrafficEvent {
    pub source_address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    pub size: Option<f64>,
    pub location: Location,
}

impl TrafficEvent {
    /// Build an event, clamping coordinates into range.
    pub fn new(
        source_address: impl Into<String>,
        latitude: f64,
        longitude: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            source_address: source_address.into(),
            latitude: clamp_coordinate(latitude, 90.0),
            longitude: clamp_coordinate(longitude, 180.0),
            timestamp,
            size: None,
            location: Location::unknown(),
        }
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    pub fn with_size(mut self, size: Option<f64>) -> Self {
        self.size = size;
        self
    }
}

/// Clamp to `[-limit, limit]`; NaN and infinities collapse to zero.
pub fn clamp_coordinate(value: f64, limit: f64) -> f64 {
    if value.is_finite() {
        value.clamp(-limit, limit)
    } else {
        0.0
    }
}

/// Timestamp as sent by the backend: ISO-8601 text or unix seconds
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawTimestamp {
    Seconds(i64),
    Fractional(f64),
    Text(String),
}

impl RawTimestamp {
    pub fn parse(&self) -> Option<DateTime<Utc>> {
        match self {
            RawTimestamp::Seconds(secs) => Utc.timestamp_opt(*secs, 0).single(),
            RawTimestamp::Fractional(secs) if secs.is_finite() => {
                let millis = (secs * 1000.0) as i64;
                Utc.timestamp_millis_opt(millis).single()
            }
            RawTimestamp::Fractional(_) => None,
            RawTimestamp::Text(text) => {
                let text = text.trim();
                DateTime::parse_from_rfc3339(text)
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok()
                    .or_else(|| text.parse::<i64>().ok().and_then(|s| Utc.timestamp_opt(s, 0).single()))
            }
        }
    }
}

/// One element of the backend batch
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RawRecord {
    pub ip: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub size: Option<f64>,
    pub timestamp: RawTimestamp,
}

impl RawRecord {
    /// Convert to an unresolved event. `None` when the timestamp is unusable.
    pub fn into_event(self) -> Option<TrafficEvent> {
        let Some(timestamp) = self.timestamp.parse() else {
            warn!(ip = %self.ip, timestamp = ?self.timestamp, "dropping record with unparseable timestamp");
            return None;
        };
        let event = TrafficEvent::new(
            self.ip,
            self.latitude.unwrap_or(0.0),
            self.longitude.unwrap_or(0.0),
            timestamp,
        );
        Some(event.with_size(self.size))
    }
}

/// Decode a batch body
pub fn decode_batch(body: &str) -> serde_json::Result<Vec<RawRecord>> {
    serde_json::from_str(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_server_shape_with_unix_seconds() {
        let records = decode_batch(
            r#"[{"ip": "173.198.105.40", "latitude": 35.3696, "longitude": -119.0105, "timestamp": 1700000000}]"#,
        )
        .unwrap();
        let event = records[0].clone().into_event().unwrap();
        assert_eq!(event.source_address, "173.198.105.40");
        assert_eq!(event.timestamp.timestamp(), 1_700_000_000);
        assert_eq!(event.location, Location::unknown());
    }

    #[test]
    fn decodes_iso_timestamps_and_optional_fields() {
        let records = decode_batch(
            r#"[{"ip": "5.165.146.0", "size": 512, "timestamp": "2024-03-01T12:30:00Z"}]"#,
        )
        .unwrap();
        let event = records[0].clone().into_event().unwrap();
        assert_eq!(event.latitude, 0.0);
        assert_eq!(event.longitude, 0.0);
        assert_eq!(event.size, Some(512.0));
        assert_eq!(event.timestamp.to_rfc3339(), "2024-03-01T12:30:00+00:00");
    }

    #[test]
    fn unparseable_timestamp_drops_record() {
        let record = RawRecord {
            ip: "70.118.96.132".into(),
            latitude: Some(29.4),
            longitude: Some(-98.5),
            size: None,
            timestamp: RawTimestamp::Text("yesterday-ish".into()),
        };
        assert!(record.into_event().is_none());
    }

    #[test]
    fn out_of_range_coordinates_are_clamped() {
        let now = Utc::now();
        let event = TrafficEvent::new("1.2.3.4", 123.0, -999.0, now);
        assert_eq!(event.latitude, 90.0);
        assert_eq!(event.longitude, -180.0);

        let event = TrafficEvent::new("1.2.3.4", f64::NAN, f64::INFINITY, now);
        assert_eq!(event.latitude, 0.0);
        assert_eq!(event.longitude, 0.0);
    }

    #[test]
    fn location_key_format() {
        assert_eq!(Location::new("Montreal", "Canada").key(), "Montreal, Canada");
        assert_eq!(Location::unknown().key(), "Unknown, Unknown");
    }
}
