//! Data source adapter: fetch a batch of raw records and enrich each one
//! with its location.

use super::geo::{build_resolver, GeoResolver};
use super::{decode_batch, Location, RawRecord, TrafficEvent};
use crate::config::{SourceConfig, SourceKind};
use crate::error::NetworkError;
use chrono::{Duration as ChronoDuration, Utc};
use rand::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

pub trait TrafficSource: Send + Sync {
    /// Fetch and enrich one batch. Only a failure of the batch itself is an
    /// error; a failed location lookup degrades that record.
    fn fetch_batch(&self) -> Result<Vec<TrafficEvent>, NetworkError>;

    /// Human readable origin, for the status line and logs
    fn describe(&self) -> String;
}

/// Convert raw records to events and resolve every distinct address.
///
/// Lookups fan out over at most `concurrency` scoped threads and are joined
/// before returning. Output order follows input order.
pub fn enrich(records: Vec<RawRecord>, resolver: &dyn GeoResolver, concurrency: usize) -> Vec<TrafficEvent> {
    let events: Vec<TrafficEvent> = records.into_iter().filter_map(RawRecord::into_event).collect();

    let mut unique: Vec<&str> = Vec::new();
    let mut seen = HashSet::new();
    for event in &events {
        if seen.insert(event.source_address.as_str()) {
            unique.push(event.source_address.as_str());
        }
    }

    let workers = concurrency.max(1);
    let chunk_size = unique.len().div_ceil(workers).max(1);

    let resolved: HashMap<String, Location> = thread::scope(|scope| {
        let handles: Vec<_> = unique
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|ip| (ip.to_string(), resolve_or_unknown(resolver, ip)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap_or_default())
            .collect()
    });

    events
        .into_iter()
        .map(|event| {
            let location = resolved.get(&event.source_address).cloned().unwrap_or_default();
            event.with_location(location)
        })
        .collect()
}

fn resolve_or_unknown(resolver: &dyn GeoResolver, ip: &str) -> Location {
    match resolver.resolve(ip) {
        Ok(location) => location,
        Err(err) => {
            debug!(%ip, %err, "geolocation failed, using default location");
            Location::unknown()
        }
    }
}

// ============================================================================
// HTTP backend
// ============================================================================

pub struct HttpSource {
    agent: ureq::Agent,
    endpoint: String,
    resolver: Box<dyn GeoResolver>,
    concurrency: usize,
}

impl HttpSource {
    pub fn new(endpoint: &str, timeout: Duration, resolver: Box<dyn GeoResolver>, concurrency: usize) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            endpoint: endpoint.to_string(),
            resolver,
            concurrency,
        }
    }
}

impl TrafficSource for HttpSource {
    fn fetch_batch(&self) -> Result<Vec<TrafficEvent>, NetworkError> {
        let response = self.agent.get(&self.endpoint).call()?;
        let body = response.into_string()?;
        let records = decode_batch(&body)?;
        debug!(endpoint = %self.endpoint, records = records.len(), "fetched traffic batch");
        Ok(enrich(records, self.resolver.as_ref(), self.concurrency))
    }

    fn describe(&self) -> String {
        self.endpoint.clone()
    }
}

// ============================================================================
// JSON file replay
// ============================================================================

/// Re-reads a file in the backend's wire format on every refresh
pub struct FileSource {
    path: PathBuf,
    resolver: Box<dyn GeoResolver>,
    concurrency: usize,
}

impl FileSource {
    pub fn new(path: PathBuf, resolver: Box<dyn GeoResolver>, concurrency: usize) -> Self {
        Self {
            path,
            resolver,
            concurrency,
        }
    }
}

impl TrafficSource for FileSource {
    fn fetch_batch(&self) -> Result<Vec<TrafficEvent>, NetworkError> {
        let body = fs::read_to_string(&self.path)?;
        let records = decode_batch(&body)?;
        Ok(enrich(records, self.resolver.as_ref(), self.concurrency))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

// ============================================================================
// Synthetic traffic
// ============================================================================

struct MockCity {
    name: &'static str,
    country: &'static str,
    lat: f64,
    lon: f64,
    ip_prefix: &'static str,
}

const MOCK_CITIES: &[MockCity] = &[
    MockCity { name: "Bakersfield", country: "United States", lat: 35.37, lon: -119.01, ip_prefix: "173.198.105" },
    MockCity { name: "Cheboksary", country: "Russia", lat: 56.11, lon: 47.48, ip_prefix: "5.165.146" },
    MockCity { name: "San Antonio", country: "United States", lat: 29.42, lon: -98.49, ip_prefix: "70.118.96" },
    MockCity { name: "New York", country: "United States", lat: 40.7, lon: -74.0, ip_prefix: "23.45.12" },
    MockCity { name: "Montreal", country: "Canada", lat: 45.5, lon: -73.6, ip_prefix: "24.37.88" },
    MockCity { name: "Mexico City", country: "Mexico", lat: 19.4, lon: -99.1, ip_prefix: "187.190.4" },
    MockCity { name: "Sao Paulo", country: "Brazil", lat: -23.5, lon: -46.6, ip_prefix: "177.32.19" },
    MockCity { name: "Buenos Aires", country: "Argentina", lat: -34.6, lon: -58.4, ip_prefix: "181.46.130" },
    MockCity { name: "London", country: "United Kingdom", lat: 51.5, lon: -0.1, ip_prefix: "81.2.69" },
    MockCity { name: "Paris", country: "France", lat: 48.9, lon: 2.3, ip_prefix: "90.63.200" },
    MockCity { name: "Berlin", country: "Germany", lat: 52.5, lon: 13.4, ip_prefix: "91.64.7" },
    MockCity { name: "Stockholm", country: "Sweden", lat: 59.3, lon: 18.1, ip_prefix: "78.70.41" },
    MockCity { name: "Cairo", country: "Egypt", lat: 30.0, lon: 31.2, ip_prefix: "41.33.150" },
    MockCity { name: "Lagos", country: "Nigeria", lat: 6.5, lon: 3.4, ip_prefix: "105.112.22" },
    MockCity { name: "Nairobi", country: "Kenya", lat: -1.3, lon: 36.8, ip_prefix: "41.90.64" },
    MockCity { name: "Dubai", country: "United Arab Emirates", lat: 25.3, lon: 55.3, ip_prefix: "94.200.35" },
    MockCity { name: "Mumbai", country: "India", lat: 19.1, lon: 72.9, ip_prefix: "49.36.81" },
    MockCity { name: "Singapore", country: "Singapore", lat: 1.4, lon: 103.8, ip_prefix: "116.88.3" },
    MockCity { name: "Shanghai", country: "China", lat: 31.2, lon: 121.5, ip_prefix: "101.80.12" },
    MockCity { name: "Seoul", country: "South Korea", lat: 37.6, lon: 127.0, ip_prefix: "121.134.9" },
    MockCity { name: "Tokyo", country: "Japan", lat: 35.7, lon: 139.7, ip_prefix: "126.77.140" },
    MockCity { name: "Sydney", country: "Australia", lat: -33.9, lon: 151.2, ip_prefix: "101.191.20" },
    MockCity { name: "Auckland", country: "New Zealand", lat: -36.8, lon: 174.8, ip_prefix: "125.239.6" },
];

/// Random events around a fixed set of cities, timestamps spread over the
/// past year. Locations are known up front, so no lookups are made.
pub struct MockSource {
    rng: std::sync::Mutex<StdRng>,
    count: usize,
}

impl MockSource {
    pub fn new(seed: Option<u64>, count: usize) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: std::sync::Mutex::new(rng),
            count,
        }
    }

    fn generate(&self, rng: &mut StdRng) -> Vec<TrafficEvent> {
        let now = Utc::now();
        let one_year_secs = 365 * 24 * 60 * 60;

        (0..self.count)
            .map(|_| {
                let city = &MOCK_CITIES[rng.gen_range(0..MOCK_CITIES.len())];
                let ip = format!("{}.{}", city.ip_prefix, rng.gen_range(1..255));
                let timestamp = now - ChronoDuration::seconds(rng.gen_range(0..one_year_secs));
                // Slight random variation to coordinates
                let lat = city.lat + (rng.gen::<f64>() - 0.5) * 2.0;
                let lon = city.lon + (rng.gen::<f64>() - 0.5) * 2.0;
                TrafficEvent::new(ip, lat, lon, timestamp)
                    .with_size(Some(rng.gen_range(64.0..1500.0)))
                    .with_location(Location::new(city.name, city.country))
            })
            .collect()
    }
}

impl TrafficSource for MockSource {
    fn fetch_batch(&self) -> Result<Vec<TrafficEvent>, NetworkError> {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(self.generate(&mut rng))
    }

    fn describe(&self) -> String {
        format!("mock ({} events)", self.count)
    }
}

/// Build the configured source
pub fn build_source(config: &SourceConfig) -> Box<dyn TrafficSource> {
    let source: Box<dyn TrafficSource> = match &config.kind {
        SourceKind::Http { endpoint } => Box::new(HttpSource::new(
            endpoint,
            config.timeout,
            build_resolver(config),
            config.geo_concurrency,
        )),
        SourceKind::File { path } => Box::new(FileSource::new(
            path.clone(),
            build_resolver(config),
            config.geo_concurrency,
        )),
        SourceKind::Mock { seed, count } => Box::new(MockSource::new(*seed, *count)),
    };
    info!(source = %source.describe(), "traffic source ready");
    source
}
