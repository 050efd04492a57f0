//! IP address to city/country resolution
//!
//! Two backends: the ip-api.com JSON service and an offline MaxMind GeoLite2
//! City database. Both sit behind a small bounded cache.

use super::Location;
use crate::config::{GeoProvider, SourceConfig};
use crate::error::GeoLookupError;
use maxminddb::{geoip2, Reader};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, warn};

pub trait GeoResolver: Send + Sync {
    fn resolve(&self, ip: &str) -> Result<Location, GeoLookupError>;
}

// ============================================================================
// ip-api.com
// ============================================================================

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    city: Option<String>,
    country: Option<String>,
    message: Option<String>,
}

impl IpApiResponse {
    fn into_location(self, ip: &str) -> Result<Location, GeoLookupError> {
        if self.status != "success" {
            return Err(GeoLookupError::Failed {
                ip: ip.to_string(),
                message: self.message.unwrap_or(self.status),
            });
        }
        Ok(Location::new(
            non_empty(self.city),
            non_empty(self.country),
        ))
    }
}

fn non_empty(value: Option<String>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| super::UNKNOWN.to_string())
}

/// Lookups against `http://ip-api.com/json/{ip}`
///
/// The free tier only supports HTTP; the data is non-sensitive and only
/// used to label markers.
pub struct IpApiResolver {
    agent: ureq::Agent,
    base_url: String,
}

impl IpApiResolver {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl GeoResolver for IpApiResolver {
    fn resolve(&self, ip: &str) -> Result<Location, GeoLookupError> {
        let url = format!("{}/{}", self.base_url, ip);
        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|err| GeoLookupError::from_ureq(ip, err))?;
        let body: IpApiResponse = response.into_json()?;
        body.into_location(ip)
    }
}

// ============================================================================
// MaxMind GeoLite2
// ============================================================================

pub struct MaxMindResolver {
    reader: Reader<Vec<u8>>,
}

impl MaxMindResolver {
    pub fn open(path: &Path) -> Result<Self, GeoLookupError> {
        let reader = Reader::open_readfile(path)
            .map_err(|err| GeoLookupError::Database(err.to_string()))?;
        Ok(Self { reader })
    }

    /// Explicit path first, then the usual install locations
    pub fn find_database(explicit_path: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit_path {
            if path.exists() {
                return Some(path.to_path_buf());
            }
        }

        let candidates = [
            dirs::config_dir().map(|p| p.join("trafficmap/GeoLite2-City.mmdb")),
            Some(PathBuf::from("/usr/share/GeoIP/GeoLite2-City.mmdb")),
            Some(PathBuf::from("/var/lib/GeoIP/GeoLite2-City.mmdb")),
            Some(PathBuf::from("./GeoLite2-City.mmdb")),
        ];

        candidates.into_iter().flatten().find(|p| p.exists())
    }
}

impl GeoResolver for MaxMindResolver {
    fn resolve(&self, ip: &str) -> Result<Location, GeoLookupError> {
        let addr: IpAddr = ip
            .parse()
            .map_err(|_| GeoLookupError::InvalidAddress(ip.to_string()))?;
        let record: geoip2::City = self
            .reader
            .lookup(addr)
            .map_err(|err| GeoLookupError::Database(err.to_string()))?;

        let city = record
            .city
            .and_then(|c| c.names)
            .and_then(|names| names.get("en").map(|s| s.to_string()));
        let country = record
            .country
            .and_then(|c| c.names)
            .and_then(|names| names.get("en").map(|s| s.to_string()));

        Ok(Location::new(non_empty(city), non_empty(country)))
    }
}

// ============================================================================
// No-op
// ============================================================================

pub struct NullResolver;

impl GeoResolver for NullResolver {
    fn resolve(&self, _ip: &str) -> Result<Location, GeoLookupError> {
        Ok(Location::unknown())
    }
}

// ============================================================================
// Cache
// ============================================================================

/// Bounded address -> location cache. Failed lookups are not cached so the
/// next refresh cycle retries them.
pub struct LocationCache {
    entries: HashMap<String, Location>,
    max_size: usize,
}

impl LocationCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(max_size.min(4096)),
            max_size: max_size.max(1),
        }
    }

    pub fn get(&self, ip: &str) -> Option<&Location> {
        self.entries.get(ip)
    }

    pub fn insert(&mut self, ip: &str, location: Location) {
        // Evict half the cache if at capacity
        if self.entries.len() >= self.max_size && !self.entries.contains_key(ip) {
            let to_remove: Vec<_> = self
                .entries
                .keys()
                .take((self.max_size / 2).max(1))
                .cloned()
                .collect();
            for key in to_remove {
                self.entries.remove(&key);
            }
        }
        self.entries.insert(ip.to_string(), location);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

pub struct CachedResolver<R> {
    inner: R,
    cache: Mutex<LocationCache>,
}

impl<R: GeoResolver> CachedResolver<R> {
    pub fn new(inner: R, max_size: usize) -> Self {
        Self {
            inner,
            cache: Mutex::new(LocationCache::new(max_size)),
        }
    }
}

impl<R: GeoResolver> GeoResolver for CachedResolver<R> {
    fn resolve(&self, ip: &str) -> Result<Location, GeoLookupError> {
        if let Ok(cache) = self.cache.lock() {
            if let Some(location) = cache.get(ip) {
                return Ok(location.clone());
            }
        }

        let location = self.inner.resolve(ip)?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(ip, location.clone());
        }
        Ok(location)
    }
}

/// Pick the resolver for a source configuration. A missing GeoLite2
/// database falls back to ip-api.
pub fn build_resolver(config: &SourceConfig) -> Box<dyn GeoResolver> {
    match config.geo_provider {
        GeoProvider::None => Box::new(NullResolver),
        GeoProvider::MaxMind => {
            let opened = MaxMindResolver::find_database(config.geoip_db.as_deref())
                .map(|path| (MaxMindResolver::open(&path), path));
            match opened {
                Some((Ok(resolver), path)) => {
                    info!(path = %path.display(), "using GeoLite2 database");
                    Box::new(CachedResolver::new(resolver, config.geo_cache_size))
                }
                Some((Err(err), path)) => {
                    warn!(path = %path.display(), %err, "could not open GeoLite2 database, using ip-api");
                    ip_api(config)
                }
                None => {
                    warn!("no GeoLite2 database found, using ip-api");
                    ip_api(config)
                }
            }
        }
        GeoProvider::IpApi => ip_api(config),
    }
}

fn ip_api(config: &SourceConfig) -> Box<dyn GeoResolver> {
    let resolver = IpApiResolver::new(&config.geo_base_url, config.timeout);
    Box::new(CachedResolver::new(resolver, config.geo_cache_size))
}
