use std::io;
use thiserror::Error;

pub type Result<T = ()> = std::result::Result<T, Error>;

/// A refresh cycle could not obtain the traffic batch.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("backend returned HTTP {status}")]
    Status { status: u16 },
    #[error("transport error: {0}")]
    Transport(Box<ureq::Transport>),
    #[error("failed to read traffic batch: {0}")]
    Body(#[from] io::Error),
    #[error("malformed traffic batch: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<ureq::Error> for NetworkError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, _) => NetworkError::Status { status },
            ureq::Error::Transport(transport) => NetworkError::Transport(Box::new(transport)),
        }
    }
}

/// A single address could not be resolved. Never surfaced past enrichment.
#[derive(Debug, Error)]
pub enum GeoLookupError {
    #[error("lookup for {ip} failed: {message}")]
    Failed { ip: String, message: String },
    #[error("lookup for {ip} returned HTTP {status}")]
    Status { ip: String, status: u16 },
    #[error("lookup transport error: {0}")]
    Transport(Box<ureq::Transport>),
    #[error("malformed lookup response: {0}")]
    Body(#[from] io::Error),
    #[error("invalid address {0}")]
    InvalidAddress(String),
    #[error("geoip database error: {0}")]
    Database(String),
}

impl GeoLookupError {
    pub fn from_ureq(ip: &str, err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, _) => GeoLookupError::Status {
                ip: ip.to_string(),
                status,
            },
            ureq::Error::Transport(transport) => GeoLookupError::Transport(Box::new(transport)),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid settings file: {0}")]
    Settings(#[from] toml::de::Error),
    #[error("{0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_mentions_code() {
        let err = NetworkError::Status { status: 503 };
        assert_eq!(err.to_string(), "backend returned HTTP 503");
    }

    #[test]
    fn network_error_wraps_transparently() {
        let err: Error = NetworkError::Status { status: 404 }.into();
        assert_eq!(err.to_string(), "backend returned HTTP 404");
    }

    #[test]
    fn geo_failure_names_address() {
        let err = GeoLookupError::Failed {
            ip: "0.0.0.0".into(),
            message: "reserved range".into(),
        };
        assert!(err.to_string().contains("0.0.0.0"));
        assert!(err.to_string().contains("reserved range"));
    }
}
