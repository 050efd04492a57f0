//! Tracing setup
//!
//! The live view owns the terminal, so its diagnostics go to a file and only
//! when `--debug` is given. One-shot commands log to stderr.

use std::fs::{self, File};
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub enum LogTarget {
    Off,
    Stderr,
    File(PathBuf),
}

impl LogTarget {
    pub fn for_live(debug: bool) -> Self {
        if debug {
            LogTarget::File(default_log_path())
        } else {
            LogTarget::Off
        }
    }
}

pub fn default_log_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("trafficmap")
        .join("debug.log")
}

fn filter(debug: bool) -> EnvFilter {
    let default = if debug { "trafficmap=debug" } else { "trafficmap=info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

pub fn init(target: LogTarget, debug: bool) -> io::Result<()> {
    match target {
        LogTarget::Off => Ok(()),
        LogTarget::Stderr => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter(debug))
                .with_writer(io::stderr)
                .try_init();
            Ok(())
        }
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = File::create(&path)?;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter(debug))
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
            Ok(())
        }
    }
}
