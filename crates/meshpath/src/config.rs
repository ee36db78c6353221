//! Server configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use meshpath_protocol::DEFAULT_MAX_FRAME_LEN;
use meshpath_service::ServiceConfig;
use serde::Deserialize;

use crate::MeshpathError;

/// Everything a server needs to know at startup.
///
/// Every field has a default, so a JSON file only needs the fields it
/// changes:
///
/// ```json
/// { "bind_addr": "127.0.0.1:9000", "data_dir": "/var/lib/meshpath" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Listen address. Default: `0.0.0.0:8883`.
    pub bind_addr: String,
    /// Ceiling on a declared frame length. Larger prefixes close the
    /// connection. Default: 4 MiB.
    pub max_frame_len: usize,
    /// Silence after which a connection is evicted. Default: 10 000 ms.
    pub inactivity_timeout_ms: u64,
    /// Period of each service's idle sweep. Default: 20 000 ms.
    pub sweep_interval_ms: u64,
    /// Time a game player has for each move. Default: unlimited.
    pub move_timeout_ms: Option<u64>,
    /// Mailbox capacity of each service. Default: 64.
    pub channel_size: usize,
    /// Root directory of file storage. Without one, state lives in
    /// memory and is lost on exit.
    pub data_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let service = ServiceConfig::default();
        Self {
            bind_addr: "0.0.0.0:8883".to_string(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            inactivity_timeout_ms: millis(service.inactivity_timeout),
            sweep_interval_ms: millis(service.sweep_interval),
            move_timeout_ms: None,
            channel_size: service.channel_size,
            data_dir: None,
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl ServerConfig {
    /// Parses a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, MeshpathError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, MeshpathError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| MeshpathError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_millis(self.inactivity_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn move_timeout(&self) -> Option<Duration> {
        self.move_timeout_ms.map(Duration::from_millis)
    }

    /// The settings handed to every service actor.
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            channel_size: self.channel_size,
            inactivity_timeout: self.inactivity_timeout(),
            sweep_interval: self.sweep_interval(),
        }
    }
}
