//! Service actor configuration.

use std::time::Duration;

/// Settings shared by every service actor.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Mailbox capacity of each actor. A full mailbox makes the sending
    /// connection wait. Default: 64.
    pub channel_size: usize,
    /// Peers silent for longer than this are evicted. Default: 10 seconds.
    pub inactivity_timeout: Duration,
    /// How often each actor checks for idle peers. Default: 20 seconds.
    pub sweep_interval: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let session = meshpath_session::SessionConfig::default();
        Self {
            channel_size: 64,
            inactivity_timeout: session.inactivity_timeout,
            sweep_interval: session.sweep_interval,
        }
    }
}
