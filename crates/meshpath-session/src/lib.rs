//! Connection-level state for meshpath.
//!
//! The transport gives us a byte pipe and the protocol gives us messages;
//! this crate is what sits between a connection and the services it
//! talks to:
//!
//! - [`Peer`]: a cloneable handle on one connection. It carries the
//!   outbound frame queue, the latched sender identity, and the
//!   last-activity clock used for inactivity eviction.
//! - [`PeerSet`]: the peers attached to one service, with broadcast and
//!   idle eviction.
//! - [`SessionConfig`]: the liveness timings shared by server and client.

mod error;
mod peer;
mod set;

pub use error::SessionError;
pub use peer::{Outbound, Peer};
pub use set::PeerSet;

use std::time::Duration;

/// Liveness timings.
///
/// The client sends a keep-alive every `keep_alive_interval`; services
/// sweep their peers every `sweep_interval` and drop any that have been
/// silent for longer than `inactivity_timeout`. The keep-alive interval
/// must stay well below the timeout.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Silence after which a connection is evicted. Default: 10 seconds.
    pub inactivity_timeout: Duration,
    /// How often each service checks for idle peers. Default: 20 seconds.
    pub sweep_interval: Duration,
    /// How often clients send `KEEP_ALIVE`. Default: 1 second.
    pub keep_alive_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(20),
            keep_alive_interval: Duration::from_secs(1),
        }
    }
}
