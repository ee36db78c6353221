//! The [`Service`] trait and the context services run in.

use meshpath_protocol::{Message, Value};
use meshpath_session::Peer;
use meshpath_store::Persistence;
use meshpath_transport::ConnectionId;
use tokio::time::Instant;

/// A stateful handler bound to one address (or one address namespace).
///
/// Every method runs inside the service's own actor task, one call at a
/// time, so implementations need no locking. Calls must not block: durable
/// state goes through [`ServiceContext::persistence`].
///
/// Policy violations (a move out of turn, a post from a non-member) are
/// handled by returning early. Nothing is sent back to the offender.
pub trait Service: Send + 'static {
    /// Handles one message from a connection bound to this service.
    fn handle_message(&mut self, ctx: &ServiceContext, from: &Peer, msg: Message);

    /// Called once when a connection bound to this service goes away.
    fn handle_connection_lost(&mut self, ctx: &ServiceContext, conn: ConnectionId);

    /// Storage key to restore state from when the actor starts.
    fn storage_key(&self) -> Option<String> {
        None
    }

    /// Receives the value stored under [`storage_key`](Self::storage_key),
    /// if there was one.
    fn restore(&mut self, _stored: Value) {}

    /// The next instant at which [`on_deadline`](Self::on_deadline)
    /// should run, if any.
    fn deadline(&self) -> Option<Instant> {
        None
    }

    /// Called when [`deadline`](Self::deadline) has passed.
    fn on_deadline(&mut self, _ctx: &ServiceContext) {}

    /// Returns `true` once the service has concluded for good. A finished
    /// service at a restartable address is replaced on next lookup.
    fn is_finished(&self) -> bool {
        false
    }
}

/// What a service knows about its surroundings.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    address: String,
    persistence: Persistence,
}

impl ServiceContext {
    pub fn new(address: impl Into<String>, persistence: Persistence) -> Self {
        Self {
            address: address.into(),
            persistence,
        }
    }

    /// The address (or namespace) this instance was created for.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn persistence(&self) -> &Persistence {
        &self.persistence
    }

    /// Sends a message to one peer. A peer that is already gone is only
    /// logged; its loss notification is on the way.
    pub fn send(&self, to: &Peer, msg: &Message) {
        if let Err(e) = to.send(msg) {
            tracing::debug!(
                address = %self.address,
                conn_id = %to.id(),
                error = %e,
                "dropping undeliverable message"
            );
        }
    }

    /// Builds a server message addressed to this service.
    pub fn message(&self, command: impl Into<String>, content: impl Into<Value>) -> Message {
        Message::new("", self.address.clone(), command, content)
    }
}
