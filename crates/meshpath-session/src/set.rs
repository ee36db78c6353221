//! A group of peers a service talks to together.

use std::collections::BTreeMap;
use std::time::Duration;

use meshpath_protocol::Message;
use meshpath_transport::ConnectionId;

use crate::peer::check_frame_len;
use crate::{Peer, SessionError};

/// The peers attached to one service instance, keyed by connection.
///
/// Iteration (and therefore broadcast order) follows connection id, which
/// is the order connections were accepted.
#[derive(Debug, Default)]
pub struct PeerSet {
    peers: BTreeMap<ConnectionId, Peer>,
}

impl PeerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a peer. Returns `false` (and changes nothing) if a peer with
    /// the same connection id is already present.
    pub fn insert(&mut self, peer: Peer) -> bool {
        if self.peers.contains_key(&peer.id()) {
            return false;
        }
        self.peers.insert(peer.id(), peer);
        true
    }

    /// Removes a peer. Removing an absent peer returns `None`.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Peer> {
        self.peers.remove(&id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.peers.contains_key(&id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Peer> {
        self.peers.get(&id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }

    /// Sends one message to every peer. The message is encoded once.
    ///
    /// Returns how many peers it was queued for; peers that are already
    /// closing are skipped. A frame too long for any peer is an error.
    pub fn broadcast(&self, msg: &Message) -> Result<usize, SessionError> {
        self.broadcast_except(msg, None)
    }

    /// Like [`broadcast`](Self::broadcast), skipping one connection.
    pub fn broadcast_except(
        &self,
        msg: &Message,
        except: Option<ConnectionId>,
    ) -> Result<usize, SessionError> {
        let frame = msg.to_bytes()?;
        check_frame_len(&frame)?;
        let delivered = self
            .peers
            .values()
            .filter(|p| Some(p.id()) != except)
            .filter(|p| p.send_frame(frame.clone()).is_ok())
            .count();
        Ok(delivered)
    }

    /// Closes every peer idle for longer than `timeout` and returns them.
    ///
    /// Closed peers stay in the set. Their connection handler reports the
    /// loss once the socket is down, and the owner removes them then, the
    /// same way as for any other disconnect.
    pub fn evict_idle(&self, timeout: Duration) -> Vec<Peer> {
        self.peers
            .values()
            .filter(|p| !p.is_closed() && p.idle_for() > timeout)
            .inspect(|p| {
                tracing::info!(conn_id = %p.id(), idle = ?p.idle_for(), "evicting idle connection");
                p.close();
            })
            .cloned()
            .collect()
    }
}
