//! The server's handle on one connected peer.
//!
//! A [`Peer`] is what services see of a connection. It is cheap to clone
//! (an `Arc` inside) and can be held by any number of services at once.
//! Sending never blocks: frames go into an unbounded queue drained by the
//! connection's writer task, so a slow socket cannot stall a service.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use meshpath_protocol::{DEFAULT_MAX_FRAME_LEN, Message};
use meshpath_transport::ConnectionId;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::SessionError;

/// An instruction for a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Write this already-encoded frame.
    Frame(Vec<u8>),
    /// Flush what was queued before, then close the socket.
    Close,
}

/// A cloneable handle on one connection.
#[derive(Debug, Clone)]
pub struct Peer {
    inner: Arc<PeerInner>,
}

#[derive(Debug)]
struct PeerInner {
    id: ConnectionId,
    remote_addr: Option<SocketAddr>,
    identity: OnceLock<String>,
    last_activity: Mutex<Instant>,
    outbound: mpsc::UnboundedSender<Outbound>,
    closed: AtomicBool,
}

impl Peer {
    /// Creates a peer and the receiving end of its outbound queue.
    ///
    /// The receiver belongs to whoever writes to the socket.
    pub fn new(
        id: ConnectionId,
        remote_addr: Option<SocketAddr>,
    ) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let peer = Self {
            inner: Arc::new(PeerInner {
                id,
                remote_addr,
                identity: OnceLock::new(),
                last_activity: Mutex::new(Instant::now()),
                outbound: tx,
                closed: AtomicBool::new(false),
            }),
        };
        (peer, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.inner.remote_addr
    }

    /// Encodes and queues a message.
    pub fn send(&self, msg: &Message) -> Result<(), SessionError> {
        let frame = msg.to_bytes()?;
        self.send_frame(frame)
    }

    /// Queues a frame that is already encoded. Used by broadcasts, which
    /// encode once for every recipient.
    ///
    /// Frames longer than [`DEFAULT_MAX_FRAME_LEN`] are refused: the
    /// client's framer would reject them and drop the connection.
    pub fn send_frame(&self, frame: Vec<u8>) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed(self.id()));
        }
        check_frame_len(&frame)?;
        self.inner
            .outbound
            .send(Outbound::Frame(frame))
            .map_err(|_| SessionError::Closed(self.id()))
    }

    /// Asks the writer to close the connection after flushing what was
    /// already queued. Later sends fail with [`SessionError::Closed`].
    ///
    /// Closing twice is a no-op.
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!(conn_id = %self.id(), "closing connection");
            // The writer may already be gone; then the socket is too.
            let _ = self.inner.outbound.send(Outbound::Close);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Records that a frame just arrived from this peer.
    pub fn touch(&self) {
        *self
            .inner
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    /// Time since the last frame arrived.
    pub fn idle_for(&self) -> Duration {
        self.inner
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    /// Latches the sender identity the first time a non-empty one shows
    /// up. Returns `true` if this call set it.
    pub fn latch_identity(&self, sender: &str) -> bool {
        if sender.is_empty() {
            return false;
        }
        self.inner.identity.set(sender.to_string()).is_ok()
    }

    /// The latched identity, if any.
    pub fn identity(&self) -> Option<&str> {
        self.inner.identity.get().map(String::as_str)
    }

    /// The identity, or the connection id when none was latched.
    pub fn display_name(&self) -> String {
        match self.identity() {
            Some(name) => name.to_string(),
            None => self.id().to_string(),
        }
    }
}

/// Fails with [`SessionError::FrameTooLarge`] if no peer could accept `frame`.
pub(crate) fn check_frame_len(frame: &[u8]) -> Result<(), SessionError> {
    if frame.len() > DEFAULT_MAX_FRAME_LEN {
        return Err(SessionError::FrameTooLarge {
            len: frame.len(),
            max: DEFAULT_MAX_FRAME_LEN,
        });
    }
    Ok(())
}

impl PartialEq for Peer {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Peer {}
