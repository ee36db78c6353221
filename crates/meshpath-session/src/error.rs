//! Error types for the session layer.

use meshpath_protocol::ProtocolError;
use meshpath_transport::ConnectionId;

/// Errors that can occur while talking to a peer.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The peer's connection was closed (or is closing). Nothing more
    /// will be delivered to it.
    #[error("connection {0} is closed")]
    Closed(ConnectionId),

    /// The encoded message is longer than a receiving framer accepts.
    #[error("outgoing frame of {len} bytes exceeds the {max} byte ceiling")]
    FrameTooLarge { len: usize, max: usize },

    /// The outgoing message could not be encoded.
    #[error("failed to encode outgoing message: {0}")]
    Protocol(#[from] ProtocolError),
}
