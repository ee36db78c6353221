//! Unified error type for the meshpath server.

use std::path::PathBuf;

use meshpath_protocol::{FrameError, ProtocolError};
use meshpath_service::ServiceError;
use meshpath_session::SessionError;
use meshpath_store::StoreError;
use meshpath_transport::TransportError;

/// Top-level error that wraps every layer's error type.
///
/// The `#[from]` attribute on each layer variant generates the `From`
/// impl, so `?` converts lower-layer errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum MeshpathError {
    /// Socket-level failure (bind, accept, send, receive).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A message could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The peer sent a length prefix that desynchronizes the stream.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The connection's outbound queue is gone.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Storage could not be opened or used.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A service actor stopped while a connection was bound to it.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The configuration file could not be read.
    #[error("cannot read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid JSON or has unknown fields.
    #[error("invalid config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// Local I/O outside the transport, such as querying the bound address.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
