//! Per-connection handler: framing, routing, and lifecycle.
//!
//! Each accepted connection gets two Tokio tasks:
//!   1. The reader (this handler) feeds socket bytes to a [`Framer`],
//!      binds the connection to a service on the first message, and
//!      forwards every later message to that service.
//!   2. The writer drains the connection's outbound queue, so services
//!      never wait on a slow socket.
//!
//! When either side ends, the bound service is told the connection is
//! gone. Services evict their own idle peers; an unbound connection that
//! stays silent past the inactivity timeout is closed here.

use std::sync::Arc;

use meshpath_protocol::{Framer, Inbound, Message};
use meshpath_service::ServiceHandle;
use meshpath_session::{Outbound, Peer};
use meshpath_transport::{Connection, TcpConnection};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

use crate::MeshpathError;
use crate::server::ServerState;

/// Which service, if any, this connection talks to.
///
/// A connection starts `Unbound` and becomes `Bound` exactly once, on
/// its first routable message.
enum Binding {
    Unbound,
    Bound(ServiceHandle),
}

/// What the reader should do after draining the framer.
enum Flow {
    Continue,
    Close,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: TcpConnection,
    state: Arc<ServerState>,
) -> Result<(), MeshpathError> {
    let conn = Arc::new(conn);
    let (peer, outbound) = Peer::new(conn.id(), Some(conn.peer_addr()));
    let conn_id = peer.id();
    tracing::debug!(%conn_id, remote = %conn.peer_addr(), "handling new connection");

    let mut writer = tokio::spawn(write_loop(Arc::clone(&conn), outbound));
    let mut writer_done = false;
    let mut framer = Framer::with_max_frame_len(state.config.max_frame_len);
    let mut binding = Binding::Unbound;
    let idle_limit = state.config.inactivity_timeout();
    let unbound_check = tokio::time::sleep(idle_limit);
    tokio::pin!(unbound_check);

    let result = loop {
        tokio::select! {
            chunk = conn.recv() => match chunk {
                Ok(Some(bytes)) => {
                    framer.push(&bytes);
                    match drain(&mut framer, &peer, &mut binding, &state).await {
                        Ok(Flow::Continue) => {}
                        Ok(Flow::Close) => break Ok(()),
                        Err(e) => break Err(e),
                    }
                }
                Ok(None) => {
                    tracing::debug!(%conn_id, "connection closed by peer");
                    break Ok(());
                }
                Err(e) => break Err(e.into()),
            },
            _ = &mut unbound_check, if matches!(binding, Binding::Unbound) => {
                let idle = peer.idle_for();
                if idle >= idle_limit {
                    tracing::info!(%conn_id, ?idle, "unbound connection idle, closing");
                    break Ok(());
                }
                unbound_check.as_mut().reset(Instant::now() + (idle_limit - idle));
            }
            _ = &mut writer => {
                // Closed by a service (eviction, game over) or a failed send.
                writer_done = true;
                break Ok(());
            }
        }
    };

    if let Binding::Bound(handle) = &binding {
        if let Err(e) = handle.connection_lost(conn_id).await {
            tracing::debug!(%conn_id, error = %e, "loss not reported");
        }
    }

    peer.close();
    if !writer_done {
        let _ = writer.await;
    }
    tracing::debug!(%conn_id, name = %peer.display_name(), "connection finished");
    result
}

/// Handles every complete frame currently buffered.
async fn drain(
    framer: &mut Framer,
    peer: &Peer,
    binding: &mut Binding,
    state: &ServerState,
) -> Result<Flow, MeshpathError> {
    loop {
        let inbound = match framer.next_inbound() {
            Ok(Some(inbound)) => inbound,
            Ok(None) => return Ok(Flow::Continue),
            Err(e) => {
                tracing::warn!(conn_id = %peer.id(), error = %e, "protocol violation, closing");
                return Err(e.into());
            }
        };
        peer.touch();

        match inbound {
            Inbound::KeepAlive => {}
            Inbound::Malformed(e) => {
                tracing::debug!(conn_id = %peer.id(), error = %e, "malformed frame discarded");
            }
            Inbound::Message(msg) => {
                peer.latch_identity(&msg.sender);
                if let Flow::Close = dispatch(peer, binding, state, msg).await {
                    return Ok(Flow::Close);
                }
            }
        }
    }
}

/// Sends `msg` to the bound service, binding on first use.
async fn dispatch(peer: &Peer, binding: &mut Binding, state: &ServerState, msg: Message) -> Flow {
    let handle = match binding {
        Binding::Bound(handle) => handle.clone(),
        Binding::Unbound => match state.router.resolve(&msg.address).await {
            Some(handle) => {
                tracing::debug!(conn_id = %peer.id(), address = %handle.address(), "connection bound");
                *binding = Binding::Bound(handle.clone());
                handle
            }
            None => {
                tracing::info!(conn_id = %peer.id(), address = %msg.address, "no service at address, closing");
                return Flow::Close;
            }
        },
    };

    match handle.dispatch(peer.clone(), msg).await {
        Ok(()) => Flow::Continue,
        Err(e) => {
            tracing::debug!(conn_id = %peer.id(), error = %e, "bound service is gone, closing");
            Flow::Close
        }
    }
}

/// Writes queued frames until told to close or the socket fails.
async fn write_loop(conn: Arc<TcpConnection>, mut outbound: UnboundedReceiver<Outbound>) {
    while let Some(item) = outbound.recv().await {
        match item {
            Outbound::Frame(bytes) => {
                if let Err(e) = conn.send(&bytes).await {
                    tracing::debug!(conn_id = %conn.id(), error = %e, "send failed");
                    break;
                }
            }
            Outbound::Close => break,
        }
    }
    let _ = conn.close().await;
}
