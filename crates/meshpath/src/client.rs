//! The client end of a meshpath connection.

use std::sync::Arc;
use std::time::Duration;

use meshpath_protocol::{Framer, Inbound, Message, Value};
use meshpath_session::SessionConfig;
use meshpath_transport::{Connection, TcpConnection, TcpTransport};
use tokio::task::JoinHandle;

use crate::MeshpathError;

/// A connection to a meshpath server.
///
/// Every message it sends carries `identity` as its sender. Unless
/// disabled, a background task sends `KEEP_ALIVE` on a fixed period so
/// the server does not evict an idle client.
///
/// ```rust,no_run
/// use meshpath::prelude::*;
///
/// # async fn chat() -> Result<(), MeshpathError> {
/// let mut client = Client::connect("127.0.0.1:8883", "alice").await?;
/// client.send("/chat/lobby", "ENTER", "").await?;
/// while let Some(msg) = client.recv().await? {
///     println!("{} {:?}", msg.command, msg.content);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Client {
    conn: Arc<TcpConnection>,
    identity: String,
    framer: Framer,
    keep_alive: Option<JoinHandle<()>>,
}

impl Client {
    /// Connects with the default keep-alive period.
    pub async fn connect(addr: &str, identity: impl Into<String>) -> Result<Self, MeshpathError> {
        let period = SessionConfig::default().keep_alive_interval;
        Self::connect_with(addr, identity, Some(period)).await
    }

    /// Connects, sending keep-alives every `keep_alive` (or never).
    pub async fn connect_with(
        addr: &str,
        identity: impl Into<String>,
        keep_alive: Option<Duration>,
    ) -> Result<Self, MeshpathError> {
        let identity = identity.into();
        let conn = Arc::new(TcpTransport::connect(addr).await?);

        let keep_alive = match keep_alive {
            Some(period) => {
                let frame = Message::keep_alive(identity.as_str()).to_bytes()?;
                Some(tokio::spawn(keep_alive_loop(Arc::clone(&conn), frame, period)))
            }
            None => None,
        };

        Ok(Self {
            conn,
            identity,
            framer: Framer::new(),
            keep_alive,
        })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Sends one message built from this client's identity.
    pub async fn send(
        &self,
        address: &str,
        command: &str,
        content: impl Into<Value>,
    ) -> Result<(), MeshpathError> {
        let msg = Message::new(self.identity.as_str(), address, command, content);
        self.send_message(&msg).await
    }

    /// Sends a fully built message as is.
    pub async fn send_message(&self, msg: &Message) -> Result<(), MeshpathError> {
        self.conn.send(&msg.to_bytes()?).await?;
        Ok(())
    }

    /// Waits for the next application message.
    ///
    /// Keep-alives and undecodable frames are skipped. `Ok(None)` means
    /// the server closed the connection.
    pub async fn recv(&mut self) -> Result<Option<Message>, MeshpathError> {
        loop {
            match self.framer.next_inbound()? {
                Some(Inbound::Message(msg)) => return Ok(Some(msg)),
                Some(Inbound::KeepAlive) => {}
                Some(Inbound::Malformed(e)) => {
                    tracing::debug!(error = %e, "malformed frame from server discarded");
                }
                None => match self.conn.recv().await? {
                    Some(chunk) => self.framer.push(&chunk),
                    None => return Ok(None),
                },
            }
        }
    }

    /// Stops keep-alives and closes the sending side.
    pub async fn close(&mut self) -> Result<(), MeshpathError> {
        if let Some(task) = self.keep_alive.take() {
            task.abort();
        }
        self.conn.close().await?;
        Ok(())
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Some(task) = self.keep_alive.take() {
            task.abort();
        }
    }
}

async fn keep_alive_loop(conn: Arc<TcpConnection>, frame: Vec<u8>, period: Duration) {
    let mut ticks = tokio::time::interval(period);
    loop {
        ticks.tick().await;
        if let Err(e) = conn.send(&frame).await {
            tracing::debug!(error = %e, "keep-alive stopped");
            return;
        }
    }
}
