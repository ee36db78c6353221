//! Helpers shared by the service tests: fake peers and a way to read
//! what a service sent them.

#![allow(dead_code)]

use std::time::Duration;

use meshpath_protocol::{Message, Value};
use meshpath_session::{Outbound, Peer};
use meshpath_transport::ConnectionId;
use tokio::sync::mpsc::UnboundedReceiver;

/// A peer plus the receiving end of its outbound queue.
pub struct TestPeer {
    pub peer: Peer,
    rx: UnboundedReceiver<Outbound>,
}

impl TestPeer {
    pub fn new(id: u64, name: &str) -> Self {
        let (peer, rx) = Peer::new(ConnectionId::new(id), None);
        peer.latch_identity(name);
        Self { peer, rx }
    }

    pub fn id(&self) -> ConnectionId {
        self.peer.id()
    }

    /// Next message sent to this peer. Panics after five seconds.
    pub async fn recv(&mut self) -> Message {
        loop {
            let item = tokio::time::timeout(Duration::from_secs(5), self.rx.recv())
                .await
                .expect("timed out waiting for a message")
                .expect("outbound queue closed");
            if let Outbound::Frame(bytes) = item {
                return Message::from_bytes(&bytes).expect("service sent a valid frame");
            }
        }
    }

    /// Next message, asserting its command.
    pub async fn expect(&mut self, command: &str) -> Message {
        let msg = self.recv().await;
        assert_eq!(msg.command, command, "unexpected message: {msg:?}");
        msg
    }

    /// Everything queued right now, without waiting.
    pub fn drain(&mut self) -> Vec<Outbound> {
        let mut out = Vec::new();
        while let Ok(item) = self.rx.try_recv() {
            out.push(item);
        }
        out
    }

    /// Whether a close instruction is queued (consumes the queue).
    pub fn was_closed(&mut self) -> bool {
        self.drain().contains(&Outbound::Close)
    }
}

pub fn msg(address: &str, command: &str, content: impl Into<Value>) -> Message {
    Message::new("", address, command, content)
}
