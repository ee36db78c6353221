//! Chat rooms: one [`ChatService`] per `/chat/<room>` address.
//!
//! A room keeps its members and an ordered history. History entries are
//! mappings `{from, text, time}` and the whole list is persisted under the
//! room's address after every post, then restored when the room is next
//! created.
//!
//! Only the newest [`DEFAULT_HISTORY_LIMIT`] entries are kept, and a
//! newcomer's `APPEND` carries as many of the newest ones as fit in one
//! frame.

use std::time::{SystemTime, UNIX_EPOCH};

use meshpath_protocol::{DEFAULT_MAX_FRAME_LEN, Message, Value, serial};
use meshpath_service::{Service, ServiceContext};
use meshpath_session::{Peer, PeerSet};
use meshpath_transport::ConnectionId;

/// Entries a room remembers before dropping the oldest.
pub const DEFAULT_HISTORY_LIMIT: usize = 500;

pub struct ChatService {
    address: String,
    members: PeerSet,
    history: Vec<Value>,
    history_limit: usize,
}

impl ChatService {
    pub fn new(address: impl Into<String>) -> Self {
        Self::with_history_limit(address, DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_history_limit(address: impl Into<String>, history_limit: usize) -> Self {
        Self {
            address: address.into(),
            members: PeerSet::new(),
            history: Vec::new(),
            history_limit,
        }
    }

    pub fn history(&self) -> &[Value] {
        &self.history
    }

    fn trim_history(&mut self) {
        let excess = self.history.len().saturating_sub(self.history_limit);
        self.history.drain(..excess);
    }

    /// The `APPEND` for a newcomer: the newest entries whose frame stays
    /// within [`DEFAULT_MAX_FRAME_LEN`].
    fn backlog(&self, ctx: &ServiceContext) -> Message {
        let empty = ctx.message("APPEND", Value::List(Vec::new()));
        // Each entry grows the frame by exactly its own encoding minus the
        // outer length prefix.
        let mut budget = match empty.to_bytes() {
            Ok(frame) => DEFAULT_MAX_FRAME_LEN.saturating_sub(frame.len()),
            Err(_) => 0,
        };
        let mut keep = 0;
        for entry in self.history.iter().rev() {
            let size = match serial::encode(entry) {
                Ok(bytes) => bytes.len() - serial::LENGTH_PREFIX_SIZE,
                Err(_) => break,
            };
            if size > budget {
                break;
            }
            budget -= size;
            keep += 1;
        }
        if keep < self.history.len() {
            tracing::debug!(address = %ctx.address(), sent = keep, stored = self.history.len(), "history truncated for newcomer");
        }
        let tail = self.history[self.history.len() - keep..].to_vec();
        ctx.message("APPEND", Value::List(tail))
    }

    fn notify(&self, ctx: &ServiceContext, text: String) {
        let msg = ctx.message("NOTIFICATION", text);
        if let Err(e) = self.members.broadcast(&msg) {
            tracing::warn!(address = %ctx.address(), error = %e, "notification not sent");
        }
    }

    fn enter(&mut self, ctx: &ServiceContext, from: &Peer) {
        if self.members.contains(from.id()) {
            return;
        }
        let name = from.display_name();
        self.notify(ctx, format!("A new guest is here: {name}"));

        ctx.send(from, &self.backlog(ctx));
        let present: Vec<String> = self.members.iter().map(Peer::display_name).collect();
        let greeting = if present.is_empty() {
            format!("No other guest currently connected.\nYou are guest: {name}")
        } else {
            format!(
                "Currently connected guests: {}\nYou are guest: {name}",
                present.join(" ")
            )
        };
        ctx.send(from, &ctx.message("NOTIFICATION", greeting));

        self.members.insert(from.clone());
        tracing::debug!(address = %ctx.address(), %name, members = self.members.len(), "guest entered");
    }

    fn post(&mut self, ctx: &ServiceContext, from: &Peer, msg: Message) {
        let entry = Value::map([
            ("from", Value::from(from.display_name())),
            ("text", msg.content),
            ("time", Value::from(unix_time())),
        ]);
        let out = ctx.message(msg.command, entry.clone());
        if let Err(e) = self.members.broadcast(&out) {
            tracing::warn!(address = %ctx.address(), error = %e, "post not broadcast");
            return;
        }
        self.history.push(entry);
        self.trim_history();
        ctx.persistence()
            .save(ctx.address(), Value::List(self.history.clone()));
    }
}

fn unix_time() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl Service for ChatService {
    fn handle_message(&mut self, ctx: &ServiceContext, from: &Peer, msg: Message) {
        if msg.command == "ENTER" {
            self.enter(ctx, from);
            return;
        }
        if !self.members.contains(from.id()) {
            tracing::debug!(address = %ctx.address(), conn_id = %from.id(), "message from non-member ignored");
            return;
        }
        if msg.command == "IS_TYPING" {
            let typing = ctx.message("IS_TYPING", from.display_name());
            let _ = self.members.broadcast(&typing);
            return;
        }
        self.post(ctx, from, msg);
    }

    fn handle_connection_lost(&mut self, ctx: &ServiceContext, conn: ConnectionId) {
        let Some(gone) = self.members.remove(conn) else {
            return;
        };
        self.notify(ctx, format!("Chat left by {}", gone.display_name()));
    }

    fn storage_key(&self) -> Option<String> {
        Some(self.address.clone())
    }

    fn restore(&mut self, stored: Value) {
        match stored {
            Value::List(entries) => {
                self.history = entries;
                self.trim_history();
            }
            other => {
                tracing::warn!(address = %self.address, kind = other.kind(), "ignoring stored chat history");
            }
        }
    }
}
