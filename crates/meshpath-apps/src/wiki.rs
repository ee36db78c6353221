//! The wiki: one shared [`WikiService`] for every `/wiki/...` page.
//!
//! Page bodies live in storage under the page's own address. The change
//! log lives under [`CHANGE_LOG_KEY`]. Every operation runs as a single
//! persistence job, so reads, writes and log updates never interleave and
//! replies go out in the order requests arrived.

use std::time::{SystemTime, UNIX_EPOCH};

use meshpath_protocol::{Message, Value};
use meshpath_service::{Service, ServiceContext};
use meshpath_session::Peer;
use meshpath_store::Storage;
use meshpath_transport::ConnectionId;

/// Address prefix of wiki pages. Nothing outside it is a page.
pub const WIKI_PREFIX: &str = "/wiki/";

/// Storage key of the change log. `#` never appears in a page address.
pub const CHANGE_LOG_KEY: &str = "/wiki/#changes";

#[derive(Debug, Default)]
pub struct WikiService;

impl WikiService {
    pub fn new() -> Self {
        Self
    }
}

fn reply(to: &Peer, msg: Message) {
    if let Err(e) = to.send(&msg) {
        tracing::debug!(conn_id = %to.id(), error = %e, "wiki reply dropped");
    }
}

fn read_page(storage: &dyn Storage, from: &Peer, req: &Message) {
    let msg = match storage.read(&req.address) {
        Ok(Some(content)) => req.reply("READ_RESULT", content),
        Ok(None) => req.reply("NOT_EXISTING", ""),
        Err(e) => {
            tracing::warn!(page = %req.address, error = %e, "wiki read failed");
            req.reply("READ_FAILED", e.to_string())
        }
    };
    reply(from, msg);
}

fn write_page(storage: &dyn Storage, from: &Peer, author: String, req: Message) {
    if let Err(e) = storage.write(&req.address, &req.content) {
        tracing::warn!(page = %req.address, error = %e, "wiki write failed");
        reply(from, req.reply("WRITE_FAILED", e.to_string()));
        return;
    }
    reply(from, req.reply("WRITE_DONE", ""));

    let time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let change = Value::map([
        ("path", Value::from(req.address.as_str())),
        ("author", Value::from(author)),
        ("time", Value::from(time)),
    ]);
    let mut log = load_log(storage);
    log.push(change);
    if let Err(e) = storage.write(CHANGE_LOG_KEY, &Value::List(log)) {
        tracing::warn!(error = %e, "wiki change log not saved");
    }
}

fn page_history(storage: &dyn Storage, from: &Peer, req: &Message) {
    let entries: Vec<Value> = load_log(storage)
        .into_iter()
        .filter(|c| c.get("path").and_then(Value::as_str) == Some(req.address.as_str()))
        .collect();
    reply(from, req.reply("HISTORY_RESULT", Value::List(entries)));
}

fn load_log(storage: &dyn Storage) -> Vec<Value> {
    match storage.read(CHANGE_LOG_KEY) {
        Ok(Some(Value::List(entries))) => entries,
        Ok(_) => Vec::new(),
        Err(e) => {
            tracing::warn!(error = %e, "wiki change log unreadable");
            Vec::new()
        }
    }
}

impl Service for WikiService {
    fn handle_message(&mut self, ctx: &ServiceContext, from: &Peer, msg: Message) {
        if !msg.address.starts_with(WIKI_PREFIX) || msg.address.contains('#') {
            tracing::debug!(page = %msg.address, "not a wiki page address");
            let answer = match msg.command.as_str() {
                "WRITE" => "WRITE_FAILED",
                _ => "NOT_EXISTING",
            };
            ctx.send(from, &msg.reply(answer, ""));
            return;
        }

        let from = from.clone();
        let command = msg.command.clone();
        let queued = match command.as_str() {
            "READ" => ctx.persistence().run(move |s| read_page(s, &from, &msg)),
            "HISTORY" => ctx.persistence().run(move |s| page_history(s, &from, &msg)),
            "WRITE" => {
                let author = from.display_name();
                ctx.persistence().run(move |s| write_page(s, &from, author, msg))
            }
            other => {
                tracing::debug!(command = other, "unknown wiki command");
                return;
            }
        };
        if let Err(e) = queued {
            tracing::warn!(address = %ctx.address(), error = %e, "wiki request not queued");
        }
    }

    fn handle_connection_lost(&mut self, _ctx: &ServiceContext, _conn: ConnectionId) {}
}
