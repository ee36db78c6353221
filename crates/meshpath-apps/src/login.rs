//! User records: one shared [`LoginService`] for every `/login/<user>`.
//!
//! A record is a mapping `{public_key, private_key}` stored under the
//! user's address. Keys are opaque strings to the server; nothing here
//! authenticates anyone.

use meshpath_protocol::{Message, Value};
use meshpath_service::{Service, ServiceContext};
use meshpath_session::Peer;
use meshpath_store::Storage;
use meshpath_transport::ConnectionId;

/// Address prefix of user records.
pub const LOGIN_PREFIX: &str = "/login/";

#[derive(Debug, Default)]
pub struct LoginService;

impl LoginService {
    pub fn new() -> Self {
        Self
    }
}

/// Validates a `CREATE` payload and builds the record to store.
fn user_record(content: &Value) -> Option<Value> {
    let public_key = content.get("public_key")?.as_str()?;
    let private_key = content.get("private_key")?.as_str()?;
    Some(Value::map([
        ("public_key", public_key),
        ("private_key", private_key),
    ]))
}

fn reply(to: &Peer, msg: Message) {
    if let Err(e) = to.send(&msg) {
        tracing::debug!(conn_id = %to.id(), error = %e, "login reply dropped");
    }
}

fn create(storage: &dyn Storage, from: &Peer, req: &Message, record: Value) {
    let result = storage.exists(&req.address).and_then(|exists| {
        if exists {
            return Ok(Err("user already exists"));
        }
        storage.write(&req.address, &record).map(Ok)
    });
    let msg = match result {
        Ok(Ok(())) => {
            tracing::info!(user = %req.address, "user created");
            req.reply("CREATE_DONE", "")
        }
        Ok(Err(reason)) => req.reply("CREATE_FAILED", reason),
        Err(e) => {
            tracing::warn!(user = %req.address, error = %e, "user record not written");
            req.reply("CREATE_FAILED", e.to_string())
        }
    };
    reply(from, msg);
}

fn read_key(storage: &dyn Storage, from: &Peer, req: &Message, field: &str, answer: &str) {
    let key = match storage.read(&req.address) {
        Ok(record) => record.and_then(|r| r.get(field).cloned()),
        Err(e) => {
            tracing::warn!(user = %req.address, error = %e, "user record unreadable");
            None
        }
    };
    let msg = match key {
        Some(key) => req.reply(answer, key),
        None => req.reply("NOT_EXISTING", ""),
    };
    reply(from, msg);
}

impl Service for LoginService {
    fn handle_message(&mut self, ctx: &ServiceContext, from: &Peer, msg: Message) {
        let user = msg.address.strip_prefix(LOGIN_PREFIX).unwrap_or_default();
        if user.is_empty() || user.contains('/') {
            tracing::debug!(address = %msg.address, "not a user address");
            let answer = if msg.command == "CREATE" { "CREATE_FAILED" } else { "NOT_EXISTING" };
            ctx.send(from, &msg.reply(answer, ""));
            return;
        }

        let from = from.clone();
        let command = msg.command.clone();
        let queued = match command.as_str() {
            "CREATE" => {
                let Some(record) = user_record(&msg.content) else {
                    ctx.send(&from, &msg.reply("CREATE_FAILED", "malformed user record"));
                    return;
                };
                ctx.persistence().run(move |s| create(s, &from, &msg, record))
            }
            "READ_PUBLIC_KEY" => ctx
                .persistence()
                .run(move |s| read_key(s, &from, &msg, "public_key", "PUBLIC_KEY")),
            "READ_PRIVATE_KEY" => ctx
                .persistence()
                .run(move |s| read_key(s, &from, &msg, "private_key", "PRIVATE_KEY")),
            other => {
                tracing::debug!(command = other, "unknown login command");
                return;
            }
        };
        if let Err(e) = queued {
            tracing::warn!(address = %ctx.address(), error = %e, "login request not queued");
        }
    }

    fn handle_connection_lost(&mut self, _ctx: &ServiceContext, _conn: ConnectionId) {}
}
