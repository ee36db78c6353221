//! # meshpath
//!
//! Many independent services behind one TCP port.
//!
//! Clients send length-prefixed messages, each naming a target address
//! such as `/chat/lobby` or `/game/tic_tac_toe`. The first message a
//! connection sends binds it to the service at that address for the rest
//! of its life; addresses nothing serves are disconnected.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meshpath::prelude::*;
//!
//! # async fn start() -> Result<(), MeshpathError> {
//! let server = Server::builder().bind("127.0.0.1:8883").build().await?;
//! let addr = server.local_addr()?.to_string();
//! tokio::spawn(server.run());
//!
//! let mut alice = Client::connect(&addr, "alice").await?;
//! alice.send("/chat/lobby", "ENTER", "").await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod handler;
mod router;
mod server;

pub use client::Client;
pub use config::ServerConfig;
pub use error::MeshpathError;
pub use router::{ROUTES, RouteRule, Router, ServiceKind, rule_for};
pub use server::{Server, ServerBuilder, ShutdownHandle};

/// The types most programs need.
pub mod prelude {
    pub use crate::{Client, MeshpathError, Server, ServerBuilder, ServerConfig, ShutdownHandle};
    pub use meshpath_protocol::{KEEP_ALIVE, Message, Value};
}
