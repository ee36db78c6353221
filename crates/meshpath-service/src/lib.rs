//! Service dispatch for meshpath.
//!
//! Each service instance runs as an isolated Tokio task (actor model)
//! with its own state and the set of connections bound to it.
//!
//! # Key types
//!
//! - [`Service`]: the trait every service kind implements
//! - [`ServiceRegistry`]: creates and finds instances by address
//! - [`ServiceHandle`]: sends commands to a running service actor
//! - [`ServiceContext`]: address and persistence handed to a service
//! - [`ServiceConfig`]: mailbox size and inactivity timings

mod actor;
mod config;
mod error;
mod registry;
mod service;

pub use actor::{ServiceHandle, spawn_service};
pub use config::ServiceConfig;
pub use error::ServiceError;
pub use registry::ServiceRegistry;
pub use service::{Service, ServiceContext};
