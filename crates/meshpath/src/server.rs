//! `Server` builder and accept loop.
//!
//! This is the entry point for running a meshpath server. It ties the
//! layers together: transport → protocol → session → routing → services.

use std::net::SocketAddr;
use std::sync::Arc;

use meshpath_service::ServiceRegistry;
use meshpath_store::{FileStorage, MemoryStorage, Persistence, Storage};
use meshpath_transport::{Transport, TcpTransport};
use tokio::sync::watch;

use crate::handler::handle_connection;
use crate::router::Router;
use crate::{MeshpathError, ServerConfig};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState {
    pub(crate) router: Router,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a server.
///
/// # Example
///
/// ```rust,no_run
/// use meshpath::prelude::*;
///
/// # async fn start() -> Result<(), MeshpathError> {
/// let server = Server::builder()
///     .bind("127.0.0.1:8883")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Default)]
pub struct ServerBuilder {
    config: ServerConfig,
    bind_addr: Option<String>,
    storage: Option<Arc<dyn Storage>>,
}

impl ServerBuilder {
    /// Creates a builder with [`ServerConfig::default`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the listen address, overriding the configuration's.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = Some(addr.to_string());
        self
    }

    /// Uses `storage` instead of the one the configuration implies.
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Opens storage, binds the listener and returns the server.
    ///
    /// Storage is the one passed to [`storage`](Self::storage), else a
    /// [`FileStorage`] under `data_dir`, else memory.
    pub async fn build(self) -> Result<Server, MeshpathError> {
        let mut config = self.config;
        if let Some(addr) = self.bind_addr {
            config.bind_addr = addr;
        }

        let storage: Arc<dyn Storage> = match (self.storage, &config.data_dir) {
            (Some(storage), _) => storage,
            (None, Some(dir)) => Arc::new(FileStorage::open(dir.clone())?),
            (None, None) => {
                tracing::warn!("no data directory configured, state will not survive a restart");
                Arc::new(MemoryStorage::new())
            }
        };
        let persistence = Persistence::spawn(storage);
        let registry = ServiceRegistry::new(persistence, config.service_config());
        let router = Router::new(registry, config.move_timeout());

        let transport = TcpTransport::bind(&config.bind_addr).await?;
        let (shutdown, _) = watch::channel(false);

        Ok(Server {
            transport,
            state: Arc::new(ServerState { router, config }),
            shutdown: Arc::new(shutdown),
        })
    }
}

/// Stops a running server from another task.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Makes [`Server::run`] stop accepting, shut every service down and
    /// return.
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}

/// A bound meshpath server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct Server {
    transport: TcpTransport,
    state: Arc<ServerState>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, MeshpathError> {
        Ok(self.transport.local_addr()?)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown),
        }
    }

    /// Runs the accept loop until a [`ShutdownHandle`] fires.
    ///
    /// Each accepted connection gets its own handler task. On shutdown
    /// every service actor is stopped; connection tasks end as their
    /// sockets close.
    pub async fn run(mut self) -> Result<(), MeshpathError> {
        let addr = self.local_addr()?;
        tracing::info!(%addr, "meshpath server running");
        let mut stop = self.shutdown.subscribe();

        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
                _ = stop.wait_for(|stopped| *stopped) => break,
            }
        }

        tracing::info!("shutting down services");
        self.state.router.registry().shutdown_all().await;
        Ok(())
    }
}
