//! Service actor: an isolated Tokio task that owns one service instance.
//!
//! Each service runs in its own task and is reached only through its
//! mailbox. Every message for an address goes through that one mailbox,
//! so dispatch is serialized per address without any shared lock.

use std::future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use meshpath_protocol::Message;
use meshpath_session::{Peer, PeerSet};
use meshpath_transport::ConnectionId;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::{Service, ServiceConfig, ServiceContext, ServiceError};

/// Commands sent to a service actor through its mailbox.
pub(crate) enum ServiceCommand {
    /// Deliver a message from a bound connection.
    Dispatch { from: Peer, msg: Message },

    /// A bound connection went away.
    ConnectionLost(ConnectionId),

    /// Stop the actor.
    Shutdown,
}

/// Handle to a running service actor.
///
/// Cheap to clone. The registry holds one per address and every bound
/// connection holds another.
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    address: Arc<str>,
    sender: mpsc::Sender<ServiceCommand>,
    finished: Arc<AtomicBool>,
}

impl std::fmt::Debug for ServiceCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dispatch { from, msg } => f
                .debug_struct("Dispatch")
                .field("from", &from.id())
                .field("command", &msg.command)
                .finish(),
            Self::ConnectionLost(id) => f.debug_tuple("ConnectionLost").field(id).finish(),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

impl ServiceHandle {
    /// The address (or namespace) the service was created for.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Delivers a message. Waits if the mailbox is full.
    pub async fn dispatch(&self, from: Peer, msg: Message) -> Result<(), ServiceError> {
        self.send(ServiceCommand::Dispatch { from, msg }).await
    }

    /// Reports that a bound connection is gone.
    pub async fn connection_lost(&self, conn: ConnectionId) -> Result<(), ServiceError> {
        self.send(ServiceCommand::ConnectionLost(conn)).await
    }

    /// Tells the actor to stop.
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        self.send(ServiceCommand::Shutdown).await
    }

    /// Returns `true` once the service reported it has concluded.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Returns `true` while the actor is still accepting commands.
    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Returns `true` if both handles reach the same actor.
    pub fn same_instance(&self, other: &ServiceHandle) -> bool {
        self.sender.same_channel(&other.sender)
    }

    async fn send(&self, cmd: ServiceCommand) -> Result<(), ServiceError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| ServiceError::Unavailable(self.address.to_string()))
    }
}

/// The internal actor state. Runs inside a Tokio task.
struct ServiceActor<S: Service> {
    service: S,
    ctx: ServiceContext,
    config: ServiceConfig,
    /// Every connection that has dispatched here and not yet been lost.
    attached: PeerSet,
    finished: Arc<AtomicBool>,
    receiver: mpsc::Receiver<ServiceCommand>,
}

impl<S: Service> ServiceActor<S> {
    async fn run(mut self) {
        tracing::info!(address = %self.ctx.address(), "service actor started");
        self.restore().await;

        let period = self.config.sweep_interval;
        let mut sweep = time::interval_at(Instant::now() + period, period);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let deadline = self.service.deadline();
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(ServiceCommand::Dispatch { from, msg }) => {
                        self.attached.insert(from.clone());
                        self.service.handle_message(&self.ctx, &from, msg);
                    }
                    Some(ServiceCommand::ConnectionLost(conn)) => {
                        if self.attached.remove(conn).is_some() {
                            self.service.handle_connection_lost(&self.ctx, conn);
                        }
                    }
                    Some(ServiceCommand::Shutdown) => {
                        tracing::info!(address = %self.ctx.address(), "service shutting down");
                        break;
                    }
                    None => break,
                },
                _ = sweep.tick() => {
                    let evicted = self.attached.evict_idle(self.config.inactivity_timeout);
                    if !evicted.is_empty() {
                        tracing::debug!(
                            address = %self.ctx.address(),
                            count = evicted.len(),
                            "inactivity sweep closed connections"
                        );
                    }
                }
                _ = sleep_until(deadline) => {
                    self.service.on_deadline(&self.ctx);
                }
            }

            if self.service.is_finished() && !self.finished.swap(true, Ordering::AcqRel) {
                tracing::info!(address = %self.ctx.address(), "service finished");
            }
        }

        tracing::info!(address = %self.ctx.address(), "service actor stopped");
    }

    async fn restore(&mut self) {
        let Some(key) = self.service.storage_key() else {
            return;
        };
        match self.ctx.persistence().load(key.as_str()).await {
            Ok(Some(stored)) => {
                tracing::debug!(address = %self.ctx.address(), %key, "restoring stored state");
                self.service.restore(stored);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(address = %self.ctx.address(), %key, error = %e, "failed to restore state");
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => future::pending().await,
    }
}

/// Spawns a service actor task and returns a handle to it.
///
/// `config.channel_size` bounds the mailbox: when it is full, senders
/// wait, which pushes back on the connections feeding it.
pub fn spawn_service<S: Service>(
    service: S,
    ctx: ServiceContext,
    config: ServiceConfig,
) -> ServiceHandle {
    let (tx, rx) = mpsc::channel(config.channel_size.max(1));
    let finished = Arc::new(AtomicBool::new(false));
    let address: Arc<str> = Arc::from(ctx.address());

    let actor = ServiceActor {
        service,
        ctx,
        config,
        attached: PeerSet::new(),
        finished: Arc::clone(&finished),
        receiver: rx,
    };
    tokio::spawn(actor.run());

    ServiceHandle {
        address,
        sender: tx,
        finished,
    }
}
