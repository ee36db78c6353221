//! The persistence worker: blocking storage calls, off the connection path.
//!
//! Services are async actors and must never block on disk I/O. Instead
//! they submit jobs to a [`Persistence`] handle. One worker task runs the
//! jobs one after another on tokio's blocking pool, so:
//!
//! - a slow disk never stalls framing or dispatch for any connection;
//! - jobs run in submission order, so a read submitted after a write sees
//!   that write, and replies sent from inside jobs keep request order.
//!
//! ```text
//!   service ──run(job)──► [ unbounded queue ] ──► worker ──spawn_blocking──► Storage
//! ```

use std::sync::Arc;

use meshpath_protocol::Value;
use tokio::sync::{mpsc, oneshot};

use crate::{MemoryStorage, Storage, StoreError};

type Job = Box<dyn FnOnce(&dyn Storage) + Send>;

/// A cloneable handle for submitting storage jobs.
#[derive(Clone)]
pub struct Persistence {
    tx: mpsc::UnboundedSender<Job>,
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistence")
            .field("running", &!self.tx.is_closed())
            .finish()
    }
}

impl Persistence {
    /// Spawns the worker task for `storage` and returns a handle to it.
    ///
    /// Must be called from inside a tokio runtime. The worker stops once
    /// every handle has been dropped and the queue is drained.
    pub fn spawn(storage: Arc<dyn Storage>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let storage = Arc::clone(&storage);
                if let Err(e) =
                    tokio::task::spawn_blocking(move || job(storage.as_ref())).await
                {
                    tracing::error!(error = %e, "persistence job panicked");
                }
            }
            tracing::debug!("persistence worker stopped");
        });

        Self { tx }
    }

    /// A worker over a fresh [`MemoryStorage`].
    pub fn in_memory() -> Self {
        Self::spawn(Arc::new(MemoryStorage::new()))
    }

    /// Queues a job. It runs after every previously queued job.
    pub fn run<F>(&self, job: F) -> Result<(), StoreError>
    where
        F: FnOnce(&dyn Storage) + Send + 'static,
    {
        self.tx
            .send(Box::new(job))
            .map_err(|_| StoreError::Unavailable)
    }

    /// Reads a value and waits for the result.
    pub async fn load(&self, key: impl Into<String>) -> Result<Option<Value>, StoreError> {
        let key = key.into();
        let (tx, rx) = oneshot::channel();
        self.run(move |storage| {
            let _ = tx.send(storage.read(&key));
        })?;
        rx.await.map_err(|_| StoreError::Unavailable)?
    }

    /// Writes a value without waiting. Failures are logged.
    pub fn save(&self, key: impl Into<String>, value: Value) {
        let key = key.into();
        let queued = self.run(move |storage| {
            if let Err(e) = storage.write(&key, &value) {
                tracing::warn!(%key, error = %e, "failed to persist value");
            }
        });
        if let Err(e) = queued {
            tracing::warn!(error = %e, "failed to queue save");
        }
    }

    /// Waits until every job queued before this call has finished.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.run(move |_| {
            let _ = tx.send(());
        })?;
        rx.await.map_err(|_| StoreError::Unavailable)
    }
}
