//! Service registry: the live address → service instance map.

use std::collections::HashMap;

use meshpath_store::Persistence;
use tokio::sync::Mutex;

use crate::actor::spawn_service;
use crate::{Service, ServiceConfig, ServiceContext, ServiceHandle};

struct Entry {
    handle: ServiceHandle,
    restartable: bool,
    restart_needed: bool,
}

impl Entry {
    /// Whether a lookup may keep using this instance.
    fn is_live(&self) -> bool {
        self.handle.is_running()
            && !(self.restartable && (self.restart_needed || self.handle.is_finished()))
    }
}

/// Holds every live service instance, keyed by address or namespace.
///
/// The whole check-then-create sequence runs under one lock, so two
/// connections racing to be first at an address always end up with the
/// same instance.
pub struct ServiceRegistry {
    services: Mutex<HashMap<String, Entry>>,
    persistence: Persistence,
    config: ServiceConfig,
}

impl ServiceRegistry {
    /// Creates an empty registry. New services persist through
    /// `persistence` and run with `config`.
    pub fn new(persistence: Persistence, config: ServiceConfig) -> Self {
        Self {
            services: Mutex::new(HashMap::new()),
            persistence,
            config,
        }
    }

    /// Returns the service at `address`, creating it with `factory` if
    /// there is none.
    ///
    /// An instance that has finished, or was marked with
    /// [`mark_restart_needed`](Self::mark_restart_needed), is replaced by
    /// a fresh one. Connections already bound to the old instance keep it.
    pub async fn get_or_create<S, F>(&self, address: &str, factory: F) -> ServiceHandle
    where
        S: Service,
        F: FnOnce() -> S,
    {
        self.fetch_or_spawn(address, true, factory).await
    }

    /// Returns the namespace-wide singleton for `namespace`, creating it
    /// with `factory` if needed. Shared services are never restarted.
    pub async fn get_shared<S, F>(&self, namespace: &str, factory: F) -> ServiceHandle
    where
        S: Service,
        F: FnOnce() -> S,
    {
        self.fetch_or_spawn(namespace, false, factory).await
    }

    /// Makes the next [`get_or_create`](Self::get_or_create) at `address`
    /// discard the current instance.
    pub async fn mark_restart_needed(&self, address: &str) {
        if let Some(entry) = self.services.lock().await.get_mut(address) {
            entry.restart_needed = true;
            tracing::debug!(address, "service marked for restart");
        }
    }

    /// Number of registered instances, live or not.
    pub async fn len(&self) -> usize {
        self.services.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Stops every registered service and empties the registry.
    pub async fn shutdown_all(&self) {
        let entries: Vec<Entry> = self.services.lock().await.drain().map(|(_, e)| e).collect();
        for entry in entries {
            let _ = entry.handle.shutdown().await;
        }
    }

    async fn fetch_or_spawn<S, F>(&self, key: &str, restartable: bool, factory: F) -> ServiceHandle
    where
        S: Service,
        F: FnOnce() -> S,
    {
        let mut services = self.services.lock().await;
        if let Some(entry) = services.get(key) {
            if entry.is_live() {
                return entry.handle.clone();
            }
            tracing::info!(address = key, "replacing concluded service");
        }

        let ctx = ServiceContext::new(key, self.persistence.clone());
        let handle = spawn_service(factory(), ctx, self.config.clone());
        tracing::info!(address = key, "service created");
        services.insert(
            key.to_string(),
            Entry {
                handle: handle.clone(),
                restartable,
                restart_needed: false,
            },
        );
        handle
    }
}
