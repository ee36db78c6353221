//! Integration tests for service actors and the registry, using a mock
//! service that counts messages.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use meshpath_protocol::{Message, Value};
use meshpath_service::{Service, ServiceConfig, ServiceContext, ServiceRegistry};
use meshpath_session::{Outbound, Peer, PeerSet};
use meshpath_store::Persistence;
use meshpath_transport::ConnectionId;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

// =========================================================================
// Mock service: echoes a running count to every member, finishes at a
// target, and can arm a one-shot deadline.
// =========================================================================

struct Counter {
    members: PeerSet,
    count: i64,
    finish_at: i64,
    deadline: Option<Instant>,
    lost: Arc<AtomicUsize>,
}

impl Counter {
    fn new(finish_at: i64) -> Self {
        Self {
            members: PeerSet::new(),
            count: 0,
            finish_at,
            deadline: None,
            lost: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Service for Counter {
    fn handle_message(&mut self, ctx: &ServiceContext, from: &Peer, msg: Message) {
        self.members.insert(from.clone());
        match msg.command.as_str() {
            "ARM" => {
                let ms = msg.content.as_i64().unwrap_or(0) as u64;
                self.deadline = Some(Instant::now() + Duration::from_millis(ms));
            }
            _ => {
                self.count += 1;
                let _ = self.members.broadcast(&ctx.message("COUNT", self.count));
                ctx.persistence().save(ctx.address(), Value::from(self.count));
            }
        }
    }

    fn handle_connection_lost(&mut self, _ctx: &ServiceContext, conn: ConnectionId) {
        self.members.remove(conn);
        self.lost.fetch_add(1, Ordering::SeqCst);
    }

    fn storage_key(&self) -> Option<String> {
        Some("/count/stored".to_string())
    }

    fn restore(&mut self, stored: Value) {
        self.count = stored.as_i64().unwrap_or(0);
    }

    fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    fn on_deadline(&mut self, ctx: &ServiceContext) {
        self.deadline = None;
        let _ = self.members.broadcast(&ctx.message("TIMEOUT", ""));
    }

    fn is_finished(&self) -> bool {
        self.count >= self.finish_at
    }
}

fn peer(id: u64) -> (Peer, UnboundedReceiver<Outbound>) {
    Peer::new(ConnectionId::new(id), None)
}

fn msg(address: &str, command: &str, content: impl Into<Value>) -> Message {
    Message::new("tester", address, command, content)
}

/// Waits for the next frame and decodes it.
async fn next_message(rx: &mut UnboundedReceiver<Outbound>) -> Message {
    loop {
        match rx.recv().await.expect("outbound queue open") {
            Outbound::Frame(bytes) => return Message::from_bytes(&bytes).unwrap(),
            Outbound::Close => continue,
        }
    }
}

// =========================================================================
// Dispatch
// =========================================================================

#[tokio::test]
async fn test_messages_from_one_connection_are_processed_in_order() {
    let registry = ServiceRegistry::new(Persistence::in_memory(), ServiceConfig::default());
    let handle = registry.get_or_create("/count/a", || Counter::new(1_000)).await;
    let (p, mut rx) = peer(1);

    for _ in 0..100 {
        handle.dispatch(p.clone(), msg("/count/a", "ADD", "")).await.unwrap();
    }
    for expected in 1..=100 {
        assert_eq!(next_message(&mut rx).await.content, Value::from(expected));
    }
}

#[tokio::test]
async fn test_two_connections_share_one_instance() {
    let registry = ServiceRegistry::new(Persistence::in_memory(), ServiceConfig::default());
    let (a, mut rx_a) = peer(1);
    let (b, mut rx_b) = peer(2);

    let ha = registry.get_or_create("/count/room1", || Counter::new(100)).await;
    ha.dispatch(a.clone(), msg("/count/room1", "ADD", "")).await.unwrap();
    assert_eq!(next_message(&mut rx_a).await.content, Value::from(1));

    let hb = registry.get_or_create("/count/room1", || Counter::new(100)).await;
    hb.dispatch(b.clone(), msg("/count/room1", "ADD", "")).await.unwrap();

    // Both see the shared count.
    assert_eq!(next_message(&mut rx_a).await.content, Value::from(2));
    assert_eq!(next_message(&mut rx_b).await.content, Value::from(2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_first_joiners_create_one_instance() {
    let registry = Arc::new(ServiceRegistry::new(
        Persistence::in_memory(),
        ServiceConfig::default(),
    ));
    let created = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::new();
    for _ in 0..32 {
        let registry = Arc::clone(&registry);
        let created = Arc::clone(&created);
        tasks.push(tokio::spawn(async move {
            registry
                .get_or_create("/count/race", || {
                    created.fetch_add(1, Ordering::SeqCst);
                    Counter::new(100)
                })
                .await
        }));
    }
    let mut handles = Vec::new();
    for t in tasks {
        handles.push(t.await.unwrap());
    }

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert!(handles.windows(2).all(|w| w[0].same_instance(&w[1])));
}

// =========================================================================
// Lifecycle
// =========================================================================

#[tokio::test]
async fn test_connection_lost_is_reported_once() {
    let registry = ServiceRegistry::new(Persistence::in_memory(), ServiceConfig::default());
    let service = Counter::new(100);
    let lost = Arc::clone(&service.lost);
    let handle = registry.get_or_create("/count/lost", move || service).await;
    let (p, mut rx) = peer(7);

    handle.dispatch(p.clone(), msg("/count/lost", "ADD", "")).await.unwrap();
    next_message(&mut rx).await;
    handle.connection_lost(p.id()).await.unwrap();
    handle.connection_lost(p.id()).await.unwrap();
    // A connection that never dispatched here is not reported.
    handle.connection_lost(ConnectionId::new(99)).await.unwrap();

    // Round-trip through the mailbox so the commands above are processed.
    let (q, mut rx_q) = peer(8);
    handle.dispatch(q, msg("/count/lost", "ADD", "")).await.unwrap();
    next_message(&mut rx_q).await;
    assert_eq!(lost.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_finished_service_is_replaced_on_next_lookup() {
    let registry = ServiceRegistry::new(Persistence::in_memory(), ServiceConfig::default());
    let first = registry.get_or_create("/count/game", || Counter::new(1)).await;
    let (p, mut rx) = peer(1);
    first.dispatch(p, msg("/count/game", "ADD", "")).await.unwrap();
    next_message(&mut rx).await;

    while !first.is_finished() {
        tokio::task::yield_now().await;
    }
    let second = registry.get_or_create("/count/game", || Counter::new(1)).await;
    assert!(!first.same_instance(&second));
    assert!(!second.is_finished());
}

#[tokio::test]
async fn test_state_is_restored_from_storage() {
    let persistence = Persistence::in_memory();
    persistence.save("/count/stored", Value::from(41));
    let registry = ServiceRegistry::new(persistence, ServiceConfig::default());

    let handle = registry.get_or_create("/count/stored", || Counter::new(1_000)).await;
    let (p, mut rx) = peer(1);
    handle.dispatch(p, msg("/count/stored", "ADD", "")).await.unwrap();
    assert_eq!(next_message(&mut rx).await.content, Value::from(42));
}

// =========================================================================
// Timers
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_idle_connection_is_closed_by_sweep() {
    let config = ServiceConfig {
        inactivity_timeout: Duration::from_secs(10),
        sweep_interval: Duration::from_secs(20),
        ..ServiceConfig::default()
    };
    let registry = ServiceRegistry::new(Persistence::in_memory(), config);
    let handle = registry.get_or_create("/count/sweep", || Counter::new(1_000)).await;

    let (idle, mut rx_idle) = peer(1);
    let (alive, mut rx_alive) = peer(2);
    handle.dispatch(idle.clone(), msg("/count/sweep", "ADD", "")).await.unwrap();
    handle.dispatch(alive.clone(), msg("/count/sweep", "ADD", "")).await.unwrap();

    // One keep-alive per second on `alive` only.
    for _ in 0..25 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        alive.touch();
    }

    assert!(idle.is_closed());
    assert!(!alive.is_closed());

    let mut saw_close = false;
    while let Ok(item) = rx_idle.try_recv() {
        saw_close |= item == Outbound::Close;
    }
    assert!(saw_close);
    while let Ok(item) = rx_alive.try_recv() {
        assert_ne!(item, Outbound::Close);
    }
}

#[tokio::test(start_paused = true)]
async fn test_deadline_fires_on_deadline() {
    let registry = ServiceRegistry::new(Persistence::in_memory(), ServiceConfig::default());
    let handle = registry.get_or_create("/count/timer", || Counter::new(1_000)).await;
    let (p, mut rx) = peer(1);

    handle.dispatch(p.clone(), msg("/count/timer", "ARM", 500)).await.unwrap();
    let before = Instant::now();
    let timeout = next_message(&mut rx).await;
    assert_eq!(timeout.command, "TIMEOUT");
    assert!(before.elapsed() >= Duration::from_millis(500));
}
