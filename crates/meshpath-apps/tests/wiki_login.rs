//! The shared storage-backed services: wiki pages and user records.

mod common;

use std::sync::Arc;

use common::{TestPeer, msg};
use meshpath_apps::{CHANGE_LOG_KEY, LoginService, WikiService};
use meshpath_protocol::Value;
use meshpath_service::{ServiceConfig, ServiceHandle, ServiceRegistry};
use meshpath_store::{Persistence, Storage, StoreError};

/// Storage whose every call fails, like a full or read-only disk.
struct BrokenDisk;

impl BrokenDisk {
    fn error(key: &str) -> StoreError {
        StoreError::Io {
            key: key.to_string(),
            source: std::io::Error::other("disk unavailable"),
        }
    }
}

impl Storage for BrokenDisk {
    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Err(Self::error(key))
    }

    fn read(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Err(Self::error(key))
    }

    fn write(&self, key: &str, _value: &Value) -> Result<(), StoreError> {
        Err(Self::error(key))
    }
}

async fn wiki(registry: &ServiceRegistry) -> ServiceHandle {
    registry.get_shared("/wiki/", WikiService::new).await
}

async fn login(registry: &ServiceRegistry) -> ServiceHandle {
    registry.get_shared("/login/", LoginService::new).await
}

async fn request(
    handle: &ServiceHandle,
    peer: &TestPeer,
    address: &str,
    command: &str,
    content: impl Into<Value>,
) {
    handle
        .dispatch(peer.peer.clone(), msg(address, command, content))
        .await
        .unwrap();
}

// =========================================================================
// Wiki
// =========================================================================

#[tokio::test]
async fn test_wiki_page_write_then_read() {
    let persistence = Persistence::in_memory();
    let registry = ServiceRegistry::new(persistence.clone(), ServiceConfig::default());
    let handle = wiki(&registry).await;
    let mut alice = TestPeer::new(1, "alice");

    request(&handle, &alice, "/wiki/home", "READ", "").await;
    let missing = alice.expect("NOT_EXISTING").await;
    assert_eq!(missing.address, "/wiki/home");
    assert_eq!(missing.sender, "");

    request(&handle, &alice, "/wiki/home", "WRITE", "Welcome").await;
    alice.expect("WRITE_DONE").await;

    request(&handle, &alice, "/wiki/home", "READ", "").await;
    let page = alice.expect("READ_RESULT").await;
    assert_eq!(page.content.as_str(), Some("Welcome"));

    persistence.flush().await.unwrap();
    let log = persistence.load(CHANGE_LOG_KEY).await.unwrap().unwrap();
    let entries = log.as_seq().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].get("path").and_then(Value::as_str), Some("/wiki/home"));
    assert_eq!(entries[0].get("author").and_then(Value::as_str), Some("alice"));
}

#[tokio::test]
async fn test_wiki_history_lists_changes_to_one_page() {
    let registry = ServiceRegistry::new(Persistence::in_memory(), ServiceConfig::default());
    let handle = wiki(&registry).await;
    let mut alice = TestPeer::new(1, "alice");
    let mut bob = TestPeer::new(2, "bob");

    request(&handle, &alice, "/wiki/a", "WRITE", "one").await;
    request(&handle, &bob, "/wiki/b", "WRITE", "two").await;
    request(&handle, &bob, "/wiki/a", "WRITE", "three").await;
    alice.expect("WRITE_DONE").await;
    bob.expect("WRITE_DONE").await;
    bob.expect("WRITE_DONE").await;

    request(&handle, &alice, "/wiki/a", "HISTORY", "").await;
    let history = alice.expect("HISTORY_RESULT").await;
    let authors: Vec<&str> = history
        .content
        .as_seq()
        .unwrap()
        .iter()
        .filter_map(|e| e.get("author").and_then(Value::as_str))
        .collect();
    assert_eq!(authors, ["alice", "bob"]);
}

#[tokio::test]
async fn test_wiki_change_log_is_not_addressable() {
    let registry = ServiceRegistry::new(Persistence::in_memory(), ServiceConfig::default());
    let handle = wiki(&registry).await;
    let mut alice = TestPeer::new(1, "alice");

    request(&handle, &alice, CHANGE_LOG_KEY, "WRITE", "vandalism").await;
    alice.expect("WRITE_FAILED").await;
    request(&handle, &alice, CHANGE_LOG_KEY, "READ", "").await;
    alice.expect("NOT_EXISTING").await;
}

#[tokio::test]
async fn test_wiki_cannot_reach_records_outside_its_prefix() {
    let persistence = Persistence::in_memory();
    let registry = ServiceRegistry::new(persistence.clone(), ServiceConfig::default());
    let accounts = login(&registry).await;
    let pages = wiki(&registry).await;
    let mut alice = TestPeer::new(1, "alice");
    let mut mallory = TestPeer::new(2, "mallory");

    request(&accounts, &alice, "/login/alice", "CREATE", keys("pub-a", "priv-a")).await;
    alice.expect("CREATE_DONE").await;

    request(&pages, &mallory, "/login/alice", "WRITE", keys("evil", "evil")).await;
    mallory.expect("WRITE_FAILED").await;
    request(&pages, &mallory, "/login/alice", "READ", "").await;
    mallory.expect("NOT_EXISTING").await;
    request(&pages, &mallory, "/chat/lobby", "WRITE", "forged").await;
    mallory.expect("WRITE_FAILED").await;

    request(&accounts, &alice, "/login/alice", "READ_PUBLIC_KEY", "").await;
    assert_eq!(alice.expect("PUBLIC_KEY").await.content.as_str(), Some("pub-a"));
    persistence.flush().await.unwrap();
    assert_eq!(persistence.load("/chat/lobby").await.unwrap(), None);
}

#[tokio::test]
async fn test_wiki_storage_failures_are_reported() {
    let persistence = Persistence::spawn(Arc::new(BrokenDisk));
    let registry = ServiceRegistry::new(persistence, ServiceConfig::default());
    let handle = wiki(&registry).await;
    let mut alice = TestPeer::new(1, "alice");

    request(&handle, &alice, "/wiki/home", "WRITE", "text").await;
    alice.expect("WRITE_FAILED").await;
    request(&handle, &alice, "/wiki/home", "READ", "").await;
    let failed = alice.expect("READ_FAILED").await;
    assert!(failed.content.as_str().unwrap().contains("disk unavailable"));
}

// =========================================================================
// Login
// =========================================================================

fn keys(public: &str, private: &str) -> Value {
    Value::map([("public_key", public), ("private_key", private)])
}

#[tokio::test]
async fn test_login_create_and_read_keys() {
    let registry = ServiceRegistry::new(Persistence::in_memory(), ServiceConfig::default());
    let handle = login(&registry).await;
    let mut alice = TestPeer::new(1, "alice");

    request(&handle, &alice, "/login/alice", "READ_PUBLIC_KEY", "").await;
    alice.expect("NOT_EXISTING").await;

    request(&handle, &alice, "/login/alice", "CREATE", keys("pub-a", "priv-a")).await;
    alice.expect("CREATE_DONE").await;

    request(&handle, &alice, "/login/alice", "READ_PUBLIC_KEY", "").await;
    assert_eq!(alice.expect("PUBLIC_KEY").await.content.as_str(), Some("pub-a"));
    request(&handle, &alice, "/login/alice", "READ_PRIVATE_KEY", "").await;
    assert_eq!(alice.expect("PRIVATE_KEY").await.content.as_str(), Some("priv-a"));
}

#[tokio::test]
async fn test_login_refuses_duplicates_and_bad_records() {
    let registry = ServiceRegistry::new(Persistence::in_memory(), ServiceConfig::default());
    let handle = login(&registry).await;
    let mut alice = TestPeer::new(1, "alice");

    request(&handle, &alice, "/login/alice", "CREATE", keys("a", "b")).await;
    alice.expect("CREATE_DONE").await;

    request(&handle, &alice, "/login/alice", "CREATE", keys("c", "d")).await;
    let dup = alice.expect("CREATE_FAILED").await;
    assert_eq!(dup.content.as_str(), Some("user already exists"));

    request(&handle, &alice, "/login/bob", "CREATE", "not a mapping").await;
    let bad = alice.expect("CREATE_FAILED").await;
    assert_eq!(bad.content.as_str(), Some("malformed user record"));

    request(&handle, &alice, "/login/", "CREATE", keys("e", "f")).await;
    alice.expect("CREATE_FAILED").await;
    request(&handle, &alice, "/login/a/b", "READ_PUBLIC_KEY", "").await;
    alice.expect("NOT_EXISTING").await;

    // The original record is untouched.
    request(&handle, &alice, "/login/alice", "READ_PUBLIC_KEY", "").await;
    assert_eq!(alice.expect("PUBLIC_KEY").await.content.as_str(), Some("a"));
}
