//! The durable key-value peer contract.
//!
//! Grounded on the teacher's separation of a storage trait
//! (`engine/storage.rs`'s `WorkflowStorage`) from a concrete backend
//! (`engine/nats_storage.rs`'s NATS implementation): the memory store talks
//! to an abstract peer so a real deployment can swap in Redis (or anything
//! else satisfying `get`/`setex`/`set`/`delete`/`scan_prefix`) without the
//! crate depending on a concrete client.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

/// Consumed interface per the spec's external-interfaces section:
/// `setex`, `set`, `get`, `del` (here `delete`), `scan_iter` (here
/// `scan_prefix`). Values are opaque byte strings — the store JSON-encodes
/// entries before handing them here.
#[async_trait]
pub trait DurablePeer: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>) -> anyhow::Result<()>;
    async fn setex(&self, key: &str, ttl_seconds: i64, value: Vec<u8>) -> anyhow::Result<()>;
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
    async fn scan_prefix(&self, prefix: &str) -> anyhow::Result<Vec<String>>;
}

/// In-process stand-in for a remote peer: a second map behind its own lock,
/// used by tests and as the default when no durable peer is configured.
/// TTLs set via `setex` are not separately enforced here — the memory
/// store's own sweeper is the source of truth for expiry, matching the
/// spec's note that the store never blocks waiting on the peer.
#[derive(Default)]
pub struct InProcessPeer {
    data: RwLock<HashMap<String, Vec<u8>>>,
}

impl InProcessPeer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DurablePeer for InProcessPeer {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.data.read().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> anyhow::Result<()> {
        self.data.write().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn setex(&self, key: &str, _ttl_seconds: i64, value: Vec<u8>) -> anyhow::Result<()> {
        self.set(key, value).await
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.data.write().unwrap().remove(key);
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        Ok(self
            .data
            .read()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
