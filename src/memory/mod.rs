//! Memory Store (L1): keyed, scoped, TTL'd storage of memory entries,
//! workflow state, shared contexts, and event fan-out.

pub mod events;
pub mod peer;
pub mod store;

pub use events::{EventBus, EventCallback};
pub use peer::{DurablePeer, InProcessPeer};
pub use store::{MemoryStats, MemoryStore, SearchCriteria, StoreOptions};

use std::sync::Arc;
use std::time::Duration;

/// Spawns the background sweeper described in the spec's concurrency model
/// ("the Memory Store has its own sweeper, not a worker"). Returns the
/// `JoinHandle` so callers can abort it on shutdown.
pub fn spawn_sweeper(store: Arc<MemoryStore>, interval_seconds: u64) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds));
        loop {
            ticker.tick().await;
            store.sweep();
        }
    })
}
