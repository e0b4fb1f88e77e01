//! The worker loop: one of a fixed pool of tasks pulling from the shared
//! ready queue.
//!
//! The `tokio::spawn`-per-worker shape follows the teacher's background-task
//! pattern (e.g. `api/agents/tenant_storage.rs`'s periodic backup task), but
//! `mpsc::Receiver` is single-consumer, so sharing one ready queue across a
//! worker pool needs its own wrapper: a `tokio::sync::Mutex` around the
//! receiver serializes access, turning it into an ad hoc MPMC queue.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::time::Duration;

use super::{Orchestrator, ReadyTask};

pub async fn run(orchestrator: Arc<Orchestrator>, worker_id: String, rx: Arc<Mutex<mpsc::Receiver<ReadyTask>>>) {
    loop {
        let received = {
            let mut guard = rx.lock().await;
            tokio::time::timeout(Duration::from_secs(1), guard.recv()).await
        };

        let ready = match received {
            Ok(Some(ready)) => ready,
            Ok(None) => return, // channel closed: orchestrator is shutting down
            Err(_elapsed) => continue,
        };

        orchestrator.process_ready_task(&worker_id, ready).await;
    }
}
