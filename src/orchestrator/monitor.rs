//! The timeout monitor: a periodic sweep over running executions, grounded
//! on the teacher's `tokio::time::interval` background-task shape in
//! `api/mcp_server.rs`.

use std::sync::Arc;

use tokio::time::Duration;

use super::Orchestrator;

pub async fn run(orchestrator: Arc<Orchestrator>, interval_seconds: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
    loop {
        ticker.tick().await;
        orchestrator.scan_timeouts().await;
    }
}
