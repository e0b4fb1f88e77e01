//! Best-effort, in-process event fan-out.
//!
//! Grounded on the teacher's `EventBus` (`engine/events.rs`), but adapted
//! from a single `tokio::sync::broadcast` channel to per-event-type named
//! callback lists, since the spec's `add_event_listener(event_type,
//! callback)` contract dispatches by type rather than broadcasting every
//! event to every subscriber.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

pub type EventCallback = Arc<dyn Fn(Value) + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<HashMap<String, Vec<EventCallback>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_listener(&self, event_type: impl Into<String>, callback: EventCallback) {
        self.listeners.write().await.entry(event_type.into()).or_default().push(callback);
    }

    /// Invokes every listener registered for `event_type`. A callback
    /// failure (panic) is caught and logged; it never blocks the publisher
    /// or other listeners. Delivery is best-effort and not persisted — a
    /// durable peer is not consulted.
    pub async fn publish(&self, event_type: &str, payload: Value) {
        let callbacks = {
            let listeners = self.listeners.read().await;
            listeners.get(event_type).cloned().unwrap_or_default()
        };
        for callback in callbacks {
            let payload = payload.clone();
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(payload)));
            if let Err(_panic) = result {
                tracing::warn!(event_type, "event listener panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn delivers_to_all_listeners_of_matching_type() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h1 = hits.clone();
        bus.add_listener("shared_context_updated:c1", Arc::new(move |_| {
            h1.fetch_add(1, Ordering::SeqCst);
        }))
        .await;
        let h2 = hits.clone();
        bus.add_listener("shared_context_updated:c1", Arc::new(move |_| {
            h2.fetch_add(1, Ordering::SeqCst);
        }))
        .await;
        bus.add_listener("other_event", Arc::new(|_| panic!("should not fire")))
            .await;

        bus.publish("shared_context_updated:c1", Value::Null).await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn listener_panic_does_not_block_others() {
        let bus = EventBus::new();
        bus.add_listener("e", Arc::new(|_| panic!("boom"))).await;
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        bus.add_listener("e", Arc::new(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        }))
        .await;

        bus.publish("e", Value::Null).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
