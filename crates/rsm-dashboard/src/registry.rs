//! Push-channel subscribers.
//!
//! Each connected client owns the receiving half of an unbounded channel; the
//! registry owns the senders. A send that fails means the client is gone, so
//! that subscriber is dropped without affecting the others.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};
use uuid::Uuid;

use rsm_engine::WorkflowEvent;

#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    subscribers: Mutex<HashMap<Uuid, UnboundedSender<String>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber and return its id and event stream.
    pub fn subscribe(&self) -> (Uuid, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        let id = Uuid::new_v4();
        let mut subscribers = self.subscribers.lock();
        subscribers.insert(id, tx);
        debug!(subscriber = %id, total = subscribers.len(), "subscriber registered");
        (id, rx)
    }

    pub fn unsubscribe(&self, id: &Uuid) -> bool {
        let mut subscribers = self.subscribers.lock();
        let removed = subscribers.remove(id).is_some();
        if removed {
            debug!(subscriber = %id, total = subscribers.len(), "subscriber removed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.lock().is_empty()
    }

    /// Send `event` to every subscriber. Returns how many received it.
    pub fn broadcast(&self, event: &WorkflowEvent) -> usize {
        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(e) => {
                warn!(event = event.event_type(), error = %e, "failed to serialise event");
                return 0;
            }
        };

        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|id, tx| {
            let delivered = tx.send(text.clone()).is_ok();
            if !delivered {
                debug!(subscriber = %id, "dropping disconnected subscriber");
            }
            delivered
        });
        subscribers.len()
    }

    /// Send `event` to one subscriber only. A failed send drops it.
    pub fn send_to(&self, id: &Uuid, event: &WorkflowEvent) -> bool {
        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(e) => {
                warn!(event = event.event_type(), error = %e, "failed to serialise event");
                return false;
            }
        };

        let mut subscribers = self.subscribers.lock();
        let Some(tx) = subscribers.get(id) else {
            return false;
        };
        if tx.send(text).is_ok() {
            true
        } else {
            subscribers.remove(id);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reset_event() -> WorkflowEvent {
        WorkflowEvent::ResetComplete {
            message: "System reset successfully".into(),
        }
    }

    #[test]
    fn broadcast_reaches_every_subscriber() {
        let registry = SubscriberRegistry::new();
        let (_, mut a) = registry.subscribe();
        let (_, mut b) = registry.subscribe();

        assert_eq!(registry.broadcast(&reset_event()), 2);
        let text = a.try_recv().unwrap();
        assert_eq!(text, b.try_recv().unwrap());
        assert!(text.contains("\"type\":\"reset_complete\""));
    }

    #[test]
    fn failed_send_drops_only_that_subscriber() {
        let registry = SubscriberRegistry::new();
        let (_, gone) = registry.subscribe();
        let (kept_id, mut kept) = registry.subscribe();
        drop(gone);

        assert_eq!(registry.broadcast(&reset_event()), 1);
        assert_eq!(registry.len(), 1);
        assert!(kept.try_recv().is_ok());
        assert!(registry.send_to(&kept_id, &reset_event()));
    }

    #[test]
    fn send_to_targets_one_subscriber() {
        let registry = SubscriberRegistry::new();
        let (a_id, mut a) = registry.subscribe();
        let (_, mut b) = registry.subscribe();

        assert!(registry.send_to(&a_id, &WorkflowEvent::error("workflow", "already running")));
        assert!(a.try_recv().unwrap().contains("already running"));
        assert!(b.try_recv().is_err());

        assert!(!registry.send_to(&Uuid::new_v4(), &reset_event()));
    }

    #[test]
    fn unsubscribe_removes() {
        let registry = SubscriberRegistry::new();
        let (id, _rx) = registry.subscribe();
        assert!(registry.unsubscribe(&id));
        assert!(!registry.unsubscribe(&id));
        assert!(registry.is_empty());
    }
}
