use tokio::sync::broadcast;
use tracing::{debug, warn};

// Event manager for publishing SSE mutation events to API subscribers.
pub struct EventManager {
    tx: broadcast::Sender<String>,
}

impl EventManager {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self { tx }
    }

    // Create a new subscription to events
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    // Publish an event such as "subnet4_created:<id>". Dropped silently when
    // nobody is subscribed.
    pub fn send(&self, message: String) {
        if self.tx.receiver_count() == 0 {
            debug!("No receivers for event: {}", message);
            return;
        }
        match self.tx.send(message.clone()) {
            Ok(n) => debug!("Event sent to {} receivers: {}", n, message),
            Err(e) => warn!("Failed to send event: {}", e),
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new()
    }
}

// Make EventManager safe to clone by wrapping the shared channel
impl Clone for EventManager {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_increases_count() {
        let em = EventManager::new();
        assert_eq!(em.receiver_count(), 0);
        let _rx = em.subscribe();
        assert_eq!(em.receiver_count(), 1);
    }

    #[tokio::test]
    async fn test_receive_message() {
        let em = EventManager::new();
        let mut rx = em.subscribe();
        em.send("subnet4_created:test".to_string());
        assert_eq!(rx.recv().await.unwrap(), "subnet4_created:test");
    }

    #[test]
    fn test_send_without_receivers_is_dropped() {
        let em = EventManager::new();
        // Must not panic or block.
        em.send("pool4_deleted:test".to_string());
    }

    #[test]
    fn test_clone_shares_channel() {
        let em1 = EventManager::new();
        let em2 = em1.clone();
        let _rx = em1.subscribe();
        assert_eq!(em2.receiver_count(), 1);
    }
}
