//! Broadcast of domain events to code that holds no reference to whoever produced them.

use tokio::sync::broadcast;
use tracing::trace;

const DEFAULT_CAPACITY: usize = 64;

/// Fan-out channel for domain events. Clones share the channel.
///
/// Publishing with no subscribers is fine; the event is dropped.
#[derive(Debug, Clone)]
pub struct EventBus<E: Clone> {
    sender: broadcast::Sender<E>,
}

impl<E: Clone + Send + std::fmt::Debug + 'static> EventBus<E> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Returns how many subscribers received the event.
    pub fn publish(&self, event: E) -> usize {
        trace!(?event, "Publishing event");
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<E: Clone + Send + std::fmt::Debug + 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_subscriber_sees_the_event() {
        let bus = EventBus::<String>::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        assert_eq!(bus.publish("saved".to_string()), 2);
        assert_eq!(a.recv().await.unwrap(), "saved");
        assert_eq!(b.recv().await.unwrap(), "saved");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::<u32>::new();
        assert_eq!(bus.publish(1), 0);
    }
}
