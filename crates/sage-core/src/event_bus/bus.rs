use super::types::GraphEvent;
use tokio::sync::broadcast;

/// Broadcast bus for [`GraphEvent`]s.
///
/// Subscribers that fall more than `capacity` events behind receive
/// `RecvError::Lagged`; the publisher never blocks.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<GraphEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Receive every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<GraphEvent> {
        self.sender.subscribe()
    }

    /// Publish to all subscribers; returns how many received it.
    pub fn publish(&self, event: GraphEvent) -> usize {
        // No subscribers is not an error
        self.sender.send(event).unwrap_or(0)
    }

    /// Active subscribers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
