use crate::error::EventBusError;
use crate::feed::FeedInfoMap;
use crate::frame::DerivedFrame;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

/// Events published by the feed service
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// Metadata for every camera and feed of the current configuration
    FeedsInformation { feeds: FeedInfoMap },
    /// A feed produced a frame
    NewFrame { frame: DerivedFrame },
}

impl FeedEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            FeedEvent::FeedsInformation { feeds } => {
                format!("Feeds information ({} entries)", feeds.len())
            }
            FeedEvent::NewFrame { frame } => {
                format!("Frame {} from feed {}", frame.frame_number, frame.feed)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            FeedEvent::FeedsInformation { .. } => "feeds_information",
            FeedEvent::NewFrame { .. } => "new_frame",
        }
    }
}

/// Event bus for display and saving consumers using broadcast channels
pub struct EventBus {
    sender: broadcast::Sender<FeedEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Publish an event to all subscribers, returning how many received it
    pub fn publish(&self, event: FeedEvent) -> Result<usize, EventBusError> {
        match &event {
            FeedEvent::FeedsInformation { .. } => debug!("Publishing {}", event.description()),
            FeedEvent::NewFrame { .. } => trace!("Publishing {}", event.description()),
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Receiving end of the event bus
pub struct EventReceiver {
    receiver: broadcast::Receiver<FeedEvent>,
}

impl EventReceiver {
    /// Receive the next event
    pub async fn recv(&mut self) -> Result<FeedEvent, EventBusError> {
        match self.receiver.recv().await {
            Ok(event) => Ok(event),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Feed event receiver lagged behind by {} events", n);
                Err(EventBusError::Lagged { skipped: n })
            }
            Err(broadcast::error::RecvError::Closed) => Err(EventBusError::ChannelClosed),
        }
    }

    /// Try to receive an event without waiting
    pub fn try_recv(&mut self) -> Result<Option<FeedEvent>, EventBusError> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Lagged(n)) => {
                warn!("Feed event receiver lagged behind by {} events", n);
                Err(EventBusError::Lagged { skipped: n })
            }
            Err(broadcast::error::TryRecvError::Closed) => Err(EventBusError::ChannelClosed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::{timeout, Duration};

    fn new_frame_event(number: u64) -> FeedEvent {
        FeedEvent::NewFrame {
            frame: DerivedFrame {
                feed: "camera1-avg".to_string(),
                frame_number: number,
                width: 4,
                height: 1,
                data: Arc::new(vec![1, 2, 3, 4]),
            },
        }
    }

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let subscriber_count = event_bus.publish(new_frame_event(3)).unwrap();
        assert_eq!(subscriber_count, 1);

        match receiver.recv().await.unwrap() {
            FeedEvent::NewFrame { frame } => {
                assert_eq!(frame.frame_number, 3);
                assert_eq!(frame.feed, "camera1-avg");
            }
            other => panic!("Unexpected event type: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.clone().subscribe();

        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus
            .publish(FeedEvent::FeedsInformation {
                feeds: FeedInfoMap::new(),
            })
            .unwrap();

        let first = timeout(Duration::from_millis(100), receiver1.recv())
            .await
            .unwrap()
            .unwrap();
        let second = timeout(Duration::from_millis(100), receiver2.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.event_type(), "feeds_information");
        assert_eq!(second.event_type(), "feeds_information");
    }

    #[test]
    fn test_publish_without_subscribers_fails() {
        let event_bus = EventBus::new(4);
        assert!(matches!(
            event_bus.publish(new_frame_event(0)),
            Err(EventBusError::PublishFailed { .. })
        ));
    }

    #[test]
    fn test_lagging_receiver() {
        let event_bus = EventBus::new(2);
        let mut receiver = event_bus.subscribe();

        for number in 0..4 {
            event_bus.publish(new_frame_event(number)).unwrap();
        }

        assert!(matches!(
            receiver.try_recv(),
            Err(EventBusError::Lagged { skipped: 2 })
        ));
        match receiver.try_recv().unwrap() {
            Some(FeedEvent::NewFrame { frame }) => assert_eq!(frame.frame_number, 2),
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_event_descriptions() {
        assert_eq!(new_frame_event(5).description(), "Frame 5 from feed camera1-avg");
        assert_eq!(new_frame_event(5).event_type(), "new_frame");
    }
}
