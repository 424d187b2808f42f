//! Broadcast channel for registration events.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel and implements
//! [`NotificationSink`], so every declaration, failed resolution, and
//! cancellation is fanned out to all subscribers. Publishing never blocks
//! and works from plain threads as well as async tasks.

use tokio::sync::broadcast;

use super::{NotificationSink, ObjectName, RegistrationEvent};

/// Broadcast bus for [`RegistrationEvent`]s.
///
/// When the ring buffer is full, the oldest events are dropped for lagging
/// receivers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RegistrationEvent>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event.
    /// If there are no active receivers, the event is silently dropped.
    pub fn publish(&self, event: RegistrationEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Creates a new receiver that will receive all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RegistrationEvent> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl NotificationSink for EventBus {
    fn on_registered(&self, name: &ObjectName) {
        let _ = self.publish(RegistrationEvent::registered(name.clone()));
    }

    fn on_unregistered(&self, name: &ObjectName) {
        let _ = self.publish(RegistrationEvent::unregistered(name.clone()));
    }
}
