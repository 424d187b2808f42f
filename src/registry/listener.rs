//! Per-bean notification listeners.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::ObjectName;

/// A notification emitted by or on behalf of a registered bean.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeanNotification {
    /// Bean that emitted the notification.
    pub source: ObjectName,
    /// Dotted notification type, e.g. `cache.evicted`.
    pub kind: String,
    /// Human-readable message.
    pub message: String,
    /// Registry-wide sequence number.
    pub sequence: u64,
    /// Emission timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Receives notifications from the beans it is attached to.
pub trait NotificationListener: Send + Sync + fmt::Debug {
    /// Handles one notification. Runs on the emitting thread.
    fn handle_notification(&self, notification: &BeanNotification);
}
