//! Registration lifecycle events.
//!
//! Every declared or cancelled pending registration emits a
//! [`RegistrationEvent`] through a [`super::NotificationSink`]. The
//! [`super::EventBus`] sink broadcasts them to any number of subscribers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ObjectName;

/// Event announcing that a name became, or stopped being, visible.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum RegistrationEvent {
    /// The name is eligible for access. For deferred registrations this is
    /// announced before the bean has been materialized.
    Registered {
        /// Name that became visible.
        name: ObjectName,
        /// Emission timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The name is no longer visible.
    Unregistered {
        /// Name that went away.
        name: ObjectName,
        /// Emission timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl RegistrationEvent {
    /// Builds a `Registered` event stamped with the current time.
    #[must_use]
    pub fn registered(name: ObjectName) -> Self {
        Self::Registered {
            name,
            timestamp: Utc::now(),
        }
    }

    /// Builds an `Unregistered` event stamped with the current time.
    #[must_use]
    pub fn unregistered(name: ObjectName) -> Self {
        Self::Unregistered {
            name,
            timestamp: Utc::now(),
        }
    }

    /// Returns the name this event refers to.
    #[must_use]
    pub fn name(&self) -> &ObjectName {
        match self {
            Self::Registered { name, .. } | Self::Unregistered { name, .. } => name,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::Registered { .. } => "registered",
            Self::Unregistered { .. } => "unregistered",
        }
    }
}
