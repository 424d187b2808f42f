//! Type-safe notification listener handle.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Handle returned when a listener is attached to a bean.
///
/// Wraps a UUID v4. Pass it back to
/// [`crate::registry::ObjectRegistry::remove_listener`] to detach the same
/// listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListenerId(uuid::Uuid);

impl ListenerId {
    /// Creates a new random `ListenerId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_generates_unique_ids() {
        assert_ne!(ListenerId::new(), ListenerId::new());
    }

    #[test]
    fn display_is_uuid_format() {
        let s = ListenerId::new().to_string();
        assert_eq!(s.len(), 36);
    }
}
