//! Receiver of registration lifecycle notifications.

use std::fmt;

use super::ObjectName;

/// Receives "registered" / "unregistered" announcements from the
/// [`super::DeferredRegistry`].
///
/// # Eventual consistency
///
/// `on_registered` fires when a name is *declared* pending, before any
/// bean has been materialized. It announces eligibility, not success. If
/// resolution later fails, or the pending registration is cancelled, a
/// matching `on_unregistered` follows. Implementations must not assume that
/// a name reported as registered can actually be accessed.
///
/// Both callbacks run on the thread that triggered them and must not block
/// on the registry that invoked them.
pub trait NotificationSink: Send + Sync + fmt::Debug {
    /// The name became eligible for access.
    fn on_registered(&self, name: &ObjectName);

    /// The name is no longer visible.
    fn on_unregistered(&self, name: &ObjectName);
}
