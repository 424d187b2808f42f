//! Domain layer: object names, the deferred registration state machine,
//! and the notification system.
//!
//! This module contains the activation core: per-name
//! [`RegistrationHolder`]s, the [`DeferredRegistry`] that decides which
//! thread performs each registration, and the [`NotificationSink`] /
//! [`EventBus`] pair that announces registration lifecycle changes.

pub mod deferred_registry;
pub mod event_bus;
pub mod listener_id;
pub mod notification_sink;
pub mod object_name;
pub mod registration_event;
pub mod registration_holder;

pub use deferred_registry::{DeferredRegistry, ResolveOutcome};
pub use event_bus::EventBus;
pub use listener_id::ListenerId;
pub use notification_sink::NotificationSink;
pub use object_name::{ObjectName, ObjectNameError};
pub use registration_event::RegistrationEvent;
pub use registration_holder::{DEFAULT_WAIT, Phase, RegistrationHolder, WaitPolicy};
