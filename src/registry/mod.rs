//! Registry layer: the object registry contract and an in-memory
//! implementation.

pub mod in_memory;
pub mod listener;
pub mod object_registry;
pub mod query;

pub use in_memory::{HANDLE_NOTIFICATION, InMemoryRegistry};
pub use listener::{BeanNotification, NotificationListener};
pub use object_registry::{Attribute, LoaderRef, ObjectInstance, ObjectRegistry};
pub use query::{AttributeEquals, KeyPropertyMatches, QueryError, QueryExp};
