//! Turning materialized objects into registrable beans.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::{BeanInstance, ManagedBean};

/// The adapter found no usable management interface for an object.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct NotCompliant {
    reason: String,
}

impl NotCompliant {
    /// Creates the error with a human-readable reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Returns the reason.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Decides whether a materialized object is directly registrable, and
/// wraps it when it is not.
pub trait BeanAdapter: Send + Sync + fmt::Debug {
    /// Adapts `instance`, given the type names its source publishes.
    ///
    /// # Errors
    ///
    /// Returns [`NotCompliant`] if no published type is recognizable as a
    /// management interface.
    fn adapt(
        &self,
        instance: BeanInstance,
        published_types: &[String],
    ) -> Result<Arc<dyn ManagedBean>, NotCompliant>;
}

/// Builds a [`ManagedBean`] around a raw object, or declines with `None`
/// if the object is not of the expected concrete type.
pub type WrapperFactory =
    Arc<dyn Fn(Arc<dyn Any + Send + Sync>) -> Option<Arc<dyn ManagedBean>> + Send + Sync>;

/// Naming-convention adapter.
///
/// [`BeanInstance::Managed`] objects register as they are. A
/// [`BeanInstance::Raw`] object needs a published type whose name ends in
/// `MBean` or `MXBean` with a wrapper factory registered for it; the
/// first such type whose factory accepts the object wins.
#[derive(Default)]
pub struct StandardBeanAdapter {
    wrappers: HashMap<String, WrapperFactory>,
}

impl StandardBeanAdapter {
    /// Creates an adapter with no wrapper factories.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the wrapper for a management interface type name.
    #[must_use]
    pub fn with_wrapper<F>(mut self, interface: impl Into<String>, factory: F) -> Self
    where
        F: Fn(Arc<dyn Any + Send + Sync>) -> Option<Arc<dyn ManagedBean>> + Send + Sync + 'static,
    {
        self.wrappers.insert(interface.into(), Arc::new(factory));
        self
    }

    /// Returns `true` if the type name follows the management interface
    /// naming convention.
    #[must_use]
    pub fn is_management_interface(type_name: &str) -> bool {
        type_name.ends_with("MBean") || type_name.ends_with("MXBean")
    }
}

impl fmt::Debug for StandardBeanAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardBeanAdapter")
            .field("wrappers", &self.wrappers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl BeanAdapter for StandardBeanAdapter {
    fn adapt(
        &self,
        instance: BeanInstance,
        published_types: &[String],
    ) -> Result<Arc<dyn ManagedBean>, NotCompliant> {
        let raw = match instance {
            BeanInstance::Managed(bean) => return Ok(bean),
            BeanInstance::Raw(raw) => raw,
        };

        let interfaces: Vec<&String> = published_types
            .iter()
            .filter(|t| Self::is_management_interface(t))
            .collect();
        if interfaces.is_empty() {
            return Err(NotCompliant::new(format!(
                "none of {published_types:?} is a management interface"
            )));
        }

        interfaces
            .iter()
            .filter_map(|t| self.wrappers.get(t.as_str()))
            .find_map(|wrap| wrap(Arc::clone(&raw)))
            .ok_or_else(|| {
                NotCompliant::new(format!("no wrapper accepted the object for {interfaces:?}"))
            })
    }
}
