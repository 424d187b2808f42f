//! The name-keyed object registry contract.
//!
//! [`ObjectRegistry`] is implemented both by plain registries such as
//! [`super::InMemoryRegistry`] and by
//! [`crate::service::ForwardingFacade`], which layers deferred activation
//! on top of another registry and can therefore be dropped in wherever a
//! registry is expected.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{NotificationListener, QueryExp};
use crate::bean::{BeanInfo, BeanInstance, ManagedBean};
use crate::domain::{ListenerId, ObjectName};
use crate::error::RegistryError;

/// A registered name together with the class its bean reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectInstance {
    /// Registered name.
    pub name: ObjectName,
    /// Class name reported by the bean.
    pub class_name: String,
}

/// A named attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name.
    pub name: String,
    /// Attribute value.
    pub value: Value,
}

impl Attribute {
    /// Creates an attribute.
    #[must_use]
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Identifies the module whose types a bean was loaded from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoaderRef(String);

impl LoaderRef {
    /// Creates a loader reference for a module name.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self(module.into())
    }

    /// Returns the module name.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LoaderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Full surface of a name-keyed management object registry.
///
/// All operations are synchronous and may be called from any thread.
pub trait ObjectRegistry: Send + Sync + fmt::Debug {
    /// Registers `bean` under `name`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InstanceAlreadyExists`] if the name is taken,
    /// [`RegistryError::MalformedName`] for patterns, and
    /// [`RegistryError::RegistrationFailed`] if the bean vetoes.
    fn register_bean(
        &self,
        bean: Arc<dyn ManagedBean>,
        name: &ObjectName,
    ) -> Result<ObjectInstance, RegistryError>;

    /// Instantiates `class_name` with a known factory and registers it.
    ///
    /// # Errors
    ///
    /// [`RegistryError::ClassNotFound`] plus the errors of
    /// [`ObjectRegistry::register_bean`].
    fn create_bean(&self, class_name: &str, name: &ObjectName)
    -> Result<ObjectInstance, RegistryError>;

    /// Removes the bean registered under `name`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InstanceNotFound`] or
    /// [`RegistryError::UnregistrationFailed`].
    fn unregister_bean(&self, name: &ObjectName) -> Result<(), RegistryError>;

    /// Looks up a registered bean.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InstanceNotFound`].
    fn get_instance(&self, name: &ObjectName) -> Result<ObjectInstance, RegistryError>;

    /// Returns the instances selected by `pattern` (all if `None`) and
    /// accepted by `query`. A query that fails on an entry excludes it.
    fn query_instances(
        &self,
        pattern: Option<&ObjectName>,
        query: Option<&dyn QueryExp>,
    ) -> BTreeSet<ObjectInstance>;

    /// Returns the names selected by `pattern` and accepted by `query`.
    fn query_names(
        &self,
        pattern: Option<&ObjectName>,
        query: Option<&dyn QueryExp>,
    ) -> BTreeSet<ObjectName>;

    /// Returns `true` if `name` is visible.
    fn is_registered(&self, name: &ObjectName) -> bool;

    /// Returns the number of visible names.
    fn bean_count(&self) -> usize;

    /// Reads one attribute.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InstanceNotFound`] or [`RegistryError::Bean`].
    fn get_attribute(&self, name: &ObjectName, attribute: &str) -> Result<Value, RegistryError>;

    /// Reads several attributes; unreadable ones are omitted.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InstanceNotFound`].
    fn get_attributes(
        &self,
        name: &ObjectName,
        attributes: &[&str],
    ) -> Result<Vec<Attribute>, RegistryError>;

    /// Writes one attribute.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InstanceNotFound`] or [`RegistryError::Bean`].
    fn set_attribute(&self, name: &ObjectName, attribute: Attribute) -> Result<(), RegistryError>;

    /// Writes several attributes and returns the ones that were applied.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InstanceNotFound`].
    fn set_attributes(
        &self,
        name: &ObjectName,
        attributes: Vec<Attribute>,
    ) -> Result<Vec<Attribute>, RegistryError>;

    /// Invokes an operation.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InstanceNotFound`] or [`RegistryError::Bean`].
    fn invoke(
        &self,
        name: &ObjectName,
        operation: &str,
        params: &[Value],
    ) -> Result<Value, RegistryError>;

    /// Domain used for names registered without an explicit one.
    fn default_domain(&self) -> String;

    /// Returns every domain with at least one visible name.
    fn domains(&self) -> BTreeSet<String>;

    /// Attaches a listener to a bean.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InstanceNotFound`].
    fn add_listener(
        &self,
        name: &ObjectName,
        listener: Arc<dyn NotificationListener>,
    ) -> Result<ListenerId, RegistryError>;

    /// Detaches a listener.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InstanceNotFound`] or
    /// [`RegistryError::ListenerNotFound`].
    fn remove_listener(&self, name: &ObjectName, listener: ListenerId) -> Result<(), RegistryError>;

    /// Attaches the bean registered as `listener` to `name`. Notifications
    /// emitted by `name` are delivered to the listener bean's
    /// `handleNotification` operation.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InstanceNotFound`] if either name is not registered.
    fn add_listener_bean(&self, name: &ObjectName, listener: &ObjectName)
    -> Result<(), RegistryError>;

    /// Detaches every attachment of the listener bean `listener` from
    /// `name`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InstanceNotFound`] or
    /// [`RegistryError::ListenerBeanNotFound`].
    fn remove_listener_bean(
        &self,
        name: &ObjectName,
        listener: &ObjectName,
    ) -> Result<(), RegistryError>;

    /// Returns a bean's metadata.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InstanceNotFound`].
    fn bean_info(&self, name: &ObjectName) -> Result<BeanInfo, RegistryError>;

    /// Returns `true` if the bean's class or declared interfaces include
    /// `class_name`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InstanceNotFound`].
    fn is_instance_of(&self, name: &ObjectName, class_name: &str) -> Result<bool, RegistryError>;

    /// Returns the loader that owns the bean's types.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InstanceNotFound`].
    fn class_loader_for(&self, name: &ObjectName) -> Result<LoaderRef, RegistryError>;

    /// Instantiates `class_name` without registering it.
    ///
    /// # Errors
    ///
    /// [`RegistryError::ClassNotFound`].
    fn instantiate(&self, class_name: &str) -> Result<BeanInstance, RegistryError>;

    /// Decodes `data` in the context of the bean registered under `name`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InstanceNotFound`] or
    /// [`RegistryError::Deserialization`].
    fn deserialize(&self, name: &ObjectName, data: &[u8]) -> Result<Value, RegistryError>;

    /// Decodes `data` in the context of a known class.
    ///
    /// # Errors
    ///
    /// [`RegistryError::ClassNotFound`] or
    /// [`RegistryError::Deserialization`].
    fn deserialize_with_class(&self, class_name: &str, data: &[u8])
    -> Result<Value, RegistryError>;
}
