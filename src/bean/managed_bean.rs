//! The registrable unit and its introspection metadata.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;

use crate::domain::ObjectName;
use crate::error::BeanError;

/// Metadata describing one attribute of a bean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeInfo {
    /// Attribute name.
    pub name: String,
    /// Whether `set_attribute` is accepted.
    pub writable: bool,
}

/// Introspection metadata for a managed bean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BeanInfo {
    /// Implementation class name reported for the bean.
    pub class_name: String,
    /// Free-form description.
    pub description: String,
    /// Exposed attributes.
    pub attributes: Vec<AttributeInfo>,
    /// Exposed operation names.
    pub operations: Vec<String>,
    /// Type names the bean declares it implements.
    pub interfaces: Vec<String>,
    /// Module that owns the bean's types, if known.
    pub module: Option<String>,
}

/// A management bean whose attributes and operations are reachable through
/// an [`crate::registry::ObjectRegistry`].
pub trait ManagedBean: Send + Sync + fmt::Debug {
    /// Returns the bean's metadata.
    fn info(&self) -> BeanInfo;

    /// Reads an attribute.
    ///
    /// # Errors
    ///
    /// Returns [`BeanError::AttributeNotFound`] for unknown attributes.
    fn get_attribute(&self, attribute: &str) -> Result<Value, BeanError>;

    /// Writes an attribute.
    ///
    /// # Errors
    ///
    /// Returns a [`BeanError`] if the attribute is unknown or read-only.
    fn set_attribute(&self, attribute: &str, value: Value) -> Result<(), BeanError>;

    /// Invokes a named operation.
    ///
    /// # Errors
    ///
    /// Returns a [`BeanError`] if the operation is unknown or fails.
    fn invoke(&self, operation: &str, params: &[Value]) -> Result<Value, BeanError>;

    /// Called by a registry just before the bean becomes visible.
    ///
    /// # Errors
    ///
    /// An error vetoes the registration.
    fn pre_register(&self, _name: &ObjectName) -> Result<(), BeanError> {
        Ok(())
    }

    /// Called by a registry just before the bean is removed.
    ///
    /// # Errors
    ///
    /// An error vetoes the unregistration.
    fn pre_deregister(&self) -> Result<(), BeanError> {
        Ok(())
    }
}

/// An object produced by a bean source, before adaptation.
#[derive(Clone)]
pub enum BeanInstance {
    /// Already usable as a [`ManagedBean`].
    Managed(Arc<dyn ManagedBean>),
    /// An arbitrary object that must be wrapped by a
    /// [`super::BeanAdapter`] before it can be registered.
    Raw(Arc<dyn Any + Send + Sync>),
}

impl fmt::Debug for BeanInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Managed(bean) => f.debug_tuple("Managed").field(bean).finish(),
            Self::Raw(_) => f.write_str("Raw(..)"),
        }
    }
}

type Operation = Arc<dyn Fn(&[Value]) -> Result<Value, BeanError> + Send + Sync>;

/// A ready-made [`ManagedBean`] backed by an attribute map and a table of
/// named operations.
pub struct AttributeBean {
    class_name: String,
    description: String,
    interfaces: Vec<String>,
    module: Option<String>,
    attributes: RwLock<BTreeMap<String, Value>>,
    read_only: BTreeSet<String>,
    operations: BTreeMap<String, Operation>,
}

impl AttributeBean {
    /// Creates an empty bean reporting the given class name.
    #[must_use]
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            description: String::new(),
            interfaces: Vec::new(),
            module: None,
            attributes: RwLock::new(BTreeMap::new()),
            read_only: BTreeSet::new(),
            operations: BTreeMap::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Declares an implemented interface.
    #[must_use]
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// Sets the owning module.
    #[must_use]
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Adds a writable attribute.
    #[must_use]
    pub fn with_attribute(self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.write().insert(name.into(), value);
        self
    }

    /// Adds an attribute that rejects writes.
    #[must_use]
    pub fn with_read_only_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        let name = name.into();
        self.read_only.insert(name.clone());
        self.attributes.write().insert(name, value);
        self
    }

    /// Adds a named operation.
    #[must_use]
    pub fn with_operation<F>(mut self, name: impl Into<String>, op: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, BeanError> + Send + Sync + 'static,
    {
        self.operations.insert(name.into(), Arc::new(op));
        self
    }
}

impl fmt::Debug for AttributeBean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeBean")
            .field("class_name", &self.class_name)
            .field("attributes", &*self.attributes.read())
            .field("operations", &self.operations.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ManagedBean for AttributeBean {
    fn info(&self) -> BeanInfo {
        let attributes = self
            .attributes
            .read()
            .keys()
            .map(|name| AttributeInfo {
                name: name.clone(),
                writable: !self.read_only.contains(name),
            })
            .collect();
        BeanInfo {
            class_name: self.class_name.clone(),
            description: self.description.clone(),
            attributes,
            operations: self.operations.keys().cloned().collect(),
            interfaces: self.interfaces.clone(),
            module: self.module.clone(),
        }
    }

    fn get_attribute(&self, attribute: &str) -> Result<Value, BeanError> {
        self.attributes
            .read()
            .get(attribute)
            .cloned()
            .ok_or_else(|| BeanError::AttributeNotFound(attribute.to_string()))
    }

    fn set_attribute(&self, attribute: &str, value: Value) -> Result<(), BeanError> {
        if self.read_only.contains(attribute) {
            return Err(BeanError::ReadOnly(attribute.to_string()));
        }
        let mut attributes = self.attributes.write();
        let slot = attributes
            .get_mut(attribute)
            .ok_or_else(|| BeanError::AttributeNotFound(attribute.to_string()))?;
        *slot = value;
        Ok(())
    }

    fn invoke(&self, operation: &str, params: &[Value]) -> Result<Value, BeanError> {
        let op = self
            .operations
            .get(operation)
            .ok_or_else(|| BeanError::OperationNotFound(operation.to_string()))?;
        op(params)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bean() -> AttributeBean {
        AttributeBean::new("com.example.Cache")
            .with_interface("com.example.CacheMBean")
            .with_attribute("Size", json!(10))
            .with_read_only_attribute("Name", json!("users"))
            .with_operation("clear", |_| Ok(Value::Null))
    }

    #[test]
    fn reads_and_writes_attributes() {
        let b = bean();
        assert_eq!(b.get_attribute("Size").ok(), Some(json!(10)));
        assert!(b.set_attribute("Size", json!(20)).is_ok());
        assert_eq!(b.get_attribute("Size").ok(), Some(json!(20)));
    }

    #[test]
    fn rejects_unknown_and_read_only() {
        let b = bean();
        assert_eq!(
            b.get_attribute("Missing"),
            Err(BeanError::AttributeNotFound("Missing".to_string()))
        );
        assert_eq!(
            b.set_attribute("Name", json!("x")),
            Err(BeanError::ReadOnly("Name".to_string()))
        );
        assert_eq!(
            b.set_attribute("Missing", json!(1)),
            Err(BeanError::AttributeNotFound("Missing".to_string()))
        );
    }

    #[test]
    fn invokes_operations() {
        let b = bean();
        assert_eq!(b.invoke("clear", &[]).ok(), Some(Value::Null));
        assert!(matches!(
            b.invoke("explode", &[]),
            Err(BeanError::OperationNotFound(_))
        ));
    }

    #[test]
    fn info_lists_members() {
        let info = bean().info();
        assert_eq!(info.class_name, "com.example.Cache");
        assert_eq!(info.operations, vec!["clear".to_string()]);
        assert_eq!(info.interfaces, vec!["com.example.CacheMBean".to_string()]);
        assert!(info.attributes.iter().any(|a| a.name == "Name" && !a.writable));
        assert!(info.attributes.iter().any(|a| a.name == "Size" && a.writable));
    }
}
