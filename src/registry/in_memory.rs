//! In-process object registry.
//!
//! [`InMemoryRegistry`] stores every registered bean in a `HashMap` behind
//! a [`parking_lot::RwLock`]. Bean code (attribute access, operations,
//! lifecycle hooks, listeners) always runs after the lock is released, so
//! a bean may call back into the registry.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;

use super::query::selects;
use super::{
    Attribute, BeanNotification, LoaderRef, NotificationListener, ObjectInstance, ObjectRegistry,
    QueryExp,
};
use crate::bean::{BeanInfo, BeanInstance, ManagedBean};
use crate::domain::{ListenerId, ObjectName};
use crate::error::RegistryError;

/// Loader reported for beans that declare no owning module.
pub const SYSTEM_LOADER: &str = "system";

/// Operation invoked on listener beans for each notification.
pub const HANDLE_NOTIFICATION: &str = "handleNotification";

type BeanFactory = Arc<dyn Fn() -> Arc<dyn ManagedBean> + Send + Sync>;

#[derive(Debug)]
struct Entry {
    bean: Arc<dyn ManagedBean>,
    class_name: String,
    listeners: Vec<(ListenerId, Arc<dyn NotificationListener>)>,
    listener_beans: Vec<ObjectName>,
}

/// Thread-safe in-memory implementation of [`ObjectRegistry`].
pub struct InMemoryRegistry {
    default_domain: String,
    beans: RwLock<HashMap<ObjectName, Entry>>,
    factories: RwLock<HashMap<String, BeanFactory>>,
    sequence: AtomicU64,
}

impl InMemoryRegistry {
    /// Creates an empty registry with the given default domain.
    #[must_use]
    pub fn new(default_domain: impl Into<String>) -> Self {
        Self {
            default_domain: default_domain.into(),
            beans: RwLock::new(HashMap::new()),
            factories: RwLock::new(HashMap::new()),
            sequence: AtomicU64::new(0),
        }
    }

    /// Registers a factory used by `create_bean` and `instantiate`.
    pub fn register_factory<F>(&self, class_name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn ManagedBean> + Send + Sync + 'static,
    {
        self.factories
            .write()
            .insert(class_name.into(), Arc::new(factory));
    }

    /// Builder form of [`InMemoryRegistry::register_factory`].
    #[must_use]
    pub fn with_factory<F>(self, class_name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn ManagedBean> + Send + Sync + 'static,
    {
        self.register_factory(class_name, factory);
        self
    }

    /// Delivers a notification to every listener attached to `name`.
    ///
    /// Listener beans receive it through their `handleNotification`
    /// operation, with the notification as a JSON argument; a listener bean
    /// that is no longer registered or that rejects the call is skipped.
    /// Returns the number of listeners that received it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InstanceNotFound`] if nothing is registered
    /// under `name`.
    pub fn emit(
        &self,
        name: &ObjectName,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<usize, RegistryError> {
        let (listeners, listener_beans) = {
            let beans = self.beans.read();
            let entry = beans
                .get(name)
                .ok_or_else(|| RegistryError::InstanceNotFound(name.clone()))?;
            let listeners: Vec<Arc<dyn NotificationListener>> = entry
                .listeners
                .iter()
                .map(|(_, l)| Arc::clone(l))
                .collect();
            let listener_beans: Vec<(ObjectName, Arc<dyn ManagedBean>)> = entry
                .listener_beans
                .iter()
                .filter_map(|l| beans.get(l).map(|e| (l.clone(), Arc::clone(&e.bean))))
                .collect();
            (listeners, listener_beans)
        };

        let notification = BeanNotification {
            source: name.clone(),
            kind: kind.into(),
            message: message.into(),
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            timestamp: Utc::now(),
        };
        for listener in &listeners {
            listener.handle_notification(&notification);
        }

        let mut delivered = listeners.len();
        if !listener_beans.is_empty() {
            let payload = serde_json::to_value(&notification)?;
            for (listener, bean) in &listener_beans {
                match bean.invoke(HANDLE_NOTIFICATION, std::slice::from_ref(&payload)) {
                    Ok(_) => delivered += 1,
                    Err(err) => {
                        tracing::debug!(%name, %listener, error = %err, "listener bean rejected notification");
                    }
                }
            }
        }
        Ok(delivered)
    }

    fn bean(&self, name: &ObjectName) -> Result<Arc<dyn ManagedBean>, RegistryError> {
        self.beans
            .read()
            .get(name)
            .map(|entry| Arc::clone(&entry.bean))
            .ok_or_else(|| RegistryError::InstanceNotFound(name.clone()))
    }

    fn factory(&self, class_name: &str) -> Result<BeanFactory, RegistryError> {
        self.factories
            .read()
            .get(class_name)
            .cloned()
            .ok_or_else(|| RegistryError::ClassNotFound(class_name.to_string()))
    }

    fn snapshot(&self) -> Vec<ObjectInstance> {
        self.beans
            .read()
            .iter()
            .map(|(name, entry)| ObjectInstance {
                name: name.clone(),
                class_name: entry.class_name.clone(),
            })
            .collect()
    }

    fn bean_error(name: &ObjectName) -> impl FnOnce(crate::error::BeanError) -> RegistryError {
        let name = name.clone();
        move |source| RegistryError::Bean { name, source }
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new("DefaultDomain")
    }
}

impl std::fmt::Debug for InMemoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRegistry")
            .field("default_domain", &self.default_domain)
            .field("beans", &self.beans.read().len())
            .field("factories", &self.factories.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ObjectRegistry for InMemoryRegistry {
    fn register_bean(
        &self,
        bean: Arc<dyn ManagedBean>,
        name: &ObjectName,
    ) -> Result<ObjectInstance, RegistryError> {
        if name.is_pattern() {
            return Err(RegistryError::MalformedName(format!(
                "cannot register under pattern {name}"
            )));
        }
        bean.pre_register(name)
            .map_err(|err| RegistryError::RegistrationFailed {
                name: name.clone(),
                reason: err.to_string(),
            })?;
        let class_name = bean.info().class_name;

        let mut beans = self.beans.write();
        if beans.contains_key(name) {
            return Err(RegistryError::InstanceAlreadyExists(name.clone()));
        }
        beans.insert(
            name.clone(),
            Entry {
                bean,
                class_name: class_name.clone(),
                listeners: Vec::new(),
                listener_beans: Vec::new(),
            },
        );
        drop(beans);

        tracing::debug!(%name, class_name, "bean registered");
        Ok(ObjectInstance {
            name: name.clone(),
            class_name,
        })
    }

    fn create_bean(
        &self,
        class_name: &str,
        name: &ObjectName,
    ) -> Result<ObjectInstance, RegistryError> {
        let factory = self.factory(class_name)?;
        self.register_bean(factory(), name)
    }

    fn unregister_bean(&self, name: &ObjectName) -> Result<(), RegistryError> {
        let bean = self.bean(name)?;
        bean.pre_deregister()
            .map_err(|err| RegistryError::UnregistrationFailed {
                name: name.clone(),
                reason: err.to_string(),
            })?;
        self.beans
            .write()
            .remove(name)
            .ok_or_else(|| RegistryError::InstanceNotFound(name.clone()))?;
        tracing::debug!(%name, "bean unregistered");
        Ok(())
    }

    fn get_instance(&self, name: &ObjectName) -> Result<ObjectInstance, RegistryError> {
        self.beans
            .read()
            .get(name)
            .map(|entry| ObjectInstance {
                name: name.clone(),
                class_name: entry.class_name.clone(),
            })
            .ok_or_else(|| RegistryError::InstanceNotFound(name.clone()))
    }

    fn query_instances(
        &self,
        pattern: Option<&ObjectName>,
        query: Option<&dyn QueryExp>,
    ) -> BTreeSet<ObjectInstance> {
        self.snapshot()
            .into_iter()
            .filter(|instance| selects(&instance.name, pattern, query, self))
            .collect()
    }

    fn query_names(
        &self,
        pattern: Option<&ObjectName>,
        query: Option<&dyn QueryExp>,
    ) -> BTreeSet<ObjectName> {
        self.snapshot()
            .into_iter()
            .map(|instance| instance.name)
            .filter(|name| selects(name, pattern, query, self))
            .collect()
    }

    fn is_registered(&self, name: &ObjectName) -> bool {
        self.beans.read().contains_key(name)
    }

    fn bean_count(&self) -> usize {
        self.beans.read().len()
    }

    fn get_attribute(&self, name: &ObjectName, attribute: &str) -> Result<Value, RegistryError> {
        self.bean(name)?
            .get_attribute(attribute)
            .map_err(Self::bean_error(name))
    }

    fn get_attributes(
        &self,
        name: &ObjectName,
        attributes: &[&str],
    ) -> Result<Vec<Attribute>, RegistryError> {
        let bean = self.bean(name)?;
        Ok(attributes
            .iter()
            .filter_map(|attr| {
                bean.get_attribute(attr)
                    .ok()
                    .map(|value| Attribute::new(*attr, value))
            })
            .collect())
    }

    fn set_attribute(&self, name: &ObjectName, attribute: Attribute) -> Result<(), RegistryError> {
        self.bean(name)?
            .set_attribute(&attribute.name, attribute.value)
            .map_err(Self::bean_error(name))
    }

    fn set_attributes(
        &self,
        name: &ObjectName,
        attributes: Vec<Attribute>,
    ) -> Result<Vec<Attribute>, RegistryError> {
        let bean = self.bean(name)?;
        Ok(attributes
            .into_iter()
            .filter(|attr| bean.set_attribute(&attr.name, attr.value.clone()).is_ok())
            .collect())
    }

    fn invoke(
        &self,
        name: &ObjectName,
        operation: &str,
        params: &[Value],
    ) -> Result<Value, RegistryError> {
        self.bean(name)?
            .invoke(operation, params)
            .map_err(Self::bean_error(name))
    }

    fn default_domain(&self) -> String {
        self.default_domain.clone()
    }

    fn domains(&self) -> BTreeSet<String> {
        self.beans
            .read()
            .keys()
            .map(|name| name.domain().to_string())
            .collect()
    }

    fn add_listener(
        &self,
        name: &ObjectName,
        listener: Arc<dyn NotificationListener>,
    ) -> Result<ListenerId, RegistryError> {
        let mut beans = self.beans.write();
        let entry = beans
            .get_mut(name)
            .ok_or_else(|| RegistryError::InstanceNotFound(name.clone()))?;
        let id = ListenerId::new();
        entry.listeners.push((id, listener));
        Ok(id)
    }

    fn remove_listener(&self, name: &ObjectName, listener: ListenerId) -> Result<(), RegistryError> {
        let mut beans = self.beans.write();
        let entry = beans
            .get_mut(name)
            .ok_or_else(|| RegistryError::InstanceNotFound(name.clone()))?;
        let before = entry.listeners.len();
        entry.listeners.retain(|(id, _)| *id != listener);
        if entry.listeners.len() == before {
            return Err(RegistryError::ListenerNotFound {
                name: name.clone(),
                listener,
            });
        }
        Ok(())
    }

    fn add_listener_bean(
        &self,
        name: &ObjectName,
        listener: &ObjectName,
    ) -> Result<(), RegistryError> {
        let mut beans = self.beans.write();
        if !beans.contains_key(listener) {
            return Err(RegistryError::InstanceNotFound(listener.clone()));
        }
        let entry = beans
            .get_mut(name)
            .ok_or_else(|| RegistryError::InstanceNotFound(name.clone()))?;
        entry.listener_beans.push(listener.clone());
        Ok(())
    }

    fn remove_listener_bean(
        &self,
        name: &ObjectName,
        listener: &ObjectName,
    ) -> Result<(), RegistryError> {
        let mut beans = self.beans.write();
        let entry = beans
            .get_mut(name)
            .ok_or_else(|| RegistryError::InstanceNotFound(name.clone()))?;
        let before = entry.listener_beans.len();
        entry.listener_beans.retain(|l| l != listener);
        if entry.listener_beans.len() == before {
            return Err(RegistryError::ListenerBeanNotFound {
                name: name.clone(),
                listener: listener.clone(),
            });
        }
        Ok(())
    }

    fn bean_info(&self, name: &ObjectName) -> Result<BeanInfo, RegistryError> {
        Ok(self.bean(name)?.info())
    }

    fn is_instance_of(&self, name: &ObjectName, class_name: &str) -> Result<bool, RegistryError> {
        let info = self.bean(name)?.info();
        Ok(info.class_name == class_name || info.interfaces.iter().any(|i| i == class_name))
    }

    fn class_loader_for(&self, name: &ObjectName) -> Result<LoaderRef, RegistryError> {
        let info = self.bean(name)?.info();
        Ok(LoaderRef::new(
            info.module.unwrap_or_else(|| SYSTEM_LOADER.to_string()),
        ))
    }

    fn instantiate(&self, class_name: &str) -> Result<BeanInstance, RegistryError> {
        let factory = self.factory(class_name)?;
        Ok(BeanInstance::Managed(factory()))
    }

    fn deserialize(&self, name: &ObjectName, data: &[u8]) -> Result<Value, RegistryError> {
        if !self.is_registered(name) {
            return Err(RegistryError::InstanceNotFound(name.clone()));
        }
        Ok(serde_json::from_slice(data)?)
    }

    fn deserialize_with_class(
        &self,
        class_name: &str,
        data: &[u8],
    ) -> Result<Value, RegistryError> {
        let _ = self.factory(class_name)?;
        Ok(serde_json::from_slice(data)?)
    }
}
