//! Registry facade that resolves pending registrations on first access.
//!
//! [`ForwardingFacade`] implements [`ObjectRegistry`] by composition: every
//! operation addressed to one or more names first resolves any pending
//! registration for each of them through the [`DeferredRegistry`], then
//! delegates unchanged to the underlying registry. Enumerations merge in
//! pending names without materializing them.
//!
//! Aggregate results (`query_names`, `domains`, `bean_count`) are
//! best-effort snapshots: the registry may change before the caller reads
//! them.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;

use crate::bean::{BeanInfo, BeanInstance, BeanSource, ManagedBean, TypeHierarchy};
use crate::domain::{DeferredRegistry, ListenerId, ObjectName, Phase, ResolveOutcome};
use crate::error::RegistryError;
use crate::registry::query::selects;
use crate::registry::{
    Attribute, LoaderRef, NotificationListener, ObjectInstance, ObjectRegistry, QueryExp,
};

/// Drop-in [`ObjectRegistry`] with deferred bean activation.
#[derive(Debug, Clone)]
pub struct ForwardingFacade {
    deferred: Arc<DeferredRegistry>,
    hierarchy: Arc<dyn TypeHierarchy>,
}

impl ForwardingFacade {
    /// Creates a facade over `deferred` and its underlying registry.
    #[must_use]
    pub fn new(deferred: Arc<DeferredRegistry>, hierarchy: Arc<dyn TypeHierarchy>) -> Self {
        Self {
            deferred,
            hierarchy,
        }
    }

    /// The deferred registry this facade resolves through.
    #[must_use]
    pub fn deferred(&self) -> &Arc<DeferredRegistry> {
        &self.deferred
    }

    /// Declares `name` as a pending registration backed by `source`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::MalformedName`] for patterns and
    /// [`RegistryError::InstanceAlreadyExists`] if the name is already live
    /// or pending.
    pub fn declare(&self, name: ObjectName, source: Arc<dyn BeanSource>) -> Result<(), RegistryError> {
        if name.is_pattern() {
            return Err(RegistryError::MalformedName(format!(
                "cannot declare pattern {name}"
            )));
        }
        if self.underlying().is_registered(&name) {
            return Err(RegistryError::InstanceAlreadyExists(name));
        }
        self.deferred.declare(name, source)?;
        Ok(())
    }

    /// Cancels the pending registration for `name`.
    ///
    /// Returns `true` if this call performed the cancellation.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::ResolutionTimedOut`] if another thread is
    /// resolving the name and does not finish in time.
    pub fn cancel(&self, name: &ObjectName) -> Result<bool, RegistryError> {
        Ok(self.deferred.cancel_pending(name)?)
    }

    fn underlying(&self) -> &dyn ObjectRegistry {
        self.deferred.underlying().as_ref()
    }

    /// Targeted resolve: a registration that ended `Unregistered` is
    /// reported as the name not existing.
    fn resolve(&self, name: &ObjectName) -> Result<(), RegistryError> {
        match self.deferred.resolve_pending(name)? {
            ResolveOutcome::NotPending => Ok(()),
            outcome if outcome.phase() == Some(Phase::Unregistered) => {
                tracing::debug!(%name, ?outcome, "targeted resolution ended unregistered");
                Err(RegistryError::InstanceNotFound(name.clone()))
            }
            outcome => {
                tracing::trace!(%name, ?outcome, "pending registration resolved");
                Ok(())
            }
        }
    }

    /// Resolve ahead of a write that claims the name: a failed activation
    /// just leaves the slot free, only a timeout stops the caller.
    fn settle(&self, name: &ObjectName) -> Result<(), RegistryError> {
        let outcome = self.deferred.resolve_pending(name)?;
        if outcome.phase() == Some(Phase::Unregistered) {
            tracing::debug!(%name, "pending registration discarded");
        }
        Ok(())
    }

    fn pending_selected(
        &self,
        pattern: Option<&ObjectName>,
        query: Option<&dyn QueryExp>,
    ) -> Vec<(ObjectName, Arc<dyn BeanSource>)> {
        self.deferred
            .pending_entries()
            .into_iter()
            .filter(|(name, _)| selects(name, pattern, query, self))
            .collect()
    }
}

impl ObjectRegistry for ForwardingFacade {
    fn register_bean(
        &self,
        bean: Arc<dyn ManagedBean>,
        name: &ObjectName,
    ) -> Result<ObjectInstance, RegistryError> {
        self.settle(name)?;
        self.underlying().register_bean(bean, name)
    }

    fn create_bean(
        &self,
        class_name: &str,
        name: &ObjectName,
    ) -> Result<ObjectInstance, RegistryError> {
        self.settle(name)?;
        self.underlying().create_bean(class_name, name)
    }

    fn unregister_bean(&self, name: &ObjectName) -> Result<(), RegistryError> {
        if self.deferred.cancel_pending(name)? {
            return Ok(());
        }
        self.underlying().unregister_bean(name)
    }

    fn get_instance(&self, name: &ObjectName) -> Result<ObjectInstance, RegistryError> {
        self.resolve(name)?;
        self.underlying().get_instance(name)
    }

    /// Bulk query over fully materialized beans: resolves everything
    /// pending first. Names declared during the sweep are merged with the
    /// class name their source reports.
    fn query_instances(
        &self,
        pattern: Option<&ObjectName>,
        query: Option<&dyn QueryExp>,
    ) -> BTreeSet<ObjectInstance> {
        self.deferred.resolve_all();
        let mut instances = self.underlying().query_instances(pattern, query);
        instances.extend(
            self.pending_selected(pattern, query)
                .into_iter()
                .map(|(name, source)| ObjectInstance {
                    name,
                    class_name: source.class_name().to_string(),
                }),
        );
        instances
    }

    fn query_names(
        &self,
        pattern: Option<&ObjectName>,
        query: Option<&dyn QueryExp>,
    ) -> BTreeSet<ObjectName> {
        let mut names = self.underlying().query_names(pattern, query);
        names.extend(
            self.pending_selected(pattern, query)
                .into_iter()
                .map(|(name, _)| name),
        );
        names
    }

    fn is_registered(&self, name: &ObjectName) -> bool {
        if let Err(err) = self.resolve(name) {
            tracing::debug!(%name, error = %err, "reporting unresolvable name as unregistered");
        }
        self.underlying().is_registered(name)
    }

    fn bean_count(&self) -> usize {
        let underlying = self.underlying();
        let pending = self
            .deferred
            .pending_entries()
            .into_iter()
            .filter(|(name, _)| !underlying.is_registered(name))
            .count();
        underlying.bean_count() + pending
    }

    fn get_attribute(&self, name: &ObjectName, attribute: &str) -> Result<Value, RegistryError> {
        self.resolve(name)?;
        self.underlying().get_attribute(name, attribute)
    }

    fn get_attributes(
        &self,
        name: &ObjectName,
        attributes: &[&str],
    ) -> Result<Vec<Attribute>, RegistryError> {
        self.resolve(name)?;
        self.underlying().get_attributes(name, attributes)
    }

    fn set_attribute(&self, name: &ObjectName, attribute: Attribute) -> Result<(), RegistryError> {
        self.resolve(name)?;
        self.underlying().set_attribute(name, attribute)
    }

    fn set_attributes(
        &self,
        name: &ObjectName,
        attributes: Vec<Attribute>,
    ) -> Result<Vec<Attribute>, RegistryError> {
        self.resolve(name)?;
        self.underlying().set_attributes(name, attributes)
    }

    fn invoke(
        &self,
        name: &ObjectName,
        operation: &str,
        params: &[Value],
    ) -> Result<Value, RegistryError> {
        self.resolve(name)?;
        self.underlying().invoke(name, operation, params)
    }

    fn default_domain(&self) -> String {
        self.underlying().default_domain()
    }

    fn domains(&self) -> BTreeSet<String> {
        let mut domains = self.underlying().domains();
        domains.extend(
            self.deferred
                .pending_entries()
                .into_iter()
                .map(|(name, _)| name.domain().to_string()),
        );
        domains
    }

    fn add_listener(
        &self,
        name: &ObjectName,
        listener: Arc<dyn NotificationListener>,
    ) -> Result<ListenerId, RegistryError> {
        self.resolve(name)?;
        self.underlying().add_listener(name, listener)
    }

    fn remove_listener(&self, name: &ObjectName, listener: ListenerId) -> Result<(), RegistryError> {
        self.resolve(name)?;
        self.underlying().remove_listener(name, listener)
    }

    fn add_listener_bean(
        &self,
        name: &ObjectName,
        listener: &ObjectName,
    ) -> Result<(), RegistryError> {
        self.resolve(name)?;
        self.resolve(listener)?;
        self.underlying().add_listener_bean(name, listener)
    }

    fn remove_listener_bean(
        &self,
        name: &ObjectName,
        listener: &ObjectName,
    ) -> Result<(), RegistryError> {
        self.resolve(name)?;
        self.resolve(listener)?;
        self.underlying().remove_listener_bean(name, listener)
    }

    fn bean_info(&self, name: &ObjectName) -> Result<BeanInfo, RegistryError> {
        self.resolve(name)?;
        self.underlying().bean_info(name)
    }

    /// For a pending name, answers from the declared published types and
    /// the type hierarchy when possible, without materializing the bean.
    fn is_instance_of(&self, name: &ObjectName, class_name: &str) -> Result<bool, RegistryError> {
        if let Some(holder) = self.deferred.holder(name)
            && holder.current_phase() != Phase::Unregistered
        {
            let source = holder.source();
            let declared = source.published_types();
            if declared.iter().any(|t| t == class_name)
                || declared
                    .iter()
                    .any(|t| self.hierarchy.is_subtype(source.owning_module(), t, class_name))
            {
                return Ok(true);
            }
        }
        self.resolve(name)?;
        self.underlying().is_instance_of(name, class_name)
    }

    fn class_loader_for(&self, name: &ObjectName) -> Result<LoaderRef, RegistryError> {
        self.resolve(name)?;
        self.underlying().class_loader_for(name)
    }

    fn instantiate(&self, class_name: &str) -> Result<BeanInstance, RegistryError> {
        self.deferred.resolve_all();
        self.underlying().instantiate(class_name)
    }

    fn deserialize(&self, name: &ObjectName, data: &[u8]) -> Result<Value, RegistryError> {
        self.resolve(name)?;
        self.underlying().deserialize(name, data)
    }

    fn deserialize_with_class(
        &self,
        class_name: &str,
        data: &[u8],
    ) -> Result<Value, RegistryError> {
        self.deferred.resolve_all();
        self.underlying().deserialize_with_class(class_name, data)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::bean::{
        AttributeBean, ClosureSource, StandardBeanAdapter, StaticTypeHierarchy,
    };
    use crate::domain::{EventBus, NotificationSink, WaitPolicy};
    use crate::error::BeanError;
    use crate::registry::{
        AttributeEquals, BeanNotification, HANDLE_NOTIFICATION, InMemoryRegistry,
        KeyPropertyMatches,
    };
    use parking_lot::Mutex;
    use serde_json::json;
    use std::time::{Duration, Instant};

    struct Fixture {
        underlying: Arc<InMemoryRegistry>,
        facade: ForwardingFacade,
    }

    fn fixture() -> Fixture {
        fixture_with(WaitPolicy::Bounded(Duration::from_secs(5)))
    }

    fn fixture_with(policy: WaitPolicy) -> Fixture {
        let underlying = Arc::new(
            InMemoryRegistry::new("test").with_factory("com.example.Cache", || {
                Arc::new(AttributeBean::new("com.example.Cache")) as Arc<dyn ManagedBean>
            }),
        );
        let deferred = Arc::new(
            DeferredRegistry::new(
                Arc::clone(&underlying) as Arc<dyn ObjectRegistry>,
                Arc::new(StandardBeanAdapter::new()),
                Arc::new(EventBus::new(64)) as Arc<dyn NotificationSink>,
            )
            .with_wait_policy(policy),
        );
        let hierarchy = StaticTypeHierarchy::new()
            .with_supertype("com.example.CacheMBean", "com.example.ResourceMBean");
        Fixture {
            underlying,
            facade: ForwardingFacade::new(deferred, Arc::new(hierarchy)),
        }
    }

    fn name(s: &str) -> ObjectName {
        let Ok(n) = ObjectName::parse(s) else {
            panic!("valid name {s}");
        };
        n
    }

    fn cache_source(size: u64) -> Arc<ClosureSource> {
        Arc::new(
            ClosureSource::new(["com.example.CacheMBean"], move || {
                Some(BeanInstance::Managed(Arc::new(
                    AttributeBean::new("com.example.Cache")
                        .with_interface("com.example.CacheMBean")
                        .with_attribute("Size", json!(size))
                        .with_operation("grow", move |args| {
                            let by = args.first().and_then(Value::as_u64).unwrap_or(1);
                            Ok(json!(size + by))
                        }),
                )))
            })
            .with_module("cache-module"),
        )
    }

    fn declare(f: &Fixture, n: &ObjectName, source: &Arc<ClosureSource>) {
        let result = f
            .facade
            .declare(n.clone(), Arc::clone(source) as Arc<dyn BeanSource>);
        assert!(result.is_ok(), "declare {n} failed: {result:?}");
    }

    #[derive(Debug, Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl NotificationListener for Recorder {
        fn handle_notification(&self, notification: &BeanNotification) {
            self.seen.lock().push(notification.kind.clone());
        }
    }

    #[test]
    fn keyed_operations_resolve_first() {
        let f = fixture();
        let n = name("app:type=Cache");
        let source = cache_source(4);
        declare(&f, &n, &source);

        assert_eq!(f.facade.get_attribute(&n, "Size").ok(), Some(json!(4)));
        assert_eq!(f.facade.invoke(&n, "grow", &[json!(3)]).ok(), Some(json!(7)));
        assert!(f.facade.set_attribute(&n, Attribute::new("Size", json!(9))).is_ok());
        assert_eq!(f.facade.get_attribute(&n, "Size").ok(), Some(json!(9)));
        assert_eq!(source.materializations(), 1);
        assert!(f.underlying.is_registered(&n));
    }

    #[test]
    fn every_keyed_operation_activates() {
        let f = fixture();
        type Op = fn(&ForwardingFacade, &ObjectName) -> bool;
        let ops: [(&str, Op); 7] = [
            ("get_instance", |r, n| r.get_instance(n).is_ok()),
            ("get_attributes", |r, n| r.get_attributes(n, &["Size"]).is_ok()),
            ("set_attributes", |r, n| {
                r.set_attributes(n, vec![Attribute::new("Size", json!(1))])
                    .is_ok()
            }),
            ("bean_info", |r, n| r.bean_info(n).is_ok()),
            ("class_loader_for", |r, n| r.class_loader_for(n).is_ok()),
            ("deserialize", |r, n| r.deserialize(n, b"{}").is_ok()),
            ("is_registered", |r, n| r.is_registered(n)),
        ];
        for (i, (label, op)) in ops.iter().enumerate() {
            let n = name(&format!("app:type=Cache,n={i}"));
            let source = cache_source(1);
            declare(&f, &n, &source);
            assert!(op(&f.facade, &n), "{label} failed");
            assert_eq!(source.materializations(), 1, "{label} did not activate");
            assert!(f.underlying.is_registered(&n), "{label} left {n} unregistered");
        }
    }

    #[test]
    fn unresolvable_name_looks_not_found() {
        let f = fixture();
        let n = name("app:type=Ghost");
        let ghost = Arc::new(ClosureSource::new(["com.example.GhostMBean"], || None));
        declare(&f, &n, &ghost);

        assert!(matches!(
            f.facade.get_attribute(&n, "Size"),
            Err(RegistryError::InstanceNotFound(_))
        ));
        assert!(!f.facade.deferred().is_pending(&n));
        assert!(!f.facade.is_registered(&n));
    }

    #[test]
    fn declare_rejects_live_pending_and_pattern_names() {
        let f = fixture();
        let live = name("app:type=Live");
        assert!(
            f.underlying
                .register_bean(Arc::new(AttributeBean::new("x.Y")), &live)
                .is_ok()
        );
        assert!(matches!(
            f.facade.declare(live, cache_source(1)),
            Err(RegistryError::InstanceAlreadyExists(_))
        ));

        let pending = name("app:type=Pending");
        declare(&f, &pending, &cache_source(1));
        assert!(matches!(
            f.facade.declare(pending, cache_source(1)),
            Err(RegistryError::InstanceAlreadyExists(_))
        ));

        assert!(matches!(
            f.facade.declare(name("app:*"), cache_source(1)),
            Err(RegistryError::MalformedName(_))
        ));
    }

    #[test]
    fn unregister_cancels_pending_without_touching_underlying() {
        let f = fixture();
        let n = name("app:type=Cache");
        let source = cache_source(1);
        declare(&f, &n, &source);

        assert!(f.facade.unregister_bean(&n).is_ok());
        assert_eq!(source.materializations(), 0);
        assert!(!f.underlying.is_registered(&n));
        // Second unregister falls through to the underlying registry.
        assert!(matches!(
            f.facade.unregister_bean(&n),
            Err(RegistryError::InstanceNotFound(_))
        ));
    }

    #[test]
    fn unregister_live_bean_delegates() {
        let f = fixture();
        let n = name("app:type=Cache");
        declare(&f, &n, &cache_source(1));
        assert!(f.facade.get_attribute(&n, "Size").is_ok());
        assert!(f.facade.unregister_bean(&n).is_ok());
        assert!(!f.underlying.is_registered(&n));
    }

    #[test]
    fn enumerations_merge_pending_without_activation() {
        let f = fixture();
        assert!(
            f.underlying
                .register_bean(Arc::new(AttributeBean::new("x.Live")), &name("live:type=A"))
                .is_ok()
        );
        let source = cache_source(1);
        declare(&f, &name("lazy:type=Cache,name=x"), &source);

        let all = f.facade.query_names(None, None);
        assert!(all.contains(&name("live:type=A")));
        assert!(all.contains(&name("lazy:type=Cache,name=x")));

        let lazy_only = f.facade.query_names(Some(&name("lazy:*")), None);
        assert_eq!(lazy_only.len(), 1);

        let by_key = KeyPropertyMatches::new("name", "x");
        assert_eq!(f.facade.query_names(None, Some(&by_key)).len(), 1);

        assert_eq!(f.facade.bean_count(), 2);
        let domains = f.facade.domains();
        assert!(domains.contains("live") && domains.contains("lazy"));

        assert_eq!(source.materializations(), 0);
    }

    #[test]
    fn attribute_query_activates_candidates_lazily() {
        let f = fixture();
        let big = cache_source(10);
        let small = cache_source(1);
        declare(&f, &name("app:type=Cache,name=big"), &big);
        declare(&f, &name("app:type=Cache,name=small"), &small);

        let query = AttributeEquals::new("Size", json!(10));
        let matched = f.facade.query_names(None, Some(&query));
        assert_eq!(
            matched.into_iter().collect::<Vec<_>>(),
            vec![name("app:type=Cache,name=big")]
        );
    }

    #[test]
    fn failing_query_excludes_candidate() {
        let f = fixture();
        let ghost = Arc::new(ClosureSource::new(["com.example.GhostMBean"], || None));
        declare(&f, &name("app:type=Ghost"), &ghost);

        let query = AttributeEquals::new("Size", json!(1));
        assert!(f.facade.query_names(None, Some(&query)).is_empty());
    }

    #[test]
    fn query_instances_materializes_everything() {
        let f = fixture();
        let a = cache_source(1);
        let b = cache_source(2);
        declare(&f, &name("app:type=Cache,name=a"), &a);
        declare(&f, &name("app:type=Cache,name=b"), &b);

        let instances = f.facade.query_instances(Some(&name("app:*")), None);
        assert_eq!(instances.len(), 2);
        assert!(instances.iter().all(|i| i.class_name == "com.example.Cache"));
        assert_eq!(a.materializations() + b.materializations(), 2);
        assert_eq!(f.facade.deferred().pending_count(), 0);
    }

    #[test]
    fn instance_of_answers_from_declared_types() {
        let f = fixture();
        let n = name("app:type=Cache");
        let source = cache_source(1);
        declare(&f, &n, &source);

        assert_eq!(f.facade.is_instance_of(&n, "com.example.CacheMBean").ok(), Some(true));
        assert_eq!(
            f.facade.is_instance_of(&n, "com.example.ResourceMBean").ok(),
            Some(true)
        );
        assert_eq!(source.materializations(), 0);

        // Not answerable from declarations: activates and asks the bean.
        assert_eq!(f.facade.is_instance_of(&n, "com.example.Other").ok(), Some(false));
        assert_eq!(source.materializations(), 1);
    }

    #[test]
    fn listeners_attach_through_facade() {
        let f = fixture();
        let n = name("app:type=Cache");
        declare(&f, &n, &cache_source(1));

        let recorder = Arc::new(Recorder::default());
        let Ok(id) = f
            .facade
            .add_listener(&n, Arc::clone(&recorder) as Arc<dyn NotificationListener>)
        else {
            panic!("add listener failed");
        };
        assert_eq!(f.underlying.emit(&n, "cache.cleared", "cleared").ok(), Some(1));
        assert_eq!(recorder.seen.lock().as_slice(), ["cache.cleared".to_string()]);
        assert!(f.facade.remove_listener(&n, id).is_ok());
    }

    #[test]
    fn register_over_failed_pending_succeeds() {
        let f = fixture();
        let n = name("app:type=Cache");
        let ghost = Arc::new(ClosureSource::new(["com.example.GhostMBean"], || None));
        declare(&f, &n, &ghost);

        let bean = Arc::new(AttributeBean::new("com.example.Direct")) as Arc<dyn ManagedBean>;
        let Ok(instance) = f.facade.register_bean(bean, &n) else {
            panic!("register should take the freed slot");
        };
        assert_eq!(instance.class_name, "com.example.Direct");
    }

    #[test]
    fn register_over_live_pending_conflicts() {
        let f = fixture();
        let n = name("app:type=Cache");
        declare(&f, &n, &cache_source(1));
        assert!(matches!(
            f.facade.create_bean("com.example.Cache", &n),
            Err(RegistryError::InstanceAlreadyExists(_))
        ));
    }

    #[test]
    fn class_operations_resolve_everything() {
        let f = fixture();
        let source = cache_source(1);
        declare(&f, &name("app:type=Cache"), &source);

        assert!(f.facade.instantiate("com.example.Cache").is_ok());
        assert_eq!(source.materializations(), 1);
        assert_eq!(
            f.facade.deserialize_with_class("com.example.Cache", b"3").ok(),
            Some(json!(3))
        );
        assert!(matches!(
            f.facade.instantiate("com.example.Missing"),
            Err(RegistryError::ClassNotFound(_))
        ));
        assert_eq!(f.facade.default_domain(), "test");
    }

    #[derive(Debug)]
    struct Pinned;

    impl ManagedBean for Pinned {
        fn info(&self) -> BeanInfo {
            BeanInfo {
                class_name: "com.example.Pinned".to_string(),
                description: String::new(),
                attributes: Vec::new(),
                operations: Vec::new(),
                interfaces: vec!["com.example.PinnedMBean".to_string()],
                module: None,
            }
        }
        fn get_attribute(&self, _attribute: &str) -> Result<Value, BeanError> {
            Ok(json!(true))
        }
        fn set_attribute(&self, attribute: &str, _value: Value) -> Result<(), BeanError> {
            Err(BeanError::ReadOnly(attribute.to_string()))
        }
        fn invoke(&self, operation: &str, _params: &[Value]) -> Result<Value, BeanError> {
            Err(BeanError::OperationNotFound(operation.to_string()))
        }
        fn pre_deregister(&self) -> Result<(), BeanError> {
            Err(BeanError::Failed("pinned".to_string()))
        }
    }

    #[test]
    fn listener_bean_resolves_both_names() {
        let f = fixture();
        let cache = name("app:type=Cache");
        let audit = name("app:type=Audit");
        let cache_src = cache_source(1);
        let received = Arc::new(Mutex::new(0_usize));
        let audit_src = {
            let received = Arc::clone(&received);
            Arc::new(ClosureSource::new(["com.example.AuditMBean"], move || {
                let received = Arc::clone(&received);
                Some(BeanInstance::Managed(Arc::new(
                    AttributeBean::new("com.example.Audit")
                        .with_interface("com.example.AuditMBean")
                        .with_operation(HANDLE_NOTIFICATION, move |_| {
                            *received.lock() += 1;
                            Ok(Value::Null)
                        }),
                )))
            }))
        };
        declare(&f, &cache, &cache_src);
        declare(&f, &audit, &audit_src);

        assert!(f.facade.add_listener_bean(&cache, &audit).is_ok());
        assert_eq!(cache_src.materializations(), 1);
        assert_eq!(audit_src.materializations(), 1);
        assert_eq!(f.facade.deferred().pending_count(), 0);

        assert_eq!(f.underlying.emit(&cache, "cache.cleared", "cleared").ok(), Some(1));
        assert_eq!(*received.lock(), 1);

        assert!(f.facade.remove_listener_bean(&cache, &audit).is_ok());
        assert_eq!(f.underlying.emit(&cache, "cache.cleared", "again").ok(), Some(0));
        assert_eq!(cache_src.materializations(), 1);
        assert_eq!(audit_src.materializations(), 1);
    }

    #[test]
    fn unresolvable_listener_bean_is_not_found() {
        let f = fixture();
        let cache = name("app:type=Cache");
        let ghost = name("app:type=Ghost");
        declare(&f, &cache, &cache_source(1));
        declare(
            &f,
            &ghost,
            &Arc::new(ClosureSource::new(["com.example.GhostMBean"], || None)),
        );

        assert!(matches!(
            f.facade.add_listener_bean(&cache, &ghost),
            Err(RegistryError::InstanceNotFound(n)) if n == ghost
        ));
        assert!(f.underlying.is_registered(&cache));
    }

    #[test]
    fn reentrant_access_times_out_instead_of_hanging() {
        let f = fixture_with(WaitPolicy::Bounded(Duration::from_millis(200)));
        let n = name("app:type=Cache");
        let slot: Arc<Mutex<Option<ForwardingFacade>>> = Arc::new(Mutex::new(None));
        let inner: Arc<Mutex<Option<Result<Value, RegistryError>>>> = Arc::new(Mutex::new(None));
        let source = {
            let slot = Arc::clone(&slot);
            let inner = Arc::clone(&inner);
            let n = n.clone();
            Arc::new(ClosureSource::new(["com.example.CacheMBean"], move || {
                let facade = slot.lock().clone();
                if let Some(facade) = facade {
                    // Materializing thread asks for its own name.
                    *inner.lock() = Some(facade.get_attribute(&n, "Size"));
                }
                Some(BeanInstance::Managed(Arc::new(
                    AttributeBean::new("com.example.Cache").with_attribute("Size", json!(3)),
                )))
            }))
        };
        declare(&f, &n, &source);
        *slot.lock() = Some(f.facade.clone());

        let started = Instant::now();
        let outer = f.facade.get_attribute(&n, "Size");
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(outer.ok(), Some(json!(3)));
        assert!(matches!(
            inner.lock().take(),
            Some(Err(RegistryError::ResolutionTimedOut(_)))
        ));
        assert_eq!(source.materializations(), 1);
        assert!(f.underlying.is_registered(&n));

        *slot.lock() = None;
    }

    #[test]
    fn unregister_veto_surfaces_unregistration_failed() {
        let f = fixture();
        let n = name("app:type=Pinned");
        let source = Arc::new(ClosureSource::new(["com.example.PinnedMBean"], || {
            Some(BeanInstance::Managed(Arc::new(Pinned)))
        }));
        declare(&f, &n, &source);

        assert_eq!(f.facade.get_attribute(&n, "Anything").ok(), Some(json!(true)));
        assert!(matches!(
            f.facade.unregister_bean(&n),
            Err(RegistryError::UnregistrationFailed { .. })
        ));
        assert!(f.underlying.is_registered(&n));
    }

    #[test]
    fn bean_count_skips_pending_names_already_live() {
        let f = fixture();
        let n = name("app:type=Cache");
        assert!(
            f.underlying
                .register_bean(Arc::new(AttributeBean::new("x.Y")), &n)
                .is_ok()
        );
        // A holder still mapped after its bean went live.
        assert!(f.facade.deferred().declare_pending(n.clone(), cache_source(1)));
        assert_eq!(f.facade.bean_count(), 1);

        declare(&f, &name("app:type=Other"), &cache_source(1));
        assert_eq!(f.facade.bean_count(), 2);
    }
}
